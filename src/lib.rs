#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;

pub use config::Config;

use config::{ConfigFairing, DatabaseFairing};
use logging::LoggerFairing;

/// Assemble the server. The database is opened while igniting.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .mount("/api", api::routes())
        .register("/", api::catchers())
}

/// Assemble the server around an already-open store.
#[cfg(test)]
pub(crate) fn rocket_for_store(store: model::sqlite::Store) -> Rocket<Build> {
    rocket::build()
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .manage(store)
        .mount("/api", api::routes())
        .register("/", api::catchers())
}

/// Open a fresh, uniquely-named database for a single test.
#[cfg(test)]
pub(crate) fn test_store() -> model::sqlite::Store {
    use rand::Rng;

    let name = format!("voting-test{}.db", rand::thread_rng().gen::<u64>());
    let path = std::env::temp_dir().join(name);
    model::sqlite::Store::open(path, 4, std::time::Duration::from_secs(10)).unwrap()
}
