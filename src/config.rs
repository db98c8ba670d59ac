use std::path::PathBuf;
use std::time::Duration;

use log::{error, info};
use rocket::{
    fairing::{Fairing, Info, Kind},
    tokio::task,
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::sqlite::Store;

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    expose_internal_errors: bool,
}

impl Config {
    /// Whether internal failures report their underlying cause to clients.
    /// Off unless explicitly configured; intended for local debugging only.
    pub fn expose_internal_errors(&self) -> bool {
        self.expose_internal_errors
    }
}

/// A fairing that loads the application config and puts it in managed state.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        Ok(rocket.manage(config))
    }
}

/// Configuration for the database.
#[derive(Debug, Deserialize)]
pub struct DbConfig {
    db_path: PathBuf,
    #[serde(default = "default_pool_size")]
    db_pool_size: u32,
    #[serde(default = "default_busy_timeout_ms")]
    db_busy_timeout_ms: u64,
}

fn default_pool_size() -> u32 {
    8
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

impl DbConfig {
    /// Location of the SQLite database file.
    pub fn path(&self) -> &PathBuf {
        &self.db_path
    }

    /// Maximum number of pooled connections.
    pub fn pool_size(&self) -> u32 {
        self.db_pool_size
    }

    /// How long a writer waits for the database lock before giving up.
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.db_busy_timeout_ms)
    }
}

/// A fairing that loads the database config, opens the connection pool,
/// ensures the schema exists, and places the `Store` into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "SQLite",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!(
            "Loaded database config, opening {}...",
            config.path().display()
        );

        // Opening the pool connects eagerly, so keep it off the async workers.
        let opened = task::spawn_blocking(move || {
            Store::open(config.path(), config.pool_size(), config.busy_timeout())
        })
        .await;
        let store = match opened {
            Ok(Ok(store)) => store,
            Ok(Err(e)) => {
                error!("Failed to open database: {e}");
                return Err(rocket);
            }
            Err(e) => {
                error!("Database setup task failed: {e}");
                return Err(rocket);
            }
        };
        info!("...database online!");

        Ok(rocket.manage(store))
    }
}

#[cfg(test)]
mod tests {
    use rocket::figment::{providers::Serialized, Figment};

    use super::*;

    #[test]
    fn db_config_defaults() {
        let figment = Figment::new().merge(Serialized::default("db_path", "votes.db"));
        let config = figment.extract::<DbConfig>().unwrap();
        assert_eq!(config.path(), &PathBuf::from("votes.db"));
        assert_eq!(config.pool_size(), 8);
        assert_eq!(config.busy_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn db_config_requires_path() {
        assert!(Figment::new().extract::<DbConfig>().is_err());
    }

    #[test]
    fn internal_errors_hidden_by_default() {
        let config = Figment::new().extract::<Config>().unwrap();
        assert!(!config.expose_internal_errors());
    }
}
