mod errors;
mod id;
mod schema;
mod store;

pub use errors::{is_foreign_key_violation, is_unique_violation};
pub use id::Id;
pub use schema::ensure_schema_exists;
pub use store::Store;
