//! Types shared between the API and database representations.

pub mod email;
pub mod name;

pub use email::Email;
pub use name::{required, PersonName};
