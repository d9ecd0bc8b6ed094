//! Types shared between the DSU installer library and its hosts.

pub mod errors;

pub use errors::{DsuError, DsuResult};
