//! Metadata, protocol and file-list bookkeeping for the SWAN multimodal
//! biometrics corpus.

pub mod annotations;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod lists;
pub mod logging;
pub mod metadata;
pub mod pad;
pub mod protocol;
pub mod query;

pub use catalog::{Catalog, Client, FileRecord};
pub use config::Config;
pub use db::Database;
pub use error::SwanError;
pub use query::ObjectQuery;
