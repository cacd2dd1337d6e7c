pub mod config;
pub mod error;
pub mod schema;
pub mod store;

pub use config::{Config, DataDir, default_base_dir, resolve_base_dir};
pub use error::{Result, StoreError};
pub use store::{DecayOutcome, Store, StoreStats};
