pub mod config;
pub mod error;
pub mod json_bridge;
pub mod profile_store;
pub mod schema;
pub mod session;
pub mod store;

pub use config::{CONFIG_FILE, DB_FILE, Settings, default_base_dir};
pub use error::{Result, StoreError};
pub use json_bridge::{read_profile_file, write_profile_file};
pub use profile_store::{MemoryProfileStore, ProfileStore, SqliteProfileStore};
pub use session::{Persist, Session};
pub use store::Store;
