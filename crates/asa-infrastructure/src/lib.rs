pub mod kv_store;
pub mod paths;
pub mod proactive_cache;
pub mod settings_service;
pub mod storage;

pub use crate::kv_store::{JsonFileKeyValueStore, MemoryKeyValueStore};
pub use crate::paths::AsaPaths;
pub use crate::proactive_cache::{MemoryProactiveCache, proactive_cache_key};
pub use crate::settings_service::FileSettingsProvider;
