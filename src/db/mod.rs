pub mod memory;
pub mod models;
pub mod repository;
pub mod store;

pub use memory::MemoryStore;
pub use repository::Repository;
pub use store::{CropStore, LogStore, ReportStore};
