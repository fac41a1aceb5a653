//! Files on disk and the entity store

pub mod layout;
pub mod memory;
pub mod settings;
pub mod store;

pub use memory::MemoryStore;
pub use store::Store;
