pub mod store;

pub use store::MemoryContentStore;
