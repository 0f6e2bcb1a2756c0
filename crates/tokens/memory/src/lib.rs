pub mod store;

pub use store::MemoryTokenStore;
