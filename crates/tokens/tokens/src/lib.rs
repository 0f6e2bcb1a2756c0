pub mod error;
pub mod store;

pub use error::TokenStoreError;
pub use store::TokenStore;
