pub mod cid;
pub mod error;
pub mod store;

pub use cid::Cid;
pub use error::ContentStoreError;
pub use store::ContentStore;
