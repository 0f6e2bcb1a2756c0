pub mod client;
pub mod config;

pub use client::PinataClient;
pub use config::PinataConfig;
