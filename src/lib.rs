// Public API for integration tests and potential library usage

pub mod config;
pub mod connection;
pub mod dictionary;
pub mod engine;
pub mod identity;
pub mod membership;
pub mod protocol;
pub mod registry;
pub mod state;
pub mod store;
pub mod timer;
pub mod types;
pub mod ws;
