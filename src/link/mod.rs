pub mod connection;
pub mod constants;
pub mod interface;
pub mod publisher;
pub mod types;
