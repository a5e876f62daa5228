pub mod docker;
pub mod operator;
pub mod server;
pub mod shared;
