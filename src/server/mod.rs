//! TCP accept loop and the handler contract.

pub mod handler;
pub mod listener;

pub use handler::Handler;
pub use listener::Server;
