//! httpwire - HTTP/1.1 straight from TCP
//!
//! Incremental request parsing, a staged response writer with chunked
//! transfer-coding and trailers, and a connection-per-task server.

pub mod app;
pub mod config;
pub mod http;
pub mod server;
