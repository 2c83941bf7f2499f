//! HTTP/1.1 wire protocol.
//!
//! Requests are read and responses written directly on the byte stream, one
//! request per connection.
//!
//! # Architecture
//!
//! - **`headers`**: incremental header-line parser and case-insensitive header map
//! - **`request`**: request-line parsing, the request state machine and `read_request`
//! - **`writer`**: staged response writer, including chunked bodies and trailers
//! - **`connection`**: runs one request/response cycle over an accepted socket
//! - **`error`**: parse and write errors
//!
//! # Connection Lifecycle
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← RequestParser fed from the socket
//!        └──────┬──────┘
//!               │ Request complete
//!               ▼
//!        ┌──────────────────┐
//!        │    Handling      │ ← Handler drives the ResponseWriter
//!        └──────┬───────────┘
//!               │ Handler returned
//!               ▼
//!        ┌──────────────────┐
//!        │     Closed       │
//!        └──────────────────┘
//! ```
//!
//! A parse failure goes straight from Reading to Closed.

pub mod connection;
pub mod error;
pub mod headers;
pub mod request;
pub mod writer;
