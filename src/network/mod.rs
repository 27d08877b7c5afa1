//! Network Module
//!
//! TCP connection handling.
//!
//! ## Architecture
//! - One blocking TCP connection per session
//! - Buffered reader/writer split over a cloned stream
//! - Exact-read/exact-write primitives in [`transport`]

pub mod transport;

mod session;

pub use session::Session;
