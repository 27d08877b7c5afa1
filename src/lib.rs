//! # rqap
//!
//! A client for the QAP1 binary protocol spoken by Rserve, with:
//! - A typed S-expression value model with R's missing-value semantics
//! - A byte-exact recursive codec with attribute framing
//! - Request/response framing over half-duplex TCP
//! - A session façade for eval, assign, and file transfer
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Session                              │
//! │        (connect / login / eval / assign / files)             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                    Command Framing                           │
//! │        (request packets / response parameters)               │
//! └──────────┬─────────────────────────────────┬────────────────┘
//!            │                                 │
//!            ▼                                 ▼
//!     ┌─────────────┐                  ┌──────────────┐
//!     │ Sexp Codec  │                  │  Transport   │
//!     │ (recursive) │                  │ (exact I/O)  │
//!     └──────┬──────┘                  └──────────────┘
//!            │
//!            ▼
//!     ┌─────────────┐
//!     │ Value Model │
//!     │ (Sexp + NA) │
//!     └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use rqap::{Session, SessionConfig};
//!
//! fn main() -> rqap::Result<()> {
//!     let config = SessionConfig::builder().addr("127.0.0.1:6311").build();
//!     let mut session = Session::connect(&config)?;
//!     let value = session.eval("rnorm(10)")?;
//!     println!("{}", value);
//!     Ok(())
//! }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod network;
pub mod protocol;
pub mod sexp;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{Credentials, PasswordCipher, SessionConfig};
pub use error::{QapError, Result};
pub use network::Session;
pub use sexp::{Logical, Sexp, SexpData};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of rqap
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
