//! The S-expression value model
//!
//! Everything the protocol carries as "R data" is an [`Sexp`]: a payload
//! (integer, double, logical, string, date or list vector, a symbol, or an
//! uninterpreted raw block) plus a list of named attributes that are
//! themselves S-expressions.
//!
//! The model mirrors R's missing-value semantics exactly: every vector
//! variant has an in-band NA encoding (see [`na`]) so decoded values can be
//! re-encoded byte-identically.

mod na;
mod value;

pub use na::{is_na_integer, is_na_real, na_real, Logical, NA_INTEGER, NA_REAL_BITS};
pub use value::{Sexp, SexpData};
