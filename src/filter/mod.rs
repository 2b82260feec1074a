//! The declarative filter language: a JSON tree consumed directly by the
//! SQL compiler and the in-memory evaluator, which must agree on every
//! documented edge case. Both walk the raw `serde_json::Value`/`Map`
//! tree against the shared `OPERATOR_DISPATCH_ORDER` constant rather than
//! deserializing into a typed AST, so an ambiguous multi-key operator
//! object (`{"$gt":1,"$eq":5}`) resolves identically in both places
//! instead of depending on serde's enum-variant matching order.

pub mod compiler;
pub mod eval;

pub use compiler::{compile, Param, OPERATOR_DISPATCH_ORDER};
pub use eval::matches;
