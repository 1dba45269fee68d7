//! # threebx-intrinsics
//!
//! The closed intrinsic vocabulary and its type lattice.
//!
//! 3BX has no fixed keywords — every surface syntax form is introduced by a
//! user-defined pattern. The one exception is the vocabulary a pattern body
//! can bottom out in: the `@intrinsic(...)` calls that actually do
//! something (arithmetic, comparison, storage, control flow). This crate
//! owns that closed set and the type lattice used to check and infer
//! through it.
//!
//! It has no knowledge of parsing, patterns, or source spans — that
//! knowledge lives in `threebx-core`, which consumes [`IntrinsicName`] and
//! [`InferredType`] as plain values.

pub mod signature;
pub mod types;

pub use signature::{check_pure_call, pure_result_rule, Arity, IntrinsicName, ResultRule};
pub use types::{InferredType, TypeConflict};
