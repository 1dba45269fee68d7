//! The type lattice used to infer parameter and result types from intrinsic
//! usage: `Unknown ⊏ {I64, F64, Bool, String, Void}`.
//!
//! `Unknown` is the bottom element — a parameter that has not yet been
//! constrained by any intrinsic call joins with anything and becomes that
//! thing. Two distinct, fully-known types joined together are a conflict
//! (the lattice's top), except for the one widening rule the language
//! grants numeric literals: `I64` widens to `F64`.

use std::fmt;

/// A type assigned to a pattern parameter, expression result, or call
/// argument during type inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InferredType {
    /// Not yet constrained by any intrinsic usage.
    #[default]
    Unknown,
    /// No value (effects, `store`).
    Void,
    Bool,
    I64,
    F64,
    String,
}

impl InferredType {
    pub fn is_numeric(self) -> bool {
        matches!(self, InferredType::I64 | InferredType::F64)
    }

    /// Joins two types per the lattice described above.
    ///
    /// `Unknown` joined with anything yields that thing. `I64` and `F64`
    /// joined together widen to `F64` (numeric literals in the same
    /// expression should not force an error just because one side was
    /// written as an integer literal). Any other pair of distinct,
    /// non-`Unknown` types is a [`TypeConflict`].
    pub fn join(self, other: InferredType) -> Result<InferredType, TypeConflict> {
        use InferredType::*;
        match (self, other) {
            (Unknown, x) | (x, Unknown) => Ok(x),
            (a, b) if a == b => Ok(a),
            (I64, F64) | (F64, I64) => Ok(F64),
            (expected, found) => Err(TypeConflict { expected, found }),
        }
    }
}

impl fmt::Display for InferredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InferredType::Unknown => "unknown",
            InferredType::Void => "void",
            InferredType::Bool => "bool",
            InferredType::I64 => "i64",
            InferredType::F64 => "f64",
            InferredType::String => "string",
        };
        f.write_str(s)
    }
}

/// Two types were unified and did not agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeConflict {
    pub expected: InferredType,
    pub found: InferredType,
}

impl fmt::Display for TypeConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "expected type {}, found {}",
            self.expected, self.found
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use InferredType::*;

    #[test]
    fn unknown_joins_to_the_other_type() {
        assert_eq!(Unknown.join(I64), Ok(I64));
        assert_eq!(F64.join(Unknown), Ok(F64));
    }

    #[test]
    fn identical_types_join_to_themselves() {
        assert_eq!(Bool.join(Bool), Ok(Bool));
        assert_eq!(String.join(String), Ok(String));
    }

    #[test]
    fn i64_widens_to_f64() {
        assert_eq!(I64.join(F64), Ok(F64));
        assert_eq!(F64.join(I64), Ok(F64));
    }

    #[test]
    fn mismatched_types_conflict() {
        let err = Bool.join(I64).unwrap_err();
        assert_eq!(err.expected, Bool);
        assert_eq!(err.found, I64);
    }

    #[test]
    fn is_numeric_only_true_for_i64_and_f64() {
        assert!(I64.is_numeric());
        assert!(F64.is_numeric());
        assert!(!Bool.is_numeric());
        assert!(!String.is_numeric());
    }
}
