//! The closed intrinsic vocabulary.
//!
//! Every `@intrinsic(name, ...)` call in a pattern body must name one of
//! these. There is no way for a user pattern to add to this set — it is
//! the one piece of 3BX that *is* a fixed keyword list, by design: the
//! ground truth that header deduction (in `threebx-core::pattern`) anchors
//! on, since it is the only vocabulary that cannot be mistaken for a
//! user-defined literal.

use crate::types::InferredType;
use std::fmt;

/// The closed set of intrinsic names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntrinsicName {
    Store,
    Load,
    Add,
    Sub,
    Mul,
    Div,
    CmpEq,
    CmpNeq,
    CmpLt,
    CmpGt,
    CmpLte,
    CmpGte,
    Print,
    Return,
    Evaluate,
    Execute,
    ExecuteIf,
    LoopWhile,
    Call,
}

impl IntrinsicName {
    /// Compile-time lookup from the textual name used in source
    /// (`@intrinsic("store", ...)` carries the string `"store"`).
    ///
    /// Returns `None` for any name outside the closed set; callers surface
    /// that as an `Unknown intrinsic` diagnostic rather than panicking.
    pub fn lookup(name: &str) -> Option<Self> {
        use IntrinsicName::*;
        Some(match name {
            "store" => Store,
            "load" => Load,
            "add" => Add,
            "sub" => Sub,
            "mul" => Mul,
            "div" => Div,
            "cmp_eq" => CmpEq,
            "cmp_neq" => CmpNeq,
            "cmp_lt" => CmpLt,
            "cmp_gt" => CmpGt,
            "cmp_lte" => CmpLte,
            "cmp_gte" => CmpGte,
            "print" => Print,
            "return" => Return,
            "evaluate" => Evaluate,
            "execute" => Execute,
            "execute_if" => ExecuteIf,
            "loop_while" => LoopWhile,
            "call" => Call,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        use IntrinsicName::*;
        match self {
            Store => "store",
            Load => "load",
            Add => "add",
            Sub => "sub",
            Mul => "mul",
            Div => "div",
            CmpEq => "cmp_eq",
            CmpNeq => "cmp_neq",
            CmpLt => "cmp_lt",
            CmpGt => "cmp_gt",
            CmpLte => "cmp_lte",
            CmpGte => "cmp_gte",
            Print => "print",
            Return => "return",
            Evaluate => "evaluate",
            Execute => "execute",
            ExecuteIf => "execute_if",
            LoopWhile => "loop_while",
            Call => "call",
        }
    }

    /// Every argument position this intrinsic reads a bare header word
    /// through (as opposed to a literal or a thunk/block) is a candidate
    /// for parameter deduction. All current intrinsics treat every
    /// argument position this way except the literal library/function
    /// names in `call`, which are position 0 and 1.
    pub fn deducible_argument_positions(self, total_args: usize) -> std::ops::Range<usize> {
        match self {
            IntrinsicName::Call => 2.min(total_args)..total_args,
            _ => 0..total_args,
        }
    }

    /// Minimum and (if bounded) maximum argument count.
    pub fn arity(self) -> Arity {
        use IntrinsicName::*;
        match self {
            Store => Arity::Fixed(2),
            Load => Arity::Fixed(1),
            Add | Sub | Mul | Div => Arity::Fixed(2),
            CmpEq | CmpNeq | CmpLt | CmpGt | CmpLte | CmpGte => Arity::Fixed(2),
            Print => Arity::Fixed(1),
            Return => Arity::Fixed(1),
            Evaluate => Arity::Fixed(1),
            Execute => Arity::Fixed(1),
            ExecuteIf => Arity::Fixed(2),
            LoopWhile => Arity::Fixed(2),
            Call => Arity::AtLeast(2),
        }
    }
}

impl fmt::Display for IntrinsicName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An intrinsic's accepted argument count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Fixed(k) => n == k,
            Arity::AtLeast(k) => n >= k,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Fixed(k) => write!(f, "{k}"),
            Arity::AtLeast(k) => write!(f, "at least {k}"),
        }
    }
}

/// How an intrinsic's result type relates to its argument types, for the
/// intrinsics whose result can be computed purely from `InferredType`s
/// (arithmetic, comparison, `print`, `call`). `store`/`load`/`return`/
/// `evaluate`/`execute*`/`loop_while` additionally depend on L-value
/// bindings, thunks, or blocks that only `threebx-core::types` has enough
/// context to resolve, so they are not modeled here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultRule {
    /// Always `Void`.
    Void,
    /// Always `Bool`, regardless of argument types (still requires the
    /// arguments to be mutually comparable; see [`IntrinsicName::CmpEq`]).
    Bool,
    /// The join of all argument types (`add`/`sub`/`mul`/`div`).
    JoinOfArgs,
    /// Always `F64` (`call`, per the closed-vocabulary signature table).
    F64,
}

/// Returns the result rule for intrinsics whose typing is a pure function
/// of their `InferredType` arguments. `None` for intrinsics that need
/// structural context (`store`, `load`, `return`, `evaluate`, `execute`,
/// `execute_if`, `loop_while`).
pub fn pure_result_rule(name: IntrinsicName) -> Option<ResultRule> {
    use IntrinsicName::*;
    match name {
        Add | Sub | Mul | Div => Some(ResultRule::JoinOfArgs),
        CmpEq | CmpNeq | CmpLt | CmpGt | CmpLte | CmpGte => Some(ResultRule::Bool),
        Print => Some(ResultRule::Void),
        Call => Some(ResultRule::F64),
        _ => None,
    }
}

/// Checks a pure-result intrinsic's argument types and computes its result
/// type. Arithmetic and ordering comparisons additionally require numeric
/// arguments; equality comparisons accept any matching type.
pub fn check_pure_call(
    name: IntrinsicName,
    arg_types: &[InferredType],
) -> Result<InferredType, InferredType> {
    use IntrinsicName::*;
    match name {
        Add | Sub | Mul | Div => {
            let mut acc = InferredType::Unknown;
            for &t in arg_types {
                if !matches!(t, InferredType::Unknown) && !t.is_numeric() {
                    return Err(t);
                }
                acc = acc.join(t).map_err(|c| c.found)?;
            }
            Ok(acc)
        }
        CmpLt | CmpGt | CmpLte | CmpGte => {
            for &t in arg_types {
                if !matches!(t, InferredType::Unknown) && !t.is_numeric() {
                    return Err(t);
                }
            }
            Ok(InferredType::Bool)
        }
        CmpEq | CmpNeq => {
            let mut acc = InferredType::Unknown;
            for &t in arg_types {
                acc = acc.join(t).map_err(|c| c.found)?;
            }
            Ok(InferredType::Bool)
        }
        Print => Ok(InferredType::Void),
        Call => Ok(InferredType::F64),
        _ => Ok(InferredType::Unknown),
    }
}
