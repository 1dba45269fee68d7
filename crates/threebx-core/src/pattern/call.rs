//! Parses `@intrinsic(name, args...)` call syntax out of a token stream.
//!
//! Intrinsics are the ground of meaning: every pattern body eventually
//! bottoms out in one of these calls, and the Type Inference stage can
//! only progress once it knows which intrinsic a body line invokes and
//! what it passed.

use threebx_base::Span;
use threebx_intrinsics::IntrinsicName;

use crate::token::{Token, TokenKind};

#[derive(Debug, Clone)]
pub struct IntrinsicCallSyntax {
    pub name: IntrinsicName,
    pub name_span: Span,
    pub args: Vec<CallArg>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallArg {
    Integer(i64),
    Float(f64),
    Str(String),
    Word(String),
}

impl CallArg {
    pub fn as_word(&self) -> Option<&str> {
        match self {
            CallArg::Word(w) => Some(w),
            _ => None,
        }
    }
}

/// Finds and parses the first `@intrinsic("name", arg, ...)` call in
/// `tokens`. Returns `None` if there is no such call, the named intrinsic
/// is unknown, or the argument list doesn't close.
pub fn parse_intrinsic_call(tokens: &[Token]) -> Option<IntrinsicCallSyntax> {
    let at = tokens.iter().position(|t| t.is_punct('@'))?;
    if !tokens.get(at + 1).map(|t| t.is_word("intrinsic")).unwrap_or(false) {
        return None;
    }
    if !tokens.get(at + 2).map(|t| t.is_punct('(')).unwrap_or(false) {
        return None;
    }

    let name_token = tokens.get(at + 3)?;
    let name_text = match &name_token.kind {
        TokenKind::Str(s) => s.clone(),
        _ => return None,
    };
    let name = IntrinsicName::lookup(&name_text)?;

    let mut args = Vec::new();
    let mut i = at + 4;
    loop {
        match tokens.get(i).map(|t| &t.kind) {
            Some(TokenKind::Punct(')')) => break,
            Some(TokenKind::Punct(',')) => {
                i += 1;
            }
            Some(TokenKind::Word(w)) => {
                args.push(CallArg::Word(w.clone()));
                i += 1;
            }
            Some(TokenKind::Str(s)) => {
                args.push(CallArg::Str(s.clone()));
                i += 1;
            }
            Some(TokenKind::Number { text, is_float }) => {
                if *is_float {
                    args.push(CallArg::Float(text.parse().ok()?));
                } else {
                    args.push(CallArg::Integer(text.parse().ok()?));
                }
                i += 1;
            }
            _ => return None,
        }
    }

    Some(IntrinsicCallSyntax {
        name,
        name_span: name_token.span,
        args,
    })
}

/// If `tokens` contains a `@intrinsic("name", ...)` call whose name falls
/// outside the closed vocabulary, returns that name and its span.
/// [`parse_intrinsic_call`] treats such a line identically to one with no
/// call at all; this is the one place that distinguishes the two so a
/// diagnostic can be raised.
pub fn detect_unknown_intrinsic_name(tokens: &[Token]) -> Option<(String, Span)> {
    let at = tokens.iter().position(|t| t.is_punct('@'))?;
    if !tokens.get(at + 1).map(|t| t.is_word("intrinsic")).unwrap_or(false) {
        return None;
    }
    if !tokens.get(at + 2).map(|t| t.is_punct('(')).unwrap_or(false) {
        return None;
    }
    let name_token = tokens.get(at + 3)?;
    let name_text = match &name_token.kind {
        TokenKind::Str(s) => s.clone(),
        _ => return None,
    };
    if IntrinsicName::lookup(&name_text).is_some() {
        return None;
    }
    Some((name_text, name_token.span))
}
