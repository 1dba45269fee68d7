//! IR Assembly: turns a resolved, typed match tree into an intrinsic-call
//! tree. Code generation from this IR is out of scope here; this stage
//! exists to hand a downstream backend something it doesn't have to
//! re-derive from source text.

use std::collections::HashMap;

use threebx_base::{Diagnostic, DiagnosticsBus, Span};
use threebx_intrinsics::{InferredType, IntrinsicName};

use crate::arena_ctx::{CompilationArenas, DefinitionId, SectionId};
use crate::pattern::call::{self, CallArg};
use crate::pattern::trie::PatternTrie;
use crate::resolver::{collect_body_token_lines, IntrinsicCall, Match, MatchedValue};
use crate::token::Token;
use crate::types::{TypeEnv, TypeInference};

/// One resolved intrinsic call, with every argument already assembled.
#[derive(Debug, Clone)]
pub struct IrCall {
    pub name: IntrinsicName,
    pub args: Vec<IrValue>,
    pub result_type: InferredType,
}

#[derive(Debug, Clone)]
pub enum IrValue {
    Integer(i64),
    Float(f64),
    String(String),
    Identifier(String),
    Call(Box<IrCall>),
    Thunk(Thunk),
}

/// A captured-but-unevaluated expression, forced only when `evaluate` or
/// an `execute*` intrinsic reaches it.
#[derive(Debug, Clone)]
pub enum Thunk {
    /// A section capture — the indented block following a header line.
    Block(SectionId),
    /// A `{name}` lazy capture's raw token span.
    Lazy(Vec<Token>),
}

/// The assembled body of one top-level pattern definition.
#[derive(Debug, Clone)]
pub struct IrFunction {
    pub definition: DefinitionId,
    pub body: Vec<IrCall>,
    pub return_type: InferredType,
}

/// Assembles `definition`'s body into IR, running type inference over it
/// as it goes so every call carries a concrete `result_type`. `trie`/
/// `priority` are the resolver's finished output, threaded through so a
/// `{name}` lazy-capture thunk reached by `loop_while`/`execute_if` can be
/// forced into a type instead of staying `Unknown`.
pub fn assemble_function(
    definition: DefinitionId,
    arenas: &CompilationArenas,
    trie: &PatternTrie,
    priority: &HashMap<DefinitionId, usize>,
    diagnostics: &mut DiagnosticsBus,
) -> IrFunction {
    let mut calls = Vec::new();
    let mut return_type = InferredType::Unknown;

    if let Some(body) = arenas.definitions[definition].body {
        let body_lines = collect_body_token_lines(arenas, body);

        // Unknown-intrinsic names are reported up front, in their own pass,
        // so the diagnostic doesn't have to fight the mutable borrow a
        // `TypeInference` holds on `diagnostics` for the rest of assembly.
        for tokens in &body_lines {
            if call::parse_intrinsic_call(tokens).is_none() {
                if let Some((name, span)) = call::detect_unknown_intrinsic_name(tokens) {
                    diagnostics.push(Diagnostic::error(format!("Unknown intrinsic: {name}"), "<body>", span));
                }
            }
        }

        let mut inference = TypeInference::with_trie(diagnostics, trie, priority);
        let mut env = TypeEnv::new();
        let mut assembler = IrAssembler::new(&mut inference);
        for tokens in &body_lines {
            if let Some(syntax) = call::parse_intrinsic_call(tokens) {
                let intrinsic_call = raw_call_to_intrinsic_call(syntax.name, syntax.args);
                calls.push(assembler.assemble_call(&intrinsic_call, &mut env, arenas));
            }
        }
        return_type = inference.return_type;
    }

    IrFunction {
        definition,
        body: calls,
        return_type,
    }
}

fn raw_call_to_intrinsic_call(name: IntrinsicName, args: Vec<CallArg>) -> IntrinsicCall {
    IntrinsicCall {
        name,
        args: args.into_iter().map(raw_arg_to_matched).collect(),
    }
}

fn raw_arg_to_matched(arg: CallArg) -> MatchedValue {
    match arg {
        CallArg::Integer(i) => MatchedValue::Integer(i),
        CallArg::Float(f) => MatchedValue::Float(f),
        CallArg::Str(s) => MatchedValue::String(s),
        CallArg::Word(w) => MatchedValue::Identifier(w),
    }
}

/// Walks [`MatchedValue`] trees, delegating to a [`TypeInference`] for
/// result types so the two stay in lockstep instead of re-deriving each
/// other's conclusions.
pub struct IrAssembler<'ti, 'd> {
    inference: &'ti mut TypeInference<'d>,
}

impl<'ti, 'd> IrAssembler<'ti, 'd> {
    pub fn new(inference: &'ti mut TypeInference<'d>) -> Self {
        Self { inference }
    }

    pub fn assemble_value(&mut self, value: &MatchedValue, env: &mut TypeEnv, arenas: &CompilationArenas) -> IrValue {
        match value {
            MatchedValue::Integer(i) => IrValue::Integer(*i),
            MatchedValue::Float(f) => IrValue::Float(*f),
            MatchedValue::String(s) => IrValue::String(s.clone()),
            MatchedValue::Identifier(name) => IrValue::Identifier(name.clone()),
            MatchedValue::Intrinsic(call) => IrValue::Call(Box::new(self.assemble_call(call, env, arenas))),
            MatchedValue::Nested(m) => self.assemble_nested(m, env, arenas),
            MatchedValue::Thunk(tokens) => IrValue::Thunk(Thunk::Lazy(tokens.clone())),
            MatchedValue::Section(id) => IrValue::Thunk(Thunk::Block(*id)),
        }
    }

    pub fn assemble_call(&mut self, call: &IntrinsicCall, env: &mut TypeEnv, arenas: &CompilationArenas) -> IrCall {
        let args = call
            .args
            .iter()
            .map(|a| self.assemble_value(a, env, arenas))
            .collect();
        let result_type = self.inference.infer_intrinsic(call, env, arenas);
        IrCall {
            name: call.name,
            args,
            result_type,
        }
    }

    /// A nested pattern instance's value is its own body, with every bare
    /// reference to one of its header parameters replaced by the value
    /// bound at this call site — term-rewriting, not evaluation, since no
    /// intrinsic is actually executed here.
    pub(crate) fn assemble_nested(&mut self, m: &Match, env: &mut TypeEnv, arenas: &CompilationArenas) -> IrValue {
        let body = match arenas.definitions[m.definition].body {
            Some(b) => b,
            None => return IrValue::Identifier(String::new()),
        };

        let mut last = IrValue::Identifier(String::new());
        for tokens in collect_body_token_lines(arenas, body) {
            if let Some(syntax) = call::parse_intrinsic_call(&tokens) {
                let substituted = substitute_call_args(syntax.name, syntax.args, m);
                last = IrValue::Call(Box::new(self.assemble_call(&substituted, env, arenas)));
            }
        }
        last
    }
}

fn substitute_call_args(name: IntrinsicName, args: Vec<CallArg>, m: &Match) -> IntrinsicCall {
    let args = args
        .into_iter()
        .map(|arg| match arg {
            CallArg::Word(w) => m.bindings.get(&w).cloned().unwrap_or(MatchedValue::Identifier(w)),
            other => raw_arg_to_matched(other),
        })
        .collect();
    IntrinsicCall { name, args }
}
