//! Type inference over resolved pattern matches.
//!
//! Most intrinsics are a pure function of their argument types and are
//! answered directly by [`threebx_intrinsics::check_pure_call`]; the
//! handful that touch mutable state or control flow — `store`, `load`,
//! `return`, `evaluate`, `execute`/`execute_if`, `loop_while` — are handled
//! here, where the resolver's [`Match`] tree gives us the structural
//! context a pure signature table can't.

use std::collections::HashMap;

use threebx_base::{Diagnostic, DiagnosticsBus, Span};
use threebx_intrinsics::{check_pure_call, pure_result_rule, InferredType, IntrinsicName};

use crate::arena_ctx::{CompilationArenas, DefinitionId};
use crate::pattern::trie::PatternTrie;
use crate::resolver::{match_statement, IntrinsicCall, Match, MatchedValue};
use crate::section::SectionKind;
use crate::token::Token;

/// Variable types across one definition's body. Flat, not nested: 3BX
/// variables are section-scoped, not block-scoped, so a single map per
/// top-level definition is enough.
#[derive(Debug, Default, Clone)]
pub struct TypeEnv {
    vars: HashMap<String, InferredType>,
}

impl TypeEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> InferredType {
        self.vars.get(name).copied().unwrap_or(InferredType::Unknown)
    }
}

/// Walks intrinsic calls bottom-up, inferring and recording types as it
/// goes. One instance is used per top-level definition being typed so that
/// `return_type` accumulates across every `return` the body reaches.
pub struct TypeInference<'a> {
    diagnostics: &'a mut DiagnosticsBus,
    trie: Option<&'a PatternTrie>,
    priority: Option<&'a HashMap<DefinitionId, usize>>,
    pub return_type: InferredType,
}

impl<'a> TypeInference<'a> {
    pub fn new(diagnostics: &'a mut DiagnosticsBus) -> Self {
        Self {
            diagnostics,
            trie: None,
            priority: None,
            return_type: InferredType::Unknown,
        }
    }

    /// Same as [`Self::new`], but carrying the resolved trie and priority
    /// ranks so a `{name}` lazy capture's [`MatchedValue::Thunk`] can be
    /// forced into a concrete type by re-matching its raw tokens as an
    /// Expression, instead of staying `Unknown` for the life of the call
    /// (the `Thunk⟨Bool⟩` requirement in the intrinsic signature table,
    /// e.g. `loop_while`'s condition, can't otherwise be checked against
    /// anything but a literal that happens not to be a thunk).
    pub fn with_trie(
        diagnostics: &'a mut DiagnosticsBus,
        trie: &'a PatternTrie,
        priority: &'a HashMap<DefinitionId, usize>,
    ) -> Self {
        Self {
            diagnostics,
            trie: Some(trie),
            priority: Some(priority),
            return_type: InferredType::Unknown,
        }
    }

    fn assign(&mut self, env: &mut TypeEnv, name: &str, ty: InferredType) {
        let previous = env.get(name);
        match previous.join(ty) {
            Ok(joined) => {
                env.vars.insert(name.to_string(), joined);
            }
            Err(conflict) => {
                self.diagnostics.push(Diagnostic::error(
                    format!("`{name}` was {}, now assigned {}", conflict.expected, conflict.found),
                    "<body>",
                    Span::new(0, 0),
                ));
            }
        }
    }

    pub fn infer_matched_value(
        &mut self,
        value: &MatchedValue,
        env: &mut TypeEnv,
        arenas: &CompilationArenas,
    ) -> InferredType {
        match value {
            MatchedValue::Integer(_) => InferredType::I64,
            MatchedValue::Float(_) => InferredType::F64,
            MatchedValue::String(_) => InferredType::String,
            MatchedValue::Identifier(name) => env.get(name),
            MatchedValue::Intrinsic(call) => self.infer_intrinsic(call, env, arenas),
            MatchedValue::Nested(m) => self.infer_match(m, env, arenas),
            MatchedValue::Thunk(tokens) => self.infer_thunk(tokens, env, arenas),
            MatchedValue::Section(_) => InferredType::Void,
        }
    }

    /// Forces a `{name}` lazy capture's raw tokens into a type by
    /// re-matching them as an Expression against the resolved trie. Yields
    /// `Unknown` when no trie/priority context was supplied (see
    /// [`Self::new`]) or when the tokens don't resolve to any Expression
    /// pattern — the same "no type yet" fallback as before this existed.
    fn infer_thunk(&mut self, tokens: &[Token], env: &mut TypeEnv, arenas: &CompilationArenas) -> InferredType {
        let (trie, priority) = match (self.trie, self.priority) {
            (Some(trie), Some(priority)) => (trie, priority),
            _ => return InferredType::Unknown,
        };
        // A scratch bus: forcing a thunk purely to type it is speculative,
        // not the final resolution of a program statement, so a no-match
        // here shouldn't duplicate a diagnostic the resolver already owns.
        let mut scratch = DiagnosticsBus::new();
        match match_statement(trie, arenas, tokens, None, &[SectionKind::Expression], priority, &mut scratch) {
            Some(m) => self.infer_match(&m, env, arenas),
            None => InferredType::Unknown,
        }
    }

    pub fn infer_match(&mut self, m: &Match, env: &mut TypeEnv, arenas: &CompilationArenas) -> InferredType {
        let mut result = InferredType::Void;
        for value in m.bindings.values() {
            let ty = self.infer_matched_value(value, env, arenas);
            result = result.join(ty).unwrap_or(result);
        }
        result
    }

    pub fn infer_intrinsic(&mut self, call: &IntrinsicCall, env: &mut TypeEnv, arenas: &CompilationArenas) -> InferredType {
        match call.name {
            IntrinsicName::Store => {
                let value_ty = call
                    .args
                    .get(1)
                    .map(|v| self.infer_matched_value(v, env, arenas))
                    .unwrap_or(InferredType::Unknown);
                if let Some(MatchedValue::Identifier(name)) = call.args.first() {
                    self.assign(env, name, value_ty);
                }
                InferredType::Void
            }
            IntrinsicName::Load => match call.args.first() {
                Some(MatchedValue::Identifier(name)) => env.get(name),
                _ => InferredType::Unknown,
            },
            IntrinsicName::Return => {
                let ty = call
                    .args
                    .first()
                    .map(|v| self.infer_matched_value(v, env, arenas))
                    .unwrap_or(InferredType::Void);
                self.return_type = self.return_type.join(ty).unwrap_or(ty);
                InferredType::Void
            }
            IntrinsicName::Evaluate | IntrinsicName::Execute | IntrinsicName::ExecuteIf => {
                for arg in &call.args {
                    self.infer_matched_value(arg, env, arenas);
                }
                InferredType::Void
            }
            IntrinsicName::LoopWhile => {
                if let Some(cond) = call.args.first() {
                    let cond_ty = self.infer_matched_value(cond, env, arenas);
                    if !matches!(cond_ty, InferredType::Bool | InferredType::Unknown) {
                        self.diagnostics.push(Diagnostic::error(
                            format!("loop condition must be boolean, found {cond_ty}"),
                            "<body>",
                            Span::new(0, 0),
                        ));
                    }
                }
                for arg in call.args.iter().skip(1) {
                    self.infer_matched_value(arg, env, arenas);
                }
                InferredType::Void
            }
            _ => {
                let arg_types: Vec<InferredType> = call
                    .args
                    .iter()
                    .map(|a| self.infer_matched_value(a, env, arenas))
                    .collect();
                match pure_result_rule(call.name) {
                    Some(_) => match check_pure_call(call.name, &arg_types) {
                        Ok(ty) => ty,
                        Err(found) => {
                            self.diagnostics.push(Diagnostic::error(
                                format!("type mismatch in call to `{}`: unexpected {found}", call.name),
                                "<body>",
                                Span::new(0, 0),
                            ));
                            InferredType::Unknown
                        }
                    },
                    None => InferredType::Unknown,
                }
            }
        }
    }
}
