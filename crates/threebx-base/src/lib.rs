#![cfg_attr(docsrs, feature(doc_cfg))]

//! # threebx-base
//!
//! Pure structural atoms shared across the 3BX compiler front end.
//!
//! This crate has **no knowledge of 3BX syntax, the intrinsic vocabulary, or
//! I/O**. It provides only generic, reusable infrastructure that higher
//! level crates build on:
//!
//! - [`IndexArena`]/[`Id`] — dense storage addressed by `Copy` handles, for
//!   structures with back-references (sections, pattern definitions, trie
//!   nodes)
//! - [`Span`] — byte-offset source location tracking
//! - [`SpannedError`]/[`Result`] — single-shot errors with a source position
//! - [`Diagnostic`]/[`DiagnosticsBus`] — the shared, append-only diagnostics
//!   sink every pipeline stage reports through

pub mod diagnostic;
pub mod error;
pub mod index_arena;
pub mod span;

pub use diagnostic::{Diagnostic, DiagnosticSeverity, DiagnosticsBus};
pub use error::{Result, SpannedError};
pub use index_arena::{Id, IndexArena};
pub use span::Span;
