//! Core utilities for gqlx.
//!
//! This crate provides foundational types used throughout gqlx:
//! - `span`: Source location tracking and line/column lookup
//! - `diagnostics`: Error reporting for documents

pub mod diagnostics;
pub mod span;

pub use diagnostics::{Diagnostic, DiagnosticBag, DiagnosticSeverity, Label};
pub use span::{LineColumn, LineIndex, Span};
