// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::symbols::SymbolKind;

use thiserror::Error;

/// Structured errors that may be encountered translating a decoded policy
/// into CIL. Every variant is fatal: translation stops at the first error.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("failed to write translated policy: {0}")]
    Io(#[from] std::io::Error),
    #[error("expected a {kind} symbol at index {index}, but the table holds {len} entries")]
    UnknownSymbolIndex { kind: SymbolKind, index: u32, len: usize },
    #[error("expected a nonzero {kind} value")]
    NullSymbolValue { kind: SymbolKind },
    #[error("expected a datum for {kind} {name:?}, but none is defined")]
    MissingDatum { kind: SymbolKind, name: String },
    #[error("expected a scope record for {kind} {name:?}, but none is defined")]
    MissingScope { kind: SymbolKind, name: String },
    #[error("expected conditional expression to reduce to a single value")]
    MalformedConditionalExpression,
    #[error("expected constraint expression to reduce to a single value")]
    MalformedConstraintExpression,
    #[error("expected permission bit {bit:#x} of class {class:?} to name a permission, but none matched")]
    UnknownPermissionBit { class: String, bit: u32 },
    #[error("expected an initial sid id below {limit}, but found {sid}")]
    UnknownInitialSid { sid: u32, limit: usize },
    #[error("expected a known policy capability id, but found {id}")]
    UnknownPolicyCapability { id: u32 },
    #[error("synthesized attribute counter overflowed")]
    AttributeCounterOverflow,
    #[error("invalid {table} line: {line:?}")]
    InvalidSidecarLine { table: &'static str, line: String },
}

impl TranslateError {
    pub(crate) fn invalid_line(table: &'static str, line: &[u8]) -> Self {
        TranslateError::InvalidSidecarLine {
            table,
            line: String::from_utf8_lossy(line).into_owned(),
        }
    }
}
