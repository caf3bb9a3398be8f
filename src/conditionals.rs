// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Lowering of conditional blocks.
//!
//! Conditional expressions arrive in postfix order. They are rewritten to
//! prefix form with an operand stack of owned strings: booleans push
//! `(<name>)`, a unary operator pops its operand, a binary operator pops the
//! right-hand side first. A well-formed expression leaves exactly one value.

use crate::error::TranslateError;
use crate::rules::{CondAtom, CondNode};
use crate::symbols::SymbolKind;
use crate::walker::Translator;

use std::io::Write;

impl<'p, W: Write> Translator<'p, W> {
    /// Lowers a decl's conditional nodes in order.
    pub(crate) fn conditional_nodes(
        &mut self,
        indent: usize,
        nodes: &[CondNode],
    ) -> Result<(), TranslateError> {
        for node in nodes {
            let expression = self.conditional_expression(node)?;
            let keyword = if node.tunable { "tunableif" } else { "booleanif" };
            self.out.line(indent, &format!("({keyword} {expression}"))?;

            if !node.true_rules.is_empty() {
                self.out.line(indent + 1, "(true")?;
                self.av_rule_list(indent + 2, &node.true_rules)?;
                self.out.line(indent + 1, ")")?;
            }

            if !node.false_rules.is_empty() {
                self.out.line(indent + 1, "(false")?;
                self.av_rule_list(indent + 2, &node.false_rules)?;
                self.out.line(indent + 1, ")")?;
            }

            self.out.line(indent, ")")?;
        }
        Ok(())
    }

    fn conditional_expression(&self, node: &CondNode) -> Result<String, TranslateError> {
        let db = self.db;
        let mut stack: Vec<String> = Vec::new();

        for atom in &node.expression {
            let value = match atom {
                CondAtom::Boolean(value) => {
                    format!("({})", db.value_name(SymbolKind::Boolean, *value)?)
                }
                CondAtom::Op(op) if op.is_unary() => {
                    let operand =
                        stack.pop().ok_or(TranslateError::MalformedConditionalExpression)?;
                    format!("({} {operand})", op.token())
                }
                CondAtom::Op(op) => {
                    let right =
                        stack.pop().ok_or(TranslateError::MalformedConditionalExpression)?;
                    let left =
                        stack.pop().ok_or(TranslateError::MalformedConditionalExpression)?;
                    format!("({} {left} {right})", op.token())
                }
            };
            stack.push(value);
        }

        let expression = stack.pop().ok_or(TranslateError::MalformedConditionalExpression)?;
        if !stack.is_empty() {
            return Err(TranslateError::MalformedConditionalExpression);
        }
        Ok(expression)
    }
}
