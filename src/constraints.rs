// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Lowering of constraint and validatetrans expressions.
//!
//! The stack rewrite mirrors the conditional lowering, with a richer leaf
//! vocabulary: attribute comparisons over the implicit context attributes
//! (u1/u2/u3, r1/r2/r3, t1/t2/t3 and the level pairs) and membership tests
//! against name sets. Membership tests over types go through the set
//! expander and may synthesize attributes ahead of the constraint line.

use crate::error::TranslateError;
use crate::policy::PermissionDecoder as _;
use crate::rules::{Constraint, ConstraintAtom, ConstraintNames};
use crate::symbols::{ClassDatum, SymbolKind};
use crate::walker::Translator;

use std::io::Write;

impl<'p, W: Write> Translator<'p, W> {
    /// Lowers a class's constraint (or validatetrans) list. `is_constrain`
    /// selects the wrapper: constrain carries the constrained permissions,
    /// validatetrans only the class.
    pub(crate) fn class_constraints(
        &mut self,
        indent: usize,
        class_name: &str,
        class: &ClassDatum,
        nodes: &[Constraint],
        is_constrain: bool,
    ) -> Result<(), TranslateError> {
        let db = self.db;
        let mls = if db.mls { "mls" } else { "" };

        for node in nodes {
            let expression = self.constraint_expression(indent, &node.expression)?;
            if is_constrain {
                let perms = db.permission_names(class.value, node.permissions)?;
                self.out.line(
                    indent,
                    &format!(
                        "({mls}constrain ({class_name} ({})) {expression})",
                        perms.join(" "),
                    ),
                )?;
            } else {
                self.out.line(
                    indent,
                    &format!("({mls}validatetrans {class_name} {expression})"),
                )?;
            }
        }
        Ok(())
    }

    fn constraint_expression(
        &mut self,
        indent: usize,
        atoms: &[ConstraintAtom],
    ) -> Result<String, TranslateError> {
        let mut stack: Vec<String> = Vec::new();

        for atom in atoms {
            let value = match atom {
                ConstraintAtom::Attribute { op, attr } => {
                    let (left, right) = attr.tokens();
                    if right.is_empty() {
                        format!("({} {left})", op.token())
                    } else {
                        format!("({} {left} {right})", op.token())
                    }
                }
                ConstraintAtom::Names { op, attr, names } => {
                    let (left, _) = attr.tokens();
                    let resolved = match names {
                        ConstraintNames::Types(set) => self.type_set_names(indent, set)?,
                        ConstraintNames::Roles(map) => self.bitmap_names(SymbolKind::Role, map)?,
                        ConstraintNames::Users(map) => self.bitmap_names(SymbolKind::User, map)?,
                    };
                    format!("({} {left} {})", op.token(), resolved.join(" "))
                }
                ConstraintAtom::Not => {
                    let operand =
                        stack.pop().ok_or(TranslateError::MalformedConstraintExpression)?;
                    format!("(not {operand})")
                }
                ConstraintAtom::And | ConstraintAtom::Or => {
                    let token = if matches!(atom, ConstraintAtom::And) { "and" } else { "or" };
                    let right =
                        stack.pop().ok_or(TranslateError::MalformedConstraintExpression)?;
                    let left =
                        stack.pop().ok_or(TranslateError::MalformedConstraintExpression)?;
                    format!("({token} {left} {right})")
                }
            };
            stack.push(value);
        }

        let expression = stack.pop().ok_or(TranslateError::MalformedConstraintExpression)?;
        if !stack.is_empty() {
            return Err(TranslateError::MalformedConstraintExpression);
        }
        Ok(expression)
    }
}
