// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Lowering of access-vector rules, type rules, and the transition rule
//! families.

use crate::contexts::SensitivityOffset;
use crate::error::TranslateError;
use crate::policy::PermissionDecoder as _;
use crate::rules::{
    AvRule, AvRulePayload, FilenameTransitionRule, RangeTransitionRule, RoleAllowRule,
    RoleTransitionRule,
};
use crate::symbols::SymbolKind;
use crate::walker::Translator;

use std::io::Write;

impl<'p, W: Write> Translator<'p, W> {
    /// Lowers a list of AV rules. Each rule expands to one line per
    /// (source, target, class) combination; a rule with the self flag set
    /// additionally emits a `self` target per source and class node.
    pub(crate) fn av_rule_list(
        &mut self,
        indent: usize,
        rules: &[AvRule],
    ) -> Result<(), TranslateError> {
        for rule in rules {
            let sources = self.type_set_names(indent, &rule.source)?;
            let targets = self.type_set_names(indent, &rule.target)?;
            for source in &sources {
                for target in &targets {
                    self.av_rule_lines(indent, rule, source, target)?;
                }
                if rule.self_target {
                    self.av_rule_lines(indent, rule, source, "self")?;
                }
            }
        }
        Ok(())
    }

    /// Emits one rule line per class node of `rule` for a resolved
    /// source/target pair.
    fn av_rule_lines(
        &mut self,
        indent: usize,
        rule: &AvRule,
        source: &str,
        target: &str,
    ) -> Result<(), TranslateError> {
        let db = self.db;
        match &rule.payload {
            AvRulePayload::Access { kind, perms } => {
                for node in perms {
                    let class = db.value_name(SymbolKind::Class, node.class)?;
                    let perms = db.permission_names(node.class, node.permissions)?;
                    self.out.line(
                        indent,
                        &format!(
                            "({} {source} {target} ({class} ({})))",
                            kind.keyword(),
                            perms.join(" "),
                        ),
                    )?;
                }
            }
            AvRulePayload::TypeRule { kind, types } => {
                for node in types {
                    let class = db.value_name(SymbolKind::Class, node.class)?;
                    let new_type = db.value_name(SymbolKind::Type, node.new_type)?;
                    self.out.line(
                        indent,
                        &format!("({} {source} {target} {class} {new_type})", kind.keyword()),
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Lowers role transitions: one line per (role, type, class) element of
    /// the rule's cross product.
    pub(crate) fn role_transitions(
        &mut self,
        indent: usize,
        rules: &[RoleTransitionRule],
    ) -> Result<(), TranslateError> {
        let db = self.db;
        for rule in rules {
            let roles = self.role_set_names(indent, &rule.roles)?;
            let types = self.type_set_names(indent, &rule.types)?;
            let new_role = db.value_name(SymbolKind::Role, rule.new_role)?;
            for role in &roles {
                for type_ in &types {
                    for class_bit in rule.classes.iter() {
                        let class = db.symbol_name(SymbolKind::Class, class_bit)?;
                        self.out.line(
                            indent,
                            &format!("(roletransition {role} {type_} {class} {new_role})"),
                        )?;
                    }
                }
            }
        }
        Ok(())
    }

    pub(crate) fn role_allows(
        &mut self,
        indent: usize,
        rules: &[RoleAllowRule],
    ) -> Result<(), TranslateError> {
        for rule in rules {
            let roles = self.role_set_names(indent, &rule.roles)?;
            let new_roles = self.role_set_names(indent, &rule.new_roles)?;
            for role in &roles {
                for new_role in &new_roles {
                    self.out.line(indent, &format!("(roleallow {role} {new_role})"))?;
                }
            }
        }
        Ok(())
    }

    /// Lowers range transitions. Meaningful only under MLS; otherwise the
    /// rules are skipped wholesale.
    pub(crate) fn range_transitions(
        &mut self,
        indent: usize,
        rules: &[RangeTransitionRule],
    ) -> Result<(), TranslateError> {
        let db = self.db;
        if !db.mls {
            return Ok(());
        }
        for rule in rules {
            let sources = self.type_set_names(indent, &rule.source)?;
            let targets = self.type_set_names(indent, &rule.target)?;
            let range = self.render_semantic_range(&rule.range, SensitivityOffset::Value)?;
            for source in &sources {
                for target in &targets {
                    for class_bit in rule.classes.iter() {
                        let class = db.symbol_name(SymbolKind::Class, class_bit)?;
                        self.out.line(
                            indent,
                            &format!("(rangetransition {source} {target} {class} ({range}))"),
                        )?;
                    }
                }
            }
        }
        Ok(())
    }

    pub(crate) fn filename_transitions(
        &mut self,
        indent: usize,
        rules: &[FilenameTransitionRule],
    ) -> Result<(), TranslateError> {
        let db = self.db;
        for rule in rules {
            let sources = self.type_set_names(indent, &rule.source)?;
            let targets = self.type_set_names(indent, &rule.target)?;
            let class = db.value_name(SymbolKind::Class, rule.class)?;
            let new_type = db.value_name(SymbolKind::Type, rule.new_type)?;
            for source in &sources {
                for target in &targets {
                    self.out.line(
                        indent,
                        &format!(
                            "(typetransition {source} {target} {class} \"{}\" {new_type})",
                            rule.filename,
                        ),
                    )?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyDatabase;
    use crate::rules::{AccessKind, ClassNewType, ClassPermissionBits, RoleSet, TypeRuleKind, TypeSet};
    use crate::symbols::{ClassDatum, PermissionDatum, RoleDatum, TypeDatum};

    fn database() -> PolicyDatabase {
        let mut db = PolicyDatabase::default();
        db.classes.insert(
            "file",
            ClassDatum {
                value: 1,
                permissions: vec![
                    PermissionDatum::new("read", 1),
                    PermissionDatum::new("write", 2),
                ],
                ..Default::default()
            },
        );
        db.classes.insert(
            "process",
            ClassDatum {
                value: 2,
                permissions: vec![PermissionDatum::new("transition", 1)],
                ..Default::default()
            },
        );
        for (i, name) in ["alpha", "beta", "gamma"].into_iter().enumerate() {
            db.types.insert(name, TypeDatum { value: i as u32 + 1, ..Default::default() });
        }
        for (i, name) in ["object_r", "r1", "r2"].into_iter().enumerate() {
            db.roles.insert(name, RoleDatum { value: i as u32 + 1, ..Default::default() });
        }
        db
    }

    fn lower(db: &PolicyDatabase, f: impl FnOnce(&mut Translator<'_, &mut Vec<u8>>)) -> String {
        let mut out = Vec::new();
        let mut translator = Translator::for_tests(db, &mut out);
        f(&mut translator);
        String::from_utf8(out).expect("utf8")
    }

    fn types(bits: &[u32]) -> TypeSet {
        TypeSet { types: bits.iter().copied().collect(), ..Default::default() }
    }

    #[test]
    fn allow_rule_expands_cross_product() {
        let db = database();
        let rule = AvRule {
            source: types(&[0, 1]),
            target: types(&[2]),
            self_target: false,
            payload: AvRulePayload::Access {
                kind: AccessKind::Allow,
                perms: vec![ClassPermissionBits { class: 1, permissions: 0b11 }],
            },
        };
        let emitted = lower(&db, |t| t.av_rule_list(0, &[rule]).expect("rules"));
        assert_eq!(
            "(allow alpha gamma (file (read write)))\n\
             (allow beta gamma (file (read write)))\n",
            emitted,
        );
    }

    #[test]
    fn self_flag_adds_one_rule_per_source_and_class_node() {
        let db = database();
        let rule = AvRule {
            source: types(&[0, 1]),
            target: TypeSet::default(),
            self_target: true,
            payload: AvRulePayload::Access {
                kind: AccessKind::Allow,
                perms: vec![ClassPermissionBits { class: 1, permissions: 0b1 }],
            },
        };
        let emitted = lower(&db, |t| t.av_rule_list(0, &[rule]).expect("rules"));
        // No resolvable targets: only the self rules appear.
        assert_eq!(
            "(allow alpha self (file (read)))\n\
             (allow beta self (file (read)))\n",
            emitted,
        );
    }

    #[test]
    fn type_rules_take_a_new_type_payload() {
        let db = database();
        let rule = AvRule {
            source: types(&[0]),
            target: types(&[1]),
            self_target: false,
            payload: AvRulePayload::TypeRule {
                kind: TypeRuleKind::Transition,
                types: vec![ClassNewType { class: 2, new_type: 3 }],
            },
        };
        let emitted = lower(&db, |t| t.av_rule_list(0, &[rule]).expect("rules"));
        assert_eq!("(typetransition alpha beta process gamma)\n", emitted);
    }

    #[test]
    fn role_transition_covers_types_and_classes() {
        let db = database();
        let rule = RoleTransitionRule {
            roles: RoleSet { roles: [1u32].into_iter().collect(), ..Default::default() },
            types: types(&[0, 1]),
            classes: [0u32, 1].into_iter().collect(),
            new_role: 3,
        };
        let emitted = lower(&db, |t| t.role_transitions(0, &[rule]).expect("rules"));
        assert_eq!(
            "(roletransition r1 alpha file r2)\n\
             (roletransition r1 alpha process r2)\n\
             (roletransition r1 beta file r2)\n\
             (roletransition r1 beta process r2)\n",
            emitted,
        );
    }

    #[test]
    fn range_transitions_are_skipped_without_mls() {
        let db = database();
        let rule = RangeTransitionRule {
            source: types(&[0]),
            target: types(&[1]),
            classes: [0u32].into_iter().collect(),
            ..Default::default()
        };
        let emitted = lower(&db, |t| t.range_transitions(0, &[rule]).expect("rules"));
        assert_eq!("", emitted);
    }

    #[test]
    fn filename_transition_quotes_the_filename() {
        let db = database();
        let rule = FilenameTransitionRule {
            source: types(&[0]),
            target: types(&[1]),
            class: 1,
            filename: "resolv.conf".to_owned(),
            new_type: 3,
        };
        let emitted = lower(&db, |t| t.filename_transitions(0, &[rule]).expect("rules"));
        assert_eq!("(typetransition alpha beta file \"resolv.conf\" gamma)\n", emitted);
    }
}
