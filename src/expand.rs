// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Expansion of type and role sets into name lists.
//!
//! The target language has no anonymous positive/negative/complemented sets,
//! so any set carrying a negation or flags is replaced by a freshly declared
//! attribute whose attributeset expression matches the set: `(and P (not N))`
//! for a positive part minus a negative part, wrapped in `(not ...)` when the
//! set is complemented.

use crate::bitmap::Bitmap;
use crate::error::TranslateError;
use crate::rules::{RoleSet, SetFlags, TypeSet};
use crate::symbols::SymbolKind;
use crate::walker::Translator;

use std::io::Write;

impl<'p, W: Write> Translator<'p, W> {
    /// Resolves a type set to a list of names, synthesizing an attribute
    /// when the set cannot be expressed as a plain list.
    pub(crate) fn type_set_names(
        &mut self,
        indent: usize,
        set: &TypeSet,
    ) -> Result<Vec<String>, TranslateError> {
        if !set.negative.is_empty() || !set.flags.is_empty() {
            self.synthesize_set_attribute(
                indent,
                SymbolKind::Type,
                &set.types,
                Some(&set.negative),
                set.flags,
            )
        } else {
            self.bitmap_names(SymbolKind::Type, &set.types)
        }
    }

    /// Resolves a role set to a list of names. Role sets carry no negative
    /// part; only flags force attribute synthesis.
    pub(crate) fn role_set_names(
        &mut self,
        indent: usize,
        set: &RoleSet,
    ) -> Result<Vec<String>, TranslateError> {
        if !set.flags.is_empty() {
            self.synthesize_set_attribute(indent, SymbolKind::Role, &set.roles, None, set.flags)
        } else {
            self.bitmap_names(SymbolKind::Role, &set.roles)
        }
    }

    /// Resolves the set bits of `map` to names of `kind`, in bit order.
    pub(crate) fn bitmap_names(
        &self,
        kind: SymbolKind,
        map: &Bitmap,
    ) -> Result<Vec<String>, TranslateError> {
        let db = self.db;
        map.iter().map(|bit| db.symbol_name(kind, bit).map(str::to_owned)).collect()
    }

    /// Declares a fresh attribute equivalent to the given set and returns
    /// its name as a single-element list. The counter is shared between type
    /// and role synthesis so generated names never collide.
    fn synthesize_set_attribute(
        &mut self,
        indent: usize,
        kind: SymbolKind,
        positive: &Bitmap,
        negative: Option<&Bitmap>,
        flags: SetFlags,
    ) -> Result<Vec<String>, TranslateError> {
        let (statement, infix) = match kind {
            SymbolKind::Role => ("role", "_roleattr_"),
            _ => ("type", "_typeattr_"),
        };

        self.attrs_synthesized = self
            .attrs_synthesized
            .checked_add(1)
            .ok_or(TranslateError::AttributeCounterOverflow)?;
        let attr = format!("{}{}{}", self.module_name, infix, self.attrs_synthesized);

        let positive_names = self.bitmap_names(kind, positive)?;
        let negative_names = match negative {
            Some(map) => self.bitmap_names(kind, map)?,
            None => Vec::new(),
        };

        let inner = if !positive_names.is_empty() && !negative_names.is_empty() {
            format!("(and ({}) (not ({})))", positive_names.join(" "), negative_names.join(" "))
        } else if !positive_names.is_empty() {
            format!("({})", positive_names.join(" "))
        } else if !negative_names.is_empty() {
            format!("(not ({}))", negative_names.join(" "))
        } else {
            String::new()
        };

        let mut body = if flags.contains(SetFlags::STAR) {
            if inner.is_empty() {
                "(all)".to_owned()
            } else {
                format!("(all) {inner}")
            }
        } else {
            inner
        };
        if flags.contains(SetFlags::COMP) {
            if body.is_empty() {
                body = "()".to_owned();
            }
            body = format!("(not {body})");
        }

        self.out.line(indent, &format!("({statement}attribute {attr})"))?;
        self.out.line(indent, &format!("({statement}attributeset {attr} {body})"))?;

        Ok(vec![attr])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyDatabase;
    use crate::symbols::{RoleDatum, TypeDatum};
    use crate::walker::Translator;

    fn database() -> PolicyDatabase {
        let mut db = PolicyDatabase::default();
        for (i, name) in ["alpha", "beta", "gamma"].into_iter().enumerate() {
            db.types.insert(name, TypeDatum { value: i as u32 + 1, ..Default::default() });
        }
        db.roles.insert("object_r", RoleDatum { value: 1, ..Default::default() });
        db.roles.insert("staff_r", RoleDatum { value: 2, ..Default::default() });
        db
    }

    fn with_translator(
        db: &PolicyDatabase,
        f: impl FnOnce(&mut Translator<'_, &mut Vec<u8>>) -> Vec<String>,
    ) -> (Vec<String>, String) {
        let mut out = Vec::new();
        let mut translator = Translator::for_tests(db, &mut out);
        let names = f(&mut translator);
        (names, String::from_utf8(out).expect("utf8"))
    }

    #[test]
    fn plain_set_expands_to_names() {
        let db = database();
        let set = TypeSet { types: [0u32, 2].into_iter().collect(), ..Default::default() };
        let (names, emitted) =
            with_translator(&db, |t| t.type_set_names(0, &set).expect("names"));
        assert_eq!(vec!["alpha".to_owned(), "gamma".to_owned()], names);
        assert_eq!("", emitted);
    }

    #[test]
    fn negative_set_synthesizes_attribute() {
        let db = database();
        let set = TypeSet {
            types: [0u32, 1].into_iter().collect(),
            negative: [2u32].into_iter().collect(),
            flags: SetFlags::empty(),
        };
        let (names, emitted) =
            with_translator(&db, |t| t.type_set_names(0, &set).expect("names"));
        assert_eq!(vec!["base_typeattr_1".to_owned()], names);
        assert_eq!(
            "(typeattribute base_typeattr_1)\n\
             (typeattributeset base_typeattr_1 (and (alpha beta) (not (gamma))))\n",
            emitted,
        );
    }

    #[test]
    fn star_and_complement_wrap_all() {
        let db = database();
        let set = TypeSet {
            types: Bitmap::new(),
            negative: Bitmap::new(),
            flags: SetFlags::STAR | SetFlags::COMP,
        };
        let (names, emitted) =
            with_translator(&db, |t| t.type_set_names(0, &set).expect("names"));
        assert_eq!(vec!["base_typeattr_1".to_owned()], names);
        assert_eq!(
            "(typeattribute base_typeattr_1)\n\
             (typeattributeset base_typeattr_1 (not (all)))\n",
            emitted,
        );
    }

    #[test]
    fn counter_is_shared_between_type_and_role_synthesis() {
        let db = database();
        let type_set = TypeSet {
            types: [0u32].into_iter().collect(),
            negative: [1u32].into_iter().collect(),
            flags: SetFlags::empty(),
        };
        let role_set = RoleSet {
            roles: [1u32].into_iter().collect(),
            flags: SetFlags::COMP,
        };
        let mut out = Vec::new();
        let mut translator = Translator::for_tests(&db, &mut out);
        assert_eq!(
            vec!["base_typeattr_1".to_owned()],
            translator.type_set_names(0, &type_set).expect("type names"),
        );
        assert_eq!(
            vec!["base_roleattr_2".to_owned()],
            translator.role_set_names(0, &role_set).expect("role names"),
        );
        let emitted = String::from_utf8(out).expect("utf8");
        assert!(emitted.contains("(roleattribute base_roleattr_2)"));
        assert!(emitted.contains("(roleattributeset base_roleattr_2 (not (staff_r)))"));
    }
}
