// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Per-kind lowering of symbol declarations.
//!
//! Each scoped symbol kind lowers through one method here, dispatched over
//! [`SymbolDatumRef`]. The scope kind a name was bound with decides how much
//! of the declaration appears: required names repeat only the constructs a
//! require block may carry.

use crate::contexts::SensitivityOffset;
use crate::error::TranslateError;
use crate::policy::{PolicyDatabase, PolicyType};
use crate::symbols::{
    BooleanDatum, CategoryDatum, ClassDatum, CommonDatum, LevelDatum, RoleDatum, RoleFlavor,
    ScopeKind, SymbolKind, TypeDatum, TypeFlavor, UserDatum,
};
use crate::walker::{Translator, DEFAULT_LEVEL, DEFAULT_OBJECT};

use std::io::Write;

/// A reference to one scoped symbol's datum, tagged by kind.
#[derive(Clone, Copy, Debug)]
pub(crate) enum SymbolDatumRef<'p> {
    Class(&'p ClassDatum),
    Role(&'p RoleDatum),
    Type(&'p TypeDatum),
    User(&'p UserDatum),
    Boolean(&'p BooleanDatum),
    Sensitivity(&'p LevelDatum),
    Category(&'p CategoryDatum),
}

impl PolicyDatabase {
    /// Looks up the datum for a scoped symbol by kind and name.
    pub(crate) fn scoped_symbol(&self, kind: SymbolKind, name: &str) -> Option<SymbolDatumRef<'_>> {
        match kind {
            SymbolKind::Common => None,
            SymbolKind::Class => self.classes.get(name).map(SymbolDatumRef::Class),
            SymbolKind::Role => self.roles.get(name).map(SymbolDatumRef::Role),
            SymbolKind::Type => self.types.get(name).map(SymbolDatumRef::Type),
            SymbolKind::User => self.users.get(name).map(SymbolDatumRef::User),
            SymbolKind::Boolean => self.booleans.get(name).map(SymbolDatumRef::Boolean),
            SymbolKind::Sensitivity => self.sensitivities.get(name).map(SymbolDatumRef::Sensitivity),
            SymbolKind::Category => self.categories.get(name).map(SymbolDatumRef::Category),
        }
    }
}

impl<'p, W: Write> Translator<'p, W> {
    /// Lowers one symbol declaration. `in_optional` reflects the enclosing
    /// block; user declarations need it for their sensitivity offset.
    pub(crate) fn lower_symbol(
        &mut self,
        indent: usize,
        in_optional: bool,
        name: &str,
        datum: SymbolDatumRef<'p>,
        scope: ScopeKind,
    ) -> Result<(), TranslateError> {
        match datum {
            SymbolDatumRef::Class(class) => self.class_declaration(indent, name, class, scope),
            SymbolDatumRef::Role(role) => self.role_declaration(indent, name, role, scope),
            SymbolDatumRef::Type(type_) => self.type_declaration(indent, name, type_, scope),
            SymbolDatumRef::User(user) => {
                self.user_declaration(indent, in_optional, name, user, scope)
            }
            SymbolDatumRef::Boolean(boolean) => {
                self.boolean_declaration(indent, name, boolean, scope)
            }
            SymbolDatumRef::Sensitivity(level) => {
                self.sensitivity_declaration(indent, name, level, scope)
            }
            SymbolDatumRef::Category(category) => {
                self.category_declaration(indent, name, category, scope)
            }
        }
    }

    fn class_declaration(
        &mut self,
        indent: usize,
        name: &str,
        class: &'p ClassDatum,
        scope: ScopeKind,
    ) -> Result<(), TranslateError> {
        if scope == ScopeKind::Required {
            return Ok(());
        }

        let own_perms: Vec<&str> =
            class.permissions.iter().map(|perm| perm.name.as_str()).collect();
        self.out.line(indent, &format!("(class {name} ({}))", own_perms.join(" ")))?;

        if let Some(common) = &class.common {
            self.out.line(indent, &format!("(classcommon {name} {common})"))?;
        }

        if let Some(default) = class.default_user {
            self.out.line(indent, &format!("(defaultuser {name} {})", default.token()))?;
        }
        if let Some(default) = class.default_role {
            self.out.line(indent, &format!("(defaultrole {name} {})", default.token()))?;
        }
        if let Some(default) = class.default_type {
            self.out.line(indent, &format!("(defaulttype {name} {})", default.token()))?;
        }
        if let Some(default) = class.default_range {
            self.out.line(indent, &format!("(defaultrange {name} {})", default.token()))?;
        }

        self.class_constraints(indent, name, class, &class.constraints, true)?;
        self.class_constraints(indent, name, class, &class.validatetrans, false)?;

        Ok(())
    }

    fn role_declaration(
        &mut self,
        indent: usize,
        name: &str,
        role: &'p RoleDatum,
        scope: ScopeKind,
    ) -> Result<(), TranslateError> {
        let db = self.db;
        match role.flavor {
            RoleFlavor::Role => {
                if scope == ScopeKind::Declared && db.policy_type == PolicyType::Module {
                    // Module roles are declared again in base, and the
                    // target language rejects duplicate declarations: emit
                    // only the bare declaration here. The role's type
                    // associations are reconstructed per decl.
                    self.out.line(indent, &format!("(role {name})"))?;
                    return Ok(());
                }

                if role.dominates.cardinality() > 1 {
                    tracing::warn!(
                        role = name,
                        "role dominance is unsupported in the target language; \
                         dropping from output"
                    );
                }

                let types = self.type_set_names(indent, &role.types)?;
                for type_ in &types {
                    self.out.line(indent, &format!("(roletype {name} {type_})"))?;
                }

                if role.bounds > 0 {
                    let bound = db.value_name(SymbolKind::Role, role.bounds)?;
                    self.out.line(indent, &format!("(rolebounds {name} {bound})"))?;
                }
            }
            RoleFlavor::Attribute => {
                if scope == ScopeKind::Declared {
                    self.out.line(indent, &format!("(roleattribute {name})"))?;
                }

                if !role.roles.is_empty() {
                    let members = self.bitmap_names(SymbolKind::Role, &role.roles)?;
                    self.out.line(
                        indent,
                        &format!("(roleattributeset {name} ({}))", members.join(" ")),
                    )?;
                }

                let types = self.type_set_names(indent, &role.types)?;
                for type_ in &types {
                    self.out.line(indent, &format!("(roletype {name} {type_})"))?;
                }
            }
        }
        Ok(())
    }

    pub(crate) fn type_declaration(
        &mut self,
        indent: usize,
        name: &str,
        type_: &'p TypeDatum,
        scope: ScopeKind,
    ) -> Result<(), TranslateError> {
        let db = self.db;
        match type_.flavor {
            TypeFlavor::Type => {
                if scope == ScopeKind::Declared {
                    if type_.primary {
                        self.out.line(indent, &format!("(type {name})"))?;
                        // object_r is implicit in the legacy toolchain but
                        // not here; its roletype lines are spelled out.
                        self.out.line(indent, &format!("(roletype {DEFAULT_OBJECT} {name})"))?;
                    } else {
                        let actual = db.value_name(SymbolKind::Type, type_.value)?;
                        self.out.line(indent, &format!("(typealias {name})"))?;
                        self.out.line(indent, &format!("(typealiasactual {name} {actual})"))?;
                    }
                }

                if type_.permissive {
                    self.out.line(indent, &format!("(typepermissive {name})"))?;
                }

                if type_.bounds > 0 {
                    let bound = db.value_name(SymbolKind::Type, type_.bounds)?;
                    self.out.line(indent, &format!("(typebounds {bound} {name})"))?;
                }
            }
            TypeFlavor::Attribute => {
                if scope == ScopeKind::Declared {
                    self.out.line(indent, &format!("(typeattribute {name})"))?;
                }

                if !type_.types.is_empty() {
                    let members = self.bitmap_names(SymbolKind::Type, &type_.types)?;
                    self.out.line(
                        indent,
                        &format!("(typeattributeset {name} ({}))", members.join(" ")),
                    )?;
                }
            }
        }
        Ok(())
    }

    fn user_declaration(
        &mut self,
        indent: usize,
        in_optional: bool,
        name: &str,
        user: &'p UserDatum,
        scope: ScopeKind,
    ) -> Result<(), TranslateError> {
        let db = self.db;
        if scope == ScopeKind::Declared {
            self.out.line(indent, &format!("(user {name})"))?;
            self.out.line(indent, &format!("(userrole {name} {DEFAULT_OBJECT})"))?;
        }

        let roles = self.bitmap_names(SymbolKind::Role, &user.roles)?;
        for role in &roles {
            self.out.line(indent, &format!("(userrole {name} {role})"))?;
        }

        // Sensitivity numbers in user statements inside optional blocks are
        // already zero-based.
        let offset =
            if in_optional { SensitivityOffset::Index } else { SensitivityOffset::Value };

        if db.mls {
            let level = self.render_semantic_level(&user.default_level, offset)?;
            self.out.line(indent, &format!("(userlevel {name} {level})"))?;
            let range = self.render_semantic_range(&user.range, offset)?;
            self.out.line(indent, &format!("(userrange {name} ({range}))"))?;
        } else {
            self.out.line(indent, &format!("(userlevel {name} {DEFAULT_LEVEL})"))?;
            self.out
                .line(indent, &format!("(userrange {name} ({DEFAULT_LEVEL} {DEFAULT_LEVEL}))"))?;
        }

        Ok(())
    }

    fn boolean_declaration(
        &mut self,
        indent: usize,
        name: &str,
        boolean: &BooleanDatum,
        scope: ScopeKind,
    ) -> Result<(), TranslateError> {
        if scope != ScopeKind::Declared {
            return Ok(());
        }
        let keyword = if boolean.tunable { "tunable" } else { "boolean" };
        self.out.line(indent, &format!("({keyword} {name} {})", boolean.state))?;
        Ok(())
    }

    fn sensitivity_declaration(
        &mut self,
        indent: usize,
        name: &str,
        level: &'p LevelDatum,
        scope: ScopeKind,
    ) -> Result<(), TranslateError> {
        let db = self.db;
        if scope == ScopeKind::Declared {
            if !level.alias {
                self.out.line(indent, &format!("(sensitivity {name})"))?;
            } else {
                let actual = db.value_name(SymbolKind::Sensitivity, level.level.sensitivity)?;
                self.out.line(indent, &format!("(sensitivityalias {name})"))?;
                self.out.line(indent, &format!("(sensitivityaliasactual {name} {actual})"))?;
            }
        }

        if !level.level.categories.is_empty() {
            let cats = self.bitmap_names(SymbolKind::Category, &level.level.categories)?;
            self.out
                .line(indent, &format!("(sensitivitycategory {name} ({}))", cats.join(" ")))?;
        }

        Ok(())
    }

    fn category_declaration(
        &mut self,
        indent: usize,
        name: &str,
        category: &CategoryDatum,
        scope: ScopeKind,
    ) -> Result<(), TranslateError> {
        if scope == ScopeKind::Required {
            return Ok(());
        }
        if !category.alias {
            self.out.line(indent, &format!("(category {name})"))?;
        } else {
            let actual = self.db.value_name(SymbolKind::Category, category.value)?.to_owned();
            self.out.line(indent, &format!("(categoryalias {name})"))?;
            self.out.line(indent, &format!("(categoryaliasactual {name} {actual})"))?;
        }
        Ok(())
    }

    /// Emits a common permission block. Commons live only in the global
    /// symbol table and lower with the global block.
    pub(crate) fn common_declaration(
        &mut self,
        indent: usize,
        name: &str,
        common: &CommonDatum,
    ) -> Result<(), TranslateError> {
        let perms: Vec<&str> = common.permissions.iter().map(|perm| perm.name.as_str()).collect();
        self.out.line(indent, &format!("(common {name} ({}))", perms.join(" ")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::TypeSet;
    use crate::symbols::{DefaultRange, DefaultSelection, MlsLevel, PermissionDatum};

    fn database() -> PolicyDatabase {
        let mut db = PolicyDatabase::default();
        for (i, name) in ["alpha", "beta", "attr_a"].into_iter().enumerate() {
            let flavor =
                if name.starts_with("attr") { TypeFlavor::Attribute } else { TypeFlavor::Type };
            db.types.insert(
                name,
                TypeDatum { value: i as u32 + 1, flavor, primary: true, ..Default::default() },
            );
        }
        for (i, name) in ["object_r", "staff_r", "user_r"].into_iter().enumerate() {
            db.roles.insert(name, RoleDatum { value: i as u32 + 1, ..Default::default() });
        }
        db.sensitivities.insert("s0", LevelDatum::default());
        db.categories.insert("c0", CategoryDatum { value: 1, alias: false });
        db
    }

    fn lower<'p>(db: &'p PolicyDatabase, f: impl FnOnce(&mut Translator<'p, &mut Vec<u8>>)) -> String {
        let mut out = Vec::new();
        let mut translator = Translator::for_tests(db, &mut out);
        f(&mut translator);
        String::from_utf8(out).expect("utf8")
    }

    #[test]
    fn class_declaration_lists_own_permissions_and_defaults() {
        let db = database();
        let class = ClassDatum {
            value: 1,
            common: Some("file".to_owned()),
            permissions: vec![
                PermissionDatum::new("execute_no_trans", 1),
                PermissionDatum::new("entrypoint", 2),
            ],
            default_user: Some(DefaultSelection::Source),
            default_range: Some(DefaultRange::TargetLowHigh),
            ..Default::default()
        };
        let emitted = lower(&db, |t| {
            t.class_declaration(0, "file", &class, ScopeKind::Declared).expect("class")
        });
        assert_eq!(
            "(class file (execute_no_trans entrypoint))\n\
             (classcommon file file)\n\
             (defaultuser file source)\n\
             (defaultrange file target low-high)\n",
            emitted,
        );
        assert_eq!(
            "",
            lower(&db, |t| {
                t.class_declaration(0, "file", &class, ScopeKind::Required).expect("class")
            }),
        );
    }

    #[test]
    fn module_role_declaration_is_bare() {
        let mut db = database();
        db.policy_type = PolicyType::Module;
        let role = RoleDatum {
            value: 2,
            types: TypeSet { types: [0u32].into_iter().collect(), ..Default::default() },
            ..Default::default()
        };
        let emitted = lower(&db, |t| {
            t.role_declaration(0, "staff_r", &role, ScopeKind::Declared).expect("role")
        });
        assert_eq!("(role staff_r)\n", emitted);
        // Required scope still expands the type associations.
        let emitted = lower(&db, |t| {
            t.role_declaration(0, "staff_r", &role, ScopeKind::Required).expect("role")
        });
        assert_eq!("(roletype staff_r alpha)\n", emitted);
    }

    #[test]
    fn base_role_declaration_expands_types_and_bounds() {
        let db = database();
        let role = RoleDatum {
            value: 2,
            types: TypeSet { types: [0u32, 1].into_iter().collect(), ..Default::default() },
            bounds: 3,
            ..Default::default()
        };
        let emitted = lower(&db, |t| {
            t.role_declaration(0, "staff_r", &role, ScopeKind::Declared).expect("role")
        });
        assert_eq!(
            "(roletype staff_r alpha)\n\
             (roletype staff_r beta)\n\
             (rolebounds staff_r user_r)\n",
            emitted,
        );
    }

    #[test]
    fn role_attribute_declaration_lists_members() {
        let db = database();
        let role = RoleDatum {
            value: 2,
            flavor: RoleFlavor::Attribute,
            roles: [1u32, 2].into_iter().collect(),
            ..Default::default()
        };
        let emitted = lower(&db, |t| {
            t.role_declaration(0, "roleattr", &role, ScopeKind::Declared).expect("role")
        });
        assert_eq!(
            "(roleattribute roleattr)\n\
             (roleattributeset roleattr (staff_r user_r))\n",
            emitted,
        );
    }

    #[test]
    fn primary_type_declares_object_r_association() {
        let db = database();
        let type_ = TypeDatum { value: 1, primary: true, ..Default::default() };
        let emitted = lower(&db, |t| {
            t.type_declaration(0, "alpha", &type_, ScopeKind::Declared).expect("type")
        });
        assert_eq!("(type alpha)\n(roletype object_r alpha)\n", emitted);
    }

    #[test]
    fn alias_type_names_its_primary() {
        let db = database();
        let alias = TypeDatum { value: 2, primary: false, ..Default::default() };
        let emitted = lower(&db, |t| {
            t.type_declaration(0, "alpha_alias", &alias, ScopeKind::Declared).expect("type")
        });
        assert_eq!(
            "(typealias alpha_alias)\n(typealiasactual alpha_alias beta)\n",
            emitted,
        );
    }

    #[test]
    fn permissive_and_bounds_apply_at_required_scope() {
        let db = database();
        let type_ = TypeDatum {
            value: 1,
            primary: true,
            permissive: true,
            bounds: 2,
            ..Default::default()
        };
        let emitted = lower(&db, |t| {
            t.type_declaration(0, "alpha", &type_, ScopeKind::Required).expect("type")
        });
        assert_eq!("(typepermissive alpha)\n(typebounds beta alpha)\n", emitted);
    }

    #[test]
    fn type_attribute_declaration_lists_members() {
        let db = database();
        let attr = TypeDatum {
            value: 3,
            flavor: TypeFlavor::Attribute,
            types: [0u32, 1].into_iter().collect(),
            ..Default::default()
        };
        let emitted = lower(&db, |t| {
            t.type_declaration(0, "attr_a", &attr, ScopeKind::Declared).expect("type")
        });
        assert_eq!(
            "(typeattribute attr_a)\n(typeattributeset attr_a (alpha beta))\n",
            emitted,
        );
    }

    #[test]
    fn user_declaration_without_mls_uses_default_levels() {
        let mut db = database();
        db.users.insert("staff_u", UserDatum { value: 1, ..Default::default() });
        let user = UserDatum {
            value: 1,
            roles: [1u32].into_iter().collect(),
            ..Default::default()
        };
        let emitted = lower(&db, |t| {
            t.user_declaration(0, false, "staff_u", &user, ScopeKind::Declared).expect("user")
        });
        assert_eq!(
            "(user staff_u)\n\
             (userrole staff_u object_r)\n\
             (userrole staff_u staff_r)\n\
             (userlevel staff_u systemlow)\n\
             (userrange staff_u (systemlow systemlow))\n",
            emitted,
        );
    }

    #[test]
    fn boolean_declaration_reflects_tunable_flag_and_state() {
        let db = database();
        let tunable = BooleanDatum { value: 1, state: true, tunable: true };
        let emitted = lower(&db, |t| {
            t.boolean_declaration(0, "allow_exec", &tunable, ScopeKind::Declared).expect("bool")
        });
        assert_eq!("(tunable allow_exec true)\n", emitted);
        let emitted = lower(&db, |t| {
            t.boolean_declaration(0, "allow_exec", &tunable, ScopeKind::Required).expect("bool")
        });
        assert_eq!("", emitted);
    }

    #[test]
    fn sensitivity_declaration_emits_category_associations() {
        let db = database();
        let level = LevelDatum {
            alias: false,
            level: MlsLevel { sensitivity: 1, categories: [0u32].into_iter().collect() },
        };
        let emitted = lower(&db, |t| {
            t.sensitivity_declaration(0, "s0", &level, ScopeKind::Declared).expect("sens")
        });
        assert_eq!("(sensitivity s0)\n(sensitivitycategory s0 (c0))\n", emitted);
        // Required scope keeps the category association only.
        let emitted = lower(&db, |t| {
            t.sensitivity_declaration(0, "s0", &level, ScopeKind::Required).expect("sens")
        });
        assert_eq!("(sensitivitycategory s0 (c0))\n", emitted);
    }

    #[test]
    fn category_alias_names_its_actual() {
        let db = database();
        let alias = CategoryDatum { value: 1, alias: true };
        let emitted = lower(&db, |t| {
            t.category_declaration(0, "c0_alias", &alias, ScopeKind::Declared).expect("cat")
        });
        assert_eq!("(categoryalias c0_alias)\n(categoryaliasactual c0_alias c0)\n", emitted);
    }

    #[test]
    fn common_declaration_lists_permissions() {
        let db = database();
        let common = CommonDatum {
            value: 1,
            permissions: vec![PermissionDatum::new("ioctl", 1), PermissionDatum::new("read", 2)],
        };
        let emitted =
            lower(&db, |t| t.common_declaration(0, "file", &common).expect("common"));
        assert_eq!("(common file (ioctl read))\n", emitted);
    }

    #[test]
    fn scoped_symbol_dispatches_by_kind() {
        let db = database();
        assert!(matches!(
            db.scoped_symbol(SymbolKind::Type, "alpha"),
            Some(SymbolDatumRef::Type(_)),
        ));
        assert!(matches!(
            db.scoped_symbol(SymbolKind::Role, "staff_r"),
            Some(SymbolDatumRef::Role(_)),
        ));
        assert!(db.scoped_symbol(SymbolKind::Common, "anything").is_none());
        assert!(db.scoped_symbol(SymbolKind::Type, "missing").is_none());
    }
}
