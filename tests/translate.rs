// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Whole-package translations over hand-built policy databases.

use policy_to_cil::bitmap::Bitmap;
use policy_to_cil::policy::{
    HandleUnknown, InitialSidContext, ModulePackage, ObjectContexts, PolicyDatabase, PolicyType,
    PortContext, Protocol, SecurityContext, SelinuxContexts,
};
use policy_to_cil::rules::{
    AccessKind, AvRule, AvRulePayload, Block, ClassPermissionBits, CondAtom, CondNode, Decl,
    TypeSet,
};
use policy_to_cil::symbols::{
    BooleanDatum, CategoryDatum, ClassDatum, LevelDatum, MlsLevel, MlsRange, PermissionDatum,
    RoleDatum, ScopeDatum, ScopeKind, SemanticLevel, SemanticRange, SymbolKind, TypeDatum,
    UserDatum,
};
use policy_to_cil::translate;

fn bits(indices: &[u32]) -> Bitmap {
    indices.iter().copied().collect()
}

fn types(indices: &[u32]) -> TypeSet {
    TypeSet { types: bits(indices), ..Default::default() }
}

fn declared(db: &mut PolicyDatabase, kind: SymbolKind, name: &str, decl_id: u32) {
    db.scopes.insert(kind, name, ScopeDatum { kind: ScopeKind::Declared, decl_ids: vec![decl_id] });
}

fn translate_to_string(package: &ModulePackage) -> String {
    let mut out = Vec::new();
    translate(package, &mut out).expect("translate package");
    String::from_utf8(out).expect("translated policy is utf8")
}

/// A base, non-MLS policy declaring one type and one allow rule.
fn base_package() -> ModulePackage {
    let mut db = PolicyDatabase::default();
    db.policy_type = PolicyType::Base;
    db.mls = false;
    db.handle_unknown = HandleUnknown::Deny;

    db.classes.insert(
        "file",
        ClassDatum {
            value: 1,
            permissions: vec![PermissionDatum::new("read", 1)],
            ..Default::default()
        },
    );
    db.roles.insert("object_r", RoleDatum { value: 1, ..Default::default() });
    db.types.insert("alpha", TypeDatum { value: 1, primary: true, ..Default::default() });

    declared(&mut db, SymbolKind::Class, "file", 1);
    declared(&mut db, SymbolKind::Role, "object_r", 1);
    declared(&mut db, SymbolKind::Type, "alpha", 1);

    let mut decl = Decl { id: 1, ..Default::default() };
    decl.declared.map_mut(SymbolKind::Class).set(0);
    decl.declared.map_mut(SymbolKind::Type).set(0);
    decl.av_rules.push(AvRule {
        source: types(&[0]),
        target: types(&[0]),
        self_target: false,
        payload: AvRulePayload::Access {
            kind: AccessKind::Allow,
            perms: vec![ClassPermissionBits { class: 1, permissions: 0b1 }],
        },
    });
    db.blocks.push(Block { optional: false, decls: vec![decl] });

    ModulePackage { policy: db, ..Default::default() }
}

#[test]
fn base_module_prelude_and_rules() {
    let expected = "\
(sensitivity s0)
(sensitivityorder (s0))
(level systemlow (s0))
(role object_r)
(handleunknown deny)
(mls false)
(class file (read))
(type alpha)
(roletype object_r alpha)
(allow alpha alpha (file (read)))
";
    assert_eq!(expected, translate_to_string(&base_package()));
}

#[test]
fn translation_is_deterministic() {
    let package = base_package();
    assert_eq!(translate_to_string(&package), translate_to_string(&package));
}

/// A base MLS policy exercising the prelude, object contexts, side-cars,
/// per-kind declarations, orderings, and a conditional.
fn mls_package() -> ModulePackage {
    let mut db = PolicyDatabase::default();
    db.policy_type = PolicyType::Base;
    db.mls = true;
    db.handle_unknown = HandleUnknown::Allow;
    db.policy_capabilities = bits(&[0]);

    db.classes.insert(
        "file",
        ClassDatum {
            value: 1,
            permissions: vec![PermissionDatum::new("read", 1)],
            ..Default::default()
        },
    );
    db.roles.insert("object_r", RoleDatum { value: 1, ..Default::default() });
    db.roles.insert("staff_r", RoleDatum { value: 2, ..Default::default() });
    db.types.insert("alpha", TypeDatum { value: 1, primary: true, ..Default::default() });
    db.users.insert(
        "staff_u",
        UserDatum {
            value: 1,
            roles: bits(&[1]),
            default_level: SemanticLevel { sensitivity: 1, categories: vec![] },
            range: SemanticRange {
                low: SemanticLevel { sensitivity: 1, categories: vec![] },
                high: SemanticLevel { sensitivity: 1, categories: vec![] },
            },
        },
    );
    db.booleans.insert("allow_x", BooleanDatum { value: 1, state: false, tunable: false });
    db.sensitivities.insert("s0", LevelDatum::default());
    db.categories.insert("c0", CategoryDatum { value: 1, alias: false });

    for (kind, name) in [
        (SymbolKind::Class, "file"),
        (SymbolKind::Role, "object_r"),
        (SymbolKind::Role, "staff_r"),
        (SymbolKind::Type, "alpha"),
        (SymbolKind::User, "staff_u"),
        (SymbolKind::Boolean, "allow_x"),
        (SymbolKind::Sensitivity, "s0"),
        (SymbolKind::Category, "c0"),
    ] {
        declared(&mut db, kind, name, 1);
    }

    let context = SecurityContext {
        user: 1,
        role: 1,
        type_: 1,
        range: MlsRange {
            low: MlsLevel { sensitivity: 1, categories: Bitmap::new() },
            high: MlsLevel { sensitivity: 1, categories: Bitmap::new() },
        },
    };
    db.object_contexts = ObjectContexts::Selinux(SelinuxContexts {
        initial_sids: vec![InitialSidContext { sid: 1, context: context.clone() }],
        ports: vec![PortContext { protocol: Protocol::Tcp, low: 80, high: 80, context }],
        ..Default::default()
    });

    let mut decl = Decl { id: 1, ..Default::default() };
    decl.declared.map_mut(SymbolKind::Class).set(0);
    decl.declared.map_mut(SymbolKind::Type).set(0);
    decl.declared.map_mut(SymbolKind::User).set(0);
    decl.declared.map_mut(SymbolKind::Boolean).set(0);
    decl.declared.map_mut(SymbolKind::Sensitivity).set(0);
    decl.declared.map_mut(SymbolKind::Category).set(0);
    decl.conditionals.push(CondNode {
        expression: vec![CondAtom::Boolean(1)],
        tunable: false,
        true_rules: vec![AvRule {
            source: types(&[0]),
            target: types(&[0]),
            self_target: false,
            payload: AvRulePayload::Access {
                kind: AccessKind::Allow,
                perms: vec![ClassPermissionBits { class: 1, permissions: 0b1 }],
            },
        }],
        false_rules: vec![],
    });
    db.blocks.push(Block { optional: false, decls: vec![decl] });

    ModulePackage {
        policy: db,
        file_contexts: b"/bin(/.*)? -- staff_u:object_r:alpha:s0\n".to_vec(),
        seusers: b"__default__:staff_u\n".to_vec(),
        user_extra: b"user staff_u prefix staff;\n".to_vec(),
        netfilter_contexts: Vec::new(),
    }
}

#[test]
fn mls_base_module_end_to_end() {
    let expected = "\
(role object_r)
(handleunknown allow)
(mls true)
(policycap network_peer_controls)
(sid kernel)
(sidcontext kernel (staff_u object_r alpha ((s0) (s0))))
(sidorder (kernel))
(portcon tcp 80 (staff_u object_r alpha ((s0) (s0))))
(selinuxuserdefault staff_u (systemlow systemlow))
(userprefix staff_u staff)
(filecon \"/bin(/.*)?\" \"\" file (staff_u object_r alpha ((s0) (s0))))
(class file (read))
(type alpha)
(roletype object_r alpha)
(user staff_u)
(userrole staff_u object_r)
(userrole staff_u staff_r)
(userlevel staff_u (s0))
(userrange staff_u ((s0) (s0)))
(boolean allow_x false)
(sensitivity s0)
(sensitivityorder (s0))
(category c0)
(categoryorder (c0))
(booleanif (allow_x)
    (true
        (allow alpha alpha (file (read)))
    )
)
";
    assert_eq!(expected, translate_to_string(&mls_package()));
}

/// A module policy with nested and sibling optional blocks.
fn optional_package() -> ModulePackage {
    let mut db = PolicyDatabase::default();
    db.policy_type = PolicyType::Module;
    db.name = Some("mymod".to_owned());
    db.mls = false;

    for (i, name) in ["t_a", "t_b", "t_c"].into_iter().enumerate() {
        db.types.insert(
            name,
            TypeDatum { value: i as u32 + 1, primary: true, ..Default::default() },
        );
    }
    declared(&mut db, SymbolKind::Type, "t_a", 1);
    declared(&mut db, SymbolKind::Type, "t_b", 2);
    declared(&mut db, SymbolKind::Type, "t_c", 3);

    // The global block declares nothing itself.
    db.blocks.push(Block { optional: false, decls: vec![Decl { id: 0, ..Default::default() }] });

    // First optional: requires type bit 0.
    let mut first = Decl { id: 1, ..Default::default() };
    first.required.map_mut(SymbolKind::Type).set(0);
    first.declared.map_mut(SymbolKind::Type).set(0);
    db.blocks.push(Block { optional: true, decls: vec![first] });

    // Second optional nests inside the first: its requirements cover them.
    let mut second = Decl { id: 2, ..Default::default() };
    second.required.map_mut(SymbolKind::Type).set(0);
    second.required.map_mut(SymbolKind::Type).set(1);
    second.declared.map_mut(SymbolKind::Type).set(1);
    db.blocks.push(Block { optional: true, decls: vec![second] });

    // Third optional requires an unrelated type: both open optionals close.
    let mut third = Decl { id: 3, ..Default::default() };
    third.required.map_mut(SymbolKind::Type).set(2);
    third.declared.map_mut(SymbolKind::Type).set(2);
    db.blocks.push(Block { optional: true, decls: vec![third] });

    ModulePackage { policy: db, ..Default::default() }
}

#[test]
fn optional_blocks_nest_by_required_scope() {
    let expected = "\
(optional mymod_optional_1
    (type t_a)
    (roletype object_r t_a)
    (optional mymod_optional_2
        (type t_b)
        (roletype object_r t_b)
    )
)
(optional mymod_optional_3
    (type t_c)
    (roletype object_r t_c)
)
";
    assert_eq!(expected, translate_to_string(&optional_package()));
}

#[test]
fn synthesized_attributes_use_the_adjusted_module_name() {
    let mut package = optional_package();
    package.policy.name = Some("my-mod.pp".to_owned());
    // Give the first optional's decl a negated rule target.
    let rule = AvRule {
        source: types(&[0]),
        target: TypeSet { types: bits(&[1]), negative: bits(&[2]), ..Default::default() },
        self_target: false,
        payload: AvRulePayload::Access {
            kind: AccessKind::Allow,
            perms: vec![ClassPermissionBits { class: 1, permissions: 0b1 }],
        },
    };
    package.policy.classes.insert(
        "file",
        ClassDatum {
            value: 1,
            permissions: vec![PermissionDatum::new("read", 1)],
            ..Default::default()
        },
    );
    package.policy.blocks[1].decls[0].av_rules.push(rule);

    let emitted = translate_to_string(&package);
    assert!(emitted.contains("(typeattribute my_mod_pp_typeattr_1)"));
    assert!(emitted.contains(
        "(typeattributeset my_mod_pp_typeattr_1 (and (t_b) (not (t_c))))"
    ));
    assert!(emitted.contains("(allow t_a my_mod_pp_typeattr_1 (file (read)))"));
}
