// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Rule and block-tree structures of a decoded policy database.

use crate::bitmap::Bitmap;
use crate::symbols::{
    BooleanDatum, CategoryDatum, ClassDatum, LevelDatum, RoleDatum, ScopeIndex, SemanticRange,
    TypeDatum, UserDatum,
};

use bitflags::bitflags;

bitflags! {
    /// Flags carried by type and role sets.
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub struct SetFlags: u32 {
        /// The set matches all symbols.
        const STAR = 1;
        /// The set is complemented.
        const COMP = 2;
    }
}

impl Default for SetFlags {
    fn default() -> Self {
        SetFlags::empty()
    }
}

/// A set of types as rules store it: positive members, negated members, and
/// star/complement flags.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TypeSet {
    pub types: Bitmap,
    pub negative: Bitmap,
    pub flags: SetFlags,
}

/// A set of roles. Role sets carry no negated members; only the flags and
/// the positive bitmap are meaningful.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RoleSet {
    pub roles: Bitmap,
    pub flags: SetFlags,
}

/// The access-vector rule kinds whose payload is a permission bitmask.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AccessKind {
    Allow,
    AuditAllow,
    AuditDeny,
    DontAudit,
    NeverAllow,
}

impl AccessKind {
    pub fn keyword(self) -> &'static str {
        match self {
            AccessKind::Allow => "allow",
            AccessKind::AuditAllow => "auditallow",
            // Historical spelling, kept for output compatibility with the
            // reference translator.
            AccessKind::AuditDeny => "auditdenty",
            AccessKind::DontAudit => "dontaudit",
            AccessKind::NeverAllow => "neverallow",
        }
    }
}

/// The type-rule kinds whose payload is a default new type.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TypeRuleKind {
    Transition,
    Member,
    Change,
}

impl TypeRuleKind {
    pub fn keyword(self) -> &'static str {
        match self {
            TypeRuleKind::Transition => "typetransition",
            TypeRuleKind::Member => "typemember",
            TypeRuleKind::Change => "typechange",
        }
    }
}

/// A class with a permission bitmask, one node of an access-vector rule.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClassPermissionBits {
    pub class: u32,
    pub permissions: u32,
}

/// A class with a default new type, one node of a type rule.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClassNewType {
    pub class: u32,
    pub new_type: u32,
}

/// The kind-dependent payload of an [`AvRule`]. Access kinds carry
/// permission masks; type-rule kinds carry the default new type. Tagging the
/// payload keeps mismatched combinations unrepresentable.
#[derive(Clone, Debug, PartialEq)]
pub enum AvRulePayload {
    Access { kind: AccessKind, perms: Vec<ClassPermissionBits> },
    TypeRule { kind: TypeRuleKind, types: Vec<ClassNewType> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct AvRule {
    pub source: TypeSet,
    pub target: TypeSet,
    /// When set, the rule additionally applies with the source as target.
    pub self_target: bool,
    pub payload: AvRulePayload,
}

/// Boolean operators of conditional expressions. `Not` is unary; the rest
/// are binary.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CondOp {
    Not,
    Or,
    And,
    Xor,
    Eq,
    Neq,
}

impl CondOp {
    pub fn token(self) -> &'static str {
        match self {
            CondOp::Not => "not",
            CondOp::Or => "or",
            CondOp::And => "and",
            CondOp::Xor => "xor",
            CondOp::Eq => "eq",
            CondOp::Neq => "neq",
        }
    }

    pub fn is_unary(self) -> bool {
        matches!(self, CondOp::Not)
    }
}

/// One element of a postfix conditional expression.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CondAtom {
    /// A reference to the boolean with this value.
    Boolean(u32),
    Op(CondOp),
}

/// A conditional block: a postfix expression over booleans and the rules
/// active in each branch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CondNode {
    pub expression: Vec<CondAtom>,
    pub tunable: bool,
    pub true_rules: Vec<AvRule>,
    pub false_rules: Vec<AvRule>,
}

impl Default for AvRule {
    fn default() -> Self {
        AvRule {
            source: TypeSet::default(),
            target: TypeSet::default(),
            self_target: false,
            payload: AvRulePayload::Access { kind: AccessKind::Allow, perms: Vec::new() },
        }
    }
}

/// Comparison operators of constraint leaves.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConstraintOp {
    Eq,
    Neq,
    Dom,
    DomBy,
    Incomp,
}

impl ConstraintOp {
    pub fn token(self) -> &'static str {
        match self {
            ConstraintOp::Eq => "eq",
            ConstraintOp::Neq => "neq",
            ConstraintOp::Dom => "dom",
            ConstraintOp::DomBy => "domby",
            ConstraintOp::Incomp => "incomp",
        }
    }
}

/// The pair of context attributes a constraint leaf relates. User, role and
/// type selectors combine with a target/xtarget variant; the remaining pairs
/// relate the low/high MLS levels of the two contexts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AttrPair {
    User,
    UserTarget,
    UserXtarget,
    Role,
    RoleTarget,
    RoleXtarget,
    Type,
    TypeTarget,
    TypeXtarget,
    L1L2,
    L1H2,
    H1L2,
    H1H2,
    L1H1,
    L2H2,
}

impl AttrPair {
    /// The CIL tokens for the two sides of the comparison. Single-sided
    /// selectors leave the second token empty.
    pub fn tokens(self) -> (&'static str, &'static str) {
        match self {
            AttrPair::User => ("u1", "u2"),
            AttrPair::UserTarget => ("u2", ""),
            AttrPair::UserXtarget => ("u3", ""),
            AttrPair::Role => ("r1", "r2"),
            AttrPair::RoleTarget => ("r2", ""),
            AttrPair::RoleXtarget => ("r3", ""),
            AttrPair::Type => ("t1", ""),
            AttrPair::TypeTarget => ("t2", ""),
            AttrPair::TypeXtarget => ("t3", ""),
            AttrPair::L1L2 => ("l1", "l2"),
            AttrPair::L1H2 => ("l1", "h2"),
            AttrPair::H1L2 => ("h1", "l2"),
            AttrPair::H1H2 => ("h1", "h2"),
            AttrPair::L1H1 => ("l1", "h1"),
            AttrPair::L2H2 => ("l2", "h2"),
        }
    }
}

/// The name set of a membership-test leaf.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstraintNames {
    Types(TypeSet),
    Roles(Bitmap),
    Users(Bitmap),
}

/// One element of a postfix constraint expression.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstraintAtom {
    /// Compares two context attributes.
    Attribute { op: ConstraintOp, attr: AttrPair },
    /// Tests a context attribute against a set of names.
    Names { op: ConstraintOp, attr: AttrPair, names: ConstraintNames },
    Not,
    And,
    Or,
}

/// A single constraint (or validatetrans) attached to a class.
#[derive(Clone, Debug, PartialEq)]
pub struct Constraint {
    /// Constrained permission mask; unused by validatetrans.
    pub permissions: u32,
    pub expression: Vec<ConstraintAtom>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RoleTransitionRule {
    pub roles: RoleSet,
    pub types: TypeSet,
    pub classes: Bitmap,
    pub new_role: u32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RoleAllowRule {
    pub roles: RoleSet,
    pub new_roles: RoleSet,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RangeTransitionRule {
    pub source: TypeSet,
    pub target: TypeSet,
    pub classes: Bitmap,
    pub range: SemanticRange,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilenameTransitionRule {
    pub source: TypeSet,
    pub target: TypeSet,
    pub class: u32,
    pub filename: String,
    pub new_type: u32,
}

/// Symbols added to (rather than declared or required by) a decl, such as
/// attribute-membership additions a module makes to names owned elsewhere.
/// Commons cannot appear at decl level.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AdditiveSymbols {
    pub classes: Vec<(String, ClassDatum)>,
    pub roles: Vec<(String, RoleDatum)>,
    pub types: Vec<(String, TypeDatum)>,
    pub users: Vec<(String, UserDatum)>,
    pub booleans: Vec<(String, BooleanDatum)>,
    pub sensitivities: Vec<(String, LevelDatum)>,
    pub categories: Vec<(String, CategoryDatum)>,
}

/// One alternative of a block. Only the first decl of a block is lowered;
/// `else` alternatives have no CIL rendering.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Decl {
    pub id: u32,
    pub declared: ScopeIndex,
    pub required: ScopeIndex,
    pub additive: AdditiveSymbols,
    pub av_rules: Vec<AvRule>,
    pub role_transitions: Vec<RoleTransitionRule>,
    pub role_allows: Vec<RoleAllowRule>,
    pub range_transitions: Vec<RangeTransitionRule>,
    pub filename_transitions: Vec<FilenameTransitionRule>,
    pub conditionals: Vec<CondNode>,
}

/// A node of the global block list. The first block holds the module's
/// unconditional body; subsequent blocks correspond to optional statements.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Block {
    pub optional: bool,
    pub decls: Vec<Decl>,
}
