// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Symbol tables and per-symbol datums of a decoded policy database.
//!
//! The decoder populates one [`SymbolTable`] per [`SymbolKind`], in value
//! order: slot `i` of a table holds the symbol whose stored value is `i + 1`.
//! Lowering code never applies that offset itself; it goes through the
//! database's name-resolution helpers.

use crate::bitmap::Bitmap;
use crate::rules::{Constraint, TypeSet};

use std::collections::HashMap;
use std::fmt;

/// The eight symbol namespaces of a policy database, in their canonical
/// (serialized) order.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SymbolKind {
    Common,
    Class,
    Role,
    Type,
    User,
    Boolean,
    Sensitivity,
    Category,
}

impl SymbolKind {
    /// The kinds that participate in per-decl scoping, in canonical order.
    /// Commons live only in the global symbol table and are handled by the
    /// global block.
    pub const SCOPED: [SymbolKind; 7] = [
        SymbolKind::Class,
        SymbolKind::Role,
        SymbolKind::Type,
        SymbolKind::User,
        SymbolKind::Boolean,
        SymbolKind::Sensitivity,
        SymbolKind::Category,
    ];

    pub fn index(self) -> usize {
        match self {
            SymbolKind::Common => 0,
            SymbolKind::Class => 1,
            SymbolKind::Role => 2,
            SymbolKind::Type => 3,
            SymbolKind::User => 4,
            SymbolKind::Boolean => 5,
            SymbolKind::Sensitivity => 6,
            SymbolKind::Category => 7,
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SymbolKind::Common => "common",
            SymbolKind::Class => "class",
            SymbolKind::Role => "role",
            SymbolKind::Type => "type",
            SymbolKind::User => "user",
            SymbolKind::Boolean => "boolean",
            SymbolKind::Sensitivity => "sensitivity",
            SymbolKind::Category => "category",
        };
        f.write_str(name)
    }
}

/// An index-ordered symbol table: slot `i` holds the name and datum of the
/// symbol with value `i + 1`, and names resolve back to their datum.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SymbolTable<T> {
    entries: Vec<(String, T)>,
    by_name: HashMap<String, usize>,
}

impl<T> SymbolTable<T> {
    pub fn new() -> Self {
        Self { entries: Vec::new(), by_name: HashMap::new() }
    }

    /// Appends a symbol at the next index. The caller (the decoder) is
    /// responsible for inserting symbols in value order.
    pub fn insert(&mut self, name: impl Into<String>, datum: T) {
        let name = name.into();
        self.by_name.insert(name.clone(), self.entries.len());
        self.entries.push((name, datum));
    }

    /// The name at zero-based `index`, if present.
    pub fn name_at(&self, index: u32) -> Option<&str> {
        self.entries.get(index as usize).map(|(name, _)| name.as_str())
    }

    /// The datum for `name`, if present.
    pub fn get(&self, name: &str) -> Option<&T> {
        self.by_name.get(name).map(|&slot| &self.entries[slot].1)
    }

    /// Iterates `(name, datum)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(name, datum)| (name.as_str(), datum))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> FromIterator<(String, T)> for SymbolTable<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(entries: I) -> Self {
        let mut table = SymbolTable::new();
        for (name, datum) in entries {
            table.insert(name, datum);
        }
        table
    }
}

/// A named permission with its class-relative value. Bit `value - 1` of an
/// access-vector mask selects this permission.
#[derive(Clone, Debug, PartialEq)]
pub struct PermissionDatum {
    pub name: String,
    pub value: u32,
}

impl PermissionDatum {
    pub fn new(name: impl Into<String>, value: u32) -> Self {
        Self { name: name.into(), value }
    }
}

/// A common permission block that classes may inherit from.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommonDatum {
    pub value: u32,
    pub permissions: Vec<PermissionDatum>,
}

/// Which end of a transition a class default selects.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DefaultSelection {
    Source,
    Target,
}

impl DefaultSelection {
    pub fn token(self) -> &'static str {
        match self {
            DefaultSelection::Source => "source",
            DefaultSelection::Target => "target",
        }
    }
}

/// The six default-range selections a class may carry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DefaultRange {
    SourceLow,
    SourceHigh,
    SourceLowHigh,
    TargetLow,
    TargetHigh,
    TargetLowHigh,
}

impl DefaultRange {
    pub fn token(self) -> &'static str {
        match self {
            DefaultRange::SourceLow => "source low",
            DefaultRange::SourceHigh => "source high",
            DefaultRange::SourceLowHigh => "source low-high",
            DefaultRange::TargetLow => "target low",
            DefaultRange::TargetHigh => "target high",
            DefaultRange::TargetLowHigh => "target low-high",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClassDatum {
    pub value: u32,
    /// The common block this class inherits permissions from, if any.
    pub common: Option<String>,
    /// Permissions defined by the class itself, excluding inherited ones.
    pub permissions: Vec<PermissionDatum>,
    pub default_user: Option<DefaultSelection>,
    pub default_role: Option<DefaultSelection>,
    pub default_type: Option<DefaultSelection>,
    pub default_range: Option<DefaultRange>,
    pub constraints: Vec<Constraint>,
    pub validatetrans: Vec<Constraint>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum RoleFlavor {
    #[default]
    Role,
    Attribute,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RoleDatum {
    pub value: u32,
    pub flavor: RoleFlavor,
    /// Roles this role dominates. The self bit is always present; any larger
    /// set has no CIL rendering.
    pub dominates: Bitmap,
    pub types: TypeSet,
    /// Value of the bounding role, or 0 when unbounded.
    pub bounds: u32,
    /// For attribute flavors, the member roles.
    pub roles: Bitmap,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum TypeFlavor {
    #[default]
    Type,
    Attribute,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TypeDatum {
    pub value: u32,
    pub flavor: TypeFlavor,
    /// False for alias slots; `value` then names the aliased primary type.
    pub primary: bool,
    pub permissive: bool,
    /// Value of the bounding type, or 0 when unbounded.
    pub bounds: u32,
    /// For attribute flavors, the member types.
    pub types: Bitmap,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct UserDatum {
    pub value: u32,
    pub roles: Bitmap,
    pub default_level: SemanticLevel,
    pub range: SemanticRange,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BooleanDatum {
    pub value: u32,
    pub state: bool,
    pub tunable: bool,
}

/// A sensitivity level definition (or alias of one).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LevelDatum {
    pub alias: bool,
    pub level: MlsLevel,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CategoryDatum {
    pub value: u32,
    pub alias: bool,
}

/// A concrete MLS level: a sensitivity value and an expanded category set.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MlsLevel {
    pub sensitivity: u32,
    pub categories: Bitmap,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MlsRange {
    pub low: MlsLevel,
    pub high: MlsLevel,
}

/// A semantic MLS level: category membership kept as ordered spans rather
/// than an expanded set, as rules and user declarations store it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SemanticLevel {
    pub sensitivity: u32,
    pub categories: Vec<CategorySpan>,
}

/// An inclusive span of category values.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CategorySpan {
    pub low: u32,
    pub high: u32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SemanticRange {
    pub low: SemanticLevel,
    pub high: SemanticLevel,
}

/// Whether a name is declared by, or merely required by, the decls that
/// mention it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScopeKind {
    Declared,
    Required,
}

/// Per-name scope metadata: the scope kind and the decls that bind the name.
#[derive(Clone, Debug, PartialEq)]
pub struct ScopeDatum {
    pub kind: ScopeKind,
    pub decl_ids: Vec<u32>,
}

/// A per-decl scope map: one bitmap per symbol kind plus a per-class
/// permission bitmap array.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScopeIndex {
    symbols: [Bitmap; 8],
    pub class_perms: Vec<Bitmap>,
}

impl ScopeIndex {
    pub fn map(&self, kind: SymbolKind) -> &Bitmap {
        &self.symbols[kind.index()]
    }

    pub fn map_mut(&mut self, kind: SymbolKind) -> &mut Bitmap {
        &mut self.symbols[kind.index()]
    }

    /// Returns whether this scope covers `other`: every per-kind bitmap must
    /// be a superset of its counterpart, and the class-permission array must
    /// be at least as long with each paired entry covered.
    pub fn covers(&self, other: &ScopeIndex) -> bool {
        if !SymbolKind::SCOPED.iter().all(|&kind| self.map(kind).covers(other.map(kind))) {
            return false;
        }
        if !self.map(SymbolKind::Common).covers(other.map(SymbolKind::Common)) {
            return false;
        }
        if self.class_perms.len() < other.class_perms.len() {
            return false;
        }
        self.class_perms.iter().zip(other.class_perms.iter()).all(|(sup, sub)| sup.covers(sub))
    }
}

/// Per-kind name-to-scope tables for the whole policy.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScopeMap {
    tables: [HashMap<String, ScopeDatum>; 8],
}

impl ScopeMap {
    pub fn get(&self, kind: SymbolKind, name: &str) -> Option<&ScopeDatum> {
        self.tables[kind.index()].get(name)
    }

    pub fn insert(&mut self, kind: SymbolKind, name: impl Into<String>, datum: ScopeDatum) {
        self.tables[kind.index()].insert(name.into(), datum);
    }
}
