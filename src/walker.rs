// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The top-level translation driver: package prelude, policy capabilities,
//! and the walk over the decoded block tree.

use crate::emitter::CilEmitter;
use crate::error::TranslateError;
use crate::policy::{
    CapabilityNameLookup, KernelPolicyCapabilities, ModulePackage, PolicyDatabase, PolicyType,
};
use crate::rules::{Block, Decl};
use crate::symbols::{ScopeKind, SymbolKind};

use std::io::Write;

/// The level every context references when the policy carries no MLS data.
pub(crate) const DEFAULT_LEVEL: &str = "systemlow";

/// The role attached to objects, implicit in the legacy toolchain.
pub(crate) const DEFAULT_OBJECT: &str = "object_r";

/// Translates a decoded module package into CIL on `out`.
///
/// Policy capability names resolve through the kernel table; use
/// [`translate_with`] to supply a different lookup.
pub fn translate<W: Write>(package: &ModulePackage, out: W) -> Result<(), TranslateError> {
    translate_with(package, &KernelPolicyCapabilities, out)
}

/// Translates a decoded module package, resolving policy capability names
/// through `capabilities`.
pub fn translate_with<W: Write>(
    package: &ModulePackage,
    capabilities: &dyn CapabilityNameLookup,
    out: W,
) -> Result<(), TranslateError> {
    let mut translator = Translator::new(&package.policy, capabilities, out);
    translator.run(package)?;
    translator.out.flush()
}

/// Carries the state shared by every lowering routine: the read-only
/// database, the adjusted module name, the synthesized-attribute counter,
/// and the output emitter.
pub(crate) struct Translator<'p, W: Write> {
    pub(crate) db: &'p PolicyDatabase,
    pub(crate) module_name: String,
    pub(crate) capabilities: &'p dyn CapabilityNameLookup,
    pub(crate) attrs_synthesized: u32,
    pub(crate) out: CilEmitter<W>,
}

impl<'p, W: Write> Translator<'p, W> {
    pub(crate) fn new(
        db: &'p PolicyDatabase,
        capabilities: &'p dyn CapabilityNameLookup,
        out: W,
    ) -> Self {
        Self {
            db,
            module_name: db.adjusted_name(),
            capabilities,
            attrs_synthesized: 0,
            out: CilEmitter::new(out),
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests(db: &'p PolicyDatabase, out: W) -> Self {
        Self::new(db, &KernelPolicyCapabilities, out)
    }

    /// Emits the whole package: prelude, capabilities, object contexts,
    /// side-cars, and finally the scoped block tree.
    pub(crate) fn run(&mut self, package: &ModulePackage) -> Result<(), TranslateError> {
        let db = self.db;

        if db.policy_type == PolicyType::Base {
            if !db.mls {
                // Other non-MLS modules still reference a level in their
                // contexts; give them one to resolve against.
                self.out.line(0, "(sensitivity s0)")?;
                self.out.line(0, "(sensitivityorder (s0))")?;
                self.out.line(0, &format!("(level {DEFAULT_LEVEL} (s0))"))?;
            }
            self.out.line(0, &format!("(role {DEFAULT_OBJECT})"))?;
            self.out
                .line(0, &format!("(handleunknown {})", db.handle_unknown.token()))?;
            self.out.line(0, &format!("(mls {})", db.mls))?;
        }

        self.policy_capabilities()?;
        self.object_contexts()?;
        self.genfs_contexts()?;
        self.seusers(&package.seusers)?;
        self.netfilter_contexts(&package.netfilter_contexts);
        self.user_extra(&package.user_extra)?;
        self.file_contexts(&package.file_contexts)?;
        self.blocks()?;

        Ok(())
    }

    fn policy_capabilities(&mut self) -> Result<(), TranslateError> {
        let db = self.db;
        for id in db.policy_capabilities.iter() {
            let name = self
                .capabilities
                .capability_name(id)
                .ok_or(TranslateError::UnknownPolicyCapability { id })?
                .to_owned();
            self.out.line(0, &format!("(policycap {name})"))?;
        }
        Ok(())
    }

    /// Walks the block list. Each block's first decl is lowered; optional
    /// blocks open a named `(optional ...)` form, and a stack of required
    /// scopes decides how many enclosing optionals to close before a new
    /// one opens: an optional nests only while its requirements cover
    /// everything the enclosing optional required.
    fn blocks(&mut self) -> Result<(), TranslateError> {
        let db = self.db;
        let decl_roles = self.declared_role_names();
        let mut stack: Vec<&'p crate::symbols::ScopeIndex> = Vec::new();
        let mut indent = 0usize;

        for block in &db.blocks {
            let Some(decl) = block.decls.first() else {
                continue;
            };

            if block.decls.len() > 1 {
                tracing::warn!(
                    decl = decl.id,
                    "'else' blocks in optional statements are unsupported in the \
                     target language; dropping from output"
                );
            }

            if block.optional {
                while stack.len() > 1 && !decl.required.covers(stack[stack.len() - 1]) {
                    stack.pop();
                    indent = indent.saturating_sub(1);
                    self.out.line(indent, ")")?;
                }

                self.out.line(
                    indent,
                    &format!("(optional {}_optional_{}", self.module_name, decl.id),
                )?;
                indent += 1;
            }

            stack.push(&decl.required);

            if stack.len() == 1 {
                // Type aliases and commons live only in the global symbol
                // table; scoping-wise they belong to the global block.
                self.global_aliases_and_commons(indent)?;
            }

            self.decl_role_types(indent, decl, &decl_roles)?;
            self.declared_scopes(indent, block, decl)?;
            self.required_scopes(indent, block, decl)?;
            self.additive_scopes(indent, block, decl)?;
            self.av_rule_list(indent, &decl.av_rules)?;
            self.role_transitions(indent, &decl.role_transitions)?;
            self.role_allows(indent, &decl.role_allows)?;
            self.range_transitions(indent, &decl.range_transitions)?;
            self.filename_transitions(indent, &decl.filename_transitions)?;
            self.conditional_nodes(indent, &decl.conditionals)?;
        }

        while indent > 0 {
            indent -= 1;
            self.out.line(indent, ")")?;
        }

        Ok(())
    }

    /// Roles declared anywhere in the policy, excluding the implicit object
    /// role. Their per-decl type associations are re-derived while walking.
    fn declared_role_names(&self) -> Vec<&'p str> {
        let db = self.db;
        db.roles
            .iter()
            .filter(|(name, _)| *name != DEFAULT_OBJECT)
            .filter(|(name, _)| {
                matches!(
                    db.scope(SymbolKind::Role, name),
                    Some(scope) if scope.kind == ScopeKind::Declared
                )
            })
            .map(|(name, _)| name)
            .collect()
    }

    /// Re-associates declared roles with the types this decl declares. The
    /// binary form keeps role/type pairs only in the flattened role datum;
    /// the declaring decl is recovered through each type's scope record.
    fn decl_role_types(
        &mut self,
        indent: usize,
        decl: &Decl,
        decl_roles: &[&'p str],
    ) -> Result<(), TranslateError> {
        let db = self.db;
        for role_name in decl_roles {
            let role = db.roles.get(role_name).ok_or_else(|| TranslateError::MissingDatum {
                kind: SymbolKind::Role,
                name: (*role_name).to_owned(),
            })?;
            let types = self.type_set_names(indent, &role.types)?;
            for type_ in &types {
                let scope = db.scope(SymbolKind::Type, type_).ok_or_else(|| {
                    TranslateError::MissingScope {
                        kind: SymbolKind::Type,
                        name: type_.clone(),
                    }
                })?;
                if scope.decl_ids.contains(&decl.id) {
                    self.out.line(indent, &format!("(roletype {role_name} {type_})"))?;
                }
            }
        }
        Ok(())
    }

    /// Emits type aliases and common blocks with the global block.
    fn global_aliases_and_commons(&mut self, indent: usize) -> Result<(), TranslateError> {
        let db = self.db;
        for (name, type_) in db.types.iter() {
            if !type_.primary {
                self.type_declaration(indent, name, type_, ScopeKind::Declared)?;
            }
        }
        for (name, common) in db.commons.iter() {
            self.common_declaration(indent, name, common)?;
        }
        Ok(())
    }

    /// Lowers every symbol the decl declares, kind by kind, and the
    /// category/sensitivity orderings alongside their kinds.
    fn declared_scopes(
        &mut self,
        indent: usize,
        block: &Block,
        decl: &'p Decl,
    ) -> Result<(), TranslateError> {
        let db = self.db;
        for kind in SymbolKind::SCOPED {
            let map = decl.declared.map(kind);
            for index in map.iter() {
                let name = db.symbol_name(kind, index)?;
                let datum =
                    db.scoped_symbol(kind, name).ok_or_else(|| TranslateError::MissingDatum {
                        kind,
                        name: name.to_owned(),
                    })?;
                let scope = db.scope(kind, name).ok_or_else(|| TranslateError::MissingScope {
                    kind,
                    name: name.to_owned(),
                })?;
                self.lower_symbol(indent, block.optional, name, datum, scope.kind)?;
            }

            match kind {
                SymbolKind::Sensitivity if !map.is_empty() => {
                    let names = self.bitmap_names(kind, map)?;
                    self.out
                        .line(indent, &format!("(sensitivityorder ({}))", names.join(" ")))?;
                }
                SymbolKind::Category if !map.is_empty() => {
                    let names = self.bitmap_names(kind, map)?;
                    self.out.line(indent, &format!("(categoryorder ({}))", names.join(" ")))?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Lowers every symbol the decl requires. The individual lowerers skip
    /// the constructs a require block cannot carry.
    fn required_scopes(
        &mut self,
        indent: usize,
        block: &Block,
        decl: &'p Decl,
    ) -> Result<(), TranslateError> {
        let db = self.db;
        for kind in SymbolKind::SCOPED {
            for index in decl.required.map(kind).iter() {
                let name = db.symbol_name(kind, index)?;
                let datum =
                    db.scoped_symbol(kind, name).ok_or_else(|| TranslateError::MissingDatum {
                        kind,
                        name: name.to_owned(),
                    })?;
                self.lower_symbol(indent, block.optional, name, datum, ScopeKind::Required)?;
            }
        }
        Ok(())
    }

    /// Lowers the decl-local additive symbol tables: additions a module
    /// makes to names owned elsewhere, such as attribute memberships.
    fn additive_scopes(
        &mut self,
        indent: usize,
        block: &Block,
        decl: &'p Decl,
    ) -> Result<(), TranslateError> {
        use crate::declarations::SymbolDatumRef;

        let additive = &decl.additive;
        for (name, datum) in &additive.classes {
            self.lower_symbol(
                indent,
                block.optional,
                name,
                SymbolDatumRef::Class(datum),
                ScopeKind::Required,
            )?;
        }
        for (name, datum) in &additive.roles {
            self.lower_symbol(
                indent,
                block.optional,
                name,
                SymbolDatumRef::Role(datum),
                ScopeKind::Required,
            )?;
        }
        for (name, datum) in &additive.types {
            self.lower_symbol(
                indent,
                block.optional,
                name,
                SymbolDatumRef::Type(datum),
                ScopeKind::Required,
            )?;
        }
        for (name, datum) in &additive.users {
            self.lower_symbol(
                indent,
                block.optional,
                name,
                SymbolDatumRef::User(datum),
                ScopeKind::Required,
            )?;
        }
        for (name, datum) in &additive.booleans {
            self.lower_symbol(
                indent,
                block.optional,
                name,
                SymbolDatumRef::Boolean(datum),
                ScopeKind::Required,
            )?;
        }
        for (name, datum) in &additive.sensitivities {
            self.lower_symbol(
                indent,
                block.optional,
                name,
                SymbolDatumRef::Sensitivity(datum),
                ScopeKind::Required,
            )?;
        }
        for (name, datum) in &additive.categories {
            self.lower_symbol(
                indent,
                block.optional,
                name,
                SymbolDatumRef::Category(datum),
                ScopeKind::Required,
            )?;
        }
        Ok(())
    }
}
