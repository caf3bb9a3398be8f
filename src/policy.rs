// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The decoded policy database and the module package that carries it.

use crate::bitmap::Bitmap;
use crate::error::TranslateError;
use crate::rules::Block;
use crate::symbols::{
    BooleanDatum, CategoryDatum, ClassDatum, CommonDatum, LevelDatum, MlsRange, RoleDatum,
    ScopeDatum, ScopeMap, SymbolKind, SymbolTable, TypeDatum, UserDatum,
};

use std::fs::File;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Whether the policy is a base policy or a loadable module.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PolicyType {
    Base,
    Module,
}

/// The way queries against unknown classes and permissions are handled.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HandleUnknown {
    Deny,
    Reject,
    Allow,
}

impl HandleUnknown {
    pub fn token(self) -> &'static str {
        match self {
            HandleUnknown::Deny => "deny",
            HandleUnknown::Reject => "reject",
            HandleUnknown::Allow => "allow",
        }
    }
}

/// A security context attached to an object, with all fields stored as
/// symbol values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SecurityContext {
    pub user: u32,
    pub role: u32,
    pub type_: u32,
    pub range: MlsRange,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InitialSidContext {
    /// Numeric id of the initial sid; names come from a fixed per-platform
    /// table because the binary format does not store them.
    pub sid: u32,
    pub context: SecurityContext,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn token(self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PortContext {
    pub protocol: Protocol,
    pub low: u16,
    pub high: u16,
    pub context: SecurityContext,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NetifContext {
    pub name: String,
    pub interface_context: SecurityContext,
    pub packet_context: SecurityContext,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NodeContext {
    pub address: Ipv4Addr,
    pub mask: Ipv4Addr,
    pub context: SecurityContext,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node6Context {
    pub address: Ipv6Addr,
    pub mask: Ipv6Addr,
    pub context: SecurityContext,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FsUseBehavior {
    Xattr,
    Trans,
    Task,
}

impl FsUseBehavior {
    pub fn token(self) -> &'static str {
        match self {
            FsUseBehavior::Xattr => "xattr",
            FsUseBehavior::Trans => "trans",
            FsUseBehavior::Task => "task",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FsUseContext {
    pub behavior: FsUseBehavior,
    pub name: String,
    pub context: SecurityContext,
}

/// A labeled filesystem context. The target language has no rendering for
/// these; non-empty lists are dropped with a warning.
#[derive(Clone, Debug, PartialEq)]
pub struct FilesystemContext {
    pub name: String,
    pub context: SecurityContext,
}

#[derive(Clone, Debug, PartialEq)]
pub struct XenPirqContext {
    pub pirq: u32,
    pub context: SecurityContext,
}

#[derive(Clone, Debug, PartialEq)]
pub struct XenIoportContext {
    pub low: u32,
    pub high: u32,
    pub context: SecurityContext,
}

#[derive(Clone, Debug, PartialEq)]
pub struct XenIomemContext {
    pub low: u64,
    pub high: u64,
    pub context: SecurityContext,
}

#[derive(Clone, Debug, PartialEq)]
pub struct XenPciDeviceContext {
    pub device: u64,
    pub context: SecurityContext,
}

/// Object contexts of a policy targeting SELinux, in their serialized slot
/// order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SelinuxContexts {
    pub initial_sids: Vec<InitialSidContext>,
    pub filesystems: Vec<FilesystemContext>,
    pub ports: Vec<PortContext>,
    pub netifs: Vec<NetifContext>,
    pub nodes: Vec<NodeContext>,
    pub fs_uses: Vec<FsUseContext>,
    pub nodes6: Vec<Node6Context>,
}

/// Object contexts of a policy targeting Xen.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct XenContexts {
    pub initial_sids: Vec<InitialSidContext>,
    pub pirqs: Vec<XenPirqContext>,
    pub ioports: Vec<XenIoportContext>,
    pub iomems: Vec<XenIomemContext>,
    pub pci_devices: Vec<XenPciDeviceContext>,
}

/// Object contexts, tagged by target platform.
#[derive(Clone, Debug, PartialEq)]
pub enum ObjectContexts {
    Selinux(SelinuxContexts),
    Xen(XenContexts),
}

impl Default for ObjectContexts {
    fn default() -> Self {
        ObjectContexts::Selinux(SelinuxContexts::default())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GenfsPathContext {
    pub path: String,
    pub context: SecurityContext,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GenfsEntry {
    pub fstype: String,
    pub contexts: Vec<GenfsPathContext>,
}

/// A fully decoded policy database. The translator reads it; nothing
/// mutates it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PolicyDatabase {
    /// Module name as stored in the package. Base policies carry none.
    pub name: Option<String>,
    pub policy_type: PolicyType,
    pub mls: bool,
    pub handle_unknown: HandleUnknown,
    pub policy_capabilities: Bitmap,
    pub commons: SymbolTable<CommonDatum>,
    pub classes: SymbolTable<ClassDatum>,
    pub roles: SymbolTable<RoleDatum>,
    pub types: SymbolTable<TypeDatum>,
    pub users: SymbolTable<UserDatum>,
    pub booleans: SymbolTable<BooleanDatum>,
    pub sensitivities: SymbolTable<LevelDatum>,
    pub categories: SymbolTable<CategoryDatum>,
    pub scopes: ScopeMap,
    pub blocks: Vec<Block>,
    pub object_contexts: ObjectContexts,
    pub genfs: Vec<GenfsEntry>,
}

impl Default for PolicyType {
    fn default() -> Self {
        PolicyType::Base
    }
}

impl Default for HandleUnknown {
    fn default() -> Self {
        HandleUnknown::Deny
    }
}

impl PolicyDatabase {
    /// The name at zero-based `index` in the `kind` table.
    pub fn symbol_name(&self, kind: SymbolKind, index: u32) -> Result<&str, TranslateError> {
        let name = match kind {
            SymbolKind::Common => self.commons.name_at(index),
            SymbolKind::Class => self.classes.name_at(index),
            SymbolKind::Role => self.roles.name_at(index),
            SymbolKind::Type => self.types.name_at(index),
            SymbolKind::User => self.users.name_at(index),
            SymbolKind::Boolean => self.booleans.name_at(index),
            SymbolKind::Sensitivity => self.sensitivities.name_at(index),
            SymbolKind::Category => self.categories.name_at(index),
        };
        name.ok_or(TranslateError::UnknownSymbolIndex {
            kind,
            index,
            len: self.symbol_count(kind),
        })
    }

    /// The name for the one-based stored `value` in the `kind` table. All
    /// value-to-name offsets live here; lowering code never subtracts one
    /// itself.
    pub fn value_name(&self, kind: SymbolKind, value: u32) -> Result<&str, TranslateError> {
        let index = value.checked_sub(1).ok_or(TranslateError::NullSymbolValue { kind })?;
        self.symbol_name(kind, index)
    }

    pub fn symbol_count(&self, kind: SymbolKind) -> usize {
        match kind {
            SymbolKind::Common => self.commons.len(),
            SymbolKind::Class => self.classes.len(),
            SymbolKind::Role => self.roles.len(),
            SymbolKind::Type => self.types.len(),
            SymbolKind::User => self.users.len(),
            SymbolKind::Boolean => self.booleans.len(),
            SymbolKind::Sensitivity => self.sensitivities.len(),
            SymbolKind::Category => self.categories.len(),
        }
    }

    pub fn scope(&self, kind: SymbolKind, name: &str) -> Option<&ScopeDatum> {
        self.scopes.get(kind, name)
    }

    /// The module name adjusted for use in generated identifiers: base
    /// policies are named `base`, and any character CIL identifiers cannot
    /// carry becomes `_`.
    pub fn adjusted_name(&self) -> String {
        let raw = match self.policy_type {
            PolicyType::Base => "base",
            PolicyType::Module => self.name.as_deref().unwrap_or("base"),
        };
        raw.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect()
    }
}

/// Resolves a class-relative permission bitmask into permission names.
pub trait PermissionDecoder {
    /// The names selected by `mask` for the class with stored value
    /// `class`, in ascending bit order.
    fn permission_names(&self, class: u32, mask: u32) -> Result<Vec<String>, TranslateError>;
}

impl PermissionDecoder for PolicyDatabase {
    fn permission_names(&self, class: u32, mask: u32) -> Result<Vec<String>, TranslateError> {
        let class_name = self.value_name(SymbolKind::Class, class)?;
        let datum = self.classes.get(class_name).ok_or_else(|| TranslateError::MissingDatum {
            kind: SymbolKind::Class,
            name: class_name.to_owned(),
        })?;
        let common = datum.common.as_deref().and_then(|name| self.commons.get(name));

        let mut names = Vec::with_capacity(mask.count_ones() as usize);
        for bit in 0..u32::BITS {
            if mask & (1 << bit) == 0 {
                continue;
            }
            let value = bit + 1;
            let found = datum
                .permissions
                .iter()
                .chain(common.into_iter().flat_map(|c| c.permissions.iter()))
                .find(|perm| perm.value == value);
            match found {
                Some(perm) => names.push(perm.name.clone()),
                None => {
                    return Err(TranslateError::UnknownPermissionBit {
                        class: class_name.to_owned(),
                        bit: value,
                    })
                }
            }
        }
        Ok(names)
    }
}

/// Resolves policy-capability bit positions to their kernel names.
pub trait CapabilityNameLookup {
    fn capability_name(&self, id: u32) -> Option<&str>;
}

/// The kernel's policy-capability name table, indexed by bit position.
#[derive(Clone, Copy, Debug, Default)]
pub struct KernelPolicyCapabilities;

const POLICY_CAPABILITY_NAMES: &[&str] = &[
    "network_peer_controls",
    "open_perms",
    "extended_socket_class",
    "always_check_network",
    "cgroup_seclabel",
    "nnp_nosuid_transition",
    "genfs_seclabel_symlinks",
    "ioctl_skip_cloexec",
];

impl CapabilityNameLookup for KernelPolicyCapabilities {
    fn capability_name(&self, id: u32) -> Option<&str> {
        POLICY_CAPABILITY_NAMES.get(id as usize).copied()
    }
}

/// A policy module package: the decoded database plus the text side-cars
/// embedded alongside it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModulePackage {
    pub policy: PolicyDatabase,
    pub file_contexts: Vec<u8>,
    pub seusers: Vec<u8>,
    pub user_extra: Vec<u8>,
    pub netfilter_contexts: Vec<u8>,
}

/// The bytes a decoder consumes: an open file for seekable inputs, or a
/// fully buffered copy for pipes and sockets.
#[derive(Debug)]
pub enum PackageSource {
    File(File),
    Buffer(Vec<u8>),
}

/// Decodes a serialized policy module package. Implementations own the
/// binary format; this crate only consumes the decoded result.
pub trait PolicyDecoder {
    fn decode(&self, source: PackageSource) -> anyhow::Result<ModulePackage>;
}
