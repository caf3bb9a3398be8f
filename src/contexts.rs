// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Security-context rendering and object-context lowering.

use crate::error::TranslateError;
use crate::policy::{
    GenfsEntry, InitialSidContext, ObjectContexts, SecurityContext, SelinuxContexts, XenContexts,
};
use crate::symbols::{MlsLevel, SemanticLevel, SemanticRange, SymbolKind};
use crate::walker::{Translator, DEFAULT_LEVEL};

use std::io::Write;

/// Initial-sid names for SELinux policies, indexed by sid id. The binary
/// format stores only the numeric ids; the names are fixed by the kernel.
const SELINUX_INITIAL_SID_NAMES: [&str; 28] = [
    "null",
    "kernel",
    "security",
    "unlabeled",
    "fs",
    "file",
    "file_labels",
    "init",
    "any_socket",
    "port",
    "netif",
    "netmsg",
    "node",
    "igmp_packet",
    "icmp_socket",
    "tcp_socket",
    "sysctl_modprobe",
    "sysctl",
    "sysctl_fs",
    "sysctl_kernel",
    "sysctl_net",
    "sysctl_net_unix",
    "sysctl_vm",
    "sysctl_dev",
    "kmod",
    "policy",
    "scmp_packet",
    "devnull",
];

/// Initial-sid names for Xen policies, taken from the Xen hypervisor.
const XEN_INITIAL_SID_NAMES: [&str; 11] = [
    "null",
    "xen",
    "dom0",
    "domio",
    "domxen",
    "unlabeled",
    "security",
    "ioport",
    "iomem",
    "irq",
    "device",
];

/// How stored sensitivity numbers in a semantic level map to table indices.
/// Sensitivities referenced by user statements inside optional blocks are
/// already zero-based; everywhere else they are one-based values.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum SensitivityOffset {
    Value,
    Index,
}

impl<'p, W: Write> Translator<'p, W> {
    /// Renders a semantic MLS level: `(<sens>)` or
    /// `(<sens> (<cat> (range <lo> <hi>) ...))`.
    pub(crate) fn render_semantic_level(
        &self,
        level: &SemanticLevel,
        offset: SensitivityOffset,
    ) -> Result<String, TranslateError> {
        let db = self.db;
        let sens = match offset {
            SensitivityOffset::Value => db.value_name(SymbolKind::Sensitivity, level.sensitivity)?,
            SensitivityOffset::Index => db.symbol_name(SymbolKind::Sensitivity, level.sensitivity)?,
        };

        if level.categories.is_empty() {
            return Ok(format!("({sens})"));
        }

        let mut spans = Vec::with_capacity(level.categories.len());
        for span in &level.categories {
            if span.low == span.high {
                spans.push(db.value_name(SymbolKind::Category, span.low)?.to_owned());
            } else {
                spans.push(format!(
                    "(range {} {})",
                    db.value_name(SymbolKind::Category, span.low)?,
                    db.value_name(SymbolKind::Category, span.high)?,
                ));
            }
        }
        Ok(format!("({sens} ({}))", spans.join(" ")))
    }

    /// Renders a semantic range as its two levels separated by a space.
    pub(crate) fn render_semantic_range(
        &self,
        range: &SemanticRange,
        offset: SensitivityOffset,
    ) -> Result<String, TranslateError> {
        Ok(format!(
            "{} {}",
            self.render_semantic_level(&range.low, offset)?,
            self.render_semantic_level(&range.high, offset)?,
        ))
    }

    /// Renders a concrete MLS level: `(<sens>)` or `(<sens> (<cats>))`.
    fn render_mls_level(&self, level: &MlsLevel) -> Result<String, TranslateError> {
        let db = self.db;
        let sens = db.value_name(SymbolKind::Sensitivity, level.sensitivity)?;
        if level.categories.is_empty() {
            return Ok(format!("({sens})"));
        }
        let cats = self.bitmap_names(SymbolKind::Category, &level.categories)?;
        Ok(format!("({sens} ({}))", cats.join(" ")))
    }

    /// Renders a security context: `(<user> <role> <type> (<low> <high>))`.
    /// Non-MLS policies reference the default level twice so downstream
    /// consumers always see a range.
    pub(crate) fn render_context(
        &self,
        context: &SecurityContext,
    ) -> Result<String, TranslateError> {
        let db = self.db;
        let user = db.value_name(SymbolKind::User, context.user)?;
        let role = db.value_name(SymbolKind::Role, context.role)?;
        let type_ = db.value_name(SymbolKind::Type, context.type_)?;
        let range = if db.mls {
            format!(
                "{} {}",
                self.render_mls_level(&context.range.low)?,
                self.render_mls_level(&context.range.high)?,
            )
        } else {
            format!("{DEFAULT_LEVEL} {DEFAULT_LEVEL}")
        };
        Ok(format!("({user} {role} {type_} ({range}))"))
    }

    /// Lowers the object contexts of the policy's target platform, slot by
    /// slot in serialized order.
    pub(crate) fn object_contexts(&mut self) -> Result<(), TranslateError> {
        let db = self.db;
        match &db.object_contexts {
            ObjectContexts::Selinux(contexts) => self.selinux_contexts(contexts),
            ObjectContexts::Xen(contexts) => self.xen_contexts(contexts),
        }
    }

    fn selinux_contexts(&mut self, contexts: &'p SelinuxContexts) -> Result<(), TranslateError> {
        self.initial_sids(&contexts.initial_sids, &SELINUX_INITIAL_SID_NAMES)?;

        if !contexts.filesystems.is_empty() {
            tracing::warn!(
                "'fscon' statement unsupported in the target language; dropping from output"
            );
        }

        for port in &contexts.ports {
            let range = if port.low == port.high {
                format!("{}", port.low)
            } else {
                format!("({} {})", port.low, port.high)
            };
            let context = self.render_context(&port.context)?;
            self.out.line(
                0,
                &format!("(portcon {} {range} {context})", port.protocol.token()),
            )?;
        }

        for netif in &contexts.netifs {
            let interface = self.render_context(&netif.interface_context)?;
            let packet = self.render_context(&netif.packet_context)?;
            self.out.line(0, &format!("(netifcon {} {interface} {packet})", netif.name))?;
        }

        for node in &contexts.nodes {
            let context = self.render_context(&node.context)?;
            self.out
                .line(0, &format!("(nodecon {} {} {context})", node.address, node.mask))?;
        }

        for fs_use in &contexts.fs_uses {
            let context = self.render_context(&fs_use.context)?;
            self.out.line(
                0,
                &format!("(fsuse {} {} {context})", fs_use.behavior.token(), fs_use.name),
            )?;
        }

        for node in &contexts.nodes6 {
            let context = self.render_context(&node.context)?;
            self.out
                .line(0, &format!("(nodecon {} {} {context})", node.address, node.mask))?;
        }

        Ok(())
    }

    fn xen_contexts(&mut self, contexts: &'p XenContexts) -> Result<(), TranslateError> {
        self.initial_sids(&contexts.initial_sids, &XEN_INITIAL_SID_NAMES)?;

        for pirq in &contexts.pirqs {
            let context = self.render_context(&pirq.context)?;
            self.out.line(0, &format!("(pirqcon {} {context})", pirq.pirq))?;
        }

        for ioport in &contexts.ioports {
            let range = if ioport.low == ioport.high {
                format!("{}", ioport.low)
            } else {
                format!("({} {})", ioport.low, ioport.high)
            };
            let context = self.render_context(&ioport.context)?;
            self.out.line(0, &format!("(ioportcon {range} {context})"))?;
        }

        // Iomem renders with an uppercase hex prefix and pcidevice with a
        // lowercase one, matching the reference translator byte-for-byte.
        for iomem in &contexts.iomems {
            let range = if iomem.low == iomem.high {
                format!("0X{:X}", iomem.low)
            } else {
                format!("(0X{:X} 0X{:X})", iomem.low, iomem.high)
            };
            let context = self.render_context(&iomem.context)?;
            self.out.line(0, &format!("(iomemcon {range} {context})"))?;
        }

        for device in &contexts.pci_devices {
            let context = self.render_context(&device.context)?;
            self.out.line(0, &format!("(pcidevicecon {:#x} {context})", device.device))?;
        }

        Ok(())
    }

    /// Emits `(sid ...)` and `(sidcontext ...)` per initial sid in source
    /// order, then a `(sidorder ...)` listing the names in reverse arrival
    /// order.
    fn initial_sids(
        &mut self,
        sids: &[InitialSidContext],
        names: &[&str],
    ) -> Result<(), TranslateError> {
        let mut order = Vec::with_capacity(sids.len());
        for sid in sids {
            let name = *names.get(sid.sid as usize).ok_or(TranslateError::UnknownInitialSid {
                sid: sid.sid,
                limit: names.len(),
            })?;
            self.out.line(0, &format!("(sid {name})"))?;
            let context = self.render_context(&sid.context)?;
            self.out.line(0, &format!("(sidcontext {name} {context})"))?;
            order.insert(0, name);
        }

        if !order.is_empty() {
            self.out.line(0, &format!("(sidorder ({}))", order.join(" ")))?;
        }

        Ok(())
    }

    /// Emits one `(genfscon ...)` per labeled path of every genfs entry.
    pub(crate) fn genfs_contexts(&mut self) -> Result<(), TranslateError> {
        let db = self.db;
        let genfs: &'p [GenfsEntry] = &db.genfs;
        for entry in genfs {
            for path in &entry.contexts {
                let context = self.render_context(&path.context)?;
                self.out.line(
                    0,
                    &format!("(genfscon {} {} {context})", entry.fstype, path.path),
                )?;
            }
        }
        Ok(())
    }
}
