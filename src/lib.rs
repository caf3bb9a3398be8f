// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! One-shot translation of compiled SELinux policy module packages into the
//! CIL policy language.
//!
//! The legacy toolchain compiles policy sources into a compact binary
//! "policy package"; the current toolchain consumes textual s-expressions.
//! This crate is the bridge: given a package decoded into a
//! [`PolicyDatabase`] (plus its embedded text side-cars), [`translate`]
//! walks the database and emits the equivalent CIL declarations, one
//! top-level form per line.
//!
//! Decoding the binary format is deliberately out of scope: callers supply
//! a [`PolicyDecoder`] and this crate supplies everything after it, from
//! the base-module prelude through the scoped block tree. The [`cli`]
//! module carries the driver surface a wrapping binary needs: argument
//! layout, pipe-vs-file input buffering, and output-file cleanup.

pub mod bitmap;
pub mod cli;
pub mod emitter;
pub mod error;
pub mod policy;
pub mod rules;
pub mod symbols;

mod avrules;
mod conditionals;
mod constraints;
mod contexts;
mod declarations;
mod expand;
mod sidecars;
mod walker;

pub use error::TranslateError;
pub use policy::{
    CapabilityNameLookup, KernelPolicyCapabilities, ModulePackage, PackageSource, PermissionDecoder,
    PolicyDatabase, PolicyDecoder,
};
pub use walker::{translate, translate_with};
