// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Re-emission of the text side-cars embedded in a module package.
//!
//! All three tables are line-oriented: leading whitespace is trimmed, blank
//! lines and `#` comments are skipped, and any remaining line must parse.
//! A malformed line is fatal.

use crate::error::TranslateError;
use crate::walker::{Translator, DEFAULT_LEVEL};

use bstr::ByteSlice;
use std::io::Write;

const FILE_CONTEXTS: &str = "file_contexts";
const SEUSERS: &str = "seusers";
const USER_EXTRA: &str = "user_extra";

/// Yields the content lines of a side-car blob: trimmed, with blanks and
/// comments dropped.
fn content_lines(blob: &[u8]) -> impl Iterator<Item = &[u8]> {
    blob.lines().map(|line| line.trim()).filter(|line| !line.is_empty() && line[0] != b'#')
}

fn utf8_line<'a>(table: &'static str, line: &'a [u8]) -> Result<&'a str, TranslateError> {
    std::str::from_utf8(line).map_err(|_| TranslateError::invalid_line(table, line))
}

/// Renders a textual level `sens[:cats]`, with `cats` a comma-joined list
/// of category names or `lo.hi` ranges.
fn render_level(level: &str) -> String {
    let (sens, cats) = match level.split_once(':') {
        Some((sens, cats)) => (sens, Some(cats)),
        None => (level, None),
    };
    match cats {
        None => format!("({sens})"),
        Some(cats) => {
            let rendered: Vec<String> = cats
                .split(',')
                .map(|atom| match atom.split_once('.') {
                    Some((low, high)) => format!("(range {low} {high})"),
                    None => atom.to_owned(),
                })
                .collect();
            format!("({sens} ({}))", rendered.join(" "))
        }
    }
}

/// Renders a textual level range `low[-high]` as two levels.
fn render_level_range(range: &str) -> String {
    let (low, high) = match range.split_once('-') {
        Some((low, high)) => (low, high),
        None => (range, range),
    };
    format!("{} {}", render_level(low), render_level(high))
}

/// Renders a textual context `u:r:t[:range]`.
fn render_context(table: &'static str, context: &str) -> Result<String, TranslateError> {
    let mut fields = context.splitn(4, ':');
    let (user, role, type_) = match (fields.next(), fields.next(), fields.next()) {
        (Some(user), Some(role), Some(type_)) => (user, role, type_),
        _ => return Err(TranslateError::invalid_line(table, context.as_bytes())),
    };
    let range = match fields.next() {
        Some(range) => render_level_range(range),
        None => format!("{DEFAULT_LEVEL} {DEFAULT_LEVEL}"),
    };
    Ok(format!("({user} {role} {type_} ({range}))"))
}

fn file_mode(table: &'static str, mode: &str) -> Result<&'static str, TranslateError> {
    match mode {
        "--" => Ok("file"),
        "-d" => Ok("dir"),
        "-c" => Ok("char"),
        "-b" => Ok("block"),
        "-s" => Ok("socket"),
        "-p" => Ok("pipe"),
        "-l" => Ok("symlink"),
        _ => Err(TranslateError::invalid_line(table, mode.as_bytes())),
    }
}

impl<'p, W: Write> Translator<'p, W> {
    /// Lowers a file_contexts blob: `<regex> [<mode>] <context>` per line.
    pub(crate) fn file_contexts(&mut self, blob: &[u8]) -> Result<(), TranslateError> {
        for line in content_lines(blob) {
            let text = utf8_line(FILE_CONTEXTS, line)?;
            let fields: Vec<&str> = text.split_whitespace().collect();
            let (regex, mode, context) = match fields.as_slice() {
                [regex, context] => (*regex, "any", *context),
                [regex, mode, context] => (*regex, file_mode(FILE_CONTEXTS, mode)?, *context),
                _ => return Err(TranslateError::invalid_line(FILE_CONTEXTS, line)),
            };

            let rendered = if context == "<<none>>" {
                "()".to_owned()
            } else {
                render_context(FILE_CONTEXTS, context)?
            };
            self.out.line(0, &format!("(filecon \"{regex}\" \"\" {mode} {rendered})"))?;
        }
        Ok(())
    }

    /// Lowers a seusers blob: `<linux-user>:<selinux-user>[:<range>]` per
    /// line. The `__default__` user becomes the selinuxuserdefault.
    pub(crate) fn seusers(&mut self, blob: &[u8]) -> Result<(), TranslateError> {
        for line in content_lines(blob) {
            let text = utf8_line(SEUSERS, line)?;
            let mut fields = text.splitn(3, ':');
            let (user, seuser) = match (fields.next(), fields.next()) {
                (Some(user), Some(seuser)) if !seuser.is_empty() => (user, seuser),
                _ => return Err(TranslateError::invalid_line(SEUSERS, line)),
            };
            let range = match fields.next() {
                Some(range) => render_level_range(range),
                None => format!("{DEFAULT_LEVEL} {DEFAULT_LEVEL}"),
            };

            if user == "__default__" {
                self.out.line(0, &format!("(selinuxuserdefault {seuser} ({range}))"))?;
            } else {
                self.out.line(0, &format!("(selinuxuser {user} {seuser} ({range}))"))?;
            }
        }
        Ok(())
    }

    /// Lowers a user_extra blob: `user <name> prefix <prefix>;` per line.
    pub(crate) fn user_extra(&mut self, blob: &[u8]) -> Result<(), TranslateError> {
        for line in content_lines(blob) {
            let text = utf8_line(USER_EXTRA, line)?;
            let body = text
                .strip_suffix(';')
                .ok_or_else(|| TranslateError::invalid_line(USER_EXTRA, line))?;
            let fields: Vec<&str> = body.split_whitespace().collect();
            match fields.as_slice() {
                ["user", name, "prefix", prefix @ ..] if !prefix.is_empty() => {
                    self.out
                        .line(0, &format!("(userprefix {name} {})", prefix.join(" ")))?;
                }
                _ => return Err(TranslateError::invalid_line(USER_EXTRA, line)),
            }
        }
        Ok(())
    }

    /// The target language has no netfilter context statement; a non-empty
    /// blob is dropped with a warning.
    pub(crate) fn netfilter_contexts(&mut self, blob: &[u8]) {
        if !blob.is_empty() {
            tracing::warn!(
                "netfilter_contexts are unsupported in the target language; \
                 dropping from output"
            );
        }
    }
}
