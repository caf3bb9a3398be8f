// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::error::TranslateError;

use std::io::Write;

/// Spaces written per indentation level.
const INDENT_WIDTH: usize = 4;

/// Writes the translated policy as indented prefix-form lines. Every write
/// is synchronous and the first failure aborts the translation; the emitter
/// buffers nothing itself.
#[derive(Debug)]
pub struct CilEmitter<W: Write> {
    sink: W,
}

impl<W: Write> CilEmitter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    /// Writes `level` levels of indentation.
    pub fn indent(&mut self, level: usize) -> Result<(), TranslateError> {
        write!(self.sink, "{:width$}", "", width = level * INDENT_WIDTH)?;
        Ok(())
    }

    /// Writes `text` as-is.
    pub fn write(&mut self, text: &str) -> Result<(), TranslateError> {
        self.sink.write_all(text.as_bytes())?;
        Ok(())
    }

    /// Writes one complete line at the given indentation level.
    pub fn line(&mut self, level: usize, text: &str) -> Result<(), TranslateError> {
        self.indent(level)?;
        self.sink.write_all(text.as_bytes())?;
        self.sink.write_all(b"\n")?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), TranslateError> {
        self.sink.flush()?;
        Ok(())
    }
}
