// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The one-shot driver surface: argument layout, input acquisition, and the
//! output-file lifecycle. The binary policy decoder is injected; this crate
//! never parses the serialized format itself.

use crate::policy::{PackageSource, PolicyDecoder};
use crate::translate;

use anyhow::Context as _;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Initial capacity of the buffer non-seekable inputs are read into. Grows
/// by doubling; this holds about half of the packages seen in practice.
const INITIAL_BUFFER_SIZE: usize = 128 * 1024;

/// Read an SELinux policy module package and output the equivalent CIL.
///
/// `argh`'s derive macro only allows the last positional field to be
/// optional, but this command's grammar (`[IN [OUT]]`) needs both to be
/// optional together, so `FromArgs` is implemented by hand below instead of
/// derived.
#[derive(Debug, PartialEq)]
pub struct Args {
    /// policy package to read, or - for standard input
    pub input: Option<PathBuf>,

    /// file to write the CIL policy to, or - for standard output
    pub output: Option<PathBuf>,
}

impl argh::FromArgs for Args {
    fn from_args(command_name: &[&str], args: &[&str]) -> Result<Self, argh::EarlyExit> {
        let usage = || argh::EarlyExit {
            output: format!(
                "Usage: {} [<input>] [<output>]\n\n\
                 Read an SELinux policy module package and output the equivalent CIL.\n\n\
                 Positional Arguments:\n\
                 \x20 input             policy package to read, or - for standard input\n\
                 \x20 output            file to write the CIL policy to, or - for standard output\n\n\
                 Options:\n\
                 \x20 --help, help      display usage information\n",
                command_name.join(" ")
            ),
            status: Ok(()),
        };

        let mut positional = Vec::new();
        for arg in args {
            match *arg {
                "--help" | "-h" | "help" => return Err(usage()),
                _ if positional.len() < 2 => positional.push(PathBuf::from(arg)),
                _ => {
                    return Err(argh::EarlyExit {
                        output: format!("Unrecognized argument: {arg}\n"),
                        status: Err(()),
                    });
                }
            }
        }

        let mut positional = positional.into_iter();
        Ok(Args { input: positional.next(), output: positional.next() })
    }
}

/// Reads `reader` to completion into a growable buffer, starting at
/// [`INITIAL_BUFFER_SIZE`] and doubling on fill.
pub fn read_to_buffer(mut reader: impl Read) -> std::io::Result<Vec<u8>> {
    let mut data = vec![0u8; INITIAL_BUFFER_SIZE];
    let mut len = 0;
    loop {
        let read = reader.read(&mut data[len..])?;
        if read == 0 {
            break;
        }
        len += read;
        if len == data.len() {
            let doubled = data.len() * 2;
            data.resize(doubled, 0);
        }
    }
    data.truncate(len);
    Ok(data)
}

/// Opens the input as a [`PackageSource`]. Standard input is always
/// buffered; named pipes and sockets are buffered too, because decoders
/// seek. Regular files pass through as handles.
fn open_input(path: Option<&Path>) -> anyhow::Result<PackageSource> {
    let path = match path {
        Some(path) if path.as_os_str() != "-" => path,
        _ => {
            let data = read_to_buffer(std::io::stdin().lock())
                .context("reading policy package from standard input")?;
            return Ok(PackageSource::Buffer(data));
        }
    };

    let file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let file_type = file
        .metadata()
        .with_context(|| format!("failed to stat {}", path.display()))?
        .file_type();

    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;
        if file_type.is_fifo() || file_type.is_socket() {
            let data = read_to_buffer(file)
                .with_context(|| format!("reading policy package from {}", path.display()))?;
            return Ok(PackageSource::Buffer(data));
        }
    }
    let _ = file_type;

    Ok(PackageSource::File(file))
}

/// Runs one translation: open input, create output, decode, translate. An
/// output file this run created is removed again when anything fails;
/// pre-existing files are never clobbered or removed.
pub fn run<D: PolicyDecoder>(decoder: &D, args: Args) -> anyhow::Result<()> {
    let source = open_input(args.input.as_deref())?;

    match args.output.filter(|path| path.as_os_str() != "-") {
        Some(path) => {
            let file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            let result =
                decode_and_translate(decoder, source, Box::new(std::io::BufWriter::new(file)));
            if result.is_err() {
                let _ = std::fs::remove_file(&path);
            }
            result
        }
        None => decode_and_translate(decoder, source, Box::new(std::io::stdout().lock())),
    }
}

fn decode_and_translate<D: PolicyDecoder>(
    decoder: &D,
    source: PackageSource,
    out: Box<dyn Write>,
) -> anyhow::Result<()> {
    let package = decoder.decode(source).context("reading policy package")?;
    translate(&package, out).context("translating policy package")?;
    Ok(())
}
