//! Script loader.
//!
//! Reads a whole script into memory before it is evaluated. A leading
//! interpreter directive (`#!...`) is removed so executable scripts can be
//! run directly.

use std::{
    fs::File,
    io::{self, ErrorKind, Read},
    path::Path,
};

use crate::{diagnostics::Result, host_error, throw};

const CHUNK: usize = 1024;

/// Name reported for scripts read from standard input.
pub const STDIN_NAME: &str = "<stdin>";

/// Complete contents of one script, with any interpreter directive removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSource {
    name: String,
    bytes: Vec<u8>,
}

impl ScriptSource {
    /// Path or `<stdin>`; used in error reports.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// An empty source means there is nothing to evaluate.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_text(self) -> Result<String> {
        let name = self.name;
        String::from_utf8(self.bytes)
            .map_err(|err| host_error!(Io, "unable to load '{name}': {err}"))
    }
}

/// Reads the script at `path`, or standard input when `path` is `None`.
pub fn load_source(path: Option<&Path>) -> Result<ScriptSource> {
    match path {
        None => read_script(io::stdin().lock(), STDIN_NAME),
        Some(path) => {
            let name = path.display().to_string();
            tracing::debug!(script = %name, "opening script");
            match File::open(path) {
                Ok(file) => read_script(file, &name),
                Err(err) => throw!(Io, "unable to load '{name}': {err}"),
            }
        }
    }
}

/// Reads `reader` to the end in fixed-size chunks.
pub fn read_script<R: Read>(mut reader: R, name: &str) -> Result<ScriptSource> {
    let mut bytes = Vec::new();
    let mut chunk = [0u8; CHUNK];
    let mut directive_decided = false;
    loop {
        let read = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => throw!(Io, "unable to load '{name}': {err}"),
        };
        if bytes.capacity() - bytes.len() < read {
            bytes.reserve_exact(CHUNK);
        }
        bytes.extend_from_slice(&chunk[..read]);
        if !directive_decided {
            directive_decided = strip_directive(&mut bytes, false);
        }
    }
    if !directive_decided {
        strip_directive(&mut bytes, true);
    }
    Ok(ScriptSource {
        name: name.to_string(),
        bytes,
    })
}

/// Removes a leading `#!` line from `bytes`. Returns `false` while more input
/// is needed to decide.
fn strip_directive(bytes: &mut Vec<u8>, at_eof: bool) -> bool {
    match directive_end(bytes, at_eof) {
        Scan::NeedMore => false,
        Scan::Keep => true,
        Scan::Strip(end) => {
            bytes.drain(..end);
            true
        }
    }
}

enum Scan {
    NeedMore,
    Keep,
    Strip(usize),
}

fn directive_end(bytes: &[u8], at_eof: bool) -> Scan {
    let head = &bytes[..bytes.len().min(2)];
    if !b"#!".starts_with(head) {
        return Scan::Keep;
    }
    if head.len() < 2 {
        return if at_eof { Scan::Keep } else { Scan::NeedMore };
    }
    let Some(newline) = bytes.iter().position(|&b| b == b'\n' || b == b'\r') else {
        return if at_eof {
            Scan::Strip(bytes.len())
        } else {
            Scan::NeedMore
        };
    };
    match (bytes[newline], bytes.get(newline + 1)) {
        (b'\r', Some(b'\n')) => Scan::Strip(newline + 2),
        (b'\r', None) if !at_eof => Scan::NeedMore,
        _ => Scan::Strip(newline + 1),
    }
}
