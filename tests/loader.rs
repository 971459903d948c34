use std::io::{self, Cursor, Read};

use resin::{
    loader::{load_source, read_script},
    HostErrorKind,
};
use tempfile::tempdir;

/// Hands out at most `step` bytes per call and fails every other call with
/// `Interrupted`.
struct Trickle {
    data: Vec<u8>,
    pos: usize,
    step: usize,
    interrupt: bool,
}

impl Trickle {
    fn new(data: &[u8], step: usize) -> Self {
        Self {
            data: data.to_vec(),
            pos: 0,
            step,
            interrupt: true,
        }
    }
}

impl Read for Trickle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.interrupt = !self.interrupt;
        if self.interrupt {
            return Err(io::Error::new(io::ErrorKind::Interrupted, "try again"));
        }
        let end = (self.pos + self.step).min(self.data.len()).min(self.pos + buf.len());
        let read = end - self.pos;
        buf[..read].copy_from_slice(&self.data[self.pos..end]);
        self.pos = end;
        Ok(read)
    }
}

fn read(input: &[u8]) -> Vec<u8> {
    read_script(Cursor::new(input.to_vec()), "test")
        .expect("read succeeds")
        .as_bytes()
        .to_vec()
}

#[test]
fn strips_interpreter_directive() {
    assert_eq!(read(b"#!/usr/bin/env resin\nprint(1)"), b"print(1)");
}

#[test]
fn strips_directive_with_crlf_ending() {
    assert_eq!(read(b"#!/usr/bin/env resin\r\nprint(1)\r\n"), b"print(1)\r\n");
}

#[test]
fn unterminated_directive_leaves_nothing() {
    let source = read_script(Cursor::new(b"#!/usr/bin/env resin".to_vec()), "test")
        .expect("read succeeds");
    assert!(source.is_empty());
}

#[test]
fn keeps_scripts_without_directive() {
    assert_eq!(read(b"# comment-like\nprint(1)"), b"# comment-like\nprint(1)");
    assert_eq!(read(b"#"), b"#");
    assert_eq!(read(b"print(\"#!\")"), b"print(\"#!\")");
}

#[test]
fn empty_input_is_empty_source() {
    let source = read_script(Cursor::new(Vec::new()), "empty").expect("read succeeds");
    assert!(source.is_empty());
    assert_eq!(source.len(), 0);
    assert_eq!(source.name(), "empty");
}

#[test]
fn reads_inputs_larger_than_one_chunk() {
    let body = "print(1)\n".repeat(500);
    let input = format!("#!/usr/bin/env resin\n{body}");
    assert!(input.len() > 4096);
    assert_eq!(read(input.as_bytes()), body.as_bytes());
}

#[test]
fn directive_split_across_reads_is_still_stripped() {
    let body = "var x = 1\n".repeat(300);
    let input = format!("#!/usr/local/bin/resin --some-flag\r\n{body}");
    let source = read_script(Trickle::new(input.as_bytes(), 3), "trickle").expect("read succeeds");
    assert_eq!(source.as_bytes(), body.as_bytes());
}

#[test]
fn text_conversion_rejects_invalid_utf8() {
    let source = read_script(Cursor::new(vec![b'p', 0xff, 0xfe]), "binary").expect("read succeeds");
    let err = source.into_text().expect_err("invalid UTF-8 must fail");
    assert_eq!(err.host_kind(), Some(HostErrorKind::Io));
    assert!(err.message().contains("unable to load 'binary'"));
}

#[test]
fn missing_file_is_an_io_exception() {
    let dir = tempdir().expect("create temp dir");
    let path = dir.path().join("nowhere.rsn");
    let err = load_source(Some(&path)).expect_err("missing file must fail");
    assert_eq!(err.host_kind(), Some(HostErrorKind::Io));
    assert_eq!(err.error_name(), "ResinError");
    assert!(err.message().contains("unable to load"), "{}", err.message());
}

#[test]
fn loaded_file_keeps_its_name() {
    let dir = tempdir().expect("create temp dir");
    let path = dir.path().join("named.rsn");
    std::fs::write(&path, "#!resin\n1 + 1\n").expect("write script");
    let source = load_source(Some(&path)).expect("load succeeds");
    assert_eq!(source.name(), path.display().to_string());
    assert_eq!(source.as_bytes(), b"1 + 1\n");
}
