//! Wire protocol codec: command lines in, status lines out
//!
//! Grammar (one command per line, case-sensitive):
//!
//! ```text
//! LIST                          -> OK\n<size>\n<size bytes of listing>
//! GET <filename>                -> OK\n<size>\n<size raw file bytes>
//! PUT <filename>\n<size>\n<..>  -> OK\n
//! QUIT                          -> (connection closes, no reply)
//! anything else                 -> ERR\nUnknown command\n
//! ```
//!
//! Any failure is `ERR\n<message>\n`. PUT is asymmetric: the client sends the
//! size line and raw bytes unprompted as part of the request.

use anyhow::{bail, Result};
use std::io::{BufRead, Write};
use std::path::Path;

use crate::framing::{read_line, send_line};

pub const DEFAULT_PORT: u16 = 12345;

/// One parsed command line. Filenames are the raw remainder after the
/// 4-character `GET `/`PUT ` prefix, spaces included, not yet validated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    List,
    Get(String),
    Put(String),
    Quit,
    Unknown(String),
}

impl Request {
    pub fn parse(line: &str) -> Request {
        if let Some(name) = line.strip_prefix("GET ") {
            Request::Get(name.to_string())
        } else if let Some(name) = line.strip_prefix("PUT ") {
            Request::Put(name.to_string())
        } else if line.starts_with("LIST") {
            Request::List
        } else if line.starts_with("QUIT") {
            Request::Quit
        } else {
            Request::Unknown(line.to_string())
        }
    }
}

pub fn send_ok<W: Write + ?Sized>(w: &mut W) -> Result<()> {
    send_line(w, "OK")
}

/// `OK` followed by the decimal byte count of the payload that follows.
pub fn send_ok_sized<W: Write + ?Sized>(w: &mut W, size: u64) -> Result<()> {
    send_line(w, "OK")?;
    send_line(w, &size.to_string())
}

pub fn send_err<W: Write + ?Sized>(w: &mut W, msg: &str) -> Result<()> {
    send_line(w, "ERR")?;
    send_line(w, msg)
}

/// Response header as seen from the initiating side.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Header {
    /// `OK` with a declared payload size.
    Ok(u64),
    /// `ERR` with the server's message.
    Err(String),
}

/// Read a status line plus its size or message line. Errors if the stream
/// closes before a full header arrives or the status token is unrecognized.
pub fn read_header<R: BufRead + ?Sized>(r: &mut R) -> Result<Header> {
    let status = match read_line(r)? {
        Some(s) => s,
        None => bail!("connection closed before response"),
    };
    match status.as_str() {
        "OK" => {
            let size_line = match read_line(r)? {
                Some(s) => s,
                None => bail!("connection closed before size line"),
            };
            let size: u64 = size_line
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid size line: {:?}", size_line))?;
            Ok(Header::Ok(size))
        }
        "ERR" => {
            let msg = match read_line(r)? {
                Some(s) => s,
                None => bail!("connection closed before error message"),
            };
            Ok(Header::Err(msg))
        }
        other => bail!("unexpected response status: {:?}", other),
    }
}

/// Final status of a PUT: bare `OK`, no size line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ack {
    Ok,
    Err(String),
}

pub fn read_ack<R: BufRead + ?Sized>(r: &mut R) -> Result<Ack> {
    let status = match read_line(r)? {
        Some(s) => s,
        None => bail!("connection closed before status"),
    };
    match status.as_str() {
        "OK" => Ok(Ack::Ok),
        "ERR" => {
            let msg = match read_line(r)? {
                Some(s) => s,
                None => bail!("connection closed before error message"),
            };
            Ok(Ack::Err(msg))
        }
        other => bail!("unexpected response status: {:?}", other),
    }
}

/// Path-escape predicate: a filename may be served or stored iff it is
/// non-empty and contains no `/`, `\`, or `..`. This is the sole guard keeping
/// requests inside the server root, so it runs on every GET and PUT.
pub fn is_safe_filename(name: &str) -> bool {
    !name.is_empty() && !name.contains('/') && !name.contains('\\') && !name.contains("..")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Other,
}

impl EntryKind {
    pub fn label(self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Dir => "dir",
            EntryKind::Other => "other",
        }
    }
}

/// Enumerate the immediate children of `dir` and serialize them as
/// `name\t<kind>\n` lines. Order is filesystem-native; callers must not
/// depend on it.
pub fn render_listing(dir: &Path) -> Result<String> {
    let mut out = String::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let kind = match entry.file_type() {
            Ok(t) if t.is_file() => EntryKind::File,
            Ok(t) if t.is_dir() => EntryKind::Dir,
            _ => EntryKind::Other,
        };
        out.push_str(&entry.file_name().to_string_lossy());
        out.push('\t');
        out.push_str(kind.label());
        out.push('\n');
    }
    Ok(out)
}
