//! Line-delimited control / length-prefixed payload framing over byte streams
//!
//! Control messages are text lines ending in `\n` (a preceding `\r` is
//! tolerated and stripped). Payload bytes are raw, with their length declared
//! on a preceding size line, so no delimiter scanning ever touches file
//! content. The read side of a connection must go through a single `BufReader`
//! shared by line reads and exact reads, otherwise buffered bytes are lost
//! between the two disciplines.

use anyhow::{bail, Result};
use std::io::{BufRead, ErrorKind, Read, Write};

/// Transfer chunk size for streaming file payloads. Tunable; never visible on
/// the wire.
pub const CHUNK_SIZE: usize = 8192;

/// Write the whole buffer, looping over partial writes. Interrupted writes are
/// retried transparently.
pub fn send_all<W: Write + ?Sized>(w: &mut W, mut buf: &[u8]) -> Result<()> {
    while !buf.is_empty() {
        match w.write(buf) {
            Ok(0) => bail!("stream closed during write"),
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Send one text line, appending the terminating `\n`.
pub fn send_line<W: Write + ?Sized>(w: &mut W, line: &str) -> Result<()> {
    let mut out = Vec::with_capacity(line.len() + 1);
    out.extend_from_slice(line.as_bytes());
    out.push(b'\n');
    send_all(w, &out)
}

/// Fill the buffer exactly, looping over partial reads. Premature close is an
/// error; interrupted reads are retried.
pub fn recv_exact<R: Read + ?Sized>(r: &mut R, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => bail!(
                "stream closed after {} of {} payload bytes",
                filled,
                buf.len()
            ),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Read one line through `\n`, stripping the newline and a trailing `\r`.
///
/// Returns `Ok(None)` when the peer closes the stream before a newline is
/// seen. That is the normal way a peer ends a session and must not be treated
/// (or logged) as a failure.
pub fn read_line<R: BufRead + ?Sized>(r: &mut R) -> Result<Option<String>> {
    let mut raw = Vec::new();
    let n = r.read_until(b'\n', &mut raw)?;
    if n == 0 || raw.last() != Some(&b'\n') {
        // Clean close, or the peer vanished mid-line; either way the session
        // is over.
        return Ok(None);
    }
    raw.pop();
    if raw.last() == Some(&b'\r') {
        raw.pop();
    }
    Ok(Some(String::from_utf8_lossy(&raw).into_owned()))
}

/// Copy exactly `n` bytes from the stream into the sink in bounded chunks.
pub fn copy_exact<R: Read + ?Sized, W: Write + ?Sized>(r: &mut R, w: &mut W, n: u64) -> Result<()> {
    let mut buf = [0u8; CHUNK_SIZE];
    let mut remaining = n;
    while remaining > 0 {
        let take = remaining.min(buf.len() as u64) as usize;
        recv_exact(r, &mut buf[..take])?;
        w.write_all(&buf[..take])?;
        remaining -= take as u64;
    }
    Ok(())
}

/// Read and discard exactly `n` bytes, keeping the stream position aligned
/// after a rejected transfer.
pub fn drain_exact<R: Read + ?Sized>(r: &mut R, n: u64) -> Result<()> {
    let mut buf = [0u8; CHUNK_SIZE];
    let mut remaining = n;
    while remaining > 0 {
        let take = remaining.min(buf.len() as u64) as usize;
        recv_exact(r, &mut buf[..take])?;
        remaining -= take as u64;
    }
    Ok(())
}
