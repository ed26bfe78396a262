//! Daemon side: accept loop and per-connection session handler
//!
//! One thread per accepted connection. Sessions share nothing but the server
//! root directory; concurrent PUTs to the same name race at the filesystem
//! level with last-writer-wins semantics.

use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::framing::{self, read_line};
use crate::logger::Logger;
use crate::protocol::{self, is_safe_filename, render_listing, Request};

/// Reap finished session threads once the handle list grows past this.
const REAP_WATERMARK: usize = 50;

pub fn serve(bind: &str, root: &Path, logger: Arc<dyn Logger>) -> Result<()> {
    let listener = TcpListener::bind(bind).with_context(|| format!("bind {bind}"))?;
    eprintln!("skiffd listening on {} root={}", bind, root.display());
    serve_on(listener, root.to_path_buf(), logger)
}

/// Accept loop on an already-bound listener. Exposed separately so callers
/// (and tests) can bind port 0 themselves and learn the chosen port.
pub fn serve_on(listener: TcpListener, root: PathBuf, logger: Arc<dyn Logger>) -> Result<()> {
    std::fs::create_dir_all(&root)
        .with_context(|| format!("create root {}", root.display()))?;
    let mut sessions: Vec<JoinHandle<()>> = Vec::new();
    loop {
        let (stream, addr) = match listener.accept() {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                eprintln!("accept error: {e}");
                break;
            }
        };
        let peer = addr.to_string();
        let root = root.clone();
        let logger = Arc::clone(&logger);
        sessions.push(std::thread::spawn(move || {
            logger.session_open(&peer);
            if let Err(e) = handle_client(stream, &root, &peer, logger.as_ref()) {
                logger.error(&peer, "session", &format!("{e:#}"));
            }
            logger.session_close(&peer);
        }));
        if sessions.len() > REAP_WATERMARK {
            reap_finished(&mut sessions);
        }
    }
    // Fatal accept error: drain still-running sessions before exiting.
    for h in sessions {
        let _ = h.join();
    }
    Ok(())
}

fn reap_finished(sessions: &mut Vec<JoinHandle<()>>) {
    let mut live = Vec::with_capacity(sessions.len());
    for h in sessions.drain(..) {
        if h.is_finished() {
            let _ = h.join();
        } else {
            live.push(h);
        }
    }
    *sessions = live;
}

/// Per-connection request/response loop.
///
/// Request-level failures (bad filename, missing file, transfer error) are
/// answered with `ERR` and the loop continues. Stream-level failures return
/// an error and end only this session.
fn handle_client(stream: TcpStream, root: &Path, peer: &str, logger: &dyn Logger) -> Result<()> {
    let mut reader = BufReader::new(stream.try_clone().context("clone stream")?);
    let mut writer = stream;
    loop {
        let line = match read_line(&mut reader)? {
            Some(l) => l,
            // Peer closed the connection: normal end of session.
            None => break,
        };
        match Request::parse(&line) {
            Request::List => handle_list(&mut writer, root, peer, logger)?,
            Request::Get(name) => handle_get(&mut writer, root, &name, peer, logger)?,
            Request::Put(name) => {
                handle_put(&mut reader, &mut writer, root, &name, peer, logger)?
            }
            Request::Quit => break,
            Request::Unknown(_) => protocol::send_err(&mut writer, "Unknown command")?,
        }
    }
    Ok(())
}

fn handle_list<W: Write>(w: &mut W, root: &Path, peer: &str, logger: &dyn Logger) -> Result<()> {
    let listing = match render_listing(root) {
        Ok(l) => l,
        Err(e) => {
            logger.error(peer, "list", &e.to_string());
            return protocol::send_err(w, "Failed to list directory");
        }
    };
    protocol::send_ok_sized(w, listing.len() as u64)?;
    framing::send_all(w, listing.as_bytes())?;
    logger.list(peer, listing.len() as u64);
    Ok(())
}

fn handle_get<W: Write>(
    w: &mut W,
    root: &Path,
    name: &str,
    peer: &str,
    logger: &dyn Logger,
) -> Result<()> {
    if !is_safe_filename(name) {
        logger.reject(peer, name, "unsafe filename");
        return protocol::send_err(w, "Invalid filename");
    }
    let path = root.join(name);
    let size = match std::fs::metadata(&path) {
        Ok(md) if md.is_file() => md.len(),
        _ => return protocol::send_err(w, "File not found"),
    };
    let mut file = match File::open(&path) {
        Ok(f) => f,
        Err(e) => {
            logger.error(peer, "get", &e.to_string());
            return protocol::send_err(w, "Failed to open file");
        }
    };
    protocol::send_ok_sized(w, size)?;
    // The header is out; there is no error frame after it. A mid-stream
    // failure aborts the transfer and the client detects the truncation by
    // counting bytes against the declared size.
    match framing::copy_exact(&mut file, w, size) {
        Ok(()) => logger.get(peer, name, size),
        Err(e) => logger.error(peer, "get", &e.to_string()),
    }
    Ok(())
}

fn handle_put<R: BufRead, W: Write>(
    r: &mut R,
    w: &mut W,
    root: &Path,
    name: &str,
    peer: &str,
    logger: &dyn Logger,
) -> Result<()> {
    // The size line is always consumed after a PUT command line, independent
    // of the validation outcome. Both ends count on that to stay aligned.
    let size_line = match read_line(r)? {
        Some(l) => l,
        None => bail!("connection closed before PUT size line"),
    };
    let size: u64 = match size_line.parse() {
        Ok(n) => n,
        Err(_) => {
            // Without a byte count the stream position cannot be trusted
            // anymore; end the session after reporting.
            protocol::send_err(w, "Invalid size header")?;
            bail!("malformed PUT size line: {size_line:?}");
        }
    };
    if !is_safe_filename(name) {
        logger.reject(peer, name, "unsafe filename");
        protocol::send_err(w, "Invalid filename")?;
        return framing::drain_exact(r, size);
    }
    let path = root.join(name);
    let mut file = match File::create(&path) {
        Ok(f) => f,
        Err(e) => {
            logger.error(peer, "put", &e.to_string());
            protocol::send_err(w, "Failed to create file")?;
            return framing::drain_exact(r, size);
        }
    };
    match framing::copy_exact(r, &mut file, size) {
        Ok(()) => {
            protocol::send_ok(w)?;
            logger.put(peer, name, size);
        }
        Err(e) => {
            logger.error(peer, "put", &e.to_string());
            protocol::send_err(w, "Transfer error")?;
        }
    }
    Ok(())
}
