//! Interactive client: mirrors the protocol from the initiating side
//!
//! The driver functions take the connection's reader/writer halves directly so
//! integration tests can run them against a live server without a TTY.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::net::TcpStream;
use std::path::Path;

use crate::framing;
use crate::protocol::{self, Header, Request};

/// Outcome of one driven command. `Failure` carries the human-readable
/// reason (server `ERR` message or a local I/O problem); the session stays
/// usable after it. Stream-fatal conditions surface as `anyhow` errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply<T> {
    Success(T),
    Failure(String),
}

/// Request the directory listing and return its payload.
pub fn list<R: BufRead, W: Write>(r: &mut R, w: &mut W) -> Result<Reply<String>> {
    framing::send_line(w, "LIST")?;
    let size = match protocol::read_header(r)? {
        Header::Ok(size) => size,
        Header::Err(msg) => return Ok(Reply::Failure(msg)),
    };
    let mut payload = Vec::new();
    framing::copy_exact(r, &mut payload, size)?;
    Ok(Reply::Success(
        String::from_utf8_lossy(&payload).into_owned(),
    ))
}

/// Download `name` into `dest_dir/name`, creating or overwriting it. If the
/// local sink cannot be opened the declared payload is still drained so the
/// stream stays aligned for the next command.
pub fn get<R: BufRead, W: Write>(
    r: &mut R,
    w: &mut W,
    name: &str,
    dest_dir: &Path,
) -> Result<Reply<u64>> {
    framing::send_line(w, &format!("GET {name}"))?;
    let size = match protocol::read_header(r)? {
        Header::Ok(size) => size,
        Header::Err(msg) => return Ok(Reply::Failure(msg)),
    };
    let mut file = match File::create(dest_dir.join(name)) {
        Ok(f) => f,
        Err(e) => {
            framing::drain_exact(r, size)?;
            return Ok(Reply::Failure(format!(
                "failed to open local file for writing: {e}"
            )));
        }
    };
    framing::copy_exact(r, &mut file, size)
        .with_context(|| format!("download of {name} truncated"))?;
    Ok(Reply::Success(size))
}

/// Upload `src_dir/name` as `name`: command line, exact size line, raw bytes,
/// then the server's final status.
pub fn put<R: BufRead, W: Write>(
    r: &mut R,
    w: &mut W,
    name: &str,
    src_dir: &Path,
) -> Result<Reply<u64>> {
    let path = src_dir.join(name);
    let size = match std::fs::metadata(&path) {
        Ok(md) if md.is_file() => md.len(),
        _ => return Ok(Reply::Failure(format!("Local file not found: {name}"))),
    };
    let mut file = match File::open(&path) {
        Ok(f) => f,
        Err(e) => {
            return Ok(Reply::Failure(format!(
                "failed to open local file for reading: {e}"
            )))
        }
    };
    framing::send_line(w, &format!("PUT {name}"))?;
    framing::send_line(w, &size.to_string())?;
    framing::copy_exact(&mut file, w, size)
        .with_context(|| format!("upload of {name} interrupted"))?;
    match protocol::read_ack(r)? {
        protocol::Ack::Ok => Ok(Reply::Success(size)),
        protocol::Ack::Err(msg) => Ok(Reply::Failure(msg)),
    }
}

/// Send QUIT; the server closes the connection without a reply.
pub fn quit<W: Write>(w: &mut W) -> Result<()> {
    framing::send_line(w, "QUIT")
}

/// Connect and run the interactive prompt loop until QUIT or EOF.
pub fn run(host: &str, port: u16) -> Result<()> {
    let stream = TcpStream::connect((host, port))
        .with_context(|| format!("connect {host}:{port}"))?;
    println!("Connected to {host}:{port}");
    let mut reader = BufReader::new(stream.try_clone().context("clone stream")?);
    let mut writer = stream;
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let cwd = Path::new(".");

    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut cmd = String::new();
        if input.read_line(&mut cmd)? == 0 {
            break;
        }
        let cmd = cmd.trim_end_matches(['\r', '\n']);
        if cmd.is_empty() {
            continue;
        }
        match Request::parse(cmd) {
            Request::List => match list(&mut reader, &mut writer)? {
                Reply::Success(listing) => {
                    println!("Server listing:");
                    print!("{listing}");
                }
                Reply::Failure(msg) => eprintln!("Server error: {msg}"),
            },
            Request::Get(name) if name.is_empty() => eprintln!("Usage: GET <filename>"),
            Request::Get(name) => match get(&mut reader, &mut writer, &name, cwd)? {
                Reply::Success(bytes) => println!("Downloaded {name} ({bytes} bytes)"),
                Reply::Failure(msg) => eprintln!("{msg}"),
            },
            Request::Put(name) if name.is_empty() => eprintln!("Usage: PUT <filename>"),
            Request::Put(name) => match put(&mut reader, &mut writer, &name, cwd)? {
                Reply::Success(bytes) => println!("Uploaded {name} ({bytes} bytes)"),
                Reply::Failure(msg) => eprintln!("{msg}"),
            },
            Request::Quit => {
                quit(&mut writer)?;
                break;
            }
            Request::Unknown(_) => {
                println!("Unknown command. Supported: LIST, GET <file>, PUT <file>, QUIT")
            }
        }
    }
    println!("Disconnected.");
    Ok(())
}
