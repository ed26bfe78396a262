//! Filesystem-only mode: the same LIST/GET/PUT operations without the wire
//!
//! A degenerate client that works on a serve directory directly. It applies
//! the same filename-safety gate and directory creation as the daemon so the
//! two modes behave identically for the commands they share.

use anyhow::{bail, Context, Result};
use std::io::{self, BufRead, Write};
use std::path::Path;

use crate::protocol::{is_safe_filename, render_listing, Request};

pub fn list(serve_dir: &Path) -> Result<String> {
    std::fs::create_dir_all(serve_dir)
        .with_context(|| format!("create {}", serve_dir.display()))?;
    render_listing(serve_dir)
}

/// Copy `serve_dir/name` to `dest_dir/name`, returning the byte count.
pub fn get(serve_dir: &Path, name: &str, dest_dir: &Path) -> Result<u64> {
    if !is_safe_filename(name) {
        bail!("Invalid filename");
    }
    let src = serve_dir.join(name);
    match std::fs::metadata(&src) {
        Ok(md) if md.is_file() => {}
        _ => bail!("File not found: {name}"),
    }
    std::fs::copy(&src, dest_dir.join(name))
        .with_context(|| format!("copy {}", src.display()))
}

/// Copy `src_dir/name` into the serve directory, returning the byte count.
pub fn put(serve_dir: &Path, name: &str, src_dir: &Path) -> Result<u64> {
    if !is_safe_filename(name) {
        bail!("Invalid filename");
    }
    let src = src_dir.join(name);
    match std::fs::metadata(&src) {
        Ok(md) if md.is_file() => {}
        _ => bail!("Local file not found: {name}"),
    }
    std::fs::create_dir_all(serve_dir)
        .with_context(|| format!("create {}", serve_dir.display()))?;
    std::fs::copy(&src, serve_dir.join(name))
        .with_context(|| format!("copy {}", src.display()))
}

/// Prompt loop over the local operations, mirroring the network client.
pub fn run(serve_dir: &Path) -> Result<()> {
    println!(
        "Running in local mode. Serving directory: {}",
        serve_dir.display()
    );
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
            Request::List => match list(serve_dir) {
                Ok(listing) => print!("{listing}"),
                Err(e) => eprintln!("{e}"),
            },
            Request::Get(name) => match get(serve_dir, &name, cwd) {
                Ok(bytes) => println!("Downloaded {name} ({bytes} bytes)"),
                Err(e) => eprintln!("{e}"),
            },
            Request::Put(name) => match put(serve_dir, &name, cwd) {
                Ok(bytes) => println!("Uploaded {name} ({bytes} bytes)"),
                Err(e) => eprintln!("{e}"),
            },
            Request::Quit => break,
            Request::Unknown(_) => {
                println!("Unknown command. Supported: LIST, GET <file>, PUT <file>, QUIT")
            }
        }
    }
    println!("Local mode exited.");
    Ok(())
}
