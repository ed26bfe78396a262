//! End-to-end tests speaking the raw wire protocol against a live listener.

use anyhow::Result;
use std::io::BufReader;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use skiff::client::{self, Reply};
use skiff::framing::{read_line, recv_exact, send_all, send_line};
use skiff::logger::NoopLogger;
use skiff::protocol::{read_ack, read_header, Ack, Header};

/// Serve `<tempdir>/root` on an ephemeral port. The root is a subdirectory so
/// tests can assert that nothing ever lands beside it.
fn start_server() -> (SocketAddr, PathBuf, tempfile::TempDir) {
    let outer = tempfile::tempdir().unwrap();
    let root = outer.path().join("root");
    std::fs::create_dir_all(&root).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let served = root.clone();
    std::thread::spawn(move || {
        let _ = skiff::server::serve_on(listener, served, Arc::new(NoopLogger));
    });
    (addr, root, outer)
}

fn connect(addr: SocketAddr) -> (BufReader<TcpStream>, TcpStream) {
    let stream = TcpStream::connect(addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();
    let reader = BufReader::new(stream.try_clone().unwrap());
    (reader, stream)
}

#[test]
fn scenario_script() -> Result<()> {
    let (addr, _root, _guard) = start_server();
    let (mut r, mut w) = connect(addr);

    // PUT hello.txt with five bytes.
    send_line(&mut w, "PUT hello.txt")?;
    send_line(&mut w, "5")?;
    send_all(&mut w, b"hello")?;
    assert_eq!(read_ack(&mut r)?, Ack::Ok);

    // LIST shows exactly one entry line.
    send_line(&mut w, "LIST")?;
    assert_eq!(read_header(&mut r)?, Header::Ok(15));
    let mut listing = [0u8; 15];
    recv_exact(&mut r, &mut listing)?;
    assert_eq!(&listing, b"hello.txt\tfile\n");

    // GET returns the same five bytes.
    send_line(&mut w, "GET hello.txt")?;
    assert_eq!(read_header(&mut r)?, Header::Ok(5));
    let mut body = [0u8; 5];
    recv_exact(&mut r, &mut body)?;
    assert_eq!(&body, b"hello");

    // Missing file is a recoverable error.
    send_line(&mut w, "GET missing.txt")?;
    assert_eq!(
        read_header(&mut r)?,
        Header::Err("File not found".to_string())
    );

    // QUIT closes the connection with no further response.
    send_line(&mut w, "QUIT")?;
    assert_eq!(read_line(&mut r)?, None);
    Ok(())
}

#[test]
fn list_on_empty_root_is_zero_bytes() -> Result<()> {
    let (addr, _root, _guard) = start_server();
    let (mut r, mut w) = connect(addr);

    send_line(&mut w, "LIST")?;
    assert_eq!(read_header(&mut r)?, Header::Ok(0));

    // Zero-length files round-trip too.
    send_line(&mut w, "PUT empty.dat")?;
    send_line(&mut w, "0")?;
    assert_eq!(read_ack(&mut r)?, Ack::Ok);
    send_line(&mut w, "GET empty.dat")?;
    assert_eq!(read_header(&mut r)?, Header::Ok(0));
    Ok(())
}

#[test]
fn unsafe_filenames_rejected_and_stream_stays_aligned() -> Result<()> {
    let (addr, _root, outer) = start_server();
    let (mut r, mut w) = connect(addr);

    send_line(&mut w, "GET ../secret")?;
    assert_eq!(
        read_header(&mut r)?,
        Header::Err("Invalid filename".to_string())
    );

    // The PUT body must be drained even though the name is rejected,
    // otherwise the next command line would be read out of the body.
    send_line(&mut w, "PUT ..\\evil")?;
    send_line(&mut w, "4")?;
    send_all(&mut w, b"LIST")?;
    assert_eq!(read_ack(&mut r)?, Ack::Err("Invalid filename".to_string()));

    send_line(&mut w, "LIST")?;
    assert_eq!(read_header(&mut r)?, Header::Ok(0));

    // Nothing escaped the server root.
    assert!(!outer.path().join("secret").exists());
    assert!(!outer.path().join("evil").exists());
    Ok(())
}

#[test]
fn unknown_command_keeps_session_open() -> Result<()> {
    let (addr, _root, _guard) = start_server();
    let (mut r, mut w) = connect(addr);

    send_line(&mut w, "FROB everything")?;
    assert_eq!(
        read_header(&mut r)?,
        Header::Err("Unknown command".to_string())
    );
    send_line(&mut w, "LIST")?;
    assert_eq!(read_header(&mut r)?, Header::Ok(0));
    Ok(())
}

#[test]
fn short_put_body_reports_transfer_error() -> Result<()> {
    let (addr, _root, _guard) = start_server();
    let (mut r, mut w) = connect(addr);

    send_line(&mut w, "PUT short.bin")?;
    send_line(&mut w, "10")?;
    send_all(&mut w, b"abc")?;
    // Half-close: the server sees EOF mid-body but can still answer.
    w.shutdown(Shutdown::Write)?;
    assert_eq!(read_ack(&mut r)?, Ack::Err("Transfer error".to_string()));
    Ok(())
}

#[test]
fn malformed_put_size_ends_session() -> Result<()> {
    let (addr, _root, _guard) = start_server();
    let (mut r, mut w) = connect(addr);

    send_line(&mut w, "PUT a.txt")?;
    send_line(&mut w, "not-a-number")?;
    assert_eq!(
        read_ack(&mut r)?,
        Ack::Err("Invalid size header".to_string())
    );
    // The stream position can no longer be trusted, so the server hangs up.
    assert_eq!(read_line(&mut r)?, None);
    Ok(())
}

#[test]
fn sessions_are_independent() -> Result<()> {
    let (addr, root, _guard) = start_server();
    std::fs::write(root.join("big.bin"), vec![7u8; 16 * 1024 * 1024])?;

    // Session A starts a large download and stops reading after the header,
    // wedging the server's send once socket buffers fill.
    let (mut ra, mut wa) = connect(addr);
    send_line(&mut wa, "GET big.bin")?;
    assert_eq!(read_header(&mut ra)?, Header::Ok(16 * 1024 * 1024));
    std::thread::sleep(Duration::from_millis(100));

    // Session B must still get an immediate LIST answer.
    let (mut rb, mut wb) = connect(addr);
    send_line(&mut wb, "LIST")?;
    match read_header(&mut rb)? {
        Header::Ok(n) => assert!(n > 0),
        Header::Err(msg) => panic!("unexpected ERR: {msg}"),
    }
    Ok(())
}

#[test]
fn client_driver_round_trip() -> Result<()> {
    let (addr, _root, _guard) = start_server();
    let (mut r, mut w) = connect(addr);

    let src = tempfile::tempdir()?;
    let dst = tempfile::tempdir()?;
    let payload: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
    std::fs::write(src.path().join("blob.bin"), &payload)?;

    assert_eq!(
        client::put(&mut r, &mut w, "blob.bin", src.path())?,
        Reply::Success(payload.len() as u64)
    );
    match client::list(&mut r, &mut w)? {
        Reply::Success(listing) => assert!(listing.contains("blob.bin\tfile")),
        Reply::Failure(msg) => panic!("unexpected ERR: {msg}"),
    }
    assert_eq!(
        client::get(&mut r, &mut w, "blob.bin", dst.path())?,
        Reply::Success(payload.len() as u64)
    );
    assert_eq!(std::fs::read(dst.path().join("blob.bin"))?, payload);

    // Driver-level failures leave the session usable.
    assert!(matches!(
        client::put(&mut r, &mut w, "nope.bin", src.path())?,
        Reply::Failure(_)
    ));
    assert_eq!(
        client::get(&mut r, &mut w, "nope.bin", dst.path())?,
        Reply::Failure("File not found".to_string())
    );

    client::quit(&mut w)?;
    assert_eq!(read_line(&mut r)?, None);
    Ok(())
}
