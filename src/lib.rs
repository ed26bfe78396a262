//! Skiff library
//!
//! A server exposes one directory over TCP; clients list, upload, and download
//! files with a line-based control protocol and length-prefixed binary payloads.

pub mod cli;
pub mod client;
pub mod framing;
pub mod local;
pub mod logger;
pub mod protocol;
pub mod server;
