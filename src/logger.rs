use anyhow::Result;
use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Session event sink for the daemon. Implementations must be cheap to call
/// from many session threads at once.
pub trait Logger: Send + Sync {
    fn session_open(&self, _peer: &str) {}
    fn session_close(&self, _peer: &str) {}
    fn list(&self, _peer: &str, _bytes: u64) {}
    fn get(&self, _peer: &str, _name: &str, _bytes: u64) {}
    fn put(&self, _peer: &str, _name: &str, _bytes: u64) {}
    fn reject(&self, _peer: &str, _name: &str, _reason: &str) {}
    fn error(&self, _peer: &str, _context: &str, _msg: &str) {}
}

pub struct NoopLogger;
impl Logger for NoopLogger {}

pub struct TextLogger {
    file: Mutex<File>,
}

impl TextLogger {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(f),
        })
    }

    fn line(&self, s: &str) {
        if let Ok(mut f) = self.file.lock() {
            let _ = writeln!(f, "[{}] {}", Utc::now().to_rfc3339(), s);
        }
    }
}

impl Logger for TextLogger {
    fn session_open(&self, peer: &str) {
        self.line(&format!("OPEN peer={peer}"));
    }
    fn session_close(&self, peer: &str) {
        self.line(&format!("CLOSE peer={peer}"));
    }
    fn list(&self, peer: &str, bytes: u64) {
        self.line(&format!("LIST peer={peer} bytes={bytes}"));
    }
    fn get(&self, peer: &str, name: &str, bytes: u64) {
        self.line(&format!("GET peer={peer} name={name} bytes={bytes}"));
    }
    fn put(&self, peer: &str, name: &str, bytes: u64) {
        self.line(&format!("PUT peer={peer} name={name} bytes={bytes}"));
    }
    fn reject(&self, peer: &str, name: &str, reason: &str) {
        self.line(&format!("REJECT peer={peer} name={name} reason={reason}"));
    }
    fn error(&self, peer: &str, context: &str, msg: &str) {
        self.line(&format!("ERROR peer={peer} ctx={context} msg={msg}"));
    }
}
