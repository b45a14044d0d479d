//! In-memory destination for tests and embedding.

use crate::port::Sink;
use parking_lot::Mutex;
use serde_json::Value;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Captures every line written to it.
#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
    flushes: AtomicUsize,
    should_fail: AtomicBool,
    should_panic: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes return an I/O error.
    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent writes panic.
    pub fn set_should_panic(&self, panic: bool) {
        self.should_panic.store(panic, Ordering::SeqCst);
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Lines parsed as JSON; lines that are not JSON are skipped.
    pub fn records(&self) -> Vec<Value> {
        self.lines
            .lock()
            .iter()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

impl Sink for MemorySink {
    fn write_line(&self, line: &str) -> io::Result<()> {
        if self.should_panic.load(Ordering::SeqCst) {
            panic!("memory sink configured to panic");
        }
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(io::Error::other("memory sink configured to fail"));
        }
        self.lines.lock().push(line.to_string());
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
