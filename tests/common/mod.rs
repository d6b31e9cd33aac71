#![allow(dead_code)]

use serde_json::Value;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// In-memory log destination that can be inspected after logging.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    /// Every logged line parsed as JSON. Panics on a malformed line.
    pub fn records(&self) -> Vec<Value> {
        self.contents()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap_or_else(|e| panic!("bad line {line:?}: {e}")))
            .collect()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn function_name(record: &Value) -> &str {
    record["Source"]["FunctionName"].as_str().unwrap()
}
