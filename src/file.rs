use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::tree::Value;

const PROGRESS_STEP: u64 = 1024 * 1024;
const UTF8_BOM: &str = "\u{feff}";

// Logs read progress for large record files
struct ProgressReader<'a, R: Read> {
    inner: R,
    read_bytes: u64,
    total_bytes: u64,
    last_report: u64,
    path: &'a Path,
}

impl<R: Read> Read for ProgressReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.read_bytes += n as u64;
        if self.read_bytes - self.last_report >= PROGRESS_STEP || n == 0 {
            let percent = if self.total_bytes > 0 {
                self.read_bytes as f64 / self.total_bytes as f64 * 100.0
            } else {
                0.0
            };
            debug!(
                path = %self.path.display(),
                read_bytes = self.read_bytes,
                total_bytes = self.total_bytes,
                percent,
                done = n == 0,
                "reading records"
            );
            self.last_report = self.read_bytes;
        }
        Ok(n)
    }
}

fn into_records(root: serde_json::Value) -> Result<Vec<Value>> {
    match root {
        serde_json::Value::Array(items) => Ok(items.into_iter().map(Value::from).collect()),
        obj @ serde_json::Value::Object(_) => Ok(vec![Value::from(obj)]),
        serde_json::Value::Null => Err(Error::NotRecords { found: "null" }),
        serde_json::Value::Bool(_) => Err(Error::NotRecords { found: "boolean" }),
        serde_json::Value::Number(_) => Err(Error::NotRecords { found: "number" }),
        serde_json::Value::String(_) => Err(Error::NotRecords { found: "string" }),
    }
}

/// Reads a JSON file holding an array of records. A lone object is treated
/// as a one-record array.
pub fn load_records(path: &Path) -> Result<Vec<Value>> {
    let f = File::open(path).map_err(|e| Error::io(path, e))?;
    let total_bytes = f.metadata().map(|m| m.len()).unwrap_or(0);
    let reader = BufReader::new(ProgressReader {
        inner: f,
        read_bytes: 0,
        total_bytes,
        last_report: 0,
        path,
    });
    let root: serde_json::Value = serde_json::from_reader(reader)
        .map_err(|e| Error::json(path.display().to_string(), e))?;
    into_records(root)
}

pub fn parse_records(text: &str) -> Result<Vec<Value>> {
    let root = serde_json::from_str(text).map_err(|e| Error::json("input", e))?;
    into_records(root)
}

/// Writes an export document, optionally prefixed with a UTF-8 BOM so
/// spreadsheet apps detect the encoding.
pub fn write_export(path: &Path, content: &str, bom: bool) -> Result<()> {
    let body = if bom {
        format!("{UTF8_BOM}{content}")
    } else {
        content.to_string()
    };
    fs::write(path, body).map_err(|e| Error::io(path, e))?;
    debug!(path = %path.display(), bytes = content.len(), "wrote export");
    Ok(())
}
