pub mod logical;
pub mod physical;

use crate::error::{DesignError, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Opens a netlist file, transparently inflating gzip input.
pub fn open(path: &Path) -> Result<Box<dyn BufRead>> {
    let mut file = File::open(path)?;
    let mut magic = [0u8; 2];
    let n = file.read(&mut magic)?;
    let file = File::open(path)?;
    if n == 2 && magic == GZIP_MAGIC {
        log::debug!("{:?} is gzip-compressed", path);
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Whitespace-tokenizing line reader shared by the netlist parsers.
///
/// Blank lines and `#` comments are skipped. Both netlists can live in one
/// stream (the checkpoint form), so a parser stops at its own `END` record
/// and leaves the rest of the stream untouched.
pub struct TokenReader<R: BufRead> {
    inner: R,
    line_no: usize,
    buf: Vec<u8>,
}

impl<R: BufRead> TokenReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line_no: 0,
            buf: Vec::new(),
        }
    }

    pub fn next_record(&mut self) -> Result<Option<Vec<String>>> {
        loop {
            self.buf.clear();
            if self.inner.read_until(b'\n', &mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let line = std::str::from_utf8(&self.buf)
                .map_err(|_| self.error("not a text netlist"))?
                .trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            return Ok(Some(line.split_whitespace().map(str::to_string).collect()));
        }
    }

    pub fn error(&self, msg: impl std::fmt::Display) -> DesignError {
        DesignError::Format(format!("line {}: {}", self.line_no, msg))
    }

    /// Consumes the magic record and checks its version.
    pub fn expect_magic(&mut self, magic: &str, version: &str) -> Result<()> {
        match self.next_record()? {
            Some(parts) if parts.len() == 2 && parts[0] == magic && parts[1] == version => Ok(()),
            Some(parts) => Err(self.error(format!(
                "expected '{} {}' header, found '{}'",
                magic,
                version,
                parts.join(" ")
            ))),
            None => Err(DesignError::Format(format!(
                "empty input, expected '{} {}' header",
                magic, version
            ))),
        }
    }
}

/// Fetches field `idx` of a record or reports a truncated record.
pub(crate) fn field<'a, R: BufRead>(
    reader: &TokenReader<R>,
    parts: &'a [String],
    idx: usize,
) -> Result<&'a str> {
    parts
        .get(idx)
        .map(String::as_str)
        .ok_or_else(|| reader.error(format!("truncated '{}' record", parts[0])))
}
