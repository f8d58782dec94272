//! Newline-delimited JSON output.
//!
//! Each record is serialized into a scratch buffer first, then written and
//! flushed in one go. A record is therefore either fully on the sink or not
//! started, and nothing accumulates beyond the record in flight.

use serde::Serialize;
use serde_json::value::RawValue;
use std::borrow::Cow;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::{ExportError, Result};

pub struct NdjsonWriter<W> {
    writer: W,
    line: Vec<u8>,
}

impl<W: AsyncWrite + Unpin> NdjsonWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            line: Vec::with_capacity(1024),
        }
    }

    /// Serialize `record` as one compact JSON line.
    pub async fn write_record<T: Serialize + ?Sized>(&mut self, record: &T) -> Result<()> {
        self.line.clear();
        serde_json::to_writer(&mut self.line, record)?;
        self.line.push(b'\n');
        self.flush_line().await
    }

    /// Write already-encoded JSON text verbatim, followed by a newline.
    pub async fn write_raw(&mut self, json: &str) -> Result<()> {
        self.line.clear();
        self.line.extend_from_slice(json.as_bytes());
        self.line.push(b'\n');
        self.flush_line().await
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    async fn flush_line(&mut self) -> Result<()> {
        self.writer
            .write_all(&self.line)
            .await
            .map_err(ExportError::sink)?;
        self.writer.flush().await.map_err(ExportError::sink)
    }
}

/// Fold stored JSON onto a single line.
///
/// Text without line breaks is returned as is. Otherwise whitespace outside
/// string literals is dropped; JSON strings cannot hold a raw line break, so
/// every break is insignificant.
pub fn single_line(raw: &RawValue) -> Result<Cow<'_, RawValue>> {
    let text = raw.get();
    if !text.contains(['\n', '\r']) {
        return Ok(Cow::Borrowed(raw));
    }
    Ok(Cow::Owned(RawValue::from_string(strip_whitespace(text))?))
}

fn strip_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if !matches!(c, ' ' | '\t' | '\n' | '\r') {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
        }
    }
    out
}
