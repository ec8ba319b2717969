//! JSON-lines emitter: one record per line, flushed as soon as it is written.

use std::io::Write;

use crate::record::NormalizedRecord;

#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    #[error("encoding record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("writing record: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes records to the primary output stream. Nothing else is ever written to it.
pub struct JsonLinesEmitter<W: Write> {
    out: W,
    emitted: usize,
}

impl<W: Write> JsonLinesEmitter<W> {
    pub fn new(out: W) -> Self {
        Self { out, emitted: 0 }
    }

    /// Serialize `record` as one line and flush. Non-ASCII text is written as-is.
    pub fn emit(&mut self, record: &NormalizedRecord) -> Result<(), EmitError> {
        serde_json::to_writer(&mut self.out, record)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        self.emitted += 1;
        Ok(())
    }

    /// Records written so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, text: &str) -> NormalizedRecord {
        NormalizedRecord {
            channel: "devops_ru".into(),
            msg_id: id.into(),
            date: "2026-02-16T10:00:00+00:00".into(),
            text: text.into(),
            url: format!("https://t.me/devops_ru/{}", id),
        }
    }

    /// Counts flushes so tests can tell buffered output from per-record flushing.
    struct FlushCounter {
        buf: Vec<u8>,
        flushes: usize,
    }

    impl Write for FlushCounter {
        fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
            self.buf.extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushes += 1;
            Ok(())
        }
    }

    #[test]
    fn one_line_per_record_in_order() {
        let mut e = JsonLinesEmitter::new(Vec::new());
        e.emit(&record("1", "first")).unwrap();
        e.emit(&record("2", "second\nline")).unwrap();
        assert_eq!(e.emitted(), 2);
        let out = String::from_utf8(e.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"msg_id\":\"1\""));
        assert!(lines[1].contains("second\\nline"));
    }

    #[test]
    fn non_ascii_is_written_verbatim() {
        let mut e = JsonLinesEmitter::new(Vec::new());
        e.emit(&record("3", "Привет, мир 🚀")).unwrap();
        let out = String::from_utf8(e.into_inner()).unwrap();
        assert!(out.contains("Привет, мир 🚀"), "{}", out);
        assert!(!out.contains("\\u"));
    }

    #[test]
    fn flushes_after_every_record() {
        let mut e = JsonLinesEmitter::new(FlushCounter {
            buf: Vec::new(),
            flushes: 0,
        });
        e.emit(&record("1", "a")).unwrap();
        e.emit(&record("2", "b")).unwrap();
        let inner = e.into_inner();
        assert_eq!(inner.flushes, 2);
        assert!(inner.buf.ends_with(b"\n"));
    }
}
