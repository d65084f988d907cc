//! Append-only JSONL file writer.
//!
//! Several `subreg` processes (one per terminal) may log to the same file.
//! Each line is written and flushed in one call so lines never interleave.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;

/// Shared, line-flushed writer over a log file opened in append mode.
#[derive(Clone)]
pub struct AppendOnlyWriter {
    inner: Arc<Mutex<BufWriter<File>>>,
}

impl AppendOnlyWriter {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            inner: Arc::new(Mutex::new(BufWriter::with_capacity(8192, file))),
        })
    }
}

impl Write for AppendOnlyWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.inner.lock();
        let written = guard.write(buf)?;
        guard.flush()?;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().flush()
    }
}

/// `MakeWriter` adapter handing out clones of one [`AppendOnlyWriter`].
#[derive(Clone)]
pub struct WriterFactory {
    writer: AppendOnlyWriter,
}

impl WriterFactory {
    pub fn new(writer: AppendOnlyWriter) -> Self {
        Self { writer }
    }
}

impl<'a> MakeWriter<'a> for WriterFactory {
    type Writer = AppendOnlyWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.writer.clone()
    }
}
