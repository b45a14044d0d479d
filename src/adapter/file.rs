// Append-only JSON lines file. Each call appends a single line; the file is
// never rotated or truncated.

use crate::error::LoggerError;
use crate::port::Sink;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct FileSink {
    path: PathBuf,
    inner: Mutex<Option<BufWriter<File>>>,
    /// Flush and fsync after every line.
    sync_on_write: bool,
}

impl FileSink {
    /// Buffered sink; data reaches the file on `flush`, `close` or drop.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LoggerError> {
        Self::open_with(path.as_ref(), false)
    }

    /// Sink that is durable after every write.
    pub fn open_synced(path: impl AsRef<Path>) -> Result<Self, LoggerError> {
        Self::open_with(path.as_ref(), true)
    }

    fn open_with(path: &Path, sync_on_write: bool) -> Result<Self, LoggerError> {
        let open_err = |source| LoggerError::SinkOpen {
            path: path.to_path_buf(),
            source,
        };

        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(open_err)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(open_err)?;

        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(Some(BufWriter::new(file))),
            sync_on_write,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes and releases the file. Later writes fail.
    pub fn close(&self) -> io::Result<()> {
        let mut guard = self.inner.lock();
        match guard.take() {
            Some(mut writer) => {
                writer.flush()?;
                writer.get_ref().sync_data()
            }
            None => Ok(()),
        }
    }
}

impl Sink for FileSink {
    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut guard = self.inner.lock();
        let writer = guard
            .as_mut()
            .ok_or_else(|| io::Error::other(format!("{} is closed", self.path.display())))?;

        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;

        if self.sync_on_write {
            writer.flush()?;
            writer.get_ref().sync_data()?;
        }
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        let mut guard = self.inner.lock();
        match guard.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}
