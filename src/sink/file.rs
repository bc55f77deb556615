//! Append-only file sink for job logs.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::encoder::Encoder;
use crate::event::Event;
use crate::sink::{Sink, SinkError};

/// Resolve the file a job key writes to.
///
/// A key naming an existing directory gets `<key>/<file_name>`; any other key
/// is used as the file path itself.
pub fn job_log_path(key: &str, file_name: &str) -> PathBuf {
    let path = Path::new(key);
    if path.is_dir() {
        path.join(file_name)
    } else {
        path.to_path_buf()
    }
}

/// Create `path` (and its parent directories) if absent, leaving any existing
/// content in place. Returns the open handle and its current length.
pub(crate) fn touch(path: &Path) -> Result<(File, u64), SinkError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| SinkError::io(parent, e))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| SinkError::io(path, e))?;
    let len = file.metadata().map_err(|e| SinkError::io(path, e))?.len();
    Ok((file, len))
}

/// Appends every event to a single file; never rotates.
pub struct FileSink {
    name: String,
    path: PathBuf,
    encoder: Arc<dyn Encoder>,
    file: Mutex<Option<File>>,
    stopped: AtomicBool,
}

impl FileSink {
    /// Open (creating if needed) the file at `path`.
    pub fn open(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        encoder: Arc<dyn Encoder>,
    ) -> Result<Self, SinkError> {
        let path = path.into();
        let (file, _) = touch(&path)?;
        Ok(Self {
            name: name.into(),
            path,
            encoder,
            file: Mutex::new(Some(file)),
            stopped: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for FileSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSink")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish()
    }
}

impl Sink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, event: &Event) -> Result<(), SinkError> {
        let bytes = self.encoder.encode(event);
        let mut guard = self.file.lock();
        let file = guard
            .as_mut()
            .ok_or_else(|| SinkError::Stopped(self.name.clone()))?;
        file.write_all(&bytes).map_err(|e| SinkError::io(&self.path, e))
    }

    fn flush(&self) -> Result<(), SinkError> {
        match self.file.lock().as_mut() {
            Some(file) => file.flush().map_err(|e| SinkError::io(&self.path, e)),
            None => Ok(()),
        }
    }

    fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(mut file) = self.file.lock().take() {
            if let Err(e) = file.flush() {
                tracing::warn!(sink = %self.name, path = ?self.path, error = %e, "Flush failed while closing job log");
            }
        }
        tracing::debug!(sink = %self.name, "File sink stopped");
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::LineEncoder;
    use crate::event::Level;
    use tempfile::tempdir;

    #[test]
    fn test_job_path_for_directory_key() {
        let dir = tempdir().unwrap();
        let key = dir.path().to_string_lossy().to_string();
        assert_eq!(job_log_path(&key, "app.log"), dir.path().join("app.log"));
    }

    #[test]
    fn test_job_path_for_file_key() {
        let dir = tempdir().unwrap();
        let key = dir.path().join("job-17.log").to_string_lossy().to_string();
        assert_eq!(job_log_path(&key, "app.log"), PathBuf::from(&key));
    }

    #[test]
    fn test_file_sink_touches_and_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("job.log");

        let sink = FileSink::open("job-local", &path, Arc::new(LineEncoder)).unwrap();
        assert!(path.exists());

        sink.write(&Event::new(Level::Info, "first").at(1)).unwrap();
        sink.write(&Event::new(Level::Error, "second").at(2)).unwrap();
        sink.stop();
        sink.stop();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "1 INFO  first\n2 ERROR second\n");
        assert!(matches!(
            sink.write(&Event::new(Level::Info, "late")),
            Err(SinkError::Stopped(_))
        ));
    }
}
