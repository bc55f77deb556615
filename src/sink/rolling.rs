//! Size-triggered rotating file sink.
//!
//! # Layout
//! ```text
//! <root>/<key>/app.log          current file
//! <root>/<key>/app.1.log.gz     newest archive
//! <root>/<key>/app.2.log.gz
//! <root>/<key>/app.3.log.gz     oldest archive, evicted on next rotation
//! ```
//!
//! # Rotation
//! Before an append that would push the current file past `max_file_size`,
//! the current file is gzipped to a staging file, archive slots shift up by
//! one (the last slot is discarded), the staged archive takes slot 1 and a
//! fresh empty file is opened at the base path. Rotation is size-triggered
//! only. A failed compression leaves every slot as it was.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::Mutex;

use crate::encoder::Encoder;
use crate::event::Event;
use crate::sink::file::touch;
use crate::sink::{Sink, SinkError};

/// Default rotation threshold (100 MB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Default number of archive slots kept.
pub const DEFAULT_MAX_ARCHIVES: u32 = 3;

/// Size and retention limits for one rotating file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollingPolicy {
    pub max_file_size: u64,
    pub max_archives: u32,
}

impl Default for RollingPolicy {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_archives: DEFAULT_MAX_ARCHIVES,
        }
    }
}

/// Path of archive slot `index` for `base`.
///
/// `app.log` becomes `app.<index>.log.gz`; a base without a `.log`
/// extension becomes `<name>.<index>.gz`.
pub fn archive_path(base: &Path, index: u32) -> PathBuf {
    let name = base
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let archived = match name.strip_suffix(".log") {
        Some(stem) => format!("{stem}.{index}.log.gz"),
        None => format!("{name}.{index}.gz"),
    };
    base.with_file_name(archived)
}

struct RotationState {
    file: Option<File>,
    current_size: u64,
}

/// Rotating file dedicated to one routing key.
pub struct RotatingFileSink {
    name: String,
    base_path: PathBuf,
    policy: RollingPolicy,
    encoder: Arc<dyn Encoder>,
    state: Mutex<RotationState>,
    stopped: AtomicBool,
}

impl RotatingFileSink {
    /// Open the sink at `base_path`, creating the file and its directory when
    /// absent. Existing content is kept and counts toward the threshold.
    pub fn open(
        name: impl Into<String>,
        base_path: impl Into<PathBuf>,
        policy: RollingPolicy,
        encoder: Arc<dyn Encoder>,
    ) -> Result<Self, SinkError> {
        let base_path = base_path.into();
        let (file, current_size) = touch(&base_path)?;
        Ok(Self {
            name: name.into(),
            base_path,
            policy,
            encoder,
            state: Mutex::new(RotationState {
                file: Some(file),
                current_size,
            }),
            stopped: AtomicBool::new(false),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn policy(&self) -> RollingPolicy {
        self.policy
    }

    /// Bytes in the current file as tracked by the sink.
    pub fn current_size(&self) -> u64 {
        self.state.lock().current_size
    }

    fn rotate(&self, state: &mut RotationState) -> Result<(), SinkError> {
        if let Some(file) = state.file.as_mut() {
            file.flush().map_err(|e| SinkError::io(&self.base_path, e))?;
        }

        if self.policy.max_archives > 0 {
            // Archive slots are only touched once the new archive exists, so
            // a failed compression leaves the sink writing to the same file.
            let staging = staging_path(&self.base_path);
            if let Err(e) = compress(&self.base_path, &staging) {
                let _ = fs::remove_file(&staging);
                return Err(SinkError::io(&staging, e));
            }

            let oldest = archive_path(&self.base_path, self.policy.max_archives);
            remove_if_exists(&oldest)?;
            for index in (1..self.policy.max_archives).rev() {
                let from = archive_path(&self.base_path, index);
                if from.exists() {
                    let to = archive_path(&self.base_path, index + 1);
                    fs::rename(&from, &to).map_err(|e| SinkError::io(&from, e))?;
                }
            }
            let newest = archive_path(&self.base_path, 1);
            fs::rename(&staging, &newest).map_err(|e| SinkError::io(&staging, e))?;
        }

        state.file = None;
        remove_if_exists(&self.base_path)?;
        let (file, _) = touch(&self.base_path)?;
        state.file = Some(file);
        state.current_size = 0;

        tracing::debug!(
            sink = %self.name,
            path = ?self.base_path,
            archives = self.policy.max_archives,
            "Rotated log file"
        );
        Ok(())
    }
}

/// Where the next archive is written before it takes slot 1.
fn staging_path(base: &Path) -> PathBuf {
    let mut name = archive_path(base, 1).into_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

fn remove_if_exists(path: &Path) -> Result<(), SinkError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SinkError::io(path, e)),
    }
}

fn compress(source: &Path, target: &Path) -> io::Result<()> {
    let mut reader = BufReader::new(File::open(source)?);
    let mut encoder = GzEncoder::new(BufWriter::new(File::create(target)?), Compression::default());
    io::copy(&mut reader, &mut encoder)?;
    encoder.finish()?.flush()
}

impl std::fmt::Debug for RotatingFileSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotatingFileSink")
            .field("name", &self.name)
            .field("base_path", &self.base_path)
            .field("policy", &self.policy)
            .finish()
    }
}

impl Sink for RotatingFileSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, event: &Event) -> Result<(), SinkError> {
        let bytes = self.encoder.encode(event);
        let len = bytes.len() as u64;

        let mut state = self.state.lock();
        if self.is_stopped() {
            return Err(SinkError::Stopped(self.name.clone()));
        }
        if state.current_size > 0 && state.current_size + len > self.policy.max_file_size {
            self.rotate(&mut state)?;
        }
        if state.file.is_none() {
            // A previous rotation failed half way; pick the base file back up.
            let (file, size) = touch(&self.base_path)?;
            state.file = Some(file);
            state.current_size = size;
        }
        let file = state
            .file
            .as_mut()
            .ok_or_else(|| SinkError::Stopped(self.name.clone()))?;
        file.write_all(&bytes)
            .map_err(|e| SinkError::io(&self.base_path, e))?;
        state.current_size += len;
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        match self.state.lock().file.as_mut() {
            Some(file) => file.flush().map_err(|e| SinkError::io(&self.base_path, e)),
            None => Ok(()),
        }
    }

    fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut state = self.state.lock();
        if let Some(mut file) = state.file.take() {
            if let Err(e) = file.flush() {
                tracing::warn!(sink = %self.name, error = %e, "Flush failed while closing rotating log");
            }
        }
        tracing::debug!(sink = %self.name, "Rotating file sink stopped");
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}
