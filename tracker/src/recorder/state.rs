use std::fs::{File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::PathBuf;
use std::time::Duration;

use servo_track_common::config::RecordingConfig;
use servo_track_common::sample::{AngleSample, HEADER};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::keys::recording_path;
use crate::vision::smoother::Observation;

enum RecordingState {
    Idle,
    /// A session file is open and receiving rows.
    Recording(Session),
}

struct Session {
    writer: BufWriter<File>,
    path: PathBuf,
    index: u32,
    started_at: Instant,
    /// When the last row was appended; `None` until the first one.
    last_written: Option<Instant>,
    rows: u64,
}

/// Result of a start/stop request, so the caller can mirror it to peers.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Started { path: PathBuf, index: u32 },
    Stopped { path: PathBuf, rows: u64 },
    /// The request did not apply in the current state.
    Unchanged,
}

#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("failed to create recording file {path}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write recording file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no free recording index left for {base_name}")]
    IndexExhausted { base_name: String },
}

/// Owns the local recording state: `Idle` or `Recording`, never both.
///
/// Start and stop are idempotent. Rows are appended at most once per
/// `min_interval`, independent of the frame rate.
pub struct RecordingStateMachine {
    state: RecordingState,
    config: RecordingConfig,
    min_interval: Duration,
    /// Lowest index that may still be free. Only moves forward.
    next_index: u32,
}

impl RecordingStateMachine {
    pub fn new(config: RecordingConfig) -> Self {
        let min_interval = config.min_interval();
        Self {
            state: RecordingState::Idle,
            config,
            min_interval,
            next_index: 0,
        }
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.state, RecordingState::Recording(_))
    }

    /// Open a new session file under the first unused index.
    pub fn request_start(&mut self, now: Instant) -> Result<Transition, RecorderError> {
        if self.is_recording() {
            debug!("start requested while already recording, ignoring");
            return Ok(Transition::Unchanged);
        }

        let (index, path, file) = self.create_next_file()?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{HEADER}").map_err(|source| RecorderError::Write {
            path: path.clone(),
            source,
        })?;

        info!(
            path = %path.display(),
            index,
            wall_clock = %chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            "IDLE→RECORDING: session started"
        );
        self.next_index = index.saturating_add(1);
        self.state = RecordingState::Recording(Session {
            writer,
            path: path.clone(),
            index,
            started_at: now,
            last_written: None,
            rows: 0,
        });
        Ok(Transition::Started { path, index })
    }

    /// Flush and close the open session.
    pub fn request_stop(&mut self) -> Result<Transition, RecorderError> {
        let session = match std::mem::replace(&mut self.state, RecordingState::Idle) {
            RecordingState::Idle => {
                debug!("stop requested while idle, ignoring");
                return Ok(Transition::Unchanged);
            }
            RecordingState::Recording(session) => session,
        };

        let Session {
            mut writer,
            path,
            index,
            rows,
            ..
        } = session;
        writer.flush().map_err(|source| RecorderError::Write {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), index, rows, "RECORDING→IDLE: session closed");
        Ok(Transition::Stopped { path, rows })
    }

    /// Append `values` as a row if recording and the sampling interval has
    /// elapsed. Returns whether a row was written.
    pub fn sample(&mut self, now: Instant, values: &Observation) -> Result<bool, RecorderError> {
        let RecordingState::Recording(session) = &mut self.state else {
            return Ok(false);
        };

        if let Some(last) = session.last_written {
            if now.saturating_duration_since(last) < self.min_interval {
                return Ok(false);
            }
        }

        let row = AngleSample {
            time: now.saturating_duration_since(session.started_at).as_secs_f64(),
            pos_x: values.pos_x,
            pos_y: values.pos_y,
            diameter: values.diameter,
            angle_x: values.angle_x,
            angle_y: values.angle_y,
        };
        writeln!(session.writer, "{}", row.to_row()).map_err(|source| RecorderError::Write {
            path: session.path.clone(),
            source,
        })?;
        session.last_written = Some(now);
        session.rows += 1;
        debug!(time = row.time, rows = session.rows, "recorded sample");
        Ok(true)
    }

    /// Scan indices upward from `next_index` and create the first file that
    /// does not exist yet. Never truncates an existing file.
    fn create_next_file(&self) -> Result<(u32, PathBuf, File), RecorderError> {
        if let Err(e) = std::fs::create_dir_all(&self.config.dir) {
            warn!(dir = %self.config.dir.display(), error = %e, "could not create recording directory");
        }

        for index in self.next_index..=u32::MAX {
            let path = recording_path(&self.config.dir, &self.config.base_name, index);
            if path.exists() {
                continue;
            }
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((index, path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(source) => return Err(RecorderError::Create { path, source }),
            }
        }
        Err(RecorderError::IndexExhausted {
            base_name: self.config.base_name.clone(),
        })
    }
}

impl Drop for RecordingStateMachine {
    fn drop(&mut self) {
        if self.is_recording() {
            if let Err(e) = self.request_stop() {
                warn!(error = %e, "failed to close recording on shutdown");
            }
        }
    }
}
