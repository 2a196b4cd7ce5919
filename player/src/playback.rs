use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use servo_track_common::angle::ClampPolicy;
use servo_track_common::sample::{AngleSample, SampleError};
use servo_track_common::serial::SerialSink;
use tokio::io::{AsyncBufReadExt, AsyncWrite, BufReader};
use tracing::{debug, warn};

use crate::curve::AxisMapper;

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("failed to open recording {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read recording {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed row {line} in {path}: {source}")]
    Row {
        path: PathBuf,
        line: usize,
        source: SampleError,
    },
    #[error("row {line} in {path}: delay of {delay}s cannot be slept")]
    Delay {
        path: PathBuf,
        line: usize,
        delay: f64,
    },
}

/// Result of playing one recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackSummary {
    pub samples: u64,
    /// Stopped early by the quit signal.
    pub interrupted: bool,
}

/// Replays recordings to the actuator with their recorded timing.
pub struct Player<W> {
    sink: SerialSink<W>,
    x: AxisMapper,
    y: AxisMapper,
    input_policy: ClampPolicy,
}

impl<W: AsyncWrite + Unpin> Player<W> {
    pub fn new(sink: SerialSink<W>, x: AxisMapper, y: AxisMapper, input_policy: ClampPolicy) -> Self {
        Self {
            sink,
            x,
            y,
            input_policy,
        }
    }

    pub fn into_sink(self) -> SerialSink<W> {
        self.sink
    }

    /// Map one recorded angle pair to actuator units.
    pub fn map(&self, angle_x: f64, angle_y: f64) -> (f64, f64) {
        (
            self.x.map(self.input_policy.apply(angle_x)),
            self.y.map(self.input_policy.apply(angle_y)),
        )
    }

    /// Play one recording from start to end.
    ///
    /// Sleeps `t[i] - t[i-1]` before each sample (the first is relative to 0)
    /// and sends non-positive delays immediately. `quit` is checked once per
    /// sample. A malformed row ends this file with an error; rows already sent
    /// stay sent.
    pub async fn play_file(&mut self, path: &Path, quit: &AtomicBool) -> Result<PlaybackSummary, PlaybackError> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|source| PlaybackError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        let mut lines = BufReader::new(file).lines();

        let mut line_no = 0usize;
        let mut previous = 0.0f64;
        let mut summary = PlaybackSummary {
            samples: 0,
            interrupted: false,
        };

        loop {
            let line = lines.next_line().await.map_err(|source| PlaybackError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            let Some(line) = line else {
                break;
            };
            line_no += 1;
            // Header.
            if line_no == 1 || line.trim().is_empty() {
                continue;
            }

            if quit.load(Ordering::Relaxed) {
                summary.interrupted = true;
                break;
            }

            let sample = AngleSample::parse_row(&line).map_err(|source| PlaybackError::Row {
                path: path.to_path_buf(),
                line: line_no,
                source,
            })?;

            let delay = sample.time - previous;
            if delay > 0.0 {
                let wait = Duration::try_from_secs_f64(delay).map_err(|_| PlaybackError::Delay {
                    path: path.to_path_buf(),
                    line: line_no,
                    delay,
                })?;
                tokio::time::sleep(wait).await;
            }
            previous = sample.time;

            let (out_x, out_y) = self.map(sample.angle_x, sample.angle_y);
            debug!(
                time = sample.time,
                angle_x = sample.angle_x,
                angle_y = sample.angle_y,
                out_x,
                out_y,
                "playing sample"
            );
            if let Err(e) = self.sink.send(out_x, out_y).await {
                warn!(error = %e, line = line_no, "serial write failed");
            }
            summary.samples += 1;
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::ResponseCurve;
    use servo_track_common::config::CurveShape;
    use servo_track_common::sample::HEADER;
    use tokio::time::Instant;

    fn temp_file(rows: &[&str]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("servo-track-play-{}.csv", uuid::Uuid::new_v4()));
        let mut content = format!("{HEADER}\n");
        for row in rows {
            content.push_str(row);
            content.push('\n');
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    fn linear(range: [f64; 2]) -> AxisMapper {
        let [min, max] = range;
        let curve = ResponseCurve::fit(CurveShape::Linear, &[(-90.0, min), (90.0, max)]).unwrap();
        AxisMapper::new(curve, range)
    }

    fn player(policy: ClampPolicy) -> Player<Vec<u8>> {
        let sink = SerialSink::new(Vec::new(), Duration::from_millis(100));
        Player::new(sink, linear([0.0, 180.0]), linear([0.0, 180.0]), policy)
    }

    fn output(player: Player<Vec<u8>>) -> String {
        String::from_utf8(player.into_sink().into_inner()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn replays_recorded_timing() {
        let path = temp_file(&[
            "0.0,320,200,40,0,0",
            "0.5,320,200,40,45,-45",
            "1.5,320,200,40,-90,90",
        ]);
        let mut p = player(ClampPolicy::Unclamped);
        let quit = AtomicBool::new(false);

        let started = Instant::now();
        let summary = p.play_file(&path, &quit).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(
            summary,
            PlaybackSummary {
                samples: 3,
                interrupted: false
            }
        );
        assert!(elapsed >= Duration::from_millis(1500), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(1600), "{elapsed:?}");
        assert_eq!(output(p), "90.00,90.00\n135.00,45.00\n0.00,180.00\n");
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test(start_paused = true)]
    async fn backwards_time_sends_immediately() {
        let path = temp_file(&["1.0,0,0,0,0,0", "0.4,0,0,0,0,0", "0.4,0,0,0,0,0"]);
        let mut p = player(ClampPolicy::Unclamped);
        let started = Instant::now();
        let summary = p.play_file(&path, &AtomicBool::new(false)).await.unwrap();
        assert_eq!(summary.samples, 3);
        assert!(started.elapsed() < Duration::from_millis(1100));
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test(start_paused = true)]
    async fn output_is_clamped_to_range() {
        let path = temp_file(&["0.0,0,0,0,120,-150"]);
        let mut p = player(ClampPolicy::Unclamped);
        p.play_file(&path, &AtomicBool::new(false)).await.unwrap();
        assert_eq!(output(p), "180.00,0.00\n");
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_row_aborts_only_that_file() {
        let bad = temp_file(&["0.0,0,0,0,0,0", "0.1,0,0,0,oops,0", "0.2,0,0,0,90,90"]);
        let good = temp_file(&["0.0,0,0,0,90,90"]);
        let mut p = player(ClampPolicy::Unclamped);
        let quit = AtomicBool::new(false);

        let err = p.play_file(&bad, &quit).await.unwrap_err();
        assert!(matches!(err, PlaybackError::Row { line: 3, .. }), "{err}");
        assert_eq!(p.play_file(&good, &quit).await.unwrap().samples, 1);
        assert_eq!(output(p), "90.00,90.00\n180.00,180.00\n");
        std::fs::remove_file(&bad).ok();
        std::fs::remove_file(&good).ok();
    }

    #[tokio::test(start_paused = true)]
    async fn non_finite_time_aborts_file() {
        for rows in [
            vec!["0.0,0,0,0,0,0", "inf,0,0,0,0,0"],
            vec!["-inf,0,0,0,0,0", "0.5,0,0,0,0,0"],
            vec!["NaN,0,0,0,0,0", "0.5,0,0,0,0,0"],
        ] {
            let path = temp_file(&rows);
            let mut p = player(ClampPolicy::Unclamped);
            let err = p.play_file(&path, &AtomicBool::new(false)).await.unwrap_err();
            assert!(
                matches!(
                    err,
                    PlaybackError::Row {
                        source: SampleError::NotFinite { column: "Time", .. },
                        ..
                    }
                ),
                "{rows:?}: {err}"
            );
            std::fs::remove_file(&path).ok();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_delay_aborts_file() {
        let path = temp_file(&["0.0,0,0,0,0,0", "1e30,0,0,0,0,0"]);
        let mut p = player(ClampPolicy::Unclamped);
        let err = p.play_file(&path, &AtomicBool::new(false)).await.unwrap_err();
        assert!(matches!(err, PlaybackError::Delay { line: 3, .. }), "{err}");
        // The row before the bad delay was already sent.
        assert_eq!(output(p), "90.00,90.00\n");
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test(start_paused = true)]
    async fn short_row_is_malformed() {
        let path = temp_file(&["0.0,1,2"]);
        let mut p = player(ClampPolicy::Unclamped);
        let err = p.play_file(&path, &AtomicBool::new(false)).await.unwrap_err();
        assert!(matches!(
            err,
            PlaybackError::Row {
                source: SampleError::TooShort { .. },
                ..
            }
        ));
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn missing_file_is_open_error() {
        let mut p = player(ClampPolicy::Unclamped);
        let missing = std::env::temp_dir().join(format!("servo-track-missing-{}.csv", uuid::Uuid::new_v4()));
        let err = p.play_file(&missing, &AtomicBool::new(false)).await.unwrap_err();
        assert!(matches!(err, PlaybackError::Open { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn quit_stops_before_next_sample() {
        let path = temp_file(&["0.0,0,0,0,0,0", "1.0,0,0,0,0,0"]);
        let mut p = player(ClampPolicy::Unclamped);
        let quit = AtomicBool::new(true);
        let summary = p.play_file(&path, &quit).await.unwrap();
        assert_eq!(
            summary,
            PlaybackSummary {
                samples: 0,
                interrupted: true
            }
        );
        assert_eq!(output(p), "");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn input_clamp_policy() {
        let sink = SerialSink::new(Vec::new(), Duration::from_millis(100));
        let p = Player::new(sink, linear([0.0, 360.0]), linear([0.0, 360.0]), ClampPolicy::Clamped);
        assert_eq!(p.map(120.0, -120.0), (360.0, 0.0));
        assert_eq!(p.map(0.0, 0.0), (180.0, 180.0));
    }
}
