use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::SerialConfig;

#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    #[error("failed to configure serial port {0}: {1}")]
    Configure(String, String),
    #[error("failed to open serial port {0}: {1}")]
    Open(String, std::io::Error),
    #[error("serial write failed: {0}")]
    Write(std::io::Error),
    #[error("serial write timed out after {0:?}")]
    Timeout(Duration),
}

/// Format one actuator update: `"<x>,<y>\n"` with two decimals.
pub fn format_command(x: f64, y: f64) -> String {
    format!("{:.2},{:.2}\n", tidy(x), tidy(y))
}

// Keeps "-0.00" off the wire.
fn tidy(v: f64) -> f64 {
    if v.abs() < 0.005 {
        0.0
    } else {
        v
    }
}

/// Line-oriented sink for actuator commands. Every write is bounded by a
/// timeout so an unresponsive device cannot stall the caller indefinitely.
pub struct SerialSink<W> {
    writer: W,
    timeout: Duration,
    lines_sent: u64,
}

impl SerialSink<File> {
    /// Configure the device with `stty` (raw mode, baud rate) and open it for writing.
    pub async fn open(config: &SerialConfig) -> Result<Self, SerialError> {
        configure_port(&config.port, config.baud_rate).await?;

        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .open(&config.port)
            .await
            .map_err(|e| SerialError::Open(config.port.clone(), e))?;

        info!(port = config.port, baud = config.baud_rate, "serial port opened");
        Ok(Self::new(
            file,
            Duration::from_millis(config.write_timeout_ms),
        ))
    }
}

impl<W: AsyncWrite + Unpin> SerialSink<W> {
    pub fn new(writer: W, timeout: Duration) -> Self {
        Self {
            writer,
            timeout,
            lines_sent: 0,
        }
    }

    /// Send one `x,y` update.
    pub async fn send(&mut self, x: f64, y: f64) -> Result<(), SerialError> {
        let line = format_command(x, y);
        let timeout = self.timeout;
        let writer = &mut self.writer;
        let bytes = line.as_bytes();
        let write = async move {
            writer.write_all(bytes).await?;
            writer.flush().await
        };
        match tokio::time::timeout(timeout, write).await {
            Ok(Ok(())) => {
                self.lines_sent += 1;
                debug!(line = line.trim_end(), "serial command sent");
                Ok(())
            }
            Ok(Err(e)) => Err(SerialError::Write(e)),
            Err(_) => Err(SerialError::Timeout(self.timeout)),
        }
    }

    pub fn lines_sent(&self) -> u64 {
        self.lines_sent
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

async fn configure_port(port: &str, baud_rate: u32) -> Result<(), SerialError> {
    let output = Command::new("stty")
        .args(["-F", port, &baud_rate.to_string(), "raw", "-echo"])
        .output()
        .await
        .map_err(|e| SerialError::Configure(port.to_string(), e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SerialError::Configure(
            port.to_string(),
            stderr.trim().to_string(),
        ));
    }
    debug!(port, baud_rate, "serial port configured");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_has_two_decimals() {
        assert_eq!(format_command(0.0, -90.0), "0.00,-90.00\n");
        assert_eq!(format_command(12.346, 7.0), "12.35,7.00\n");
    }

    #[test]
    fn negative_zero_is_not_signed() {
        assert_eq!(format_command(-0.0, -0.001), "0.00,0.00\n");
    }

    #[tokio::test]
    async fn send_writes_lines() {
        let mut sink = SerialSink::new(Vec::new(), Duration::from_millis(50));
        sink.send(1.0, 2.0).await.unwrap();
        sink.send(-45.5, 90.0).await.unwrap();
        assert_eq!(sink.lines_sent(), 2);
        let written = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(written, "1.00,2.00\n-45.50,90.00\n");
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_device_times_out() {
        // Reader is kept alive but never drained, so the second byte blocks.
        let (writer, _reader) = tokio::io::duplex(1);
        let mut sink = SerialSink::new(writer, Duration::from_millis(50));
        let err = sink.send(1.0, 2.0).await.unwrap_err();
        assert!(matches!(err, SerialError::Timeout(t) if t == Duration::from_millis(50)), "{err}");
        assert_eq!(sink.lines_sent(), 0);
    }

    #[tokio::test]
    async fn missing_device_fails_to_open() {
        let config = SerialConfig {
            port: "/nonexistent/servo-track-tty".into(),
            baud_rate: 9600,
            write_timeout_ms: 10,
            enabled: true,
        };
        assert!(SerialSink::open(&config).await.is_err());
    }
}
