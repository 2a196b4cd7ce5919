use std::str::FromStr;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::sync::SyncCommand;

/// Everything the control loop reacts to besides frames.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    TogglePlay,
    EnterEdit,
    LeaveEdit,
    AddPoint(i32, i32),
    Grab(i32, i32),
    Drag(i32, i32),
    Release,
    DeletePoint(i32, i32),
    SetFixedPoint(i32, i32),
    ToggleRecording,
    Quit,
    /// Command received from a peer tracker.
    Remote(SyncCommand),
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum EventParseError {
    #[error("unknown command: {0:?}")]
    Unknown(String),
    #[error("{0} expects two integer coordinates")]
    Coordinates(&'static str),
}

fn coordinates<'a>(
    name: &'static str,
    mut args: impl Iterator<Item = &'a str>,
) -> Result<(i32, i32), EventParseError> {
    let mut next = || {
        args.next()
            .and_then(|v| v.parse::<i32>().ok())
            .ok_or(EventParseError::Coordinates(name))
    };
    let point = (next()?, next()?);
    if args.next().is_some() {
        return Err(EventParseError::Coordinates(name));
    }
    Ok(point)
}

impl FromStr for ControlEvent {
    type Err = EventParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Err(EventParseError::Unknown(String::new()));
        };
        let event = match head {
            "space" => ControlEvent::TogglePlay,
            "e" => ControlEvent::EnterEdit,
            "esc" => ControlEvent::LeaveEdit,
            "release" => ControlEvent::Release,
            "r" => ControlEvent::ToggleRecording,
            "q" => ControlEvent::Quit,
            "add" => {
                let (x, y) = coordinates("add", words)?;
                return Ok(ControlEvent::AddPoint(x, y));
            }
            "grab" => {
                let (x, y) = coordinates("grab", words)?;
                return Ok(ControlEvent::Grab(x, y));
            }
            "drag" => {
                let (x, y) = coordinates("drag", words)?;
                return Ok(ControlEvent::Drag(x, y));
            }
            "delete" => {
                let (x, y) = coordinates("delete", words)?;
                return Ok(ControlEvent::DeletePoint(x, y));
            }
            "p" => {
                let (x, y) = coordinates("p", words)?;
                return Ok(ControlEvent::SetFixedPoint(x, y));
            }
            other => return Err(EventParseError::Unknown(other.to_string())),
        };
        if words.next().is_some() {
            return Err(EventParseError::Unknown(line.trim().to_string()));
        }
        Ok(event)
    }
}

/// Read operator commands from stdin, one per line, until EOF or until the
/// control loop goes away.
pub async fn read_stdin(events: mpsc::Sender<ControlEvent>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<ControlEvent>() {
                    Ok(event) => {
                        debug!(?event, "operator command");
                        if events.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "ignoring operator input"),
                }
            }
            Ok(None) => {
                info!("stdin closed, no more operator commands");
                break;
            }
            Err(e) => {
                warn!(error = %e, "failed to read stdin");
                break;
            }
        }
    }
}
