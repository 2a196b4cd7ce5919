use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use super::SyncError;

/// Wire separator between the sender id and the verb.
const SEPARATOR: char = '|';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncVerb {
    Start,
    Stop,
}

impl SyncVerb {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncVerb::Start => "START_RECORDING",
            SyncVerb::Stop => "STOP_RECORDING",
        }
    }
}

impl fmt::Display for SyncVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncVerb {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "START_RECORDING" => Ok(SyncVerb::Start),
            "STOP_RECORDING" => Ok(SyncVerb::Stop),
            other => Err(SyncError::UnknownVerb(other.to_string())),
        }
    }
}

/// A recording command as exchanged between trackers: `"<senderId>|<VERB>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncCommand {
    pub sender_id: Uuid,
    pub verb: SyncVerb,
}

impl SyncCommand {
    pub fn new(sender_id: Uuid, verb: SyncVerb) -> Self {
        Self { sender_id, verb }
    }

    pub fn encode(&self) -> String {
        format!("{}{SEPARATOR}{}", self.sender_id, self.verb)
    }

    pub fn decode(payload: &[u8]) -> Result<Self, SyncError> {
        let text = std::str::from_utf8(payload).map_err(|_| SyncError::NotUtf8)?;
        let (id, verb) = text
            .trim()
            .split_once(SEPARATOR)
            .ok_or_else(|| SyncError::Malformed(text.to_string()))?;
        let sender_id =
            Uuid::parse_str(id).map_err(|_| SyncError::Malformed(text.to_string()))?;
        Ok(Self {
            sender_id,
            verb: verb.parse()?,
        })
    }
}

/// Logical control topic for a deployment.
/// e.g. "lab/servo/record"
pub fn control_topic(prefix: &str) -> String {
    format!("{}/record", prefix.trim_end_matches('/'))
}

/// Kafka spelling of a logical topic; Kafka names only allow `[A-Za-z0-9._-]`.
/// e.g. "lab/servo/record" -> "lab.servo.record"
pub fn kafka_topic(logical: &str) -> String {
    logical
        .chars()
        .map(|c| match c {
            '/' => '.',
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') => c,
            _ => '_',
        })
        .collect()
}
