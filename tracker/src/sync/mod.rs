pub mod command;
pub mod kafka;

use std::future::Future;

use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::recorder::{RecorderError, RecordingStateMachine, Transition};
pub use command::{control_topic, kafka_topic, SyncCommand, SyncVerb};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("command payload is not UTF-8")]
    NotUtf8,
    #[error("malformed command payload: {0:?}")]
    Malformed(String),
    #[error("unknown command verb: {0}")]
    UnknownVerb(String),
    #[error("failed to create Kafka client: {0}")]
    KafkaCreate(String),
    #[error("failed to subscribe to {topic}: {reason}")]
    Subscribe { topic: String, reason: String },
    #[error("broker unreachable at {brokers}: {reason}")]
    Unavailable { brokers: String, reason: String },
    #[error("failed to publish {verb}: {reason}")]
    Publish { verb: SyncVerb, reason: String },
}

/// Sends recording commands to the other trackers.
pub trait CommandPublisher {
    fn publish(&self, command: SyncCommand) -> impl Future<Output = Result<(), SyncError>> + Send;
}

/// This process's identity on the control topic.
///
/// Every outgoing command carries the id; incoming commands carrying the same
/// id are echoes of our own publishes and are never applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncIdentity {
    id: Uuid,
}

impl SyncIdentity {
    pub fn generate() -> Self {
        Self { id: Uuid::new_v4() }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn command(&self, verb: SyncVerb) -> SyncCommand {
        SyncCommand::new(self.id, verb)
    }

    /// Decode a raw payload, dropping malformed ones and our own echoes.
    pub fn accept(&self, payload: &[u8]) -> Option<SyncCommand> {
        match SyncCommand::decode(payload) {
            Ok(cmd) if cmd.sender_id == self.id => {
                debug!(verb = %cmd.verb, "ignoring own command");
                None
            }
            Ok(cmd) => Some(cmd),
            Err(e) => {
                warn!(error = %e, "dropping malformed sync command");
                None
            }
        }
    }

    /// Apply a peer's command to the local recorder. START only acts while
    /// idle and STOP only while recording.
    pub fn apply(
        &self,
        cmd: &SyncCommand,
        recorder: &mut RecordingStateMachine,
        now: Instant,
    ) -> Result<Transition, RecorderError> {
        if cmd.sender_id == self.id {
            return Ok(Transition::Unchanged);
        }
        let transition = match (cmd.verb, recorder.is_recording()) {
            (SyncVerb::Start, false) => recorder.request_start(now)?,
            (SyncVerb::Stop, true) => recorder.request_stop()?,
            _ => Transition::Unchanged,
        };
        if transition != Transition::Unchanged {
            info!(peer = %cmd.sender_id, verb = %cmd.verb, "applied remote command");
        }
        Ok(transition)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use servo_track_common::config::RecordingConfig;
    use std::sync::Mutex;

    /// Publisher that keeps every command in memory.
    #[derive(Default)]
    pub(crate) struct MemoryPublisher {
        pub sent: Mutex<Vec<SyncCommand>>,
    }

    impl CommandPublisher for MemoryPublisher {
        async fn publish(&self, command: SyncCommand) -> Result<(), SyncError> {
            self.sent.lock().unwrap().push(command);
            Ok(())
        }
    }

    fn recorder() -> (RecordingStateMachine, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("servo-track-sync-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let rec = RecordingStateMachine::new(RecordingConfig {
            dir: dir.clone(),
            base_name: "angles".into(),
            min_interval_secs: 0.1,
        });
        (rec, dir)
    }

    #[test]
    fn own_commands_never_applied() {
        let me = SyncIdentity::generate();
        let (mut rec, dir) = recorder();
        let now = Instant::now();

        for verb in [SyncVerb::Start, SyncVerb::Stop] {
            for recording in [false, true] {
                if recording != rec.is_recording() {
                    if recording {
                        rec.request_start(now).unwrap();
                    } else {
                        rec.request_stop().unwrap();
                    }
                }
                let cmd = me.command(verb);
                assert_eq!(me.accept(cmd.encode().as_bytes()), None);
                assert_eq!(me.apply(&cmd, &mut rec, now).unwrap(), Transition::Unchanged);
                assert_eq!(rec.is_recording(), recording);
            }
        }
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn peer_commands_follow_state() {
        let me = SyncIdentity::generate();
        let peer = SyncIdentity::generate();
        let (mut rec, dir) = recorder();
        let now = Instant::now();

        let stop = peer.command(SyncVerb::Stop);
        assert_eq!(me.apply(&stop, &mut rec, now).unwrap(), Transition::Unchanged);

        let start = me.accept(peer.command(SyncVerb::Start).encode().as_bytes()).unwrap();
        assert!(matches!(me.apply(&start, &mut rec, now).unwrap(), Transition::Started { .. }));
        assert_eq!(me.apply(&start, &mut rec, now).unwrap(), Transition::Unchanged);
        assert!(matches!(me.apply(&stop, &mut rec, now).unwrap(), Transition::Stopped { rows: 0, .. }));
        assert!(!rec.is_recording());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn malformed_payload_dropped() {
        let me = SyncIdentity::generate();
        assert_eq!(me.accept(b"garbage"), None);
        assert_eq!(me.accept(b""), None);
    }

    #[tokio::test]
    async fn memory_publisher_keeps_order() {
        let me = SyncIdentity::generate();
        let publisher = MemoryPublisher::default();
        publisher.publish(me.command(SyncVerb::Start)).await.unwrap();
        publisher.publish(me.command(SyncVerb::Stop)).await.unwrap();
        let sent = publisher.sent.lock().unwrap();
        let verbs: Vec<SyncVerb> = sent.iter().map(|c| c.verb).collect();
        assert_eq!(verbs, vec![SyncVerb::Start, SyncVerb::Stop]);
        assert!(sent.iter().all(|c| c.sender_id == me.id()));
    }
}
