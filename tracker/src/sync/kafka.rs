use std::time::Duration;

use futures_util::StreamExt;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::ClientConfig;
use servo_track_common::config::SyncConfig;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{control_topic, kafka_topic, CommandPublisher, SyncCommand, SyncError, SyncIdentity};
use crate::events::ControlEvent;

/// Publishes recording commands to the Kafka control topic.
pub struct KafkaPublisher {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
}

impl KafkaPublisher {
    pub fn new(config: &SyncConfig) -> Result<Self, SyncError> {
        let timeout = Duration::from_millis(config.publish_timeout_ms);
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("message.timeout.ms", config.publish_timeout_ms.to_string())
            .set("linger.ms", "0")
            .set("request.timeout.ms", "5000")
            .create()
            .map_err(|e| SyncError::KafkaCreate(e.to_string()))?;
        Ok(Self {
            producer,
            topic: kafka_topic(&control_topic(&config.topic_prefix)),
            timeout,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Fail fast when no broker answers a metadata request.
    pub fn verify_broker(&self, brokers: &str) -> Result<(), SyncError> {
        let client = self.producer.client();
        tokio::task::block_in_place(|| client.fetch_metadata(None, self.timeout))
            .map(|metadata| {
                info!(brokers, count = metadata.brokers().len(), "connected to Kafka");
            })
            .map_err(|e| SyncError::Unavailable {
                brokers: brokers.to_string(),
                reason: e.to_string(),
            })
    }
}

impl CommandPublisher for KafkaPublisher {
    async fn publish(&self, command: SyncCommand) -> Result<(), SyncError> {
        let payload = command.encode();
        let key = command.sender_id.to_string();
        let record = FutureRecord::to(&self.topic).key(&key).payload(&payload);

        match self.producer.send(record, self.timeout).await {
            Ok(_) => {
                debug!(topic = self.topic, verb = %command.verb, "published sync command");
                Ok(())
            }
            Err((e, _)) => Err(SyncError::Publish {
                verb: command.verb,
                reason: e.to_string(),
            }),
        }
    }
}

/// Consumer subscribed with a group id unique to this process, so every
/// tracker receives every command.
pub fn create_consumer(config: &SyncConfig, identity: &SyncIdentity) -> Result<StreamConsumer, SyncError> {
    let group_id = format!("{}-{}", config.group_prefix, identity.id());
    let topic = kafka_topic(&control_topic(&config.topic_prefix));

    let consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", &config.brokers)
        .set("group.id", &group_id)
        .set("auto.offset.reset", "latest")
        .set("enable.auto.commit", "false")
        .set("allow.auto.create.topics", "true")
        .create()
        .map_err(|e| SyncError::KafkaCreate(e.to_string()))?;

    consumer
        .subscribe(&[&topic])
        .map_err(|e| SyncError::Subscribe {
            topic: topic.clone(),
            reason: e.to_string(),
        })?;

    info!(topic, group_id, "subscribed to control topic");
    Ok(consumer)
}

/// Forward peer commands into the control queue until the queue closes.
/// Consume errors are logged; librdkafka reconnects on its own.
pub async fn run_listener(
    consumer: StreamConsumer,
    identity: SyncIdentity,
    events: mpsc::Sender<ControlEvent>,
) {
    let mut stream = consumer.stream();

    while let Some(result) = stream.next().await {
        // The borrowed message is released before awaiting the queue.
        let cmd = match result {
            Ok(msg) => match msg.payload() {
                Some(payload) => identity.accept(payload),
                None => {
                    debug!("empty control message, skipping");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "Kafka consume error");
                None
            }
        };
        let Some(cmd) = cmd else {
            continue;
        };

        debug!(peer = %cmd.sender_id, verb = %cmd.verb, "received sync command");
        if events.send(ControlEvent::Remote(cmd)).await.is_err() {
            debug!("control loop closed, stopping listener");
            break;
        }
    }
}
