mod events;
mod pipeline;
mod recorder;
mod source;
mod sync;
mod vision;

use std::path::PathBuf;
use std::time::Duration;

use events::ControlEvent;
use pipeline::{Flow, Session};
use servo_track_common::color::ColorRange;
use servo_track_common::config::Config;
use servo_track_common::internal::InternalConfig;
use servo_track_common::serial::SerialSink;
use source::{FrameSource, ImageSequence};
use sync::kafka::{self, KafkaPublisher};
use sync::SyncIdentity;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Queue depth for operator and peer commands.
const EVENT_QUEUE: usize = 64;

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        frames_dir = %config.video.frames_dir.display(),
        fps = config.video.fps,
        serial_port = config.serial.port,
        brokers = config.sync.brokers,
        topic_prefix = config.sync.topic_prefix,
        recording_dir = %config.recording.dir.display(),
        "starting servo-track"
    );

    let range = match &config.vision.color_file {
        Some(path) if path.exists() => match ColorRange::read_file(path) {
            Ok(r) => {
                info!(path = %path.display(), lower = ?r.lower, upper = ?r.upper, "loaded color range");
                r
            }
            Err(e) => {
                error!(error = %e, "failed to read color range file");
                std::process::exit(1);
            }
        },
        _ => ColorRange::new(config.vision.lower_hsv, config.vision.upper_hsv),
    };

    let internal = match InternalConfig::load(&config.internal_config) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to load internal config");
            std::process::exit(1);
        }
    };

    let source = match ImageSequence::open(&config.video.frames_dir, config.video.frame_width) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to open frame source");
            std::process::exit(1);
        }
    };

    // The actuator is a hard dependency when enabled.
    let serial = if config.serial.enabled {
        match SerialSink::open(&config.serial).await {
            Ok(s) => Some(s),
            Err(e) => {
                error!(error = %e, "serial port unavailable");
                std::process::exit(1);
            }
        }
    } else {
        info!("serial output disabled");
        None
    };

    let identity = SyncIdentity::generate();
    info!(id = %identity.id(), "sync identity");

    let publisher = match KafkaPublisher::new(&config.sync) {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "failed to create Kafka producer");
            std::process::exit(1);
        }
    };
    if let Err(e) = publisher.verify_broker(&config.sync.brokers) {
        error!(error = %e, "pub/sub channel unavailable");
        std::process::exit(1);
    }
    let consumer = match kafka::create_consumer(&config.sync, &identity) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to create Kafka consumer");
            std::process::exit(1);
        }
    };
    info!(topic = publisher.topic(), "sync bridge ready");

    let (tx, rx) = mpsc::channel(EVENT_QUEUE);
    tokio::spawn(kafka::run_listener(consumer, identity, tx.clone()));
    tokio::spawn(events::read_stdin(tx.clone()));
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received");
            let _ = tx.send(ControlEvent::Quit).await;
        }
    });

    let session = Session::new(&config, range, internal, identity);
    info!(
        fixed_point = ?session.fixed_point(),
        exclusion_points = session.exclusion().points().len(),
        "session ready"
    );

    info!("entering control loop");
    // Validated at load.
    let Some(period) = config.video.frame_period() else {
        error!(fps = config.video.fps, "unusable frame rate");
        std::process::exit(1);
    };
    run_control_loop(session, source, serial, &publisher, rx, period).await;
}

async fn run_control_loop(
    mut session: Session,
    mut source: impl FrameSource,
    mut serial: Option<SerialSink<tokio::fs::File>>,
    publisher: &KafkaPublisher,
    mut events: mpsc::Receiver<ControlEvent>,
    period: Duration,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut processed: u64 = 0;

    'frames: loop {
        ticker.tick().await;
        let now = Instant::now();

        while let Ok(event) = events.try_recv() {
            if session.handle_event(event, now, publisher).await == Flow::Quit {
                break 'frames;
            }
        }

        source.set_paused(!session.is_playing());
        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!(processed, "end of frame sequence");
                break;
            }
            Err(e) => {
                warn!(error = %e, "skipping frame");
                continue;
            }
        };
        if !session.is_playing() {
            continue;
        }

        if let Some(out) = session.process_frame(&frame) {
            if let Some(sink) = serial.as_mut() {
                if let Err(e) = sink.send(out.angle_x, out.angle_y).await {
                    warn!(error = %e, "serial write failed");
                }
            }
        }
        session.record(now);

        processed += 1;
        if processed % 100 == 0 {
            debug!(processed, "frames processed");
        }
    }

    session.shutdown();
    if let Some(sink) = &serial {
        info!(lines = sink.lines_sent(), "serial lines sent");
    }
    info!("servo-track stopped");
}
