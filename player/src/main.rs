mod curve;
mod playback;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use curve::AxisMapper;
use playback::Player;
use servo_track_common::angle::ClampPolicy;
use servo_track_common::config::PlayerConfig;
use servo_track_common::serial::SerialSink;
use tokio::io::AsyncWrite;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("player.toml"));

    let config = match PlayerConfig::load(&config_path) {
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

    let (x, y) = match (AxisMapper::from_config(&config.x), AxisMapper::from_config(&config.y)) {
        (Ok(x), Ok(y)) => (x, y),
        (Err(e), _) => {
            error!(error = %e, axis = "x", "invalid response curve");
            std::process::exit(1);
        }
        (_, Err(e)) => {
            error!(error = %e, axis = "y", "invalid response curve");
            std::process::exit(1);
        }
    };

    info!(
        files = config.files.len(),
        serial_port = config.serial.port,
        x_curve = ?config.x.curve,
        x_range = ?config.x.range,
        y_curve = ?config.y.curve,
        y_range = ?config.y.range,
        clamp_input = config.clamp_input,
        "starting servo-track player"
    );

    let input_policy = if config.clamp_input {
        ClampPolicy::Clamped
    } else {
        ClampPolicy::Unclamped
    };

    let quit = Arc::new(AtomicBool::new(false));
    let interrupt = Arc::clone(&quit);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping after the current sample");
            interrupt.store(true, Ordering::Relaxed);
        }
    });

    if config.serial.enabled {
        let sink = match SerialSink::open(&config.serial).await {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "serial port unavailable");
                std::process::exit(1);
            }
        };
        run(Player::new(sink, x, y, input_policy), &config.files, &quit).await;
    } else {
        // Dry run: print the actuator lines instead.
        warn!("serial output disabled, writing commands to stdout");
        let sink = SerialSink::new(
            tokio::io::stdout(),
            Duration::from_millis(config.serial.write_timeout_ms),
        );
        run(Player::new(sink, x, y, input_policy), &config.files, &quit).await;
    }
}

async fn run<W: AsyncWrite + Unpin>(mut player: Player<W>, files: &[PathBuf], quit: &AtomicBool) {
    for path in files {
        match player.play_file(path, quit).await {
            Ok(summary) if summary.interrupted => {
                info!(path = %path.display(), samples = summary.samples, "playback interrupted");
                break;
            }
            Ok(summary) => {
                info!(path = %path.display(), samples = summary.samples, "completed playback");
            }
            Err(e) => {
                error!(error = %e, "playback aborted for file");
            }
        }
    }
    info!(lines = player.into_sink().lines_sent(), "player finished");
}
