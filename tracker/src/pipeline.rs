use std::path::PathBuf;

use image::RgbImage;
use servo_track_common::angle::ClampPolicy;
use servo_track_common::color::ColorRange;
use servo_track_common::config::Config;
use servo_track_common::internal::InternalConfig;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::events::ControlEvent;
use crate::recorder::RecordingStateMachine;
use crate::sync::{CommandPublisher, SyncIdentity, SyncVerb};
use crate::vision::angle::AngleMapper;
use crate::vision::blob::{self, TrackedBlob};
use crate::vision::exclusion::ExclusionPolygon;
use crate::vision::mask::ColorMaskFilter;
use crate::vision::smoother::{Observation, TemporalSmoother};

/// What the control loop should do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// All runtime state of one tracker, owned by the control loop.
pub struct Session {
    mask: ColorMaskFilter,
    exclusion: ExclusionPolygon,
    editing: bool,
    /// Exclusion point being dragged.
    selected: Option<usize>,
    mapper: AngleMapper,
    smoother: TemporalSmoother,
    /// Most recent unsmoothed observation; this is what gets recorded.
    latest: Option<Observation>,
    recorder: RecordingStateMachine,
    playing: bool,
    internal: InternalConfig,
    internal_path: PathBuf,
    identity: SyncIdentity,
}

impl Session {
    pub fn new(
        config: &Config,
        range: ColorRange,
        internal: InternalConfig,
        identity: SyncIdentity,
    ) -> Self {
        let [min, max] = config.vision.diameter_bounds;
        Self {
            mask: ColorMaskFilter::new(range),
            exclusion: ExclusionPolygon::new(internal.exclusion_points()),
            editing: false,
            selected: None,
            mapper: AngleMapper::new(internal.fixed_point(), (min, max), ClampPolicy::Unclamped),
            smoother: TemporalSmoother::new(config.vision.moving_average_strength),
            latest: None,
            recorder: RecordingStateMachine::new(config.recording.clone()),
            playing: true,
            internal,
            internal_path: config.internal_config.clone(),
            identity,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn exclusion(&self) -> &ExclusionPolygon {
        &self.exclusion
    }

    pub fn fixed_point(&self) -> (i32, i32) {
        self.mapper.fixed_point()
    }

    /// Run one frame through mask, exclusion and blob search.
    ///
    /// Returns the smoothed output to send to the actuator, or `None` until
    /// the first blob has been seen. Frames without a blob keep the previous
    /// smoothed values.
    pub fn process_frame(&mut self, frame: &RgbImage) -> Option<Observation> {
        let mut mask = self.mask.apply(frame);
        self.exclusion.apply(&mut mask);

        match blob::locate(&mask) {
            Some(found) => Some(self.observe(&found)),
            None => {
                debug!("no blob in frame");
                self.latest.map(|_| self.smoother.current())
            }
        }
    }

    /// Map a located blob to angles and feed the smoother.
    pub fn observe(&mut self, found: &TrackedBlob) -> Observation {
        let (angle_x, angle_y) = self.mapper.map(found);
        let raw = Observation {
            pos_x: f64::from(found.center.0),
            pos_y: f64::from(found.center.1),
            diameter: found.diameter,
            angle_x,
            angle_y,
        };
        self.latest = Some(raw);
        let smoothed = self.smoother.update(&raw);
        debug!(
            x = found.center.0,
            y = found.center.1,
            diameter = found.diameter,
            angle_x,
            angle_y,
            "blob observed"
        );
        smoothed
    }

    /// Offer the latest observation to the recorder.
    pub fn record(&mut self, now: Instant) {
        let Some(latest) = self.latest else {
            return;
        };
        if let Err(e) = self.recorder.sample(now, &latest) {
            error!(error = %e, "failed to write recording row");
        }
    }

    pub async fn handle_event<P: CommandPublisher>(
        &mut self,
        event: ControlEvent,
        now: Instant,
        publisher: &P,
    ) -> Flow {
        match event {
            ControlEvent::TogglePlay => {
                if self.is_recording() {
                    debug!("cannot pause while recording");
                } else {
                    self.playing = !self.playing;
                    info!(playing = self.playing, "playback toggled");
                }
            }
            ControlEvent::EnterEdit => {
                self.editing = true;
                self.selected = None;
                self.exclusion.clear();
                info!("editing exclusion zone");
            }
            ControlEvent::LeaveEdit => {
                if self.editing {
                    self.editing = false;
                    self.selected = None;
                    self.internal.set_exclusion_points(self.exclusion.points());
                    self.persist();
                    info!(points = self.exclusion.points().len(), "exclusion zone set");
                }
            }
            ControlEvent::AddPoint(x, y) if self.editing => {
                if !self.exclusion.add_point(x, y) {
                    debug!(x, y, "point already present nearby");
                }
            }
            ControlEvent::Grab(x, y) if self.editing => {
                self.selected = self.exclusion.closest_point(x, y);
            }
            ControlEvent::Drag(x, y) if self.editing => {
                if let Some(index) = self.selected {
                    self.exclusion.move_point(index, x, y);
                }
            }
            ControlEvent::Release if self.editing => {
                self.selected = None;
            }
            ControlEvent::DeletePoint(x, y) if self.editing => {
                if self.exclusion.remove_near(x, y).is_some() {
                    self.selected = None;
                }
            }
            ControlEvent::AddPoint(..)
            | ControlEvent::Grab(..)
            | ControlEvent::Drag(..)
            | ControlEvent::Release
            | ControlEvent::DeletePoint(..) => {
                debug!(?event, "not in edit mode, ignoring");
            }
            ControlEvent::SetFixedPoint(x, y) => {
                self.mapper.set_fixed_point((x, y));
                self.internal.set_fixed_point((x, y));
                self.persist();
                info!(x, y, "fixed point set");
            }
            ControlEvent::ToggleRecording => {
                if self.playing {
                    self.toggle_recording(now, publisher).await;
                } else {
                    debug!("recording only toggles while playing");
                }
            }
            ControlEvent::Remote(cmd) => {
                if let Err(e) = self.identity.apply(&cmd, &mut self.recorder, now) {
                    error!(error = %e, verb = %cmd.verb, "failed to apply remote command");
                }
            }
            ControlEvent::Quit => {
                self.shutdown();
                return Flow::Quit;
            }
        }
        Flow::Continue
    }

    /// Tell the peers first, then apply locally.
    async fn toggle_recording<P: CommandPublisher>(&mut self, now: Instant, publisher: &P) {
        let verb = if self.is_recording() {
            SyncVerb::Stop
        } else {
            SyncVerb::Start
        };
        if let Err(e) = publisher.publish(self.identity.command(verb)).await {
            warn!(error = %e, "peers were not notified");
        }
        let result = match verb {
            SyncVerb::Start => self.recorder.request_start(now),
            SyncVerb::Stop => self.recorder.request_stop(),
        };
        if let Err(e) = result {
            error!(error = %e, %verb, "recording toggle failed");
        }
    }

    /// Close an open recording.
    pub fn shutdown(&mut self) {
        if let Err(e) = self.recorder.request_stop() {
            error!(error = %e, "failed to close recording");
        }
    }

    fn persist(&self) {
        if let Err(e) = self.internal.save(&self.internal_path) {
            warn!(error = %e, "failed to save internal config");
        }
    }
}
