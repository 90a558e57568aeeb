//! Shared state between the capture loop and the render callback.
//!
//! The capture loop publishes each parse result into the session; the
//! camera's pre-display callback reads the latest result, decides the
//! crossing state, draws the overlay and plays the cue. The two sides may run
//! on different threads, so the detection slot sits behind a mutex and the
//! cue cooldown is checked and updated atomically inside `AudioNotifier`.

use anyhow::Result;
use image::RgbImage;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::audio::AudioNotifier;
use crate::camera::{Camera, InferenceDevice, PreCallback};
use crate::detect::{Detection, DetectionParser};
use crate::labels::Labels;
use crate::overlay::OverlayRenderer;
use crate::policy::{self, AudioCues, UiDecision};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Outcome of rendering one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameReport {
    pub decision: UiDecision,
    pub boxes_drawn: usize,
    pub cue_played: bool,
}

pub struct Session {
    labels: Arc<Labels>,
    cues: AudioCues,
    renderer: OverlayRenderer,
    notifier: AudioNotifier,
    detections: Mutex<Arc<Vec<Detection>>>,
    last_decision: Mutex<Option<UiDecision>>,
}

impl Session {
    pub fn new(
        labels: Arc<Labels>,
        cues: AudioCues,
        renderer: OverlayRenderer,
        notifier: AudioNotifier,
    ) -> Self {
        Self {
            labels,
            cues,
            renderer,
            notifier,
            detections: Mutex::new(Arc::new(Vec::new())),
            last_decision: Mutex::new(None),
        }
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    /// Replace the cached detections.
    pub fn publish(&self, detections: Arc<Vec<Detection>>) {
        *self
            .detections
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = detections;
    }

    pub fn current_detections(&self) -> Arc<Vec<Detection>> {
        Arc::clone(
            &self
                .detections
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    /// Crossing state for the cached detections.
    pub fn current_decision(&self) -> UiDecision {
        let detections = self.current_detections();
        policy::decide(&policy::detected_labels(&detections, &self.labels))
    }

    /// Decide, notify and draw for one frame.
    ///
    /// The cue is requested before drawing so a drawing failure cannot
    /// silence it.
    pub fn render_frame(&self, frame: &mut RgbImage, now: Instant) -> FrameReport {
        let detections = self.current_detections();
        let decision = policy::decide(&policy::detected_labels(&detections, &self.labels));
        self.log_transition(decision);

        let cue_played = self
            .notifier
            .notify_if_due(self.cues.path(decision.cue), now);

        self.renderer.render(
            frame,
            &detections,
            decision.show_boxes,
            decision.message,
            decision.color,
        );

        FrameReport {
            decision,
            boxes_drawn: if decision.show_boxes {
                detections.len()
            } else {
                0
            },
            cue_played,
        }
    }

    /// Pre-display callback body. A panic while drawing is contained to the
    /// current frame and logged.
    pub fn on_frame(&self, frame: &mut RgbImage) -> Option<FrameReport> {
        match catch_unwind(AssertUnwindSafe(|| self.render_frame(frame, Instant::now()))) {
            Ok(report) => Some(report),
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                log::warn!("overlay skipped for frame: {}", reason);
                None
            }
        }
    }

    /// Callback for `Camera::start` bound to this session.
    pub fn pre_callback(self: &Arc<Self>) -> PreCallback {
        let session = Arc::clone(self);
        Box::new(move |frame: &mut RgbImage| {
            session.on_frame(frame);
        })
    }

    /// Wait for one frame's metadata, parse it and publish the result.
    pub fn capture_once(
        &self,
        camera: &mut dyn Camera,
        device: &dyn InferenceDevice,
        parser: &mut DetectionParser,
    ) -> Result<Arc<Vec<Detection>>> {
        let metadata = camera.capture_metadata()?;
        let detections = parser.parse(&metadata, device, camera.display());
        self.publish(Arc::clone(&detections));
        Ok(detections)
    }

    /// Capture loop. Runs until `shutdown` is set or the camera fails.
    /// Returns the number of frames processed.
    pub fn run(
        &self,
        camera: &mut dyn Camera,
        device: &dyn InferenceDevice,
        parser: &mut DetectionParser,
        shutdown: &AtomicBool,
    ) -> Result<u64> {
        let mut frames = 0u64;
        let mut last_health_log = Instant::now();

        while !shutdown.load(Ordering::Relaxed) {
            let detections = self.capture_once(camera, device, parser)?;
            frames += 1;

            if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
                log::info!(
                    "frames={} detections={} state=\"{}\"",
                    frames,
                    detections.len(),
                    self.current_decision().message
                );
                last_health_log = Instant::now();
            }
        }
        Ok(frames)
    }

    fn log_transition(&self, decision: UiDecision) {
        let mut last = self
            .last_decision
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *last != Some(decision) {
            log::info!("crossing state: {} (cue {:?})", decision.message, decision.cue);
            *last = Some(decision);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioPlayer;
    use crate::detect::PixelBox;
    use crate::overlay::BOX_COLOR;
    use crate::policy::{Cue, GO, IDLE, STOP};
    use std::path::{Path, PathBuf};

    #[derive(Clone, Default)]
    struct RecordingPlayer {
        played: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl AudioPlayer for RecordingPlayer {
        fn play(&self, path: &Path) -> Result<()> {
            self.played.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }
    }

    fn session(player: RecordingPlayer) -> Session {
        Session::new(
            Arc::new(Labels::new(["pedestrian_on_zebra", "pedestrian_off_zebra", "car"])),
            AudioCues::default(),
            OverlayRenderer::without_text(),
            AudioNotifier::new(player, Duration::from_secs(3)),
        )
    }

    fn detection(category: usize) -> Detection {
        Detection::new(category, 0.9, PixelBox::new(10, 70, 20, 20))
    }

    #[test]
    fn empty_session_is_idle() {
        let session = session(RecordingPlayer::default());
        assert_eq!(session.current_decision(), IDLE);
    }

    #[test]
    fn published_detections_drive_the_decision() {
        let session = session(RecordingPlayer::default());
        session.publish(Arc::new(vec![detection(1)]));
        assert_eq!(session.current_decision(), GO);
        session.publish(Arc::new(vec![detection(1), detection(0)]));
        assert_eq!(session.current_decision(), STOP);
    }

    #[test]
    fn render_frame_plays_cue_once_per_cooldown() {
        let player = RecordingPlayer::default();
        let session = session(player.clone());
        session.publish(Arc::new(vec![detection(0)]));
        let mut frame = RgbImage::new(64, 100);
        let base = Instant::now();

        let first = session.render_frame(&mut frame, base);
        let second = session.render_frame(&mut frame, base + Duration::from_secs(1));

        assert!(first.cue_played);
        assert!(!second.cue_played);
        assert_eq!(first.decision.cue, Cue::Stop);
        assert_eq!(first.boxes_drawn, 1);
        assert_eq!(
            *player.played.lock().unwrap(),
            vec![AudioCues::default().stop]
        );
    }

    #[test]
    fn idle_frames_draw_no_boxes() {
        let session = session(RecordingPlayer::default());
        session.publish(Arc::new(vec![detection(2)]));
        let mut frame = RgbImage::new(64, 100);
        let report = session.render_frame(&mut frame, Instant::now());
        assert_eq!(report.decision, IDLE);
        assert_eq!(report.boxes_drawn, 0);
        assert_eq!(*frame.get_pixel(10, 70), image::Rgb([0, 0, 0]));
    }

    #[test]
    fn unknown_class_ids_do_not_break_rendering() {
        let session = session(RecordingPlayer::default());
        session.publish(Arc::new(vec![detection(42), detection(1)]));
        let mut frame = RgbImage::new(64, 100);
        let report = session.on_frame(&mut frame).expect("frame rendered");
        assert_eq!(report.decision, GO);
    }

    /// Panics on its first play request only.
    #[derive(Clone, Default)]
    struct FlakyPlayer {
        calls: Arc<Mutex<usize>>,
    }

    impl AudioPlayer for FlakyPlayer {
        fn play(&self, _path: &Path) -> Result<()> {
            let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
            *calls += 1;
            if *calls == 1 {
                drop(calls);
                panic!("player crashed");
            }
            Ok(())
        }
    }

    #[test]
    fn failed_frame_is_skipped_and_next_frame_renders() {
        let player = FlakyPlayer::default();
        let session = Session::new(
            Arc::new(Labels::new(["pedestrian_on_zebra", "pedestrian_off_zebra"])),
            AudioCues::default(),
            OverlayRenderer::without_text(),
            AudioNotifier::new(player.clone(), Duration::ZERO),
        );
        session.publish(Arc::new(vec![detection(0)]));

        let mut failed = RgbImage::new(64, 100);
        assert!(session.on_frame(&mut failed).is_none());

        let mut frame = RgbImage::new(64, 100);
        let report = session.on_frame(&mut frame).expect("frame rendered");
        assert_eq!(report.decision, STOP);
        assert!(report.cue_played);
        assert_eq!(*frame.get_pixel(0, 0), image::Rgb([217, 0, 0]));
        assert_eq!(*player.calls.lock().unwrap(), 2);
    }

    #[test]
    fn oversized_box_still_stops_traffic() {
        let player = RecordingPlayer::default();
        let session = session(player.clone());
        session.publish(Arc::new(vec![Detection::new(
            0,
            0.9,
            PixelBox::new(0, 0, i32::MAX, i32::MAX),
        )]));
        let mut frame = RgbImage::new(64, 100);

        let report = session.on_frame(&mut frame).expect("frame rendered");
        assert_eq!(report.decision, STOP);
        assert!(report.cue_played);
        assert_eq!(*frame.get_pixel(0, 99), BOX_COLOR);
        assert_eq!(*frame.get_pixel(10, 10), image::Rgb([217, 0, 0]));
        assert_eq!(
            *player.played.lock().unwrap(),
            vec![AudioCues::default().stop]
        );
    }
}
