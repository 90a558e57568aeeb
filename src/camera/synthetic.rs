//! Synthetic camera and accelerator (`stub://` sources).
//!
//! The synthetic camera renders a road with a zebra crossing and walks a
//! scripted scene through four phases, a few seconds each:
//! clear road, pedestrian waiting at the kerb, pedestrian crossing, and both.
//! Every fourth frame carries no inference output, the way an accelerator
//! running slower than the sensor leaves gaps in the metadata stream.
//!
//! Class ids follow the label order `pedestrian_on_zebra`,
//! `pedestrian_off_zebra`, `car`.

use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::{
    BboxOrder, Camera, CameraSettings, DisplayContext, FrameMetadata, InferenceDevice,
    NetworkIntrinsics, PreCallback, PreviewConfig,
};
use crate::detect::{PixelBox, RawOutputs};

const CLASS_ON_ZEBRA: f32 = 0.0;
const CLASS_OFF_ZEBRA: f32 = 1.0;
const CLASS_CAR: f32 = 2.0;

const PHASE_SECS: u32 = 3;
const UNREPORTED_EVERY: u64 = 4;
const DEFAULT_SEED: u64 = 0x7a65_6272;
const FIRMWARE_CHUNK: usize = 64 * 1024;

const ROAD: Rgb<u8> = Rgb([70, 70, 75]);
const STRIPE: Rgb<u8> = Rgb([235, 235, 235]);
const PEDESTRIAN: Rgb<u8> = Rgb([40, 60, 140]);
const CAR: Rgb<u8> = Rgb([150, 30, 30]);

// ----------------------------------------------------------------------------
// Scene script
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Clear,
    Waiting,
    Crossing,
    Both,
}

const PHASES: [Phase; 4] = [Phase::Clear, Phase::Waiting, Phase::Crossing, Phase::Both];

/// One object in the scene. Bounds are normalized `(x0, y0, x1, y1)`.
#[derive(Clone, Copy, Debug)]
struct Actor {
    class: f32,
    score: f32,
    bounds: [f32; 4],
}

struct Scenario {
    rng: StdRng,
    phase_frames: u64,
}

impl Scenario {
    fn new(seed: u64, fps: u32) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            phase_frames: u64::from(fps.max(1) * PHASE_SECS),
        }
    }

    fn phase(&self, sequence: u64) -> Phase {
        PHASES[((sequence / self.phase_frames) % PHASES.len() as u64) as usize]
    }

    fn actors(&mut self, sequence: u64) -> Vec<Actor> {
        let progress = (sequence % self.phase_frames) as f32 / self.phase_frames as f32;
        let mut actors = vec![self.car(progress)];
        match self.phase(sequence) {
            Phase::Clear => {}
            Phase::Waiting => actors.push(self.waiting()),
            Phase::Crossing => actors.push(self.crossing(progress)),
            Phase::Both => {
                actors.push(self.waiting());
                actors.push(self.crossing(progress));
            }
        }
        // Low-confidence ghost the threshold is expected to drop.
        let ghost_score = self.rng.gen_range(0.1..0.45);
        actors.push(Actor {
            class: CLASS_ON_ZEBRA,
            score: ghost_score,
            bounds: [0.45, 0.1, 0.5, 0.2],
        });
        actors
    }

    fn car(&mut self, progress: f32) -> Actor {
        let x0 = 0.6 + 0.2 * progress;
        Actor {
            class: CLASS_CAR,
            score: self.rng.gen_range(0.6..0.95),
            bounds: [x0, 0.25, x0 + 0.18, 0.45],
        }
    }

    fn waiting(&mut self) -> Actor {
        let sway = self.rng.gen_range(-0.005..0.005);
        Actor {
            class: CLASS_OFF_ZEBRA,
            score: self.rng.gen_range(0.6..0.97),
            bounds: [0.04 + sway, 0.38, 0.12 + sway, 0.62],
        }
    }

    fn crossing(&mut self, progress: f32) -> Actor {
        let x0 = 0.15 + 0.65 * progress;
        Actor {
            class: CLASS_ON_ZEBRA,
            score: self.rng.gen_range(0.6..0.97),
            bounds: [x0, 0.5, x0 + 0.08, 0.78],
        }
    }
}

fn encode_bounds(intrinsics: &NetworkIntrinsics, bounds: [f32; 4]) -> [f32; 4] {
    let [mut x0, mut y0, mut x1, mut y1] = bounds;
    if !intrinsics.bbox_normalized {
        let iw = intrinsics.input_width as f32;
        let ih = intrinsics.input_height as f32;
        x0 *= iw;
        x1 *= iw;
        y0 *= ih;
        y1 *= ih;
    }
    match intrinsics.bbox_order {
        BboxOrder::Yx => [y0, x0, y1, x1],
        BboxOrder::Xy => [x0, y0, x1, y1],
    }
}

fn tensor_for(intrinsics: &NetworkIntrinsics, actors: &[Actor]) -> RawOutputs {
    RawOutputs::new(
        actors
            .iter()
            .map(|actor| encode_bounds(intrinsics, actor.bounds))
            .collect(),
        actors.iter().map(|actor| actor.score).collect(),
        actors.iter().map(|actor| actor.class).collect(),
    )
}

fn render_scene(width: u32, height: u32, actors: &[Actor]) -> RgbImage {
    let mut image = RgbImage::from_pixel(width, height, ROAD);

    let band_top = (height as f32 * 0.5) as i32;
    let band_height = ((height as f32 * 0.3) as u32).max(1);
    let stripe_width = (width / 16).max(1);
    let mut x = 0u32;
    while x < width {
        draw_filled_rect_mut(
            &mut image,
            Rect::at(x as i32, band_top).of_size(stripe_width, band_height),
            STRIPE,
        );
        x += stripe_width * 2;
    }

    for actor in actors.iter().filter(|actor| actor.score >= 0.5) {
        let [x0, y0, x1, y1] = actor.bounds;
        let w = ((x1 - x0) * width as f32) as u32;
        let h = ((y1 - y0) * height as f32) as u32;
        if w == 0 || h == 0 {
            continue;
        }
        let color = if actor.class == CLASS_CAR { CAR } else { PEDESTRIAN };
        draw_filled_rect_mut(
            &mut image,
            Rect::at((x0 * width as f32) as i32, (y0 * height as f32) as i32).of_size(w, h),
            color,
        );
    }
    image
}

// ----------------------------------------------------------------------------
// Camera
// ----------------------------------------------------------------------------

struct Pipeline {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
    metadata: Receiver<FrameMetadata>,
}

/// Synthetic preview camera.
///
/// The pre-display callback runs on a dedicated `camera-pipeline` thread,
/// concurrently with whoever calls `capture_metadata`.
pub struct SyntheticCamera {
    settings: CameraSettings,
    intrinsics: NetworkIntrinsics,
    seed: u64,
    pipeline: Option<Pipeline>,
}

impl SyntheticCamera {
    pub fn new(settings: CameraSettings, intrinsics: NetworkIntrinsics) -> Self {
        Self {
            settings,
            intrinsics,
            seed: DEFAULT_SEED,
            pipeline: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn is_running(&self) -> bool {
        self.pipeline.is_some()
    }
}

impl Camera for SyntheticCamera {
    fn start(&mut self, config: &PreviewConfig, mut callback: PreCallback) -> Result<()> {
        if self.pipeline.is_some() {
            return Err(anyhow!("camera already started"));
        }
        if self.settings.width == 0 || self.settings.height == 0 {
            return Err(anyhow!("camera frame size must be non-zero"));
        }

        let fps = config.fps.max(1);
        let (tx, rx) = mpsc::sync_channel(config.buffer_count.max(1));
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);
        let mut scenario = Scenario::new(self.seed, fps);
        let intrinsics = self.intrinsics.clone();
        let (width, height) = (self.settings.width, self.settings.height);
        let preview_path = self
            .settings
            .preview_dir
            .as_ref()
            .map(|dir| dir.join("preview.png"));
        let frame_interval = Duration::from_secs_f64(1.0 / f64::from(fps));

        let handle = std::thread::Builder::new()
            .name("camera-pipeline".to_string())
            .spawn(move || {
                let mut sequence = 0u64;
                let mut dropped = 0u64;
                while thread_running.load(Ordering::Relaxed) {
                    let started = Instant::now();
                    sequence += 1;

                    let actors = scenario.actors(sequence);
                    let mut frame = render_scene(width, height, &actors);
                    callback(&mut frame);

                    if sequence % u64::from(fps) == 0 {
                        if let Some(path) = &preview_path {
                            if let Err(e) = frame.save(path) {
                                log::warn!("failed to write preview {}: {}", path.display(), e);
                            }
                        }
                    }

                    let tensor = (sequence % UNREPORTED_EVERY != 0)
                        .then(|| tensor_for(&intrinsics, &actors));
                    match tx.try_send(FrameMetadata { sequence, tensor }) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            dropped += 1;
                            log::trace!("metadata buffer full, dropped frame {}", sequence);
                        }
                        Err(TrySendError::Disconnected(_)) => break,
                    }

                    std::thread::sleep(frame_interval.saturating_sub(started.elapsed()));
                }
                log::debug!(
                    "camera pipeline stopped after {} frames ({} metadata dropped)",
                    sequence,
                    dropped
                );
            })
            .context("failed to spawn camera pipeline thread")?;

        log::info!(
            "SyntheticCamera: started {} at {}x{} {} fps",
            self.settings.url,
            width,
            height,
            fps
        );
        self.pipeline = Some(Pipeline {
            running,
            handle,
            metadata: rx,
        });
        Ok(())
    }

    fn capture_metadata(&mut self) -> Result<FrameMetadata> {
        let pipeline = self
            .pipeline
            .as_ref()
            .ok_or_else(|| anyhow!("camera not started"))?;
        pipeline
            .metadata
            .recv()
            .map_err(|_| anyhow!("camera pipeline stopped"))
    }

    fn display(&self) -> DisplayContext {
        DisplayContext::new(self.settings.width, self.settings.height)
    }

    fn stop(&mut self) -> Result<()> {
        let Some(pipeline) = self.pipeline.take() else {
            return Ok(());
        };
        pipeline.running.store(false, Ordering::Relaxed);
        drop(pipeline.metadata);
        pipeline
            .handle
            .join()
            .map_err(|_| anyhow!("camera pipeline thread panicked"))?;
        log::info!("SyntheticCamera: stopped {}", self.settings.url);
        Ok(())
    }
}

impl Drop for SyntheticCamera {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("camera shutdown failed: {}", e);
        }
    }
}

// ----------------------------------------------------------------------------
// Accelerator
// ----------------------------------------------------------------------------

/// Network firmware accepted by the accelerator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadedNetwork {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Synthetic accelerator. Reads tensors attached to the metadata by
/// `SyntheticCamera`.
pub struct SyntheticAccelerator {
    intrinsics: NetworkIntrinsics,
    network: Option<LoadedNetwork>,
}

impl SyntheticAccelerator {
    pub fn new(intrinsics: NetworkIntrinsics) -> Self {
        Self {
            intrinsics,
            network: None,
        }
    }

    pub fn network(&self) -> Option<&LoadedNetwork> {
        self.network.as_ref()
    }
}

impl InferenceDevice for SyntheticAccelerator {
    fn get_outputs(&self, metadata: &FrameMetadata) -> Option<RawOutputs> {
        metadata.tensor.clone()
    }

    fn convert_inference_coords(
        &self,
        coords: [f32; 4],
        _metadata: &FrameMetadata,
        display: DisplayContext,
    ) -> PixelBox {
        self.intrinsics.convert_inference_coords(coords, display)
    }

    fn load_network(&mut self, model: &Path, progress: &mut dyn FnMut(u64, u64)) -> Result<()> {
        let mut file = File::open(model)
            .with_context(|| format!("failed to open network model {}", model.display()))?;
        let total = file
            .metadata()
            .with_context(|| format!("failed to stat network model {}", model.display()))?
            .len();

        let mut buf = vec![0u8; FIRMWARE_CHUNK];
        let mut written = 0u64;
        progress(0, total);
        loop {
            let n = file
                .read(&mut buf)
                .with_context(|| format!("failed to read network model {}", model.display()))?;
            if n == 0 {
                break;
            }
            written += n as u64;
            progress(written, total);
        }

        log::info!(
            "network firmware {} uploaded ({} bytes)",
            model.display(),
            written
        );
        self.network = Some(LoadedNetwork {
            path: model.to_path_buf(),
            size_bytes: written,
        });
        Ok(())
    }
}
