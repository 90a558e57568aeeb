//! Camera and inference accelerator collaborators.
//!
//! The guard does not talk to sensor hardware itself. It consumes two
//! interfaces:
//! - `Camera`: runs the preview pipeline, invokes the pre-display callback
//!   with each frame buffer, and hands out per-frame metadata (blocking)
//! - `InferenceDevice`: extracts detection tensors from that metadata and
//!   maps tensor boxes into display pixels
//!
//! `stub://` URLs select a synthetic camera/accelerator pair that renders a
//! scripted crossing scene. Other sources are rejected in this build.

mod intrinsics;
pub mod synthetic;

use anyhow::{bail, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};

use crate::detect::{PixelBox, RawOutputs};

pub use intrinsics::{BboxOrder, NetworkIntrinsics};
pub use synthetic::{SyntheticAccelerator, SyntheticCamera};

/// Buffer count requested for the preview configuration.
pub const DEFAULT_BUFFER_COUNT: usize = 12;

/// Size of the image the render callback draws on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayContext {
    pub width: u32,
    pub height: u32,
}

impl DisplayContext {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Per-frame metadata token produced by the camera.
#[derive(Clone, Debug, Default)]
pub struct FrameMetadata {
    pub sequence: u64,
    /// Detection tensor attached by the accelerator, if it reported this frame.
    pub tensor: Option<RawOutputs>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreviewConfig {
    pub fps: u32,
    pub buffer_count: usize,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            fps: 25,
            buffer_count: DEFAULT_BUFFER_COUNT,
        }
    }
}

/// Callback invoked on each frame before it is shown. Mutates the frame in place.
pub type PreCallback = Box<dyn FnMut(&mut RgbImage) + Send + 'static>;

/// Preview camera pipeline.
pub trait Camera: Send {
    /// Start the pipeline. `callback` runs on the pipeline's own thread.
    fn start(&mut self, config: &PreviewConfig, callback: PreCallback) -> Result<()>;

    /// Block until the next frame's metadata is available.
    fn capture_metadata(&mut self) -> Result<FrameMetadata>;

    /// Dimensions of the frames handed to the callback.
    fn display(&self) -> DisplayContext;

    fn stop(&mut self) -> Result<()>;
}

/// On-sensor inference accelerator.
pub trait InferenceDevice: Send + Sync {
    /// Detection tensors for a frame, or `None` when the accelerator had
    /// nothing to report for it.
    fn get_outputs(&self, metadata: &FrameMetadata) -> Option<RawOutputs>;

    /// Map a model-space box into display pixel coordinates.
    fn convert_inference_coords(
        &self,
        coords: [f32; 4],
        metadata: &FrameMetadata,
        display: DisplayContext,
    ) -> PixelBox;

    /// Upload the network firmware. `progress` receives `(written, total)` bytes.
    fn load_network(&mut self, _model: &Path, _progress: &mut dyn FnMut(u64, u64)) -> Result<()> {
        Ok(())
    }
}

/// Camera source settings.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraSettings {
    pub url: String,
    pub width: u32,
    pub height: u32,
    /// Directory the preview image is written to, if any.
    pub preview_dir: Option<PathBuf>,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            url: "stub://crossing".to_string(),
            width: 640,
            height: 480,
            preview_dir: None,
        }
    }
}

pub fn is_supported_url(url: &str) -> bool {
    url.starts_with("stub://")
}

/// Open the camera and accelerator named by `settings.url`.
pub fn open(
    settings: &CameraSettings,
    intrinsics: NetworkIntrinsics,
) -> Result<(Box<dyn Camera>, Box<dyn InferenceDevice>)> {
    if !is_supported_url(&settings.url) {
        bail!(
            "camera source '{}' is not supported in this build (use stub://)",
            settings.url
        );
    }
    let camera = SyntheticCamera::new(settings.clone(), intrinsics.clone());
    let accelerator = SyntheticAccelerator::new(intrinsics);
    Ok((Box::new(camera), Box::new(accelerator)))
}
