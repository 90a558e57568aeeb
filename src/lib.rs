//! Zebra crossing guard
//!
//! Watches a zebra crossing through a camera with an on-sensor inference
//! accelerator and tells the driver whether to go.
//!
//! # Pipeline
//!
//! 1. The capture loop pulls per-frame metadata from the camera, and the
//!    `DetectionParser` turns the accelerator's tensors into detections. Frames
//!    without inference output reuse the previous result.
//! 2. The result is published into the shared `Session`.
//! 3. The camera's pre-display callback reads the session, asks the policy for
//!    the crossing state, draws boxes and a status banner, and plays the
//!    matching audio cue at most once per cooldown window.
//!
//! # Module Structure
//!
//! - `labels`: class label file loading and caching
//! - `detect`: raw tensor outputs, detections, and the parser
//! - `policy`: crossing decision rules and audio cue locations
//! - `audio`: external player invocation and the cooldown gate
//! - `overlay`: box and banner drawing
//! - `camera`: camera/accelerator traits and the synthetic `stub://` source
//! - `session`: shared state between the capture loop and render callback
//! - `config`, `cli`, `ui`: startup configuration and progress output

pub mod audio;
pub mod camera;
pub mod cli;
pub mod config;
pub mod detect;
pub mod labels;
pub mod overlay;
pub mod policy;
pub mod session;
pub mod ui;

pub use audio::{AudioNotifier, AudioPlayer, CommandPlayer, CooldownGate};
pub use camera::{
    Camera, CameraSettings, DisplayContext, FrameMetadata, InferenceDevice, NetworkIntrinsics,
    PreCallback, PreviewConfig,
};
pub use cli::Args;
pub use config::GuardConfig;
pub use detect::{Detection, DetectionParser, PixelBox, RawOutputs};
pub use labels::{LabelStore, Labels};
pub use overlay::OverlayRenderer;
pub use policy::{decide, AudioCues, Cue, UiDecision};
pub use session::{FrameReport, Session};
