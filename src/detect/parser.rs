use anyhow::{anyhow, Result};
use std::sync::Arc;

use crate::camera::{DisplayContext, FrameMetadata, InferenceDevice};
use crate::detect::result::Detection;

/// Default confidence threshold for keeping a candidate.
pub const DEFAULT_THRESHOLD: f32 = 0.55;

/// Turns per-frame accelerator output into detections.
///
/// The parser owns the most recent result. Frames for which the accelerator
/// reports nothing reuse that result unchanged, so the overlay does not
/// flicker between inference updates.
pub struct DetectionParser {
    threshold: f32,
    last_results: Arc<Vec<Detection>>,
}

impl DetectionParser {
    pub fn new(threshold: f32) -> Result<Self> {
        validate_threshold(threshold)?;
        Ok(Self {
            threshold,
            last_results: Arc::new(Vec::new()),
        })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn last_results(&self) -> Arc<Vec<Detection>> {
        Arc::clone(&self.last_results)
    }

    /// Parse one frame's metadata.
    ///
    /// Candidates are kept only when their score is strictly above the
    /// threshold. Output order follows tensor order.
    pub fn parse(
        &mut self,
        metadata: &FrameMetadata,
        device: &dyn InferenceDevice,
        display: DisplayContext,
    ) -> Arc<Vec<Detection>> {
        let Some(outputs) = device.get_outputs(metadata) else {
            log::trace!(
                "frame {}: no inference output, reusing {} detections",
                metadata.sequence,
                self.last_results.len()
            );
            return Arc::clone(&self.last_results);
        };

        if outputs.is_ragged() {
            log::warn!(
                "frame {}: ragged output tensors (boxes={}, scores={}, classes={}), using first {}",
                metadata.sequence,
                outputs.boxes.len(),
                outputs.scores.len(),
                outputs.classes.len(),
                outputs.len()
            );
        }

        let detections: Vec<Detection> = outputs
            .candidates()
            .filter(|candidate| candidate.score > self.threshold)
            .filter_map(|candidate| {
                let Some(category) = candidate.class_id() else {
                    log::debug!(
                        "frame {}: dropping candidate with invalid class {}",
                        metadata.sequence,
                        candidate.class
                    );
                    return None;
                };
                let bbox = device.convert_inference_coords(candidate.coords, metadata, display);
                Some(Detection::new(category, candidate.score, bbox))
            })
            .collect();

        self.last_results = Arc::new(detections);
        Arc::clone(&self.last_results)
    }
}

fn validate_threshold(threshold: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(anyhow!(
            "threshold must be within [0, 1], got {}",
            threshold
        ));
    }
    Ok(())
}
