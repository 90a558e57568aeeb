use anyhow::{anyhow, Result};

/// Raw detection tensors for one frame, as reported by the accelerator.
///
/// The three arrays are parallel: entry `i` of each describes candidate `i`.
/// Boxes are in model space; their layout is described by the network
/// intrinsics of the device that produced them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawOutputs {
    pub boxes: Vec<[f32; 4]>,
    pub scores: Vec<f32>,
    pub classes: Vec<f32>,
}

/// A single candidate before thresholding.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    pub coords: [f32; 4],
    pub score: f32,
    pub class: f32,
}

impl RawOutputs {
    pub fn new(boxes: Vec<[f32; 4]>, scores: Vec<f32>, classes: Vec<f32>) -> Self {
        Self {
            boxes,
            scores,
            classes,
        }
    }

    /// Build outputs from a flat `N x 4` box tensor.
    pub fn from_flat(boxes: &[f32], scores: Vec<f32>, classes: Vec<f32>) -> Result<Self> {
        if boxes.len() % 4 != 0 {
            return Err(anyhow!(
                "box tensor length {} is not a multiple of 4",
                boxes.len()
            ));
        }
        let boxes = boxes
            .chunks_exact(4)
            .map(|chunk| [chunk[0], chunk[1], chunk[2], chunk[3]])
            .collect();
        Ok(Self::new(boxes, scores, classes))
    }

    /// Number of complete candidates (shortest of the three arrays).
    pub fn len(&self) -> usize {
        self.boxes
            .len()
            .min(self.scores.len())
            .min(self.classes.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_ragged(&self) -> bool {
        self.boxes.len() != self.scores.len() || self.scores.len() != self.classes.len()
    }

    /// Candidates in tensor order.
    pub fn candidates(&self) -> impl Iterator<Item = Candidate> + '_ {
        self.boxes
            .iter()
            .zip(&self.scores)
            .zip(&self.classes)
            .map(|((coords, score), class)| Candidate {
                coords: *coords,
                score: *score,
                class: *class,
            })
    }
}

impl Candidate {
    /// Integer class id, or `None` for negative or non-finite ids.
    pub fn class_id(&self) -> Option<usize> {
        if self.class.is_finite() && self.class >= 0.0 {
            Some(self.class as usize)
        } else {
            None
        }
    }
}
