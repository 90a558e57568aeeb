//! Crossing decision policy.
//!
//! Maps the set of labels detected in a frame to what the driver is shown
//! and told. Rules are evaluated in order and the first match wins; the
//! stop rule comes first so a pedestrian on the crossing always dominates.

use image::Rgb;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::detect::Detection;
use crate::labels::Labels;

pub const LABEL_ON_ZEBRA: &str = "pedestrian_on_zebra";
pub const LABEL_OFF_ZEBRA: &str = "pedestrian_off_zebra";

pub const MESSAGE_STOP: &str = "Please don't go, Pedestrian crossing zebra";
pub const MESSAGE_GO: &str = "Pedestrian waiting on zebra, You can Go";
pub const MESSAGE_IDLE: &str = "No pedestrian, You can Go";

pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// Audio cue identifying a crossing state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Cue {
    Stop,
    Go,
    Idle,
}

/// What to show and play for the current frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UiDecision {
    pub message: &'static str,
    pub color: Rgb<u8>,
    pub show_boxes: bool,
    pub cue: Cue,
}

pub const STOP: UiDecision = UiDecision {
    message: MESSAGE_STOP,
    color: RED,
    show_boxes: true,
    cue: Cue::Stop,
};

pub const GO: UiDecision = UiDecision {
    message: MESSAGE_GO,
    color: GREEN,
    show_boxes: true,
    cue: Cue::Go,
};

pub const IDLE: UiDecision = UiDecision {
    message: MESSAGE_IDLE,
    color: BLACK,
    show_boxes: false,
    cue: Cue::Idle,
};

/// Ordered rules: the first label present selects the decision.
const RULES: [(&str, UiDecision); 2] = [(LABEL_ON_ZEBRA, STOP), (LABEL_OFF_ZEBRA, GO)];

/// Decide the UI state for a set of detected label names.
pub fn decide<S: AsRef<str> + Ord>(detected: &BTreeSet<S>) -> UiDecision {
    RULES
        .iter()
        .find(|(label, _)| detected.iter().any(|name| name.as_ref() == *label))
        .map(|(_, decision)| *decision)
        .unwrap_or(IDLE)
}

/// Distinct label names present in a detection list.
///
/// Detections whose class id falls outside the label set are skipped. This
/// runs for every rendered frame, so the skip is logged at debug level.
pub fn detected_labels<'a>(detections: &[Detection], labels: &'a Labels) -> BTreeSet<&'a str> {
    detections
        .iter()
        .filter_map(|detection| {
            let name = labels.get(detection.category);
            if name.is_none() {
                log::debug!(
                    "class id {} is outside the label set ({} labels)",
                    detection.category,
                    labels.len()
                );
            }
            name
        })
        .collect()
}

const DEFAULT_STOP_CUE: &str = "/home/pi/audio/stop.wav";
const DEFAULT_GO_CUE: &str = "/home/pi/audio/go.wav";
const DEFAULT_IDLE_CUE: &str = "/home/pi/audio/idle.wav";

/// Filesystem locations of the cue recordings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioCues {
    pub stop: PathBuf,
    pub go: PathBuf,
    pub idle: PathBuf,
}

impl Default for AudioCues {
    fn default() -> Self {
        Self {
            stop: PathBuf::from(DEFAULT_STOP_CUE),
            go: PathBuf::from(DEFAULT_GO_CUE),
            idle: PathBuf::from(DEFAULT_IDLE_CUE),
        }
    }
}

impl AudioCues {
    pub fn path(&self, cue: Cue) -> &Path {
        match cue {
            Cue::Stop => &self.stop,
            Cue::Go => &self.go,
            Cue::Idle => &self.idle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::PixelBox;

    fn set(names: &[&'static str]) -> BTreeSet<&'static str> {
        names.iter().copied().collect()
    }

    #[test]
    fn on_zebra_dominates_everything() {
        assert_eq!(decide(&set(&[LABEL_ON_ZEBRA])), STOP);
        assert_eq!(decide(&set(&[LABEL_ON_ZEBRA, LABEL_OFF_ZEBRA])), STOP);
        assert_eq!(decide(&set(&["car", LABEL_OFF_ZEBRA, LABEL_ON_ZEBRA])), STOP);
    }

    #[test]
    fn off_zebra_without_on_zebra_is_go() {
        assert_eq!(decide(&set(&[LABEL_OFF_ZEBRA])), GO);
        assert_eq!(decide(&set(&[LABEL_OFF_ZEBRA, "car"])), GO);
    }

    #[test]
    fn anything_else_is_idle_without_boxes() {
        let decision = decide(&set(&[]));
        assert_eq!(decision, IDLE);
        assert!(!decision.show_boxes);
        assert_eq!(decide(&set(&["car", "bicycle"])), IDLE);
    }

    #[test]
    fn label_match_is_case_sensitive() {
        assert_eq!(decide(&set(&["Pedestrian_On_Zebra"])), IDLE);
    }

    #[test]
    fn accepts_owned_label_sets() {
        let owned: BTreeSet<String> = [LABEL_OFF_ZEBRA.to_string()].into_iter().collect();
        assert_eq!(decide(&owned), GO);
    }

    #[test]
    fn detected_labels_skips_unknown_classes() {
        let labels = Labels::new([LABEL_ON_ZEBRA, LABEL_OFF_ZEBRA, "car"]);
        let detections = vec![
            Detection::new(2, 0.9, PixelBox::default()),
            Detection::new(7, 0.9, PixelBox::default()),
            Detection::new(2, 0.8, PixelBox::default()),
        ];
        assert_eq!(detected_labels(&detections, &labels), set(&["car"]));
    }

    #[test]
    fn cues_resolve_to_their_paths() {
        let cues = AudioCues::default();
        assert_eq!(cues.path(Cue::Stop), Path::new(DEFAULT_STOP_CUE));
        assert_eq!(cues.path(Cue::Go), Path::new(DEFAULT_GO_CUE));
        assert_eq!(cues.path(Cue::Idle), Path::new(DEFAULT_IDLE_CUE));
    }
}
