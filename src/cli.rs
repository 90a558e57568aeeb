use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;

use crate::detect::DEFAULT_THRESHOLD;

/// Pedestrian detection at a zebra crossing with preview overlay and audio cues.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Args {
    /// Path to the network firmware uploaded to the accelerator.
    #[arg(long)]
    pub model: PathBuf,
    /// Path to the label file (one class name per line).
    #[arg(long)]
    pub labels: PathBuf,
    /// Detection confidence threshold; scores must be strictly above it.
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    pub threshold: f32,
    /// Preview frame rate.
    #[arg(long, default_value_t = 25)]
    pub fps: u32,
}

impl Args {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(anyhow!(
                "--threshold must be within [0, 1], got {}",
                self.threshold
            ));
        }
        if self.fps == 0 {
            return Err(anyhow!("--fps must be >= 1"));
        }
        Ok(())
    }
}
