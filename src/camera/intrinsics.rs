use anyhow::{anyhow, Result};
use serde::Deserialize;

use super::DisplayContext;
use crate::detect::PixelBox;

const DEFAULT_INPUT_WIDTH: u32 = 320;
const DEFAULT_INPUT_HEIGHT: u32 = 320;

/// Coordinate order of a box in the detection tensor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BboxOrder {
    /// `(y0, x0, y1, x1)`
    #[default]
    Yx,
    /// `(x0, y0, x1, y1)`
    Xy,
}

impl std::str::FromStr for BboxOrder {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "yx" => Ok(Self::Yx),
            "xy" => Ok(Self::Xy),
            other => Err(anyhow!("unknown bbox order '{}' (expected yx or xy)", other)),
        }
    }
}

/// Layout of the network's detection output.
#[derive(Clone, Debug, PartialEq)]
pub struct NetworkIntrinsics {
    pub bbox_order: BboxOrder,
    /// Boxes are already normalized to `[0, 1]`. When false they are in
    /// input tensor pixels.
    pub bbox_normalized: bool,
    pub input_width: u32,
    pub input_height: u32,
}

impl Default for NetworkIntrinsics {
    fn default() -> Self {
        Self {
            bbox_order: BboxOrder::Yx,
            bbox_normalized: true,
            input_width: DEFAULT_INPUT_WIDTH,
            input_height: DEFAULT_INPUT_HEIGHT,
        }
    }
}

impl NetworkIntrinsics {
    pub fn validate(&self) -> Result<()> {
        if self.input_width == 0 || self.input_height == 0 {
            return Err(anyhow!(
                "network input size must be non-zero, got {}x{}",
                self.input_width,
                self.input_height
            ));
        }
        Ok(())
    }

    /// Map a model-space box to display pixels.
    pub fn convert_inference_coords(&self, coords: [f32; 4], display: DisplayContext) -> PixelBox {
        let (mut x0, mut y0, mut x1, mut y1) = match self.bbox_order {
            BboxOrder::Yx => (coords[1], coords[0], coords[3], coords[2]),
            BboxOrder::Xy => (coords[0], coords[1], coords[2], coords[3]),
        };
        if !self.bbox_normalized {
            let iw = self.input_width.max(1) as f32;
            let ih = self.input_height.max(1) as f32;
            x0 /= iw;
            x1 /= iw;
            y0 /= ih;
            y1 /= ih;
        }

        let dw = display.width as f32;
        let dh = display.height as f32;
        PixelBox::new(
            (x0 * dw).round() as i32,
            (y0 * dh).round() as i32,
            ((x1 - x0) * dw).round() as i32,
            ((y1 - y0) * dh).round() as i32,
        )
    }
}
