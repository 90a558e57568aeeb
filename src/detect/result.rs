/// Axis-aligned box in display pixel coordinates.
///
/// `(x, y)` is the top-left corner; the bottom-right corner is
/// `(x + width, y + height)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PixelBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl PixelBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }
}

/// One recognized object in a frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    /// Class id, an index into the label set.
    pub category: usize,
    /// Model score in `[0, 1]`.
    pub confidence: f32,
    pub bbox: PixelBox,
}

impl Detection {
    pub fn new(category: usize, confidence: f32, bbox: PixelBox) -> Self {
        Self {
            category,
            confidence,
            bbox,
        }
    }
}
