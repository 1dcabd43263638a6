//! Selection rectangles in logical (CSS) pixels.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A rectangle as reported by the overlay, in logical pixels relative to the
/// top-left corner of the visible surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// A rectangle in physical pixels after device-pixel-ratio scaling.
///
/// Offsets may be negative when the selection was dragged past the edge of
/// the surface; sizes are always at least one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysicalRect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// True when the rectangle cannot produce any pixels.
    pub fn is_empty(&self) -> bool {
        let finite = [self.left, self.top, self.width, self.height]
            .iter()
            .all(|v| v.is_finite());
        !finite || self.width <= 0.0 || self.height <= 0.0
    }

    /// Multiply every field by `dpr` and round to whole physical pixels.
    ///
    /// Returns `None` if the scaled rectangle would be empty or `dpr` is not a
    /// positive finite number.
    pub fn to_physical(&self, dpr: f64) -> Option<PhysicalRect> {
        if self.is_empty() || !dpr.is_finite() || dpr <= 0.0 {
            return None;
        }

        let width = (self.width * dpr).round();
        let height = (self.height * dpr).round();
        if width < 1.0 || height < 1.0 || width > u32::MAX as f64 || height > u32::MAX as f64 {
            return None;
        }

        Some(PhysicalRect {
            x: (self.left * dpr).round() as i64,
            y: (self.top * dpr).round() as i64,
            width: width as u32,
            height: height as u32,
        })
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}+{}+{}",
            self.width, self.height, self.left, self.top
        )
    }
}

/// Parses `left,top,width,height`.
impl FromStr for Rect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(format!(
                "expected LEFT,TOP,WIDTH,HEIGHT but got {} value(s)",
                parts.len()
            ));
        }

        let mut values = [0.0f64; 4];
        for (slot, raw) in values.iter_mut().zip(&parts) {
            *slot = raw
                .parse::<f64>()
                .map_err(|e| format!("invalid number '{raw}': {e}"))?;
        }

        let rect = Rect::new(values[0], values[1], values[2], values[3]);
        if rect.is_empty() {
            return Err(format!("rectangle {rect} has no area"));
        }
        Ok(rect)
    }
}
