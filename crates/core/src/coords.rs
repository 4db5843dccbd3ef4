//! Normalized (0..=1000) coordinates and their translation to device pixels.

use serde_json::Value;

use crate::actions::{ActionError, ErrorKind};
use crate::types::ScreenDimensions;

pub const NORM_MAX: f64 = 1000.0;

fn clamp(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, NORM_MAX)
    }
}

/// A position on the display as a fraction of 1000 per axis. Always in range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedPoint {
    x: f64,
    y: f64,
}

impl NormalizedPoint {
    pub const CENTER: NormalizedPoint = NormalizedPoint { x: 500.0, y: 500.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x: clamp(x), y: clamp(y) }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }
}

/// Axis-aligned box with `x1 <= x2` and `y1 <= y2`, all coordinates in range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedBox {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
}

impl NormalizedBox {
    /// Clamp every coordinate and swap inverted edges.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        let (x1, x2) = (clamp(x1), clamp(x2));
        let (y1, y2) = (clamp(y1), clamp(y2));
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    /// Zero-area box around a single point.
    pub fn from_point(p: NormalizedPoint) -> Self {
        Self { x1: p.x, y1: p.y, x2: p.x, y2: p.y }
    }

    pub fn corners(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    pub fn center(&self) -> NormalizedPoint {
        box_center(self)
    }
}

/// Midpoint of a box. For a point-derived box this is the original point.
pub fn box_center(b: &NormalizedBox) -> NormalizedPoint {
    NormalizedPoint::new((b.x1 + b.x2) / 2.0, (b.y1 + b.y2) / 2.0)
}

/// Map a normalized point to a pixel index. 1000 lands on the last pixel, never past it.
pub fn normalize_to_pixel(point: NormalizedPoint, dims: ScreenDimensions) -> (i32, i32) {
    let axis = |n: f64, dim: u32| -> i32 {
        let last = dim.saturating_sub(1) as f64;
        ((n / NORM_MAX) * last).round() as i32
    };
    (axis(point.x, dims.width), axis(point.y, dims.height))
}

const BOX_SHAPES: &str = "box must be [x,y], [x1,y1,x2,y2], or [[x1,y1],[x2,y2]]";

fn numbers(items: &[Value]) -> Option<Vec<f64>> {
    items.iter().map(Value::as_f64).collect()
}

fn pair(v: &Value) -> Option<&[Value]> {
    match v {
        Value::Array(items) if items.len() == 2 => Some(items),
        _ => None,
    }
}

fn invalid(message: &str) -> ActionError {
    ActionError::new(ErrorKind::InvalidBox, message)
}

/// Resolve one of the three accepted box encodings by structure:
/// `[x,y]` (point), `[x1,y1,x2,y2]` (flat) or `[[x1,y1],[x2,y2]]` (legacy).
pub fn parse_box(raw: &Value) -> Result<NormalizedBox, ActionError> {
    let items = raw.as_array().ok_or_else(|| invalid(BOX_SHAPES))?;

    match items.len() {
        2 if items.iter().all(Value::is_number) => {
            let v = numbers(items).ok_or_else(|| invalid(BOX_SHAPES))?;
            Ok(NormalizedBox::from_point(NormalizedPoint::new(v[0], v[1])))
        }
        4 if items.iter().all(Value::is_number) => {
            let v = numbers(items).ok_or_else(|| invalid(BOX_SHAPES))?;
            Ok(NormalizedBox::new(v[0], v[1], v[2], v[3]))
        }
        2 => {
            let (p1, p2) = match (pair(&items[0]), pair(&items[1])) {
                (Some(a), Some(b)) => (a, b),
                _ => return Err(invalid(BOX_SHAPES)),
            };
            let a = numbers(p1).ok_or_else(|| invalid("coordinates must be numbers"))?;
            let b = numbers(p2).ok_or_else(|| invalid("coordinates must be numbers"))?;
            Ok(NormalizedBox::new(a[0], a[1], b[0], b[1]))
        }
        _ => Err(invalid(BOX_SHAPES)),
    }
}
