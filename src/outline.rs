use crate::math::round_half_away;
use alloc::vec::*;

#[cfg(feature = "serde_derive")]
use serde::{Deserialize, Serialize};

/// A single outline point in font design units.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde_derive", derive(Serialize, Deserialize))]
pub struct Point {
    /// Absolute X coordinate.
    pub x: i32,
    /// Absolute Y coordinate.
    pub y: i32,
    /// Marks a point that lies on the outline. Off curve points are control points.
    pub on_curve: bool,
    /// Marks an off curve point as a cubic control point. TrueType control points are quadratic
    /// and leave this false. Never set on an on curve point.
    pub cubic: bool,
}

impl Point {
    #[inline]
    pub fn on(x: i32, y: i32) -> Point {
        Point {
            x,
            y,
            on_curve: true,
            cubic: false,
        }
    }

    #[inline]
    pub fn quad_off(x: i32, y: i32) -> Point {
        Point {
            x,
            y,
            on_curve: false,
            cubic: false,
        }
    }

    #[inline]
    pub fn cubic_off(x: i32, y: i32) -> Point {
        Point {
            x,
            y,
            on_curve: false,
            cubic: true,
        }
    }
}

/// One closed sub-path of a glyph outline. The first point is always on curve.
pub type Contour = Vec<Point>;

/// The bounding box from a glyph header.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde_derive", derive(Serialize, Deserialize))]
pub struct Bounds {
    pub xmin: i16,
    pub ymin: i16,
    pub xmax: i16,
    pub ymax: i16,
}

/// Accumulates pen commands into contours. Coordinates arrive as floats and are rounded to
/// design units on emit.
pub(crate) struct Builder {
    contours: Vec<Contour>,
    current: Contour,
}

impl Builder {
    pub fn new() -> Builder {
        Builder {
            contours: Vec::new(),
            current: Vec::new(),
        }
    }

    /// Closes the open contour, if any, and starts a new one at the given position.
    pub fn move_to(&mut self, x: f32, y: f32) {
        self.close();
        self.current.push(Point::on(round_half_away(x), round_half_away(y)));
    }

    pub fn line_to(&mut self, x: f32, y: f32) {
        self.current.push(Point::on(round_half_away(x), round_half_away(y)));
    }

    pub fn curve_to(&mut self, cx1: f32, cy1: f32, cx2: f32, cy2: f32, x: f32, y: f32) {
        self.current.push(Point::cubic_off(round_half_away(cx1), round_half_away(cy1)));
        self.current.push(Point::cubic_off(round_half_away(cx2), round_half_away(cy2)));
        self.current.push(Point::on(round_half_away(x), round_half_away(y)));
    }

    /// Emits the open contour. Empty contours are dropped.
    pub fn close(&mut self) {
        if !self.current.is_empty() {
            let contour = core::mem::replace(&mut self.current, Vec::new());
            self.contours.push(contour);
        }
    }

    pub fn finish(mut self) -> Vec<Contour> {
        self.close();
        self.contours
    }
}
