//! src/labels.rs
//!
//! Geometric label encodings: axis-aligned/oriented boxes and point sets.
//!
//! Coordinates are stored as `f64` and alternate x, y. Normalized values live in
//! `[0, 1]` relative to the image; `denormalize` multiplies by the image size and
//! `normalize` divides by it. Both round to 4 decimals.

use imageproc::point::Point;

/// Rounds to 4 decimal places.
#[inline]
pub(crate) fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Scales alternating x, y coordinates. Even indices follow the width axis,
/// odd indices the height axis.
fn scale_coords(coords: &mut [f64], height: f64, width: f64, divide: bool) {
    for (idx, coord) in coords.iter_mut().enumerate() {
        let dim = if idx % 2 == 0 { width } else { height };
        *coord = if divide {
            round4(*coord / dim)
        } else {
            round4(*coord * dim)
        };
    }
}

// ============================================================================
// BBox
// ============================================================================

/// Which four numbers a [`BBox`] currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxFormat {
    /// `[x1, y1, x2, y2]`
    Xyxy,
    /// `[xc, yc, w, h]`, the layout used in label files.
    Xcyc,
}

/// A rectangle, optionally rotated by `orientation` degrees.
///
/// Width and height are always derived from the coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct BBox {
    pub coords: [f64; 4],
    pub format: BoxFormat,
    pub orientation: Option<f64>,
}

impl BBox {
    pub fn new(coords: [f64; 4], format: BoxFormat) -> Self {
        Self {
            coords,
            format,
            orientation: None,
        }
    }

    /// Box in center form, as read from a label line.
    pub fn xcyc(xc: f64, yc: f64, w: f64, h: f64) -> Self {
        Self::new([xc, yc, w, h], BoxFormat::Xcyc)
    }

    pub fn xyxy(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::new([x1, y1, x2, y2], BoxFormat::Xyxy)
    }

    pub fn with_orientation(mut self, angle: f64) -> Self {
        self.orientation = Some(angle);
        self
    }

    pub fn denormalize(&mut self, height: u32, width: u32) {
        scale_coords(&mut self.coords, height as f64, width as f64, false);
    }

    pub fn normalize(&mut self, height: u32, width: u32) {
        scale_coords(&mut self.coords, height as f64, width as f64, true);
    }

    /// Converts to corner form. No-op if already there.
    pub fn to_xyxy(&mut self) {
        if self.format == BoxFormat::Xyxy {
            return;
        }
        let [xc, yc, w, h] = self.coords;
        self.coords = [
            round4(xc - w / 2.0),
            round4(yc - h / 2.0),
            round4(xc + w / 2.0),
            round4(yc + h / 2.0),
        ];
        self.format = BoxFormat::Xyxy;
    }

    /// Converts to center-size form. No-op if already there.
    pub fn to_xcyc(&mut self) {
        if self.format == BoxFormat::Xcyc {
            return;
        }
        let [x1, y1, x2, y2] = self.coords;
        let w = x2 - x1;
        let h = y2 - y1;
        self.coords = [
            round4(x1 + w / 2.0),
            round4(y1 + h / 2.0),
            round4(w),
            round4(h),
        ];
        self.format = BoxFormat::Xcyc;
    }

    pub fn width(&self) -> f64 {
        match self.format {
            BoxFormat::Xyxy => round4(self.coords[2] - self.coords[0]),
            BoxFormat::Xcyc => round4(self.coords[2]),
        }
    }

    pub fn height(&self) -> f64 {
        match self.format {
            BoxFormat::Xyxy => round4(self.coords[3] - self.coords[1]),
            BoxFormat::Xcyc => round4(self.coords[3]),
        }
    }

    pub fn area(&self) -> f64 {
        round4(self.width() * self.height())
    }

    /// Integer corners `[x1, y1, x2, y2]`, negative values clamped to zero.
    /// Expects pixel-space coordinates.
    pub fn to_pixels(&self) -> [u32; 4] {
        let mut corners = self.clone();
        corners.to_xyxy();
        corners.coords.map(|c| c.round().max(0.0) as u32)
    }
}

// ============================================================================
// PointSet
// ============================================================================

/// Flat polygon/keypoint list interpreted as `x0, y0, x1, y1, ...`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointSet {
    pub coords: Vec<f64>,
}

impl PointSet {
    pub fn new(coords: Vec<f64>) -> Self {
        Self { coords }
    }

    /// Number of coordinates (twice the number of points).
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn denormalize(&mut self, height: u32, width: u32) {
        scale_coords(&mut self.coords, height as f64, width as f64, false);
    }

    pub fn normalize(&mut self, height: u32, width: u32) {
        scale_coords(&mut self.coords, height as f64, width as f64, true);
    }

    fn xs(&self) -> impl Iterator<Item = f64> + '_ {
        self.coords.iter().step_by(2).copied()
    }

    fn ys(&self) -> impl Iterator<Item = f64> + '_ {
        self.coords.iter().skip(1).step_by(2).copied()
    }

    pub fn width(&self) -> f64 {
        extent(self.xs())
    }

    pub fn height(&self) -> f64 {
        extent(self.ys())
    }

    /// Integer vertices, dropping a trailing point that repeats the first one.
    /// A dangling x without its y is ignored.
    pub fn to_polygon(&self) -> Vec<Point<i32>> {
        let mut points: Vec<Point<i32>> = self
            .coords
            .chunks_exact(2)
            .map(|xy| Point::new(xy[0].round() as i32, xy[1].round() as i32))
            .collect();
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        points
    }
}

fn extent(values: impl Iterator<Item = f64>) -> f64 {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if min.is_finite() && max.is_finite() {
        round4(max - min)
    } else {
        0.0
    }
}
