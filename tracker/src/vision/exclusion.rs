use image::{GrayImage, Luma};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;

/// Distance (pixels) within which a cursor position grabs an existing point.
pub const GRAB_RADIUS: f64 = 10.0;

/// Operator-drawn polygon whose interior is ignored by the blob search.
///
/// Point order defines the edges. Fewer than three points cover no area and
/// exclude nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionPolygon {
    points: Vec<(i32, i32)>,
}

impl ExclusionPolygon {
    pub fn new(points: Vec<(i32, i32)>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[(i32, i32)] {
        &self.points
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Index of the first point within [`GRAB_RADIUS`] of `(x, y)`.
    pub fn closest_point(&self, x: i32, y: i32) -> Option<usize> {
        self.points.iter().position(|&(px, py)| {
            let dx = f64::from(px - x);
            let dy = f64::from(py - y);
            (dx * dx + dy * dy).sqrt() < GRAB_RADIUS
        })
    }

    /// Append a point unless an existing one is already within reach.
    pub fn add_point(&mut self, x: i32, y: i32) -> bool {
        if self.closest_point(x, y).is_some() {
            return false;
        }
        self.points.push((x, y));
        true
    }

    pub fn move_point(&mut self, index: usize, x: i32, y: i32) -> bool {
        match self.points.get_mut(index) {
            Some(point) => {
                *point = (x, y);
                true
            }
            None => false,
        }
    }

    /// Remove the point within reach of `(x, y)`, if any.
    pub fn remove_near(&mut self, x: i32, y: i32) -> Option<(i32, i32)> {
        self.closest_point(x, y).map(|i| self.points.remove(i))
    }

    /// Points used for filling: a closing point equal to the first is dropped.
    /// Returns `None` when the polygon covers no area.
    fn fill_outline(&self) -> Option<Vec<Point<i32>>> {
        let mut outline: Vec<Point<i32>> =
            self.points.iter().map(|&(x, y)| Point::new(x, y)).collect();
        while outline.len() > 1 && outline.first() == outline.last() {
            outline.pop();
        }
        (outline.len() >= 3).then_some(outline)
    }

    /// Rasterize the polygon interior into a `width` x `height` mask
    /// (255 inside, 0 outside). Uses the same fill the overlay is drawn with.
    pub fn rasterize(&self, width: u32, height: u32) -> GrayImage {
        let mut zone = GrayImage::new(width, height);
        if let Some(outline) = self.fill_outline() {
            draw_polygon_mut(&mut zone, &outline, Luma([255u8]));
        }
        zone
    }

    /// Force every mask pixel inside the polygon to zero.
    pub fn apply(&self, mask: &mut GrayImage) {
        if self.fill_outline().is_none() {
            return;
        }
        let (width, height) = mask.dimensions();
        let zone = self.rasterize(width, height);
        for (masked, excluded) in mask.pixels_mut().zip(zone.pixels()) {
            if excluded.0[0] != 0 {
                masked.0[0] = 0;
            }
        }
    }
}
