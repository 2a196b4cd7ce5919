use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};

/// The dominant foreground region of one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedBlob {
    /// Centroid from the region's pixel moments, truncated to whole pixels.
    pub center: (i32, i32),
    /// Diameter of the region's minimum enclosing circle, in pixels.
    pub diameter: f64,
    /// Region area in pixels.
    pub area: u32,
}

/// Find the largest 8-connected foreground region of `mask`.
///
/// Returns `None` when the mask is empty. Ties go to the region encountered
/// first in raster order.
pub fn locate(mask: &GrayImage) -> Option<TrackedBlob> {
    let (width, height) = mask.dimensions();
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));

    let mut areas: Vec<u32> = Vec::new();
    for pixel in labels.pixels() {
        let label = pixel.0[0] as usize;
        if label == 0 {
            continue;
        }
        if areas.len() <= label {
            areas.resize(label + 1, 0);
        }
        areas[label] += 1;
    }

    let mut best: Option<(usize, u32)> = None;
    for (label, &area) in areas.iter().enumerate().skip(1) {
        if area > best.map_or(0, |(_, a)| a) {
            best = Some((label, area));
        }
    }
    let (best_label, area) = best?;
    let best_label = best_label as u32;

    let in_region = |x: i64, y: i64| -> bool {
        x >= 0
            && y >= 0
            && x < i64::from(width)
            && y < i64::from(height)
            && labels.get_pixel(x as u32, y as u32).0[0] == best_label
    };

    let mut m10 = 0.0f64;
    let mut m01 = 0.0f64;
    let mut boundary: Vec<(f64, f64)> = Vec::new();
    for (x, y, pixel) in labels.enumerate_pixels() {
        if pixel.0[0] != best_label {
            continue;
        }
        m10 += f64::from(x);
        m01 += f64::from(y);

        let (xi, yi) = (i64::from(x), i64::from(y));
        let on_edge = !in_region(xi - 1, yi)
            || !in_region(xi + 1, yi)
            || !in_region(xi, yi - 1)
            || !in_region(xi, yi + 1);
        if on_edge {
            boundary.push((f64::from(x), f64::from(y)));
        }
    }

    let m00 = f64::from(area);
    let center = ((m10 / m00) as i32, (m01 / m00) as i32);
    let circle = min_enclosing_circle(&boundary);

    Some(TrackedBlob {
        center,
        diameter: circle.radius * 2.0,
        area,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub center: (f64, f64),
    pub radius: f64,
}

const EPS: f64 = 1e-7;

impl Circle {
    fn contains(&self, p: (f64, f64)) -> bool {
        dist(self.center, p) <= self.radius + EPS
    }

    fn from_two(a: (f64, f64), b: (f64, f64)) -> Self {
        let center = ((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0);
        Self {
            center,
            radius: dist(a, b) / 2.0,
        }
    }

    fn from_three(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> Self {
        let (bx, by) = (b.0 - a.0, b.1 - a.1);
        let (cx, cy) = (c.0 - a.0, c.1 - a.1);
        let d = 2.0 * (bx * cy - by * cx);
        if d.abs() < EPS {
            // Collinear: the widest pair spans the other point.
            return [Self::from_two(a, b), Self::from_two(a, c), Self::from_two(b, c)]
                .into_iter()
                .fold(Self::from_two(a, b), |widest, pair| {
                    if pair.radius > widest.radius {
                        pair
                    } else {
                        widest
                    }
                });
        }
        let b2 = bx * bx + by * by;
        let c2 = cx * cx + cy * cy;
        let ux = (cy * b2 - by * c2) / d;
        let uy = (bx * c2 - cx * b2) / d;
        Self {
            center: (a.0 + ux, a.1 + uy),
            radius: (ux * ux + uy * uy).sqrt(),
        }
    }
}

fn dist(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// Smallest circle containing every point (incremental Welzl).
///
/// Points are visited in a strided order so raster-ordered input does not hit
/// the cubic worst case.
pub fn min_enclosing_circle(points: &[(f64, f64)]) -> Circle {
    let Some(&first) = points.first() else {
        return Circle {
            center: (0.0, 0.0),
            radius: 0.0,
        };
    };

    let ordered = spread(points);
    let mut circle = Circle {
        center: first,
        radius: 0.0,
    };
    for i in 0..ordered.len() {
        let p = ordered[i];
        if circle.contains(p) {
            continue;
        }
        circle = Circle {
            center: p,
            radius: 0.0,
        };
        for j in 0..i {
            let q = ordered[j];
            if circle.contains(q) {
                continue;
            }
            circle = Circle::from_two(p, q);
            for &r in &ordered[..j] {
                if !circle.contains(r) {
                    circle = Circle::from_three(p, q, r);
                }
            }
        }
    }
    circle
}

fn spread(points: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let n = points.len();
    let mut stride = 7919 % n.max(1);
    while stride == 0 || gcd(stride, n) != 1 {
        stride += 1;
    }
    (0..n).map(|i| points[(i * stride) % n]).collect()
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_with(w: u32, h: u32, fill: impl Fn(u32, u32) -> bool) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| Luma([if fill(x, y) { 255 } else { 0 }]))
    }

    #[test]
    fn empty_mask_has_no_blob() {
        assert_eq!(locate(&GrayImage::new(32, 32)), None);
    }

    #[test]
    fn picks_largest_region() {
        let mask = mask_with(100, 100, |x, y| {
            let small = (5..10).contains(&x) && (5..10).contains(&y);
            let large = (50..80).contains(&x) && (40..60).contains(&y);
            small || large
        });
        let blob = locate(&mask).unwrap();
        assert_eq!(blob.area, 30 * 20);
        // Mean of 50..80 is 64.5, of 40..60 is 49.5; truncated.
        assert_eq!(blob.center, (64, 49));
    }

    #[test]
    fn diameter_from_enclosing_circle_not_area() {
        // The centroid sits mid-bar while the enclosing circle spans its full length.
        let mask = mask_with(120, 20, |x, y| (10..=110).contains(&x) && (9..=10).contains(&y));
        let blob = locate(&mask).unwrap();
        assert_eq!(blob.center, (60, 9));
        let expected = ((100.0f64).powi(2) + 1.0).sqrt();
        assert!((blob.diameter - expected).abs() < 1e-6, "{}", blob.diameter);
    }

    #[test]
    fn disc_diameter_close_to_drawn() {
        let mask = mask_with(80, 80, |x, y| {
            let dx = x as f64 - 40.0;
            let dy = y as f64 - 40.0;
            dx * dx + dy * dy <= 15.0 * 15.0
        });
        let blob = locate(&mask).unwrap();
        assert_eq!(blob.center, (40, 40));
        assert!((blob.diameter - 30.0).abs() < 1.0, "{}", blob.diameter);
    }

    #[test]
    fn diagonal_pixels_are_one_region() {
        let mask = mask_with(10, 10, |x, y| x == y);
        let blob = locate(&mask).unwrap();
        assert_eq!(blob.area, 10);
    }

    #[test]
    fn circle_of_three_points() {
        let c = min_enclosing_circle(&[(0.0, 0.0), (4.0, 0.0), (2.0, 3.0), (2.0, 1.0)]);
        for p in [(0.0, 0.0), (4.0, 0.0), (2.0, 3.0)] {
            assert!(c.contains(p));
        }
        assert!(c.radius < 2.2);
    }

    #[test]
    fn single_point_circle() {
        let c = min_enclosing_circle(&[(3.0, 4.0)]);
        assert_eq!(c.center, (3.0, 4.0));
        assert_eq!(c.radius, 0.0);
    }
}
