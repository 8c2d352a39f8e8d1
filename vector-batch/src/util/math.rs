use serde::{Deserialize, Serialize};

use crate::util::SignificantlyDifferent;

/// An axis aligned rectangle in map coordinates, `[min_x, min_y, max_x, max_y]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// An extent covering the whole plane.
    pub const fn infinite() -> Self {
        Self::new(
            f64::NEG_INFINITY,
            f64::NEG_INFINITY,
            f64::INFINITY,
            f64::INFINITY,
        )
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn is_empty(&self) -> bool {
        self.max_x < self.min_x || self.max_y < self.min_y
    }

    pub fn intersects(&self, other: &Extent) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Returns the overlapping part of both extents. The result [`is_empty`](Extent::is_empty)
    /// if they do not intersect.
    pub fn intersection(&self, other: &Extent) -> Extent {
        Extent::new(
            self.min_x.max(other.min_x),
            self.min_y.max(other.min_y),
            self.max_x.min(other.max_x),
            self.max_y.min(other.max_y),
        )
    }

    pub fn to_array(&self) -> [f32; 4] {
        [
            self.min_x as f32,
            self.min_y as f32,
            self.max_x as f32,
            self.max_y as f32,
        ]
    }
}

impl Default for Extent {
    fn default() -> Self {
        Extent::infinite()
    }
}

impl SignificantlyDifferent for Extent {
    type Epsilon = f64;

    fn ne(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        (self.min_x - other.min_x).abs() > epsilon
            || (self.min_y - other.min_y).abs() > epsilon
            || (self.max_x - other.max_x).abs() > epsilon
            || (self.max_y - other.max_y).abs() > epsilon
    }
}

#[cfg(test)]
mod tests {
    use crate::util::math::Extent;

    #[test]
    fn test_intersection() {
        let a = Extent::new(0.0, 0.0, 10.0, 10.0);
        let b = Extent::new(5.0, -5.0, 15.0, 5.0);

        assert!(a.intersects(&b));
        assert_eq!(a.intersection(&b), Extent::new(5.0, 0.0, 10.0, 5.0));

        let c = Extent::new(20.0, 20.0, 30.0, 30.0);
        assert!(!a.intersects(&c));
        assert!(a.intersection(&c).is_empty());

        assert_eq!(Extent::infinite().intersection(&a), a);
    }
}
