use serde::Serialize;

/// Integer pixel box in original-image space, `[x1, y1, x2, y2)`.
///
/// `x2`/`y2` are exclusive, so a box spanning a whole `w` x `h` image is
/// `[0, 0, w, h]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl BoundingBox {
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.x2 <= self.x1 || self.y2 <= self.y1
    }

    /// True when the box is non-empty and lies inside a `width` x `height` image.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        !self.is_empty() && self.x2 <= width && self.y2 <= height
    }

    pub fn to_array(&self) -> [u32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

impl Serialize for BoundingBox {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_array().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_dimensions() {
        let b = BoundingBox::new(10, 20, 110, 70);
        assert_eq!(b.width(), 100);
        assert_eq!(b.height(), 50);
        assert_eq!(b.area(), 5000);
    }

    #[rstest]
    #[case::zero_width(BoundingBox::new(5, 0, 5, 10), true)]
    #[case::zero_height(BoundingBox::new(0, 5, 10, 5), true)]
    #[case::inverted(BoundingBox::new(10, 10, 5, 5), true)]
    #[case::unit(BoundingBox::new(0, 0, 1, 1), false)]
    fn test_is_empty(#[case] b: BoundingBox, #[case] expected: bool) {
        assert_eq!(b.is_empty(), expected);
    }

    #[test]
    fn test_inverted_box_has_zero_dimensions() {
        let b = BoundingBox::new(10, 10, 5, 5);
        assert_eq!(b.width(), 0);
        assert_eq!(b.area(), 0);
    }

    #[rstest]
    #[case::inside(BoundingBox::new(0, 0, 640, 480), true)]
    #[case::too_wide(BoundingBox::new(0, 0, 641, 480), false)]
    #[case::too_tall(BoundingBox::new(0, 0, 640, 481), false)]
    #[case::empty(BoundingBox::new(3, 3, 3, 3), false)]
    fn test_fits_within(#[case] b: BoundingBox, #[case] expected: bool) {
        assert_eq!(b.fits_within(640, 480), expected);
    }

    #[test]
    fn test_serializes_as_array() {
        let json = serde_json::to_string(&BoundingBox::new(1, 2, 3, 4)).unwrap();
        assert_eq!(json, "[1,2,3,4]");
    }
}
