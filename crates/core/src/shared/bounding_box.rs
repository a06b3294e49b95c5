/// A face rectangle in frame pixel coordinates.
///
/// `start` is inclusive and `end` exclusive when used to slice pixels, so a
/// box with `end_x == start_x` covers no columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub start_x: i32,
    pub start_y: i32,
    pub end_x: i32,
    pub end_y: i32,
}

impl BoundingBox {
    pub fn new(start_x: i32, start_y: i32, end_x: i32, end_y: i32) -> Self {
        Self {
            start_x,
            start_y,
            end_x,
            end_y,
        }
    }

    pub fn width(&self) -> i32 {
        (self.end_x - self.start_x).max(0)
    }

    pub fn height(&self) -> i32 {
        (self.end_y - self.start_y).max(0)
    }

    pub fn area(&self) -> i64 {
        self.width() as i64 * self.height() as i64
    }

    /// A box that covers no pixels.
    pub fn is_degenerate(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// True when every corner lies inside `[0, width) × [0, height)`.
    pub fn is_within(&self, width: u32, height: u32) -> bool {
        let max_x = width as i32 - 1;
        let max_y = height as i32 - 1;
        self.start_x >= 0
            && self.start_y >= 0
            && self.end_x <= max_x
            && self.end_y <= max_y
            && self.start_x <= max_x
            && self.start_y <= max_y
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
        assert!(!b.is_degenerate());
    }

    #[rstest]
    #[case::zero_width(BoundingBox::new(5, 5, 5, 40))]
    #[case::zero_height(BoundingBox::new(5, 5, 40, 5))]
    #[case::inverted(BoundingBox::new(50, 50, 10, 10))]
    fn test_degenerate(#[case] b: BoundingBox) {
        assert!(b.is_degenerate());
        assert_eq!(b.area(), 0);
    }

    #[rstest]
    #[case::inside(BoundingBox::new(0, 0, 99, 79), true)]
    #[case::negative_start(BoundingBox::new(-1, 0, 50, 50), false)]
    #[case::end_x_at_width(BoundingBox::new(0, 0, 100, 50), false)]
    #[case::end_y_at_height(BoundingBox::new(0, 0, 50, 80), false)]
    fn test_is_within(#[case] b: BoundingBox, #[case] expected: bool) {
        assert_eq!(b.is_within(100, 80), expected);
    }
}
