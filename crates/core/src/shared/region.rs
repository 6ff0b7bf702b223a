/// An axis-aligned detection rectangle in source-image pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    /// Whether two rectangles describe the same object within `eps`.
    ///
    /// Every edge may move by at most `eps` times the mean of the smaller
    /// width and the smaller height.
    pub fn is_similar(&self, other: &Region, eps: f64) -> bool {
        let delta = eps
            * (self.width.min(other.width) as f64 + self.height.min(other.height) as f64)
            * 0.5;
        (self.x - other.x).abs() as f64 <= delta
            && (self.y - other.y).abs() as f64 <= delta
            && (self.right() - other.right()).abs() as f64 <= delta
            && (self.bottom() - other.bottom()).abs() as f64 <= delta
    }

    /// Whether `self` lies inside `outer` once `outer` is grown by
    /// `eps` of its own size on every side.
    pub fn is_inside_loose(&self, outer: &Region, eps: f64) -> bool {
        let dx = (outer.width as f64 * eps).round() as i32;
        let dy = (outer.height as f64 * eps).round() as i32;
        self.x >= outer.x - dx
            && self.y >= outer.y - dy
            && self.right() <= outer.right() + dx
            && self.bottom() <= outer.bottom() + dy
    }
}
