use ndarray::{Array2, ArrayView2};

/// Summed-area tables of pixel values and squared pixel values.
///
/// Both tables carry a leading zero row and column, so the sum of any
/// rectangle is four lookups.
pub struct IntegralImage {
    sum: Array2<f64>,
    sq_sum: Array2<f64>,
}

impl IntegralImage {
    pub fn new(gray: ArrayView2<'_, u8>) -> Self {
        let (h, w) = gray.dim();
        let mut sum = Array2::<f64>::zeros((h + 1, w + 1));
        let mut sq_sum = Array2::<f64>::zeros((h + 1, w + 1));

        for y in 0..h {
            let mut row = 0.0;
            let mut row_sq = 0.0;
            for x in 0..w {
                let v = gray[[y, x]] as f64;
                row += v;
                row_sq += v * v;
                sum[[y + 1, x + 1]] = sum[[y, x + 1]] + row;
                sq_sum[[y + 1, x + 1]] = sq_sum[[y, x + 1]] + row_sq;
            }
        }
        Self { sum, sq_sum }
    }

    /// Image width in pixels.
    pub fn width(&self) -> usize {
        self.sum.ncols() - 1
    }

    /// Image height in pixels.
    pub fn height(&self) -> usize {
        self.sum.nrows() - 1
    }

    pub fn rect_sum(&self, x: usize, y: usize, w: usize, h: usize) -> f64 {
        Self::lookup(&self.sum, x, y, w, h)
    }

    pub fn rect_sq_sum(&self, x: usize, y: usize, w: usize, h: usize) -> f64 {
        Self::lookup(&self.sq_sum, x, y, w, h)
    }

    fn lookup(table: &Array2<f64>, x: usize, y: usize, w: usize, h: usize) -> f64 {
        table[[y + h, x + w]] - table[[y, x + w]] - table[[y + h, x]] + table[[y, x]]
    }
}
