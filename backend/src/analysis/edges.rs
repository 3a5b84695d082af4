use image::{GrayImage, Luma};
use imageproc::gradients::{horizontal_sobel, vertical_sobel};

const TAN_22_5: f32 = 0.414_213_56;
const TAN_67_5: f32 = 2.414_213_6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    None,
    Weak,
    Strong,
}

struct Gradients {
    width: i64,
    height: i64,
    gx: Vec<i32>,
    gy: Vec<i32>,
    magnitude: Vec<f32>,
}

impl Gradients {
    fn new(image: &GrayImage) -> Self {
        let gx: Vec<i32> = horizontal_sobel(image).pixels().map(|p| p[0] as i32).collect();
        let gy: Vec<i32> = vertical_sobel(image).pixels().map(|p| p[0] as i32).collect();
        let magnitude = gx
            .iter()
            .zip(&gy)
            .map(|(x, y)| (x.abs() + y.abs()) as f32)
            .collect();
        Self {
            width: image.width() as i64,
            height: image.height() as i64,
            gx,
            gy,
            magnitude,
        }
    }

    fn index(&self, x: i64, y: i64) -> Option<usize> {
        (x >= 0 && y >= 0 && x < self.width && y < self.height).then(|| (y * self.width + x) as usize)
    }

    fn magnitude_at(&self, x: i64, y: i64) -> f32 {
        self.index(x, y).map_or(0.0, |i| self.magnitude[i])
    }

    /// Whether the pixel is a local maximum across the gradient direction.
    fn is_ridge(&self, x: i64, y: i64, i: usize) -> bool {
        let m = self.magnitude[i];
        let (gx, gy) = (self.gx[i], self.gy[i]);
        let (ax, ay) = (gx.abs() as f32, gy.abs() as f32);
        if ay < ax * TAN_22_5 {
            m > self.magnitude_at(x - 1, y) && m >= self.magnitude_at(x + 1, y)
        } else if ay > ax * TAN_67_5 {
            m > self.magnitude_at(x, y - 1) && m >= self.magnitude_at(x, y + 1)
        } else {
            let s = if (gx < 0) != (gy < 0) { -1 } else { 1 };
            m > self.magnitude_at(x - s, y - 1) && m > self.magnitude_at(x + s, y + 1)
        }
    }
}

/// Canny edge map of `image` as 0/255 pixels.
///
/// Gradients come from the 3x3 Sobel operator on the unsmoothed image and the
/// magnitude is `|gx| + |gy|`. A pixel is a candidate above `low`, strong
/// above `high`, and weak candidates survive only when 8-connected to a strong
/// one.
pub fn canny_edges(image: &GrayImage, low: f32, high: f32) -> GrayImage {
    let gradients = Gradients::new(image);
    let (width, height) = (gradients.width, gradients.height);
    let mut marks = vec![Mark::None; gradients.magnitude.len()];
    let mut stack = Vec::new();

    for y in 0..height {
        for x in 0..width {
            let i = (y * width + x) as usize;
            let m = gradients.magnitude[i];
            if m <= low || !gradients.is_ridge(x, y, i) {
                continue;
            }
            if m > high {
                marks[i] = Mark::Strong;
                stack.push((x, y));
            } else {
                marks[i] = Mark::Weak;
            }
        }
    }

    while let Some((x, y)) = stack.pop() {
        for dy in -1..=1 {
            for dx in -1..=1 {
                if let Some(j) = gradients.index(x + dx, y + dy) {
                    if marks[j] == Mark::Weak {
                        marks[j] = Mark::Strong;
                        stack.push((x + dx, y + dy));
                    }
                }
            }
        }
    }

    GrayImage::from_fn(width as u32, height as u32, |x, y| {
        match marks[(y as i64 * width + x as i64) as usize] {
            Mark::Strong => Luma([255]),
            _ => Luma([0]),
        }
    })
}
