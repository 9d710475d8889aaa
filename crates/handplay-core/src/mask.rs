//! Single-channel masks and the binary morphology used to clean them up.

use crate::types::VisionError;

/// 8-bit single-channel image, usually binary (0 / 255).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

/// Axis-aligned pixel rectangle, e.g. a face region to keep out of the hand mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Mask {
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, 0)
    }

    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Result<Self, VisionError> {
        if data.len() != width * height {
            return Err(VisionError::InvalidFrame {
                expected: width * height,
                actual: data.len(),
            });
        }
        Ok(Self { width, height, data })
    }

    /// Mask that is 255 everywhere except inside the given rectangles, each
    /// grown by `padding` pixels on every side.
    pub fn exclusion(width: usize, height: usize, rects: &[PixelRect], padding: i32) -> Self {
        let mut mask = Self::filled(width, height, 255);
        for r in rects {
            let x0 = (r.x - padding).max(0) as usize;
            let y0 = (r.y - padding).max(0) as usize;
            let x1 = ((r.x + r.width + padding).max(0) as usize).min(width);
            let y1 = ((r.y + r.height + padding).max(0) as usize).min(height);
            for y in y0..y1 {
                for x in x0..x1 {
                    mask.data[y * width + x] = 0;
                }
            }
        }
        mask
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    pub fn set(&mut self, x: usize, y: usize, value: u8) {
        self.data[y * self.width + x] = value;
    }

    /// Set every pixel of the half-open rectangle `[x0, x1) x [y0, y1)` (clipped).
    pub fn fill_rect(&mut self, x0: usize, y0: usize, x1: usize, y1: usize, value: u8) {
        for y in y0..y1.min(self.height) {
            for x in x0..x1.min(self.width) {
                self.data[y * self.width + x] = value;
            }
        }
    }

    pub fn count_nonzero(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }

    /// Per-pixel AND of two masks of the same size.
    pub fn and(&self, other: &Mask) -> Result<Mask, VisionError> {
        if self.width != other.width || self.height != other.height {
            return Err(VisionError::DimensionMismatch {
                left: (self.width, self.height),
                right: (other.width, other.height),
            });
        }
        let data = self.data.iter().zip(&other.data).map(|(a, b)| a & b).collect();
        Ok(Mask {
            width: self.width,
            height: self.height,
            data,
        })
    }

    /// Minimum filter over a `ksize`×`ksize` window, repeated `iterations` times.
    pub fn erode(&self, ksize: usize, iterations: usize) -> Mask {
        self.morph(ksize, iterations, u8::min)
    }

    /// Maximum filter over a `ksize`×`ksize` window, repeated `iterations` times.
    pub fn dilate(&self, ksize: usize, iterations: usize) -> Mask {
        self.morph(ksize, iterations, u8::max)
    }

    /// Erode then dilate: removes specks smaller than the kernel.
    pub fn open(&self, ksize: usize) -> Mask {
        self.erode(ksize, 1).dilate(ksize, 1)
    }

    /// Dilate then erode: fills pinholes smaller than the kernel.
    pub fn close(&self, ksize: usize) -> Mask {
        self.dilate(ksize, 1).erode(ksize, 1)
    }

    // Square windows are separable: a row pass followed by a column pass.
    // Pixels outside the image never take part.
    fn morph(&self, ksize: usize, iterations: usize, pick: fn(u8, u8) -> u8) -> Mask {
        let r = ksize / 2;
        let (w, h) = (self.width, self.height);
        let mut cur = self.data.clone();
        let mut tmp = vec![0u8; cur.len()];

        for _ in 0..iterations {
            for y in 0..h {
                let row = &cur[y * w..(y + 1) * w];
                for x in 0..w {
                    let lo = x.saturating_sub(r);
                    let hi = (x + r).min(w - 1);
                    tmp[y * w + x] = row[lo..=hi].iter().copied().reduce(pick).unwrap_or(0);
                }
            }
            for x in 0..w {
                for y in 0..h {
                    let lo = y.saturating_sub(r);
                    let hi = (y + r).min(h - 1);
                    let mut acc = tmp[lo * w + x];
                    for yy in lo + 1..=hi {
                        acc = pick(acc, tmp[yy * w + x]);
                    }
                    cur[y * w + x] = acc;
                }
            }
        }

        Mask {
            width: w,
            height: h,
            data: cur,
        }
    }

    /// 5×5 Gaussian blur with the binomial kernel [1 4 6 4 1]/16 in both
    /// directions and reflect-101 borders.
    pub fn gaussian_blur5(&self) -> Mask {
        const KERNEL: [u32; 5] = [1, 4, 6, 4, 1];
        let (w, h) = (self.width, self.height);
        if w == 0 || h == 0 {
            return self.clone();
        }

        let mut horiz = vec![0u32; w * h];
        for y in 0..h {
            for x in 0..w {
                horiz[y * w + x] = KERNEL
                    .iter()
                    .enumerate()
                    .map(|(k, &c)| c * self.data[y * w + reflect101(x as isize + k as isize - 2, w)] as u32)
                    .sum();
            }
        }

        let mut data = vec![0u8; w * h];
        for y in 0..h {
            for x in 0..w {
                let sum: u32 = KERNEL
                    .iter()
                    .enumerate()
                    .map(|(k, &c)| c * horiz[reflect101(y as isize + k as isize - 2, h) * w + x])
                    .sum();
                data[y * w + x] = ((sum + 128) >> 8) as u8;
            }
        }

        Mask { width: w, height: h, data }
    }

    /// Binarise: values strictly above `thresh` become 255, the rest 0.
    pub fn threshold(&self, thresh: u8) -> Mask {
        Mask {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&v| if v > thresh { 255 } else { 0 }).collect(),
        }
    }

    /// Copy into a grayscale image for debugging dumps.
    pub fn to_image(&self) -> image::GrayImage {
        image::GrayImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            image::Luma([self.get(x as usize, y as usize)])
        })
    }
}

fn reflect101(mut i: isize, n: usize) -> usize {
    let n = n as isize;
    if n == 1 {
        return 0;
    }
    while i < 0 || i >= n {
        if i < 0 {
            i = -i;
        }
        if i >= n {
            i = 2 * n - 2 - i;
        }
    }
    i as usize
}
