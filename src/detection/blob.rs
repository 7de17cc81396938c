/// Sampled binary masks and connected-component blobs
///
/// Detectors classify pixels on a strided grid (the mode's sampling
/// resolution), then group set cells into 4-connected blobs. Blob geometry is
/// reported in canonical-frame pixels.
use rayon::prelude::*;
use std::f32::consts::FRAC_PI_4;

/// Blobs smaller than this many cells are treated as noise
pub const MIN_BLOB_CELLS: usize = 3;

/// Binary mask sampled every `stride` pixels inside a pixel window
pub struct SampledMask {
    origin_x: u32,
    origin_y: u32,
    stride: u32,
    grid_width: usize,
    grid_height: usize,
    cells: Vec<bool>,
}

impl SampledMask {
    /// Classify the window `[x0, x1) x [y0, y1)` on a grid of `stride`.
    ///
    /// Rows are evaluated in parallel; `predicate` receives pixel coordinates.
    pub fn build<F>(window: (u32, u32, u32, u32), stride: u32, predicate: F) -> Self
    where
        F: Fn(u32, u32) -> bool + Sync,
    {
        let (x0, y0, x1, y1) = window;
        let stride = stride.max(1);
        let grid_width = (x1.saturating_sub(x0)).div_ceil(stride) as usize;
        let grid_height = (y1.saturating_sub(y0)).div_ceil(stride) as usize;
        let mut cells = vec![false; grid_width * grid_height];

        if grid_width > 0 {
            cells
                .par_chunks_mut(grid_width)
                .enumerate()
                .for_each(|(gy, row)| {
                    let y = y0 + gy as u32 * stride;
                    for (gx, cell) in row.iter_mut().enumerate() {
                        *cell = predicate(x0 + gx as u32 * stride, y);
                    }
                });
        }

        Self {
            origin_x: x0,
            origin_y: y0,
            stride,
            grid_width,
            grid_height,
            cells,
        }
    }

    pub fn count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    /// Group set cells into 4-connected components
    pub fn blobs(&self, min_cells: usize) -> Vec<Blob> {
        let mut visited = vec![false; self.cells.len()];
        let mut blobs = Vec::new();
        let mut stack = Vec::new();

        for start in 0..self.cells.len() {
            if !self.cells[start] || visited[start] {
                continue;
            }

            let mut acc = BlobAccumulator::default();
            visited[start] = true;
            stack.push(start);

            while let Some(idx) = stack.pop() {
                let gx = idx % self.grid_width;
                let gy = idx / self.grid_width;
                acc.add(gx, gy);

                let mut visit = |n: usize| {
                    if self.cells[n] && !visited[n] {
                        visited[n] = true;
                        stack.push(n);
                    }
                };
                if gx > 0 {
                    visit(idx - 1);
                }
                if gx + 1 < self.grid_width {
                    visit(idx + 1);
                }
                if gy > 0 {
                    visit(idx - self.grid_width);
                }
                if gy + 1 < self.grid_height {
                    visit(idx + self.grid_width);
                }
            }

            if acc.count >= min_cells {
                blobs.push(acc.finish(self.origin_x, self.origin_y, self.stride));
            }
        }

        blobs
    }
}

#[derive(Default)]
struct BlobAccumulator {
    count: usize,
    sum_x: u64,
    sum_y: u64,
    min_x: usize,
    max_x: usize,
    min_y: usize,
    max_y: usize,
}

impl BlobAccumulator {
    fn add(&mut self, gx: usize, gy: usize) {
        if self.count == 0 {
            self.min_x = gx;
            self.max_x = gx;
            self.min_y = gy;
            self.max_y = gy;
        } else {
            self.min_x = self.min_x.min(gx);
            self.max_x = self.max_x.max(gx);
            self.min_y = self.min_y.min(gy);
            self.max_y = self.max_y.max(gy);
        }
        self.count += 1;
        self.sum_x += gx as u64;
        self.sum_y += gy as u64;
    }

    fn finish(self, origin_x: u32, origin_y: u32, stride: u32) -> Blob {
        let stride_f = stride as f32;
        let n = self.count as f32;
        Blob {
            cells: self.count,
            grid_width: self.max_x - self.min_x + 1,
            grid_height: self.max_y - self.min_y + 1,
            center_x: origin_x as f32 + (self.sum_x as f32 / n) * stride_f,
            center_y: origin_y as f32 + (self.sum_y as f32 / n) * stride_f,
            left: origin_x as f32 + self.min_x as f32 * stride_f,
            top: origin_y as f32 + self.min_y as f32 * stride_f,
            stride: stride_f,
        }
    }
}

/// A connected component in canonical-frame pixels
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub cells: usize,
    pub grid_width: usize,
    pub grid_height: usize,
    pub center_x: f32,
    pub center_y: f32,
    pub left: f32,
    pub top: f32,
    pub stride: f32,
}

impl Blob {
    pub fn width_px(&self) -> f32 {
        self.grid_width as f32 * self.stride
    }

    pub fn height_px(&self) -> f32 {
        self.grid_height as f32 * self.stride
    }

    pub fn area_px(&self) -> f32 {
        self.cells as f32 * self.stride * self.stride
    }

    /// Radius of the circle inscribed in the bounding box average
    pub fn radius_px(&self) -> f32 {
        (self.width_px() + self.height_px()) / 4.0
    }

    /// Fraction of the bounding box covered by the blob
    pub fn fill_ratio(&self) -> f32 {
        self.cells as f32 / (self.grid_width * self.grid_height) as f32
    }

    /// Short side over long side of the bounding box
    pub fn aspect_ratio(&self) -> f32 {
        let (w, h) = (self.grid_width as f32, self.grid_height as f32);
        w.min(h) / w.max(h)
    }

    /// Score in [0, 1]: 1.0 for a filled disc (fill = pi/4, square bounds)
    pub fn roundness(&self) -> f32 {
        let deviation = (self.fill_ratio() - FRAC_PI_4).abs() / FRAC_PI_4;
        let circularity = (1.0 - deviation).clamp(0.0, 1.0);
        (0.5 * circularity + 0.5 * self.aspect_ratio()).clamp(0.0, 1.0)
    }

    /// Score in [0, 1] for solid, square-ish markers (pads, discs)
    pub fn solidity(&self) -> f32 {
        (0.5 * self.fill_ratio() + 0.5 * self.aspect_ratio()).clamp(0.0, 1.0)
    }
}
