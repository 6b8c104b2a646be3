//! Row-streaming crop and box-filter reduction.
//!
//! Decoders hand rows over top to bottom; [`BlockSampler`] keeps only the
//! rows that fall inside the requested rect and averages `factor x factor`
//! blocks as they complete. Besides the output it holds one row of sums.

use super::sample::sampled_dimensions;
use super::DecodedImage;
use crate::error::{CropError, Result};
use crate::geometry::PixelRect;

/// Byte layout of one decoded row, 8 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PixelLayout {
    Gray,
    GrayAlpha,
    Rgb,
    Rgba,
}

impl PixelLayout {
    pub(crate) fn channels(self) -> usize {
        match self {
            PixelLayout::Gray => 1,
            PixelLayout::GrayAlpha => 2,
            PixelLayout::Rgb => 3,
            PixelLayout::Rgba => 4,
        }
    }

    // Alpha is dropped, as `into_rgb8` does.
    fn rgb(self, px: &[u8]) -> [u32; 3] {
        match self {
            PixelLayout::Gray | PixelLayout::GrayAlpha => {
                let v = px[0] as u32;
                [v, v, v]
            }
            PixelLayout::Rgb | PixelLayout::Rgba => [px[0] as u32, px[1] as u32, px[2] as u32],
        }
    }
}

/// Fail with `OutOfMemory` if `bytes` exceeds the decode budget.
pub(crate) fn charge(max_alloc: Option<u64>, bytes: u64) -> Result<()> {
    match max_alloc {
        Some(limit) if bytes > limit => Err(CropError::OutOfMemory),
        _ => Ok(()),
    }
}

/// Crops `rect` out of a row stream and reduces it by `factor`.
///
/// Trailing rows and columns that do not fill a whole block are dropped,
/// unless that would leave an axis empty, in which case the partial block
/// is averaged on its own.
#[derive(Debug)]
pub(crate) struct BlockSampler {
    rect: PixelRect,
    factor: u32,
    layout: PixelLayout,
    output: DecodedImage,
    sums: Vec<u32>,
    block_rows: u32,
    next_row: u32,
}

impl BlockSampler {
    /// Bytes held by a sampler for `rect` reduced by `factor`.
    pub(crate) fn footprint(rect: PixelRect, factor: u32) -> u64 {
        let (w, h) = sampled_dimensions(rect.width, rect.height, factor.max(1));
        let row = w as u64 * 3;
        row * h as u64 + row * 4
    }

    pub(crate) fn new(rect: PixelRect, factor: u32, layout: PixelLayout) -> Result<Self> {
        let factor = factor.max(1);
        let (w, h) = sampled_dimensions(rect.width, rect.height, factor);
        let output = DecodedImage::try_alloc(w, h)?;

        let len = w as usize * 3;
        let mut sums = Vec::new();
        sums.try_reserve_exact(len)
            .map_err(|_| CropError::OutOfMemory)?;
        sums.resize(len, 0);

        Ok(Self {
            rect,
            factor,
            layout,
            output,
            sums,
            block_rows: 0,
            next_row: 0,
        })
    }

    /// True once every output row has been written.
    pub(crate) fn is_done(&self) -> bool {
        self.next_row >= self.output.height
    }

    /// Feed row `y` of the decoded frame. Rows outside the rect are skipped.
    pub(crate) fn push_row(&mut self, y: u32, row: &[u8]) -> Result<()> {
        if self.is_done() || y < self.rect.y || y >= self.rect.bottom() {
            return Ok(());
        }
        let ry = y - self.rect.y;
        if ry / self.factor != self.next_row {
            return Ok(());
        }

        let ch = self.layout.channels();
        let needed = self.rect.right() as usize * ch;
        if row.len() < needed {
            return Err(CropError::DecodeFailure(format!(
                "row {y} holds {} bytes, expected at least {needed}",
                row.len()
            )));
        }

        let f = self.factor as usize;
        let x_end = self.rect.right() as usize;
        for ox in 0..self.output.width as usize {
            let x0 = self.rect.x as usize + ox * f;
            let x1 = (x0 + f).min(x_end);
            let mut sum = [0u32; 3];
            for x in x0..x1 {
                let [r, g, b] = self.layout.rgb(&row[x * ch..x * ch + ch]);
                sum[0] += r;
                sum[1] += g;
                sum[2] += b;
            }
            let acc = &mut self.sums[ox * 3..ox * 3 + 3];
            for c in 0..3 {
                acc[c] += sum[c];
            }
        }
        self.block_rows += 1;

        if (ry + 1) % self.factor == 0 || ry + 1 == self.rect.height {
            self.flush_row();
        }
        Ok(())
    }

    fn flush_row(&mut self) {
        let f = self.factor;
        let out_w = self.output.width as usize;
        let base = self.next_row as usize * out_w * 3;
        for ox in 0..out_w {
            let x0 = ox as u32 * f;
            let cols = f.min(self.rect.width - x0);
            let count = self.block_rows * cols;
            for c in 0..3 {
                let sum = self.sums[ox * 3 + c];
                self.output.pixels[base + ox * 3 + c] = ((sum + count / 2) / count) as u8;
            }
        }
        self.sums.fill(0);
        self.block_rows = 0;
        self.next_row += 1;
    }

    /// The reduced image, or `DecodeFailure` if the stream ended early.
    pub(crate) fn finish(self) -> Result<DecodedImage> {
        if !self.is_done() {
            return Err(CropError::DecodeFailure(format!(
                "image data ended after {} of {} rows",
                self.next_row, self.output.height
            )));
        }
        Ok(self.output)
    }
}
