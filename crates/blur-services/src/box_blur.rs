//! Box blur engine.
//!
//! Every output pixel is the truncated mean of the R, G and B values in a
//! `(2*half+1)²` window centred on it, `half = radius / 2`. Window coordinates
//! outside the image are clamped to the nearest edge row/column, so edge
//! pixels are sampled more than once. Output alpha is always 0xFF.
//!
//! Rows are split into contiguous bands, one per worker; the last band takes
//! the remainder. Each band owns a disjoint slice of the output buffer and is
//! computed on a dedicated rayon pool. The call returns once every band has
//! finished, or fails as a whole if any band did not.
//!
//! Within a band the window sum is taken in two passes: a clamped horizontal
//! sum per source row, then a clamped vertical sum of those. Both passes are
//! exact integer sums over the same multiset of samples as the direct 2-D
//! window, so the result is bit-identical to it and independent of how many
//! bands were used. Row sums are `u64` and window sums `u128`, wide enough
//! for any `u32` radius.

use std::ops::Range;
use std::panic::{catch_unwind, AssertUnwindSafe};

use rayon::prelude::*;

use blur_core::image::{ImageError, RgbaImage, CHANNELS};
use blur_core::Radius;

#[derive(Debug, thiserror::Error)]
pub enum BlurError {
    #[error("failed to build worker pool: {0}")]
    Pool(String),
    #[error("band {band} of {bands} did not complete")]
    BandFailed { band: usize, bands: usize },
    #[error("filter task interrupted: {0}")]
    Interrupted(String),
    #[error("failed to assemble output: {0}")]
    Output(#[from] ImageError),
}

/// Parallel box blur over a fixed number of row bands.
pub struct BoxBlur {
    pool: rayon::ThreadPool,
    bands: usize,
}

impl std::fmt::Debug for BoxBlur {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxBlur").field("bands", &self.bands).finish()
    }
}

impl BoxBlur {
    /// Engine with `bands` workers (at least one).
    pub fn new(bands: usize) -> Result<Self, BlurError> {
        let bands = bands.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(bands)
            .thread_name(|i| format!("blur-band-{i}"))
            .build()
            .map_err(|e| BlurError::Pool(e.to_string()))?;
        Ok(Self { pool, bands })
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    /// Blur `src` with `radius`. Dimensions are preserved.
    pub fn apply(&self, src: &RgbaImage, radius: Radius) -> Result<RgbaImage, BlurError> {
        self.run_bands(src, |rows, dst| blur_rows(src, radius, rows, dst))
    }

    /// Fan `band_fn` out over the row bands of `src` and join.
    fn run_bands<F>(&self, src: &RgbaImage, band_fn: F) -> Result<RgbaImage, BlurError>
    where
        F: Fn(Range<usize>, &mut [u8]) + Sync,
    {
        let stride = src.stride();
        let ranges = band_ranges(src.height(), self.bands);
        let bands = ranges.len();

        let mut out = vec![0u8; src.as_bytes().len()];
        let mut tasks = Vec::with_capacity(bands);
        let mut rest: &mut [u8] = &mut out;
        for (band, rows) in ranges.into_iter().enumerate() {
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(rows.len() * stride);
            tasks.push((band, rows, head));
            rest = tail;
        }

        let failed = self.pool.install(|| {
            tasks
                .into_par_iter()
                .filter_map(|(band, rows, dst)| {
                    catch_unwind(AssertUnwindSafe(|| band_fn(rows, dst)))
                        .err()
                        .map(|_| band)
                })
                .min()
        });

        if let Some(band) = failed {
            return Err(BlurError::BandFailed { band, bands });
        }

        Ok(RgbaImage::new(src.width(), src.height(), out)?)
    }
}

/// Split `height` rows into contiguous bands.
///
/// The band count is capped at `height` so no band is empty. Every band gets
/// `height / count` rows and the last one also takes the remainder.
pub fn band_ranges(height: usize, bands: usize) -> Vec<Range<usize>> {
    let count = bands.clamp(1, height.max(1));
    let per_band = height / count;
    (0..count)
        .map(|i| {
            let start = i * per_band;
            let end = if i == count - 1 {
                height
            } else {
                start + per_band
            };
            start..end
        })
        .collect()
}

fn clamp_index(i: isize, len: usize) -> usize {
    i.clamp(0, len as isize - 1) as usize
}

/// Blur source rows `rows` into `dst`, which holds exactly those rows.
fn blur_rows(src: &RgbaImage, radius: Radius, rows: Range<usize>, dst: &mut [u8]) {
    let width = src.width();
    let height = src.height();
    let stride = src.stride();
    let data = src.as_bytes();
    let half = radius.half();
    let reach = half as isize;
    let count = (radius.window_side() as u128).pow(2);

    // Source rows any window of this band can touch, inclusive.
    let top = rows.start.saturating_sub(half);
    let bottom = (rows.end - 1).saturating_add(half).min(height - 1);

    // Clamped horizontal RGB sums for each touched row.
    let mut row_sums = vec![[0u64; 3]; (bottom - top + 1) * width];
    for sy in top..=bottom {
        let row = &data[sy * stride..(sy + 1) * stride];
        let sums = &mut row_sums[(sy - top) * width..(sy - top + 1) * width];
        for (x, sum) in sums.iter_mut().enumerate() {
            for dx in -reach..=reach {
                let nx = clamp_index(x as isize + dx, width);
                let p = &row[nx * CHANNELS..nx * CHANNELS + 3];
                sum[0] += p[0] as u64;
                sum[1] += p[1] as u64;
                sum[2] += p[2] as u64;
            }
        }
    }

    for (dst_row, y) in dst.chunks_exact_mut(stride).zip(rows) {
        for (x, out) in dst_row.chunks_exact_mut(CHANNELS).enumerate() {
            let mut acc = [0u128; 3];
            for dy in -reach..=reach {
                let sy = clamp_index(y as isize + dy, height);
                let sum = row_sums[(sy - top) * width + x];
                acc[0] += sum[0] as u128;
                acc[1] += sum[1] as u128;
                acc[2] += sum[2] as u128;
            }
            out[0] = (acc[0] / count) as u8;
            out[1] = (acc[1] / count) as u8;
            out[2] = (acc[2] / count) as u8;
            out[3] = 0xFF;
        }
    }
}
