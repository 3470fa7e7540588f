// Extent math and tile splitting

use std::fmt;

use crate::grid::GridSpec;
use crate::{RasterError, RasterResult};

/// An axis-aligned rectangle in the coordinate units of a spatial reference system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    xmin: f64,
    ymin: f64,
    xmax: f64,
    ymax: f64,
}

impl Extent {
    /// Creates an extent from its minimum and maximum corners.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidArgument`] if a coordinate is not finite or the
    /// rectangle has zero (or negative) width or height.
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> RasterResult<Self> {
        if ![xmin, ymin, xmax, ymax].iter().all(|v| v.is_finite()) {
            return Err(RasterError::invalid(format!(
                "extent has non-finite coordinates: [{xmin}, {ymin}, {xmax}, {ymax}]"
            )));
        }
        if xmin >= xmax || ymin >= ymax {
            return Err(RasterError::invalid(format!(
                "degenerate extent: [{xmin}, {ymin}, {xmax}, {ymax}]"
            )));
        }
        Ok(Self {
            xmin,
            ymin,
            xmax,
            ymax,
        })
    }

    #[must_use]
    pub fn xmin(&self) -> f64 {
        self.xmin
    }

    #[must_use]
    pub fn ymin(&self) -> f64 {
        self.ymin
    }

    #[must_use]
    pub fn xmax(&self) -> f64 {
        self.xmax
    }

    #[must_use]
    pub fn ymax(&self) -> f64 {
        self.ymax
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// Returns `[xmin, ymin, xmax, ymax]`, the order `gdalwarp -te` expects.
    #[must_use]
    pub fn to_array(&self) -> [f64; 4] {
        [self.xmin, self.ymin, self.xmax, self.ymax]
    }

    /// Whether the two interiors overlap. Shared edges do not count.
    #[must_use]
    pub fn overlaps(&self, other: &Extent) -> bool {
        self.xmin < other.xmax
            && other.xmin < self.xmax
            && self.ymin < other.ymax
            && other.ymin < self.ymax
    }

    /// Splits the extent into `ceil(sqrt(n))²` equally sized tiles.
    ///
    /// Tiles are ordered x-chunk first: every y-chunk (south to north) of the
    /// western-most column, then the next column, and so on. When `n` is not a
    /// perfect square more than `n` tiles are returned.
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidArgument`] if `n` is zero.
    pub fn split(&self, n: usize) -> RasterResult<Vec<Extent>> {
        let k = chunks_per_axis(n)?;
        let xs = even_edges(self.xmin, self.xmax, k);
        let ys = even_edges(self.ymin, self.ymax, k);
        Ok(combine(&xs, &ys))
    }

    /// Splits the extent of `grid` so that every tile boundary falls on a pixel edge.
    ///
    /// Pixels are distributed like an array split: with `p` pixels along an axis
    /// and `k` chunks, the first `p % k` chunks receive one extra pixel. Ordering
    /// matches [`Extent::split`].
    ///
    /// # Errors
    ///
    /// Returns [`RasterError::InvalidArgument`] if `n` is zero, if an axis has fewer
    /// pixels than chunks, or if the grid is rotated.
    pub fn split_aligned(grid: &GridSpec, n: usize) -> RasterResult<Vec<Extent>> {
        let k = chunks_per_axis(n)?;
        if grid.is_rotated() {
            return Err(RasterError::invalid(
                "pixel-aligned splitting requires a north-up grid",
            ));
        }
        if grid.width() < k || grid.height() < k {
            return Err(RasterError::invalid(format!(
                "cannot split a {}x{} grid into {k} chunks per axis",
                grid.width(),
                grid.height()
            )));
        }

        let full = grid.extent()?;
        let pixel_width = grid.pixel_width().abs();
        let pixel_height = grid.pixel_height().abs();

        let xs = pixel_edges(grid.width(), k)
            .into_iter()
            .map(|px| full.xmin + px as f64 * pixel_width)
            .collect::<Vec<_>>();
        // Rows count down from the top edge; flip so the edges ascend.
        let ys = pixel_edges(grid.height(), k)
            .into_iter()
            .rev()
            .map(|px| full.ymax - px as f64 * pixel_height)
            .collect::<Vec<_>>();
        Ok(combine(&pin_ends(xs, full.xmin, full.xmax), &pin_ends(ys, full.ymin, full.ymax)))
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.xmin, self.ymin, self.xmax, self.ymax
        )
    }
}

/// Splits `extent` into `ceil(sqrt(n))²` tiles. See [`Extent::split`].
///
/// # Errors
///
/// Returns [`RasterError::InvalidArgument`] if `n` is zero.
pub fn split_extent(extent: &Extent, n: usize) -> RasterResult<Vec<Extent>> {
    extent.split(n)
}

fn chunks_per_axis(n: usize) -> RasterResult<usize> {
    if n == 0 {
        return Err(RasterError::invalid("tile count must be at least 1"));
    }
    // Integer ceil(sqrt(n)) avoids float rounding on perfect squares.
    let mut k = n.isqrt();
    if k * k < n {
        k += 1;
    }
    Ok(k)
}

#[allow(clippy::cast_precision_loss)]
fn even_edges(min: f64, max: f64, k: usize) -> Vec<f64> {
    let step = (max - min) / k as f64;
    let mut edges: Vec<f64> = (0..k).map(|i| min + step * i as f64).collect();
    edges.push(max);
    edges
}

/// Pixel offsets of the `k + 1` chunk edges for an axis of `pixels` pixels.
fn pixel_edges(pixels: usize, k: usize) -> Vec<usize> {
    let base = pixels / k;
    let extra = pixels % k;
    let mut edges = Vec::with_capacity(k + 1);
    let mut offset = 0;
    edges.push(offset);
    for chunk in 0..k {
        offset += base + usize::from(chunk < extra);
        edges.push(offset);
    }
    edges
}

/// Replaces the outer edges with the exact extent bounds.
fn pin_ends(mut edges: Vec<f64>, min: f64, max: f64) -> Vec<f64> {
    if let Some(first) = edges.first_mut() {
        *first = min;
    }
    if let Some(last) = edges.last_mut() {
        *last = max;
    }
    edges
}

fn combine(xs: &[f64], ys: &[f64]) -> Vec<Extent> {
    let mut extents = Vec::with_capacity((xs.len() - 1) * (ys.len() - 1));
    for x in xs.windows(2) {
        for y in ys.windows(2) {
            extents.push(Extent {
                xmin: x[0],
                ymin: y[0],
                xmax: x[1],
                ymax: y[1],
            });
        }
    }
    extents
}
