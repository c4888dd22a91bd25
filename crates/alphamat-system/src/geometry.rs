//! Per-sample geometry consumed by the Laplacian builders
//!
//! All neighbor indices and flow coefficients are precomputed outside this
//! crate. The types here only hold them and check that they are consistent
//! with the image size before any matrix is built.
//!
//! Pixels are addressed in row-major order, `index = y * width + x`, so a
//! vertical step moves the index by `width`. [`MattingGeometry::stride`] is
//! that step.

use alphamat_sparse::SparseError;
use crate::error::{SystemError, SystemResult};
use scirs2_core::ndarray_ext::Array1;
use scirs2_core::numeric::Float;

/// Pixels in a matting window (3×3)
pub const WINDOW_PIXELS: usize = 9;

/// Flow coefficients per matting window (one per ordered neighbor pair)
pub const WINDOW_FLOWS: usize = WINDOW_PIXELS * WINDOW_PIXELS;

/// Flow channels supplied per pixel for the intra-unknown term
pub const INTRA_UNKNOWN_CHANNELS: usize = 6;

/// Flow channels actually used by the intra-unknown builder
///
/// The last supplied channel is malformed upstream and is ignored.
pub const INTRA_UNKNOWN_USED_CHANNELS: usize = 5;

/// Color-mixture affinities as raw `(row, col, value)` triplets
#[derive(Debug, Clone, PartialEq)]
pub struct ColorMixtureGeometry<T> {
    pub rows: Vec<usize>,
    pub cols: Vec<usize>,
    pub values: Vec<T>,
}

impl<T> ColorMixtureGeometry<T> {
    /// Number of triplets
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if there are no triplets
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Local (3×3 window) matting affinities
///
/// `flows[m * 81 + i * 9 + j]` is the affinity between neighbors `i` and `j`
/// of window `m`, where the neighbors of a window centred on pixel `c` are,
/// in order,
///
/// ```text
/// c−1−s, c−1, c−1+s, c−s, c, c+s, c+1−s, c+1, c+1+s
/// ```
///
/// with `s` the [`stride`](Self::stride).
#[derive(Debug, Clone, PartialEq)]
pub struct MattingGeometry<T> {
    /// Index step between vertically adjacent pixels (the image width)
    pub stride: usize,
    /// Centre pixel of each window
    pub in_ind: Vec<usize>,
    /// `WINDOW_FLOWS` coefficients per window
    pub flows: Vec<T>,
}

impl<T> MattingGeometry<T> {
    /// Number of windows
    pub fn windows(&self) -> usize {
        self.in_ind.len()
    }

    /// The nine pixels of the window centred on `centre`
    ///
    /// `None` if the window would leave the index range `[0, pixels)`.
    pub fn neighbors(&self, centre: usize, pixels: usize) -> Option<[usize; WINDOW_PIXELS]> {
        let s = self.stride;
        let lo = centre.checked_sub(1 + s)?;
        let hi = centre.checked_add(1 + s)?;
        if hi >= pixels {
            return None;
        }

        Some([
            lo,
            centre - 1,
            centre - 1 + s,
            centre - s,
            centre,
            centre + s,
            centre + 1 - s,
            centre + 1,
            hi,
        ])
    }

    /// Check window count, flow length and that every window fits
    pub fn validate(&self, pixels: usize) -> SystemResult<()> {
        if self.stride == 0 {
            return Err(SystemError::geometry("matting stride must be positive"));
        }

        let expected = self.windows() * WINDOW_FLOWS;
        if self.flows.len() != expected {
            return Err(SystemError::geometry(format!(
                "matting flows have {} coefficients, expected {} for {} windows",
                self.flows.len(),
                expected,
                self.windows()
            )));
        }

        for &centre in &self.in_ind {
            if self.neighbors(centre, pixels).is_none() {
                return Err(SystemError::geometry(format!(
                    "matting window centred on pixel {} leaves the {}-pixel image",
                    centre, pixels
                )));
            }
        }

        Ok(())
    }
}

/// Intra-unknown affinities: a handful of flow links per unknown pixel
///
/// Row-major `(windows, INTRA_UNKNOWN_CHANNELS)` layout for both `neigh_ind`
/// and `flows`.
#[derive(Debug, Clone, PartialEq)]
pub struct IntraUnknownGeometry<T> {
    pub in_ind: Vec<usize>,
    pub neigh_ind: Vec<usize>,
    pub flows: Vec<T>,
}

impl<T> IntraUnknownGeometry<T> {
    /// Number of source pixels
    pub fn sources(&self) -> usize {
        self.in_ind.len()
    }

    /// Check array lengths and index ranges of the used channels
    pub fn validate(&self, pixels: usize) -> SystemResult<()> {
        let expected = self.sources() * INTRA_UNKNOWN_CHANNELS;
        if self.neigh_ind.len() != expected || self.flows.len() != expected {
            return Err(SystemError::geometry(format!(
                "intra-unknown arrays have {} neighbors and {} flows, expected {} each",
                self.neigh_ind.len(),
                self.flows.len(),
                expected
            )));
        }

        for (m, &source) in self.in_ind.iter().enumerate() {
            if source >= pixels {
                return Err(SystemError::geometry(format!(
                    "intra-unknown source {} out of range for {} pixels",
                    source, pixels
                )));
            }
            let base = m * INTRA_UNKNOWN_CHANNELS;
            for &neighbor in &self.neigh_ind[base..base + INTRA_UNKNOWN_USED_CHANNELS] {
                if neighbor >= pixels {
                    return Err(SystemError::geometry(format!(
                        "intra-unknown neighbor {} out of range for {} pixels",
                        neighbor, pixels
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Everything the system needs to know about one image
#[derive(Debug, Clone)]
pub struct MattingSample<T> {
    pub width: usize,
    pub height: usize,
    pub color_mixture: ColorMixtureGeometry<T>,
    pub matting: MattingGeometry<T>,
    pub intra_unknown: IntraUnknownGeometry<T>,
    /// 1 for pixels whose opacity is known from the trimap, else 0
    pub known: Array1<T>,
    /// Confidence of the known-to-unknown estimate
    pub k_to_u_conf: Array1<T>,
    /// Known-to-unknown opacity estimate (the right-hand side target)
    pub k_to_u: Array1<T>,
}

impl<T: Float> MattingSample<T> {
    /// Pixel count `N`
    pub fn pixels(&self) -> usize {
        self.width * self.height
    }

    /// Check every per-pixel array and the three geometries against `N`
    pub fn validate(&self) -> SystemResult<()> {
        let n = self.pixels();
        check_len("known", &self.known, n)?;
        check_len("k_to_u_conf", &self.k_to_u_conf, n)?;
        check_len("k_to_u", &self.k_to_u, n)?;

        if self.matting.stride != self.width {
            return Err(SystemError::geometry(format!(
                "matting stride {} does not match image width {}",
                self.matting.stride, self.width
            )));
        }

        self.matting.validate(n)?;
        self.intra_unknown.validate(n)
    }
}

/// The four per-pixel weight vectors produced by the feature front end
#[derive(Debug, Clone, PartialEq)]
pub struct PixelWeights<T> {
    pub color_mixture: Array1<T>,
    pub matting: Array1<T>,
    pub intra_unknown: Array1<T>,
    pub known_to_unknown: Array1<T>,
}

impl<T: Float> PixelWeights<T> {
    /// Spatially constant weights
    pub fn constant(
        pixels: usize,
        color_mixture: T,
        matting: T,
        intra_unknown: T,
        known_to_unknown: T,
    ) -> Self {
        Self {
            color_mixture: Array1::from_elem(pixels, color_mixture),
            matting: Array1::from_elem(pixels, matting),
            intra_unknown: Array1::from_elem(pixels, intra_unknown),
            known_to_unknown: Array1::from_elem(pixels, known_to_unknown),
        }
    }

    pub fn validate(&self, pixels: usize) -> SystemResult<()> {
        check_len("color_mixture weights", &self.color_mixture, pixels)?;
        check_len("matting weights", &self.matting, pixels)?;
        check_len("intra_unknown weights", &self.intra_unknown, pixels)?;
        check_len("known_to_unknown weights", &self.known_to_unknown, pixels)
    }
}

pub(crate) fn check_len<T>(what: &'static str, v: &Array1<T>, expected: usize) -> SystemResult<()> {
    if v.len() != expected {
        return Err(SparseError::LengthMismatch {
            what,
            expected,
            got: v.len(),
        }
        .into());
    }
    Ok(())
}
