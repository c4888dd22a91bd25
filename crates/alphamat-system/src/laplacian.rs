//! Graph Laplacian builders
//!
//! Three weighted Laplacians make up the matting system:
//!
//! - **color mixture**: `W = diag(w)·W0` over externally supplied affinities,
//!   `L0 = diag(W·1) − W`, output `L0ᵀ·L0` (a normal-equations product, not
//!   a symmetrized `W`)
//! - **matting**: 3×3 window affinities scaled by the centre pixel's weight,
//!   symmetrized as `½(W + Wᵀ)`, output `diag(Ws·1) − Ws`
//! - **intra-unknown**: five flow links per unknown pixel, symmetrized and
//!   turned into a Laplacian the same way
//!
//! Every output has zero row sums. Each builder returns the Laplacian together
//! with a VJP context mapping `dL` (on the Laplacian's pattern) to the
//! gradient of its per-pixel weight vector.

use alphamat_ad::{AddVjp, DiagonalVjp, FromCooVjp, SpMvVjp, SpSpMmVjp, TransposeVjp, VjpOp};
use alphamat_sparse::{sparse_add, sparse_add_scaled, CooMatrix, CsrMatrix, SparseError};
use crate::error::{SystemError, SystemResult};
use crate::geometry::{
    ColorMixtureGeometry, IntraUnknownGeometry, MattingGeometry, INTRA_UNKNOWN_CHANNELS,
    INTRA_UNKNOWN_USED_CHANNELS, WINDOW_FLOWS, WINDOW_PIXELS,
};
use log::debug;
use scirs2_core::ndarray_ext::{Array1, ArrayView1};
use scirs2_core::numeric::Float;
use std::collections::HashMap;

/// VJP context for `L = diag(W·1) − W`
#[derive(Debug, Clone)]
pub struct GraphLaplacianVjp<T> {
    row_sums: SpMvVjp<T>,
    degree: DiagonalVjp<T>,
    difference: AddVjp<T>,
}

/// Graph Laplacian `diag(W·1) − W` of a square affinity matrix
///
/// The degree vector is differentiated too: `dW` collects both the direct
/// `−dL` term and the row-sum term `dL_ii` broadcast along row `i`.
///
/// # Errors
///
/// `ShapeMismatch` if `W` is not square.
pub fn graph_laplacian<T: Float>(
    w: &CsrMatrix<T>,
) -> SystemResult<(CsrMatrix<T>, GraphLaplacianVjp<T>)> {
    let ones = Array1::<T>::ones(w.ncols());
    let d = w.spmv(&ones.view())?;
    let (dmat, degree) = DiagonalVjp::forward(&d.view());
    let l = sparse_add_scaled(&dmat, w, T::one(), -T::one())?;

    let ctx = GraphLaplacianVjp {
        row_sums: SpMvVjp::new(w.clone(), ones),
        degree,
        difference: AddVjp::new(dmat, w.clone(), T::one(), -T::one()),
    };
    Ok((l, ctx))
}

impl<T: Float> VjpOp<T> for GraphLaplacianVjp<T> {
    type Cotangent = CsrMatrix<T>;
    type Grads = CsrMatrix<T>;

    fn vjp(&self, output_grad: &CsrMatrix<T>) -> anyhow::Result<CsrMatrix<T>> {
        let difference = self.difference.vjp(output_grad)?;
        let dd = self.degree.vjp(&difference.grad_a)?;
        let row_sums = self.row_sums.vjp(&dd)?;
        Ok(sparse_add(&row_sums.grad_matrix, &difference.grad_b)?)
    }
}

/// VJP context for [`color_mixture_laplacian`]
#[derive(Debug, Clone)]
pub struct ColorMixtureVjp<T> {
    weights: DiagonalVjp<T>,
    scaling: SpSpMmVjp<T>,
    laplacian: GraphLaplacianVjp<T>,
    transpose: TransposeVjp<T>,
    normal: SpSpMmVjp<T>,
}

/// Color-mixture Laplacian `L0ᵀ·L0` with `L0 = laplacian(diag(w)·W0)`
///
/// # Errors
///
/// `LengthMismatch` if `weights` does not have `pixels` entries, and any
/// structural error from building `W0` out of the geometry's triplets.
pub fn color_mixture_laplacian<T: Float>(
    pixels: usize,
    geometry: &ColorMixtureGeometry<T>,
    weights: &ArrayView1<T>,
) -> SystemResult<(CsrMatrix<T>, ColorMixtureVjp<T>)> {
    check_weights("color_mixture weights", weights, pixels)?;

    let w0 = CsrMatrix::from_coordinates(
        &geometry.rows,
        &geometry.cols,
        &geometry.values,
        (pixels, pixels),
    )?;
    let (dw, weights_ctx) = DiagonalVjp::forward(weights);
    let w = dw.spspmm(&w0)?;
    let (l0, laplacian) = graph_laplacian(&w)?;
    let (l0t, transpose) = TransposeVjp::forward(&l0);
    let lcm = l0t.spspmm(&l0)?;

    debug!(
        "color mixture Laplacian: {} affinities, nnz = {}",
        geometry.len(),
        lcm.nnz()
    );

    let ctx = ColorMixtureVjp {
        weights: weights_ctx,
        scaling: SpSpMmVjp::new(dw, w0),
        laplacian,
        transpose,
        normal: SpSpMmVjp::new(l0t, l0),
    };
    Ok((lcm, ctx))
}

impl<T: Float> VjpOp<T> for ColorMixtureVjp<T> {
    type Cotangent = CsrMatrix<T>;
    type Grads = Array1<T>;

    fn vjp(&self, output_grad: &CsrMatrix<T>) -> anyhow::Result<Array1<T>> {
        // L0 enters the product twice, once through its transpose
        let normal = self.normal.vjp(output_grad)?;
        let through_transpose = self.transpose.vjp(&normal.grad_a)?;
        let dl0 = sparse_add(&normal.grad_b, &through_transpose)?;

        let dw = self.laplacian.vjp(&dl0)?;
        let scaling = self.scaling.vjp(&dw)?;
        self.weights.vjp(&scaling.grad_a)
    }
}

/// VJP context shared by the matting and intra-unknown builders
///
/// Both build `W` from triplets whose values are a fixed coefficient times
/// the weight of a "centre" pixel, then symmetrize and take the Laplacian.
#[derive(Debug, Clone)]
pub struct WeightedTripletVjp<T> {
    pixels: usize,
    /// Pixel whose weight scales each triplet
    centres: Vec<usize>,
    coefficients: Vec<T>,
    /// Merged entry each triplet was accumulated into
    slots: Vec<usize>,
    entries: FromCooVjp<T>,
    transpose: TransposeVjp<T>,
    symmetrize: AddVjp<T>,
    laplacian: GraphLaplacianVjp<T>,
}

/// VJP context for [`matting_laplacian`]
pub type MattingLaplacianVjp<T> = WeightedTripletVjp<T>;

/// VJP context for [`intra_unknown_laplacian`]
pub type IntraUnknownVjp<T> = WeightedTripletVjp<T>;

/// Weighted triplets, before merging
struct Triplets<T> {
    rows: Vec<usize>,
    cols: Vec<usize>,
    centres: Vec<usize>,
    coefficients: Vec<T>,
}

impl<T> Triplets<T> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
            cols: Vec::with_capacity(capacity),
            centres: Vec::with_capacity(capacity),
            coefficients: Vec::with_capacity(capacity),
        }
    }

    fn push(&mut self, row: usize, col: usize, centre: usize, coefficient: T) {
        self.rows.push(row);
        self.cols.push(col);
        self.centres.push(centre);
        self.coefficients.push(coefficient);
    }
}

/// Matting Laplacian from 3×3 window affinities
///
/// All 81 neighbor pairs of every window contribute; pairs that land on the
/// same matrix entry are merged before the matrix is built, so each entry is
/// constructed once.
///
/// # Errors
///
/// `Geometry` if a window leaves the image or the flow array has the wrong
/// length, `LengthMismatch` if `weights` does not have `pixels` entries.
pub fn matting_laplacian<T: Float>(
    pixels: usize,
    geometry: &MattingGeometry<T>,
    weights: &ArrayView1<T>,
) -> SystemResult<(CsrMatrix<T>, MattingLaplacianVjp<T>)> {
    check_weights("matting weights", weights, pixels)?;
    geometry.validate(pixels)?;

    let mut triplets = Triplets::with_capacity(geometry.windows() * WINDOW_FLOWS);
    for (m, &centre) in geometry.in_ind.iter().enumerate() {
        let neighbors = geometry
            .neighbors(centre, pixels)
            .ok_or_else(|| SystemError::geometry("matting window leaves the image"))?;
        let flows = &geometry.flows[m * WINDOW_FLOWS..(m + 1) * WINDOW_FLOWS];

        for i in 0..WINDOW_PIXELS {
            for j in 0..WINDOW_PIXELS {
                triplets.push(
                    neighbors[i],
                    neighbors[j],
                    centre,
                    flows[i * WINDOW_PIXELS + j],
                );
            }
        }
    }

    symmetric_triplet_laplacian(pixels, triplets, weights)
}

/// Intra-unknown Laplacian from per-pixel flow links
///
/// Only the first five of the six supplied channels are used.
///
/// # Errors
///
/// `Geometry` on malformed neighbor/flow arrays, `LengthMismatch` if
/// `weights` does not have `pixels` entries.
pub fn intra_unknown_laplacian<T: Float>(
    pixels: usize,
    geometry: &IntraUnknownGeometry<T>,
    weights: &ArrayView1<T>,
) -> SystemResult<(CsrMatrix<T>, IntraUnknownVjp<T>)> {
    check_weights("intra_unknown weights", weights, pixels)?;
    geometry.validate(pixels)?;

    let mut triplets =
        Triplets::with_capacity(geometry.sources() * INTRA_UNKNOWN_USED_CHANNELS);
    for (m, &source) in geometry.in_ind.iter().enumerate() {
        let base = m * INTRA_UNKNOWN_CHANNELS;
        for c in base..base + INTRA_UNKNOWN_USED_CHANNELS {
            triplets.push(source, geometry.neigh_ind[c], source, geometry.flows[c]);
        }
    }

    symmetric_triplet_laplacian(pixels, triplets, weights)
}

/// `laplacian(½(W + Wᵀ))` where `W` sums `coefficient·weights[centre]` per entry
fn symmetric_triplet_laplacian<T: Float>(
    pixels: usize,
    triplets: Triplets<T>,
    weights: &ArrayView1<T>,
) -> SystemResult<(CsrMatrix<T>, WeightedTripletVjp<T>)> {
    let mut positions: HashMap<(usize, usize), usize> = HashMap::new();
    let mut rows = Vec::new();
    let mut cols = Vec::new();
    let mut values: Vec<T> = Vec::new();
    let mut slots = Vec::with_capacity(triplets.rows.len());

    for t in 0..triplets.rows.len() {
        let key = (triplets.rows[t], triplets.cols[t]);
        let slot = *positions.entry(key).or_insert_with(|| {
            rows.push(key.0);
            cols.push(key.1);
            values.push(T::zero());
            values.len() - 1
        });
        values[slot] = values[slot] + triplets.coefficients[t] * weights[triplets.centres[t]];
        slots.push(slot);
    }

    let (w, map) = CooMatrix::new(rows, cols, values, (pixels, pixels))?.to_csr_with_map();
    let entries = FromCooVjp {
        output: w.clone(),
        map,
    };

    let half = (T::one() + T::one()).recip();
    let (wt, transpose) = TransposeVjp::forward(&w);
    let ws = sparse_add_scaled(&w, &wt, half, half)?;
    let symmetrize = AddVjp::new(w, wt, half, half);
    let (l, laplacian) = graph_laplacian(&ws)?;

    debug!(
        "weighted Laplacian: {} triplets merged into {} entries, nnz = {}",
        triplets.rows.len(),
        entries.output.nnz(),
        l.nnz()
    );

    let ctx = WeightedTripletVjp {
        pixels,
        centres: triplets.centres,
        coefficients: triplets.coefficients,
        slots,
        entries,
        transpose,
        symmetrize,
        laplacian,
    };
    Ok((l, ctx))
}

impl<T: Float> VjpOp<T> for WeightedTripletVjp<T> {
    type Cotangent = CsrMatrix<T>;
    type Grads = Array1<T>;

    fn vjp(&self, output_grad: &CsrMatrix<T>) -> anyhow::Result<Array1<T>> {
        let dws = self.laplacian.vjp(output_grad)?;
        let symmetrize = self.symmetrize.vjp(&dws)?;
        let through_transpose = self.transpose.vjp(&symmetrize.grad_b)?;
        let dw = sparse_add(&symmetrize.grad_a, &through_transpose)?;
        let dentries = self.entries.vjp(&dw)?;

        let mut grad = Array1::<T>::zeros(self.pixels);
        for ((&centre, &coefficient), &slot) in self
            .centres
            .iter()
            .zip(&self.coefficients)
            .zip(&self.slots)
        {
            grad[centre] = grad[centre] + coefficient * dentries[slot];
        }
        Ok(grad)
    }
}

fn check_weights<T>(
    what: &'static str,
    weights: &ArrayView1<T>,
    pixels: usize,
) -> SystemResult<()> {
    if weights.len() != pixels {
        return Err(SparseError::LengthMismatch {
            what,
            expected: pixels,
            got: weights.len(),
        }
        .into());
    }
    Ok(())
}
