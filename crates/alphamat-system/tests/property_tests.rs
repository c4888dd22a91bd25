//! Property-based tests for the Laplacian builders and the assembler

use alphamat_ad::VjpOp;
use alphamat_sparse::CsrMatrix;
use alphamat_system::{
    assemble_system, color_mixture_laplacian, graph_laplacian, intra_unknown_laplacian,
    matting_laplacian, ColorMixtureGeometry, IntraUnknownGeometry, MattingGeometry,
    SystemInputs, INTRA_UNKNOWN_CHANNELS, WINDOW_FLOWS,
};
use proptest::prelude::*;
use scirs2_core::ndarray_ext::Array1;

/// 5×4 image: row-major, stride 5, interior windows at 6..=8 and 11..=13
const WIDTH: usize = 5;
const PIXELS: usize = 20;
const WINDOWS: [usize; 6] = [6, 7, 8, 11, 12, 13];

fn weights() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-2.0..2.0f64, PIXELS..=PIXELS)
}

fn assert_zero_row_sums(l: &CsrMatrix<f64>) -> Result<(), TestCaseError> {
    for s in l.row_sums().iter() {
        prop_assert!(s.abs() < 1e-5, "row sum {}", s);
    }
    Ok(())
}

proptest! {
    #[test]
    fn prop_graph_laplacian_rows_sum_to_zero(
        entries in prop::collection::vec((0..PIXELS, 0..PIXELS, -3.0..3.0f64), 0..60)
    ) {
        let rows: Vec<usize> = entries.iter().map(|e| e.0).collect();
        let cols: Vec<usize> = entries.iter().map(|e| e.1).collect();
        let vals: Vec<f64> = entries.iter().map(|e| e.2).collect();
        let w = CsrMatrix::from_coordinates(&rows, &cols, &vals, (PIXELS, PIXELS)).unwrap();

        let (l, _) = graph_laplacian(&w).unwrap();
        assert_zero_row_sums(&l)?;
    }

    #[test]
    fn prop_color_mixture_rows_sum_to_zero(
        w in weights(),
        affinities in prop::collection::vec((0..PIXELS, 0..PIXELS, 0.0..1.0f64), 1..40)
    ) {
        let geometry = ColorMixtureGeometry {
            rows: affinities.iter().map(|a| a.0).collect(),
            cols: affinities.iter().map(|a| a.1).collect(),
            values: affinities.iter().map(|a| a.2).collect(),
        };
        let w = Array1::from_vec(w);

        let (l, _) = color_mixture_laplacian(PIXELS, &geometry, &w.view()).unwrap();
        assert_zero_row_sums(&l)?;
    }

    #[test]
    fn prop_matting_rows_sum_to_zero(
        w in weights(),
        flows in prop::collection::vec(0.0..0.1f64, WINDOWS.len() * WINDOW_FLOWS)
    ) {
        let geometry = MattingGeometry {
            stride: WIDTH,
            in_ind: WINDOWS.to_vec(),
            flows,
        };
        let w = Array1::from_vec(w);

        let (l, _) = matting_laplacian(PIXELS, &geometry, &w.view()).unwrap();
        assert_zero_row_sums(&l)?;
    }

    #[test]
    fn prop_intra_unknown_rows_sum_to_zero(
        w in weights(),
        links in prop::collection::vec(
            (0..PIXELS, -1.0..1.0f64),
            WINDOWS.len() * INTRA_UNKNOWN_CHANNELS
        )
    ) {
        let geometry = IntraUnknownGeometry {
            in_ind: WINDOWS.to_vec(),
            neigh_ind: links.iter().map(|l| l.0).collect(),
            flows: links.iter().map(|l| l.1).collect(),
        };
        let w = Array1::from_vec(w);

        let (l, _) = intra_unknown_laplacian(PIXELS, &geometry, &w.view()).unwrap();
        assert_zero_row_sums(&l)?;
    }

    /// The builder VJP is linear in the cotangent
    #[test]
    fn prop_matting_vjp_linear(
        w in weights(),
        flows in prop::collection::vec(0.0..0.1f64, WINDOWS.len() * WINDOW_FLOWS),
        s in -2.0..2.0f64
    ) {
        let geometry = MattingGeometry {
            stride: WIDTH,
            in_ind: WINDOWS.to_vec(),
            flows,
        };
        let w = Array1::from_vec(w);
        let (l, ctx) = matting_laplacian(PIXELS, &geometry, &w.view()).unwrap();

        let dl = l.with_values((0..l.nnz()).map(|k| (k % 5) as f64 - 2.0).collect()).unwrap();
        let scaled = l.with_values(dl.values().iter().map(|v| s * v).collect()).unwrap();

        let g = ctx.vjp(&dl).unwrap();
        let gs = ctx.vjp(&scaled).unwrap();
        for (a, b) in g.iter().zip(gs.iter()) {
            prop_assert!((s * a - b).abs() < 1e-9);
        }
    }

    /// Symmetric Laplacians and diagonal constraints give a symmetric system
    #[test]
    fn prop_assembled_system_is_symmetric(
        w in weights(),
        ku in prop::collection::vec(0.0..1.0f64, PIXELS..=PIXELS),
        known in prop::collection::vec(prop::bool::ANY, PIXELS..=PIXELS),
        lambda in 0.0..100.0f64
    ) {
        let w = Array1::from_vec(w);
        let geometry = MattingGeometry {
            stride: WIDTH,
            in_ind: WINDOWS.to_vec(),
            flows: (0..WINDOWS.len() * WINDOW_FLOWS).map(|k| 0.001 * (k % 13) as f64).collect(),
        };
        let (lmat, _) = matting_laplacian(PIXELS, &geometry, &w.view()).unwrap();
        let zeros = CsrMatrix::zeros((PIXELS, PIXELS));

        let ku = Array1::from_vec(ku);
        let known: Array1<f64> = known.iter().map(|&k| if k { 1.0 } else { 0.0 }).collect();
        let ones = Array1::ones(PIXELS);

        let (system, _) = assemble_system(&SystemInputs {
            color_mixture: &zeros,
            matting: &lmat,
            intra_unknown: &zeros,
            ku_weights: ku.view(),
            k_to_u_conf: ones.view(),
            known: known.view(),
            k_to_u: ones.view(),
            lambda,
        })
        .unwrap();

        let dense = system.a.to_dense();
        for i in 0..PIXELS {
            for j in 0..PIXELS {
                prop_assert!((dense[[i, j]] - dense[[j, i]]).abs() < 1e-12);
            }
            let expected = ku[i] + lambda * known[i];
            prop_assert!((system.b[i] - expected).abs() < 1e-9);
        }
    }
}
