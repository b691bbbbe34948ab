//! Explicit signed boundary matrices.
//!
//! The operators in this crate never build these,
//! but they're handy for checking results and for interop with sparse solvers.

use nalgebra_sparse as nas;

use crate::{error::LaplacianError, face_index::FaceIndex, simplex_range::SimplexRange};

/// Orientation of the face in position `t` of the boundary of a `k`-vertex simplex,
/// i.e. `(-1)^(k-1-t)`.
///
/// Positions follow [`SimplexView::boundary_ranks`][crate::simplex_range::SimplexView::boundary_ranks].
#[inline]
pub fn face_sign(k: usize, t: usize) -> f64 {
    if (k - 1 - t) % 2 == 0 {
        1.0
    } else {
        -1.0
    }
}

/// The signed boundary matrix of a sequence of cofaces,
/// with a row for every face in the index and a column for every coface.
///
/// Entry `(i, q)` is the orientation of face `i` in the boundary of coface `q`,
/// or zero if it isn't on that boundary.
/// Composing two consecutive boundary matrices gives zero.
pub fn boundary_matrix(
    cofaces: &SimplexRange,
    faces: &FaceIndex,
) -> Result<nas::CsrMatrix<f64>, LaplacianError> {
    let k = cofaces.simplex_size();
    if k == 0 {
        return Err(LaplacianError::DimensionMismatch {
            expected: 1,
            found: 0,
        });
    }
    let indices = faces.indices_of(cofaces)?;
    Ok(signed_boundary(faces.len(), cofaces.len(), k, &indices))
}

/// Boundary matrix from precomputed face indices, `k` per coface.
pub(crate) fn signed_boundary(
    rows: usize,
    cols: usize,
    k: usize,
    face_indices: &[usize],
) -> nas::CsrMatrix<f64> {
    let mut coo = nas::CooMatrix::new(rows, cols);
    for (q, faces) in face_indices.chunks_exact(k).enumerate() {
        for (t, &i) in faces.iter().enumerate() {
            coo.push(i, q, face_sign(k, t));
        }
    }
    nas::CsrMatrix::from(&coo)
}
