//! Matrix-free weighted up-Laplacian operators.
//!
//! An [`UpLaplacian<P>`] acts on values attached to the `P`-dimensional faces
//! of a set of `P + 1`-dimensional cofaces.
//! With face weights `fpl`, `fpr` and coface weights `fq` it computes
//! ```text
//! y = diag(fpl) D diag(fq) Dᵀ diag(fpr) x
//! ```
//! where `D` is the signed boundary matrix of the cofaces
//! (see [`boundary_matrix`][crate::boundary::boundary_matrix]),
//! without ever building `D` or the product.
//! With unit weights and `P = 0` this is the graph Laplacian `deg - adj`
//! of the graph whose edges are the cofaces.
//!
//! ```
//! # use rankplex::{GraphLaplacian, LinearOperator, Order, SimplexRange};
//! // the path graph 0 - 1 - 2
//! let edges = SimplexRange::from_simplices(3, 2, Order::Colex, &[0, 1, 1, 2]).unwrap();
//! let lap = GraphLaplacian::new(edges, 0).unwrap();
//! let mut y = vec![0.0; 3];
//! lap.apply_into(&[1.0, 0.0, 0.0], &mut y).unwrap();
//! assert_eq!(y, vec![1.0, -1.0, 0.0]);
//! ```

use fixedbitset as fb;
use nalgebra as na;
use nalgebra_sparse as nas;

use itertools::{izip, Itertools};

use crate::{error::LaplacianError, face_index::FaceIndex, simplex_range::SimplexRange};

//
// traits
//

/// A square or rectangular linear operator applied to flat `f64` buffers.
pub trait LinearOperator {
    /// Number of (rows, columns).
    fn shape(&self) -> (usize, usize);

    /// Compute `y = A x`, overwriting `y`.
    ///
    /// On error `y` is left untouched.
    fn apply_into(&self, x: &[f64], y: &mut [f64]) -> Result<(), LaplacianError>;

    /// Compute `A x` into a newly allocated vector.
    fn apply(&self, x: &na::DVector<f64>) -> Result<na::DVector<f64>, LaplacianError> {
        let mut y = na::DVector::zeros(self.shape().0);
        self.apply_into(x.as_slice(), y.as_mut_slice())?;
        Ok(y)
    }

    /// Build the operator as an explicit sparse matrix.
    fn to_csr(&self) -> nas::CsrMatrix<f64>;
}

//
// up-Laplacian
//

/// The weighted up-Laplacian of `P`-faces, induced by a sequence of `P + 1`-cofaces.
///
/// Construction discovers the faces of the cofaces,
/// assigns them dense indices in ascending rank order,
/// precomputes the face indices of every coface
/// and the weighted degrees with unit weights.
/// After that every application costs time linear in the number of cofaces
/// and never touches the combinatorial ranks again.
///
/// Weights can be changed between applications,
/// but the degrees are **not** updated automatically:
/// call [`precompute_degree`][Self::precompute_degree] after changing weights.
/// The operator cannot detect stale degrees.
///
/// [`apply_into`][LinearOperator::apply_into] only reads the operator
/// and can be called concurrently with separate output buffers.
/// [`matvec`][Self::matvec] instead reuses a workspace owned by the operator.
#[derive(Clone, Debug)]
pub struct UpLaplacian<const P: usize> {
    cofaces: SimplexRange,
    faces: FaceIndex,
    /// number of rows and columns,
    /// at least the number of indexed faces
    np: usize,
    /// `P + 2` face indices per coface, in boundary order
    face_indices: Vec<usize>,
    /// left face weights
    fpl: na::DVector<f64>,
    /// right face weights
    fpr: na::DVector<f64>,
    /// coface weights
    fq: na::DVector<f64>,
    degrees: na::DVector<f64>,
    /// rows forced to zero on application
    excluded: fb::FixedBitSet,
    workspace: Vec<f64>,
}

/// The graph Laplacian of vertices, induced by edges.
pub type GraphLaplacian = UpLaplacian<0>;
/// The up-Laplacian of edges, induced by triangles.
pub type EdgeLaplacian = UpLaplacian<1>;

impl<const P: usize> UpLaplacian<P> {
    /// Number of vertices in each coface.
    const COFACE_SIZE: usize = P + 2;

    /// Construct the operator from its cofaces.
    ///
    /// The operator has a row and column for each distinct boundary face,
    /// padded up to `min_faces` rows and columns
    /// to make room for faces without cofaces.
    /// Padding rows are zero; they are only meaningful to the caller.
    pub fn new(cofaces: SimplexRange, min_faces: usize) -> Result<Self, LaplacianError> {
        Self::check_coface_size(&cofaces)?;
        let faces = FaceIndex::from_cofaces(&cofaces);
        Self::build(cofaces, faces, min_faces)
    }

    /// Construct the operator with a caller-provided face index,
    /// e.g. one that also contains faces without cofaces.
    ///
    /// Every boundary face of every coface must be in the index.
    pub fn with_face_index(cofaces: SimplexRange, faces: FaceIndex) -> Result<Self, LaplacianError> {
        Self::check_coface_size(&cofaces)?;
        let face_ranker = crate::combinatorial::Ranker::new(cofaces.n(), P + 1, cofaces.order())?;
        for &rank in faces.ranks() {
            face_ranker.check_rank(rank)?;
        }
        Self::build(cofaces, faces, 0)
    }

    fn check_coface_size(cofaces: &SimplexRange) -> Result<(), LaplacianError> {
        if cofaces.simplex_size() != Self::COFACE_SIZE {
            return Err(LaplacianError::DimensionMismatch {
                expected: Self::COFACE_SIZE,
                found: cofaces.simplex_size(),
            });
        }
        Ok(())
    }

    fn build(
        cofaces: SimplexRange,
        faces: FaceIndex,
        min_faces: usize,
    ) -> Result<Self, LaplacianError> {
        let max_faces = cofaces.ranker().table().choose(cofaces.n(), P + 1);
        if min_faces as u64 > max_faces {
            return Err(LaplacianError::FaceBound {
                requested: min_faces,
                max: max_faces,
            });
        }

        let face_indices = precompute_indices::<P>(&cofaces, &faces)?;
        let np = faces.len().max(min_faces);
        let nq = cofaces.len();
        log::debug!(
            "built {}-up-Laplacian: {} faces ({} discovered), {} cofaces",
            P,
            np,
            faces.len(),
            nq
        );

        let mut lap = Self {
            cofaces,
            faces,
            np,
            face_indices,
            fpl: na::DVector::from_element(np, 1.0),
            fpr: na::DVector::from_element(np, 1.0),
            fq: na::DVector::from_element(nq, 1.0),
            degrees: na::DVector::zeros(np),
            excluded: fb::FixedBitSet::with_capacity(np),
            workspace: vec![0.0; np],
        };
        lap.precompute_degree()?;
        Ok(lap)
    }

    /// Force a set of rows (by dense face index) to zero whenever the operator is applied,
    /// e.g. for boundary conditions.
    pub fn exclude_faces(
        mut self,
        indices: impl IntoIterator<Item = usize>,
    ) -> Result<Self, LaplacianError> {
        for index in indices {
            if index >= self.np {
                return Err(LaplacianError::FaceOutOfBounds {
                    index,
                    len: self.np,
                });
            }
            self.excluded.insert(index);
        }
        Ok(self)
    }

    /// Replace the cofaces while keeping the face index and face weights.
    ///
    /// Every boundary face of the new cofaces must already be indexed;
    /// otherwise an [`UnknownFace`][LaplacianError::UnknownFace] error is returned
    /// and the operator is left unchanged.
    /// Coface weights are reset to 1 if the number of cofaces changes,
    /// and the degrees are recomputed.
    pub fn set_cofaces(&mut self, cofaces: SimplexRange) -> Result<(), LaplacianError> {
        Self::check_coface_size(&cofaces)?;
        if cofaces.n() != self.cofaces.n() || cofaces.order() != self.cofaces.order() {
            // ranks of a different vertex set or order would silently alias
            return Err(LaplacianError::IncompatibleRanks {
                expected_n: self.cofaces.n(),
                expected_order: self.cofaces.order(),
                found_n: cofaces.n(),
                found_order: cofaces.order(),
            });
        }
        let face_indices = precompute_indices::<P>(&cofaces, &self.faces)?;
        if cofaces.len() != self.fq.len() {
            self.fq = na::DVector::from_element(cofaces.len(), 1.0);
        }
        self.cofaces = cofaces;
        self.face_indices = face_indices;
        self.precompute_degree()
    }

    /// Re-derive the face indices of every coface from their ranks.
    pub fn precompute_indices(&mut self) -> Result<(), LaplacianError> {
        self.face_indices = precompute_indices::<P>(&self.cofaces, &self.faces)?;
        Ok(())
    }

    /// Recompute the weighted degrees from the current weights.
    ///
    /// `degrees[i]` is the sum of `fpl[i] * fq[q] * fpr[i]`
    /// over the cofaces `q` that have face `i` on their boundary.
    pub fn precompute_degree(&mut self) -> Result<(), LaplacianError> {
        self.check_weights()?;
        self.degrees.fill(0.0);
        for (q, faces) in self.face_indices.chunks_exact(Self::COFACE_SIZE).enumerate() {
            let fq = self.fq[q];
            for &i in faces {
                self.degrees[i] += self.fpl[i] * fq * self.fpr[i];
            }
        }
        log::debug!("recomputed degrees of {} faces", self.np);
        Ok(())
    }

    /// Compute `L x` into a workspace owned by the operator
    /// and return a view of the result.
    ///
    /// This avoids allocating on every call,
    /// at the cost of needing exclusive access to the operator.
    pub fn matvec(&mut self, x: &[f64]) -> Result<&[f64], LaplacianError> {
        let mut y = std::mem::take(&mut self.workspace);
        let res = self.apply_into(x, &mut y);
        self.workspace = y;
        res?;
        Ok(&self.workspace)
    }

    //
    // weights
    //

    /// Set the left face weights `fpl`.
    pub fn set_left_weights(&mut self, weights: &[f64]) -> Result<(), LaplacianError> {
        check_len("left face weights", self.np, weights.len())?;
        self.fpl.copy_from_slice(weights);
        Ok(())
    }

    /// Set the right face weights `fpr`.
    pub fn set_right_weights(&mut self, weights: &[f64]) -> Result<(), LaplacianError> {
        check_len("right face weights", self.np, weights.len())?;
        self.fpr.copy_from_slice(weights);
        Ok(())
    }

    /// Set both face weight vectors to the same values,
    /// which keeps the operator symmetric.
    pub fn set_face_weights(&mut self, weights: &[f64]) -> Result<(), LaplacianError> {
        check_len("face weights", self.np, weights.len())?;
        self.fpl.copy_from_slice(weights);
        self.fpr.copy_from_slice(weights);
        Ok(())
    }

    /// Set the coface weights `fq`.
    pub fn set_coface_weights(&mut self, weights: &[f64]) -> Result<(), LaplacianError> {
        check_len("coface weights", self.fq.len(), weights.len())?;
        self.fq.copy_from_slice(weights);
        Ok(())
    }

    /// The left face weights.
    #[inline]
    pub fn left_weights(&self) -> &na::DVector<f64> {
        &self.fpl
    }

    /// The right face weights.
    #[inline]
    pub fn right_weights(&self) -> &na::DVector<f64> {
        &self.fpr
    }

    /// The coface weights.
    #[inline]
    pub fn coface_weights(&self) -> &na::DVector<f64> {
        &self.fq
    }

    fn check_weights(&self) -> Result<(), LaplacianError> {
        check_len("left face weights", self.np, self.fpl.len())?;
        check_len("right face weights", self.np, self.fpr.len())?;
        check_len("coface weights", self.cofaces.len(), self.fq.len())
    }

    //
    // accessors
    //

    /// Number of faces, i.e. rows and columns.
    #[inline]
    pub fn face_count(&self) -> usize {
        self.np
    }

    /// Number of cofaces.
    #[inline]
    pub fn coface_count(&self) -> usize {
        self.cofaces.len()
    }

    /// The weighted degrees, i.e. the diagonal of the operator.
    #[inline]
    pub fn degrees(&self) -> &na::DVector<f64> {
        &self.degrees
    }

    /// The cofaces the operator was built from.
    #[inline]
    pub fn cofaces(&self) -> &SimplexRange {
        &self.cofaces
    }

    /// The mapping from face ranks to row indices.
    #[inline]
    pub fn face_index(&self) -> &FaceIndex {
        &self.faces
    }

    /// Face indices of every coface as a flat buffer
    /// with `P + 2` entries per coface.
    #[inline]
    pub fn face_indices(&self) -> &[usize] {
        &self.face_indices
    }

    /// Signed boundary matrix of the cofaces with one row per operator row.
    pub fn boundary_matrix(&self) -> nas::CsrMatrix<f64> {
        crate::boundary::signed_boundary(
            self.np,
            self.cofaces.len(),
            Self::COFACE_SIZE,
            &self.face_indices,
        )
    }

    //
    // matvec internals
    //

    fn check_vectors(&self, x: &[f64], y: &[f64]) -> Result<(), LaplacianError> {
        check_len("input vector", self.np, x.len())?;
        check_len("output vector", self.np, y.len())
    }

    /// Add the off-diagonal contributions of coface `q` to `y`.
    #[inline]
    fn accumulate_coface(&self, q: usize, faces: &[usize], x: &[f64], y: &mut [f64]) {
        let fq = self.fq[q];
        let (fpl, fpr) = (self.fpl.as_slice(), self.fpr.as_slice());
        match P {
            0 => {
                let (i, j) = (faces[0], faces[1]);
                y[i] -= x[j] * fpl[i] * fq * fpr[j];
                y[j] -= x[i] * fpl[j] * fq * fpr[i];
            }
            1 => {
                let (i, j, k) = (faces[0], faces[1], faces[2]);
                y[i] += x[k] * fpl[i] * fq * fpr[k] - x[j] * fpl[i] * fq * fpr[j];
                y[k] += x[i] * fpl[k] * fq * fpr[i] - x[j] * fpl[k] * fq * fpr[j];
                y[j] -= x[i] * fpl[j] * fq * fpr[i] + x[k] * fpl[j] * fq * fpr[k];
            }
            _ => self.accumulate_coface_general(q, faces, x, y),
        }
    }

    /// Dimension-independent version of [`accumulate_coface`][Self::accumulate_coface].
    ///
    /// Faces in positions `a` and `b` of a boundary have orientations
    /// `(-1)^(k-1-a)` and `(-1)^(k-1-b)`, so their product is `(-1)^(a+b)`.
    fn accumulate_coface_general(&self, q: usize, faces: &[usize], x: &[f64], y: &mut [f64]) {
        let fq = self.fq[q];
        let (fpl, fpr) = (self.fpl.as_slice(), self.fpr.as_slice());
        for ((a, &i), (b, &j)) in faces.iter().enumerate().tuple_combinations() {
            let sign = pair_sign(a, b);
            y[i] += sign * x[j] * fpl[i] * fq * fpr[j];
            y[j] += sign * x[i] * fpl[j] * fq * fpr[i];
        }
    }

    fn zero_excluded(&self, y: &mut [f64]) {
        for i in self.excluded.ones() {
            y[i] = 0.0;
        }
    }
}

impl<const P: usize> LinearOperator for UpLaplacian<P> {
    fn shape(&self) -> (usize, usize) {
        (self.np, self.np)
    }

    fn apply_into(&self, x: &[f64], y: &mut [f64]) -> Result<(), LaplacianError> {
        self.check_vectors(x, y)?;
        log::trace!("applying {}-up-Laplacian to a vector of length {}", P, x.len());

        for (y_i, &deg, &x_i) in izip!(y.iter_mut(), self.degrees.iter(), x) {
            *y_i = deg * x_i;
        }
        for (q, faces) in self.face_indices.chunks_exact(Self::COFACE_SIZE).enumerate() {
            self.accumulate_coface(q, faces, x, y);
        }
        self.zero_excluded(y);
        Ok(())
    }

    fn to_csr(&self) -> nas::CsrMatrix<f64> {
        let mut coo = nas::CooMatrix::new(self.np, self.np);
        for (i, &deg) in self.degrees.iter().enumerate() {
            if !self.excluded.contains(i) {
                coo.push(i, i, deg);
            }
        }
        for (q, faces) in self.face_indices.chunks_exact(Self::COFACE_SIZE).enumerate() {
            let fq = self.fq[q];
            for ((a, &i), (b, &j)) in faces.iter().enumerate().tuple_combinations() {
                let sign = pair_sign(a, b);
                if !self.excluded.contains(i) {
                    coo.push(i, j, sign * self.fpl[i] * fq * self.fpr[j]);
                }
                if !self.excluded.contains(j) {
                    coo.push(j, i, sign * self.fpl[j] * fq * self.fpr[i]);
                }
            }
        }
        nas::CsrMatrix::from(&coo)
    }
}

#[cfg(feature = "parallel")]
impl<const P: usize> UpLaplacian<P> {
    /// Parallel version of [`apply_into`][LinearOperator::apply_into].
    ///
    /// Cofaces sharing a face write to the same entries of the output,
    /// so each thread accumulates into its own buffer
    /// and the buffers are summed at the end.
    /// Results may differ from the serial version by rounding.
    pub fn par_apply_into(&self, x: &[f64], y: &mut [f64]) -> Result<(), LaplacianError> {
        use rayon::prelude::*;

        self.check_vectors(x, y)?;
        let np = self.np;
        let off_diagonal = self
            .face_indices
            .par_chunks_exact(Self::COFACE_SIZE)
            .enumerate()
            .fold(
                || vec![0.0; np],
                |mut acc, (q, faces)| {
                    self.accumulate_coface(q, faces, x, &mut acc);
                    acc
                },
            )
            .reduce(|| vec![0.0; np], sum_buffers);

        for (y_i, &deg, &x_i, &off) in izip!(y.iter_mut(), self.degrees.iter(), x, &off_diagonal)
        {
            *y_i = deg * x_i + off;
        }
        self.zero_excluded(y);
        Ok(())
    }

    /// Parallel version of [`precompute_degree`][Self::precompute_degree]
    /// using per-thread accumulation buffers.
    pub fn par_precompute_degree(&mut self) -> Result<(), LaplacianError> {
        use rayon::prelude::*;

        self.check_weights()?;
        let np = self.np;
        let (fpl, fpr, fq) = (&self.fpl, &self.fpr, &self.fq);
        let degrees = self
            .face_indices
            .par_chunks_exact(Self::COFACE_SIZE)
            .enumerate()
            .fold(
                || vec![0.0; np],
                |mut acc, (q, faces)| {
                    for &i in faces {
                        acc[i] += fpl[i] * fq[q] * fpr[i];
                    }
                    acc
                },
            )
            .reduce(|| vec![0.0; np], sum_buffers);
        self.degrees = na::DVector::from_vec(degrees);
        Ok(())
    }
}

#[cfg(feature = "parallel")]
fn sum_buffers(mut a: Vec<f64>, b: Vec<f64>) -> Vec<f64> {
    for (a_i, b_i) in izip!(&mut a, &b) {
        *a_i += b_i;
    }
    a
}

/// Product of the boundary orientations of the faces in positions `a` and `b`.
#[inline]
fn pair_sign(a: usize, b: usize) -> f64 {
    if (a + b) % 2 == 0 {
        1.0
    } else {
        -1.0
    }
}

#[inline]
fn check_len(what: &'static str, expected: usize, found: usize) -> Result<(), LaplacianError> {
    if expected == found {
        Ok(())
    } else {
        Err(LaplacianError::LengthMismatch {
            what,
            expected,
            found,
        })
    }
}

/// Face indices of every coface, with the lookups specialized
/// to fixed-size boundaries for edges and triangles.
fn precompute_indices<const P: usize>(
    cofaces: &SimplexRange,
    faces: &FaceIndex,
) -> Result<Vec<usize>, LaplacianError> {
    match P {
        0 => {
            let mut indices = Vec::with_capacity(2 * cofaces.len());
            for coface in cofaces {
                let [i, j] = coface.boundary_array::<2>();
                indices.extend([faces.get(i)?, faces.get(j)?]);
            }
            Ok(indices)
        }
        1 => {
            let mut indices = Vec::with_capacity(3 * cofaces.len());
            for coface in cofaces {
                let [i, j, k] = coface.boundary_array::<3>();
                indices.extend([faces.get(i)?, faces.get(j)?, faces.get(k)?]);
            }
            Ok(indices)
        }
        _ => faces.indices_of(cofaces),
    }
}

//
// tests
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combinatorial::Order;
    use approx::relative_eq;
    use itertools::iproduct;
    use proptest::prelude::*;

    /// The 2-skeleton of the boundary of a tetrahedron plus a dangling triangle:
    /// triangles 012, 013, 023, 123 and 234.
    fn triangles(order: Order) -> SimplexRange {
        #[rustfmt::skip]
        let tris = [
            0, 1, 2,
            0, 1, 3,
            0, 2, 3,
            1, 2, 3,
            2, 3, 4,
        ];
        SimplexRange::from_simplices(5, 3, order, &tris).unwrap()
    }

    fn tetrahedra(order: Order) -> SimplexRange {
        // every tetrahedron on 6 vertices except those containing both 0 and 5
        let all = SimplexRange::all(6, 4, order).unwrap();
        let ranks: Vec<u64> = all
            .iter()
            .filter(|s| {
                let v = s.vertices();
                !(v.contains(&0) && v.contains(&5))
            })
            .map(|s| s.rank())
            .collect();
        SimplexRange::from_ranks(6, 4, order, ranks).unwrap()
    }

    /// Some deterministic non-uniform values.
    fn pseudo_random(len: usize, seed: f64) -> Vec<f64> {
        (0..len)
            .map(|i| 0.5 + ((i as f64 + 1.0) * seed).sin().abs())
            .collect()
    }

    fn dense(csr: &nas::CsrMatrix<f64>) -> na::DMatrix<f64> {
        na::DMatrix::from(csr)
    }

    #[test]
    fn path_graph_laplacian() {
        let edges = SimplexRange::from_simplices(3, 2, Order::Colex, &[0, 1, 1, 2]).unwrap();
        let lap = GraphLaplacian::new(edges, 0).unwrap();
        assert_eq!(lap.shape(), (3, 3));
        assert_eq!(lap.degrees().as_slice(), &[1.0, 2.0, 1.0]);

        let y = lap.apply(&na::DVector::from_element(3, 1.0)).unwrap();
        assert_eq!(y, na::DVector::zeros(3), "constants are in the kernel");

        let y = lap.apply(&na::DVector::from_vec(vec![1.0, 0.0, 0.0])).unwrap();
        assert_eq!(y.as_slice(), &[1.0, -1.0, 0.0]);
    }

    #[test]
    fn unit_degrees_count_cofaces() {
        let tris = triangles(Order::Colex);
        let lap = EdgeLaplacian::new(tris.clone(), 0).unwrap();
        let edge_ranker = crate::combinatorial::Ranker::new(5, 2, Order::Colex).unwrap();

        let mut expected = vec![0.0; lap.face_count()];
        for tri in &tris {
            tri.boundary_ranks(|face| {
                expected[lap.face_index().get(face).unwrap()] += 1.0;
            });
        }
        assert_eq!(lap.degrees().as_slice(), &expected[..]);

        // edge 23 is on three triangles
        let e23 = edge_ranker.rank(&[2, 3]).unwrap();
        assert_eq!(lap.degrees()[lap.face_index().get(e23).unwrap()], 3.0);
    }

    /// The hand-written fast paths must agree with the pairwise formula.
    #[test]
    fn specialized_paths_match_general_path() {
        fn check<const P: usize>(lap: &mut UpLaplacian<P>) {
            let np = lap.face_count();
            lap.set_left_weights(&pseudo_random(np, 0.7)).unwrap();
            lap.set_right_weights(&pseudo_random(np, 1.3)).unwrap();
            lap.set_coface_weights(&pseudo_random(lap.coface_count(), 2.1))
                .unwrap();
            lap.precompute_degree().unwrap();

            let x = pseudo_random(np, 0.37);
            let mut specialized = vec![0.0; np];
            lap.apply_into(&x, &mut specialized).unwrap();

            let mut general: Vec<f64> = izip!(lap.degrees.iter(), &x).map(|(d, x)| d * x).collect();
            for (q, faces) in lap.face_indices.chunks_exact(P + 2).enumerate() {
                lap.accumulate_coface_general(q, faces, &x, &mut general);
            }
            for (s, g) in izip!(&specialized, &general) {
                assert!(relative_eq!(*s, *g, epsilon = 1e-12), "{specialized:?} != {general:?}");
            }
        }

        let edges = SimplexRange::all(6, 2, Order::Colex).unwrap();
        check(&mut GraphLaplacian::new(edges, 0).unwrap());
        check(&mut EdgeLaplacian::new(triangles(Order::Colex), 0).unwrap());
        check(&mut EdgeLaplacian::new(triangles(Order::Lex), 0).unwrap());
    }

    /// The operator equals `diag(fpl) D diag(fq) Dᵀ diag(fpr)`.
    #[test]
    fn matches_weighted_boundary_product() {
        fn check<const P: usize>(mut lap: UpLaplacian<P>) {
            let (np, nq) = (lap.face_count(), lap.coface_count());
            let (fpl, fpr, fq) = (
                pseudo_random(np, 0.3),
                pseudo_random(np, 0.9),
                pseudo_random(nq, 1.7),
            );
            lap.set_left_weights(&fpl).unwrap();
            lap.set_right_weights(&fpr).unwrap();
            lap.set_coface_weights(&fq).unwrap();
            lap.precompute_degree().unwrap();

            let d = dense(&lap.boundary_matrix());
            let expected = na::DMatrix::from_diagonal(&na::DVector::from_vec(fpl))
                * &d
                * na::DMatrix::from_diagonal(&na::DVector::from_vec(fq))
                * d.transpose()
                * na::DMatrix::from_diagonal(&na::DVector::from_vec(fpr));

            let materialized = dense(&lap.to_csr());
            assert!(relative_eq!(materialized, expected, epsilon = 1e-12));

            // applying to each basis vector gives the columns
            for col in 0..np {
                let e = na::DVector::from_fn(np, |i, _| if i == col { 1.0 } else { 0.0 });
                let y = lap.apply(&e).unwrap();
                assert!(relative_eq!(y, expected.column(col).into_owned(), epsilon = 1e-12));
            }
        }

        for order in [Order::Lex, Order::Colex] {
            check(GraphLaplacian::new(SimplexRange::all(5, 2, order).unwrap(), 0).unwrap());
            check(EdgeLaplacian::new(triangles(order), 0).unwrap());
            check(UpLaplacian::<2>::new(tetrahedra(order), 0).unwrap());
            check(UpLaplacian::<3>::new(SimplexRange::all(6, 5, order).unwrap(), 0).unwrap());
        }
    }

    #[test]
    fn degrees_follow_weight_changes_only_on_request() {
        let mut lap = EdgeLaplacian::new(triangles(Order::Colex), 0).unwrap();
        let unit = lap.degrees().clone();

        lap.set_coface_weights(&[2.0; 5]).unwrap();
        assert_eq!(lap.degrees(), &unit, "degrees must not update implicitly");
        lap.precompute_degree().unwrap();
        assert_eq!(lap.degrees(), &(2.0 * unit));
    }

    #[test]
    fn padding_faces_are_zero_rows() {
        let edges = SimplexRange::from_simplices(5, 2, Order::Colex, &[0, 1, 1, 2]).unwrap();
        let lap = GraphLaplacian::new(edges.clone(), 5).unwrap();
        assert_eq!(lap.shape(), (5, 5));
        let y = lap.apply(&na::DVector::from_element(5, 3.0)).unwrap();
        assert_eq!(y, na::DVector::zeros(5));
        let y = lap.apply(&na::DVector::from_vec(vec![0.0, 0.0, 0.0, 1.0, 1.0])).unwrap();
        assert_eq!(y, na::DVector::zeros(5));

        // a smaller bound than the discovered count is just ignored
        assert_eq!(GraphLaplacian::new(edges.clone(), 1).unwrap().face_count(), 3);
        assert_eq!(
            GraphLaplacian::new(edges, 6).unwrap_err(),
            LaplacianError::FaceBound {
                requested: 6,
                max: 5
            }
        );
    }

    #[test]
    fn explicit_face_index_can_hold_isolated_faces() {
        let edges = SimplexRange::from_simplices(4, 2, Order::Colex, &[0, 1, 1, 2]).unwrap();
        let faces = FaceIndex::build_map(vec![3, 0, 1, 2]).unwrap();
        let lap = GraphLaplacian::with_face_index(edges.clone(), faces).unwrap();
        assert_eq!(lap.face_count(), 4);
        // vertex 3 has index 0 and no edges
        assert_eq!(lap.degrees().as_slice(), &[0.0, 1.0, 2.0, 1.0]);

        let missing = FaceIndex::build_map(vec![0, 1]).unwrap();
        assert_eq!(
            GraphLaplacian::with_face_index(edges.clone(), missing).unwrap_err(),
            LaplacianError::UnknownFace { rank: 2 }
        );
        let out_of_range = FaceIndex::build_map(vec![0, 1, 2, 4]).unwrap();
        assert!(matches!(
            GraphLaplacian::with_face_index(edges, out_of_range),
            Err(LaplacianError::Rank(_))
        ));
    }

    /// Cofaces referencing faces outside the discovered set
    /// must be reported instead of mapping to some index.
    #[test]
    fn unknown_faces_are_indexing_errors() {
        let tris = SimplexRange::from_simplices(5, 3, Order::Colex, &[0, 1, 2, 1, 2, 3]).unwrap();
        let mut lap = EdgeLaplacian::new(tris, 0).unwrap();
        let before = lap.face_indices().to_vec();

        // 124 has faces 12 (known), 14 and 24
        let foreign = SimplexRange::from_simplices(5, 3, Order::Colex, &[1, 2, 4]).unwrap();
        let edges = crate::combinatorial::Ranker::new(5, 2, Order::Colex).unwrap();
        assert_eq!(
            lap.set_cofaces(foreign),
            Err(LaplacianError::UnknownFace {
                rank: edges.rank(&[1, 4]).unwrap()
            })
        );
        assert_eq!(lap.face_indices(), &before[..], "failed update must not change state");

        let lex = SimplexRange::from_simplices(5, 3, Order::Lex, &[1, 2, 3]).unwrap();
        assert!(matches!(
            lap.set_cofaces(lex),
            Err(LaplacianError::IncompatibleRanks { .. })
        ));

        // a subset of the initial cofaces is fine
        let subset = SimplexRange::from_simplices(5, 3, Order::Colex, &[1, 2, 3]).unwrap();
        lap.set_cofaces(subset).unwrap();
        assert_eq!(lap.coface_count(), 1);
        assert_eq!(lap.degrees().iter().sum::<f64>(), 3.0);
    }

    #[test]
    fn shape_errors() {
        let edges = SimplexRange::all(4, 2, Order::Colex).unwrap();
        assert_eq!(
            EdgeLaplacian::new(edges.clone(), 0).unwrap_err(),
            LaplacianError::DimensionMismatch {
                expected: 3,
                found: 2
            }
        );

        let mut lap = GraphLaplacian::new(edges, 0).unwrap();
        let mut y = vec![7.0; 4];
        assert_eq!(
            lap.apply_into(&[1.0; 3], &mut y),
            Err(LaplacianError::LengthMismatch {
                what: "input vector",
                expected: 4,
                found: 3
            })
        );
        assert_eq!(y, vec![7.0; 4], "output untouched on error");
        assert!(matches!(
            lap.set_coface_weights(&[1.0; 5]),
            Err(LaplacianError::LengthMismatch { expected: 6, .. })
        ));
        assert!(lap.set_face_weights(&[1.0; 4]).is_ok());
        assert!(lap.matvec(&[1.0; 5]).is_err());
    }

    #[test]
    fn excluded_faces_give_zero_rows() {
        let lap = EdgeLaplacian::new(triangles(Order::Colex), 0)
            .unwrap()
            .exclude_faces([0, 3])
            .unwrap();
        let np = lap.face_count();
        let x = na::DVector::from_vec(pseudo_random(np, 0.5));
        let y = lap.apply(&x).unwrap();
        assert_eq!((y[0], y[3]), (0.0, 0.0));
        assert!(relative_eq!(y, dense(&lap.to_csr()) * &x, epsilon = 1e-12));

        assert_eq!(
            EdgeLaplacian::new(triangles(Order::Colex), 0)
                .unwrap()
                .exclude_faces([np])
                .unwrap_err(),
            LaplacianError::FaceOutOfBounds { index: np, len: np }
        );
    }

    #[test]
    fn workspace_matvec_matches_apply() {
        let mut lap = UpLaplacian::<2>::new(tetrahedra(Order::Colex), 0).unwrap();
        let x = pseudo_random(lap.face_count(), 0.11);
        let mut expected = vec![0.0; lap.face_count()];
        lap.apply_into(&x, &mut expected).unwrap();
        // repeated calls reuse the same indices and buffer
        for _ in 0..2 {
            assert_eq!(lap.matvec(&x).unwrap(), &expected[..]);
        }
    }

    #[test]
    fn edge_laplacian_on_a_filled_triangle() {
        // a single triangle: L = d dᵀ with d = (1, -1, 1) for edges 01, 02, 12
        let tri = SimplexRange::all(3, 3, Order::Colex).unwrap();
        let lap = EdgeLaplacian::new(tri, 0).unwrap();
        let l = dense(&lap.to_csr());
        for (i, j) in iproduct!(0..3, 0..3) {
            let d = [1.0, -1.0, 1.0];
            assert_eq!(l[(i, j)], d[i] * d[j]);
        }
    }

    fn symmetric_laplacian() -> (UpLaplacian<2>, usize) {
        let mut lap = UpLaplacian::<2>::new(tetrahedra(Order::Lex), 0).unwrap();
        let np = lap.face_count();
        lap.set_face_weights(&pseudo_random(np, 0.77)).unwrap();
        lap.set_coface_weights(&pseudo_random(lap.coface_count(), 0.19))
            .unwrap();
        lap.precompute_degree().unwrap();
        (lap, np)
    }

    proptest! {
        #[test]
        fn self_adjoint_with_symmetric_weights(
            seed_x in prop::collection::vec(-10.0f64..10.0, 40),
            seed_z in prop::collection::vec(-10.0f64..10.0, 40),
        ) {
            let (lap, np) = symmetric_laplacian();
            prop_assume!(np <= 40);
            let x = na::DVector::from_column_slice(&seed_x[..np]);
            let z = na::DVector::from_column_slice(&seed_z[..np]);
            let lx = lap.apply(&x).unwrap();
            let lz = lap.apply(&z).unwrap();
            prop_assert!(relative_eq!(lx.dot(&z), x.dot(&lz), epsilon = 1e-9, max_relative = 1e-9));
        }

        #[test]
        fn linear(
            a in -5.0f64..5.0,
            b in -5.0f64..5.0,
            seed_x in prop::collection::vec(-10.0f64..10.0, 16),
            seed_y in prop::collection::vec(-10.0f64..10.0, 16),
        ) {
            let mut lap = EdgeLaplacian::new(triangles(Order::Colex), 0).unwrap();
            let np = lap.face_count();
            lap.set_left_weights(&pseudo_random(np, 0.4)).unwrap();
            lap.set_right_weights(&pseudo_random(np, 2.4)).unwrap();
            lap.precompute_degree().unwrap();

            let x = na::DVector::from_column_slice(&seed_x[..np]);
            let y = na::DVector::from_column_slice(&seed_y[..np]);
            let combined = lap.apply(&(a * &x + b * &y)).unwrap();
            let separate = a * lap.apply(&x).unwrap() + b * lap.apply(&y).unwrap();
            prop_assert!(relative_eq!(combined, separate, epsilon = 1e-9, max_relative = 1e-9));
        }
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_matches_serial() {
        let (mut lap, np) = symmetric_laplacian();
        let serial_degrees = lap.degrees().clone();
        lap.par_precompute_degree().unwrap();
        assert!(relative_eq!(lap.degrees().clone(), serial_degrees, epsilon = 1e-12));

        let x = pseudo_random(np, 0.3);
        let (mut serial, mut parallel) = (vec![0.0; np], vec![0.0; np]);
        lap.apply_into(&x, &mut serial).unwrap();
        lap.par_apply_into(&x, &mut parallel).unwrap();
        assert!(relative_eq!(
            na::DVector::from_vec(serial),
            na::DVector::from_vec(parallel),
            epsilon = 1e-12
        ));
    }
}
