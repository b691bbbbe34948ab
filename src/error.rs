use crate::combinatorial::{Order, RankError};

/// Error in constructing or applying an [`UpLaplacian`][crate::UpLaplacian].
///
/// All of these are reported by the call that triggered them;
/// no partially computed output is ever returned alongside one.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum LaplacianError {
    /// A subset could not be ranked or unranked.
    #[error(transparent)]
    Rank(#[from] RankError),
    /// A boundary face of some coface is missing from the face index.
    #[error("face with rank {rank} is not in the face index")]
    UnknownFace {
        /// Rank of the missing face.
        rank: u64,
    },
    /// A face rank was given more than once when building a face index.
    #[error("face with rank {rank} appears more than once")]
    DuplicateFace {
        /// The repeated rank.
        rank: u64,
    },
    /// The cofaces have a different size than the operator expects.
    #[error("expected cofaces with {expected} vertices, got {found}")]
    DimensionMismatch {
        /// Simplex size required by the operator.
        expected: usize,
        /// Simplex size of the given cofaces.
        found: usize,
    },
    /// Replacement cofaces are ranked over a different vertex set or order
    /// than the faces already indexed.
    #[error(
        "cofaces are ranked over {found_n} vertices in {found_order:?} order, \
         expected {expected_n} vertices in {expected_order:?} order"
    )]
    IncompatibleRanks {
        /// Vertex count of the indexed faces.
        expected_n: usize,
        /// Order of the indexed faces.
        expected_order: Order,
        /// Vertex count of the new cofaces.
        found_n: usize,
        /// Order of the new cofaces.
        found_order: Order,
    },
    /// A vector or weight buffer has the wrong length.
    #[error("{what} has length {found}, expected {expected}")]
    LengthMismatch {
        /// Which buffer was wrong.
        what: &'static str,
        /// The length it should have had.
        expected: usize,
        /// The length it had.
        found: usize,
    },
    /// The requested minimum face count is more than the number of possible faces.
    #[error("requested at least {requested} faces but only {max} exist")]
    FaceBound {
        /// Requested minimum face count.
        requested: usize,
        /// Number of faces of that dimension on the vertex set.
        max: u64,
    },
    /// A dense face index is outside of the operator.
    #[error("face index {index} is out of bounds for {len} faces")]
    FaceOutOfBounds {
        /// The offending index.
        index: usize,
        /// Number of faces.
        len: usize,
    },
}
