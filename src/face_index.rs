//! Dense indexing of the faces induced by a sequence of cofaces.

use std::collections::{HashMap, HashSet};

use crate::{error::LaplacianError, simplex_range::SimplexRange};

/// A bijection between a finite set of face ranks and the indices `0..len`.
///
/// Lookups of ranks outside the set are reported explicitly
/// ([`index_of`][Self::index_of] returns `None`, [`get`][Self::get] an error)
/// rather than defaulting to some index.
#[derive(Clone, Debug, Default)]
pub struct FaceIndex {
    ranks: Vec<u64>,
    index_map: HashMap<u64, usize>,
}

impl FaceIndex {
    /// Collect the distinct ranks of every boundary face of the given cofaces.
    ///
    /// With `preserve_order` the ranks are listed in the order they were first seen,
    /// otherwise they're sorted ascending,
    /// which makes the layout independent of coface traversal order.
    pub fn discover(cofaces: &SimplexRange, preserve_order: bool) -> Vec<u64> {
        let mut seen = HashSet::with_capacity(cofaces.len());
        let mut face_ranks = Vec::with_capacity(cofaces.len());
        for coface in cofaces {
            coface.boundary_ranks(|face| {
                if seen.insert(face) {
                    face_ranks.push(face);
                }
            });
        }
        if !preserve_order {
            face_ranks.sort_unstable();
        }
        face_ranks
    }

    /// Assign each rank its position in the slice.
    ///
    /// Fails if a rank appears more than once.
    pub fn build_map(ranks: Vec<u64>) -> Result<Self, LaplacianError> {
        let mut index_map = HashMap::with_capacity(ranks.len());
        for (idx, &rank) in ranks.iter().enumerate() {
            if index_map.insert(rank, idx).is_some() {
                return Err(LaplacianError::DuplicateFace { rank });
            }
        }
        Ok(Self { ranks, index_map })
    }

    /// Index the faces of the given cofaces in ascending rank order.
    pub fn from_cofaces(cofaces: &SimplexRange) -> Self {
        let ranks = Self::discover(cofaces, false);
        let index_map = ranks.iter().enumerate().map(|(i, &r)| (r, i)).collect();
        Self { ranks, index_map }
    }

    /// Number of indexed faces.
    #[inline]
    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    /// Whether there are no indexed faces.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }

    /// The indexed ranks; the rank at position `i` has index `i`.
    #[inline]
    pub fn ranks(&self) -> &[u64] {
        &self.ranks
    }

    /// Look up the index of a face rank.
    #[inline]
    pub fn index_of(&self, rank: u64) -> Option<usize> {
        self.index_map.get(&rank).copied()
    }

    /// Look up the index of a face rank, failing if it isn't indexed.
    #[inline]
    pub fn get(&self, rank: u64) -> Result<usize, LaplacianError> {
        self.index_of(rank)
            .ok_or(LaplacianError::UnknownFace { rank })
    }

    /// Dense indices of the boundary faces of every coface,
    /// as a flat buffer with one chunk of `simplex_size` indices per coface
    /// in boundary order.
    pub fn indices_of(&self, cofaces: &SimplexRange) -> Result<Vec<usize>, LaplacianError> {
        let mut indices = Vec::with_capacity(cofaces.len() * cofaces.simplex_size());
        for coface in cofaces {
            let mut missing = None;
            coface.boundary_ranks(|face| match self.index_of(face) {
                Some(idx) => indices.push(idx),
                None => {
                    missing.get_or_insert(face);
                }
            });
            if let Some(rank) = missing {
                return Err(LaplacianError::UnknownFace { rank });
            }
        }
        Ok(indices)
    }
}
