//! Lazy sequences of simplices addressed by their combinatorial rank.

use std::{ops::Range, sync::Arc};

use crate::combinatorial::{Order, RankError, Ranker, MAX_SIMPLEX_SIZE};

/// A restartable sequence of `k`-simplices on `n` vertices,
/// stored only as ranks under a fixed [`Order`].
///
/// Vertices and boundary faces are computed on demand
/// from the rank of each element.
/// Ranks are validated on construction, so every element is a valid simplex.
///
/// ```
/// # use rankplex::{Order, SimplexRange};
/// // the edges of a triangle
/// let edges = SimplexRange::from_simplices(3, 2, Order::Colex, &[0, 1, 1, 2, 0, 2]).unwrap();
/// for edge in &edges {
///     let [a, b] = edge.boundary_array::<2>();
///     assert!(a < b);
/// }
/// ```
#[derive(Clone, Debug)]
pub struct SimplexRange {
    ranker: Ranker,
    source: RankSource,
}

#[derive(Clone, Debug)]
enum RankSource {
    /// a contiguous block of ranks, e.g. every simplex of the size
    Interval(Range<u64>),
    /// explicitly listed ranks, e.g. the top simplices of a complex.
    /// shared so that cloning a range stays cheap
    Explicit(Arc<[u64]>),
}

impl SimplexRange {
    /// Every `k`-subset of `n` vertices in increasing rank order.
    pub fn all(n: usize, k: usize, order: Order) -> Result<Self, RankError> {
        let ranker = Ranker::new(n, k, order)?;
        let count = ranker.count();
        Ok(Self {
            ranker,
            source: RankSource::Interval(0..count),
        })
    }

    /// The `k`-subsets with ranks in the given range.
    pub fn interval(n: usize, k: usize, order: Order, ranks: Range<u64>) -> Result<Self, RankError> {
        let ranker = Ranker::new(n, k, order)?;
        if ranks.start < ranks.end {
            ranker.check_rank(ranks.end - 1)?;
        }
        Ok(Self {
            ranker,
            source: RankSource::Interval(ranks),
        })
    }

    /// The `k`-subsets with the given ranks, in the given order.
    pub fn from_ranks(
        n: usize,
        k: usize,
        order: Order,
        ranks: impl Into<Arc<[u64]>>,
    ) -> Result<Self, RankError> {
        let ranker = Ranker::new(n, k, order)?;
        let ranks: Arc<[u64]> = ranks.into();
        for &r in ranks.iter() {
            ranker.check_rank(r)?;
        }
        Ok(Self {
            ranker,
            source: RankSource::Explicit(ranks),
        })
    }

    /// The simplices given as a flat buffer where every `k` vertices form one simplex.
    ///
    /// Vertices within a simplex may be in any order.
    pub fn from_simplices(
        n: usize,
        k: usize,
        order: Order,
        vertices: &[usize],
    ) -> Result<Self, RankError> {
        let ranker = Ranker::new(n, k, order)?;
        let ranks = ranker.rank_all(vertices)?;
        Ok(Self {
            ranker,
            source: RankSource::Explicit(ranks.into()),
        })
    }

    /// Number of vertices in the underlying vertex set.
    #[inline]
    pub fn n(&self) -> usize {
        self.ranker.n()
    }

    /// Number of vertices in each simplex (dimension + 1).
    #[inline]
    pub fn simplex_size(&self) -> usize {
        self.ranker.k()
    }

    /// The order ranks are given in.
    #[inline]
    pub fn order(&self) -> Order {
        self.ranker.order()
    }

    /// The ranker used to compute vertices and boundaries.
    #[inline]
    pub fn ranker(&self) -> &Ranker {
        &self.ranker
    }

    /// Number of simplices in the range.
    #[inline]
    pub fn len(&self) -> usize {
        match &self.source {
            RankSource::Interval(r) => (r.end.saturating_sub(r.start)) as usize,
            RankSource::Explicit(ranks) => ranks.len(),
        }
    }

    /// Whether the range has no simplices.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over the simplices, starting from the beginning every time.
    pub fn iter(&self) -> SimplexIter<'_> {
        SimplexIter {
            range: self,
            index: 0,
            len: self.len(),
        }
    }

    /// Iterate over just the ranks of the simplices.
    pub fn ranks(&self) -> impl '_ + ExactSizeIterator<Item = u64> {
        self.iter().map(|s| s.rank())
    }

    #[inline]
    fn rank_at(&self, index: usize) -> u64 {
        match &self.source {
            RankSource::Interval(r) => r.start + index as u64,
            RankSource::Explicit(ranks) => ranks[index],
        }
    }
}

impl<'a> IntoIterator for &'a SimplexRange {
    type Item = SimplexView<'a>;
    type IntoIter = SimplexIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the simplices in a [`SimplexRange`].
#[derive(Clone, Debug)]
pub struct SimplexIter<'a> {
    range: &'a SimplexRange,
    index: usize,
    len: usize,
}

impl<'a> Iterator for SimplexIter<'a> {
    type Item = SimplexView<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.len {
            return None;
        }
        let rank = self.range.rank_at(self.index);
        self.index += 1;
        Some(SimplexView {
            rank,
            ranker: &self.range.ranker,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len - self.index;
        (remaining, Some(remaining))
    }
}

impl<'a> ExactSizeIterator for SimplexIter<'a> {}

/// A single simplex in a [`SimplexRange`].
#[derive(Clone, Copy, Debug)]
pub struct SimplexView<'a> {
    rank: u64,
    ranker: &'a Ranker,
}

impl<'a> SimplexView<'a> {
    /// The combinatorial rank of this simplex.
    #[inline]
    pub fn rank(&self) -> u64 {
        self.rank
    }

    /// Number of vertices in the simplex.
    #[inline]
    pub fn simplex_size(&self) -> usize {
        self.ranker.k()
    }

    /// Write the ascending vertex indices of this simplex into a buffer.
    ///
    /// Panics if the buffer's length is not the simplex size.
    pub fn write_vertices(&self, out: &mut [usize]) {
        assert_eq!(
            out.len(),
            self.ranker.k(),
            "vertex buffer must match the simplex size"
        );
        self.ranker.unrank_unchecked(self.rank, out);
    }

    /// The ascending vertex indices of this simplex.
    pub fn vertices(&self) -> Vec<usize> {
        let mut out = vec![0; self.ranker.k()];
        self.write_vertices(&mut out);
        out
    }

    /// Call `f` with the rank of each codimension-1 face of this simplex.
    ///
    /// Faces are ranked with the same [`Order`] as the simplex itself.
    /// The face in position `t` omits vertex `k - 1 - t`,
    /// which makes its orientation in the simplex's boundary `(-1)^(k-1-t)`.
    /// For a triangle `abc` the faces are `ab`, `ac`, `bc`
    /// and the boundary is `ab - ac + bc`.
    pub fn boundary_ranks(&self, f: impl FnMut(u64)) {
        let k = self.ranker.k();
        let mut buf = [0usize; MAX_SIMPLEX_SIZE];
        self.ranker.unrank_unchecked(self.rank, &mut buf[..k]);
        self.ranker.for_each_face(&buf[..k], f);
    }

    /// The boundary face ranks as a fixed-size array,
    /// for code specialized to one dimension.
    ///
    /// Panics if `K` is not the simplex size.
    pub fn boundary_array<const K: usize>(&self) -> [u64; K] {
        assert_eq!(K, self.ranker.k(), "boundary array size must match the simplex size");
        let mut faces = [0u64; K];
        let mut t = 0;
        self.boundary_ranks(|face| {
            faces[t] = face;
            t += 1;
        });
        faces
    }
}

//
// tests
//
