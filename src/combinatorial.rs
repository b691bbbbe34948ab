//! The combinatorial number system:
//! a bijection between `k`-subsets of the vertex set `{0, .., n-1}`
//! and the integers `0..C(n, k)`.
//!
//! Simplices are never stored as vertex lists inside the operators of this crate.
//! Instead they are identified by their rank under one of two total orders
//! ([`Order::Lex`] or [`Order::Colex`]), and vertex tuples are recovered on demand.
//!
//! ```
//! # use rankplex::combinatorial::{Order, Ranker};
//! let ranker = Ranker::new(5, 3, Order::Colex).unwrap();
//! let rank = ranker.rank(&[0, 2, 4]).unwrap();
//! assert_eq!(ranker.unrank(rank).unwrap(), vec![0, 2, 4]);
//! ```

use std::sync::Arc;

/// The largest simplex size (number of vertices) supported by [`Ranker`].
///
/// Vertex tuples are unranked into fixed-size stack buffers of this length.
pub const MAX_SIMPLEX_SIZE: usize = 32;

/// Domain error in ranking or unranking a subset.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum RankError {
    /// Subsets larger than the vertex set don't exist.
    #[error("cannot take subsets of size {k} from {n} vertices")]
    SubsetTooLarge {
        /// Number of vertices.
        n: usize,
        /// Requested subset size.
        k: usize,
    },
    /// The subset size exceeds [`MAX_SIMPLEX_SIZE`].
    #[error("simplices of size {k} are not supported (maximum {max})")]
    SimplexTooLarge {
        /// Requested subset size.
        k: usize,
        /// The supported maximum.
        max: usize,
    },
    /// `C(n, k)` does not fit in a `u64`.
    #[error("the number of {k}-subsets of {n} vertices overflows a u64")]
    Overflow {
        /// Number of vertices.
        n: usize,
        /// Subset size.
        k: usize,
    },
    /// A vertex is not in `{0, .., n-1}`.
    #[error("vertex {vertex} is out of range for {n} vertices")]
    VertexOutOfRange {
        /// The offending vertex.
        vertex: usize,
        /// Number of vertices.
        n: usize,
    },
    /// A vertex appears more than once in a subset.
    #[error("vertex {vertex} appears more than once in a subset")]
    RepeatedVertex {
        /// The offending vertex.
        vertex: usize,
    },
    /// A rank is not in `0..C(n, k)`.
    #[error("rank {rank} is out of range (there are {count} subsets)")]
    RankOutOfRange {
        /// The offending rank.
        rank: u64,
        /// The number of valid ranks.
        count: u64,
    },
    /// A subset or flat tuple buffer has the wrong length.
    #[error("expected tuples of length {k}, got a buffer of length {len}")]
    WrongTupleLength {
        /// Length of the given buffer.
        len: usize,
        /// Expected tuple length.
        k: usize,
    },
}

/// Total order over the `k`-subsets of a vertex set.
///
/// Boundary orientations are only consistent
/// when every rank in a computation uses the same order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Order {
    /// Lexicographic order on ascending vertex tuples:
    /// `{0,1} < {0,2} < {0,3} < {1,2} < ..`
    Lex,
    /// Colexicographic order, i.e. lexicographic on the reversed tuples:
    /// `{0,1} < {0,2} < {1,2} < {0,3} < ..`
    ///
    /// Colex ranks don't depend on `n`,
    /// so a subset keeps its rank when vertices are added.
    #[default]
    Colex,
}

/// Table of binomial coefficients `C(m, j)` for `m <= n` and `j <= k`.
///
/// Entries too large for a `u64` saturate at `u64::MAX`.
/// Only coefficients bounded by `C(n, k)` are ever summed during ranking,
/// so saturated entries only take part in comparisons.
#[derive(Clone, Debug)]
pub struct BinomialTable {
    n: usize,
    k: usize,
    /// stored by rows of `j`: `values[j * (n + 1) + m] = C(m, j)`
    values: Vec<u64>,
}

impl BinomialTable {
    /// Compute the table with Pascal's rule.
    pub fn new(n: usize, k: usize) -> Self {
        let width = n + 1;
        let mut values = vec![0u64; (k + 1) * width];
        values[..width].fill(1);
        for j in 1..=k {
            for m in 1..=n {
                values[j * width + m] =
                    values[(j - 1) * width + m - 1].saturating_add(values[j * width + m - 1]);
            }
        }
        Self { n, k, values }
    }

    /// Look up `C(m, j)`.
    ///
    /// Panics if `m > n` or `j > k` for the `n` and `k` the table was built with.
    #[inline]
    pub fn choose(&self, m: usize, j: usize) -> u64 {
        assert!(
            m <= self.n && j <= self.k,
            "C({m}, {j}) is outside of the table C({}, {})",
            self.n,
            self.k
        );
        self.values[j * (self.n + 1) + m]
    }
}

/// Ranks and unranks `k`-subsets of `{0, .., n-1}` under a fixed [`Order`].
///
/// A single rank or unrank costs `O(k)` table lookups
/// (`O(k log n)` for unranking, which searches each position).
/// Clones share the binomial table.
#[derive(Clone, Debug)]
pub struct Ranker {
    n: usize,
    k: usize,
    order: Order,
    count: u64,
    table: Arc<BinomialTable>,
}

impl Ranker {
    /// Create a ranker for `k`-subsets of `n` vertices.
    pub fn new(n: usize, k: usize, order: Order) -> Result<Self, RankError> {
        if k > n {
            return Err(RankError::SubsetTooLarge { n, k });
        }
        if k > MAX_SIMPLEX_SIZE {
            return Err(RankError::SimplexTooLarge {
                k,
                max: MAX_SIMPLEX_SIZE,
            });
        }
        let table = BinomialTable::new(n, k);
        let count = table.choose(n, k);
        if count == u64::MAX {
            return Err(RankError::Overflow { n, k });
        }
        Ok(Self {
            n,
            k,
            order,
            count,
            table: Arc::new(table),
        })
    }

    /// Number of vertices.
    #[inline]
    pub fn n(&self) -> usize {
        self.n
    }

    /// Subset size.
    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    /// The order ranks are computed in.
    #[inline]
    pub fn order(&self) -> Order {
        self.order
    }

    /// The number of `k`-subsets, `C(n, k)`.
    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// The binomial coefficients backing this ranker.
    #[inline]
    pub fn table(&self) -> &BinomialTable {
        &self.table
    }

    /// Rank a subset given in any vertex order.
    pub fn rank(&self, subset: &[usize]) -> Result<u64, RankError> {
        if subset.len() != self.k {
            return Err(RankError::WrongTupleLength {
                len: subset.len(),
                k: self.k,
            });
        }
        let mut buf = [0usize; MAX_SIMPLEX_SIZE];
        let sorted = &mut buf[..self.k];
        sorted.copy_from_slice(subset);
        sorted.sort_unstable();
        if let Some(&vertex) = sorted.iter().find(|&&v| v >= self.n) {
            return Err(RankError::VertexOutOfRange { vertex, n: self.n });
        }
        if let Some(pair) = sorted.windows(2).find(|w| w[0] == w[1]) {
            return Err(RankError::RepeatedVertex { vertex: pair[0] });
        }
        Ok(self.rank_sorted(sorted))
    }

    /// Rank a strictly increasing tuple of at most `k` valid vertices.
    ///
    /// The tuple may be shorter than `k`, which is how boundary faces are ranked
    /// with the same table as their cofaces.
    pub(crate) fn rank_sorted(&self, sorted: &[usize]) -> u64 {
        match self.order {
            Order::Colex => colex_rank(&self.table, sorted),
            Order::Lex => {
                // lex order on `c` is reverse colex order
                // on the mirrored subset `{n-1-c_i}`
                let size = sorted.len();
                let mirrored_rank: u64 = sorted
                    .iter()
                    .rev()
                    .enumerate()
                    .map(|(j, &c)| self.table.choose(self.n - 1 - c, j + 1))
                    .sum();
                self.table.choose(self.n, size) - 1 - mirrored_rank
            }
        }
    }

    /// Recover the ascending vertex tuple with the given rank.
    pub fn unrank(&self, rank: u64) -> Result<Vec<usize>, RankError> {
        let mut vertices = vec![0; self.k];
        self.unrank_into(rank, &mut vertices)?;
        Ok(vertices)
    }

    /// Like [`unrank`][Self::unrank], writing into a buffer of length `k`.
    pub fn unrank_into(&self, rank: u64, out: &mut [usize]) -> Result<(), RankError> {
        if out.len() != self.k {
            return Err(RankError::WrongTupleLength {
                len: out.len(),
                k: self.k,
            });
        }
        self.check_rank(rank)?;
        self.unrank_unchecked(rank, out);
        Ok(())
    }

    /// Return an error if `rank` is not in `0..C(n, k)`.
    #[inline]
    pub fn check_rank(&self, rank: u64) -> Result<(), RankError> {
        if rank < self.count {
            Ok(())
        } else {
            Err(RankError::RankOutOfRange {
                rank,
                count: self.count,
            })
        }
    }

    pub(crate) fn unrank_unchecked(&self, rank: u64, out: &mut [usize]) {
        match self.order {
            Order::Colex => colex_unrank(&self.table, self.n, rank, out),
            Order::Lex => {
                colex_unrank(&self.table, self.n, self.count - 1 - rank, out);
                out.reverse();
                for v in out.iter_mut() {
                    *v = self.n - 1 - *v;
                }
            }
        }
    }

    /// Call `f` with the rank of each codimension-1 face of a `k`-simplex
    /// given by its ascending vertices.
    ///
    /// The `t`-th face omits vertex `k - 1 - t`,
    /// so a triangle `abc` emits `ab`, `ac`, `bc` in that order
    /// and the face in position `t` has boundary orientation `(-1)^(k-1-t)`.
    pub(crate) fn for_each_face(&self, vertices: &[usize], mut f: impl FnMut(u64)) {
        let k = vertices.len();
        if k == 0 {
            return;
        }
        let mut buf = [0usize; MAX_SIMPLEX_SIZE];
        for omit in (0..k).rev() {
            let face = &mut buf[..k - 1];
            face[..omit].copy_from_slice(&vertices[..omit]);
            face[omit..].copy_from_slice(&vertices[omit + 1..]);
            f(self.rank_sorted(face));
        }
    }

    /// Rank every `k`-tuple in a flat buffer, preserving input order.
    pub fn rank_all(&self, flat: &[usize]) -> Result<Vec<u64>, RankError> {
        if self.k == 0 {
            // zero-length tuples can't be delimited in a flat buffer
            return if flat.is_empty() {
                Ok(Vec::new())
            } else {
                Err(RankError::WrongTupleLength {
                    len: flat.len(),
                    k: 0,
                })
            };
        }
        if flat.len() % self.k != 0 {
            return Err(RankError::WrongTupleLength {
                len: flat.len(),
                k: self.k,
            });
        }
        flat.chunks_exact(self.k).map(|s| self.rank(s)).collect()
    }

    /// Unrank every rank in a slice into a flat buffer of `k`-tuples.
    pub fn unrank_all(&self, ranks: &[u64]) -> Result<Vec<usize>, RankError> {
        let mut flat = vec![0; ranks.len() * self.k];
        if self.k == 0 {
            for &r in ranks {
                self.check_rank(r)?;
            }
            return Ok(flat);
        }
        for (&r, out) in ranks.iter().zip(flat.chunks_exact_mut(self.k)) {
            self.unrank_into(r, out)?;
        }
        Ok(flat)
    }
}

fn colex_rank(table: &BinomialTable, sorted: &[usize]) -> u64 {
    sorted
        .iter()
        .enumerate()
        .map(|(i, &c)| table.choose(c, i + 1))
        .sum()
}

/// Greedy decomposition of `rank` into `sum C(c_i, i + 1)`
/// from the largest position down.
fn colex_unrank(table: &BinomialTable, n: usize, mut rank: u64, out: &mut [usize]) {
    let mut upper = n.saturating_sub(1);
    for i in (1..=out.len()).rev() {
        // largest c in [i - 1, upper] with C(c, i) <= rank.
        // C(i - 1, i) = 0 so the lower end always qualifies
        let (mut lo, mut hi) = (i - 1, upper);
        while lo < hi {
            let mid = lo + (hi - lo + 1) / 2;
            if table.choose(mid, i) <= rank {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        out[i - 1] = lo;
        rank -= table.choose(lo, i);
        upper = lo.saturating_sub(1);
    }
}

/// Rank a flat buffer of `k`-tuples of vertices in `{0, .., n-1}`.
///
/// Tuples may list their vertices in any order.
pub fn rank_combs(combs: &[usize], n: usize, k: usize, order: Order) -> Result<Vec<u64>, RankError> {
    Ranker::new(n, k, order)?.rank_all(combs)
}

/// Unrank a slice of ranks into a flat buffer of ascending `k`-tuples.
pub fn unrank_combs(
    ranks: &[u64],
    n: usize,
    k: usize,
    order: Order,
) -> Result<Vec<usize>, RankError> {
    Ranker::new(n, k, order)?.unrank_all(ranks)
}

/// Ranks of the `k` codimension-1 faces of the `k`-simplex with the given rank,
/// in boundary order (see [`SimplexView::boundary_ranks`
/// ][crate::simplex_range::SimplexView::boundary_ranks]).
pub fn boundary_ranks(rank: u64, n: usize, k: usize, order: Order) -> Result<Vec<u64>, RankError> {
    let ranker = Ranker::new(n, k, order)?;
    let mut buf = [0usize; MAX_SIMPLEX_SIZE];
    ranker.unrank_into(rank, &mut buf[..k])?;
    let mut faces = Vec::with_capacity(k);
    ranker.for_each_face(&buf[..k], |face| faces.push(face));
    Ok(faces)
}

//
// tests
//
