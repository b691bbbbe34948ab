//! Matrix-free weighted up-Laplacians on simplicial complexes.
//!
//! Simplices are identified by their rank in the combinatorial number system
//! (see [`combinatorial`]), so a complex is just a [`SimplexRange`] of ranks
//! and never has to store its vertices or incidence relations.
//! An [`UpLaplacian`] built from such a range precomputes the little it needs
//! to apply the operator to a vector in time linear in the number of cofaces.
//!
//! ```
//! use rankplex::{EdgeLaplacian, LinearOperator, Order, SimplexRange};
//!
//! // two triangles glued along the edge 12
//! let tris = SimplexRange::from_simplices(4, 3, Order::Colex, &[0, 1, 2, 1, 2, 3])?;
//! let lap = EdgeLaplacian::new(tris, 0)?;
//! assert_eq!(lap.shape(), (5, 5));
//!
//! let x = rankplex::na::DVector::from_element(5, 1.0);
//! let y = lap.apply(&x)?;
//! assert_eq!(y.len(), 5);
//! # Ok::<(), rankplex::LaplacianError>(())
//! ```

#![warn(missing_docs)]

pub mod combinatorial;
#[doc(inline)]
pub use combinatorial::{Order, RankError, Ranker};

pub mod simplex_range;
#[doc(inline)]
pub use simplex_range::{SimplexIter, SimplexRange, SimplexView};

pub mod face_index;
#[doc(inline)]
pub use face_index::FaceIndex;

pub mod operator;
#[doc(inline)]
pub use operator::{EdgeLaplacian, GraphLaplacian, LinearOperator, UpLaplacian};

pub mod boundary;

mod error;
pub use error::LaplacianError;

// nalgebra re-exports for convenience

pub use nalgebra as na;
pub use nalgebra_sparse as nas;
