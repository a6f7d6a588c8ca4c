//! Online adaptive interpolation over a box partition of the input space.
//!
//! Datapoints (input coordinates plus an item summarised through an [`distribution::Aggregator`])
//! are streamed into a binary tree of axis-aligned boxes. Boxes whose outputs vary a lot relative
//! to their sample count are subdivided; queries walk down the tree and stop at the coarsest box
//! that is statistically trustworthy, returning its [`distribution::Distribution`].
//!
//! Two engines share the same node contract ([`tree::SplitNode`]):
//! - [`interpolator::Interpolator`] picks one split dimension per box by probing how much error
//!   would result from never splitting each dimension.
//! - [`lazy_interpolator::LazyInterpolator`] routes by a weighted vote of many cheap
//!   single-dimension comparisons, for inputs with thousands of lazily fetched coordinates.
pub mod algorithms;
pub mod datapoint;
pub mod distribution;
pub mod errors;
pub mod hyper_box;
pub mod interpolator;
pub mod lazy_interpolator;
pub mod options;
pub mod tree;
pub mod utilities;

pub use datapoint::{Datapoint, DatapointId, Inputs};
pub use distribution::{Aggregator, Distribution, DistributionAggregator, ScalarAggregator};
pub use errors::AIError;
pub use hyper_box::{HyperBox, Interval};
pub use interpolator::Interpolator;
pub use lazy_interpolator::LazyInterpolator;
pub use options::InterpolatorOptions;
