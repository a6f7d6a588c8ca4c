use std::sync::Arc;

use crate::datapoint::{Datapoint, DatapointId, Inputs};
use crate::distribution::{Aggregator, Distribution};
use crate::options::InterpolatorOptions;

pub mod lazy_node;
pub mod partition_node;
pub mod probe_node;
pub mod threshold;

/// Shared handle to a datapoint. A datapoint is referenced by every box on its path.
pub type PointRef<A, I> = Arc<Datapoint<<A as Aggregator>::Item, I>>;

///
/// Everything a node needs from its owning interpolator while it updates itself.
///
pub struct TreeContext<'a, A>
{
    pub aggregator: &'a A,
    pub options: &'a InterpolatorOptions,
}

impl<'a, A> TreeContext<'a, A>
{
    pub fn new(aggregator: &'a A, options: &'a InterpolatorOptions) -> Self
    {
        Self { aggregator, options }
    }
}

impl<A> Clone for TreeContext<'_, A>
{
    fn clone(&self) -> Self
    {
        *self
    }
}

impl<A> Copy for TreeContext<'_, A> {}

///
/// Contract shared by the boxes of both engines. Insertions are deferred: a node queues new
/// points and folds them in (possibly splitting) the next time anything reads from it, which is
/// why most accessors take `&mut self`.
///
pub trait SplitNode<A: Aggregator, I: Inputs>: Sized
{
    /// Queues a datapoint.
    fn add_datapoint(&mut self, point: PointRef<A, I>);

    /// Removes a datapoint from this box and its descendants. Returns false if it was unknown.
    fn remove_datapoint(&mut self, id: DatapointId, ctx: TreeContext<'_, A>) -> bool;

    /// Live plus queued datapoints.
    fn num_datapoints(&self) -> usize;

    fn distribution(&mut self, ctx: TreeContext<'_, A>) -> Distribution;

    fn spread(&mut self, ctx: TreeContext<'_, A>) -> f64
    {
        self.distribution(ctx).std_dev()
    }

    ///
    /// Side (0 = lower, 1 = upper) a query belongs to, or `None` for a leaf.
    ///
    fn choose_child<Q: Inputs + ?Sized>(&mut self, query: &Q, ctx: TreeContext<'_, A>) -> Option<usize>;

    fn child_mut(&mut self, side: usize) -> Option<&mut Self>;

    /// Every datapoint held by this box, queued ones included.
    fn datapoints(&self) -> Vec<PointRef<A, I>>;
}
