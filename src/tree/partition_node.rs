use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
#[cfg(feature = "tracing")]
use tracing::{debug, trace};

use crate::algorithms::median::estimate_median;
use crate::algorithms::neighborhood::StopRule;
use crate::datapoint::{DatapointId, Inputs};
use crate::distribution::{Aggregator, Distribution};
use crate::hyper_box::HyperBox;
use crate::tree::probe_node::ProbeNode;
use crate::tree::{PointRef, SplitNode, TreeContext};
use crate::utilities::parallel::{map_indices, ParallelMarker};

///
/// Box of the eager engine. It owns the datapoints inside its boundary and, once it has seen
/// enough of them, one split along a single dimension into a lower (inclusive) and upper child.
///
/// The split dimension is chosen by building one [`ProbeNode`] per dimension; the dimension
/// whose probe shows the largest output jumps is the one that most needs splitting.
///
pub struct PartitionNode<A: Aggregator, I>
{
    current_boundary: HyperBox,
    observed_boundary: Option<HyperBox>,
    split: Option<(usize, f64)>,
    children: Option<Box<[PartitionNode<A, I>; 2]>>,
    summary: A::Summary,
    live: IndexMap<DatapointId, PointRef<A, I>, FxBuildHasher>,
    pending: Vec<PointRef<A, I>>,
    next_split: usize,
    forced_dimension: usize,
    forced_splits: usize,
    exempt: bool,
    depth: usize,
}

impl<A, I> PartitionNode<A, I>
where
    A: Aggregator + ParallelMarker,
    A::Item: ParallelMarker,
    I: Inputs + ParallelMarker,
{
    ///
    /// Root box. The root is exempt from probing for its first few splits, which are forced
    /// round-robin across dimensions.
    ///
    pub fn new_root(boundary: HyperBox, aggregator: &A) -> Self
    {
        let mut root = Self::new(boundary, aggregator, 0);
        root.exempt = true;
        root
    }

    fn new(boundary: HyperBox, aggregator: &A, depth: usize) -> Self
    {
        Self
        {
            current_boundary: boundary,
            observed_boundary: None,
            split: None,
            children: None,
            summary: aggregator.default_summary(),
            live: IndexMap::default(),
            pending: Vec::new(),
            next_split: 1,
            forced_dimension: 0,
            forced_splits: 0,
            exempt: false,
            depth,
        }
    }

    /// Region this box is responsible for, grown to cover every point it has received.
    #[inline]
    pub fn current_boundary(&self) -> &HyperBox
    {
        &self.current_boundary
    }

    /// Tight bounds of the points folded in so far; `None` before the first one.
    #[inline]
    pub fn observed_boundary(&self) -> Option<&HyperBox>
    {
        self.observed_boundary.as_ref()
    }

    /// `(dimension, value)` of the current split.
    #[inline]
    pub fn split(&self) -> Option<(usize, f64)>
    {
        self.split
    }

    #[inline]
    pub fn depth(&self) -> usize
    {
        self.depth
    }

    fn force_splits(&mut self, dimension: usize, num_splits: usize)
    {
        self.forced_dimension = dimension;
        self.forced_splits = num_splits;
    }

    /// A freshly built child has received all of its points at once, so it may split on them.
    fn permit_splitting(&mut self)
    {
        self.next_split = self.num_datapoints();
    }

    ///
    /// Folds the queued points in one at a time, reconsidering the split at every threshold the
    /// live count reaches. The tree therefore depends only on the order of insertion, never on
    /// how the insertions were chunked between reads.
    ///
    fn apply_pending(&mut self, ctx: TreeContext<'_, A>)
    {
        for point in std::mem::take(&mut self.pending)
        {
            self.add_now(point, ctx);
            if self.live.len() >= self.next_split
            {
                self.next_split = ctx.options.next_split_threshold(self.next_split);
                self.consider_splitting(ctx);
            }
        }
    }

    fn add_now(&mut self, point: PointRef<A, I>, ctx: TreeContext<'_, A>)
    {
        self.summary = ctx.aggregator.combine(&self.summary, point.item());
        self.observed_boundary.get_or_insert_with(|| HyperBox::from_point(point.inputs())).expand_to_include(point.inputs());
        self.current_boundary.expand_to_include(point.inputs());
        if let (Some(children), Some((dimension, value))) = (self.children.as_mut(), self.split)
        {
            children[side_of(point.input(dimension), value)].add_datapoint(point.clone());
        }
        self.live.insert(point.id(), point);
    }

    fn observed_width(&self, dimension: usize) -> f64
    {
        self.observed_boundary.as_ref().map_or(0.0, |b| b.width(dimension))
    }

    /// A box that has split keeps its current children when no new split can be made.
    fn consider_splitting(&mut self, ctx: TreeContext<'_, A>)
    {
        if let Some((dimension, forced_splits)) = self.choose_split_dimension(ctx)
        {
            self.split_dimension(dimension, forced_splits, ctx);
        }
    }

    ///
    /// Dimension to split next and the number of forced splits to hand down, or `None` if no
    /// dimension can be split.
    ///
    fn choose_split_dimension(&self, ctx: TreeContext<'_, A>) -> Option<(usize, usize)>
    {
        let count = self.live.len();
        if count <= 1
        {
            return None;
        }
        let num_dimensions = self.current_boundary.num_dimensions();
        let (forced_dimension, forced_splits) = if self.exempt
        {
            (0, ctx.options.exempt_split_budget(count))
        }
        else
        {
            (self.forced_dimension, self.forced_splits)
        };
        if forced_splits > 0 && self.observed_width(forced_dimension) > 0.0
        {
            return Some((forced_dimension, forced_splits));
        }
        if num_dimensions == 1
        {
            return (self.observed_width(0) > 0.0).then_some((0, 0));
        }

        #[cfg(feature = "tracing")]
        trace!(depth = self.depth, count, num_dimensions, "probing split dimensions");
        let points: Vec<PointRef<A, I>> = self.live.values().cloned().collect();
        let boundary = &self.current_boundary;
        let probes = map_indices(num_dimensions, |sort_dimension|
        {
            let order = (0..num_dimensions).filter(|&d| d != sort_dimension).collect();
            ProbeNode::build(boundary.clone(), order, sort_dimension, points.clone(), ctx)
        });

        // the dimension whose probe suffers most from never being split
        let mut best: Option<(usize, f64)> = None;
        for (dimension, probe) in probes.iter().enumerate()
        {
            if self.observed_width(dimension) > 0.0 && best.map_or(true, |(_, error)| probe.error() > error)
            {
                best = Some((dimension, probe.error()));
            }
        }
        let (mut dimension, mut best_error) = best?;

        // too little data for the deep comparison; take the lead dimension of the calmest probe
        if probes[dimension].depth() < num_dimensions
        {
            for probe in &probes
            {
                if let Some(d) = probe.first_split_dimension()
                {
                    if self.observed_width(d) > 0.0 && probe.error() < best_error
                    {
                        dimension = d;
                        best_error = probe.error();
                    }
                }
            }
        }
        #[cfg(feature = "tracing")]
        debug!(depth = self.depth, dimension, error = best_error, probe_depth = probes[dimension].depth(), count, "chose split dimension");
        Some((dimension, 0))
    }

    ///
    /// Rebuilds both children from every live point, splitting at the estimated median along
    /// `dimension`. Leaves the box as it is if no value strictly inside the observed range can
    /// be found.
    ///
    fn split_dimension(&mut self, dimension: usize, forced_splits: usize, ctx: TreeContext<'_, A>)
    {
        let Some(observed) = self.observed_boundary.as_ref().and_then(|b| b.interval(dimension)).copied() else { return; };
        let values: Vec<f64> = self.live.values().map(|p| p.input(dimension)).collect();
        let mut split_value = estimate_median(&values).unwrap_or_else(|_| observed.middle());
        if split_value >= observed.high || split_value <= observed.low
        {
            split_value = observed.middle();
            if split_value >= observed.high || split_value <= observed.low
            {
                #[cfg(feature = "tracing")]
                trace!(depth = self.depth, dimension, low = observed.low, high = observed.high, "split aborted");
                return;
            }
        }

        let (lower_boundary, upper_boundary) = self.current_boundary.split_at(dimension, split_value);
        let mut lower = Self::new(lower_boundary, ctx.aggregator, self.depth + 1);
        let mut upper = Self::new(upper_boundary, ctx.aggregator, self.depth + 1);
        if forced_splits > 1
        {
            let next_dimension = (dimension + 1) % self.current_boundary.num_dimensions();
            lower.force_splits(next_dimension, forced_splits - 1);
            upper.force_splits(next_dimension, forced_splits - 1);
        }
        for point in self.live.values()
        {
            if side_of(point.input(dimension), split_value) == 0
            {
                lower.add_datapoint(point.clone());
            }
            else
            {
                upper.add_datapoint(point.clone());
            }
        }
        lower.permit_splitting();
        upper.permit_splitting();
        self.split = Some((dimension, split_value));
        self.children = Some(Box::new([lower, upper]));
    }

    ///
    /// Depth-first midpoints of the boxes where a trust-limited descent stops.
    ///
    pub(crate) fn collect_representative_points(&mut self, ctx: TreeContext<'_, A>, rule: &StopRule, points: &mut Vec<Vec<f64>>)
    {
        let distribution = self.distribution(ctx);
        if rule.should_descend(&distribution, self.num_datapoints())
        {
            if let Some(children) = self.children.as_mut()
            {
                for child in children.iter_mut()
                {
                    child.collect_representative_points(ctx, rule, points);
                }
                return;
            }
        }
        if let Some(observed) = self.observed_boundary.as_ref()
        {
            points.push(observed.middle());
        }
    }

    /// `(depth, split, live count)` of every box in pre-order.
    #[cfg(test)]
    pub(crate) fn structure(&mut self, ctx: TreeContext<'_, A>) -> Vec<(usize, Option<(usize, f64)>, usize)>
    {
        self.apply_pending(ctx);
        let mut result = vec![(self.depth, self.split, self.live.len())];
        if let Some(children) = self.children.as_mut()
        {
            for child in children.iter_mut()
            {
                result.extend(child.structure(ctx));
            }
        }
        result
    }
}

/// Points on the split value belong to the lower child.
#[inline]
fn side_of(coordinate: f64, split_value: f64) -> usize
{
    usize::from(coordinate > split_value)
}

impl<A, I> SplitNode<A, I> for PartitionNode<A, I>
where
    A: Aggregator + ParallelMarker,
    A::Item: ParallelMarker,
    I: Inputs + ParallelMarker,
{
    fn add_datapoint(&mut self, point: PointRef<A, I>)
    {
        self.pending.push(point);
    }

    fn remove_datapoint(&mut self, id: DatapointId, ctx: TreeContext<'_, A>) -> bool
    {
        if let Some(index) = self.pending.iter().position(|p| p.id() == id)
        {
            self.pending.remove(index);
            return true;
        }
        let Some(point) = self.live.shift_remove(&id) else { return false; };
        self.summary = if self.live.is_empty()
        {
            ctx.aggregator.default_summary()
        }
        else
        {
            ctx.aggregator.remove(&self.summary, point.item())
        };
        // boundaries are not shrunk
        if let Some(children) = self.children.as_mut()
        {
            for child in children.iter_mut()
            {
                child.remove_datapoint(id, ctx);
            }
        }
        true
    }

    #[inline]
    fn num_datapoints(&self) -> usize
    {
        self.live.len() + self.pending.len()
    }

    fn distribution(&mut self, ctx: TreeContext<'_, A>) -> Distribution
    {
        self.apply_pending(ctx);
        ctx.aggregator.to_distribution(&self.summary)
    }

    fn choose_child<Q: Inputs + ?Sized>(&mut self, query: &Q, ctx: TreeContext<'_, A>) -> Option<usize>
    {
        self.apply_pending(ctx);
        let (dimension, _) = self.split?;
        let children = self.children.as_ref()?;
        if children[0].current_boundary.contains(query)
        {
            return Some(0);
        }
        if children[1].current_boundary.contains(query)
        {
            return Some(1);
        }
        let lower_high = children[0].current_boundary.interval(dimension).map_or(f64::INFINITY, |i| i.high);
        Some(if lower_high < query.input(dimension) { 1 } else { 0 })
    }

    fn child_mut(&mut self, side: usize) -> Option<&mut Self>
    {
        self.children.as_mut().and_then(|children| children.get_mut(side))
    }

    fn datapoints(&self) -> Vec<PointRef<A, I>>
    {
        self.live.values().chain(self.pending.iter()).cloned().collect()
    }
}
