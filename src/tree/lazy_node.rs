use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
#[cfg(feature = "tracing")]
use tracing::trace;

use crate::datapoint::{DatapointId, Inputs};
use crate::distribution::{Aggregator, Distribution};
use crate::tree::threshold::ThresholdComparison;
use crate::tree::{PointRef, SplitNode, TreeContext};
use crate::utilities::parallel::{map_indices, ParallelMarker};

///
/// Box of the lazy-dimension engine. Instead of one cut it keeps a handful of
/// [`ThresholdComparison`]s and sends a point to whichever child collects more vote weight.
/// The comparisons are found by a knockout over all dimensions that starts with a tiny sample
/// and only looks at more points once few dimensions remain, so only a small share of the
/// coordinates of each point is ever evaluated.
///
pub struct LazyPartitionNode<A: Aggregator, I>
{
    comparisons: Vec<ThresholdComparison>,
    children: Option<Box<[LazyPartitionNode<A, I>; 2]>>,
    summary: A::Summary,
    live: IndexMap<DatapointId, PointRef<A, I>, FxBuildHasher>,
    pending: Vec<PointRef<A, I>>,
    next_split: usize,
    depth: usize,
}

impl<A, I> LazyPartitionNode<A, I>
where
    A: Aggregator + ParallelMarker,
    A::Item: ParallelMarker,
    I: Inputs + ParallelMarker,
{
    pub fn new(aggregator: &A, depth: usize) -> Self
    {
        Self
        {
            comparisons: Vec::new(),
            children: None,
            summary: aggregator.default_summary(),
            live: IndexMap::default(),
            pending: Vec::new(),
            next_split: 1,
            depth,
        }
    }

    /// Comparisons currently routing points between the children.
    #[inline]
    pub fn comparisons(&self) -> &[ThresholdComparison]
    {
        &self.comparisons
    }

    #[inline]
    pub fn depth(&self) -> usize
    {
        self.depth
    }

    fn votes_upper<Q: Inputs + ?Sized>(&self, inputs: &Q) -> bool
    {
        let (mut lower, mut upper) = (0.0, 0.0);
        for comparison in &self.comparisons
        {
            if comparison.evaluate(inputs.input(comparison.dimension))
            {
                upper += comparison.weight;
            }
            else
            {
                lower += comparison.weight;
            }
        }
        upper > lower
    }

    /// Reconsiders the comparisons at every threshold the live count reaches.
    fn apply_pending(&mut self, ctx: TreeContext<'_, A>)
    {
        for point in std::mem::take(&mut self.pending)
        {
            self.summary = ctx.aggregator.combine(&self.summary, point.item());
            if self.children.is_some()
            {
                let side = usize::from(self.votes_upper(point.inputs()));
                if let Some(children) = self.children.as_mut()
                {
                    children[side].add_datapoint(point.clone());
                }
            }
            self.live.insert(point.id(), point);
            if self.live.len() >= self.next_split
            {
                self.next_split = ctx.options.next_split_threshold(self.next_split);
                self.consider_splitting(ctx);
            }
        }
    }

    /// A box that has split keeps its comparisons and children when no new split can be made.
    fn consider_splitting(&mut self, ctx: TreeContext<'_, A>)
    {
        if let Some(comparisons) = self.choose_comparisons(ctx)
        {
            self.split(comparisons, ctx);
        }
    }

    ///
    /// Knockout over every dimension. Each round scores the remaining candidates on the newest
    /// datapoints, then pairs candidate `i` with candidate `len - 1 - i` and keeps the heavier
    /// one. The sample grows as the field shrinks, reaching half the live points when
    /// `log2(dimensions)` candidates are left.
    ///
    fn choose_comparisons(&self, ctx: TreeContext<'_, A>) -> Option<Vec<ThresholdComparison>>
    {
        let count = self.live.len();
        if count <= ctx.options.lazy_min_points_to_split
        {
            return None;
        }
        let num_dimensions = self.live.last()?.1.num_input_dimensions();
        if num_dimensions < 1
        {
            return None;
        }
        let max_sample = count / 2;
        let initial_sample = ctx.options.lazy_initial_sample.max(1);
        let target = ((num_dimensions as f64).log2() as usize).max(1);
        let exponent = sample_growth_exponent(initial_sample, max_sample, target, num_dimensions);

        let newest: Vec<PointRef<A, I>> = self.live.values().rev().cloned().collect();
        let mut candidates: Vec<usize> = (0..num_dimensions).collect();
        loop
        {
            let ratio = num_dimensions as f64 / candidates.len() as f64;
            let sample = ((initial_sample as f64 * ratio.powf(exponent)) as usize).min(max_sample).max(initial_sample).min(count);
            let points = &newest[..sample];
            let dimensions = &candidates;
            let scored = map_indices(candidates.len(), |i| score_candidate(dimensions[i], points, ctx.aggregator));
            if scored.len() <= target
            {
                #[cfg(feature = "tracing")]
                trace!(depth = self.depth, count, sample, comparisons = ?scored, "chose threshold comparisons");
                return Some(scored);
            }
            let survivors = (candidates.len() + 1) / 2;
            candidates = (0..survivors).map(|i|
            {
                let other = candidates.len() - 1 - i;
                if scored[i].weight >= scored[other].weight { candidates[i] } else { candidates[other] }
            }).collect();
        }
    }

    ///
    /// Rebuilds both children from every live point under `comparisons`. If every point votes
    /// the same way the previous comparisons stay in place.
    ///
    fn split(&mut self, comparisons: Vec<ThresholdComparison>, ctx: TreeContext<'_, A>)
    {
        let previous = std::mem::replace(&mut self.comparisons, comparisons);
        let mut lower = Self::new(ctx.aggregator, self.depth + 1);
        let mut upper = Self::new(ctx.aggregator, self.depth + 1);
        for point in self.live.values()
        {
            if self.votes_upper(point.inputs())
            {
                upper.add_datapoint(point.clone());
            }
            else
            {
                lower.add_datapoint(point.clone());
            }
        }
        if lower.num_datapoints() == 0 || upper.num_datapoints() == 0
        {
            self.comparisons = previous;
            return;
        }
        lower.next_split = lower.num_datapoints();
        upper.next_split = upper.num_datapoints();
        self.children = Some(Box::new([lower, upper]));
    }

    #[cfg(test)]
    pub(crate) fn structure(&mut self, ctx: TreeContext<'_, A>) -> Vec<(usize, Vec<ThresholdComparison>, usize)>
    {
        self.apply_pending(ctx);
        let mut result = vec![(self.depth, self.comparisons.clone(), self.live.len())];
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

///
/// Exponent `e` with `initial * (dimensions / target)^e = max_sample`, capped at 1.
///
fn sample_growth_exponent(initial_sample: usize, max_sample: usize, target: usize, num_dimensions: usize) -> f64
{
    let dimension_fraction = target as f64 / num_dimensions as f64;
    let sample_fraction = initial_sample as f64 / max_sample as f64;
    if dimension_fraction >= 1.0 || sample_fraction >= 1.0
    {
        return 1.0;
    }
    let exponent = sample_fraction.ln() / dimension_fraction.ln();
    if exponent.is_finite() { exponent.min(1.0) } else { 1.0 }
}

///
/// Splits `points` at the midpoint of their range along `dimension` and weighs the split by how
/// far apart the mean outputs of the two halves are, in units of their combined spread.
///
fn score_candidate<A: Aggregator, I: Inputs>(dimension: usize, points: &[PointRef<A, I>], aggregator: &A) -> ThresholdComparison
{
    let inputs: Vec<f64> = points.iter().map(|p| p.input(dimension)).collect();
    let (min, max) = inputs.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &x| (min.min(x), max.max(x)));
    let threshold = (min + max) / 2.0;

    let (mut low, mut high) = (Distribution::zero(), Distribution::zero());
    for (point, &x) in points.iter().zip(&inputs)
    {
        let output = aggregator.item_distribution(point.item()).mean();
        if x <= threshold
        {
            low = low.plus_value(output);
        }
        else
        {
            high = high.plus_value(output);
        }
    }
    let weight = if low.weight() <= 0.0 || high.weight() <= 0.0
    {
        0.0
    }
    else
    {
        let spread = (low.variance() + high.variance()).sqrt();
        let spread = if spread > 0.0 { spread } else { 1.0 };
        (high.mean() - low.mean()).abs() / spread
    };
    ThresholdComparison::new(dimension, threshold, weight, high.mean() > low.mean())
}

impl<A, I> SplitNode<A, I> for LazyPartitionNode<A, I>
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
        self.children.as_ref()?;
        Some(usize::from(self.votes_upper(query)))
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
