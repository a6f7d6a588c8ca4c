use crate::algorithms::median::estimate_median;
use crate::datapoint::Inputs;
use crate::distribution::Aggregator;
use crate::hyper_box::HyperBox;
use crate::tree::{PointRef, TreeContext};

///
/// Disposable measuring tree. It splits every dimension in `order` round-robin but never its
/// sort dimension, then reports how much the outputs jump between neighbouring boxes along the
/// sort dimension. A large jump means the sort dimension is costly to leave unsplit.
///
/// Each level forwards at most `count / probe_sample_divisor` points to each child, so the whole
/// probe costs time linear in the number of points. Only the measurements are kept.
///
pub struct ProbeNode<A: Aggregator, I>
{
    count: usize,
    depth: usize,
    total_error: f64,
    first_split_dimension: Option<usize>,
    split: Option<(usize, f64)>,
    min_point: Option<PointRef<A, I>>,
    max_point: Option<PointRef<A, I>>,
}

impl<A: Aggregator, I: Inputs> ProbeNode<A, I>
{
    pub fn build(boundary: HyperBox, order: Vec<usize>, sort_dimension: usize, points: Vec<PointRef<A, I>>, ctx: TreeContext<'_, A>) -> Self
    {
        let mut node = Self
        {
            count: points.len(),
            depth: 0,
            total_error: 0.0,
            first_split_dimension: order.first().copied(),
            split: None,
            min_point: None,
            max_point: None,
        };
        let Some(first) = points.first() else { return node; };

        let mut current = boundary;
        let mut observed = HyperBox::from_point(first.inputs());
        for point in &points
        {
            observed.expand_to_include(point.inputs());
            current.expand_to_include(point.inputs());
            let x = point.input(sort_dimension);
            if node.max_point.as_ref().map_or(true, |p| p.input(sort_dimension) <= x)
            {
                node.max_point = Some(point.clone());
            }
            if node.min_point.as_ref().map_or(true, |p| p.input(sort_dimension) >= x)
            {
                node.min_point = Some(point.clone());
            }
        }

        let Some(dimension) = order.iter().copied().find(|&d| observed.is_splittable(d)) else { return node; };
        let values: Vec<f64> = points.iter().map(|p| p.input(dimension)).collect();
        let Ok(mut split_value) = estimate_median(&values) else { return node; };
        if let Some(edges) = current.interval(dimension)
        {
            if split_value == edges.low || split_value == edges.high
            {
                split_value = edges.middle();
            }
        }

        let mut child_order: Vec<usize> = order.iter().copied().filter(|&d| d != dimension).collect();
        child_order.push(dimension);

        let capacity = points.len() / ctx.options.probe_sample_divisor.max(2);
        let mut lower_points = Vec::with_capacity(capacity);
        let mut upper_points = Vec::with_capacity(capacity);
        for point in points
        {
            let side = if point.input(dimension) >= split_value { &mut upper_points } else { &mut lower_points };
            if side.len() < capacity
            {
                side.push(point);
            }
        }

        let (lower_boundary, upper_boundary) = current.split_at(dimension, split_value);
        let lower = Self::build(lower_boundary, child_order.clone(), sort_dimension, lower_points, ctx);
        let upper = Self::build(upper_boundary, child_order, sort_dimension, upper_points, ctx);

        let jump = match (&upper.min_point, &lower.max_point)
        {
            (Some(next), Some(previous)) =>
            {
                let difference = ctx.aggregator.item_distribution(next.item()).mean() - ctx.aggregator.item_distribution(previous.item()).mean();
                difference * difference
            }
            _ => 0.0,
        };
        node.total_error = lower.total_error + jump + upper.total_error;
        node.depth = lower.depth.max(upper.depth) + 1;
        node.split = Some((dimension, split_value));
        node
    }

    /// Accumulated squared jump per datapoint.
    pub fn error(&self) -> f64
    {
        if self.count == 0 { 0.0 } else { self.total_error / self.count as f64 }
    }

    #[inline]
    pub fn depth(&self) -> usize
    {
        self.depth
    }

    /// Dimension first in this probe's split order.
    #[inline]
    pub fn first_split_dimension(&self) -> Option<usize>
    {
        self.first_split_dimension
    }

    #[inline]
    pub fn split(&self) -> Option<(usize, f64)>
    {
        self.split
    }
}
