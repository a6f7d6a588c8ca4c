use std::sync::Arc;

use crate::algorithms::neighborhood::{with_neighborhood, StopRule};
use crate::datapoint::{Datapoint, DatapointId, Inputs};
use crate::distribution::{Aggregator, Distribution};
use crate::errors::AIError;
use crate::hyper_box::HyperBox;
use crate::options::InterpolatorOptions;
use crate::tree::partition_node::PartitionNode;
use crate::tree::{SplitNode, TreeContext};
use crate::utilities::parallel::ParallelMarker;

///
/// Online interpolator over a fixed number of input dimensions. Datapoints may be added and
/// removed at any time; queries return the output distribution of the coarsest box around the
/// query that is statistically trustworthy.
///
/// ```
/// use adaptive_interpolation::{HyperBox, Interpolator, ScalarAggregator};
///
/// let mut interpolator = Interpolator::new(HyperBox::new(&[0.0], &[100.0]), ScalarAggregator);
/// for x in (0..=100).step_by(10)
/// {
///     interpolator.add_datapoint(vec![x as f64], x as f64).unwrap();
/// }
/// let estimate = interpolator.interpolate(&[50.0]).unwrap();
/// assert!(estimate.weight() >= 1.0);
/// ```
///
pub struct Interpolator<A: Aggregator, I = Vec<f64>>
{
    root: PartitionNode<A, I>,
    aggregator: A,
    options: InterpolatorOptions,
    num_dimensions: usize,
    next_id: u64,
}

impl<A, I> Interpolator<A, I>
where
    A: Aggregator + ParallelMarker,
    A::Item: ParallelMarker,
    I: Inputs + ParallelMarker,
{
    ///
    /// `boundary` is the expected input region and fixes the number of dimensions. Points
    /// outside it are still accepted and grow the root box.
    ///
    pub fn new(boundary: HyperBox, aggregator: A) -> Self
    {
        Self::with_options(boundary, aggregator, InterpolatorOptions::default())
    }

    pub fn with_options(boundary: HyperBox, aggregator: A, options: InterpolatorOptions) -> Self
    {
        let num_dimensions = boundary.num_dimensions();
        Self
        {
            root: PartitionNode::new_root(boundary, &aggregator),
            aggregator,
            options,
            num_dimensions,
            next_id: 0,
        }
    }

    #[inline]
    pub fn num_dimensions(&self) -> usize
    {
        self.num_dimensions
    }

    #[inline]
    pub fn num_datapoints(&self) -> usize
    {
        self.root.num_datapoints()
    }

    #[inline]
    pub fn options(&self) -> &InterpolatorOptions
    {
        &self.options
    }

    ///
    /// Adds an observation and returns the id used to remove it later. The tree is updated
    /// lazily by the next query.
    ///
    pub fn add_datapoint(&mut self, inputs: I, item: A::Item) -> Result<DatapointId, AIError>
    {
        self.insert(inputs, item, None)
    }

    /// Like [`Self::add_datapoint`], also storing output coordinates on the datapoint.
    pub fn add_datapoint_with_outputs(&mut self, inputs: I, item: A::Item, outputs: Vec<f64>) -> Result<DatapointId, AIError>
    {
        self.insert(inputs, item, Some(outputs))
    }

    ///
    /// Adds every `(inputs, item)` pair. Nothing is added if any of them has the wrong number
    /// of dimensions. Produces the same tree as adding them one at a time.
    ///
    pub fn add_datapoints<T: IntoIterator<Item = (I, A::Item)>>(&mut self, datapoints: T) -> Result<Vec<DatapointId>, AIError>
    {
        let datapoints: Vec<(I, A::Item)> = datapoints.into_iter().collect();
        for (inputs, _) in &datapoints
        {
            AIError::check_dimensions(self.num_dimensions, inputs.num_coordinates())?;
        }
        datapoints.into_iter().map(|(inputs, item)| self.insert(inputs, item, None)).collect()
    }

    fn insert(&mut self, inputs: I, item: A::Item, outputs: Option<Vec<f64>>) -> Result<DatapointId, AIError>
    {
        AIError::check_dimensions(self.num_dimensions, inputs.num_coordinates())?;
        let id = DatapointId(self.next_id);
        self.next_id += 1;
        self.root.add_datapoint(Arc::new(Datapoint::new(id, inputs, item, outputs)));
        Ok(id)
    }

    ///
    /// Removes a datapoint. Returns false if the id is unknown or was already removed.
    ///
    pub fn remove_datapoint(&mut self, id: DatapointId) -> bool
    {
        let ctx = TreeContext::new(&self.aggregator, &self.options);
        self.root.remove_datapoint(id, ctx)
    }

    /// Output distribution estimated at `query`.
    pub fn interpolate<Q: Inputs + ?Sized>(&mut self, query: &Q) -> Result<Distribution, AIError>
    {
        let max_levels = self.options.max_levels;
        self.interpolate_with_limit(query, max_levels)
    }

    ///
    /// Like [`Self::interpolate`] but descends at most `max_levels` levels below the root.
    ///
    pub fn interpolate_with_limit<Q: Inputs + ?Sized>(&mut self, query: &Q, max_levels: Option<usize>) -> Result<Distribution, AIError>
    {
        self.neighborhood(query, max_levels, |node, ctx| node.distribution(ctx))
    }

    /// The datapoints the estimate at `query` is based on.
    pub fn justify_interpolation<Q: Inputs + ?Sized>(&mut self, query: &Q) -> Result<Vec<Arc<Datapoint<A::Item, I>>>, AIError>
    {
        let max_levels = self.options.max_levels;
        self.neighborhood(query, max_levels, |node, _| node.datapoints())
    }

    ///
    /// Bounds of the datapoints the estimate at `query` is based on. An empty box reports the
    /// region it is responsible for instead.
    ///
    pub fn find_neighborhood_coordinates<Q: Inputs + ?Sized>(&mut self, query: &Q) -> Result<HyperBox, AIError>
    {
        let max_levels = self.options.max_levels;
        self.neighborhood(query, max_levels, |node, _|
        {
            node.observed_boundary().cloned().unwrap_or_else(|| node.current_boundary().clone())
        })
    }

    /// Distribution of every datapoint.
    pub fn get_average(&mut self) -> Distribution
    {
        let ctx = TreeContext::new(&self.aggregator, &self.options);
        self.root.distribution(ctx)
    }

    ///
    /// Centres of the boxes where a trust-limited descent stops, in depth-first order. They are
    /// denser where the outputs vary more.
    ///
    pub fn find_representative_points(&mut self) -> Vec<Vec<f64>>
    {
        let ctx = TreeContext::new(&self.aggregator, &self.options);
        let root_distribution = self.root.distribution(ctx);
        let rule = StopRule::new(&root_distribution, self.root.num_datapoints(), &self.options);
        let mut points = Vec::new();
        self.root.collect_representative_points(ctx, &rule, &mut points);
        points
    }

    fn neighborhood<Q, R, F>(&mut self, query: &Q, max_levels: Option<usize>, f: F) -> Result<R, AIError>
    where
        Q: Inputs + ?Sized,
        F: FnOnce(&mut PartitionNode<A, I>, TreeContext<'_, A>) -> R,
    {
        AIError::check_dimensions(self.num_dimensions, query.num_coordinates())?;
        let ctx = TreeContext::new(&self.aggregator, &self.options);
        let root_distribution = self.root.distribution(ctx);
        let rule = StopRule::new(&root_distribution, self.root.num_datapoints(), &self.options);
        Ok(with_neighborhood::<A, I, _, Q, R, _>(&mut self.root, query, ctx, &rule, max_levels, |node| f(node, ctx)))
    }
}

#[cfg(test)]
mod tests
{
    use approx::assert_abs_diff_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;
    use crate::distribution::{DistributionAggregator, ScalarAggregator};

    fn one_dimensional() -> Interpolator<ScalarAggregator>
    {
        let mut interpolator = Interpolator::new(HyperBox::new(&[0.0], &[100.0]), ScalarAggregator);
        for x in (0..=100).step_by(10)
        {
            interpolator.add_datapoint(vec![x as f64], x as f64).unwrap();
        }
        interpolator
    }

    fn f(x: &[f64]) -> f64
    {
        1.0 / (x[0] + 1.0) + 1.0 / (x[1] + 1.0) + 1.0 / (x[2] + 1.0)
    }

    fn grid_points(seed: u64, count: usize) -> Vec<Vec<f64>>
    {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..count).map(|_| (0..3).map(|_| rng.gen_range(0..30) as f64).collect()).collect()
    }

    #[test]
    fn check_one_dimensional_neighborhood()
    {
        let mut interpolator = one_dimensional();
        assert_eq!(interpolator.num_datapoints(), 11);
        let estimate = interpolator.interpolate(&[50.0]).unwrap();
        assert!((estimate.mean() - 50.0).abs() <= 10.0, "{estimate}");
        assert!(estimate.std_dev() < 10.0);
        assert!(estimate.weight() >= 2.0 && estimate.weight() < 11.0);

        let far = interpolator.interpolate(&[1000.0]).unwrap();
        assert!(far.mean() >= 0.0 && far.mean() <= 100.0);

        let average = interpolator.get_average();
        assert_abs_diff_eq!(average.mean(), 50.0, epsilon = 1e-12);
        assert_eq!(average.weight(), 11.0);

        let justification = interpolator.justify_interpolation(&[50.0]).unwrap();
        assert_eq!(justification.len() as f64, estimate.weight());
        let neighborhood = interpolator.find_neighborhood_coordinates(&[50.0]).unwrap();
        assert!(justification.iter().all(|p| neighborhood.contains(p.inputs())));
    }

    #[test]
    fn check_dimension_mismatch()
    {
        let mut interpolator = one_dimensional();
        assert_eq!(interpolator.add_datapoint(vec![1.0, 2.0], 3.0), Err(AIError::DimensionMismatch { expected: 1, found: 2 }));
        assert_eq!(interpolator.interpolate(&[1.0, 2.0]).unwrap_err(), AIError::DimensionMismatch { expected: 1, found: 2 });
        assert!(interpolator.justify_interpolation(&[]).is_err());
        let batch = interpolator.add_datapoints(vec![(vec![5.0], 5.0), (vec![], 1.0)]);
        assert_eq!(batch, Err(AIError::DimensionMismatch { expected: 1, found: 0 }));
        assert_eq!(interpolator.num_datapoints(), 11);
    }

    #[test]
    fn check_max_levels()
    {
        let mut interpolator = one_dimensional();
        let root_only = interpolator.interpolate_with_limit(&[50.0], Some(0)).unwrap();
        assert_eq!(root_only.weight(), 11.0);
        let one_level = interpolator.interpolate_with_limit(&[50.0], Some(1)).unwrap();
        assert!(one_level.weight() <= 11.0);
        let unlimited = interpolator.interpolate(&[50.0]).unwrap();
        assert!(unlimited.weight() <= one_level.weight());
    }

    #[test]
    fn check_chunking_does_not_change_structure()
    {
        let points = grid_points(7, 600);
        let boundary = HyperBox::new(&[0.0, 0.0, 0.0], &[30.0, 30.0, 30.0]);

        let mut batch = Interpolator::new(boundary.clone(), ScalarAggregator);
        batch.add_datapoints(points.iter().map(|p| (p.clone(), f(p)))).unwrap();

        let mut incremental = Interpolator::new(boundary.clone(), ScalarAggregator);
        for p in &points
        {
            incremental.add_datapoint(p.clone(), f(p)).unwrap();
            incremental.interpolate(p).unwrap();
        }

        let mut chunked = Interpolator::new(boundary, ScalarAggregator);
        for (i, p) in points.iter().enumerate()
        {
            chunked.add_datapoint(p.clone(), f(p)).unwrap();
            if i % 37 == 0
            {
                chunked.interpolate(&[1.0, 2.0, 3.0]).unwrap();
            }
        }

        let expected = batch.root.structure(TreeContext::new(&batch.aggregator, &batch.options));
        assert!(expected.len() > 1);
        assert_eq!(incremental.root.structure(TreeContext::new(&incremental.aggregator, &incremental.options)), expected);
        assert_eq!(chunked.root.structure(TreeContext::new(&chunked.aggregator, &chunked.options)), expected);
    }

    #[test]
    fn check_interpolation_beats_global_mean()
    {
        let points = grid_points(3, 600);
        let mut interpolator = Interpolator::new(HyperBox::new(&[0.0, 0.0, 0.0], &[30.0, 30.0, 30.0]), ScalarAggregator);
        for p in &points
        {
            interpolator.add_datapoint(p.clone(), f(p)).unwrap();
        }
        let variance = interpolator.get_average().variance();
        let mse = points[..200].iter().map(|p|
        {
            let error = interpolator.interpolate(p).unwrap().mean() - f(p);
            error * error
        }).sum::<f64>() / 200.0;
        assert!(mse < 0.85 * variance, "mse {mse} variance {variance}");
    }

    #[test]
    fn check_remove_datapoints()
    {
        let points = grid_points(11, 50);
        let mut interpolator = Interpolator::new(HyperBox::new(&[0.0, 0.0, 0.0], &[30.0, 30.0, 30.0]), DistributionAggregator);
        let ids: Vec<DatapointId> = points.iter().map(|p| interpolator.add_datapoint(p.clone(), Distribution::from_value(p[0])).unwrap()).collect();
        interpolator.interpolate(&[1.0, 1.0, 1.0]).unwrap();
        for id in &ids[..20]
        {
            assert!(interpolator.remove_datapoint(*id));
        }
        assert!(!interpolator.remove_datapoint(ids[0]));
        assert_eq!(interpolator.num_datapoints(), 30);
        for id in &ids[20..]
        {
            assert!(interpolator.remove_datapoint(*id));
        }
        assert_eq!(interpolator.num_datapoints(), 0);
        let average = interpolator.get_average();
        // integer coordinates cancel exactly
        assert_eq!(average.weight(), 0.0);
        assert_eq!(average.sum_value(), 0.0);
        let estimate = interpolator.interpolate(&[5.0, 5.0, 5.0]).unwrap();
        assert_eq!(estimate.mean(), 0.0);
    }

    #[test]
    fn check_representative_points()
    {
        let points = grid_points(5, 400);
        let mut interpolator = Interpolator::new(HyperBox::new(&[0.0, 0.0, 0.0], &[30.0, 30.0, 30.0]), ScalarAggregator);
        for p in &points
        {
            interpolator.add_datapoint(p.clone(), f(p)).unwrap();
        }
        let representatives = interpolator.find_representative_points();
        assert!(!representatives.is_empty());
        for point in &representatives
        {
            assert_eq!(point.len(), 3);
            assert!(point.iter().all(|&x| (0.0..=29.0).contains(&x)));
        }

        let mut one = one_dimensional();
        let representatives = one.find_representative_points();
        assert!(representatives.len() > 1);
        assert!(representatives.iter().all(|p| (0.0..=100.0).contains(&p[0])));
    }

    #[test]
    fn check_outputs_travel_with_datapoint()
    {
        let mut interpolator = Interpolator::new(HyperBox::new(&[0.0, 0.0], &[1.0, 1.0]), ScalarAggregator);
        let id = interpolator.add_datapoint_with_outputs(vec![0.5, 0.5], 2.0, vec![7.0, 8.0]).unwrap();
        let justification = interpolator.justify_interpolation(&[0.5, 0.5]).unwrap();
        assert_eq!(justification.len(), 1);
        assert_eq!(justification[0].id(), id);
        assert_eq!(justification[0].outputs(), Some(&[7.0, 8.0][..]));
        assert_eq!(interpolator.num_dimensions(), 2);
        assert_eq!(interpolator.options(), &InterpolatorOptions::default());
    }
}
