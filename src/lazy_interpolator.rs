use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::debug;

use crate::algorithms::neighborhood::{with_neighborhood, StopRule};
use crate::datapoint::{Datapoint, DatapointId, Inputs};
use crate::distribution::{Aggregator, Distribution};
use crate::errors::AIError;
use crate::options::InterpolatorOptions;
use crate::tree::lazy_node::LazyPartitionNode;
use crate::tree::{SplitNode, TreeContext};
use crate::utilities::parallel::ParallelMarker;

///
/// Interpolator for inputs with very many, possibly expensive, coordinates. Boxes route points
/// by a weighted vote of single-coordinate comparisons, so building the tree and answering a
/// query only evaluate a small subset of the coordinates.
///
/// The number of dimensions is fixed by the first datapoint.
///
pub struct LazyInterpolator<A: Aggregator, I = Vec<f64>>
{
    root: LazyPartitionNode<A, I>,
    aggregator: A,
    options: InterpolatorOptions,
    num_dimensions: Option<usize>,
    next_id: u64,
}

impl<A, I> LazyInterpolator<A, I>
where
    A: Aggregator + ParallelMarker,
    A::Item: ParallelMarker,
    I: Inputs + ParallelMarker,
{
    /// Uses [`InterpolatorOptions::lazy`].
    pub fn new(aggregator: A) -> Self
    {
        Self::with_options(aggregator, InterpolatorOptions::lazy())
    }

    pub fn with_options(aggregator: A, options: InterpolatorOptions) -> Self
    {
        Self
        {
            root: LazyPartitionNode::new(&aggregator, 0),
            aggregator,
            options,
            num_dimensions: None,
            next_id: 0,
        }
    }

    /// `None` until the first datapoint is added.
    #[inline]
    pub fn num_dimensions(&self) -> Option<usize>
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

    pub fn add_datapoint(&mut self, inputs: I, item: A::Item) -> Result<DatapointId, AIError>
    {
        self.insert(inputs, item, None)
    }

    pub fn add_datapoint_with_outputs(&mut self, inputs: I, item: A::Item, outputs: Vec<f64>) -> Result<DatapointId, AIError>
    {
        self.insert(inputs, item, Some(outputs))
    }

    fn insert(&mut self, inputs: I, item: A::Item, outputs: Option<Vec<f64>>) -> Result<DatapointId, AIError>
    {
        let found = inputs.num_coordinates();
        match self.num_dimensions
        {
            Some(expected) => AIError::check_dimensions(expected, found)?,
            None =>
            {
                #[cfg(feature = "tracing")]
                debug!(num_dimensions = found, "lazy interpolator dimensionality fixed");
                self.num_dimensions = Some(found);
            }
        }
        let id = DatapointId(self.next_id);
        self.next_id += 1;
        self.root.add_datapoint(Arc::new(Datapoint::new(id, inputs, item, outputs)));
        Ok(id)
    }

    /// Returns false if the id is unknown or was already removed.
    pub fn remove_datapoint(&mut self, id: DatapointId) -> bool
    {
        let ctx = TreeContext::new(&self.aggregator, &self.options);
        self.root.remove_datapoint(id, ctx)
    }

    pub fn interpolate<Q: Inputs + ?Sized>(&mut self, query: &Q) -> Result<Distribution, AIError>
    {
        let max_levels = self.options.max_levels;
        self.interpolate_with_limit(query, max_levels)
    }

    pub fn interpolate_with_limit<Q: Inputs + ?Sized>(&mut self, query: &Q, max_levels: Option<usize>) -> Result<Distribution, AIError>
    {
        self.neighborhood(query, max_levels, |node, ctx| node.distribution(ctx))
    }

    pub fn justify_interpolation<Q: Inputs + ?Sized>(&mut self, query: &Q) -> Result<Vec<Arc<Datapoint<A::Item, I>>>, AIError>
    {
        let max_levels = self.options.max_levels;
        self.neighborhood(query, max_levels, |node, _| node.datapoints())
    }

    pub fn get_average(&mut self) -> Distribution
    {
        let ctx = TreeContext::new(&self.aggregator, &self.options);
        self.root.distribution(ctx)
    }

    fn neighborhood<Q, R, F>(&mut self, query: &Q, max_levels: Option<usize>, f: F) -> Result<R, AIError>
    where
        Q: Inputs + ?Sized,
        F: FnOnce(&mut LazyPartitionNode<A, I>, TreeContext<'_, A>) -> R,
    {
        if let Some(expected) = self.num_dimensions
        {
            AIError::check_dimensions(expected, query.num_coordinates())?;
        }
        let ctx = TreeContext::new(&self.aggregator, &self.options);
        let root_distribution = self.root.distribution(ctx);
        let rule = StopRule::new(&root_distribution, self.root.num_datapoints(), &self.options);
        Ok(with_neighborhood::<A, I, _, Q, R, _>(&mut self.root, query, ctx, &rule, max_levels, |node| f(node, ctx)))
    }
}

#[cfg(test)]
mod tests
{
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;
    use crate::datapoint::{EagerInput, LazyCoordinate, LazyInputList};
    use crate::distribution::ScalarAggregator;

    const DIMENSIONS: usize = 64;

    fn step(inputs: &[f64]) -> f64
    {
        (if inputs[3] > 0.5 { 10.0 } else { 0.0 }) + 0.5 * inputs[10]
    }

    fn random_inputs(rng: &mut StdRng) -> Vec<f64>
    {
        (0..DIMENSIONS).map(|_| rng.gen::<f64>()).collect()
    }

    fn trained(seed: u64, count: usize) -> LazyInterpolator<ScalarAggregator>
    {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut interpolator = LazyInterpolator::new(ScalarAggregator);
        for _ in 0..count
        {
            let inputs = random_inputs(&mut rng);
            let item = step(&inputs);
            interpolator.add_datapoint(inputs, item).unwrap();
        }
        interpolator
    }

    #[test]
    fn check_step_in_one_of_many_dimensions()
    {
        let mut interpolator = trained(1, 600);
        let mut rng = StdRng::seed_from_u64(99);
        let (mut high, mut low) = (0.0, 0.0);
        for _ in 0..20
        {
            let mut query = random_inputs(&mut rng);
            query[3] = 0.9;
            high += interpolator.interpolate(&query).unwrap().mean() / 20.0;
            query[3] = 0.1;
            low += interpolator.interpolate(&query).unwrap().mean() / 20.0;
        }
        assert!(high > 8.0, "high {high}");
        assert!(low < 2.0, "low {low}");
    }

    #[test]
    fn check_chunking_does_not_change_structure()
    {
        let mut batch = trained(4, 300);
        let mut rng = StdRng::seed_from_u64(4);
        let mut interleaved = LazyInterpolator::new(ScalarAggregator);
        for i in 0..300
        {
            let inputs = random_inputs(&mut rng);
            let item = step(&inputs);
            interleaved.add_datapoint(inputs, item).unwrap();
            if i % 7 == 0
            {
                interleaved.interpolate(&[0.5; DIMENSIONS]).unwrap();
            }
        }
        let expected = batch.root.structure(TreeContext::new(&batch.aggregator, &batch.options));
        assert!(expected.len() > 1);
        assert_eq!(interleaved.root.structure(TreeContext::new(&interleaved.aggregator, &interleaved.options)), expected);
    }

    #[test]
    fn check_dimensions_fixed_by_first_datapoint()
    {
        let mut interpolator = LazyInterpolator::new(ScalarAggregator);
        assert_eq!(interpolator.num_dimensions(), None);
        assert_eq!(interpolator.interpolate(&[1.0, 2.0]).unwrap().weight(), 0.0);
        interpolator.add_datapoint(vec![1.0, 2.0, 3.0], 4.0).unwrap();
        assert_eq!(interpolator.num_dimensions(), Some(3));
        assert_eq!(interpolator.add_datapoint(vec![1.0], 4.0), Err(AIError::DimensionMismatch { expected: 3, found: 1 }));
        assert!(interpolator.interpolate(&[1.0]).is_err());
        assert_eq!(interpolator.interpolate(&[1.0, 2.0, 3.0]).unwrap().mean(), 4.0);
    }

    #[test]
    fn check_remove_datapoints()
    {
        let mut interpolator = LazyInterpolator::new(ScalarAggregator);
        let ids: Vec<_> = (0..40).map(|i| interpolator.add_datapoint(vec![i as f64, (i % 3) as f64], (i / 20) as f64).unwrap()).collect();
        assert_eq!(interpolator.get_average().mean(), 0.5);
        for id in &ids[20..]
        {
            assert!(interpolator.remove_datapoint(*id));
        }
        assert!(!interpolator.remove_datapoint(ids[39]));
        assert_eq!(interpolator.num_datapoints(), 20);
        assert_eq!(interpolator.get_average().mean(), 0.0);
        assert_eq!(interpolator.interpolate(&[35.0, 1.0]).unwrap().mean(), 0.0);
    }

    #[test]
    fn check_lazy_input_lists()
    {
        let mut interpolator: LazyInterpolator<ScalarAggregator, LazyInputList> = LazyInterpolator::new(ScalarAggregator);
        for i in 0..30
        {
            let x = i as f64;
            let coordinates: Vec<Box<dyn LazyCoordinate + Send + Sync>> = vec![Box::new(EagerInput::new(x, "time")), Box::new(EagerInput::new(-x, "reversed"))];
            interpolator.add_datapoint_with_outputs(LazyInputList::new(coordinates), x, vec![x]).unwrap();
        }
        let justification = interpolator.justify_interpolation(&[25.0, -25.0]).unwrap();
        assert!(!justification.is_empty());
        assert!(justification.len() <= 30);
        assert_eq!(justification[0].inputs().description(1), "reversed");
        assert!(justification.iter().all(|p| p.outputs() == Some(&[p.input(0)][..])));
    }
}
