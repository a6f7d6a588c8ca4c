use crate::datapoint::Inputs;
use crate::distribution::{Aggregator, Distribution};
use crate::options::InterpolatorOptions;
use crate::tree::{SplitNode, TreeContext};

///
/// Statistical-trust test deciding whether a query should descend from a box into one of its
/// children. A child is worth using only if its sample is large relative to how much its outputs
/// still vary, compared against the whole tree.
///
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StopRule
{
    root_spread: f64,
    root_count: f64,
    root_weight: f64,
    multiplier: f64,
    weight_test: bool,
    stop_on_flat_box: bool,
}

impl StopRule
{
    pub fn new(root: &Distribution, root_count: usize, options: &InterpolatorOptions) -> Self
    {
        Self
        {
            root_spread: root.std_dev(),
            root_count: root_count as f64,
            root_weight: root.weight(),
            multiplier: options.descent_multiplier,
            weight_test: options.weight_test,
            stop_on_flat_box: options.stop_on_flat_box,
        }
    }

    #[inline]
    pub fn stop_on_flat_box(&self) -> bool
    {
        self.stop_on_flat_box
    }

    pub fn should_descend(&self, child: &Distribution, child_count: usize) -> bool
    {
        if child_count <= 1
        {
            return false;
        }
        let child_spread = child.std_dev();
        if child_spread <= 0.0
        {
            // a flat child is only entered when the walk stops at flat boxes anyway
            return self.stop_on_flat_box;
        }
        let count = child_count as f64;
        if self.root_spread * count * count <= self.multiplier * self.root_count * child_spread
        {
            return false;
        }
        if self.weight_test
        {
            let weight = child.weight();
            if self.root_spread * weight * weight < self.multiplier * self.root_weight * child_spread
            {
                return false;
            }
        }
        true
    }
}

///
/// Walks from `node` towards `query`, descending while `rule` approves the child, and hands the
/// box where the walk stops to `f`. `levels_left` caps the number of descents.
///
pub fn with_neighborhood<A, I, N, Q, R, F>(node: &mut N, query: &Q, ctx: TreeContext<'_, A>, rule: &StopRule, levels_left: Option<usize>, f: F) -> R
where
    A: Aggregator,
    I: Inputs,
    N: SplitNode<A, I>,
    Q: Inputs + ?Sized,
    F: FnOnce(&mut N) -> R,
{
    if rule.stop_on_flat_box() && node.spread(ctx) <= 0.0
    {
        return f(node);
    }
    let side = match node.choose_child(query, ctx)
    {
        Some(side) => side,
        None => return f(node),
    };
    if levels_left == Some(0)
    {
        return f(node);
    }
    let descend = match node.child_mut(side)
    {
        Some(child) =>
        {
            let distribution = child.distribution(ctx);
            rule.should_descend(&distribution, child.num_datapoints())
        }
        None => false,
    };
    if descend
    {
        if let Some(child) = node.child_mut(side)
        {
            return with_neighborhood::<A, I, N, Q, R, F>(child, query, ctx, rule, levels_left.map(|l| l - 1), f);
        }
    }
    f(node)
}
