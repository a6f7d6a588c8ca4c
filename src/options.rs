use serde::{Deserialize, Serialize};

///
/// Tunables for both tree engines. Fields missing from a serialized configuration take their
/// default values.
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolatorOptions
{
    /// A node reconsiders splitting at `n`, then at `floor(n * split_growth_factor + sqrt(n))` points.
    pub split_growth_factor: f64,
    /// Force the first few splits from the root in round-robin dimension order.
    pub exempt_splits: bool,
    /// Each probe node forwards at most `count / probe_sample_divisor` points to each child.
    pub probe_sample_divisor: usize,
    /// A query descends into a child only if
    /// `root_spread * child_count^2 > descent_multiplier * root_count * child_spread`.
    pub descent_multiplier: f64,
    /// Additionally require `root_spread * child_weight^2 >= descent_multiplier * root_weight * child_spread`.
    pub weight_test: bool,
    /// Stop at any box whose own spread is zero.
    pub stop_on_flat_box: bool,
    /// Default cap on the number of levels a query descends.
    pub max_levels: Option<usize>,
    /// Lazy nodes never split with this many live points or fewer.
    pub lazy_min_points_to_split: usize,
    /// Number of datapoints sampled per candidate dimension in the first lazy elimination round.
    pub lazy_initial_sample: usize,
}

impl Default for InterpolatorOptions
{
    fn default() -> Self {
        Self
        {
            split_growth_factor: 1.5,
            exempt_splits: true,
            probe_sample_divisor: 4,
            descent_multiplier: 1.0,
            weight_test: false,
            stop_on_flat_box: false,
            max_levels: None,
            lazy_min_points_to_split: 8,
            lazy_initial_sample: 4,
        }
    }
}

impl InterpolatorOptions
{
    /// Defaults used by the lazy-dimension engine: a stricter stop rule that also weighs confidence.
    pub fn lazy() -> Self
    {
        Self { descent_multiplier: 4.0, weight_test: true, stop_on_flat_box: true, ..Default::default() }
    }

    ///
    /// Point count at which a node that last reconsidered splitting at `num_points` does so again.
    ///
    pub fn next_split_threshold(&self, num_points: usize) -> usize
    {
        let n = num_points as f64;
        let result = (n * self.split_growth_factor + n.sqrt()) as usize;
        if result <= num_points { num_points + 1 } else { result }
    }

    ///
    /// Number of forced round-robin splits granted to a root holding `num_points` points.
    ///
    pub fn exempt_split_budget(&self, num_points: usize) -> usize
    {
        if !self.exempt_splits || num_points <= 2
        {
            return 0;
        }
        let budget = (num_points as f64).log2().log2();
        if budget > 0.0 { budget as usize } else { 0 }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn check_split_threshold_grows()
    {
        let options = InterpolatorOptions::default();
        let mut n = 1;
        let mut seen = vec![n];
        while n < 100
        {
            let next = options.next_split_threshold(n);
            assert!(next > n);
            n = next;
            seen.push(n);
        }
        assert_eq!(&seen[..6], &[1_usize, 2, 4, 8, 14, 24]);
    }

    #[test]
    fn check_exempt_budget()
    {
        let options = InterpolatorOptions::default();
        assert_eq!(options.exempt_split_budget(2), 0);
        assert_eq!(options.exempt_split_budget(3), 0);
        assert_eq!(options.exempt_split_budget(4), 1);
        assert_eq!(options.exempt_split_budget(15), 1);
        assert_eq!(options.exempt_split_budget(16), 2);
        assert_eq!(options.exempt_split_budget(256), 3);
        let no_exempt = InterpolatorOptions { exempt_splits: false, ..Default::default() };
        assert_eq!(no_exempt.exempt_split_budget(1 << 20), 0);
    }

    #[test]
    fn check_partial_configuration()
    {
        let options: InterpolatorOptions = serde_json::from_str(r#"{ "descent_multiplier": 2.5, "max_levels": 6 }"#).unwrap();
        assert_eq!(options.descent_multiplier, 2.5);
        assert_eq!(options.max_levels, Some(6));
        assert_eq!(options.probe_sample_divisor, 4);
        assert!(options.exempt_splits);
        assert!(InterpolatorOptions::lazy().weight_test);
    }
}
