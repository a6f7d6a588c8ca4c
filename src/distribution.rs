use std::fmt::Display;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

///
/// Sufficient statistics of a weighted scalar sample: sum of values, sum of squared values
/// and total weight. Every operation returns a new value.
///
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Distribution
{
    sum_value: f64,
    sum_squared_value: f64,
    sum_weight: f64,
}

impl Distribution
{
    #[inline]
    pub const fn new(sum_value: f64, sum_squared_value: f64, sum_weight: f64) -> Self
    {
        Self { sum_value, sum_squared_value, sum_weight }
    }

    #[inline]
    pub const fn zero() -> Self
    {
        Self::new(0.0, 0.0, 0.0)
    }

    ///
    /// Builds the distribution of `weight` samples having the given mean and standard deviation.
    ///
    pub fn from_moments(mean: f64, std_dev: f64, weight: f64) -> Self
    {
        Self::new(mean * weight, (mean * mean + std_dev * std_dev) * weight, weight)
    }

    /// A single sample of weight 1.
    pub fn from_value(value: f64) -> Self
    {
        Self::new(value, value * value, 1.0)
    }

    #[inline]
    pub fn sum_value(&self) -> f64
    {
        self.sum_value
    }

    #[inline]
    pub fn sum_squared_value(&self) -> f64
    {
        self.sum_squared_value
    }

    #[inline]
    pub fn weight(&self) -> f64
    {
        self.sum_weight
    }

    /// Mean of the sample, or 0 when the weight is 0.
    #[inline]
    pub fn mean(&self) -> f64
    {
        self.mean_or(0.0)
    }

    #[inline]
    pub fn mean_or(&self, value: f64) -> f64
    {
        if self.sum_weight != 0.0
        {
            self.sum_value / self.sum_weight
        }
        else
        {
            value
        }
    }

    ///
    /// Population variance, clamped at 0 so rounding never produces a negative value.
    ///
    pub fn variance(&self) -> f64
    {
        if self.sum_weight == 0.0
        {
            return 0.0;
        }
        let mean = self.sum_value / self.sum_weight;
        let variance = self.sum_squared_value / self.sum_weight - mean * mean;
        if variance > 0.0 { variance } else { 0.0 }
    }

    #[inline]
    pub fn std_dev(&self) -> f64
    {
        self.variance().sqrt()
    }

    pub fn plus(&self, other: &Distribution) -> Self
    {
        Self::new(self.sum_value + other.sum_value, self.sum_squared_value + other.sum_squared_value, self.sum_weight + other.sum_weight)
    }

    /// Adds one sample of weight 1.
    pub fn plus_value(&self, value: f64) -> Self
    {
        Self::new(self.sum_value + value, self.sum_squared_value + value * value, self.sum_weight + 1.0)
    }

    pub fn minus(&self, other: &Distribution) -> Self
    {
        Self::new(self.sum_value - other.sum_value, self.sum_squared_value - other.sum_squared_value, self.sum_weight - other.sum_weight)
    }

    /// Every value multiplied by `output_scale`; the weight is unchanged.
    pub fn copy_and_stretch_by(&self, output_scale: f64) -> Self
    {
        Self::new(self.sum_value * output_scale, self.sum_squared_value * output_scale * output_scale, self.sum_weight)
    }

    /// Same mean and spread with the weight multiplied by `weight_scale`.
    pub fn copy_and_reweight_by(&self, weight_scale: f64) -> Self
    {
        Self::new(self.sum_value * weight_scale, self.sum_squared_value * weight_scale, self.sum_weight * weight_scale)
    }

    /// Same mean and spread with total weight `new_weight`; an empty distribution stays empty.
    pub fn copy_and_reweight_to(&self, new_weight: f64) -> Self
    {
        let scale = if self.sum_weight != 0.0 { new_weight / self.sum_weight } else { 0.0 };
        self.copy_and_reweight_by(scale)
    }
}

impl Add for Distribution
{
    type Output = Distribution;

    fn add(self, rhs: Self) -> Self::Output {
        self.plus(&rhs)
    }
}

impl Sub for Distribution
{
    type Output = Distribution;

    fn sub(self, rhs: Self) -> Self::Output {
        self.minus(&rhs)
    }
}

impl Display for Distribution
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Mean:{} stdDev:{} weight:{}", self.mean(), self.std_dev(), self.weight())
    }
}

///
/// Pluggable numeric aggregation capability. The tree folds each datapoint's `Item` into a
/// per-box `Summary` and converts summaries to a [`Distribution`] whenever it needs a mean or
/// spread.
///
pub trait Aggregator
{
    type Item;
    type Summary: Clone;

    ///
    /// Summary of an empty box.
    ///
    fn default_summary(&self) -> Self::Summary;

    ///
    /// Returns `summary` with `item` folded in.
    ///
    fn combine(&self, summary: &Self::Summary, item: &Self::Item) -> Self::Summary;

    ///
    /// Inverse of `combine`.
    ///
    fn remove(&self, summary: &Self::Summary, item: &Self::Item) -> Self::Summary;

    fn to_distribution(&self, summary: &Self::Summary) -> Distribution;

    ///
    /// Distribution of a single item, used when comparing individual datapoints.
    ///
    fn item_distribution(&self, item: &Self::Item) -> Distribution
    {
        self.to_distribution(&self.combine(&self.default_summary(), item))
    }
}

/// Items that already are distributions: combining is `plus`, removing is `minus`.
#[derive(Copy, Clone, Debug, Default)]
pub struct DistributionAggregator;

impl Aggregator for DistributionAggregator
{
    type Item = Distribution;
    type Summary = Distribution;

    fn default_summary(&self) -> Distribution
    {
        Distribution::zero()
    }

    fn combine(&self, summary: &Distribution, item: &Distribution) -> Distribution
    {
        summary.plus(item)
    }

    fn remove(&self, summary: &Distribution, item: &Distribution) -> Distribution
    {
        summary.minus(item)
    }

    #[inline]
    fn to_distribution(&self, summary: &Distribution) -> Distribution
    {
        *summary
    }

    #[inline]
    fn item_distribution(&self, item: &Distribution) -> Distribution
    {
        *item
    }
}

/// Items are plain scalar samples of weight 1.
#[derive(Copy, Clone, Debug, Default)]
pub struct ScalarAggregator;

impl Aggregator for ScalarAggregator
{
    type Item = f64;
    type Summary = Distribution;

    fn default_summary(&self) -> Distribution
    {
        Distribution::zero()
    }

    fn combine(&self, summary: &Distribution, item: &f64) -> Distribution
    {
        summary.plus_value(*item)
    }

    fn remove(&self, summary: &Distribution, item: &f64) -> Distribution
    {
        summary.minus(&Distribution::from_value(*item))
    }

    #[inline]
    fn to_distribution(&self, summary: &Distribution) -> Distribution
    {
        *summary
    }
}

#[cfg(test)]
mod tests
{
    use approx::assert_abs_diff_eq;

    use super::*;

    fn sample(values: &[f64]) -> Distribution
    {
        values.iter().fold(Distribution::zero(), |d, &v| d.plus_value(v))
    }

    #[test]
    fn check_plus_minus_inverse()
    {
        let a = Distribution::from_moments(3.0, 1.5, 4.0);
        let b = sample(&[0.25, -7.0, 12.5]);
        let back = a.plus(&b).minus(&b);
        assert_abs_diff_eq!(back.sum_value(), a.sum_value(), epsilon = 1e-12);
        assert_abs_diff_eq!(back.sum_squared_value(), a.sum_squared_value(), epsilon = 1e-12);
        assert_abs_diff_eq!(back.weight(), a.weight(), epsilon = 1e-12);
    }

    #[test]
    fn check_plus_commutative_and_associative()
    {
        let a = sample(&[1.0, 2.0]);
        let b = sample(&[5.0]);
        let c = Distribution::from_moments(-2.0, 0.5, 3.0);
        assert_eq!(a + b, b + a);
        let left = (a + b) + c;
        let right = a + (b + c);
        assert_abs_diff_eq!(left.mean(), right.mean(), epsilon = 1e-12);
        assert_abs_diff_eq!(left.std_dev(), right.std_dev(), epsilon = 1e-12);
        assert_eq!(left.weight(), right.weight());
    }

    #[test]
    fn check_mean_and_population_std_dev()
    {
        let d = sample(&[1.0, 2.0, 3.0, 4.0]);
        assert_abs_diff_eq!(d.mean(), 2.5, epsilon = 1e-12);
        assert_abs_diff_eq!(d.std_dev(), 1.25_f64.sqrt(), epsilon = 1e-12);
        assert_eq!(d.weight(), 4.0);
    }

    #[test]
    fn check_degenerate_values()
    {
        let empty = Distribution::zero();
        assert_eq!(empty.mean(), 0.0);
        assert_eq!(empty.std_dev(), 0.0);
        assert_eq!(empty.mean_or(7.0), 7.0);
        // sum of squares slightly below mean^2: would be a negative variance
        let rounded = Distribution::new(1.0, 0.9999999, 1.0);
        assert_eq!(rounded.std_dev(), 0.0);
        assert!(!rounded.std_dev().is_nan());
        let negative = Distribution::zero().minus(&sample(&[3.0, 4.0]));
        assert!(negative.weight() < 0.0);
        assert!(negative.std_dev() >= 0.0);
    }

    #[test]
    fn check_rescaling()
    {
        let d = Distribution::from_moments(2.0, 3.0, 5.0);
        let stretched = d.copy_and_stretch_by(2.0);
        assert_abs_diff_eq!(stretched.mean(), 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(stretched.std_dev(), 6.0, epsilon = 1e-12);
        assert_eq!(stretched.weight(), 5.0);

        let reweighted = d.copy_and_reweight_to(10.0);
        assert_abs_diff_eq!(reweighted.mean(), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(reweighted.std_dev(), 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(reweighted.weight(), 10.0, epsilon = 1e-12);
        assert_eq!(Distribution::zero().copy_and_reweight_to(10.0), Distribution::zero());
    }

    #[test]
    fn check_aggregators()
    {
        let scalar = ScalarAggregator;
        let summary = [1.0, 2.0, 6.0].iter().fold(scalar.default_summary(), |s, v| scalar.combine(&s, v));
        assert_abs_diff_eq!(scalar.to_distribution(&summary).mean(), 3.0, epsilon = 1e-12);
        let summary = scalar.remove(&summary, &6.0);
        assert_abs_diff_eq!(summary.mean(), 1.5, epsilon = 1e-12);
        assert_eq!(scalar.item_distribution(&4.0), Distribution::from_value(4.0));

        let dist = DistributionAggregator;
        let item = Distribution::from_moments(1.0, 0.0, 2.0);
        let combined = dist.combine(&dist.default_summary(), &item);
        assert_eq!(dist.remove(&combined, &item), Distribution::zero());
        assert_eq!(format!("{}", Distribution::from_value(2.0)), "Mean:2 stdDev:0 weight:1");
    }
}
