use serde::{Deserialize, Serialize};

use crate::datapoint::Inputs;

///
/// One dimension of a [`HyperBox`]: a range whose ends may be open or closed.
///
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Interval
{
    pub low: f64,
    pub high: f64,
    pub low_inclusive: bool,
    pub high_inclusive: bool,
}

impl Interval
{
    #[inline]
    pub fn new(low: f64, low_inclusive: bool, high: f64, high_inclusive: bool) -> Self
    {
        Self { low, high, low_inclusive, high_inclusive }
    }

    /// Closed range `[low, high]`.
    #[inline]
    pub fn closed(low: f64, high: f64) -> Self
    {
        Self::new(low, true, high, true)
    }

    #[inline]
    pub fn point(value: f64) -> Self
    {
        Self::closed(value, value)
    }

    #[inline]
    pub fn width(&self) -> f64
    {
        self.high - self.low
    }

    #[inline]
    pub fn middle(&self) -> f64
    {
        (self.low + self.high) / 2.0
    }

    /// A zero-width range cannot be divided.
    #[inline]
    pub fn is_splittable(&self) -> bool
    {
        self.width() > 0.0
    }

    #[inline]
    pub fn contains(&self, value: f64) -> bool
    {
        let above_low = self.low < value || (self.low == value && self.low_inclusive);
        let below_high = value < self.high || (value == self.high && self.high_inclusive);
        above_low && below_high
    }

    pub fn contains_interval(&self, other: &Interval) -> bool
    {
        let low_ok = self.low < other.low || (self.low == other.low && (self.low_inclusive || !other.low_inclusive));
        let high_ok = other.high < self.high || (other.high == self.high && (self.high_inclusive || !other.high_inclusive));
        low_ok && high_ok
    }

    pub fn intersects(&self, other: &Interval) -> bool
    {
        let (low, low_inclusive) = if self.low > other.low
        {
            (self.low, self.low_inclusive)
        }
        else if other.low > self.low
        {
            (other.low, other.low_inclusive)
        }
        else
        {
            (self.low, self.low_inclusive && other.low_inclusive)
        };
        let (high, high_inclusive) = if self.high < other.high
        {
            (self.high, self.high_inclusive)
        }
        else if other.high < self.high
        {
            (other.high, other.high_inclusive)
        }
        else
        {
            (self.high, self.high_inclusive && other.high_inclusive)
        };
        low < high || (low == high && low_inclusive && high_inclusive)
    }

    pub fn expand_to_include(&mut self, value: f64)
    {
        if value < self.low || (value == self.low && !self.low_inclusive)
        {
            self.low = value;
            self.low_inclusive = true;
        }
        if value > self.high || (value == self.high && !self.high_inclusive)
        {
            self.high = value;
            self.high_inclusive = true;
        }
    }
}

///
/// Axis-aligned region. A dimension may be unknown (`None`) until the first point is seen;
/// unknown dimensions contain every value and have zero width.
///
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HyperBox
{
    intervals: Vec<Option<Interval>>,
}

impl HyperBox
{
    ///
    /// Closed box `[lower[d], upper[d]]` in every dimension. `lower` and `upper` must have the
    /// same length.
    ///
    pub fn new(lower: &[f64], upper: &[f64]) -> Self
    {
        debug_assert_eq!(lower.len(), upper.len(), "lower and upper corners differ in dimension");
        Self { intervals: lower.iter().zip(upper).map(|(&low, &high)| Some(Interval::closed(low, high))).collect() }
    }

    pub fn from_intervals(intervals: Vec<Interval>) -> Self
    {
        Self { intervals: intervals.into_iter().map(Some).collect() }
    }

    /// Box of `num_dimensions` unknown dimensions.
    pub fn with_dim(num_dimensions: usize) -> Self
    {
        Self { intervals: vec![None; num_dimensions] }
    }

    /// Zero-volume box around a single point.
    pub fn from_point<I: Inputs + ?Sized>(point: &I) -> Self
    {
        Self { intervals: (0..point.num_coordinates()).map(|d| Some(Interval::point(point.input(d)))).collect() }
    }

    #[inline]
    pub fn num_dimensions(&self) -> usize
    {
        self.intervals.len()
    }

    #[inline]
    pub fn interval(&self, dim: usize) -> Option<&Interval>
    {
        self.intervals.get(dim).and_then(|i| i.as_ref())
    }

    #[inline]
    pub fn width(&self, dim: usize) -> f64
    {
        self.interval(dim).map_or(0.0, Interval::width)
    }

    #[inline]
    pub fn is_splittable(&self, dim: usize) -> bool
    {
        self.interval(dim).is_some_and(Interval::is_splittable)
    }

    pub fn contains<I: Inputs + ?Sized>(&self, point: &I) -> bool
    {
        self.intervals.iter().enumerate().all(|(d, interval)|
        {
            interval.as_ref().map_or(true, |i| i.contains(point.input(d)))
        })
    }

    pub fn contains_box(&self, other: &HyperBox) -> bool
    {
        self.intervals.iter().zip(&other.intervals).all(|(mine, theirs)|
        {
            match (mine, theirs)
            {
                (None, _) => true,
                (Some(_), None) => false,
                (Some(mine), Some(theirs)) => mine.contains_interval(theirs),
            }
        })
    }

    pub fn intersects(&self, other: &HyperBox) -> bool
    {
        self.intervals.iter().zip(&other.intervals).all(|(mine, theirs)|
        {
            match (mine, theirs)
            {
                (Some(mine), Some(theirs)) => mine.intersects(theirs),
                _ => true,
            }
        })
    }

    pub fn expand_to_include<I: Inputs + ?Sized>(&mut self, point: &I)
    {
        for (d, interval) in self.intervals.iter_mut().enumerate()
        {
            let value = point.input(d);
            match interval
            {
                Some(interval) => interval.expand_to_include(value),
                None => *interval = Some(Interval::point(value)),
            }
        }
    }

    ///
    /// Volume of the box (width(dim1)*...*width(dim_n)).
    ///
    pub fn area(&self) -> f64
    {
        let mut area = 1.0;
        for d in 0..self.num_dimensions()
        {
            area *= self.width(d);
        }
        area
    }

    /// Per-dimension midpoint; unknown dimensions report 0.
    pub fn middle(&self) -> Vec<f64>
    {
        self.intervals.iter().map(|i| i.as_ref().map_or(0.0, Interval::middle)).collect()
    }

    ///
    /// Splits the box at `value` along `dim`. The lower half keeps `value` (closed high end),
    /// the upper half excludes it, so every point lands in exactly one half.
    ///
    pub fn split_at(&self, dim: usize, value: f64) -> (HyperBox, HyperBox)
    {
        let mut lower = self.clone();
        let mut upper = self.clone();
        let current = self.interval(dim).copied().unwrap_or(Interval::closed(f64::NEG_INFINITY, f64::INFINITY));
        lower.intervals[dim] = Some(Interval::new(current.low, current.low_inclusive, value, true));
        upper.intervals[dim] = Some(Interval::new(value, false, current.high, current.high_inclusive));
        (lower, upper)
    }
}
