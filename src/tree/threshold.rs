use serde::{Deserialize, Serialize};

///
/// One weak vote used by the lazy engine: compares a single coordinate against a threshold and
/// votes for the upper child with `weight` when the comparison comes out the expected way.
///
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThresholdComparison
{
    pub dimension: usize,
    pub value: f64,
    pub weight: f64,
    /// Whether coordinates above `value` are associated with higher outputs.
    pub expect_positive: bool,
}

impl ThresholdComparison
{
    pub fn new(dimension: usize, value: f64, weight: f64, expect_positive: bool) -> Self
    {
        Self { dimension, value, weight, expect_positive }
    }

    ///
    /// True if `input` votes for the upper child. Inputs equal to the threshold vote lower.
    ///
    #[inline]
    pub fn evaluate(&self, input: f64) -> bool
    {
        if input > self.value
        {
            self.expect_positive
        }
        else if input < self.value
        {
            !self.expect_positive
        }
        else
        {
            false
        }
    }
}

#[test]
fn check_threshold_polarity()
{
    let positive = ThresholdComparison::new(2, 0.5, 1.0, true);
    assert!(positive.evaluate(0.9));
    assert!(!positive.evaluate(0.1));
    assert!(!positive.evaluate(0.5));
    let negative = ThresholdComparison::new(2, 0.5, 1.0, false);
    assert!(!negative.evaluate(0.9));
    assert!(negative.evaluate(0.1));
    assert!(!negative.evaluate(0.5));
}
