use crate::errors::AIError;

///
/// A value retained by the tournament together with how many discarded values are known to
/// sit below it, equal to it, and above it.
///
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RankedValue<T>
{
    pub value: T,
    pub num_lower: usize,
    pub num_equal: usize,
    pub num_higher: usize,
}

impl<T: Copy> RankedValue<T>
{
    #[inline]
    fn new(value: T) -> Self
    {
        Self { value, num_lower: 0, num_equal: 1, num_higher: 0 }
    }
}

/// `(lower, upper)` with `lower.value <= upper.value`.
pub type Bracket<T> = (RankedValue<T>, RankedValue<T>);

fn pair_off<T: PartialOrd + Copy>(items: &[T]) -> Vec<Bracket<T>>
{
    // an odd trailing item is not used
    items.chunks_exact(2).map(|pair|
    {
        let (first, second) = (RankedValue::new(pair[0]), RankedValue::new(pair[1]));
        if first.value >= second.value { (second, first) } else { (first, second) }
    }).collect()
}

///
/// Keeps the two middle values of two brackets, discarding the overall lowest and highest.
///
fn merge<T: PartialOrd + Copy>(previous: &Bracket<T>, current: &Bracket<T>) -> Bracket<T>
{
    let (lowest, mut middle_low) = if previous.0.value < current.0.value
    {
        (previous.0, current.0)
    }
    else
    {
        (current.0, previous.0)
    };
    let (mut middle_high, highest) = if previous.1.value < current.1.value
    {
        (previous.1, current.1)
    }
    else
    {
        (current.1, previous.1)
    };
    if middle_low.value > middle_high.value
    {
        std::mem::swap(&mut middle_low, &mut middle_high);
    }

    let mut new_low = RankedValue { value: middle_low.value, num_lower: lowest.num_lower + middle_low.num_lower, num_equal: middle_low.num_equal, num_higher: middle_low.num_higher };
    if lowest.value < new_low.value
    {
        new_low.num_lower += lowest.num_equal;
    }
    else
    {
        new_low.num_equal += lowest.num_equal;
    }

    let mut new_high = RankedValue { value: middle_high.value, num_lower: middle_high.num_lower, num_equal: middle_high.num_equal, num_higher: middle_high.num_higher + highest.num_higher };
    if new_high.value < highest.value
    {
        new_high.num_higher += highest.num_equal;
    }
    else
    {
        new_high.num_equal += highest.num_equal;
    }
    (new_low, new_high)
}

///
/// Narrows `items` down to a bracket around the median in linear time. Items are paired off,
/// then pairs of brackets are merged round after round (an unmatched bracket is dropped) until
/// one remains. Returns `None` for fewer than two items.
///
pub fn median_bracket<T: PartialOrd + Copy>(items: &[T]) -> Option<Bracket<T>>
{
    let mut current = pair_off(items);
    while current.len() > 1
    {
        current = current.chunks_exact(2).map(|pair| merge(&pair[0], &pair[1])).collect();
    }
    current.pop()
}

///
/// Estimates the median of `values` without sorting them.
///
/// An endpoint of the final bracket is returned exactly when it accounts for more than half of
/// the values, or when a counting pass shows it is a true median and the other endpoint is not.
/// Otherwise the midpoint of the bracket is returned.
///
pub fn estimate_median(values: &[f64]) -> Result<f64, AIError>
{
    match values
    {
        [] => Err(AIError::EmptyInput),
        [only] => Ok(*only),
        _ =>
        {
            let half = values.len() / 2;
            let (low, high) = median_bracket(values).ok_or(AIError::EmptyInput)?;
            if low.num_equal > half
            {
                return Ok(low.value);
            }
            if high.num_equal > half
            {
                return Ok(high.value);
            }
            let (low_is_median, high_is_median) = is_median(values, low.value, high.value);
            Ok(match (low_is_median, high_is_median)
            {
                (true, false) => low.value,
                (false, true) => high.value,
                _ => (low.value + high.value) / 2.0,
            })
        }
    }
}

/// Whether each candidate has at most half of the values strictly on either side of it.
fn is_median(values: &[f64], first: f64, second: f64) -> (bool, bool)
{
    let (mut first_below, mut first_above, mut second_below, mut second_above) = (0, 0, 0, 0);
    for &v in values
    {
        if v < first { first_below += 1; } else if v > first { first_above += 1; }
        if v < second { second_below += 1; } else if v > second { second_above += 1; }
    }
    let n = values.len();
    (2 * first_below <= n && 2 * first_above <= n, 2 * second_below <= n && 2 * second_above <= n)
}
