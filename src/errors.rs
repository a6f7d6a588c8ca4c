use std::fmt::Display;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum AIError
{
    /// Coordinate count of a datapoint or query differs from the interpolator's dimensionality.
    DimensionMismatch { expected: usize, found: usize },
    /// A statistic was requested over an empty collection.
    EmptyInput,
}
impl std::error::Error for AIError {}

impl Display for AIError
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", *self)
    }
}

impl AIError
{
    #[inline]
    pub(crate) fn check_dimensions(expected: usize, found: usize) -> Result<(), AIError>
    {
        if expected != found
        {
            Err(AIError::DimensionMismatch { expected, found })
        }
        else
        {
            Ok(())
        }
    }
}

#[test]
fn check_dimension_mismatch_display()
{
    let err = AIError::check_dimensions(3, 2).unwrap_err();
    assert_eq!(err, AIError::DimensionMismatch { expected: 3, found: 2 });
    assert_eq!(format!("{err}"), "DimensionMismatch { expected: 3, found: 2 }");
    assert!(AIError::check_dimensions(4, 4).is_ok());
}
