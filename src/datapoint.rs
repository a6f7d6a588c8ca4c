use std::fmt::Display;

use serde::{Deserialize, Serialize};

///
/// Coordinate access used by the trees. Implementations may compute coordinates on demand,
/// so the splitting logic only ever asks for the dimensions it needs.
///
pub trait Inputs
{
    fn num_coordinates(&self) -> usize;

    ///
    /// Value of coordinate `index`.
    ///
    /// # Panics
    /// May panic if `index >= self.num_coordinates()`.
    ///
    fn input(&self, index: usize) -> f64;

    fn description(&self, index: usize) -> String
    {
        format!("x{index}")
    }
}

impl Inputs for [f64]
{
    #[inline]
    fn num_coordinates(&self) -> usize
    {
        self.len()
    }

    #[inline]
    fn input(&self, index: usize) -> f64
    {
        self[index]
    }
}

impl Inputs for Vec<f64>
{
    #[inline]
    fn num_coordinates(&self) -> usize
    {
        self.len()
    }

    #[inline]
    fn input(&self, index: usize) -> f64
    {
        self[index]
    }
}

impl<const D: usize> Inputs for [f64; D]
{
    #[inline]
    fn num_coordinates(&self) -> usize
    {
        D
    }

    #[inline]
    fn input(&self, index: usize) -> f64
    {
        self[index]
    }
}

/// A single coordinate that may be expensive to produce.
pub trait LazyCoordinate
{
    fn coordinate(&self) -> f64;
    fn description(&self) -> String;
}

/// Coordinate whose value is already known.
#[derive(Clone, Debug, PartialEq)]
pub struct EagerInput
{
    pub value: f64,
    pub description: String,
}

impl EagerInput
{
    pub fn new(value: f64, description: impl Into<String>) -> Self
    {
        Self { value, description: description.into() }
    }
}

impl LazyCoordinate for EagerInput
{
    fn coordinate(&self) -> f64
    {
        self.value
    }

    fn description(&self) -> String
    {
        self.description.clone()
    }
}

/// Inputs made of individually evaluated coordinates.
pub struct LazyInputList
{
    coordinates: Vec<Box<dyn LazyCoordinate + Send + Sync>>,
}

impl LazyInputList
{
    pub fn new(coordinates: Vec<Box<dyn LazyCoordinate + Send + Sync>>) -> Self
    {
        Self { coordinates }
    }
}

impl Inputs for LazyInputList
{
    fn num_coordinates(&self) -> usize
    {
        self.coordinates.len()
    }

    fn input(&self, index: usize) -> f64
    {
        self.coordinates[index].coordinate()
    }

    fn description(&self, index: usize) -> String
    {
        self.coordinates[index].description()
    }
}

///
/// Concatenation of several inputs: coordinate `i` of the result is looked up in whichever part
/// covers it.
///
pub struct ConcatInputs<I>
{
    parts: Vec<I>,
}

impl<I: Inputs> ConcatInputs<I>
{
    pub fn new(parts: Vec<I>) -> Self
    {
        Self { parts }
    }

    fn locate(&self, index: usize) -> (&I, usize)
    {
        let mut shifted = index;
        for part in &self.parts
        {
            let len = part.num_coordinates();
            if shifted < len
            {
                return (part, shifted);
            }
            shifted -= len;
        }
        panic!("coordinate index {index} out of range for {} coordinates", self.num_coordinates());
    }
}

impl<I: Inputs> Inputs for ConcatInputs<I>
{
    fn num_coordinates(&self) -> usize
    {
        self.parts.iter().map(Inputs::num_coordinates).sum()
    }

    fn input(&self, index: usize) -> f64
    {
        let (part, shifted) = self.locate(index);
        part.input(shifted)
    }

    fn description(&self, index: usize) -> String
    {
        let (part, shifted) = self.locate(index);
        part.description(shifted)
    }
}

/// Identity of a datapoint, unique within the interpolator that issued it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DatapointId(pub u64);

///
/// An observed (inputs, item) pair. Output coordinates are carried along for the caller and
/// ignored by the trees.
///
#[derive(Clone, Debug)]
pub struct Datapoint<T, I = Vec<f64>>
{
    id: DatapointId,
    inputs: I,
    item: T,
    outputs: Option<Vec<f64>>,
}

impl<T, I: Inputs> Datapoint<T, I>
{
    pub(crate) fn new(id: DatapointId, inputs: I, item: T, outputs: Option<Vec<f64>>) -> Self
    {
        Self { id, inputs, item, outputs }
    }

    #[inline]
    pub fn id(&self) -> DatapointId
    {
        self.id
    }

    #[inline]
    pub fn inputs(&self) -> &I
    {
        &self.inputs
    }

    #[inline]
    pub fn input(&self, index: usize) -> f64
    {
        self.inputs.input(index)
    }

    #[inline]
    pub fn item(&self) -> &T
    {
        &self.item
    }

    pub fn outputs(&self) -> Option<&[f64]>
    {
        self.outputs.as_deref()
    }

    #[inline]
    pub fn num_input_dimensions(&self) -> usize
    {
        self.inputs.num_coordinates()
    }

    /// True when both datapoints sit at the same input coordinates.
    pub fn input_equals<U, J: Inputs>(&self, other: &Datapoint<U, J>) -> bool
    {
        self.num_input_dimensions() == other.num_input_dimensions()
            && (0..self.num_input_dimensions()).all(|d| self.input(d) == other.input(d))
    }
}

impl<T: Display, I: Inputs> Display for Datapoint<T, I>
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "coordinates:(")?;
        for d in 0..self.num_input_dimensions()
        {
            write!(f, "{},", self.input(d))?;
        }
        write!(f, ") item={}", self.item)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn check_concat_inputs()
    {
        let inputs = ConcatInputs::new(vec![vec![1.0, 2.0], vec![], vec![3.0, 4.0, 5.0]]);
        assert_eq!(inputs.num_coordinates(), 5);
        assert_eq!((0..5).map(|i| inputs.input(i)).collect::<Vec<_>>(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(inputs.description(3), "x1");
    }

    #[test]
    #[should_panic]
    fn check_concat_inputs_out_of_range()
    {
        let inputs = ConcatInputs::new(vec![vec![1.0], vec![2.0]]);
        inputs.input(2);
    }

    #[test]
    fn check_lazy_input_list()
    {
        let list = LazyInputList::new(vec![Box::new(EagerInput::new(0.5, "speed")), Box::new(EagerInput::new(-1.0, "height"))]);
        assert_eq!(list.num_coordinates(), 2);
        assert_eq!(list.input(1), -1.0);
        assert_eq!(list.description(0), "speed");
        let nested = ConcatInputs::new(vec![list, LazyInputList::new(vec![Box::new(EagerInput::new(9.0, "depth"))])]);
        assert_eq!(nested.input(2), 9.0);
        assert_eq!(nested.description(2), "depth");
    }

    #[test]
    fn check_datapoint_accessors()
    {
        let a = Datapoint::new(DatapointId(3), vec![1.0, 2.5], 7.0, Some(vec![0.1]));
        let b = Datapoint::new(DatapointId(4), [1.0, 2.5], "other", None);
        assert!(a.input_equals(&b));
        assert_eq!(a.id(), DatapointId(3));
        assert_eq!(a.outputs(), Some(&[0.1][..]));
        assert_eq!(b.outputs(), None);
        assert_eq!(format!("{a}"), "coordinates:(1,2.5,) item=7");
    }
}
