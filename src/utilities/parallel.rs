/// Marker trait for types handed to the probe workers. Stub implementation when the `rayon`
/// feature is not enabled, so single-threaded callers may use `Rc`-based items.
#[cfg(not(feature="rayon"))]
pub trait ParallelMarker{}
#[cfg(not(feature="rayon"))]
impl<T: ?Sized> ParallelMarker for T{}

/// Marker trait for types handed to the probe workers: they must cross thread boundaries.
#[cfg(feature="rayon")]
pub trait ParallelMarker : Send + Sync{}
#[cfg(feature="rayon")]
impl<T: ?Sized + Send + Sync> ParallelMarker for T{}

///
/// Maps `f` over `0..len`, in parallel when the `rayon` feature is enabled. Results are
/// always returned in index order.
/// 
pub(crate) fn map_indices<R, F>(len: usize, f: F) -> Vec<R>
where
    R: ParallelMarker,
    F: Fn(usize) -> R + ParallelMarker,
{
    #[cfg(feature="rayon")]
    {
        use rayon::iter::{IntoParallelIterator, ParallelIterator};
        (0..len).into_par_iter().map(f).collect()
    }
    #[cfg(not(feature="rayon"))]
    {
        (0..len).map(f).collect()
    }
}

#[test]
fn check_map_indices_keeps_order()
{
    let squares = map_indices(16, |i| i * i);
    assert_eq!(squares, (0..16).map(|i| i * i).collect::<Vec<_>>());
}
