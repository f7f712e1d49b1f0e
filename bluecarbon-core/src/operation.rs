use crate::errors::{CarbonError, CarbonResult};
use crate::raster::Raster;
use std::fmt::Debug;

/// A pure computation turning a stack of aligned input rasters into output rasters.
///
/// Operations are serialised (through `typetag`) to content-address the task that
/// runs them, so every parameter that affects the result must be a serialised field
/// and serialisation must be deterministic (no `HashMap` fields).
#[typetag::serde]
pub trait RasterOperation: Debug + Send + Sync {
    /// Number of inputs the operation accepts, or `None` if it is variadic.
    fn n_inputs(&self) -> Option<usize> {
        None
    }

    /// Number of rasters returned by [`RasterOperation::apply`].
    fn n_outputs(&self) -> usize {
        1
    }

    fn apply(&self, inputs: &[Raster]) -> CarbonResult<Vec<Raster>>;
}

/// Return an error unless `found` inputs satisfy the operation's arity.
pub fn check_arity(operation: &dyn RasterOperation, found: usize) -> CarbonResult<()> {
    match operation.n_inputs() {
        Some(expected) if expected != found => Err(CarbonError::WrongArity {
            operation: format!("{:?}", operation),
            expected,
            found,
        }),
        None if found == 0 => Err(CarbonError::WrongArity {
            operation: format!("{:?}", operation),
            expected: 1,
            found,
        }),
        _ => Ok(()),
    }
}
