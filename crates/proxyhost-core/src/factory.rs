// ── Resource factory seam ──
//
// The engines know nothing about what a handle is. The host supplies a
// factory that builds one from parameters and tears it down again.

use crate::error::FactoryError;

/// Synchronously creates and destroys opaque resource handles.
///
/// `Handle` is deliberately not required to be `Clone`: the engine owns each
/// handle exclusively and gives it back by value to [`destroy`], so a
/// released handle cannot be used again.
///
/// [`destroy`]: ResourceFactory::destroy
pub trait ResourceFactory<P>: Send + Sync + 'static {
    type Handle: Send + 'static;

    /// Build a handle. Failures carry a message suitable for display.
    fn create(&self, params: &P) -> Result<Self::Handle, FactoryError>;

    /// Release a handle. Implementations log their own teardown errors.
    fn destroy(&self, handle: Self::Handle);
}
