//! Aggregated readiness of the inputs of a rendered panel.
//!
//! The phase is computed from scratch on every evaluation, there is no memory of a previous
//! phase.

use crate::{error::TransportError, watch::Watched};

/// Load state of a single input.
pub trait Readiness {
    fn is_loaded(&self) -> bool;
    fn load_error(&self) -> Option<&TransportError>;
}

impl<T> Readiness for Watched<T> {
    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn load_error(&self) -> Option<&TransportError> {
        self.error.as_ref()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    /// A required input failed.
    Error(TransportError),
    /// A required input is still loading.
    Loading,
    /// Everything is loaded, but the primary entity does not exist.
    Empty,
    Ready,
}

/// Evaluate the phase, with precedence `Error > Loading > Empty > Ready`.
///
/// The reported error is the one of the first failing input, in iteration order.
pub fn evaluate<'a, I>(required: I, primary_present: bool) -> Phase
where
    I: IntoIterator<Item = &'a dyn Readiness>,
{
    let mut loading = false;

    for input in required {
        if let Some(err) = input.load_error() {
            return Phase::Error(err.clone());
        }
        loading |= !input.is_loaded();
    }

    match (loading, primary_present) {
        (true, _) => Phase::Loading,
        (false, false) => Phase::Empty,
        (false, true) => Phase::Ready,
    }
}
