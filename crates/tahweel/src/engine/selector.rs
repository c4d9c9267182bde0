//! Engine selection and fallback.
//!
//! A pure decision function over the availability flags computed at startup:
//! no engine is touched here, which is what makes fallback testable without
//! any real tool installed. When the requested engine is unavailable the
//! effective engine is rewritten in the result — callers must report the
//! engine that actually ran, never the one that was asked for.

use super::{EngineAvailability, EngineKind};
use crate::error::{Result, TahweelError};

/// Outcome of engine selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// The engine that will actually run.
    pub engine: EngineKind,
    /// True when this differs from the requested engine.
    pub fallback: bool,
}

/// Decide which engine handles a conversion.
///
/// 1. The requested engine, if available.
/// 2. Otherwise the alternative tier, flagged as a fallback.
/// 3. Otherwise `NoEngineAvailable`.
pub fn select_engine(
    requested: EngineKind,
    availability: EngineAvailability,
) -> Result<Selection> {
    if availability.has(requested) {
        return Ok(Selection {
            engine: requested,
            fallback: false,
        });
    }

    let alternative = requested.alternative();
    if availability.has(alternative) {
        return Ok(Selection {
            engine: alternative,
            fallback: true,
        });
    }

    Err(TahweelError::NoEngineAvailable)
}
