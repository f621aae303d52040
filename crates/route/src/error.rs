//! Error hierarchy (§7). Only two kinds are ever returned as `Err`: both are
//! detected before or between iterations, never mid-mutation of the live
//! layout. "Deadlock exceeded its budget" is deliberately not one of these
//! — §7 calls it recoverable, so it is a field on [`crate::driver::RouteResult`]
//! instead (see `RouteResult::aborted`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Architecture(#[from] telesabre_circuit::Error),

    #[error(
        "iteration {iteration}: no gate is ready and no swap, teleport, or telegate is \
         admissible for frontier {frontier:?} — architecture/circuit mismatch"
    )]
    EmptyCandidateSet {
        iteration: u64,
        frontier: Vec<usize>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
