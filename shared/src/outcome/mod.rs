#[allow(clippy::module_inception)]
mod outcome;
mod outcome_store;

pub use outcome::{FailedOutcome, JoinedOutcome, Outcome};
pub use outcome_store::{OutcomeStore, ResultId};
