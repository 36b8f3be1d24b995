/// Workload driven against the review service.
pub mod context;
pub mod driver;
pub mod payload;

pub use context::{
    Clock, FastRandom, FixedClock, IterationContext, RandomSource, ScriptedRandom, Sequences,
    SystemClock,
};
pub use driver::{CallRecord, Credentials, IterationOutcome, WorkloadDriver};
pub use payload::{DeactivatePayload, PullRequestPayload, TeamMember, TeamPayload};
