//! Probe dispatch
//!
//! Turns collision sets into form requests, issues them along a batch-size
//! ladder and records latency per request.

mod campaign;
mod dispatcher;
mod ladder;
mod request;
mod results;

pub use campaign::{Campaign, CampaignJob, CampaignState, JobOutcome, JobReport};
pub use dispatcher::{DispatcherConfig, ProbeDispatcher, DEFAULT_SEED};
pub use ladder::BatchLadder;
pub use request::{EncodingRules, KeyEncoding, ProbeTarget};
pub use results::{ProbeResult, ProbeRun, RunOutcome};

#[cfg(test)]
pub(crate) use dispatcher::tests::{dispatcher as test_dispatcher, ScriptedTransport};
#[cfg(test)]
pub(crate) use request::ProbeRequest;
#[cfg(test)]
pub(crate) use results::ProbeOutcome;
