//! Refinement state machine

use std::fmt;

/// Where a unit's refinement stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefineState {
    /// Fetching the full range
    Fetching,
    /// The full range is capped or too large
    Capped,
    /// Fetching sub-windows
    Refining,
    /// Everything reachable was collected
    Done,
    /// Stopped by a quota signal
    QuotaHalted,
    /// Stopped because a fetch ran out of retries
    Failed,
}

impl RefineState {
    /// No further events change this state
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::QuotaHalted | Self::Failed)
    }
}

impl fmt::Display for RefineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fetching => "fetching",
            Self::Capped => "capped",
            Self::Refining => "refining",
            Self::Done => "done",
            Self::QuotaHalted => "quota-halted",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Something that happened while refining
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefineEvent {
    /// The pre-flight estimate exceeded the threshold
    EstimateTooLarge,
    /// The full-range fetch finished
    FetchComplete {
        /// The cap rule asked for a re-query
        requery: bool,
    },
    /// Sub-windows were planned
    SubQueriesPlanned,
    /// The window cannot be split any further
    NothingToSplit,
    /// Every sub-window was fetched
    SubQueriesComplete,
    /// A quota signal arrived
    Quota,
    /// A fetch ran out of retries
    Failure,
}

/// Next state for an event
///
/// Terminal states absorb every event; events that make no sense in the
/// current state leave it unchanged.
pub fn transition(state: RefineState, event: RefineEvent) -> RefineState {
    use RefineEvent as E;
    use RefineState as S;

    if state.is_terminal() {
        return state;
    }

    match (state, event) {
        (_, E::Quota) => S::QuotaHalted,
        (_, E::Failure) => S::Failed,
        (S::Fetching, E::EstimateTooLarge) => S::Capped,
        (S::Fetching, E::FetchComplete { requery: true }) => S::Capped,
        (S::Fetching, E::FetchComplete { requery: false }) => S::Done,
        (S::Capped, E::SubQueriesPlanned) => S::Refining,
        (S::Capped, E::NothingToSplit) => S::Done,
        (S::Refining, E::SubQueriesComplete) => S::Done,
        (state, _) => state,
    }
}
