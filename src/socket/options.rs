//! Caller-facing configuration and reporting for a connection race.

use crate::dns::{ResolvedAddress, ResolvedList, ResolverError};

/// Outcome of one candidate in a finished race.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CandidateResult {
    /// Position of the candidate's address in the resolved list.
    pub index: usize,
    /// Error recorded for the attempt; `None` for the winner and for
    /// attempts that never recorded one.
    pub os_error: Option<i32>,
}

/// Per-candidate report, filled when [`ConnectOptions::report_details`]
/// is set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectDetails {
    /// One entry per candidate, in attempt order.
    pub results: Vec<CandidateResult>,
    /// The resolved list the indices refer to. Only `connect_by_name` fills
    /// this; `race_connect` callers already own their list.
    pub addresses: Option<ResolvedList>,
}

impl ConnectDetails {
    /// Address attempted by `result`, when the list is attached.
    pub fn address_of(&self, result: &CandidateResult) -> Option<&ResolvedAddress> {
        self.addresses.as_ref()?.get(result.index)
    }
}

/// Connection race configuration.
///
/// The input fields select and order candidates; the output fields are
/// cleared at the start of every race and filled as it runs.
///
/// # Example
///
/// ```rust,ignore
/// use racenet::socket::ConnectOptions;
///
/// let mut options = ConnectOptions::new()
///     .prefer(vec![last_good.clone()])
///     .report_picked(true);
/// let stream = race_connect(&list, Duration::from_secs(2), &mut options)?;
/// let remember = options.picked.take();
/// ```
#[derive(Clone, Debug, Default)]
pub struct ConnectOptions {
    /// Addresses to attempt first, in this order.
    pub preferred: Vec<ResolvedAddress>,
    /// Addresses never to attempt.
    pub excluded: Vec<ResolvedAddress>,
    /// Attempt only addresses matching a preferred entry.
    pub pin_to_preferred: bool,
    /// Fill [`picked`](Self::picked) on success.
    pub report_picked: bool,
    /// Fill [`details`](Self::details).
    pub report_details: bool,

    /// Copy of the address that connected.
    pub picked: Option<ResolvedAddress>,
    pub details: Option<ConnectDetails>,
    /// The resolver's own error when name lookup failed.
    pub resolver_error: Option<ResolverError>,
    /// Number of candidates after preference and exclusion were applied.
    pub candidate_count: usize,
}

impl ConnectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefer(mut self, addresses: Vec<ResolvedAddress>) -> Self {
        self.preferred = addresses;
        self
    }

    pub fn exclude(mut self, addresses: Vec<ResolvedAddress>) -> Self {
        self.excluded = addresses;
        self
    }

    pub fn pin_to_preferred(mut self, pin: bool) -> Self {
        self.pin_to_preferred = pin;
        self
    }

    pub fn report_picked(mut self, report: bool) -> Self {
        self.report_picked = report;
        self
    }

    pub fn report_details(mut self, report: bool) -> Self {
        self.report_details = report;
        self
    }

    pub(crate) fn clear_outputs(&mut self) {
        self.picked = None;
        self.details = None;
        self.resolver_error = None;
        self.candidate_count = 0;
    }
}
