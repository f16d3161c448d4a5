/// The observation seam between the heartbeat controller and the page.
///
/// The controller never reads the page directly; it sees `Observation`
/// snapshots returned by a `PageProbe`. Tests inject fixed observations
/// through the same trait.
use crate::indicators::{Countdown, SolvingIndicator};
use async_trait::async_trait;
use chromiumoxide::error::CdpError;

/// Snapshot of the page state relevant to one heartbeat decision.
///
/// Recomputed fresh on every observation; never persisted between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// A stop control is visible — the session is running.
    pub stop_control: bool,
    /// Parsed time remaining until the next cycle, if the indicator was
    /// found and its countdown parsed.
    pub next_cycle: Option<Countdown>,
    /// Solving-in-progress indicator state.
    pub solving: SolvingIndicator,
}

impl Observation {
    /// An idle page: no stop control, no indicators at all.
    #[allow(dead_code)]
    pub fn idle() -> Self {
        Self {
            stop_control: false,
            next_cycle: None,
            solving: SolvingIndicator::Absent,
        }
    }
}

/// Errors produced by probe operations.
#[derive(Debug)]
pub enum ProbeError {
    /// Could not reach the browser's DevTools endpoint.
    Connect { url: String, source: CdpError },
    /// No open page matched the configured URL fragment.
    NoMatchingPage { fragment: String },
    /// A script evaluation failed in transit.
    Eval { source: CdpError },
    /// A script evaluation returned a payload we could not decode.
    Payload { message: String },
    /// The page could not be reloaded.
    Reload { source: CdpError },
}

impl std::fmt::Display for ProbeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeError::Connect { url, source } => {
                write!(f, "failed to connect to browser at {url}: {source}")
            }
            ProbeError::NoMatchingPage { fragment } => {
                if fragment.is_empty() {
                    write!(f, "browser has no open pages")
                } else {
                    write!(f, "no open page URL contains '{fragment}'")
                }
            }
            ProbeError::Eval { source } => write!(f, "script evaluation failed: {source}"),
            ProbeError::Payload { message } => {
                write!(f, "could not decode scraped page state: {message}")
            }
            ProbeError::Reload { source } => write!(f, "page reload failed: {source}"),
        }
    }
}

impl std::error::Error for ProbeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProbeError::Connect { source, .. }
            | ProbeError::Eval { source }
            | ProbeError::Reload { source } => Some(source),
            ProbeError::NoMatchingPage { .. } | ProbeError::Payload { .. } => None,
        }
    }
}

/// Read-and-act capability over the watched page.
#[async_trait]
pub trait PageProbe: Send + Sync {
    /// Take a fresh snapshot of the page's visible state.
    async fn observe(&self) -> Result<Observation, ProbeError>;

    /// Find the start control and click it.
    ///
    /// Returns `false` when no such control is visible; absence is a
    /// normal negative signal, not an error.
    async fn press_start(&self) -> Result<bool, ProbeError>;

    /// Trigger a full page reload.
    async fn reload(&self) -> Result<(), ProbeError>;
}
