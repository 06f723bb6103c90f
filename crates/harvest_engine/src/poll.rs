//! Bounded polling. Every wait in the pipeline goes through [`Poller`], so a
//! condition that never holds ends in [`PollOutcome::TimedOut`] instead of
//! blocking forever.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSpec {
    pub interval: Duration,
    pub timeout: Duration,
    /// Optional cap on probes, independent of the deadline.
    pub max_attempts: Option<u32>,
}

impl PollSpec {
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            max_attempts: None,
        }
    }

    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

/// What a single probe saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe<T> {
    Found(T),
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Found(T),
    TimedOut,
}

impl<T> PollOutcome<T> {
    pub fn found(self) -> Option<T> {
        match self {
            PollOutcome::Found(value) => Some(value),
            PollOutcome::TimedOut => None,
        }
    }
}

/// Budget tracker for a probe loop.
///
/// ```ignore
/// let mut poller = Poller::new(spec);
/// loop {
///     if ready(page).await? { break PollOutcome::Found(()); }
///     if !poller.wait().await { break PollOutcome::TimedOut; }
/// }
/// ```
#[derive(Debug)]
pub struct Poller {
    spec: PollSpec,
    started: Instant,
    attempts: u32,
}

impl Poller {
    pub fn new(spec: PollSpec) -> Self {
        Self {
            spec,
            started: Instant::now(),
            attempts: 0,
        }
    }

    /// Probes made so far (each `wait` call closes one probe).
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Record a failed probe. Sleeps for the interval (clipped to the
    /// deadline) and returns `true` if another probe is allowed.
    pub async fn wait(&mut self) -> bool {
        self.attempts += 1;
        if self
            .spec
            .max_attempts
            .is_some_and(|max| self.attempts >= max)
        {
            return false;
        }
        let elapsed = self.started.elapsed();
        if elapsed >= self.spec.timeout {
            return false;
        }
        tokio::time::sleep(self.spec.interval.min(self.spec.timeout - elapsed)).await;
        true
    }
}

/// Run `probe` until it finds something or the budget in `spec` is spent.
/// The probe always runs at least once; probe errors abort the poll.
pub async fn poll_until<T, E, F, Fut>(spec: PollSpec, mut probe: F) -> Result<PollOutcome<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Probe<T>, E>>,
{
    let mut poller = Poller::new(spec);
    loop {
        if let Probe::Found(value) = probe().await? {
            return Ok(PollOutcome::Found(value));
        }
        if !poller.wait().await {
            return Ok(PollOutcome::TimedOut);
        }
    }
}
