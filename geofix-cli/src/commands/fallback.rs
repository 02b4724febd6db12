//! Fallback watchdog for the run command.
//!
//! The driver listens to a primary provider directly. When the primary goes
//! quiet for longer than the timeout, the location service is brought up as
//! a fallback for a fixed window, then stopped again while the primary is
//! re-armed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use geofix::host::{ProviderHost, ProviderListener, UpdateRequest};
use geofix::{Fix, ProviderId, RawPosition, SubscriptionError};

/// Provider the driver subscribes to itself in fallback mode.
pub const PRIMARY_PROVIDER: ProviderId = ProviderId::Passive;

/// Default length of a fallback window, in seconds.
pub const DEFAULT_FALLBACK_WINDOW_SECS: u64 = 60;

/// Which source is currently expected to deliver fixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Primary,
    Fallback,
}

/// What the driver should do when the watchdog deadline passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogAction {
    /// Primary timed out: drop it and start the service.
    StartFallback,
    /// Window elapsed: stop the service and re-register the primary.
    ResumePrimary,
}

/// Phase tracking for the primary/fallback switch.
#[derive(Debug)]
pub struct FallbackWatchdog {
    timeout: Duration,
    window: Duration,
    phase: Phase,
    deadline: Instant,
    problems: u32,
}

impl FallbackWatchdog {
    pub fn new(timeout: Duration, window: Duration, now: Instant) -> Self {
        Self {
            timeout,
            window,
            phase: Phase::Primary,
            deadline: now + timeout,
            problems: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Number of times the primary timed out.
    pub fn problem_count(&self) -> u32 {
        self.problems
    }

    /// A primary fix arrived; push the timeout back.
    pub fn on_primary_fix(&mut self, now: Instant) {
        if self.phase == Phase::Primary {
            self.deadline = now + self.timeout;
        }
    }

    /// Advance past the current deadline.
    pub fn on_deadline(&mut self, now: Instant) -> WatchdogAction {
        match self.phase {
            Phase::Primary => {
                self.problems += 1;
                self.phase = Phase::Fallback;
                self.deadline = now + self.window;
                WatchdogAction::StartFallback
            }
            Phase::Fallback => {
                self.phase = Phase::Primary;
                self.deadline = now + self.timeout;
                WatchdogAction::ResumePrimary
            }
        }
    }
}

/// Listener that hands primary fixes to the driver loop.
pub struct PrimaryListener {
    fixes: mpsc::UnboundedSender<Fix>,
}

impl ProviderListener for PrimaryListener {
    fn on_position(&self, position: RawPosition) {
        // Receiver gone means the driver is shutting down
        let _ = self.fixes.send(Fix::from_raw(PRIMARY_PROVIDER, position));
    }
}

/// Register the primary listener with the host.
pub fn register_primary(
    host: &dyn ProviderHost,
    request: &UpdateRequest,
    fixes: &mpsc::UnboundedSender<Fix>,
) -> Result<(), SubscriptionError> {
    let listener: Arc<dyn ProviderListener> = Arc::new(PrimaryListener {
        fixes: fixes.clone(),
    });
    host.request_updates(PRIMARY_PROVIDER, request, listener)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geofix::host::SimulatedHost;

    const TIMEOUT: Duration = Duration::from_secs(15);
    const WINDOW: Duration = Duration::from_secs(60);

    #[test]
    fn test_new_watchdog_waits_on_primary() {
        let now = Instant::now();
        let watchdog = FallbackWatchdog::new(TIMEOUT, WINDOW, now);

        assert_eq!(watchdog.phase(), Phase::Primary);
        assert_eq!(watchdog.deadline(), now + TIMEOUT);
        assert_eq!(watchdog.problem_count(), 0);
    }

    #[test]
    fn test_primary_fix_pushes_deadline_back() {
        let start = Instant::now();
        let mut watchdog = FallbackWatchdog::new(TIMEOUT, WINDOW, start);

        let later = start + Duration::from_secs(10);
        watchdog.on_primary_fix(later);

        assert_eq!(watchdog.deadline(), later + TIMEOUT);
        assert_eq!(watchdog.phase(), Phase::Primary);
    }

    #[test]
    fn test_timeout_switches_to_fallback_for_window() {
        let start = Instant::now();
        let mut watchdog = FallbackWatchdog::new(TIMEOUT, WINDOW, start);

        let fired = start + TIMEOUT;
        assert_eq!(watchdog.on_deadline(fired), WatchdogAction::StartFallback);
        assert_eq!(watchdog.phase(), Phase::Fallback);
        assert_eq!(watchdog.deadline(), fired + WINDOW);
        assert_eq!(watchdog.problem_count(), 1);
    }

    #[test]
    fn test_fixes_during_fallback_do_not_extend_window() {
        let start = Instant::now();
        let mut watchdog = FallbackWatchdog::new(TIMEOUT, WINDOW, start);
        let fired = start + TIMEOUT;
        watchdog.on_deadline(fired);

        watchdog.on_primary_fix(fired + Duration::from_secs(5));

        assert_eq!(watchdog.deadline(), fired + WINDOW);
    }

    #[test]
    fn test_window_end_resumes_primary_and_counts_each_timeout() {
        let start = Instant::now();
        let mut watchdog = FallbackWatchdog::new(TIMEOUT, WINDOW, start);

        let first = start + TIMEOUT;
        watchdog.on_deadline(first);
        let resumed = first + WINDOW;
        assert_eq!(watchdog.on_deadline(resumed), WatchdogAction::ResumePrimary);
        assert_eq!(watchdog.phase(), Phase::Primary);
        assert_eq!(watchdog.deadline(), resumed + TIMEOUT);

        watchdog.on_deadline(resumed + TIMEOUT);
        assert_eq!(watchdog.problem_count(), 2);
    }

    #[test]
    fn test_primary_listener_forwards_fixes() {
        let host = SimulatedHost::with_defaults();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let request = UpdateRequest::new(Duration::from_secs(1), 0.0);

        register_primary(&host, &request, &tx).unwrap();
        host.emit(
            PRIMARY_PROVIDER,
            RawPosition {
                latitude: 1.0,
                longitude: 2.0,
                accuracy_m: 10.0,
                timestamp_ms: 42,
            },
        );

        let fix = rx.try_recv().unwrap();
        assert_eq!(fix.provider, PRIMARY_PROVIDER);
        assert_eq!(fix.timestamp_ms, 42);
    }

    #[test]
    fn test_register_primary_fails_without_provider() {
        let host = SimulatedHost::with_providers(&[ProviderId::Satellite]);
        let (tx, _rx) = mpsc::unbounded_channel();
        let request = UpdateRequest::new(Duration::from_secs(1), 0.0);

        let err = register_primary(&host, &request, &tx).unwrap_err();
        assert_eq!(
            err,
            SubscriptionError::ProviderUnavailable {
                provider: PRIMARY_PROVIDER
            }
        );
    }
}
