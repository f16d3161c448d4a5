/// The heartbeat decision ladder.
///
/// Each tick takes a fresh observation and decides: leave a running
/// session alone, wait out a solving challenge, attempt a start, or
/// fall back to a guard-limited page reload. Absence of expected page
/// elements is a normal negative signal on every branch.
use crate::config::Config;
use crate::guard::ReloadGuard;
use crate::indicators::SolvingIndicator;
use crate::observe::{PageProbe, ProbeError};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The stop control is visible — the session is already running.
    SessionActive,
    /// A challenge is still being solved — nothing to do this tick.
    Solving,
    /// Start was clicked and confirmed active (includes polls used).
    Started { polls: u32 },
    /// Start unconfirmed — a page reload was issued.
    Reloaded,
    /// Start unconfirmed — the guard window has not elapsed yet.
    ReloadSuppressed { remaining: Duration },
    /// The probe failed mid-tick; retried on the next tick.
    ProbeFailed,
}

/// Runs the decision ladder once per tick and owns the reload guard.
pub struct HeartbeatController {
    confirm_polls: u32,
    confirm_interval: Duration,
    guard: ReloadGuard,
}

impl HeartbeatController {
    pub fn new(config: &Config) -> Self {
        Self {
            confirm_polls: config.confirm.poll_count,
            confirm_interval: config.confirm.poll_interval(),
            guard: ReloadGuard::new(config.reload.guard_window()),
        }
    }

    /// Evaluate the page once, at wall-clock instant `now`.
    pub async fn tick<P: PageProbe>(&mut self, probe: &P, now: Instant) -> TickOutcome {
        let observation = match probe.observe().await {
            Ok(observation) => observation,
            Err(e) => {
                warn!(error = %e, "observation failed");
                return TickOutcome::ProbeFailed;
            }
        };

        if observation.stop_control {
            debug!("stop control visible, session running");
            return TickOutcome::SessionActive;
        }

        // An all-zero next-cycle countdown means the cycle is due: start
        // regardless of any solving indicator.
        let cycle_due = observation.next_cycle.is_some_and(|c| c.is_zero());
        if cycle_due {
            info!("next cycle countdown at zero, attempting start");
        } else if let SolvingIndicator::Present { remaining } = observation.solving {
            match remaining {
                Some(countdown) => {
                    info!(
                        remaining_secs = countdown.total_secs(),
                        "challenge still solving, waiting"
                    )
                }
                None => info!("solving row present without countdown, waiting"),
            }
            return TickOutcome::Solving;
        }

        match self.attempt_start(probe).await {
            Ok(Some(polls)) => {
                info!(polls, "session start confirmed");
                return TickOutcome::Started { polls };
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "probe failed during start attempt");
                return TickOutcome::ProbeFailed;
            }
        }

        if self.guard.permit(now) {
            info!("session start unconfirmed, reloading page");
            if let Err(e) = probe.reload().await {
                warn!(error = %e, "page reload failed");
                return TickOutcome::ProbeFailed;
            }
            TickOutcome::Reloaded
        } else {
            let remaining = self.guard.remaining(now);
            info!(
                wait_secs = remaining.as_secs(),
                "session start unconfirmed, reload suppressed by guard"
            );
            TickOutcome::ReloadSuppressed { remaining }
        }
    }

    /// Click the start control and poll for the session to flip active.
    ///
    /// Returns the 1-based poll that confirmed the start, or `None`
    /// when the control was missing or the poll budget ran out.
    async fn attempt_start<P: PageProbe>(&self, probe: &P) -> Result<Option<u32>, ProbeError> {
        if !probe.press_start().await? {
            debug!("no start control visible");
            return Ok(None);
        }
        for poll in 1..=self.confirm_polls {
            sleep(self.confirm_interval).await;
            if probe.observe().await?.stop_control {
                return Ok(Some(poll));
            }
        }
        Ok(None)
    }
}

/// Drive the controller: one tick after `startup_delay`, then one per
/// `interval`, until Ctrl-C.
pub async fn run<P: PageProbe>(
    mut controller: HeartbeatController,
    probe: &P,
    startup_delay: Duration,
    interval: Duration,
) {
    tokio::select! {
        _ = sleep(startup_delay) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted during startup delay");
            return;
        }
    }
    loop {
        let outcome = controller.tick(probe, Instant::now()).await;
        debug!(?outcome, "tick complete");
        tokio::select! {
            _ = sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfirmConfig, ReloadConfig};
    use crate::indicators::Countdown;
    use crate::observe::Observation;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Probe that replays a script of observations, then repeats the
    /// last one. Counts presses and reloads.
    struct FakeProbe {
        observations: Mutex<VecDeque<Observation>>,
        fallback: Observation,
        start_control: bool,
        fail_observe: bool,
        presses: AtomicU32,
        reloads: AtomicU32,
    }

    impl FakeProbe {
        fn seeing(observation: Observation) -> Self {
            Self::script(Vec::new(), observation)
        }

        fn script(observations: Vec<Observation>, fallback: Observation) -> Self {
            Self {
                observations: Mutex::new(observations.into()),
                fallback,
                start_control: true,
                fail_observe: false,
                presses: AtomicU32::new(0),
                reloads: AtomicU32::new(0),
            }
        }

        fn without_start_control(mut self) -> Self {
            self.start_control = false;
            self
        }

        fn failing() -> Self {
            let mut probe = Self::seeing(Observation::idle());
            probe.fail_observe = true;
            probe
        }

        fn presses(&self) -> u32 {
            self.presses.load(Ordering::SeqCst)
        }

        fn reloads(&self) -> u32 {
            self.reloads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PageProbe for FakeProbe {
        async fn observe(&self) -> Result<Observation, ProbeError> {
            if self.fail_observe {
                return Err(ProbeError::NoMatchingPage {
                    fragment: "test".to_string(),
                });
            }
            let mut observations = self.observations.lock().unwrap();
            Ok(observations.pop_front().unwrap_or(self.fallback))
        }

        async fn press_start(&self) -> Result<bool, ProbeError> {
            self.presses.fetch_add(1, Ordering::SeqCst);
            Ok(self.start_control)
        }

        async fn reload(&self) -> Result<(), ProbeError> {
            self.reloads.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn controller(poll_count: u32, guard_secs: u64) -> HeartbeatController {
        HeartbeatController::new(&Config {
            confirm: ConfirmConfig {
                poll_count,
                poll_interval_ms: 1,
            },
            reload: ReloadConfig { guard_secs },
            ..Config::default()
        })
    }

    fn active() -> Observation {
        Observation {
            stop_control: true,
            ..Observation::idle()
        }
    }

    fn zero_countdown() -> Countdown {
        Countdown {
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }

    fn solving(remaining: Option<Countdown>) -> SolvingIndicator {
        SolvingIndicator::Present { remaining }
    }

    #[tokio::test]
    async fn test_active_session_takes_no_action() {
        let probe = FakeProbe::seeing(active());
        let mut controller = controller(3, 60);

        let outcome = controller.tick(&probe, Instant::now()).await;

        assert_eq!(outcome, TickOutcome::SessionActive);
        assert_eq!(probe.presses(), 0);
        assert_eq!(probe.reloads(), 0);
    }

    #[tokio::test]
    async fn test_active_check_wins_over_zero_countdown() {
        let probe = FakeProbe::seeing(Observation {
            stop_control: true,
            next_cycle: Some(zero_countdown()),
            solving: SolvingIndicator::Absent,
        });
        let mut controller = controller(3, 60);

        let outcome = controller.tick(&probe, Instant::now()).await;

        assert_eq!(outcome, TickOutcome::SessionActive);
        assert_eq!(probe.presses(), 0);
    }

    #[tokio::test]
    async fn test_solving_with_remaining_time_waits() {
        let probe = FakeProbe::seeing(Observation {
            stop_control: false,
            next_cycle: None,
            solving: solving(Some(Countdown {
                hours: 0,
                minutes: 4,
                seconds: 10,
            })),
        });
        let mut controller = controller(3, 60);

        let outcome = controller.tick(&probe, Instant::now()).await;

        assert_eq!(outcome, TickOutcome::Solving);
        assert_eq!(probe.presses(), 0);
        assert_eq!(probe.reloads(), 0);
    }

    #[tokio::test]
    async fn test_solving_without_countdown_still_waits() {
        let probe = FakeProbe::seeing(Observation {
            stop_control: false,
            next_cycle: None,
            solving: solving(None),
        });
        let mut controller = controller(3, 60);

        let outcome = controller.tick(&probe, Instant::now()).await;

        assert_eq!(outcome, TickOutcome::Solving);
        assert_eq!(probe.presses(), 0);
    }

    #[tokio::test]
    async fn test_zero_countdown_starts_even_while_solving() {
        let first = Observation {
            stop_control: false,
            next_cycle: Some(zero_countdown()),
            solving: solving(Some(Countdown {
                hours: 0,
                minutes: 2,
                seconds: 0,
            })),
        };
        // The start confirms on the first poll.
        let probe = FakeProbe::script(vec![first], active());
        let mut controller = controller(3, 60);

        let outcome = controller.tick(&probe, Instant::now()).await;

        assert_eq!(outcome, TickOutcome::Started { polls: 1 });
        assert_eq!(probe.presses(), 1);
        assert_eq!(probe.reloads(), 0);
    }

    #[tokio::test]
    async fn test_confirmed_start_prevents_reload() {
        let probe = FakeProbe::script(vec![Observation::idle()], active());
        let mut controller = controller(3, 60);

        let outcome = controller.tick(&probe, Instant::now()).await;

        assert_eq!(outcome, TickOutcome::Started { polls: 1 });
        assert_eq!(probe.reloads(), 0);
    }

    #[tokio::test]
    async fn test_confirmation_can_take_several_polls() {
        let probe = FakeProbe::script(
            vec![Observation::idle(), Observation::idle(), Observation::idle()],
            active(),
        );
        let mut controller = controller(6, 60);

        let outcome = controller.tick(&probe, Instant::now()).await;

        assert_eq!(outcome, TickOutcome::Started { polls: 3 });
    }

    #[tokio::test]
    async fn test_unconfirmed_start_reloads() {
        let probe = FakeProbe::seeing(Observation::idle());
        let mut controller = controller(3, 60);

        let outcome = controller.tick(&probe, Instant::now()).await;

        assert_eq!(outcome, TickOutcome::Reloaded);
        assert_eq!(probe.presses(), 1);
        assert_eq!(probe.reloads(), 1);
    }

    #[tokio::test]
    async fn test_missing_start_control_still_reloads() {
        let probe = FakeProbe::seeing(Observation::idle()).without_start_control();
        let mut controller = controller(3, 60);

        let outcome = controller.tick(&probe, Instant::now()).await;

        assert_eq!(outcome, TickOutcome::Reloaded);
        assert_eq!(probe.reloads(), 1);
    }

    #[tokio::test]
    async fn test_guard_blocks_second_reload_within_window() {
        let base = Instant::now();
        let probe = FakeProbe::seeing(Observation::idle());
        let mut controller = controller(1, 60);

        assert_eq!(controller.tick(&probe, base).await, TickOutcome::Reloaded);
        assert_eq!(
            controller
                .tick(&probe, base + Duration::from_secs(30))
                .await,
            TickOutcome::ReloadSuppressed {
                remaining: Duration::from_secs(30)
            }
        );
        assert_eq!(
            controller
                .tick(&probe, base + Duration::from_secs(61))
                .await,
            TickOutcome::Reloaded
        );
        assert_eq!(probe.reloads(), 2);
    }

    #[tokio::test]
    async fn test_probe_failure_ends_tick_without_action() {
        let probe = FakeProbe::failing();
        let mut controller = controller(3, 60);

        let outcome = controller.tick(&probe, Instant::now()).await;

        assert_eq!(outcome, TickOutcome::ProbeFailed);
        assert_eq!(probe.presses(), 0);
        assert_eq!(probe.reloads(), 0);
    }
}
