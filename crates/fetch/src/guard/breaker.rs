use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Observable state, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
enum State {
    Closed { failures: u32 },
    Open { open_until: Instant },
    /// One trial call is allowed through; its result decides the next state.
    HalfOpen { trial_in_flight: bool },
}

/// Consecutive-failure circuit breaker.
///
/// After `threshold` consecutive failures the circuit opens and every call is
/// rejected for `break_duration`. The first call after that is let through as
/// a trial: success closes the circuit, failure re-opens it. A trial call
/// that never reports back (cancelled, panicked) counts as failed.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<State>,
    threshold: u32,
    break_duration: Duration,
}
impl CircuitBreaker {
    pub fn new(threshold: u32, break_duration: Duration) -> Self {
        Self {
            state: Mutex::new(State::Closed { failures: 0 }),
            threshold: threshold.max(1),
            break_duration,
        }
    }

    /// Ask to make a call. `None` means the call must not be made; otherwise
    /// report the result through the returned [`Permit`].
    pub fn enter(&self) -> Option<Permit<'_>> {
        self.enter_at(Instant::now()).map(|trial| Permit {
            breaker: self,
            trial,
            settled: false,
        })
    }

    pub fn success(&self) {
        *self.state.lock() = State::Closed { failures: 0 };
    }

    pub fn failure(&self) {
        self.failure_at(Instant::now())
    }

    pub fn state(&self) -> BreakerState {
        match *self.state.lock() {
            State::Closed { .. } => BreakerState::Closed,
            State::Open { .. } => BreakerState::Open,
            State::HalfOpen { .. } => BreakerState::HalfOpen,
        }
    }

    /// `Some(true)` admits the half-open trial call, `Some(false)` an ordinary
    /// one.
    fn enter_at(&self, now: Instant) -> Option<bool> {
        let mut state = self.state.lock();
        match &mut *state {
            State::Closed { .. } => Some(false),
            State::Open { open_until } if now >= *open_until => {
                *state = State::HalfOpen { trial_in_flight: true };
                Some(true)
            },
            State::Open { .. } => None,
            State::HalfOpen { trial_in_flight } if !*trial_in_flight => {
                *trial_in_flight = true;
                Some(true)
            },
            State::HalfOpen { .. } => None,
        }
    }

    /// A call let through while half-open went away without a result.
    fn abandon_at(&self, now: Instant) {
        let mut state = self.state.lock();
        if let State::HalfOpen { trial_in_flight: true } = *state {
            tracing::warn!("Circuit re-opened after unfinished trial call");
            *state = State::Open {
                open_until: now + self.break_duration,
            };
        }
    }

    fn failure_at(&self, now: Instant) {
        let mut state = self.state.lock();
        match &mut *state {
            State::Closed { failures } => {
                *failures = failures.saturating_add(1);
                if *failures >= self.threshold {
                    tracing::warn!(failures = *failures, "Circuit opened");
                    *state = State::Open {
                        open_until: now + self.break_duration,
                    };
                }
            },
            State::HalfOpen { .. } => {
                tracing::warn!("Circuit re-opened after failed trial call");
                *state = State::Open {
                    open_until: now + self.break_duration,
                };
            },
            // A result from a call that entered before the circuit opened.
            State::Open { .. } => {},
        }
    }
}

/// An admitted call. Dropping the half-open trial call without
/// [`settle`](Self::settle) re-opens the circuit.
#[derive(Debug)]
#[must_use = "report the call's result with `settle`"]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}
impl Permit<'_> {
    pub fn settle(mut self, healthy: bool) {
        self.settled = true;
        if healthy {
            self.breaker.success();
        } else {
            self.breaker.failure();
        }
    }
}
impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.trial && !self.settled {
            self.breaker.abandon_at(Instant::now());
        }
    }
}
