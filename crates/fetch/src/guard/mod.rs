//! Failure policies wrapped around external providers.

mod breaker;
mod known_bad;
mod limiter;

pub use self::breaker::{BreakerState, CircuitBreaker, Permit};
pub use self::known_bad::KnownBad;
pub use self::limiter::Limiter;
