use failsafe::backoff::{self, Exponential};
use failsafe::failure_policy::{self, ConsecutiveFailures};
use failsafe::{Config, StateMachine};
use std::future::Future;
use std::time::Duration;

use crate::errors::AppError;

/// Circuit breaker shared by the clones of one upstream client.
pub type UpstreamBreaker = StateMachine<ConsecutiveFailures<Exponential>, ()>;

/// Creates a circuit breaker for an upstream HTTP service (registry, social search, WhatsApp gateway).
///
/// # Configuration
///
/// - **Failure threshold**: 5 consecutive failures triggers OPEN state.
/// - **Backoff**: Exponential backoff from 10s to 60s before attempting recovery.
///
/// # States
///
/// - **CLOSED**: Normal operation, requests pass through.
/// - **OPEN**: Too many failures, requests fail fast.
/// - **HALF_OPEN**: Testing if service recovered.
pub fn create_upstream_circuit_breaker() -> UpstreamBreaker {
    let backoff_strategy = backoff::exponential(
        Duration::from_secs(10), // Initial delay
        Duration::from_secs(60), // Maximum delay
    );

    let failure_policy = failure_policy::consecutive_failures(5, backoff_strategy);

    Config::new().failure_policy(failure_policy).build()
}

/// Runs an upstream call through the breaker.
///
/// A call rejected by an open circuit and a call that failed both come back as
/// `UpstreamUnavailable`, labelled with `service`.
pub async fn guarded<F, T>(breaker: &UpstreamBreaker, service: &str, call: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    use failsafe::futures::CircuitBreaker;

    match breaker.call(call).await {
        Ok(value) => Ok(value),
        Err(failsafe::Error::Rejected) => {
            tracing::warn!("{} circuit open, failing fast", service);
            Err(AppError::UpstreamUnavailable(format!(
                "{} temporarily unavailable (circuit open)",
                service
            )))
        }
        Err(failsafe::Error::Inner(e)) => Err(e),
    }
}
