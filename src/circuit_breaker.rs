use failsafe::backoff::{self, Exponential};
use failsafe::failure_policy::{self, ConsecutiveFailures};
use failsafe::futures::CircuitBreaker as AsyncCircuitBreaker;
use failsafe::{Config, StateMachine};
use std::future::Future;
use std::time::Duration;

/// Breaker shared by background database writes (audit trail, token bookkeeping).
pub type DbCircuitBreaker = StateMachine<ConsecutiveFailures<Exponential>, ()>;

/// Creates a circuit breaker for database operations to prevent cascading failures.
///
/// # Configuration
///
/// - **Failure threshold**: 5 consecutive failures triggers OPEN state.
/// - **Backoff**: Exponential backoff from 10s to 60s before attempting recovery.
///
/// # States
///
/// - **CLOSED**: Normal operation, requests pass through.
/// - **OPEN**: Too many failures, writes are dropped without touching the pool.
/// - **HALF_OPEN**: Testing if the database recovered.
pub fn create_db_circuit_breaker() -> DbCircuitBreaker {
    let backoff_strategy = backoff::exponential(
        Duration::from_secs(10), // Initial delay
        Duration::from_secs(60), // Maximum delay
    );

    let failure_policy = failure_policy::consecutive_failures(5, backoff_strategy);

    Config::new().failure_policy(failure_policy).build()
}

/// Runs a fire-and-forget write through the breaker.
///
/// Failures and rejections are logged and swallowed; the caller only learns whether the
/// write landed.
pub async fn run_guarded<F, T, E>(breaker: &DbCircuitBreaker, operation: &str, fut: F) -> Option<T>
where
    F: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    match breaker.call(fut).await {
        Ok(value) => Some(value),
        Err(failsafe::Error::Inner(e)) => {
            tracing::error!("{} failed: {}", operation, e);
            None
        }
        Err(failsafe::Error::Rejected) => {
            tracing::warn!("{} skipped: circuit breaker open", operation);
            None
        }
    }
}
