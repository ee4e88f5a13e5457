//! Core environment context trait for RoomScan sessions.

use async_trait::async_trait;
use std::future::Future;
use std::time::{Duration, SystemTime};

/// The central interface for environment interaction.
///
/// This trait abstracts time and task spawning so the session engine
/// can run in both production (tokio) and simulation (virtual clock)
/// environments.
///
/// # Implementations
///
/// - **Production**: [`TokioContext`](crate::TokioContext) - wraps
///   `tokio::time` and `tokio::spawn`
/// - **Simulation**: a virtual clock advanced manually by the harness
#[async_trait]
pub trait RoomScanContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// Used for capture throttling and duration measurements. In
    /// simulation, this is the virtual clock time.
    fn now(&self) -> Duration;

    /// Returns the wall-clock time for capture timestamps.
    ///
    /// In simulation, this is derived from virtual clock + epoch offset.
    fn system_time(&self) -> SystemTime;

    /// Suspends execution for the given duration.
    async fn sleep(&self, duration: Duration);

    /// Spawns a background task.
    fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static;

    /// Returns the context's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    /// In simulation, returns the master seed.
    fn seed(&self) -> u64;
}
