//! Simulation context implementing RoomScanContext for deterministic
//! testing.

use async_trait::async_trait;
use roomscan_env::RoomScanContext;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Simulation context backed by a virtual clock.
///
/// Sleeping advances virtual time instead of blocking, so capture
/// throttling and timestamps are reproducible for a given seed.
pub struct SimContext {
    /// Master seed for this simulation
    seed: u64,

    /// Current virtual time (nanoseconds since simulation start)
    virtual_time_ns: Arc<Mutex<u64>>,

    /// Epoch offset (virtual time 0 maps to this wall-clock time)
    epoch: SystemTime,
}

impl SimContext {
    /// Creates a new SimContext with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            virtual_time_ns: Arc::new(Mutex::new(0)),
            epoch: UNIX_EPOCH + Duration::from_secs(1704067200), // 2024-01-01 00:00:00 UTC
        }
    }

    /// Creates an Arc-wrapped context for sharing.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    /// Advances virtual time by the given duration.
    pub fn advance_time(&self, duration: Duration) {
        let mut time = self.virtual_time_ns.lock().unwrap_or_else(|e| e.into_inner());
        *time += duration.as_nanos() as u64;
    }

    /// Returns the current virtual time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        *self.virtual_time_ns.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Clone for SimContext {
    fn clone(&self) -> Self {
        Self {
            seed: self.seed,
            virtual_time_ns: Arc::clone(&self.virtual_time_ns),
            epoch: self.epoch,
        }
    }
}

#[async_trait]
impl RoomScanContext for SimContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.time_ns())
    }

    fn system_time(&self) -> SystemTime {
        self.epoch + self.now()
    }

    async fn sleep(&self, duration: Duration) {
        // In simulation, sleep advances virtual time
        self.advance_time(duration);
    }

    fn spawn<F>(&self, name: &str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let _name = name.to_string();
        tokio::spawn(async move {
            future.await;
        });
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}
