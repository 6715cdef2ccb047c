//! Master liveness tracking.

/// Silence after which the master counts as gone.
pub const MASTER_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct Watchdog {
    last_poll_ms: u64,
    master_silent: bool,
}

impl Watchdog {
    pub fn new(now_ms: u64) -> Self {
        Self {
            last_poll_ms: now_ms,
            master_silent: false,
        }
    }

    /// Record a frame that passed address and CRC checks.
    pub fn feed(&mut self, now_ms: u64) {
        if self.master_silent {
            log::info!("Bus master is polling again");
        }
        self.last_poll_ms = now_ms;
        self.master_silent = false;
    }

    /// Recompute the silence flag. Returns the new flag.
    pub fn check(&mut self, now_ms: u64) -> bool {
        let silent = now_ms.saturating_sub(self.last_poll_ms) > MASTER_TIMEOUT_MS;
        if silent && !self.master_silent {
            log::warn!(
                "No valid poll from the bus master for more than {} ms",
                MASTER_TIMEOUT_MS
            );
        }
        self.master_silent = silent;
        silent
    }

    pub fn is_master_silent(&self) -> bool {
        self.master_silent
    }

    pub fn last_poll_ms(&self) -> u64 {
        self.last_poll_ms
    }
}
