//! Environment abstraction for deterministic testing.
//!
//! Decouples router and store logic from system resources (wall clock,
//! randomness). Tests drive a fixed or stepping clock so message ids and
//! timestamps are reproducible; production uses real time and OS RNG.

/// Abstract environment providing wall-clock time and randomness.
///
/// # Invariants
///
/// - `now_millis()` never goes backwards within one execution context.
///   Message ids and log ordering rely on it being monotonic enough that a
///   later append never reports an earlier time.
/// - `random_bytes()` uses cryptographically secure entropy in production.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current wall-clock time as unix milliseconds.
    ///
    /// Used for message/reply timestamps, time-derived id tokens, and export
    /// timestamps. All three share this single clock.
    fn now_millis(&self) -> u64;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    ///
    /// Convenience for connection id assignment.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}

/// Production environment using system time and OS cryptographic RNG.
///
/// # Panics
///
/// Panics if the OS RNG fails or the system clock reads before the unix
/// epoch. Both indicate OS-level breakage the server cannot operate under.
#[derive(Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::expect_used)]
    fn now_millis(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("invariant: system clock is after the unix epoch")
            .as_millis() as u64
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_past_2023() {
        let env = SystemEnv::new();
        // 2023-01-01 in unix millis
        assert!(env.now_millis() > 1_672_531_200_000);
    }

    #[test]
    fn random_u64_varies() {
        let env = SystemEnv::new();
        // Astronomically unlikely to collide; catches a zeroed RNG.
        assert_ne!(env.random_u64(), env.random_u64());
    }
}
