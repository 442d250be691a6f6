//! Process-wide `Runtime` singleton (`SPEC_FULL.md` §5 "Shared state", §9
//! "Global mutable state").
//!
//! The source keeps three separate globals: an ephemeral-address counter, a
//! one-shot RNG-seeded flag, and the cleanup registry, plus a global
//! `error_flag`. This module collapses them into a single lazily-initialised
//! singleton, following the Design Notes' instruction to model process-wide
//! state as one `Runtime` rather than scattered statics.
//!
//! The exit-time drain itself is not implemented here as an `atexit` hook —
//! see `DESIGN.md`'s Open Question resolution — it falls out of
//! `Endpoint::release`/`Drop`. This module keeps only the liveness counter
//! used to assert "nothing left un-released" in tests, plus the ephemeral
//! address counter and the RNG seed-once flag clients use to draw
//! `request_id`s and frame ids.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::OnceLock;

use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::sync::Mutex as AsyncMutex;

use crate::config::Config;

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Process-wide communication runtime. Obtained via [`Runtime::global`];
/// tests that want isolation construct their own with [`Runtime::new`] and
/// thread it through explicitly rather than touching the global.
pub struct Runtime {
    config: Config,
    ephemeral_counter: AtomicU64,
    live_endpoints: AtomicU64,
    error_flag: AtomicBool,
    rng: AsyncMutex<StdRng>,
}

impl Runtime {
    pub fn new(config: Config) -> Self {
        Runtime {
            config,
            ephemeral_counter: AtomicU64::new(0),
            live_endpoints: AtomicU64::new(0),
            error_flag: AtomicBool::new(false),
            rng: AsyncMutex::new(StdRng::from_entropy()),
        }
    }

    /// The lazily-initialised, process-wide instance, seeded from
    /// `Config::from_env()` on first access (mirrors the source's one-shot
    /// RNG seeding, generalised to the whole singleton).
    pub fn global() -> &'static Runtime {
        RUNTIME.get_or_init(|| Runtime::new(Config::from_env()))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Allocate a fresh ephemeral address suffix, used by multipart chunk
    /// channels, RPC reply endpoints, and `tempASCIITable.N`-style names.
    pub fn next_ephemeral_id(&self) -> u64 {
        self.ephemeral_counter.fetch_add(1, Ordering::Relaxed)
    }

    pub fn mark_registered(&self) {
        self.live_endpoints.fetch_add(1, Ordering::AcqRel);
    }

    pub fn mark_released(&self) {
        self.live_endpoints.fetch_sub(1, Ordering::AcqRel);
    }

    /// Testable property (`SPEC_FULL.md` §8): after every endpoint created
    /// during a run has been released, this is zero.
    pub fn live_endpoint_count(&self) -> u64 {
        self.live_endpoints.load(Ordering::Acquire)
    }

    pub fn set_error_flag(&self) {
        self.error_flag.store(true, Ordering::Release);
    }

    /// Suppresses the exit drain's best-effort EOF emission once a prior
    /// error has been recorded, per `SPEC_FULL.md` §4.8/§7.
    pub fn error_flag(&self) -> bool {
        self.error_flag.load(Ordering::Acquire)
    }

    /// Draw a random id string for frame ids / RPC `request_id`s.
    pub async fn random_id(&self) -> String {
        let mut rng = self.rng.lock().await;
        rng.gen::<u32>().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ephemeral_ids_are_unique_and_increasing() {
        let rt = Runtime::new(Config::default());
        let a = rt.next_ephemeral_id();
        let b = rt.next_ephemeral_id();
        assert!(b > a);
    }

    #[test]
    fn liveness_counter_tracks_register_release() {
        let rt = Runtime::new(Config::default());
        assert_eq!(rt.live_endpoint_count(), 0);
        rt.mark_registered();
        rt.mark_registered();
        assert_eq!(rt.live_endpoint_count(), 2);
        rt.mark_released();
        assert_eq!(rt.live_endpoint_count(), 1);
        rt.mark_released();
        assert_eq!(rt.live_endpoint_count(), 0);
    }
}
