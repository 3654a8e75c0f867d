//! # Runtime Configuration Module
//!
//! Environment variable-based configuration for the coroutine runtime.
//!
//! ## Environment Variables
//!
//! ### `SNOOZE_WORKERS`
//!
//! Number of scheduler worker threads. `auto` (or unset) lets the runtime
//! pick one worker per core.
//!
//! ### `SNOOZE_STACK_SIZE`
//!
//! Stack size for connection coroutines. Accepts values in:
//! - Decimal: `1048576` (1 MiB)
//! - Hexadecimal: `0x100000` (1 MiB)
//!
//! Default: `0x100000` (1 MiB).
//!
//! Stack size drives total memory: every in-flight connection owns one
//! coroutine, so resident stack memory is roughly
//! `stack_size × concurrent_connections`. Shrink it for fleets of mostly
//! idle connections, grow it for handlers with deep call chains.
//!
//! ## Usage
//!
//! ```rust
//! use snooze::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! config.apply();
//! ```

use std::env;

const DEFAULT_STACK_SIZE: usize = 0x100000;

/// Runtime configuration loaded from environment variables.
///
/// Load at startup with [`RuntimeConfig::from_env`] and install with
/// [`RuntimeConfig::apply`] before any coroutine is spawned.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Scheduler worker threads; `None` means one per core.
    pub workers: Option<usize>,
    /// Stack size for coroutines in bytes (default: 1 MiB / 0x100000).
    pub stack_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: None,
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from `SNOOZE_WORKERS` and `SNOOZE_STACK_SIZE`.
    pub fn from_env() -> Self {
        let workers = match env::var("SNOOZE_WORKERS") {
            Ok(val) if val.eq_ignore_ascii_case("auto") => None,
            Ok(val) => val.parse().ok(),
            Err(_) => None,
        };

        let stack_size = env::var("SNOOZE_STACK_SIZE")
            .ok()
            .and_then(|s| parse_size(&s))
            .unwrap_or(DEFAULT_STACK_SIZE);

        RuntimeConfig {
            workers,
            stack_size,
        }
    }

    /// Install this configuration into the coroutine runtime.
    ///
    /// Must run before the first coroutine spawn; later calls have no effect
    /// on coroutines that already exist.
    pub fn apply(&self) {
        let config = may::config();
        if let Some(workers) = self.workers {
            config.set_workers(workers);
        }
        config.set_stack_size(self.stack_size);
    }
}

/// Parse a byte size in decimal or `0x`-prefixed hexadecimal.
fn parse_size(val: &str) -> Option<usize> {
    if let Some(hex) = val.strip_prefix("0x") {
        usize::from_str_radix(hex, 16).ok()
    } else {
        val.parse().ok()
    }
}
