//! Environment configuration
//!
//! Read once at boot into a typed struct; components receive values by
//! handle. No mutable module-level state.

use std::env;

use tracing::warn;

#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub cold_start_enabled: bool,
    pub cold_start_background: bool,
    /// 0 = auto-detect from available parallelism
    pub cold_start_workers: usize,
    pub watch_debounce_ms: u64,
    pub watch_rate_limit: u32,
    pub embed_batch_size: usize,
    pub embed_concurrency: usize,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            cold_start_enabled: true,
            cold_start_background: true,
            cold_start_workers: 0,
            watch_debounce_ms: 300,
            watch_rate_limit: 100,
            embed_batch_size: 256,
            embed_concurrency: 8,
        }
    }
}

impl EnvConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cold_start_enabled: read_bool("COLD_START_ENABLED", defaults.cold_start_enabled),
            cold_start_background: read_bool(
                "COLD_START_BACKGROUND",
                defaults.cold_start_background,
            ),
            cold_start_workers: read_num("COLD_START_WORKERS", defaults.cold_start_workers),
            watch_debounce_ms: read_num("WATCH_DEBOUNCE_MS", defaults.watch_debounce_ms),
            watch_rate_limit: read_num("WATCH_RATE_LIMIT", defaults.watch_rate_limit),
            embed_batch_size: read_num("EMBED_BATCH_SIZE", defaults.embed_batch_size),
            embed_concurrency: read_num("EMBED_CONCURRENCY", defaults.embed_concurrency),
        }
    }

    /// Worker count with 0 resolved to the machine's parallelism.
    pub fn effective_workers(&self) -> usize {
        if self.cold_start_workers == 0 {
            num_cpus::get()
        } else {
            self.cold_start_workers
        }
    }
}

fn read_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => match v.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            other => {
                warn!(key, value = other, "unparseable_bool_env_var_using_default");
                default
            }
        },
        Err(_) => default,
    }
}

fn read_num<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(v) => v.parse().unwrap_or_else(|_| {
            warn!(key, value = %v, "unparseable_numeric_env_var_using_default");
            default
        }),
        Err(_) => default,
    }
}
