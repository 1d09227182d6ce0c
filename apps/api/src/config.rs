use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::layout::adapter::DEFAULT_QUIET_WINDOW;
use crate::layout::{FitPolicy, PaperSize};

/// Application configuration loaded from environment variables.
/// Every variable is optional; a bad value fails startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Template policy for new preview sessions. Content kind adjusts the settle delay.
    pub fit_policy: FitPolicy,
    pub paper: PaperSize,
    pub max_sessions: usize,
    /// Quiet window the notification adapter waits out before forwarding a burst.
    pub adapter_quiet: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            rust_log: "info".to_string(),
            fit_policy: FitPolicy::default(),
            paper: PaperSize::Letter,
            max_sessions: 256,
            adapter_quiet: DEFAULT_QUIET_WINDOW,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = Config::default();
        let p = defaults.fit_policy;

        let fit_policy = FitPolicy {
            target_fill_ratio: env_or("FIT_TARGET_FILL", p.target_fill_ratio)?,
            min_fill_ratio: env_or("FIT_MIN_FILL", p.min_fill_ratio)?,
            max_fill_ratio: env_or("FIT_MAX_FILL", p.max_fill_ratio)?,
            tolerance_ratio: env_or("FIT_TOLERANCE", p.tolerance_ratio)?,
            debounce_interval: env_ms("FIT_DEBOUNCE_MS", p.debounce_interval)?,
            settle_delay: env_ms("FIT_SETTLE_MS", p.settle_delay)?,
            min_scale: env_or("FIT_MIN_SCALE", p.min_scale)?,
            sparse_grow_ceiling: env_or("FIT_SPARSE_GROW_CEILING", p.sparse_grow_ceiling)?,
            near_miss_grow_ceiling: env_or("FIT_NEAR_MISS_GROW_CEILING", p.near_miss_grow_ceiling)?,
            safety_shrink_floor: env_or("FIT_SAFETY_SHRINK_FLOOR", p.safety_shrink_floor)?,
            near_miss_factor: env_or("FIT_NEAR_MISS_FACTOR", p.near_miss_factor)?,
            snap_back_band: env_or("FIT_SNAP_BACK_BAND", p.snap_back_band)?,
            cooldown: env_ms("FIT_COOLDOWN_MS", p.cooldown)?,
            warning_display: env_ms("FIT_WARNING_DISPLAY_MS", p.warning_display)?,
            snap_back_delay: env_ms("FIT_SNAP_BACK_DELAY_MS", p.snap_back_delay)?,
            measure_timeout: env_ms("FIT_MEASURE_TIMEOUT_MS", p.measure_timeout)?,
        };
        let fit_policy = FitPolicy::new(fit_policy).context("Invalid FIT_* configuration")?;

        let paper = match std::env::var("PAPER_SIZE") {
            Ok(v) if v.eq_ignore_ascii_case("a4") => PaperSize::A4,
            Ok(v) if v.eq_ignore_ascii_case("letter") => PaperSize::Letter,
            Ok(v) => anyhow::bail!("PAPER_SIZE must be 'letter' or 'a4' (got '{v}')"),
            Err(_) => defaults.paper,
        };

        Ok(Config {
            port: env_or("PORT", defaults.port).context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or(defaults.rust_log),
            fit_policy,
            paper,
            max_sessions: env_or("PREVIEW_MAX_SESSIONS", defaults.max_sessions)?,
            adapter_quiet: env_ms("ADAPTER_QUIET_MS", defaults.adapter_quiet)?,
        })
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}

fn env_ms(key: &str, default: Duration) -> Result<Duration> {
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    env_or(key, default_ms).map(Duration::from_millis)
}
