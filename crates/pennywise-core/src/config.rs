use std::time::Duration;

use crate::{CoreError, CoreResult};

pub const HOME_ENV: &str = "PENNYWISE_HOME";
pub const BUSY_TIMEOUT_ENV: &str = "PENNYWISE_BUSY_TIMEOUT_MS";
pub const ANOMALY_LOOKBACK_ENV: &str = "PENNYWISE_ANOMALY_LOOKBACK_MONTHS";
pub const PATTERN_LOOKBACK_ENV: &str = "PENNYWISE_PATTERN_LOOKBACK_DAYS";

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_ANOMALY_LOOKBACK_MONTHS: u32 = 6;
const DEFAULT_PATTERN_LOOKBACK_DAYS: u32 = 30;

/// Runtime knobs read from the environment, with defaults for anything unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub busy_timeout: Duration,
    pub anomaly_lookback_months: u32,
    pub pattern_lookback_days: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
            anomaly_lookback_months: DEFAULT_ANOMALY_LOOKBACK_MONTHS,
            pattern_lookback_days: DEFAULT_PATTERN_LOOKBACK_DAYS,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> CoreResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> CoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let busy_timeout = match lookup(BUSY_TIMEOUT_ENV) {
            Some(raw) => Duration::from_millis(parse_positive::<u64>(BUSY_TIMEOUT_ENV, &raw)?),
            None => defaults.busy_timeout,
        };
        let anomaly_lookback_months = match lookup(ANOMALY_LOOKBACK_ENV) {
            Some(raw) => parse_positive::<u32>(ANOMALY_LOOKBACK_ENV, &raw)?,
            None => defaults.anomaly_lookback_months,
        };
        let pattern_lookback_days = match lookup(PATTERN_LOOKBACK_ENV) {
            Some(raw) => parse_positive::<u32>(PATTERN_LOOKBACK_ENV, &raw)?,
            None => defaults.pattern_lookback_days,
        };

        Ok(Self {
            busy_timeout,
            anomaly_lookback_months,
            pattern_lookback_days,
        })
    }
}

fn parse_positive<T>(key: &str, raw: &str) -> CoreResult<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let parsed = raw.trim().parse::<T>().ok().filter(|value| *value > T::default());
    parsed.ok_or_else(|| {
        CoreError::invalid_argument_with_recovery(
            &format!("`{key}` must be a positive integer, got `{raw}`."),
            vec![format!("Unset `{key}` or set it to a positive integer.")],
        )
    })
}
