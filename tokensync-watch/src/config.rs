//! Watcher configuration.

use std::path::PathBuf;
use std::time::Duration;

use tokensync_core::WatchSettings;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Capacity of the queue between event intake and the debounce loop.
/// Events arriving while it is full are dropped.
pub const EVENT_QUEUE_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    /// Directories or files to observe (non-recursive).
    pub paths: Vec<PathBuf>,
    pub debounce: Duration,
    pub sync_on_start: bool,
    pub max_retries: u32,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            debounce: DEFAULT_DEBOUNCE,
            sync_on_start: false,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl WatchConfig {
    /// Replace zero durations and a zero retry count with the defaults.
    pub fn normalized(mut self) -> Self {
        if self.debounce.is_zero() {
            self.debounce = DEFAULT_DEBOUNCE;
        }
        if self.max_retries == 0 {
            self.max_retries = DEFAULT_MAX_RETRIES;
        }
        if self.retry_delay.is_zero() {
            self.retry_delay = DEFAULT_RETRY_DELAY;
        }
        self
    }

    /// Apply the `watch` block of a project config file on top of `self`.
    pub fn with_settings(mut self, settings: &WatchSettings) -> Self {
        if !settings.paths.is_empty() {
            self.paths = settings.paths.clone();
        }
        if let Some(ms) = settings.debounce_ms {
            self.debounce = Duration::from_millis(ms);
        }
        if let Some(sync_on_start) = settings.sync_on_start {
            self.sync_on_start = sync_on_start;
        }
        if let Some(retries) = settings.max_retries {
            self.max_retries = retries;
        }
        if let Some(ms) = settings.retry_delay_ms {
            self.retry_delay = Duration::from_millis(ms);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_values_fall_back_to_defaults() {
        let cfg = WatchConfig {
            paths: vec![PathBuf::from("tokens")],
            debounce: Duration::ZERO,
            sync_on_start: true,
            max_retries: 0,
            retry_delay: Duration::ZERO,
        }
        .normalized();

        assert_eq!(cfg.debounce, Duration::from_secs(2));
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.retry_delay, Duration::from_secs(5));
        assert!(cfg.sync_on_start);
        assert_eq!(cfg.paths, vec![PathBuf::from("tokens")]);
    }

    #[test]
    fn settings_override_only_what_they_set() {
        let settings = WatchSettings {
            debounce_ms: Some(250),
            max_retries: Some(5),
            ..WatchSettings::default()
        };
        let cfg = WatchConfig {
            paths: vec![PathBuf::from(".")],
            ..WatchConfig::default()
        }
        .with_settings(&settings);

        assert_eq!(cfg.debounce, Duration::from_millis(250));
        assert_eq!(cfg.max_retries, 5);
        assert_eq!(cfg.retry_delay, DEFAULT_RETRY_DELAY);
        assert_eq!(cfg.paths, vec![PathBuf::from(".")]);
    }
}
