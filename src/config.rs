//! Stream decoder configuration.

use std::env;
use std::time::Duration;

pub const DEFAULT_NOISE_LINE_LIMIT: usize = 300;
pub const DEFAULT_CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

pub const ENV_NOISE_LINE_LIMIT: &str = "CHAT_WIRE_NOISE_LINE_LIMIT";
pub const ENV_CANCEL_POLL_MS: &str = "CHAT_WIRE_CANCEL_POLL_MS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// Consecutive non-data lines tolerated before the stream fails; `None` disables the guard.
    pub noise_line_limit: Option<usize>,
    /// How often a pending read re-checks the cancellation signal.
    pub cancel_poll_interval: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            noise_line_limit: Some(DEFAULT_NOISE_LINE_LIMIT),
            cancel_poll_interval: DEFAULT_CANCEL_POLL_INTERVAL,
        }
    }
}

impl StreamConfig {
    /// Defaults overridden by `CHAT_WIRE_NOISE_LINE_LIMIT` (`0` or `off`
    /// disables the guard) and `CHAT_WIRE_CANCEL_POLL_MS`. Unparseable values
    /// are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(value) = env_string_opt(ENV_NOISE_LINE_LIMIT) {
            match value.trim() {
                "0" | "off" | "none" => config.noise_line_limit = None,
                other => {
                    if let Ok(limit) = other.parse::<usize>() {
                        config.noise_line_limit = Some(limit);
                    }
                }
            }
        }
        if let Some(millis) =
            env_string_opt(ENV_CANCEL_POLL_MS).and_then(|value| value.trim().parse::<u64>().ok())
        {
            if millis > 0 {
                config.cancel_poll_interval = Duration::from_millis(millis);
            }
        }
        config
    }

    pub fn with_noise_line_limit(mut self, limit: usize) -> Self {
        self.noise_line_limit = Some(limit);
        self
    }

    pub fn without_noise_line_limit(mut self) -> Self {
        self.noise_line_limit = None;
        self
    }

    pub fn with_cancel_poll_interval(mut self, interval: Duration) -> Self {
        self.cancel_poll_interval = interval;
        self
    }
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}
