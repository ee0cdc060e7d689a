use std::time::Duration;

use tracing::{debug, info, warn};

use crate::client::BackendClient;
use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HealthStatus {
    #[default]
    Checking,
    Online,
    Offline,
}

impl HealthStatus {
    pub fn label(&self) -> &'static str {
        match self {
            HealthStatus::Checking => "Connecting",
            HealthStatus::Online => "Server Online",
            HealthStatus::Offline => "Offline",
        }
    }
}

/// Bounded, fixed-delay liveness polling. Not a backoff: every gap is `delay`.
#[derive(Debug, Clone, Copy)]
pub struct HealthMonitor {
    pub retries: u32,
    pub delay: Duration,
}

impl HealthMonitor {
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    /// At least one probe is always made, whatever the config says.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.health_retries().max(1), config.health_retry_delay())
    }

    /// Poll `/health` until it answers 2xx or the attempts run out.
    /// `on_attempt` receives the 1-based attempt number before each probe.
    pub async fn run<F>(&self, client: &BackendClient, mut on_attempt: F) -> HealthStatus
    where
        F: FnMut(u32),
    {
        for attempt in 1..=self.retries {
            on_attempt(attempt);

            match client.health().await {
                Ok(()) => {
                    info!(attempt, "backend is online");
                    return HealthStatus::Online;
                }
                Err(e) => debug!(attempt, error = %e, "health probe failed"),
            }

            if attempt < self.retries {
                tokio::time::sleep(self.delay).await;
            }
        }

        warn!(retries = self.retries, base_url = client.base_url(), "backend unreachable, giving up");
        HealthStatus::Offline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_with_zero_retries_still_probes_once() {
        let config = Config {
            health_retries: Some(0),
            health_retry_delay_ms: Some(50),
            ..Config::default()
        };
        let monitor = HealthMonitor::from_config(&config);
        assert_eq!(monitor.retries, 1);
        assert_eq!(monitor.delay, Duration::from_millis(50));
    }

    #[test]
    fn defaults_come_from_config() {
        let monitor = HealthMonitor::from_config(&Config::new());
        assert_eq!(monitor.retries, 10);
        assert_eq!(monitor.delay, Duration::from_millis(2000));
    }

    #[test]
    fn labels() {
        assert_eq!(HealthStatus::default(), HealthStatus::Checking);
        assert_eq!(HealthStatus::Online.label(), "Server Online");
        assert_eq!(HealthStatus::Offline.label(), "Offline");
    }
}
