use aide_core::config::CapabilitiesConfig;
use aide_core::CapabilityName;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::registry::CapabilityRegistry;

/// Background pass that evicts modules idle past a flat TTL.
pub struct IdleReaper {
    registry: Arc<CapabilityRegistry>,
    idle_timeout: Duration,
    interval: Duration,
}

impl IdleReaper {
    pub fn new(registry: Arc<CapabilityRegistry>, idle_timeout: Duration, interval: Duration) -> Self {
        Self {
            registry,
            idle_timeout,
            interval,
        }
    }

    pub fn from_config(registry: Arc<CapabilityRegistry>, config: &CapabilitiesConfig) -> Self {
        Self::new(
            registry,
            Duration::from_secs(config.idle_timeout_secs),
            Duration::from_secs(config.reap_interval_secs.max(1)),
        )
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub async fn reap(&self) -> Vec<CapabilityName> {
        self.reap_at(Utc::now()).await
    }

    /// One pass at `now`. Returns the modules it deactivated.
    pub async fn reap_at(&self, now: DateTime<Utc>) -> Vec<CapabilityName> {
        let evicted = self.registry.reap_idle(now, self.idle_timeout).await;
        if evicted.is_empty() {
            debug!("Reaper pass: nothing idle");
        } else {
            info!(count = evicted.len(), evicted = ?evicted, "💤 Reaper pass evicted idle capabilities");
        }
        evicted
    }

    pub async fn run_loop(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.interval.as_secs(),
            idle_timeout_secs = self.idle_timeout.as_secs(),
            "IdleReaper started"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.reap().await;
                }
                _ = shutdown.recv() => {
                    info!("IdleReaper shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activator::CapabilityActivator;
    use async_trait::async_trait;
    use aide_core::Result;

    struct Noop;

    #[async_trait]
    impl CapabilityActivator for Noop {
        async fn activate(&self) -> Result<()> {
            Ok(())
        }

        async fn deactivate(&self) -> Result<()> {
            Ok(())
        }
    }

    fn registry() -> Arc<CapabilityRegistry> {
        Arc::new(
            CapabilityRegistry::builder()
                .register(CapabilityName::Research, 2, Arc::new(Noop))
                .register(CapabilityName::Art, 4, Arc::new(Noop))
                .build(),
        )
    }

    #[tokio::test]
    async fn test_reap_at_uses_threshold() {
        let registry = registry();
        registry.ensure_active("research").await.unwrap();
        let reaper = IdleReaper::new(registry.clone(), Duration::from_secs(600), Duration::from_secs(60));

        let now = Utc::now();
        assert!(reaper.reap_at(now + chrono::Duration::minutes(5)).await.is_empty());
        assert!(registry.is_active("research").unwrap());

        let evicted = reaper.reap_at(now + chrono::Duration::minutes(11)).await;
        assert_eq!(evicted, vec![CapabilityName::Research]);
        assert!(!registry.is_active("research").unwrap());
    }

    #[tokio::test]
    async fn test_dormant_modules_are_ignored() {
        let registry = registry();
        let reaper = IdleReaper::new(registry.clone(), Duration::ZERO, Duration::from_secs(60));
        assert!(reaper.reap_at(Utc::now() + chrono::Duration::days(1)).await.is_empty());
    }

    #[test]
    fn test_from_config() {
        let config = CapabilitiesConfig {
            reap_interval_secs: 5,
            idle_timeout_secs: 42,
        };
        let reaper = IdleReaper::from_config(registry(), &config);
        assert_eq!(reaper.idle_timeout(), Duration::from_secs(42));
        assert_eq!(reaper.interval, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_run_loop_evicts_and_stops() {
        let registry = registry();
        registry.ensure_active("art").await.unwrap();
        let reaper = Arc::new(IdleReaper::new(
            registry.clone(),
            Duration::ZERO,
            Duration::from_millis(20),
        ));

        let (tx, rx) = broadcast::channel(1);
        tokio::time::sleep(Duration::from_millis(5)).await;
        let handle = tokio::spawn(reaper.run_loop(rx));

        for _ in 0..100 {
            if !registry.is_active("art").unwrap() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!registry.is_active("art").unwrap());

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
