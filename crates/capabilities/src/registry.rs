use aide_core::{CapabilityModule, CapabilityName, CapabilityStatus, Error, Result};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::activator::CapabilityActivator;

/// Outcome of a successful `ensure_active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    AlreadyActive,
    Activated,
}

const DORMANT: u8 = 0;
const ACTIVATING: u8 = 1;
const ACTIVE: u8 = 2;

fn encode(status: CapabilityStatus) -> u8 {
    match status {
        CapabilityStatus::Dormant => DORMANT,
        CapabilityStatus::Activating => ACTIVATING,
        CapabilityStatus::Active => ACTIVE,
    }
}

fn decode(raw: u8) -> CapabilityStatus {
    match raw {
        ACTIVE => CapabilityStatus::Active,
        ACTIVATING => CapabilityStatus::Activating,
        _ => CapabilityStatus::Dormant,
    }
}

struct ModuleSlot {
    name: CapabilityName,
    status: AtomicU8,
    /// Epoch ms, 0 = never used.
    last_used_ms: AtomicI64,
    estimated_cost: u32,
    activator: Arc<dyn CapabilityActivator>,
}

impl ModuleSlot {
    fn status(&self) -> CapabilityStatus {
        decode(self.status.load(Ordering::Acquire))
    }

    fn set_status(&self, status: CapabilityStatus) {
        self.status.store(encode(status), Ordering::Release);
    }

    fn is_active(&self) -> bool {
        self.status() == CapabilityStatus::Active
    }

    fn touch(&self, at: DateTime<Utc>) {
        self.last_used_ms.fetch_max(at.timestamp_millis(), Ordering::AcqRel);
    }

    fn last_used(&self) -> Option<DateTime<Utc>> {
        match self.last_used_ms.load(Ordering::Acquire) {
            0 => None,
            ms => Utc.timestamp_millis_opt(ms).single(),
        }
    }

    fn is_idle(&self, now: DateTime<Utc>, idle_timeout: Duration) -> bool {
        if !self.is_active() {
            return false;
        }
        let idle_ms = now.timestamp_millis() - self.last_used_ms.load(Ordering::Acquire);
        idle_ms > i64::try_from(idle_timeout.as_millis()).unwrap_or(i64::MAX)
    }

    fn snapshot(&self) -> CapabilityModule {
        CapabilityModule {
            name: self.name,
            status: self.status(),
            last_used: self.last_used(),
            estimated_cost: self.estimated_cost,
        }
    }
}

/// Static table of capability modules, built once at startup.
#[derive(Default)]
pub struct CapabilityRegistryBuilder {
    modules: BTreeMap<CapabilityName, ModuleSlot>,
}

impl CapabilityRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        mut self,
        name: CapabilityName,
        estimated_cost: u32,
        activator: Arc<dyn CapabilityActivator>,
    ) -> Self {
        debug!(capability = %name, estimated_cost, "🔌 Registering capability");
        self.modules.insert(
            name,
            ModuleSlot {
                name,
                status: AtomicU8::new(DORMANT),
                last_used_ms: AtomicI64::new(0),
                estimated_cost,
                activator,
            },
        );
        self
    }

    pub fn build(self) -> CapabilityRegistry {
        info!(count = self.modules.len(), "🔌 Capability registry ready");
        CapabilityRegistry {
            modules: self.modules,
            section: Mutex::new(()),
        }
    }
}

/// Tracks which capability modules are live.
///
/// Status reads and `last_used` updates are lock-free. Every transition
/// (activate, deactivate, reap) runs inside one registry-wide exclusive
/// section, so activations of different modules are serialized too.
pub struct CapabilityRegistry {
    modules: BTreeMap<CapabilityName, ModuleSlot>,
    section: Mutex<()>,
}

impl CapabilityRegistry {
    pub fn builder() -> CapabilityRegistryBuilder {
        CapabilityRegistryBuilder::new()
    }

    fn slot(&self, name: &str) -> Result<&ModuleSlot> {
        let parsed: CapabilityName = name.parse()?;
        self.modules
            .get(&parsed)
            .ok_or_else(|| Error::UnknownCapability(name.to_string()))
    }

    /// Make sure `name` is active, activating it if needed.
    pub async fn ensure_active(&self, name: &str) -> Result<Activation> {
        let slot = self.slot(name)?;

        if slot.is_active() {
            slot.touch(Utc::now());
            // a reap may have started between the two reads
            if slot.is_active() {
                return Ok(Activation::AlreadyActive);
            }
        }

        let _section = self.section.lock().await;
        if slot.is_active() {
            slot.touch(Utc::now());
            return Ok(Activation::AlreadyActive);
        }

        slot.set_status(CapabilityStatus::Activating);
        info!(capability = %slot.name, "⚡ Activating capability");

        match slot.activator.activate().await {
            Ok(()) => {
                slot.touch(Utc::now());
                slot.set_status(CapabilityStatus::Active);
                info!(capability = %slot.name, "✅ Capability active");
                Ok(Activation::Activated)
            }
            Err(e) => {
                slot.set_status(CapabilityStatus::Dormant);
                warn!(capability = %slot.name, error = %e, "❌ Capability activation failed");
                Err(Error::ActivationFailure {
                    capability: slot.name.to_string(),
                    cause: e.to_string(),
                })
            }
        }
    }

    /// Explicit teardown. Returns false when the module was not active.
    pub async fn deactivate(&self, name: &str) -> Result<bool> {
        let slot = self.slot(name)?;
        let _section = self.section.lock().await;
        if !slot.is_active() {
            return Ok(false);
        }
        Self::teardown(slot).await;
        Ok(true)
    }

    /// Marks the slot dormant before releasing resources.
    async fn teardown(slot: &ModuleSlot) {
        slot.set_status(CapabilityStatus::Dormant);
        if let Err(e) = slot.activator.deactivate().await {
            warn!(capability = %slot.name, error = %e, "Capability teardown failed, left dormant");
        }
    }

    pub fn is_active(&self, name: &str) -> Result<bool> {
        Ok(self.slot(name)?.is_active())
    }

    pub fn status(&self, name: &str) -> Result<CapabilityStatus> {
        Ok(self.slot(name)?.status())
    }

    /// Record a use at the current time.
    pub fn touch(&self, name: &str) -> Result<()> {
        self.touch_at(name, Utc::now())
    }

    /// Record a use at `at`. `last_used` never moves backwards.
    pub fn touch_at(&self, name: &str, at: DateTime<Utc>) -> Result<()> {
        self.slot(name)?.touch(at);
        Ok(())
    }

    /// Deactivate every active module idle for longer than `idle_timeout`.
    /// Idleness is re-checked inside the exclusive section.
    pub async fn reap_idle(&self, now: DateTime<Utc>, idle_timeout: Duration) -> Vec<CapabilityName> {
        let mut evicted = Vec::new();
        for slot in self.modules.values() {
            if !slot.is_idle(now, idle_timeout) {
                continue;
            }
            let _section = self.section.lock().await;
            if !slot.is_idle(now, idle_timeout) {
                continue;
            }
            info!(capability = %slot.name, last_used = ?slot.last_used(), "💤 Deactivating idle capability");
            Self::teardown(slot).await;
            evicted.push(slot.name);
        }
        evicted
    }

    /// Eventually-consistent view of every registered module, in `CapabilityName` order.
    pub fn snapshot(&self) -> Vec<CapabilityModule> {
        self.modules.values().map(ModuleSlot::snapshot).collect()
    }

    pub fn names(&self) -> Vec<CapabilityName> {
        self.modules.keys().copied().collect()
    }

    pub fn active_count(&self) -> usize {
        self.modules.values().filter(|s| s.is_active()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    #[derive(Default)]
    struct CountingActivator {
        activations: AtomicUsize,
        deactivations: AtomicUsize,
        fail_activate: AtomicBool,
        fail_deactivate: bool,
        delay_ms: u64,
        teardown_delay_ms: u64,
    }

    #[async_trait]
    impl CapabilityActivator for CountingActivator {
        async fn activate(&self) -> Result<()> {
            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
            self.activations.fetch_add(1, Ordering::SeqCst);
            if self.fail_activate.load(Ordering::SeqCst) {
                return Err(Error::Other("camera not available".to_string()));
            }
            Ok(())
        }

        async fn deactivate(&self) -> Result<()> {
            if self.teardown_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.teardown_delay_ms)).await;
            }
            self.deactivations.fetch_add(1, Ordering::SeqCst);
            if self.fail_deactivate {
                return Err(Error::Other("stuck handle".to_string()));
            }
            Ok(())
        }
    }

    fn registry_with(name: CapabilityName, activator: Arc<CountingActivator>) -> CapabilityRegistry {
        CapabilityRegistry::builder().register(name, 3, activator).build()
    }

    #[tokio::test]
    async fn test_concurrent_callers_activate_once() {
        let activator = Arc::new(CountingActivator {
            delay_ms: 30,
            ..Default::default()
        });
        let registry = Arc::new(registry_with(CapabilityName::Code, activator.clone()));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move { registry.ensure_active("code").await }));
        }

        let mut activated = 0;
        for handle in handles {
            let outcome = handle.await.unwrap().unwrap();
            if outcome == Activation::Activated {
                activated += 1;
            }
        }

        assert_eq!(activated, 1);
        assert_eq!(activator.activations.load(Ordering::SeqCst), 1);
        assert!(registry.is_active("code").unwrap());
    }

    #[tokio::test]
    async fn test_second_call_has_no_side_effect() {
        let activator = Arc::new(CountingActivator::default());
        let registry = registry_with(CapabilityName::Research, activator.clone());

        assert_eq!(registry.ensure_active("research").await.unwrap(), Activation::Activated);
        assert_eq!(registry.ensure_active("research").await.unwrap(), Activation::AlreadyActive);
        assert_eq!(activator.activations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_activation_reverts_to_dormant() {
        let activator = Arc::new(CountingActivator::default());
        activator.fail_activate.store(true, Ordering::SeqCst);
        let registry = registry_with(CapabilityName::Vision, activator.clone());

        let err = registry.ensure_active("vision").await.unwrap_err();
        match err {
            Error::ActivationFailure { capability, cause } => {
                assert_eq!(capability, "vision");
                assert!(cause.contains("camera not available"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(registry.status("vision").unwrap(), CapabilityStatus::Dormant);
        assert!(registry.snapshot()[0].last_used.is_none());

        // a later call retries
        activator.fail_activate.store(false, Ordering::SeqCst);
        assert_eq!(registry.ensure_active("vision").await.unwrap(), Activation::Activated);
        assert_eq!(activator.activations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unknown_and_unregistered_names() {
        let registry = registry_with(CapabilityName::Code, Arc::new(CountingActivator::default()));

        let err = registry.ensure_active("telepathy").await.unwrap_err();
        assert!(matches!(err, Error::UnknownCapability(ref n) if n == "telepathy"));

        let err = registry.ensure_active("art").await.unwrap_err();
        assert!(matches!(err, Error::UnknownCapability(ref n) if n == "art"));

        assert!(registry.touch("art").is_err());
    }

    #[tokio::test]
    async fn test_explicit_deactivate() {
        let activator = Arc::new(CountingActivator::default());
        let registry = registry_with(CapabilityName::Art, activator.clone());

        assert!(!registry.deactivate("art").await.unwrap());
        registry.ensure_active("art").await.unwrap();
        assert!(registry.deactivate("art").await.unwrap());
        assert!(!registry.is_active("art").unwrap());
        assert_eq!(activator.deactivations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reap_idle_keeps_recent_modules() {
        let vision = Arc::new(CountingActivator::default());
        let code = Arc::new(CountingActivator::default());
        let registry = CapabilityRegistry::builder()
            .register(CapabilityName::Vision, 5, vision.clone())
            .register(CapabilityName::Code, 1, code.clone())
            .build();

        registry.ensure_active("vision").await.unwrap();
        registry.ensure_active("code").await.unwrap();

        let now = Utc::now();
        registry.touch_at("code", now + chrono::Duration::minutes(10)).unwrap();

        let evicted = registry
            .reap_idle(now + chrono::Duration::minutes(11), Duration::from_secs(600))
            .await;
        assert_eq!(evicted, vec![CapabilityName::Vision]);
        assert!(!registry.is_active("vision").unwrap());
        assert!(registry.is_active("code").unwrap());
        assert_eq!(vision.deactivations.load(Ordering::SeqCst), 1);
        assert_eq!(code.deactivations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_teardown_failure_still_marks_dormant() {
        let activator = Arc::new(CountingActivator {
            fail_deactivate: true,
            ..Default::default()
        });
        let registry = registry_with(CapabilityName::Automation, activator.clone());
        registry.ensure_active("automation").await.unwrap();

        let evicted = registry
            .reap_idle(Utc::now() + chrono::Duration::hours(1), Duration::from_secs(600))
            .await;
        assert_eq!(evicted, vec![CapabilityName::Automation]);
        assert_eq!(registry.status("automation").unwrap(), CapabilityStatus::Dormant);
        assert_eq!(registry.active_count(), 0);
    }

    #[tokio::test]
    async fn test_ensure_active_during_slow_reap_reactivates() {
        let activator = Arc::new(CountingActivator {
            teardown_delay_ms: 200,
            ..Default::default()
        });
        let registry = Arc::new(registry_with(CapabilityName::Vision, activator.clone()));
        registry.ensure_active("vision").await.unwrap();

        let reaping = {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .reap_idle(Utc::now() + chrono::Duration::hours(1), Duration::from_secs(600))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(registry.status("vision").unwrap(), CapabilityStatus::Dormant);

        let outcome = registry.ensure_active("vision").await.unwrap();
        assert_eq!(outcome, Activation::Activated);
        assert!(registry.is_active("vision").unwrap());
        assert_eq!(reaping.await.unwrap(), vec![CapabilityName::Vision]);
        assert_eq!(activator.activations.load(Ordering::SeqCst), 2);
        assert_eq!(activator.deactivations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_huge_idle_timeout_never_reaps() {
        let registry = registry_with(CapabilityName::Code, Arc::new(CountingActivator::default()));
        registry.ensure_active("code").await.unwrap();
        let evicted = registry
            .reap_idle(Utc::now() + chrono::Duration::days(1), Duration::from_secs(u64::MAX))
            .await;
        assert!(evicted.is_empty());
        assert!(registry.is_active("code").unwrap());
    }

    #[tokio::test]
    async fn test_snapshot_and_names() {
        let registry = CapabilityRegistry::builder()
            .register(CapabilityName::Code, 1, Arc::new(CountingActivator::default()))
            .register(CapabilityName::Vision, 5, Arc::new(CountingActivator::default()))
            .build();
        registry.ensure_active("code").await.unwrap();

        assert_eq!(registry.names(), vec![CapabilityName::Vision, CapabilityName::Code]);
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].estimated_cost, 5);
        assert!(!snapshot[0].is_active());
        assert!(snapshot[1].is_active());
        assert!(snapshot[1].last_used.is_some());
    }

    #[test]
    fn test_last_used_never_moves_backwards() {
        let registry = registry_with(CapabilityName::Code, Arc::new(CountingActivator::default()));
        let now = Utc::now();
        registry.touch_at("code", now).unwrap();
        registry.touch_at("code", now - chrono::Duration::minutes(5)).unwrap();
        let seen = registry.snapshot()[0].last_used.unwrap();
        assert_eq!(seen.timestamp_millis(), now.timestamp_millis());
    }
}
