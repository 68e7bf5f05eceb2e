use aide_capabilities::{CapabilityActivator, CapabilityRegistry, IdleReaper};
use aide_core::{CapabilityName, Config, Paths};
use aide_healing::{ProcessRunner, ScriptRunner};
use aide_providers::{create_healing_provider, create_main_provider};
use aide_scheduler::{TaskExecutor, TaskScheduler, TaskStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::info;

use crate::activators::{InterpreterActivator, ProviderActivator, ProviderFactory, ProviderSlot};
use crate::dispatcher::Dispatcher;
use crate::handlers::{
    CapabilityHandler, ChatHandler, HealingHandler, ART_PROMPT, RESEARCH_PROMPT, VISION_PROMPT,
};

/// Rough resident memory in MB once a capability is live.
pub fn estimated_cost(name: CapabilityName) -> u32 {
    match name {
        CapabilityName::Vision => 450,
        CapabilityName::Research => 180,
        CapabilityName::Automation => 120,
        CapabilityName::Art => 850,
        CapabilityName::Code => 320,
    }
}

/// Static capability table: registry plus a dispatcher holding one handler per module.
pub fn build_dispatcher(config: &Config, paths: &Paths) -> Dispatcher {
    let shared = Arc::new(config.clone());
    let healing_factory: ProviderFactory = {
        let config = shared.clone();
        Arc::new(move || create_healing_provider(&config))
    };
    let chat_factory: ProviderFactory = {
        let config = shared.clone();
        Arc::new(move || create_main_provider(&config))
    };
    let runner: Arc<dyn ScriptRunner> = Arc::new(ProcessRunner::from_config(&config.healing, paths));

    let mut builder = CapabilityRegistry::builder();
    let mut handlers: Vec<(CapabilityName, Arc<dyn CapabilityHandler>)> = Vec::new();

    for name in CapabilityName::ALL {
        let slot = Arc::new(ProviderSlot::new());
        let (activator, handler): (Arc<dyn CapabilityActivator>, Arc<dyn CapabilityHandler>) = match name {
            CapabilityName::Code | CapabilityName::Automation => (
                Arc::new(InterpreterActivator::new(
                    &config.healing.interpreter,
                    slot.clone(),
                    healing_factory.clone(),
                )),
                Arc::new(HealingHandler::new(
                    name,
                    slot,
                    runner.clone(),
                    config.healing.max_attempts,
                )),
            ),
            CapabilityName::Research => (
                Arc::new(ProviderActivator::new(slot.clone(), chat_factory.clone())),
                Arc::new(ChatHandler::new(name, slot, RESEARCH_PROMPT)),
            ),
            CapabilityName::Vision => (
                Arc::new(ProviderActivator::new(slot.clone(), chat_factory.clone())),
                Arc::new(ChatHandler::new(name, slot, VISION_PROMPT)),
            ),
            CapabilityName::Art => (
                Arc::new(ProviderActivator::new(slot.clone(), chat_factory.clone())),
                Arc::new(ChatHandler::new(name, slot, ART_PROMPT)),
            ),
        };
        builder = builder.register(name, estimated_cost(name), activator);
        handlers.push((name, handler));
    }

    let registry = Arc::new(builder.build());
    handlers
        .into_iter()
        .fold(Dispatcher::new(registry), |d, (name, handler)| d.with_handler(name, handler))
}

/// Owns the background loops and the pieces they share.
pub struct Runtime {
    registry: Arc<CapabilityRegistry>,
    reaper: Arc<IdleReaper>,
    scheduler: Arc<TaskScheduler>,
    dispatcher: Arc<Dispatcher>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Runtime {
    pub fn new(config: &Config, paths: &Paths) -> Self {
        Self::with_dispatcher(Arc::new(build_dispatcher(config, paths)), config, paths)
    }

    pub fn with_dispatcher(dispatcher: Arc<Dispatcher>, config: &Config, paths: &Paths) -> Self {
        let registry = dispatcher.registry().clone();
        let reaper = Arc::new(IdleReaper::from_config(registry.clone(), &config.capabilities));
        let executor: Arc<dyn TaskExecutor> = dispatcher.clone();
        let scheduler = Arc::new(TaskScheduler::new(
            TaskStore::new(paths.tasks_file()),
            executor,
            Duration::from_secs(config.scheduler.sweep_interval_secs.max(1)),
        ));
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            registry,
            reaper,
            scheduler,
            dispatcher,
            shutdown_tx,
        }
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    pub fn scheduler(&self) -> &Arc<TaskScheduler> {
        &self.scheduler
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn reaper(&self) -> &Arc<IdleReaper> {
        &self.reaper
    }

    /// Spawn the idle reaper and the task scheduler.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        info!("🚀 Starting background loops");
        vec![
            tokio::spawn(self.reaper.clone().run_loop(self.shutdown_tx.subscribe())),
            tokio::spawn(self.scheduler.clone().run_loop(self.shutdown_tx.subscribe())),
        ]
    }

    /// Signal both loops to stop. They exit at their next select.
    pub fn shutdown(&self) {
        info!("Stopping background loops");
        // Err only means nothing is subscribed
        let _ = self.shutdown_tx.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aide_scheduler::TaskStatus;
    use chrono::{Duration as ChronoDuration, Utc};

    fn isolated() -> (tempfile::TempDir, Paths, Config) {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base(dir.path().to_path_buf());
        let mut config = Config::default();
        for provider in config.providers.values_mut() {
            provider.api_key.clear();
        }
        config.providers.remove("ollama");
        (dir, paths, config)
    }

    #[tokio::test]
    async fn test_every_capability_is_registered() {
        let (_dir, paths, config) = isolated();
        let runtime = Runtime::new(&config, &paths);

        let snapshot = runtime.registry().snapshot();
        assert_eq!(snapshot.len(), CapabilityName::ALL.len());
        assert!(snapshot.iter().all(|m| !m.is_active()));
        let art = snapshot.iter().find(|m| m.name == CapabilityName::Art).unwrap();
        assert_eq!(art.estimated_cost, 850);
    }

    #[tokio::test]
    async fn test_unconfigured_provider_marks_task_error() {
        let (_dir, paths, config) = isolated();
        let runtime = Runtime::new(&config, &paths);

        let id = runtime
            .scheduler()
            .schedule("research: latest tokio release", Utc::now() - ChronoDuration::seconds(1))
            .await
            .unwrap();
        let report = runtime.scheduler().sweep().await.unwrap();
        assert_eq!(report.failed, vec![id]);

        let task = runtime.scheduler().get(id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Error);
        assert!(task.error.unwrap().contains("Activation of 'research' failed"));
        assert!(!runtime.registry().is_active("research").unwrap());
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let (_dir, paths, config) = isolated();
        let runtime = Runtime::new(&config, &paths);

        let handles = runtime.start();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        runtime.shutdown();
        for handle in handles {
            tokio::time::timeout(std::time::Duration::from_secs(2), handle)
                .await
                .unwrap()
                .unwrap();
        }
    }
}
