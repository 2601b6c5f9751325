// SPDX-License-Identifier: MIT

//! Composition root: owns the process manager, event handler,
//! orchestrator, log store, and safety layer for one configuration
//! generation.
//!
//! All methods run on the control-plane executor (the engine loop), so
//! the orchestrator's maps and the event history have a single writer.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use clier_config::{
    flatten_step, substitute, Config, ConfigError, FlattenedPipeline, Item, SafetyConfig,
    StepEntry, TemplateContext,
};
use clier_core::{
    parse_duration, paths, Clock, DurationError, Event, EventType, LogEntry, LogStream,
    ProcessState, ProcessStatus, SystemClock,
};
use clier_logs::{LogStore, LogStoreConfig, LogStoreError};
use clier_process::{ProcessConfig, ProcessError, ProcessEvent, ProcessManager};
use clier_safety::{BreakerConfig, CircuitBreaker, Debouncer, RateLimiter};

use crate::env;
use crate::event_handler::EventHandler;
use crate::matcher::PatternError;
use crate::orchestrator::{Orchestrator, OrchestratorError, StartDecision};

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Logs(#[from] LogStoreError),

    #[error("invalid duration: {0}")]
    Duration(#[from] DurationError),
}

/// One configuration generation of the pipeline.
pub struct Supervisor {
    project_root: PathBuf,
    config_path: PathBuf,
    config: Config,
    events_tx: mpsc::Sender<ProcessEvent>,
    manager: Arc<ProcessManager>,
    handler: EventHandler,
    orchestrator: Orchestrator,
    logs: Arc<LogStore>,
    rate: RateLimiter,
    debouncer: Arc<Debouncer>,
    stopped: bool,
}

impl Supervisor {
    /// Build a supervisor from a validated configuration.
    ///
    /// `events_tx` is the shared raw-event channel; the caller owns the
    /// receiver and pumps it into [`Supervisor::handle_process_event`].
    pub fn new(
        project_root: PathBuf,
        config_path: PathBuf,
        config: Config,
        flat: FlattenedPipeline,
        events_tx: mpsc::Sender<ProcessEvent>,
    ) -> Self {
        let logs = Arc::new(LogStore::new(
            paths::logs_dir(&project_root),
            LogStoreConfig::default(),
        ));
        let rate = RateLimiter::new(config.safety.max_ops_per_minute);
        let manager = Arc::new(ProcessManager::with_sender(
            events_tx.clone(),
            rate.clone(),
            build_breaker(&config.safety),
        ));
        let debouncer = Arc::new(Debouncer::new(Duration::from_millis(config.safety.debounce_ms)));

        let mut handler = EventHandler::new();
        handler.load(&flat.items);
        let mut orchestrator = Orchestrator::new();
        orchestrator.load(flat);

        Self {
            project_root,
            config_path,
            config,
            events_tx,
            manager,
            handler,
            orchestrator,
            logs,
            rate,
            debouncer,
            stopped: false,
        }
    }

    /// Start all entry points in declaration order.
    pub async fn start(&mut self) {
        for item in self.orchestrator.entry_points() {
            if let Err(e) = self.spawn_item(&item, None).await {
                warn!(process = %item.name, error = %e, "entry point failed to start");
            }
        }
    }

    /// Consume one raw event: record logs, translate, orchestrate.
    pub async fn handle_process_event(&mut self, raw: ProcessEvent) {
        match &raw {
            ProcessEvent::Stdout { process, line, timestamp } => {
                self.logs.add(LogEntry::new(*timestamp, LogStream::Stdout, line.clone(), process));
            }
            ProcessEvent::Stderr { process, line, timestamp } => {
                self.logs.add(LogEntry::new(*timestamp, LogStream::Stderr, line.clone(), process));
            }
            ProcessEvent::Exit { .. } => {}
        }

        let typed = self.handler.handle(&raw);
        if self.stopped {
            return;
        }
        for event in typed {
            self.dispatch(event).await;
        }
    }

    /// Inject a custom event (`event.emit`).
    pub async fn emit(&mut self, name: String, data: Option<serde_json::Value>) {
        let process = name.split(':').next().unwrap_or_default().to_string();
        let event = Event::new(name, process, EventType::Custom, data, SystemClock.epoch_ms());
        self.handler.record(event.clone());
        if !self.stopped {
            self.dispatch(event).await;
        }
    }

    /// Manual start by explicit trigger request (`stage.trigger`).
    pub async fn trigger_stage(&mut self, name: &str) -> Result<(), SupervisorError> {
        let running = self.manager.is_running(name);
        let item = self.orchestrator.trigger(name, running)?;
        self.spawn_item(&item, None).await?;
        Ok(())
    }

    /// Start a declared item by name (`process.start`).
    pub async fn start_item(&mut self, name: &str) -> Result<(), SupervisorError> {
        let running = self.manager.is_running(name);
        let item = self.orchestrator.start_item(name, running)?;
        self.spawn_item(&item, None).await?;
        Ok(())
    }

    pub async fn stop_process(&self, name: &str, force: bool) -> Result<(), SupervisorError> {
        self.manager.stop_process(name, force, env::stop_timeout()).await?;
        Ok(())
    }

    pub async fn restart_process(&self, name: &str, force: bool) -> Result<(), SupervisorError> {
        self.manager.restart_process(name, force, env::stop_timeout()).await?;
        Ok(())
    }

    /// Register a new item into the live pipeline (`process.add`).
    pub fn add_item(&mut self, step: &StepEntry) -> Result<(), SupervisorError> {
        let item = flatten_step(step);
        if item.name.is_empty() {
            return Err(ConfigError::EmptyField { item: "<unnamed>".to_string(), field: "name" }.into());
        }
        if item.command.is_empty() {
            return Err(ConfigError::EmptyField { item: item.name, field: "command" }.into());
        }
        self.orchestrator.add_item(item.clone())?;
        if let Err(e) = self.handler.register_item(&item) {
            self.orchestrator.remove_item(&item.name);
            return Err(e.into());
        }
        info!(process = %item.name, "pipeline item added");
        Ok(())
    }

    /// Stop a process, forget it, and unlink its log files
    /// (`process.delete`).
    pub async fn delete_process(&mut self, name: &str, force: bool) -> Result<(), SupervisorError> {
        if !self.orchestrator.contains(name) && self.manager.status(name).is_none() {
            return Err(OrchestratorError::UnknownItem(name.to_string()).into());
        }
        match self.manager.delete_process(name, force, env::stop_timeout()).await {
            Ok(()) | Err(ProcessError::UnknownProcess(_)) => {}
            Err(e) => return Err(e.into()),
        }
        self.handler.remove_item(name);
        self.orchestrator.remove_item(name);
        self.logs.delete_logs(name).await?;
        Ok(())
    }

    pub async fn write_input(&self, name: &str, data: &[u8]) -> Result<(), SupervisorError> {
        self.manager.write_input(name, data).await?;
        Ok(())
    }

    pub fn input_enabled(&self, name: &str) -> Result<bool, SupervisorError> {
        Ok(self.manager.has_input_enabled(name)?)
    }

    pub fn list_processes(&self) -> Vec<ProcessStatus> {
        self.manager.list_processes()
    }

    pub fn running_count(&self) -> usize {
        self.list_processes().iter().filter(|p| p.state == ProcessState::Running).count()
    }

    pub fn project_name(&self) -> &str {
        &self.config.project_name
    }

    pub fn stages_map(&self) -> std::collections::HashMap<String, String> {
        self.orchestrator.stages_map()
    }

    /// Event history snapshot, optionally bounded by a duration string.
    pub fn query_events(&self, since: Option<&str>) -> Result<Vec<Event>, SupervisorError> {
        match since {
            Some(spec) => {
                let cutoff = duration_cutoff(spec)?;
                Ok(self.handler.history_since(cutoff))
            }
            None => Ok(self.handler.history()),
        }
    }

    /// Log snapshot for one process or all, oldest-first.
    pub fn query_logs(
        &self,
        name: Option<&str>,
        lines: Option<usize>,
        since: Option<&str>,
    ) -> Result<Vec<LogEntry>, SupervisorError> {
        let cutoff = since.map(duration_cutoff).transpose()?;
        let limit = lines.unwrap_or(usize::MAX);
        match name {
            Some(name) => {
                let entries = match cutoff {
                    Some(ts) => self.logs.since(name, ts),
                    None => self.logs.all(name),
                };
                let skip = entries.len().saturating_sub(limit);
                Ok(entries[skip..].to_vec())
            }
            None => Ok(self.logs.merged(cutoff, limit)),
        }
    }

    pub fn clear_logs(&self, name: Option<&str>) {
        self.logs.clear(name);
    }

    /// Ordered teardown, steps 2–5 of the shutdown sequence: no new
    /// orchestration, cancel debounced restarts and drain the spawn
    /// queue, stop every child under the global deadline, flush logs.
    pub async fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.debouncer.cancel_all();
        self.rate.shutdown();
        self.manager.stop_all(env::stop_timeout()).await;
        if let Err(e) = self.logs.flush().await {
            warn!(error = %e, "log flush failed during shutdown");
        }
        info!("supervisor stopped");
    }

    /// Tear down the current generation and start a fresh one from the
    /// re-read configuration file. Validation failure leaves the running
    /// generation untouched.
    pub async fn reload(
        &mut self,
        events_rx: &mut mpsc::Receiver<ProcessEvent>,
    ) -> Result<(), SupervisorError> {
        let (config, flat) = clier_config::load(&self.config_path)?;
        info!(project = %config.project_name, "configuration reload");

        let manual = self.orchestrator.manually_triggered();
        self.debouncer.cancel_all();
        self.rate.shutdown();
        self.manager.stop_all(env::stop_timeout()).await;
        // Discard buffered events from the old generation
        while events_rx.try_recv().is_ok() {}

        self.install(config, flat);
        self.orchestrator.restore_manually_triggered(manual);
        self.start().await;
        Ok(())
    }

    /// Forget manual-trigger memory, optionally re-triggering those
    /// names first (`config.clearReload`).
    pub async fn clear_reload(&mut self, restart_manual_services: bool) {
        if restart_manual_services {
            for name in self.orchestrator.manually_triggered() {
                if self.manager.is_running(&name) {
                    continue;
                }
                if let Err(e) = self.trigger_stage(&name).await {
                    warn!(process = %name, error = %e, "manual re-trigger failed");
                }
            }
        }
        self.orchestrator.clear_manually_triggered();
    }

    /// Replace the generation-scoped components.
    fn install(&mut self, config: Config, flat: FlattenedPipeline) {
        let rate = RateLimiter::new(config.safety.max_ops_per_minute);
        self.manager = Arc::new(ProcessManager::with_sender(
            self.events_tx.clone(),
            rate.clone(),
            build_breaker(&config.safety),
        ));
        self.rate = rate;
        self.debouncer = Arc::new(Debouncer::new(Duration::from_millis(config.safety.debounce_ms)));
        self.handler.load(&flat.items);
        self.orchestrator.load(flat);
        self.config = config;
        self.stopped = false;
    }

    /// Execute one start decision. Failure-triggered starts are
    /// debounced per item so crash storms coalesce before hitting the
    /// spawn bucket.
    async fn dispatch(&mut self, event: Event) {
        let decisions = self.orchestrator.handle_event(&event);
        for decision in decisions {
            self.execute(decision).await;
        }
    }

    async fn execute(&mut self, decision: StartDecision) {
        let StartDecision { item, trigger } = decision;
        let failure_triggered = trigger.as_ref().is_some_and(Event::is_failure);

        if failure_triggered && self.config.safety.debounce_ms > 0 {
            let config = self.build_process_config(&item, trigger.as_ref());
            let manager = Arc::clone(&self.manager);
            let logs = Arc::clone(&self.logs);
            let name = item.name.clone();
            self.debouncer.debounce(&item.name, async move {
                echo_command(&logs, &config);
                if let Err(e) = manager.start_process(config).await {
                    warn!(process = %name, error = %e, "debounced start failed");
                }
            });
        } else if let Err(e) = self.spawn_item(&item, trigger.as_ref()).await {
            warn!(process = %item.name, error = %e, "triggered start failed");
        }
    }

    async fn spawn_item(&self, item: &Item, trigger: Option<&Event>) -> Result<(), ProcessError> {
        let config = self.build_process_config(item, trigger);
        echo_command(&self.logs, &config);
        self.manager.start_process(config).await
    }

    /// Build the child's spawn configuration, substituting `{{…}}`
    /// templates when the item enabled them.
    fn build_process_config(&self, item: &Item, trigger: Option<&Event>) -> ProcessConfig {
        let (command, env) = if item.enable_event_templates {
            let ctx = TemplateContext {
                event: trigger,
                process_name: &item.name,
                process_kind: item.kind,
                project: &self.config.project_name,
                now_ms: SystemClock.epoch_ms(),
            };
            let command = substitute(&item.command, &ctx);
            let env = item.env.iter().map(|(k, v)| (k.clone(), substitute(v, &ctx))).collect();
            (command, env)
        } else {
            (item.command.clone(), item.env.clone())
        };

        let mut config = ProcessConfig::new(&item.name, command, item.kind);
        config.cwd = item.cwd.clone().or_else(|| Some(self.project_root.clone()));
        config.env = env;
        config.clear_env = !self.config.global_env;
        config.restart = item.restart;
        config.input_enabled = item.input_enabled;
        config.stop_timeout = env::stop_timeout();
        config
    }
}

/// Echo the spawned command into the process's log.
fn echo_command(logs: &LogStore, config: &ProcessConfig) {
    logs.add(LogEntry::new(
        SystemClock.epoch_ms(),
        LogStream::Command,
        config.command.clone(),
        &config.name,
    ));
}

fn duration_cutoff(spec: &str) -> Result<u64, DurationError> {
    let window = parse_duration(spec)?;
    Ok(SystemClock.epoch_ms().saturating_sub(window.as_millis() as u64))
}

/// Build the breaker from config and spawn the observer that surfaces
/// its state transitions to operators.
fn build_breaker(safety: &SafetyConfig) -> Option<Arc<CircuitBreaker>> {
    let settings = safety.circuit_breaker.as_ref()?;
    if !settings.enabled {
        return None;
    }
    let (breaker, mut events) = CircuitBreaker::with_observer(BreakerConfig {
        error_threshold: settings.error_threshold,
        timeout: Some(Duration::from_millis(settings.timeout_ms)),
        reset_timeout: Duration::from_millis(settings.reset_timeout_ms),
        ..BreakerConfig::default()
    });
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            info!(event = ?event, "circuit breaker");
        }
    });
    Some(Arc::new(breaker))
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
