use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use nw_config::EngineConfig;
use nw_core::named::{
    NamedWindowLifecycleObserver, NamedWindowProcessor, NamedWindowService, ProcessorDef,
    StatementLock,
};
use orion_error::prelude::*;
use orion_error::{ErrorOwe, ErrorOweBase};
use tracing_appender::non_blocking::WorkerGuard;

use crate::error::{RuntimeReason, RuntimeResult};
use crate::metrics::LifecycleMetrics;
use crate::shape::{ViewSpec, check_create_window_views};
use crate::tracing_init::init_tracing;

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Owns the [`NamedWindowService`] for one engine instance, from
/// [`start`](Self::start) to [`shutdown`](Self::shutdown).
///
/// Statement deployment goes through [`deploy_window`](Self::deploy_window) /
/// [`undeploy_window`](Self::undeploy_window); the external cycle driver calls
/// [`run_cycle`](Self::run_cycle) once per processing cycle.
pub struct Engine {
    config: EngineConfig,
    service: Arc<NamedWindowService>,
    metrics: Arc<LifecycleMetrics>,
}

impl Engine {
    /// Build the service from config and register the metrics observer.
    #[tracing::instrument(name = "engine.start", skip_all, fields(prioritized = config.engine.prioritized_execution))]
    pub fn start(config: EngineConfig) -> Self {
        let service = Arc::new(NamedWindowService::new(
            config.engine.prioritized_execution,
        ));
        let metrics = Arc::new(LifecycleMetrics::new());
        service.add_observer(Arc::clone(&metrics) as Arc<dyn NamedWindowLifecycleObserver>);

        nw_info!(
            sys,
            prioritized = config.engine.prioritized_execution,
            subquery_index_share = config.engine.subquery_index_share,
            "named window engine started"
        );
        Self {
            config,
            service,
            metrics,
        }
    }

    /// Load `path`, install tracing from its `[logging]` section and start.
    ///
    /// Hold the returned guard until exit when a log file is configured.
    pub fn bootstrap(path: &Path) -> RuntimeResult<(Self, Option<WorkerGuard>)> {
        let config = EngineConfig::load(path).owe_conf()?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let guard = init_tracing(&config.logging, base_dir).owe(RuntimeReason::Bootstrap)?;
        nw_debug!(conf, path = %path.display(), "engine config loaded");
        Ok((Self::start(config), guard))
    }

    pub fn service(&self) -> &Arc<NamedWindowService> {
        &self.service
    }

    pub fn metrics(&self) -> &Arc<LifecycleMetrics> {
        &self.metrics
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validate the `create window` statement's views, register the
    /// processor with engine-wide flags applied, and publish its lock.
    ///
    /// The returned lock is the one on-delete / on-merge statements will
    /// receive from `get_named_window_lock`.
    pub fn deploy_window(
        &self,
        mut def: ProcessorDef,
        views: &[ViewSpec],
    ) -> RuntimeResult<(Arc<NamedWindowProcessor>, StatementLock)> {
        check_create_window_views(views)
            .map_err(|e| e.with_detail(format!("create window {:?}", def.name)))
            .err_conv()?;

        def.prioritized = self.config.engine.prioritized_execution;
        def.subquery_index_share = self.config.engine.subquery_index_share;
        let statement_name = def.statement_name.clone();

        let processor = self.service.add_processor(def).err_conv()?;
        let lock = StatementLock::new();
        self.service
            .add_named_window_lock(processor.name(), lock.clone(), &statement_name);

        for failure in self.service.take_observer_failures() {
            nw_warn!(win, window = %failure.window, action = %failure.action, error = %failure.error, "lifecycle observer failed");
        }
        nw_info!(
            win,
            window = processor.name(),
            statement = statement_name.as_str(),
            views = views.len(),
            "named window created"
        );
        Ok((processor, lock))
    }

    /// Tear down the window defined by `statement_name`. Safe to repeat.
    pub fn undeploy_window(&self, window: &str, statement_name: &str) {
        self.service.remove_named_window_lock(statement_name);
        let existed = self.service.is_named_window(window);
        self.service.remove_processor(window);

        for failure in self.service.take_observer_failures() {
            nw_warn!(win, window = %failure.window, action = %failure.action, error = %failure.error, "lifecycle observer failed");
        }
        if existed {
            nw_info!(win, window, statement = statement_name, "named window removed");
        }
    }

    /// Run one dispatch cycle. Returns whether any consumer received a delta.
    pub fn run_cycle(&self) -> RuntimeResult<bool> {
        let pending = self.service.pending_dispatches();
        if pending > self.config.dispatch.warn_pending {
            nw_warn!(
                disp,
                pending,
                limit = self.config.dispatch.warn_pending,
                "dispatch queue above warning threshold"
            );
        }

        let started = Instant::now();
        let result = self.service.dispatch();
        self.metrics.observe_cycle(started.elapsed(), result.is_ok());

        match &result {
            Ok(true) => nw_debug!(disp, pending, "dispatch cycle delivered"),
            Ok(false) => {}
            Err(e) => nw_warn!(disp, error = %e, "dispatch cycle reported consumer failures"),
        }
        result.err_conv()
    }

    /// Destroy the service. Callers must have stopped all statement
    /// processing and the cycle driver first.
    pub fn shutdown(self) {
        let summary = self.metrics.summary_line(&self.service.dispatch_stats());
        self.service.destroy();
        nw_info!(sys, summary = summary.as_str(), "named window engine stopped");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
