use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use nw_core::named::{
    DispatchStats, LifecycleAction, LifecycleEvent, NamedWindowLifecycleObserver,
    WindowMetricHandle,
};

/// Engine-side metrics for named windows.
///
/// Registered as a lifecycle observer so the per-window counter handles of
/// live windows are tracked without polling the registry.
#[derive(Default)]
pub struct LifecycleMetrics {
    windows_created_total: AtomicU64,
    windows_removed_total: AtomicU64,
    cycles_total: AtomicU64,
    cycle_errors_total: AtomicU64,
    cycle_nanos_total: AtomicU64,
    windows: Mutex<BTreeMap<String, Arc<WindowMetricHandle>>>,
}

impl NamedWindowLifecycleObserver for LifecycleMetrics {
    fn observe(&self, event: &LifecycleEvent<'_>) -> anyhow::Result<()> {
        let mut windows = self.windows.lock().expect("metrics window map poisoned");
        match event.action {
            LifecycleAction::Created => {
                self.windows_created_total.fetch_add(1, Ordering::Relaxed);
                windows.insert(
                    event.window.to_string(),
                    Arc::clone(event.processor.metrics()),
                );
            }
            LifecycleAction::Removed => {
                self.windows_removed_total.fetch_add(1, Ordering::Relaxed);
                windows.remove(event.window);
            }
        }
        Ok(())
    }
}

impl LifecycleMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe_cycle(&self, elapsed: Duration, ok: bool) {
        self.cycles_total.fetch_add(1, Ordering::Relaxed);
        let nanos = elapsed.as_nanos().min(u64::MAX as u128) as u64;
        self.cycle_nanos_total.fetch_add(nanos, Ordering::Relaxed);
        if !ok {
            self.cycle_errors_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn live_windows(&self) -> usize {
        self.windows.lock().expect("metrics window map poisoned").len()
    }

    pub fn windows_created_total(&self) -> u64 {
        self.windows_created_total.load(Ordering::Relaxed)
    }

    pub fn windows_removed_total(&self) -> u64 {
        self.windows_removed_total.load(Ordering::Relaxed)
    }

    /// Prometheus text exposition of engine and per-window counters.
    pub fn render_prometheus(&self, dispatch: &DispatchStats) -> String {
        let mut out = String::with_capacity(2048);
        counter(&mut out, "nw_windows_created_total", self.windows_created_total());
        counter(&mut out, "nw_windows_removed_total", self.windows_removed_total());
        gauge(&mut out, "nw_windows_live", self.live_windows() as u64);
        counter(&mut out, "nw_cycles_total", self.cycles_total.load(Ordering::Relaxed));
        counter(
            &mut out,
            "nw_cycle_errors_total",
            self.cycle_errors_total.load(Ordering::Relaxed),
        );
        let _ = writeln!(out, "# TYPE nw_cycle_seconds_sum counter");
        let _ = writeln!(
            out,
            "nw_cycle_seconds_sum {}",
            self.cycle_nanos_total.load(Ordering::Relaxed) as f64 / 1_000_000_000.0
        );
        counter(&mut out, "nw_dispatch_deltas_drained_total", dispatch.deltas_drained);
        counter(&mut out, "nw_dispatch_deliveries_total", dispatch.deliveries);
        counter(&mut out, "nw_dispatch_failures_total", dispatch.failures);

        let windows = self.windows.lock().expect("metrics window map poisoned");
        let families: [(&str, fn(&WindowMetricHandle) -> u64); 3] = [
            ("nw_window_deltas_total", WindowMetricHandle::deltas_total),
            ("nw_window_inserted_rows_total", WindowMetricHandle::inserted_rows_total),
            ("nw_window_removed_rows_total", WindowMetricHandle::removed_rows_total),
        ];
        if windows.is_empty() {
            return out;
        }
        for (name, read) in families {
            let _ = writeln!(out, "# TYPE {name} counter");
            for (window, handle) in windows.iter() {
                let _ = writeln!(
                    out,
                    "{name}{{window=\"{}\"}} {}",
                    escape_label(window),
                    read(handle)
                );
            }
        }
        out
    }

    /// One-line summary for periodic info logs.
    pub fn summary_line(&self, dispatch: &DispatchStats) -> String {
        format!(
            "windows={} created={} removed={} cycles={} delivered={} failed={}",
            self.live_windows(),
            self.windows_created_total(),
            self.windows_removed_total(),
            self.cycles_total.load(Ordering::Relaxed),
            dispatch.deliveries,
            dispatch.failures
        )
    }
}

fn counter(out: &mut String, name: &str, value: u64) {
    let _ = writeln!(out, "# TYPE {name} counter");
    let _ = writeln!(out, "{name} {value}");
}

fn gauge(out: &mut String, name: &str, value: u64) {
    let _ = writeln!(out, "# TYPE {name} gauge");
    let _ = writeln!(out, "{name} {value}");
}

fn escape_label(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}
