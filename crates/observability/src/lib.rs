use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

#[derive(Debug, Default)]
pub struct AppMetrics {
    requests_total: AtomicU64,
    knowledge_hits_total: AtomicU64,
    knowledge_misses_total: AtomicU64,
    knowledge_failures_total: AtomicU64,
    escalations_total: AtomicU64,
    notify_failures_total: AtomicU64,
    unrecognized_total: AtomicU64,
    total_latency_millis: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub knowledge_hits_total: u64,
    pub knowledge_misses_total: u64,
    pub knowledge_failures_total: u64,
    pub escalations_total: u64,
    pub notify_failures_total: u64,
    pub unrecognized_total: u64,
    pub avg_latency_millis: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_knowledge_hit(&self) {
        self.knowledge_hits_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_knowledge_miss(&self) {
        self.knowledge_misses_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_knowledge_failure(&self) {
        self.knowledge_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_escalation(&self) {
        self.escalations_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_notify_failure(&self) {
        self.notify_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_unrecognized(&self) {
        self.unrecognized_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let requests = self.requests_total.load(Ordering::Relaxed);
        let latency = self.total_latency_millis.load(Ordering::Relaxed);

        MetricsSnapshot {
            requests_total: requests,
            knowledge_hits_total: self.knowledge_hits_total.load(Ordering::Relaxed),
            knowledge_misses_total: self.knowledge_misses_total.load(Ordering::Relaxed),
            knowledge_failures_total: self.knowledge_failures_total.load(Ordering::Relaxed),
            escalations_total: self.escalations_total.load(Ordering::Relaxed),
            notify_failures_total: self.notify_failures_total.load(Ordering::Relaxed),
            unrecognized_total: self.unrecognized_total.load(Ordering::Relaxed),
            avg_latency_millis: if requests == 0 {
                0.0
            } else {
                latency as f64 / requests as f64
            },
        }
    }
}

/// Service logging: JSON lines on stdout.
pub fn init_tracing(service_name: &str) {
    init_tracing_with_writer(service_name, std::io::stdout);
}

/// Command-line logging: JSON lines on stderr, leaving stdout to command output.
pub fn init_cli_tracing(service_name: &str) {
    init_tracing_with_writer(service_name, std::io::stderr);
}

fn init_tracing_with_writer<W>(service_name: &str, writer: W)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    TRACING_INIT.get_or_init(|| {
        json_subscriber(service_name, writer).init();
    });
}

fn json_subscriber<W>(service_name: &str, writer: W) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{}=info,helpdesk_dispatch=info,helpdesk_api=info,helpdesk_storage=info,helpdesk_notify=info",
            service_name
        ))
    });

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(writer)
        .finish()
}
