use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static REFINE_RELAYED: AtomicU64 = AtomicU64::new(0);
static REFINE_REJECTED: AtomicU64 = AtomicU64::new(0);
static STATUS_POLLS: AtomicU64 = AtomicU64::new(0);
static UPSTREAM_FAILURES: AtomicU64 = AtomicU64::new(0);

static LAST_ERROR_TS: AtomicI64 = AtomicI64::new(0);

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub refine_requests_relayed: u64,
    pub refine_requests_rejected: u64,
    pub status_polls_relayed: u64,
    pub upstream_failures: u64,
    pub last_error_ts: i64,
}

pub fn inc_refine_relayed() {
    REFINE_RELAYED.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_refine_rejected() {
    REFINE_REJECTED.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_status_polls() {
    STATUS_POLLS.fetch_add(1, Ordering::Relaxed);
}

pub fn inc_upstream_failures() {
    UPSTREAM_FAILURES.fetch_add(1, Ordering::Relaxed);
    LAST_ERROR_TS.store(now_ts(), Ordering::Relaxed);
}

pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        refine_requests_relayed: REFINE_RELAYED.load(Ordering::Relaxed),
        refine_requests_rejected: REFINE_REJECTED.load(Ordering::Relaxed),
        status_polls_relayed: STATUS_POLLS.load(Ordering::Relaxed),
        upstream_failures: UPSTREAM_FAILURES.load(Ordering::Relaxed),
        last_error_ts: LAST_ERROR_TS.load(Ordering::Relaxed),
    }
}

fn now_ts() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
