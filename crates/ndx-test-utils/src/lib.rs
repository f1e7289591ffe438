//! Testing utilities for the NDX notify workspace
//!
//! Shared event fixtures, lease fixtures and a fully wired in-memory pipeline.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use ndx_core::{FixedClock, NotificationPipeline, NotifyConfig};
use ndx_enrichment::{InMemoryLeaseTable, LeaseTable, LeaseTableError};
use ndx_event::{
    EventId, EventKind, IdempotencyKey, LeaseKey, LeaseRecord, NotificationEvent, SchemaVersion,
};
use ndx_idempotency::{
    IdempotencyRecord, IdempotencyStore, MokaIdempotencyStore, PutOutcome, StoreError,
};
use ndx_metrics::InMemorySink;
use ndx_sender::SandboxClient;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

pub const NAMESPACE: &str = "ndx-test";

pub fn event_at(
    kind: EventKind,
    id: &str,
    email: &str,
    uuid: &str,
    time: DateTime<Utc>,
) -> NotificationEvent {
    NotificationEvent::new(
        EventId::new(id).unwrap(),
        time,
        SchemaVersion::new("v1").unwrap(),
        kind,
    )
    .with_source("leases")
    .with_detail("userEmail", email)
    .with_detail("uuid", uuid)
}

pub fn approved_event(id: &str, email: &str, time: DateTime<Utc>) -> NotificationEvent {
    event_at(EventKind::LeaseApproved, id, email, "lease-1", time)
}

pub fn event_json(event: &NotificationEvent) -> Vec<u8> {
    serde_json::to_vec(&event.to_value()).unwrap()
}

pub fn lease(email: &str, uuid: &str, status: &str, expires: DateTime<Utc>) -> LeaseRecord {
    LeaseRecord::from_value(json!({
        "userEmail": email,
        "uuid": uuid,
        "status": status,
        "originalLeaseTemplateName": "Bedrock Sandbox",
        "awsAccountId": "123456789012",
        "expirationDate": expires.to_rfc3339(),
        "maxSpend": 50,
        "totalCostAccrued": 12.5
    }))
    .unwrap()
}

pub fn active_lease(email: &str, uuid: &str, now: DateTime<Utc>) -> LeaseRecord {
    lease(email, uuid, "Active", now + Duration::days(14))
}

/// Lease table that throttles its first `n` queries
#[derive(Debug)]
pub struct ThrottlingTable {
    inner: InMemoryLeaseTable,
    throttles_left: AtomicU32,
    calls: AtomicU32,
}

impl ThrottlingTable {
    pub fn new(inner: InMemoryLeaseTable, throttles: u32) -> Self {
        Self {
            inner,
            throttles_left: AtomicU32::new(throttles),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LeaseTable for ThrottlingTable {
    async fn get_lease(&self, key: &LeaseKey) -> Result<Option<LeaseRecord>, LeaseTableError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let throttled = self
            .throttles_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if throttled {
            return Err(LeaseTableError::ThroughputExceeded(
                "rate of requests exceeds the allowed throughput".into(),
            ));
        }
        self.inner.get_lease(key).await
    }
}

/// Idempotency store whose backend is always down
#[derive(Debug, Default)]
pub struct UnavailableStore {
    calls: AtomicU32,
}

impl UnavailableStore {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail(&self) -> StoreError {
        self.calls.fetch_add(1, Ordering::SeqCst);
        StoreError::Unavailable("connection refused".into())
    }
}

#[async_trait]
impl IdempotencyStore for UnavailableStore {
    async fn get(
        &self,
        _key: &IdempotencyKey,
        _now: DateTime<Utc>,
    ) -> Result<Option<IdempotencyRecord>, StoreError> {
        Err(self.fail())
    }

    async fn put_if_absent(&self, _record: IdempotencyRecord) -> Result<PutOutcome, StoreError> {
        Err(self.fail())
    }

    async fn remove(&self, _key: &IdempotencyKey) -> Result<(), StoreError> {
        Err(self.fail())
    }
}

/// In-memory pipeline with every collaborator exposed
pub struct TestHarness {
    pub pipeline: NotificationPipeline,
    pub clock: Arc<FixedClock>,
    pub metrics: Arc<InMemorySink>,
    pub client: Arc<SandboxClient>,
    pub store: Arc<MokaIdempotencyStore>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_table(Arc::new(InMemoryLeaseTable::new()))
    }

    pub fn with_table(table: Arc<dyn LeaseTable>) -> Self {
        let mut config = NotifyConfig::default();
        config.idempotency.namespace = NAMESPACE.into();
        config.sender.backoff_ms = 10;
        Self::with_config(config, table)
    }

    pub fn with_config(config: NotifyConfig, table: Arc<dyn LeaseTable>) -> Self {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let metrics = Arc::new(InMemorySink::new());
        let client = Arc::new(SandboxClient::with_catalog(config.catalog()));
        let store = Arc::new(MokaIdempotencyStore::new(10_000));
        let pipeline = NotificationPipeline::builder(config)
            .clock(clock.clone())
            .metrics(metrics.clone())
            .client(client.clone())
            .store(store.clone())
            .lease_table(table)
            .build()
            .unwrap();
        Self {
            pipeline,
            clock,
            metrics,
            client,
            store,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        use ndx_core::Clock;
        self.clock.now()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
