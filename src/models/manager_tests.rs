//! Tests for slot lifecycle, eviction order and lease pinning.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::adapters::{ModelAdapter, SchemaTask, TaskInput, TaskOutput};
use crate::artifacts::ProjectSchema;
use ModelKind::*;

#[derive(Default)]
struct Counters {
    loads: AtomicUsize,
    cleanups: AtomicUsize,
}

struct Tracked {
    kind: ModelKind,
    counters: Arc<Counters>,
    fail_load: bool,
    load_delay: Option<Duration>,
    cleanup_delay: Option<Duration>,
}

#[async_trait]
impl ModelAdapter for Tracked {
    fn kind(&self) -> ModelKind {
        self.kind
    }

    async fn load(&mut self) -> Result<(), AdapterError> {
        self.counters.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.load_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_load {
            return Err(AdapterError::Unavailable("weights missing".into()));
        }
        Ok(())
    }

    async fn generate(
        &self,
        _input: TaskInput,
        _cancel: &CancellationToken,
    ) -> Result<TaskOutput, AdapterError> {
        Ok(TaskOutput::Schema(ProjectSchema::default()))
    }

    async fn cleanup(&mut self) -> Result<(), AdapterError> {
        if let Some(delay) = self.cleanup_delay {
            tokio::time::sleep(delay).await;
        }
        self.counters.cleanups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn table_with(counters: &BTreeMap<ModelKind, Arc<Counters>>, failing: &[ModelKind]) -> AdapterTable {
    let mut table = AdapterTable::new();
    for (&kind, c) in counters {
        let c = c.clone();
        let fail_load = failing.contains(&kind);
        table.register(kind, format!("{kind}.gguf"), move || {
            Box::new(Tracked { kind, counters: c.clone(), fail_load, load_delay: None, cleanup_delay: None })
                as Box<dyn ModelAdapter>
        });
    }
    table
}

fn slow_schema(
    counters: &Arc<Counters>,
    load_delay: Option<Duration>,
    cleanup_delay: Option<Duration>,
) -> AdapterTable {
    let c = counters.clone();
    AdapterTable::new().with(SchemaExtractor, "slow.gguf", move || {
        Box::new(Tracked {
            kind: SchemaExtractor,
            counters: c.clone(),
            fail_load: false,
            load_delay,
            cleanup_delay,
        }) as Box<dyn ModelAdapter>
    })
}

fn counters() -> BTreeMap<ModelKind, Arc<Counters>> {
    ModelKind::ALL.iter().map(|&k| (k, Arc::new(Counters::default()))).collect()
}

fn manager(max: usize, counters: &BTreeMap<ModelKind, Arc<Counters>>) -> ResourceManager {
    ResourceManager::with_limit(max, table_with(counters, &[])).unwrap()
}

#[tokio::test]
async fn get_twice_returns_same_instance_without_reload() {
    let c = counters();
    let mgr = manager(2, &c);
    let a = mgr.get(SchemaExtractor).await.unwrap();
    let b = mgr.get(SchemaExtractor).await.unwrap();
    assert!(a.same_instance(&b));
    assert_eq!(c[&SchemaExtractor].loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn third_kind_evicts_least_recently_used() {
    let c = counters();
    let mgr = manager(2, &c);
    drop(mgr.get(SchemaExtractor).await.unwrap());
    drop(mgr.get(CodeGenerator).await.unwrap());
    let acquired = mgr.acquire(CodeReviewer).await.unwrap();
    assert_eq!(acquired.evicted, Some(SchemaExtractor));
    drop(acquired);

    let status = mgr.status().await;
    assert_eq!(status.resident, vec![CodeGenerator, CodeReviewer]);
    assert_eq!(status.slot(SchemaExtractor).unwrap().state, SlotState::Unloaded);
    assert_eq!(c[&SchemaExtractor].cleanups.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn touching_a_kind_protects_it_from_eviction() {
    let c = counters();
    let mgr = manager(2, &c);
    drop(mgr.get(SchemaExtractor).await.unwrap());
    drop(mgr.get(CodeGenerator).await.unwrap());
    drop(mgr.get(SchemaExtractor).await.unwrap());
    let acquired = mgr.acquire(DocGenerator).await.unwrap();
    assert_eq!(acquired.evicted, Some(CodeGenerator));
}

#[tokio::test]
async fn resident_count_never_exceeds_limit() {
    let c = counters();
    let mgr = manager(1, &c);
    for kind in ModelKind::ALL.iter().chain(ModelKind::ALL.iter().rev()) {
        drop(mgr.get(*kind).await.unwrap());
        assert!(mgr.status().await.resident_count() <= 1);
    }
}

#[tokio::test]
async fn pinned_kinds_are_not_evicted() {
    let c = counters();
    let mgr = manager(1, &c);
    let pinned = mgr.get(SchemaExtractor).await.unwrap();
    let err = mgr.acquire_within(CodeGenerator, Duration::ZERO).await.unwrap_err();
    assert!(matches!(err, ResourceError::CapacityExhausted { kind: CodeGenerator, max: 1 }));
    assert!(mgr.is_loaded(SchemaExtractor).await);

    drop(pinned);
    assert!(mgr.get(CodeGenerator).await.is_ok());
    assert!(!mgr.is_loaded(SchemaExtractor).await);
}

#[tokio::test]
async fn waiting_acquire_admits_once_lease_is_released() {
    let c = counters();
    let mgr = manager(1, &c);
    let pinned = mgr.get(SchemaExtractor).await.unwrap();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        drop(pinned);
    });

    let acquired = mgr.acquire_within(CodeGenerator, Duration::from_secs(5)).await.unwrap();
    assert_eq!(acquired.evicted, Some(SchemaExtractor));
    assert_eq!(c[&SchemaExtractor].cleanups.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn waiting_acquire_gives_up_at_its_bound() {
    let c = counters();
    let mgr = manager(1, &c).with_admission_wait(Duration::from_millis(40));
    let _pinned = mgr.get(SchemaExtractor).await.unwrap();

    let started = std::time::Instant::now();
    let err = mgr.acquire(CodeGenerator).await.unwrap_err();
    assert!(matches!(err, ResourceError::CapacityExhausted { kind: CodeGenerator, max: 1 }));
    assert!(started.elapsed() >= Duration::from_millis(40));
    assert_eq!(c[&CodeGenerator].loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn abandoned_load_resets_slot_and_cleans_up() {
    let c = Arc::new(Counters::default());
    let mgr = ResourceManager::with_limit(2, slow_schema(&c, Some(Duration::from_millis(100)), None)).unwrap();

    let dropped = tokio::time::timeout(Duration::from_millis(20), mgr.get(SchemaExtractor)).await;
    assert!(dropped.is_err());

    let status = mgr.status().await;
    let slot = status.slot(SchemaExtractor).unwrap();
    assert_eq!(slot.state, SlotState::Unloaded);
    assert_eq!(slot.load_failures, 1);
    assert_eq!(status.resident_count(), 0);

    // The detached load finishes and is cleaned up, with nothing resident.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(c.cleanups.load(Ordering::SeqCst), 1);
    assert!(!mgr.is_loaded(SchemaExtractor).await);

    assert!(mgr.get(SchemaExtractor).await.is_ok());
    assert_eq!(c.loads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn abandoned_eviction_still_unloads() {
    let c = Arc::new(Counters::default());
    let mgr = ResourceManager::with_limit(2, slow_schema(&c, None, Some(Duration::from_millis(100)))).unwrap();
    drop(mgr.get(SchemaExtractor).await.unwrap());

    let dropped = tokio::time::timeout(Duration::from_millis(20), mgr.evict(SchemaExtractor)).await;
    assert!(dropped.is_err());

    let status = mgr.status().await;
    let slot = status.slot(SchemaExtractor).unwrap();
    assert_eq!(slot.state, SlotState::Unloaded);
    assert_eq!(slot.evictions, 1);
    assert_eq!(status.resident_count(), 0);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(c.cleanups.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_load_leaves_slot_unloaded() {
    let c = counters();
    let mgr = ResourceManager::with_limit(2, table_with(&c, &[CodeGenerator])).unwrap();
    let err = mgr.get(CodeGenerator).await.unwrap_err();
    assert!(matches!(err, ResourceError::AdapterUnavailable { kind: CodeGenerator, .. }));

    let status = mgr.status().await;
    let slot = status.slot(CodeGenerator).unwrap();
    assert_eq!(slot.state, SlotState::Unloaded);
    assert_eq!(slot.load_failures, 1);
    assert_eq!(status.resident_count(), 0);

    // A later attempt builds a fresh instance.
    assert!(mgr.get(CodeGenerator).await.is_err());
    assert_eq!(c[&CodeGenerator].loads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unregistered_kind_is_unavailable() {
    let mgr = ResourceManager::with_limit(2, AdapterTable::new()).unwrap();
    let err = mgr.get(DocGenerator).await.unwrap_err();
    assert!(matches!(err, ResourceError::AdapterUnavailable { kind: DocGenerator, .. }));
}

#[tokio::test]
async fn evict_cleans_up_exactly_once() {
    let c = counters();
    let mgr = manager(2, &c);
    drop(mgr.get(CodeReviewer).await.unwrap());
    mgr.evict(CodeReviewer).await.unwrap();
    assert!(matches!(mgr.evict(CodeReviewer).await, Err(ResourceError::NotLoaded(CodeReviewer))));
    assert_eq!(c[&CodeReviewer].cleanups.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stale_handle_fails_after_eviction() {
    let c = counters();
    let mgr = manager(2, &c);
    let handle = mgr.get(SchemaExtractor).await.unwrap();
    mgr.evict(SchemaExtractor).await.unwrap();
    let input = TaskInput::Schema(SchemaTask {
        prompt: "todo app".into(),
        domain: String::new(),
        tech_stack: "python".into(),
        constraints: vec![],
    });
    let err = handle.generate(input, &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, AdapterError::NotLoaded(SchemaExtractor)));
}

#[tokio::test]
async fn preload_and_unload_all() {
    let c = counters();
    let mgr = ResourceManager::with_limit(4, table_with(&c, &[DocGenerator])).unwrap();
    let report = mgr.preload(&[SchemaExtractor, CodeGenerator, DocGenerator]).await;
    assert_eq!(report.loaded, vec![SchemaExtractor, CodeGenerator]);
    assert_eq!(report.failed.len(), 1);
    assert!(!report.is_complete());

    let unloaded = mgr.unload_all().await;
    assert_eq!(unloaded.unloaded, vec![SchemaExtractor, CodeGenerator]);
    assert_eq!(mgr.status().await.resident_count(), 0);
}

#[test]
fn zero_limit_is_a_config_error() {
    assert!(ResourceManager::with_limit(0, AdapterTable::new()).is_err());
}
