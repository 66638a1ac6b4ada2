//! Generation state machine behaviour.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{NaiveDate, TimeDelta, TimeZone, Utc};
use rstest::rstest;
use tokio::sync::{Notify, Semaphore};
use url::Url;

use super::*;
use crate::domain::ports::{
    AudioGeneratorError, AudioStorageError, JobDispatchError, MockAudioGenerator, MockAudioStorage,
    MockGenerationTrigger, MockOrderRepository, UserRepository,
};
use crate::domain::{ErrorCode, OrderType, User};
use crate::test_support::{
    InMemoryAudioStorage, InMemoryStore, MutableClock, RecordingEmailSender, RecordingTrigger,
    ScriptedAudioGenerator, fixtures,
};

struct Harness {
    store: Arc<InMemoryStore>,
    generator: Arc<ScriptedAudioGenerator>,
    storage: Arc<InMemoryAudioStorage>,
    trigger: Arc<RecordingTrigger>,
    email: Arc<RecordingEmailSender>,
    engine: GenerationEngine,
}

fn clock() -> Arc<MutableClock> {
    Arc::new(MutableClock::new(
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0)
            .single()
            .expect("valid instant"),
    ))
}

fn harness(failures: Vec<usize>) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let generator = Arc::new(ScriptedAudioGenerator::failing_on(failures));
    let storage = Arc::new(InMemoryAudioStorage::default());
    let trigger = Arc::new(RecordingTrigger::default());
    let email = Arc::new(RecordingEmailSender::default());
    let notifier = CompletionNotifier::new(
        store.clone(),
        store.clone(),
        email.clone(),
        Url::parse("https://songs.example").expect("static url"),
    );
    let engine = GenerationEngine::new(GenerationEngineDeps {
        orders: store.clone(),
        customizations: store.clone(),
        generator: generator.clone(),
        storage: storage.clone(),
        trigger: trigger.clone(),
        notifier: Some(notifier),
        clock: clock(),
    });
    Harness {
        store,
        generator,
        storage,
        trigger,
        email,
        engine,
    }
}

async fn seeded_order(h: &Harness) -> (User, OrderId) {
    let user = fixtures::user();
    h.store.ensure(&user).await.expect("user stored");
    let customization = fixtures::customization(user.id());
    let mut order = fixtures::order(user.id(), OrderType::Base);
    order.customization_id = Some(customization.id);
    order.occasion_date = NaiveDate::from_ymd_opt(2024, 6, 1);
    let order_id = order.id;
    h.store.insert_customization(customization);
    h.store.insert_order(order, 3);
    (user, order_id)
}

#[rstest]
#[case::all_succeed(vec![], OrderStatus::Completed)]
#[case::all_fail(vec![1, 2, 3], OrderStatus::Failed)]
#[case::mixed(vec![1, 3], OrderStatus::Completed)]
#[tokio::test]
async fn three_calls_render_variants_in_order(
    #[case] failures: Vec<usize>,
    #[case] expected: OrderStatus,
) {
    let h = harness(failures.clone());
    let (_, order_id) = seeded_order(&h).await;
    let ids: Vec<_> = h.store.variants_of(order_id).iter().map(|v| v.id).collect();

    let mut outcomes = Vec::new();
    for _ in 0..3 {
        outcomes.push(
            h.engine
                .generate_next_variant(order_id)
                .await
                .expect("step runs"),
        );
    }

    for (call, outcome) in outcomes.iter().enumerate() {
        let expected_status = if failures.contains(&(call + 1)) {
            GenerationStatus::Failed
        } else {
            GenerationStatus::Complete
        };
        assert_eq!(
            *outcome,
            GenerationOutcome::Generated {
                variant_id: ids[call],
                variant_status: expected_status,
                remaining: u32::try_from(2 - call).expect("small"),
            }
        );
    }
    assert_eq!(h.store.order(order_id).map(|o| o.status), Some(expected));
}

#[tokio::test]
async fn order_is_generating_between_steps() {
    let h = harness(vec![]);
    let (_, order_id) = seeded_order(&h).await;

    h.engine
        .generate_next_variant(order_id)
        .await
        .expect("step runs");

    assert_eq!(
        h.store.order(order_id).map(|o| o.status),
        Some(OrderStatus::Generating)
    );
    let variants = h.store.variants_of(order_id);
    assert_eq!(variants[0].generation_status, GenerationStatus::Complete);
    assert_eq!(variants[0].duration_ms, Some(90_000));
    assert!(variants[0].completed_at.is_some());
    assert_eq!(h.storage.paths(), vec![variants[0].storage_path.clone()]);
}

#[tokio::test]
async fn calls_without_pending_variants_change_nothing() {
    let h = harness(vec![]);
    let (_, order_id) = seeded_order(&h).await;
    for _ in 0..3 {
        h.engine
            .generate_next_variant(order_id)
            .await
            .expect("step runs");
    }
    let before = (h.store.order(order_id), h.store.variants_of(order_id));

    for _ in 0..2 {
        let outcome = h
            .engine
            .generate_next_variant(order_id)
            .await
            .expect("no-op");
        assert_eq!(outcome, GenerationOutcome::NoPendingVariants { remaining: 0 });
    }

    assert_eq!((h.store.order(order_id), h.store.variants_of(order_id)), before);
    assert_eq!(h.generator.prompts().len(), 3);
}

#[tokio::test]
async fn missing_order_is_not_found() {
    let h = harness(vec![]);
    let error = h
        .engine
        .generate_next_variant(OrderId::random())
        .await
        .expect_err("no order");
    assert_eq!(error.code(), ErrorCode::NotFound);
}

#[tokio::test]
async fn prompt_comes_from_the_customization() {
    let h = harness(vec![]);
    let (user, order_id) = seeded_order(&h).await;
    let order = h.store.order(order_id).expect("order");
    let mut customization = fixtures::customization(user.id());
    customization.id = order.customization_id.expect("linked");

    h.engine
        .generate_next_variant(order_id)
        .await
        .expect("step runs");

    assert_eq!(h.generator.prompts(), vec![build_prompt(&customization)]);
}

#[tokio::test]
async fn lost_claim_does_no_work() {
    let user = fixtures::user();
    let order = fixtures::order(user.id(), OrderType::Base);
    let order_id = order.id;
    let variants: Vec<SongVariant> = {
        let store = InMemoryStore::new();
        store.insert_order(order.clone(), 3);
        store.variants_of(order_id)
    };
    let after_claim = {
        let mut rows = variants.clone();
        rows[0].generation_status = GenerationStatus::Generating;
        rows
    };

    let mut orders = MockOrderRepository::new();
    orders
        .expect_find()
        .times(1)
        .return_once(move |_| Ok(Some(order)));
    let mut reads = vec![after_claim, variants];
    orders
        .expect_variants()
        .times(2)
        .returning(move |_| Ok(reads.pop().unwrap_or_default()));
    orders
        .expect_claim_variant()
        .times(1)
        .return_once(|_, _, _| Ok(false));
    orders.expect_finish_variant().times(0);
    let mut generator = MockAudioGenerator::new();
    generator.expect_generate().times(0);

    let engine = GenerationEngine::new(GenerationEngineDeps {
        orders: Arc::new(orders),
        customizations: Arc::new(InMemoryStore::new()),
        generator: Arc::new(generator),
        storage: Arc::new(InMemoryAudioStorage::default()),
        trigger: Arc::new(RecordingTrigger::default()),
        notifier: None,
        clock: clock(),
    });

    let outcome = engine
        .generate_next_variant(order_id)
        .await
        .expect("no-op");
    assert_eq!(outcome, GenerationOutcome::NoPendingVariants { remaining: 2 });
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_steps_never_render_a_variant_twice() {
    let h = harness(vec![]);
    let (_, order_id) = seeded_order(&h).await;
    let engine = Arc::new(h.engine.clone());

    let steps = futures::future::join_all((0..6).map(|_| {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.generate_next_variant(order_id).await })
    }))
    .await;

    let generated = steps
        .into_iter()
        .filter(|step| matches!(step, Ok(Ok(GenerationOutcome::Generated { .. }))))
        .count();
    assert!(generated >= 1);
    assert_eq!(h.generator.prompts().len(), generated);
    assert_eq!(h.storage.paths().len(), generated);
}

/// Provider that holds every render until released.
struct GatedGenerator {
    started: Notify,
    release: Semaphore,
    calls: AtomicUsize,
}

impl Default for GatedGenerator {
    fn default() -> Self {
        Self {
            started: Notify::new(),
            release: Semaphore::new(0),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AudioGenerator for GatedGenerator {
    async fn generate(
        &self,
        _prompt: &str,
        _duration_ms: u32,
    ) -> Result<Vec<u8>, AudioGeneratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        if let Ok(permit) = self.release.acquire().await {
            permit.forget();
        }
        Ok(b"slow-mp3".to_vec())
    }
}

fn gated_engine(
    store: &Arc<InMemoryStore>,
    clock: Arc<MutableClock>,
) -> (Arc<GatedGenerator>, GenerationEngine) {
    let generator = Arc::new(GatedGenerator::default());
    let engine = GenerationEngine::new(GenerationEngineDeps {
        orders: store.clone(),
        customizations: store.clone(),
        generator: generator.clone(),
        storage: Arc::new(InMemoryAudioStorage::default()),
        trigger: Arc::new(RecordingTrigger::default()),
        notifier: None,
        clock,
    });
    (generator, engine)
}

fn seeded_store() -> (Arc<InMemoryStore>, OrderId) {
    let store = Arc::new(InMemoryStore::new());
    let user = fixtures::user();
    let customization = fixtures::customization(user.id());
    let mut order = fixtures::order(user.id(), OrderType::Base);
    order.customization_id = Some(customization.id);
    let order_id = order.id;
    store.insert_customization(customization);
    store.insert_order(order, 3);
    (store, order_id)
}

fn generating(store: &InMemoryStore, order_id: OrderId) -> usize {
    store
        .variants_of(order_id)
        .iter()
        .filter(|v| v.generation_status == GenerationStatus::Generating)
        .count()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn an_overlapping_step_waits_for_the_variant_in_flight() {
    let (store, order_id) = seeded_store();
    let (generator, engine) = gated_engine(&store, clock());
    let engine = Arc::new(engine);

    let first = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move { engine.generate_next_variant(order_id).await }
    });
    generator.started.notified().await;

    let second = engine
        .generate_next_variant(order_id)
        .await
        .expect("overlapping step runs");

    assert_eq!(second, GenerationOutcome::NoPendingVariants { remaining: 2 });
    assert_eq!(generating(&store, order_id), 1);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);

    generator.release.add_permits(1);
    let first = first.await.expect("task joins").expect("first step runs");
    assert!(matches!(
        first,
        GenerationOutcome::Generated {
            variant_status: GenerationStatus::Complete,
            remaining: 2,
            ..
        }
    ));
    assert_eq!(generating(&store, order_id), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn a_stalled_sibling_stops_blocking_once_stale() {
    let (store, order_id) = seeded_store();
    let clock = clock();
    let (generator, engine) = gated_engine(&store, clock.clone());
    let engine = Arc::new(engine.with_stale_after(TimeDelta::minutes(15)));

    let stalled = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move { engine.generate_next_variant(order_id).await }
    });
    generator.started.notified().await;
    clock.advance(TimeDelta::minutes(16));

    let next = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move { engine.generate_next_variant(order_id).await }
    });
    generator.started.notified().await;

    assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
    assert_eq!(generating(&store, order_id), 2);

    generator.release.add_permits(2);
    for step in [stalled, next] {
        let outcome = step.await.expect("task joins").expect("step runs");
        assert!(matches!(outcome, GenerationOutcome::Generated { .. }));
    }
}

#[tokio::test]
async fn upload_failure_fails_only_that_variant() {
    let store = Arc::new(InMemoryStore::new());
    let user = fixtures::user();
    let customization = fixtures::customization(user.id());
    let mut order = fixtures::order(user.id(), OrderType::Base);
    order.customization_id = Some(customization.id);
    let order_id = order.id;
    store.insert_customization(customization);
    store.insert_order(order, 3);
    let mut storage = MockAudioStorage::new();
    storage
        .expect_upload()
        .times(1)
        .return_once(|_, _| Err(AudioStorageError::transport("bucket offline")));

    let engine = GenerationEngine::new(GenerationEngineDeps {
        orders: store.clone(),
        customizations: store.clone(),
        generator: Arc::new(ScriptedAudioGenerator::succeeding()),
        storage: Arc::new(storage),
        trigger: Arc::new(RecordingTrigger::default()),
        notifier: None,
        clock: clock(),
    });

    let outcome = engine
        .generate_next_variant(order_id)
        .await
        .expect("failure is recorded, not raised");

    assert!(matches!(
        outcome,
        GenerationOutcome::Generated {
            variant_status: GenerationStatus::Failed,
            remaining: 2,
            ..
        }
    ));
    let variants = store.variants_of(order_id);
    assert!(variants[0].completed_at.is_some());
    assert_eq!(variants[1].generation_status, GenerationStatus::Pending);
}

#[tokio::test]
async fn advance_chains_until_nothing_remains() {
    let h = harness(vec![2]);
    let (_, order_id) = seeded_order(&h).await;

    for _ in 0..3 {
        h.engine.advance(order_id).await.expect("step runs");
    }
    h.engine.advance(order_id).await.expect("no-op");

    assert_eq!(h.trigger.triggered(), vec![order_id, order_id]);
}

#[tokio::test]
async fn chain_failure_does_not_fail_the_step() {
    let store = Arc::new(InMemoryStore::new());
    let user = fixtures::user();
    let customization = fixtures::customization(user.id());
    let mut order = fixtures::order(user.id(), OrderType::Base);
    order.customization_id = Some(customization.id);
    let order_id = order.id;
    store.insert_customization(customization);
    store.insert_order(order, 3);
    let mut trigger = MockGenerationTrigger::new();
    trigger
        .expect_trigger()
        .times(1)
        .return_once(|_| Err(JobDispatchError::unavailable("connection refused")));

    let engine = GenerationEngine::new(GenerationEngineDeps {
        orders: store.clone(),
        customizations: store.clone(),
        generator: Arc::new(ScriptedAudioGenerator::succeeding()),
        storage: Arc::new(InMemoryAudioStorage::default()),
        trigger: Arc::new(trigger),
        notifier: None,
        clock: clock(),
    });

    let outcome = engine.advance(order_id).await.expect("step succeeds");
    assert_eq!(outcome.remaining(), 2);
}

#[tokio::test]
async fn advance_owned_hides_other_users_orders() {
    let h = harness(vec![]);
    let (_, order_id) = seeded_order(&h).await;

    let error = h
        .engine
        .advance_owned(order_id, UserId::random())
        .await
        .expect_err("not owned");

    assert_eq!(error.code(), ErrorCode::NotFound);
    assert!(h.generator.prompts().is_empty());
}

#[tokio::test]
async fn completion_sends_ready_mail_and_schedules_reminder() {
    let h = harness(vec![1]);
    let (user, order_id) = seeded_order(&h).await;

    for _ in 0..3 {
        h.engine
            .generate_next_variant(order_id)
            .await
            .expect("step runs");
    }

    let sent = h.email.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].to, user.email());
    assert_eq!(sent[0].subject, "Your song is ready");
    assert_eq!(
        sent[1].scheduled_at,
        Utc.with_ymd_and_hms(2027, 5, 25, 9, 0, 0).single()
    );
}

#[tokio::test]
async fn failed_orders_send_no_mail() {
    let h = harness(vec![1, 2, 3]);
    let (_, order_id) = seeded_order(&h).await;

    for _ in 0..3 {
        h.engine
            .generate_next_variant(order_id)
            .await
            .expect("step runs");
    }

    assert!(h.email.sent().is_empty());
}
