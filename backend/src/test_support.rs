//! In-memory adapters and fixtures shared by unit and integration tests.
//!
//! [`InMemoryStore`] implements every storage port behind one mutex so the
//! workflow's atomicity rules (compare-and-swap claims, conditional credit
//! decrements, single selection) hold exactly as they do in PostgreSQL.
//! [`Workflow`] wires every service to these adapters for handler and
//! end-to-end tests. Compiled for `cfg(test)` and the `test-support`
//! feature.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta, Utc};
use mockable::Clock;
use url::Url;
use zeroize::Zeroizing;

use crate::domain::ports::{
    AudioGenerator, AudioGeneratorError, AudioStorage, AudioStorageError, BundleRepository,
    BundleRepositoryError, CheckoutSession, CheckoutSessionRequest, CustomizationRepository,
    CustomizationRepositoryError, EmailMessage, EmailPreferencesRepository,
    EmailPreferencesRepositoryError, EmailSender, EmailSenderError, FailedJobRepository,
    FailedJobRepositoryError, GenerationTrigger, IdentityProvider, IdentityProviderError,
    JobDispatchError, OrderRepository, OrderRepositoryError, PaymentGateway, PaymentGatewayError,
    SelectionOutcome, UserPersistenceError, UserRepository,
};
use crate::domain::{
    BundleId, Customization, CustomizationBrief, CustomizationId, EmailPreferences, FailedJob,
    FailedJobId, GenerationStatus, NewFailedJob, NewVariant, Order, OrderId, OrderStatus,
    OrderWithVariants, PaymentEvent, Purchase, PurchaseKind, PurchaseOutcome,
    PurchaseRejection, ShareToken, SongVariant, User, UserId, VariantId, VariantResult,
};
use crate::domain::order::{INITIAL_VARIANTS, MAX_VARIANTS_PER_ORDER, MAX_TWEAK_COUNT};
use crate::domain::{
    CheckoutLinks, CheckoutService, CompletionNotifier, CustomizationService, EntitlementService,
    FailureRecoveryService, GenerationEngine, GenerationEngineDeps, OrderStatusService,
    PaymentEventService, SharedSongService, VariantSelectionService,
};
use crate::domain::ports::{EntitlementLedger, PaymentEventCommand};
use crate::inbound::http::state::{AccessPolicy, HttpState, HttpStatePorts};
use crate::outbound::payments::{parse_event, sign_payload, verify_signature};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub mod fixtures {
    //! Builders for domain values used across test suites.

    use chrono::{NaiveDate, Utc};

    use crate::domain::{
        Customization, CustomizationBrief, CustomizationId, Genre, Mood, Occasion, Order, OrderId,
        OrderStatus, OrderType, PaymentMethod, SongLength, User, UserId,
    };

    /// A user with a unique e-mail.
    pub fn user() -> User {
        let id = UserId::random();
        User::new(id, format!("user-{id}@example.com")).expect("fixture e-mail is valid")
    }

    /// A brief for a 90-second birthday pop song.
    pub fn brief() -> CustomizationBrief {
        CustomizationBrief {
            recipient_name: "Sam".to_owned(),
            author_name: "Alex".to_owned(),
            occasion: Occasion::Birthday,
            length: SongLength::Standard,
            moods: vec![Mood::Happy, Mood::Upbeat],
            genre: Genre::Pop,
            special_memories: Some("the camping trip".to_owned()),
            things_to_avoid: None,
            pronunciation: None,
            occasion_date: NaiveDate::from_ymd_opt(2024, 6, 1),
        }
    }

    /// A stored customization owned by `user_id`.
    pub fn customization(user_id: UserId) -> Customization {
        Customization {
            id: CustomizationId::random(),
            user_id,
            brief: brief(),
            latest_tweak: None,
            created_at: Utc::now(),
        }
    }

    /// A paid card order of `order_type`.
    pub fn order(user_id: UserId, order_type: OrderType) -> Order {
        Order {
            id: OrderId::random(),
            user_id,
            customization_id: Some(CustomizationId::random()),
            payment_session_id: None,
            amount_minor: 2499,
            currency: "gbp".to_owned(),
            order_type,
            status: OrderStatus::Paid,
            payment_method: PaymentMethod::Card,
            tweak_count: 0,
            parent_order_id: None,
            occasion_date: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
struct BundleRow {
    id: BundleId,
    user_id: UserId,
    quantity_total: u32,
    quantity_remaining: u32,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    users: HashMap<UserId, User>,
    customizations: HashMap<CustomizationId, Customization>,
    orders: HashMap<OrderId, Order>,
    variants: HashMap<VariantId, SongVariant>,
    bundles: Vec<BundleRow>,
    failed_jobs: Vec<FailedJob>,
    preferences: HashMap<UserId, EmailPreferences>,
}

impl State {
    fn variants_of(&self, order_id: OrderId) -> Vec<SongVariant> {
        let mut variants: Vec<SongVariant> = self
            .variants
            .values()
            .filter(|variant| variant.order_id == order_id)
            .cloned()
            .collect();
        variants.sort_by_key(|variant| variant.variant_number);
        variants
    }

    fn insert_variants(&mut self, rows: Vec<NewVariant>) {
        for row in rows {
            let taken = self
                .variants
                .values()
                .any(|v| v.order_id == row.order_id && v.variant_number == row.variant_number);
            if taken {
                continue;
            }
            self.variants.insert(
                row.id,
                SongVariant {
                    id: row.id,
                    user_id: row.user_id,
                    order_id: row.order_id,
                    variant_number: row.variant_number,
                    generation_status: GenerationStatus::Pending,
                    storage_path: row.storage_path,
                    duration_ms: None,
                    selected: false,
                    share_token: row.share_token,
                    generation_started_at: None,
                    completed_at: None,
                },
            );
        }
    }

    fn new_order(&self, purchase: &Purchase) -> Order {
        Order {
            id: OrderId::random(),
            user_id: purchase.user_id,
            customization_id: None,
            payment_session_id: purchase.payment_session_id.clone(),
            amount_minor: purchase.amount_minor,
            currency: purchase.currency.clone(),
            order_type: purchase.kind.order_type(),
            status: OrderStatus::Paid,
            payment_method: purchase.payment_method,
            tweak_count: 0,
            parent_order_id: None,
            occasion_date: None,
            created_at: Utc::now(),
        }
    }

    fn owned_original(&self, order_id: OrderId, user_id: UserId) -> Option<Order> {
        self.orders
            .get(&order_id)
            .filter(|order| order.user_id == user_id && order.order_type.has_variants())
            .cloned()
    }

    fn reset(&mut self, variant_id: VariantId, stale_before: DateTime<Utc>) -> bool {
        let Some(variant) = self.variants.get_mut(&variant_id) else {
            return false;
        };
        if !variant.is_resettable(stale_before) {
            return false;
        }
        variant.generation_status = GenerationStatus::Pending;
        variant.generation_started_at = None;
        variant.completed_at = None;
        let order_id = variant.order_id;
        if let Some(order) = self.orders.get_mut(&order_id) {
            if order.status.is_terminal() {
                order.status = OrderStatus::Paid;
            }
        }
        true
    }

    fn apply(&mut self, purchase: &Purchase) -> PurchaseOutcome {
        let mut order = self.new_order(purchase);
        let order_id = order.id;
        let generate = match &purchase.kind {
            PurchaseKind::Base {
                customization_id,
                occasion_date,
            } => {
                let owned = self
                    .customizations
                    .get(customization_id)
                    .is_some_and(|c| c.user_id == purchase.user_id);
                if !owned {
                    return PurchaseOutcome::Rejected(PurchaseRejection::CustomizationNotFound);
                }
                order.customization_id = Some(*customization_id);
                order.occasion_date = *occasion_date;
                self.insert_variants(NewVariant::batch(order_id, purchase.user_id, INITIAL_VARIANTS));
                Some(order_id)
            }
            PurchaseKind::Tweak {
                original_order_id,
                amendment,
                free,
            } => {
                let Some(original) = self.owned_original(*original_order_id, purchase.user_id)
                else {
                    return PurchaseOutcome::Rejected(PurchaseRejection::OriginalOrderNotFound);
                };
                let allowed = if *free {
                    original.tweak_count == 0
                } else {
                    original.tweak_count >= 1
                };
                let Some(customization_id) = original.customization_id else {
                    return PurchaseOutcome::Rejected(PurchaseRejection::OriginalOrderNotFound);
                };
                if !allowed {
                    return PurchaseOutcome::Rejected(PurchaseRejection::TweakUnavailable);
                }
                let count = if *free { 1 } else { MAX_TWEAK_COUNT };
                if let Some(stored) = self.orders.get_mut(original_order_id) {
                    stored.tweak_count = count;
                }
                if let Some(customization) = self.customizations.get_mut(&customization_id) {
                    customization.latest_tweak = Some(amendment.clone());
                }
                order.customization_id = Some(customization_id);
                order.parent_order_id = Some(*original_order_id);
                order.tweak_count = count;
                order.occasion_date = original.occasion_date;
                self.insert_variants(NewVariant::batch(order_id, purchase.user_id, INITIAL_VARIANTS));
                Some(order_id)
            }
            PurchaseKind::Upsell { original_order_id } => {
                let Some(original) = self.owned_original(*original_order_id, purchase.user_id)
                else {
                    return PurchaseOutcome::Rejected(PurchaseRejection::OriginalOrderNotFound);
                };
                let existing = self.variants_of(original.id).len();
                if existing >= usize::from(MAX_VARIANTS_PER_ORDER) {
                    return PurchaseOutcome::Rejected(PurchaseRejection::VariantLimitReached);
                }
                order.customization_id = original.customization_id;
                order.parent_order_id = Some(original.id);
                let next_number = u8::try_from(existing + 1).unwrap_or(MAX_VARIANTS_PER_ORDER);
                self.insert_variants(vec![NewVariant::for_order(
                    original.id,
                    purchase.user_id,
                    next_number,
                )]);
                if let Some(stored) = self.orders.get_mut(&original.id) {
                    if stored.status.is_terminal() {
                        stored.status = OrderStatus::Paid;
                    }
                }
                Some(original.id)
            }
            PurchaseKind::Bundle { quantity, .. } => {
                self.bundles.push(BundleRow {
                    id: BundleId::random(),
                    user_id: purchase.user_id,
                    quantity_total: *quantity,
                    quantity_remaining: *quantity,
                    created_at: Utc::now(),
                });
                None
            }
        };
        self.orders.insert(order_id, order);
        PurchaseOutcome::Created { order_id, generate }
    }
}

/// Storage ports backed by process memory.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a customization as-is.
    pub fn insert_customization(&self, customization: Customization) {
        lock(&self.state)
            .customizations
            .insert(customization.id, customization);
    }

    /// Store an order and `variant_count` pending variants.
    pub fn insert_order(&self, order: Order, variant_count: u8) {
        let mut state = lock(&self.state);
        state.insert_variants(NewVariant::batch(order.id, order.user_id, variant_count));
        state.orders.insert(order.id, order);
    }

    /// Give `user_id` a bundle with `quantity` credits.
    pub fn seed_bundle(&self, user_id: UserId, quantity: u32) -> BundleId {
        let id = BundleId::random();
        lock(&self.state).bundles.push(BundleRow {
            id,
            user_id,
            quantity_total: quantity,
            quantity_remaining: quantity,
            created_at: Utc::now(),
        });
        id
    }

    pub fn set_preferences(&self, preferences: EmailPreferences) {
        lock(&self.state)
            .preferences
            .insert(preferences.user_id, preferences);
    }

    pub fn order(&self, order_id: OrderId) -> Option<Order> {
        lock(&self.state).orders.get(&order_id).cloned()
    }

    pub fn orders(&self) -> Vec<Order> {
        lock(&self.state).orders.values().cloned().collect()
    }

    pub fn variants_of(&self, order_id: OrderId) -> Vec<SongVariant> {
        lock(&self.state).variants_of(order_id)
    }

    /// Overwrite a variant's status, for arranging test scenarios.
    pub fn set_variant_status(
        &self,
        variant_id: VariantId,
        status: GenerationStatus,
        started_at: Option<DateTime<Utc>>,
    ) {
        if let Some(variant) = lock(&self.state).variants.get_mut(&variant_id) {
            variant.generation_status = status;
            variant.generation_started_at = started_at;
        }
    }

    pub fn failed_jobs(&self) -> Vec<FailedJob> {
        lock(&self.state).failed_jobs.clone()
    }
}

#[async_trait]
impl CustomizationRepository for InMemoryStore {
    async fn create(
        &self,
        user_id: UserId,
        brief: &CustomizationBrief,
    ) -> Result<Customization, CustomizationRepositoryError> {
        let customization = Customization {
            id: CustomizationId::random(),
            user_id,
            brief: brief.clone(),
            latest_tweak: None,
            created_at: Utc::now(),
        };
        self.insert_customization(customization.clone());
        Ok(customization)
    }

    async fn find(
        &self,
        id: CustomizationId,
    ) -> Result<Option<Customization>, CustomizationRepositoryError> {
        Ok(lock(&self.state).customizations.get(&id).cloned())
    }

    async fn find_owned(
        &self,
        id: CustomizationId,
        user_id: UserId,
    ) -> Result<Option<Customization>, CustomizationRepositoryError> {
        Ok(lock(&self.state)
            .customizations
            .get(&id)
            .filter(|c| c.user_id == user_id)
            .cloned())
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn record_purchase(
        &self,
        purchase: &Purchase,
    ) -> Result<PurchaseOutcome, OrderRepositoryError> {
        let mut state = lock(&self.state);
        if let Some(session_id) = &purchase.payment_session_id {
            let existing = state
                .orders
                .values()
                .find(|order| order.payment_session_id.as_ref() == Some(session_id));
            if let Some(order) = existing {
                return Ok(PurchaseOutcome::Duplicate {
                    order_id: order.id,
                    generate: order.generation_target(),
                });
            }
        }
        Ok(state.apply(purchase))
    }

    async fn find(&self, order_id: OrderId) -> Result<Option<Order>, OrderRepositoryError> {
        Ok(self.order(order_id))
    }

    async fn find_owned(
        &self,
        order_id: OrderId,
        user_id: UserId,
    ) -> Result<Option<OrderWithVariants>, OrderRepositoryError> {
        let state = lock(&self.state);
        Ok(state
            .orders
            .get(&order_id)
            .filter(|order| order.user_id == user_id)
            .map(|order| OrderWithVariants {
                order: order.clone(),
                variants: state.variants_of(order_id),
            }))
    }

    async fn variants(&self, order_id: OrderId) -> Result<Vec<SongVariant>, OrderRepositoryError> {
        Ok(self.variants_of(order_id))
    }

    async fn claim_variant(
        &self,
        variant_id: VariantId,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool, OrderRepositoryError> {
        let mut state = lock(&self.state);
        let Some(order_id) = state
            .variants
            .get(&variant_id)
            .filter(|variant| variant.generation_status == GenerationStatus::Pending)
            .map(|variant| variant.order_id)
        else {
            return Ok(false);
        };
        let sibling_in_flight = state.variants.values().any(|variant| {
            variant.order_id == order_id
                && variant.id != variant_id
                && variant.is_in_flight(stale_before)
        });
        if sibling_in_flight {
            return Ok(false);
        }
        match state.variants.get_mut(&variant_id) {
            Some(variant) => {
                variant.generation_status = GenerationStatus::Generating;
                variant.generation_started_at = Some(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn finish_variant(
        &self,
        variant_id: VariantId,
        result: VariantResult,
        now: DateTime<Utc>,
    ) -> Result<bool, OrderRepositoryError> {
        let mut state = lock(&self.state);
        match state.variants.get_mut(&variant_id) {
            Some(variant) if variant.generation_status == GenerationStatus::Generating => {
                match result {
                    VariantResult::Complete { duration_ms } => {
                        variant.generation_status = GenerationStatus::Complete;
                        variant.duration_ms = Some(duration_ms);
                    }
                    VariantResult::Failed => variant.generation_status = GenerationStatus::Failed,
                }
                variant.completed_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_generating(&self, order_id: OrderId) -> Result<bool, OrderRepositoryError> {
        let mut state = lock(&self.state);
        match state.orders.get_mut(&order_id) {
            Some(order) if order.status == OrderStatus::Paid => {
                order.status = OrderStatus::Generating;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn settle(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<bool, OrderRepositoryError> {
        let mut state = lock(&self.state);
        match state.orders.get_mut(&order_id) {
            Some(order) if !order.status.is_terminal() => {
                order.status = status;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn select_variant(
        &self,
        order_id: OrderId,
        variant_id: VariantId,
        user_id: UserId,
    ) -> Result<SelectionOutcome, OrderRepositoryError> {
        let mut state = lock(&self.state);
        let owned = state
            .orders
            .get(&order_id)
            .is_some_and(|order| order.user_id == user_id);
        let Some(variant) = state
            .variants
            .get(&variant_id)
            .filter(|variant| owned && variant.order_id == order_id)
        else {
            return Ok(SelectionOutcome::NotFound);
        };
        if variant.generation_status != GenerationStatus::Complete {
            return Ok(SelectionOutcome::NotReady);
        }
        for other in state.variants.values_mut() {
            if other.order_id == order_id {
                other.selected = other.id == variant_id;
            }
        }
        Ok(state
            .variants
            .get(&variant_id)
            .cloned()
            .map_or(SelectionOutcome::NotFound, SelectionOutcome::Selected))
    }

    async fn find_shared(
        &self,
        token: &ShareToken,
    ) -> Result<Option<SongVariant>, OrderRepositoryError> {
        Ok(lock(&self.state)
            .variants
            .values()
            .find(|variant| {
                &variant.share_token == token
                    && variant.selected
                    && variant.generation_status == GenerationStatus::Complete
            })
            .cloned())
    }

    async fn reset_order_variants(
        &self,
        order_id: OrderId,
        owner: Option<UserId>,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<u32>, OrderRepositoryError> {
        let mut state = lock(&self.state);
        let visible = state
            .orders
            .get(&order_id)
            .is_some_and(|order| owner.is_none_or(|user_id| order.user_id == user_id));
        if !visible {
            return Ok(None);
        }
        let ids: Vec<VariantId> = state.variants_of(order_id).iter().map(|v| v.id).collect();
        let mut count = 0;
        for id in ids {
            if state.reset(id, stale_before) {
                count += 1;
            }
        }
        Ok(Some(count))
    }

    async fn reset_variant(
        &self,
        variant_id: VariantId,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<(OrderId, bool)>, OrderRepositoryError> {
        let mut state = lock(&self.state);
        let Some(order_id) = state.variants.get(&variant_id).map(|v| v.order_id) else {
            return Ok(None);
        };
        let changed = state.reset(variant_id, stale_before);
        Ok(Some((order_id, changed)))
    }
}

#[async_trait]
impl BundleRepository for InMemoryStore {
    async fn balance(&self, user_id: UserId) -> Result<u32, BundleRepositoryError> {
        Ok(lock(&self.state)
            .bundles
            .iter()
            .filter(|bundle| bundle.user_id == user_id)
            .map(|bundle| bundle.quantity_remaining)
            .sum())
    }

    async fn redeem(&self, user_id: UserId) -> Result<Option<BundleId>, BundleRepositoryError> {
        let mut state = lock(&self.state);
        let candidate = state
            .bundles
            .iter_mut()
            .filter(|bundle| bundle.user_id == user_id && bundle.quantity_remaining > 0)
            .min_by_key(|bundle| bundle.created_at);
        Ok(candidate.map(|bundle| {
            bundle.quantity_remaining -= 1;
            bundle.id
        }))
    }

    async fn restore(&self, bundle_id: BundleId) -> Result<(), BundleRepositoryError> {
        let mut state = lock(&self.state);
        if let Some(bundle) = state.bundles.iter_mut().find(|bundle| bundle.id == bundle_id) {
            bundle.quantity_remaining = (bundle.quantity_remaining + 1).min(bundle.quantity_total);
        }
        Ok(())
    }
}

#[async_trait]
impl FailedJobRepository for InMemoryStore {
    async fn record(&self, job: &NewFailedJob) -> Result<FailedJobId, FailedJobRepositoryError> {
        let id = FailedJobId::random();
        lock(&self.state).failed_jobs.push(FailedJob {
            id,
            job_type: job.job_type,
            event_data: job.event_data.clone(),
            error_message: job.error_message.clone(),
            failed_at: Utc::now(),
            resolved_at: None,
            notes: None,
        });
        Ok(id)
    }

    async fn list_open(&self) -> Result<Vec<FailedJob>, FailedJobRepositoryError> {
        let mut open: Vec<FailedJob> = lock(&self.state)
            .failed_jobs
            .iter()
            .filter(|job| job.is_open())
            .cloned()
            .collect();
        open.sort_by(|a, b| b.failed_at.cmp(&a.failed_at));
        Ok(open)
    }

    async fn find(&self, id: FailedJobId) -> Result<Option<FailedJob>, FailedJobRepositoryError> {
        Ok(lock(&self.state)
            .failed_jobs
            .iter()
            .find(|job| job.id == id)
            .cloned())
    }

    async fn resolve(
        &self,
        id: FailedJobId,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<bool, FailedJobRepositoryError> {
        let mut state = lock(&self.state);
        match state.failed_jobs.iter_mut().find(|job| job.id == id) {
            Some(job) if job.is_open() => {
                job.resolved_at = Some(now);
                job.notes = notes;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn ensure(&self, user: &User) -> Result<(), UserPersistenceError> {
        lock(&self.state).users.insert(user.id(), user.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, UserPersistenceError> {
        Ok(lock(&self.state).users.get(&id).cloned())
    }
}

#[async_trait]
impl EmailPreferencesRepository for InMemoryStore {
    async fn find(
        &self,
        user_id: UserId,
    ) -> Result<Option<EmailPreferences>, EmailPreferencesRepositoryError> {
        Ok(lock(&self.state).preferences.get(&user_id).cloned())
    }
}

/// Blob store keeping objects in a map; signed URLs use a `memory://` scheme.
#[derive(Default)]
pub struct InMemoryAudioStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryAudioStorage {
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = lock(&self.objects).keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl AudioStorage for InMemoryAudioStorage {
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<(), AudioStorageError> {
        lock(&self.objects).insert(path.to_owned(), bytes);
        Ok(())
    }

    async fn signed_url(&self, path: &str) -> Result<String, AudioStorageError> {
        Ok(format!("memory://{path}?token=signed"))
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, AudioStorageError> {
        lock(&self.objects)
            .get(path)
            .cloned()
            .ok_or_else(|| AudioStorageError::not_found(path))
    }
}

/// Generator that fails on the call numbers listed in `failures` (1-based)
/// and otherwise returns `payload`.
pub struct ScriptedAudioGenerator {
    failures: Vec<usize>,
    calls: Mutex<Vec<String>>,
    payload: Vec<u8>,
}

impl ScriptedAudioGenerator {
    pub fn succeeding() -> Self {
        Self::failing_on(Vec::new())
    }

    pub fn failing_on(failures: Vec<usize>) -> Self {
        Self {
            failures,
            calls: Mutex::new(Vec::new()),
            payload: b"fake-mp3".to_vec(),
        }
    }

    /// Prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl AudioGenerator for ScriptedAudioGenerator {
    async fn generate(&self, prompt: &str, _duration_ms: u32) -> Result<Vec<u8>, AudioGeneratorError> {
        let call = {
            let mut calls = lock(&self.calls);
            calls.push(prompt.to_owned());
            calls.len()
        };
        if self.failures.contains(&call) {
            return Err(AudioGeneratorError::rejected(500_u16, "scripted failure"));
        }
        Ok(self.payload.clone())
    }
}

/// Trigger recording every order it was asked to advance.
#[derive(Default)]
pub struct RecordingTrigger {
    triggered: Mutex<Vec<OrderId>>,
}

impl RecordingTrigger {
    pub fn triggered(&self) -> Vec<OrderId> {
        lock(&self.triggered).clone()
    }
}

#[async_trait]
impl GenerationTrigger for RecordingTrigger {
    async fn trigger(&self, order_id: OrderId) -> Result<(), JobDispatchError> {
        lock(&self.triggered).push(order_id);
        Ok(())
    }
}

/// E-mail sender keeping every message.
#[derive(Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingEmailSender {
    pub fn sent(&self) -> Vec<EmailMessage> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailSenderError> {
        lock(&self.sent).push(message.clone());
        Ok(())
    }
}

/// Identity provider resolving a fixed table of bearer tokens.
#[derive(Default)]
pub struct StaticIdentityProvider {
    tokens: Mutex<HashMap<String, User>>,
}

impl StaticIdentityProvider {
    pub fn with_user(self, token: &str, user: User) -> Self {
        self.register(token, user);
        self
    }

    /// Accept `token` as `user` from now on.
    pub fn register(&self, token: &str, user: User) {
        lock(&self.tokens).insert(token.to_owned(), user);
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn authenticate(&self, access_token: &str) -> Result<Option<User>, IdentityProviderError> {
        Ok(lock(&self.tokens).get(access_token).cloned())
    }
}

/// Payment gateway issuing fake sessions and verifying webhooks with the
/// production signature scheme.
pub struct FakePaymentGateway {
    secret: Vec<u8>,
    sessions: Mutex<Vec<(CheckoutSession, CheckoutSessionRequest)>>,
}

impl FakePaymentGateway {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            sessions: Mutex::new(Vec::new()),
        }
    }

    /// Sessions created so far with the request that created them.
    pub fn sessions(&self) -> Vec<(CheckoutSession, CheckoutSessionRequest)> {
        lock(&self.sessions).clone()
    }

    /// A `checkout.session.completed` event body for `session_id`.
    pub fn completed_event(
        event_id: &str,
        session_id: &str,
        amount_total: i64,
        metadata: &BTreeMap<String, String>,
    ) -> Vec<u8> {
        serde_json::json!({
            "id": event_id,
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": session_id,
                "amount_total": amount_total,
                "currency": "gbp",
                "metadata": metadata,
            }},
        })
        .to_string()
        .into_bytes()
    }
}

#[async_trait]
impl PaymentGateway for FakePaymentGateway {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentGatewayError> {
        let mut sessions = lock(&self.sessions);
        let id = format!("cs_test_{}", sessions.len() + 1);
        let session = CheckoutSession {
            url: format!("https://checkout.test/pay/{id}"),
            id,
        };
        sessions.push((session.clone(), request.clone()));
        Ok(session)
    }

    fn verify_event(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<PaymentEvent, PaymentGatewayError> {
        verify_signature(&self.secret, payload, signature, Utc::now().timestamp())?;
        parse_event(payload)
    }
}

/// Clock that only moves when told to.
pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn advance(&self, delta: TimeDelta) {
        *lock(&self.0) += delta;
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *lock(&self.0)
    }
}

/// Webhook signing secret shared by [`Workflow`] and its gateway.
pub const WEBHOOK_SECRET: &str = "whsec_test";
/// Internal generation secret accepted by [`Workflow::http_state`].
pub const INTERNAL_SECRET: &str = "internal-test-secret";
/// The one address on the admin allow-list of [`Workflow::http_state`].
pub const ADMIN_EMAIL: &str = "ops@example.com";
/// Public application URL used for checkout redirects and e-mails.
pub const APP_BASE_URL: &str = "https://songs.test";

/// Every service wired to in-memory adapters, the way the server wires
/// them to PostgreSQL and the HTTP providers.
pub struct Workflow {
    pub store: Arc<InMemoryStore>,
    pub storage: Arc<InMemoryAudioStorage>,
    pub generator: Arc<ScriptedAudioGenerator>,
    pub trigger: Arc<RecordingTrigger>,
    pub email: Arc<RecordingEmailSender>,
    pub gateway: Arc<FakePaymentGateway>,
    pub identity: Arc<StaticIdentityProvider>,
    pub clock: Arc<MutableClock>,
}

impl Default for Workflow {
    fn default() -> Self {
        Self::with_generator(ScriptedAudioGenerator::succeeding())
    }
}

impl Workflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_generator(generator: ScriptedAudioGenerator) -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            storage: Arc::new(InMemoryAudioStorage::default()),
            generator: Arc::new(generator),
            trigger: Arc::new(RecordingTrigger::default()),
            email: Arc::new(RecordingEmailSender::default()),
            gateway: Arc::new(FakePaymentGateway::new(WEBHOOK_SECRET)),
            identity: Arc::new(StaticIdentityProvider::default()),
            clock: Arc::new(MutableClock::new(Utc::now())),
        }
    }

    /// A fresh user reachable with `Authorization: Bearer {token}`.
    pub fn sign_in(&self, token: &str) -> User {
        let user = fixtures::user();
        self.identity.register(token, user.clone());
        user
    }

    /// An administrator reachable with `Authorization: Bearer {token}`.
    pub fn sign_in_admin(&self, token: &str) -> User {
        let user = User::new(UserId::random(), ADMIN_EMAIL).expect("admin e-mail is valid");
        self.identity.register(token, user.clone());
        user
    }

    /// Signature header for `payload`, as the processor would send it.
    pub fn sign(&self, payload: &[u8]) -> String {
        sign_payload(WEBHOOK_SECRET.as_bytes(), Utc::now().timestamp(), payload)
    }

    /// The driving ports, built from the in-memory adapters.
    pub fn ports(&self) -> HttpStatePorts {
        let app_base = Url::parse(APP_BASE_URL).expect("base URL is valid");
        let clock: Arc<dyn Clock> = self.clock.clone();
        let ledger: Arc<dyn EntitlementLedger> =
            Arc::new(EntitlementService::new(self.store.clone()));
        let payments: Arc<dyn PaymentEventCommand> = Arc::new(PaymentEventService::new(
            self.gateway.clone(),
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.trigger.clone(),
        ));
        let notifier = CompletionNotifier::new(
            self.store.clone(),
            self.store.clone(),
            self.email.clone(),
            app_base.clone(),
        );
        HttpStatePorts {
            customizations: Arc::new(CustomizationService::new(self.store.clone())),
            checkout: Arc::new(CheckoutService::new(
                self.store.clone(),
                self.store.clone(),
                ledger.clone(),
                self.gateway.clone(),
                CheckoutLinks::new(app_base),
            )),
            entitlements: ledger,
            payments: payments.clone(),
            generation: Arc::new(GenerationEngine::new(GenerationEngineDeps {
                orders: self.store.clone(),
                customizations: self.store.clone(),
                generator: self.generator.clone(),
                storage: self.storage.clone(),
                trigger: self.trigger.clone(),
                notifier: Some(notifier),
                clock: clock.clone(),
            })),
            status: Arc::new(OrderStatusService::new(
                self.store.clone(),
                self.storage.clone(),
            )),
            selection: Arc::new(VariantSelectionService::new(
                self.store.clone(),
                self.store.clone(),
            )),
            sharing: Arc::new(SharedSongService::new(
                self.store.clone(),
                self.store.clone(),
                self.storage.clone(),
            )),
            recovery: Arc::new(FailureRecoveryService::new(
                self.store.clone(),
                self.store.clone(),
                payments,
                self.trigger.clone(),
                clock,
            )),
            identity: self.identity.clone(),
            users: self.store.clone(),
        }
    }

    /// HTTP state over [`Workflow::ports`] with the test access policy.
    pub fn http_state(&self) -> HttpState {
        HttpState::new(
            self.ports(),
            AccessPolicy::new([ADMIN_EMAIL], Zeroizing::new(INTERNAL_SECRET.to_owned())),
        )
    }
}

#[cfg(test)]
#[path = "test_support_tests.rs"]
mod tests;
