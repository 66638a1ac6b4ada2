//! Transactional write of a paid (or credit/free) purchase.
//!
//! The order row and every side effect of its type are written in one
//! transaction. Preconditions on an original order are checked under a row
//! lock so concurrent tweaks and upsells on the same order serialise.
//! `orders.payment_session_id` is unique: a redelivered webhook finds the
//! existing row up front, and a concurrent delivery that loses the insert
//! race re-reads the winner instead of failing.

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::domain::order::{INITIAL_VARIANTS, MAX_TWEAK_COUNT, MAX_VARIANTS_PER_ORDER};
use crate::domain::{
    BundleId, CustomizationId, NewVariant, Order, OrderId, OrderStatus, Purchase, PurchaseKind,
    PurchaseOutcome, PurchaseRejection, TweakAmendment,
};

use super::models::{
    NewBundleRow, NewCustomizationTweakRow, NewOrderRow, NewSongVariantRow, OrderRow,
};
use super::schema::{bundles, customization_tweaks, customizations, orders, song_variants};

/// Failure inside a purchase transaction.
#[derive(Debug)]
pub(super) enum PurchaseTxError {
    Diesel(diesel::result::Error),
    Decode(String),
}

impl From<diesel::result::Error> for PurchaseTxError {
    fn from(error: diesel::result::Error) -> Self {
        Self::Diesel(error)
    }
}

/// Columns of the new order that depend on the purchase type.
#[derive(Debug, Default)]
struct OrderLinks {
    customization_id: Option<CustomizationId>,
    parent_order_id: Option<OrderId>,
    tweak_count: u8,
    occasion_date: Option<chrono::NaiveDate>,
}

/// Writes that follow the order insert.
enum Effect<'a> {
    InitialVariants,
    Tweak {
        original_id: OrderId,
        customization_id: CustomizationId,
        amendment: &'a TweakAmendment,
    },
    Upsell {
        original_id: OrderId,
        variant_number: u8,
        reopen: bool,
    },
    Bundle {
        tier_id: &'a str,
        quantity: u32,
    },
}

struct Plan<'a> {
    links: OrderLinks,
    effect: Effect<'a>,
}

pub(super) async fn write_purchase(
    conn: &mut AsyncPgConnection,
    purchase: &Purchase,
) -> Result<PurchaseOutcome, PurchaseTxError> {
    if let Some(existing) = find_by_session(conn, purchase).await? {
        return Ok(duplicate(&existing));
    }

    let plan = match plan(conn, purchase).await? {
        Ok(plan) => plan,
        Err(rejection) => return Ok(PurchaseOutcome::Rejected(rejection)),
    };

    let order_id = OrderId::random();
    if !insert_order(conn, purchase, order_id, &plan.links).await? {
        let existing = find_by_session(conn, purchase).await?.ok_or_else(|| {
            PurchaseTxError::Decode("payment session conflicted but no order was found".into())
        })?;
        return Ok(duplicate(&existing));
    }

    let generate = apply(conn, purchase, order_id, plan).await?;
    Ok(PurchaseOutcome::Created { order_id, generate })
}

fn duplicate(order: &Order) -> PurchaseOutcome {
    PurchaseOutcome::Duplicate {
        order_id: order.id,
        generate: order.generation_target(),
    }
}

async fn find_by_session(
    conn: &mut AsyncPgConnection,
    purchase: &Purchase,
) -> Result<Option<Order>, PurchaseTxError> {
    let Some(session_id) = purchase.payment_session_id.as_deref() else {
        return Ok(None);
    };
    let row: Option<OrderRow> = orders::table
        .filter(orders::payment_session_id.eq(session_id))
        .select(OrderRow::as_select())
        .first(conn)
        .await
        .optional()?;
    row.map(OrderRow::into_domain)
        .transpose()
        .map_err(PurchaseTxError::Decode)
}

/// The caller's order of a type that carries variants, locked for update.
async fn lock_original(
    conn: &mut AsyncPgConnection,
    purchase: &Purchase,
    order_id: OrderId,
) -> Result<Option<Order>, PurchaseTxError> {
    let row: Option<OrderRow> = orders::table
        .filter(orders::id.eq(order_id.as_uuid()))
        .filter(orders::user_id.eq(purchase.user_id.as_uuid()))
        .for_update()
        .select(OrderRow::as_select())
        .first(conn)
        .await
        .optional()?;
    let order = row
        .map(OrderRow::into_domain)
        .transpose()
        .map_err(PurchaseTxError::Decode)?;
    Ok(order.filter(|order| order.order_type.has_variants()))
}

async fn plan<'a>(
    conn: &mut AsyncPgConnection,
    purchase: &'a Purchase,
) -> Result<Result<Plan<'a>, PurchaseRejection>, PurchaseTxError> {
    let plan = match &purchase.kind {
        PurchaseKind::Base {
            customization_id,
            occasion_date,
        } => {
            let owned: i64 = customizations::table
                .filter(customizations::id.eq(customization_id.as_uuid()))
                .filter(customizations::user_id.eq(purchase.user_id.as_uuid()))
                .count()
                .get_result(conn)
                .await?;
            if owned == 0 {
                return Ok(Err(PurchaseRejection::CustomizationNotFound));
            }
            Plan {
                links: OrderLinks {
                    customization_id: Some(*customization_id),
                    occasion_date: *occasion_date,
                    ..OrderLinks::default()
                },
                effect: Effect::InitialVariants,
            }
        }
        PurchaseKind::Tweak {
            original_order_id,
            amendment,
            free,
        } => {
            let Some(original) = lock_original(conn, purchase, *original_order_id).await? else {
                return Ok(Err(PurchaseRejection::OriginalOrderNotFound));
            };
            let Some(customization_id) = original.customization_id else {
                return Ok(Err(PurchaseRejection::OriginalOrderNotFound));
            };
            let allowed = if *free {
                original.tweak_count == 0
            } else {
                original.tweak_count >= 1
            };
            if !allowed {
                return Ok(Err(PurchaseRejection::TweakUnavailable));
            }
            Plan {
                links: OrderLinks {
                    customization_id: Some(customization_id),
                    parent_order_id: Some(original.id),
                    tweak_count: if *free { 1 } else { MAX_TWEAK_COUNT },
                    occasion_date: original.occasion_date,
                },
                effect: Effect::Tweak {
                    original_id: original.id,
                    customization_id,
                    amendment,
                },
            }
        }
        PurchaseKind::Upsell { original_order_id } => {
            let Some(original) = lock_original(conn, purchase, *original_order_id).await? else {
                return Ok(Err(PurchaseRejection::OriginalOrderNotFound));
            };
            let existing: i64 = song_variants::table
                .filter(song_variants::order_id.eq(original.id.as_uuid()))
                .count()
                .get_result(conn)
                .await?;
            if existing >= i64::from(MAX_VARIANTS_PER_ORDER) {
                return Ok(Err(PurchaseRejection::VariantLimitReached));
            }
            Plan {
                links: OrderLinks {
                    customization_id: original.customization_id,
                    parent_order_id: Some(original.id),
                    ..OrderLinks::default()
                },
                effect: Effect::Upsell {
                    original_id: original.id,
                    variant_number: u8::try_from(existing + 1).unwrap_or(MAX_VARIANTS_PER_ORDER),
                    reopen: original.status.is_terminal(),
                },
            }
        }
        PurchaseKind::Bundle { tier_id, quantity } => Plan {
            links: OrderLinks::default(),
            effect: Effect::Bundle {
                tier_id,
                quantity: *quantity,
            },
        },
    };
    Ok(Ok(plan))
}

/// Insert the order row. Returns `false` when another transaction already
/// recorded the same payment session.
async fn insert_order(
    conn: &mut AsyncPgConnection,
    purchase: &Purchase,
    order_id: OrderId,
    links: &OrderLinks,
) -> Result<bool, PurchaseTxError> {
    let row = NewOrderRow {
        id: *order_id.as_uuid(),
        user_id: *purchase.user_id.as_uuid(),
        customization_id: links.customization_id.map(|id| *id.as_uuid()),
        payment_session_id: purchase.payment_session_id.as_deref(),
        amount_minor: purchase.amount_minor,
        currency: &purchase.currency,
        order_type: purchase.kind.order_type().as_str(),
        status: OrderStatus::Paid.as_str(),
        payment_method: purchase.payment_method.as_str(),
        tweak_count: i16::from(links.tweak_count),
        parent_order_id: links.parent_order_id.map(|id| *id.as_uuid()),
        occasion_date: links.occasion_date,
    };
    let inserted = diesel::insert_into(orders::table)
        .values(&row)
        .on_conflict(orders::payment_session_id)
        .do_nothing()
        .execute(conn)
        .await?;
    Ok(inserted == 1)
}

async fn insert_variants(
    conn: &mut AsyncPgConnection,
    variants: &[NewVariant],
) -> Result<(), PurchaseTxError> {
    let rows: Vec<NewSongVariantRow<'_>> = variants.iter().map(NewSongVariantRow::from).collect();
    diesel::insert_into(song_variants::table)
        .values(&rows)
        .execute(conn)
        .await?;
    Ok(())
}

/// Write the side effects of `plan` and return the order to generate.
async fn apply(
    conn: &mut AsyncPgConnection,
    purchase: &Purchase,
    order_id: OrderId,
    plan: Plan<'_>,
) -> Result<Option<OrderId>, PurchaseTxError> {
    let user_id = purchase.user_id;
    match plan.effect {
        Effect::InitialVariants => {
            insert_variants(conn, &NewVariant::batch(order_id, user_id, INITIAL_VARIANTS)).await?;
            Ok(Some(order_id))
        }
        Effect::Tweak {
            original_id,
            customization_id,
            amendment,
        } => {
            diesel::update(orders::table.filter(orders::id.eq(original_id.as_uuid())))
                .set(orders::tweak_count.eq(i16::from(plan.links.tweak_count)))
                .execute(conn)
                .await?;
            diesel::insert_into(customization_tweaks::table)
                .values(&NewCustomizationTweakRow {
                    id: uuid::Uuid::new_v4(),
                    customization_id: *customization_id.as_uuid(),
                    order_id: *order_id.as_uuid(),
                    special_memories: amendment.special_memories.as_deref(),
                    things_to_avoid: amendment.things_to_avoid.as_deref(),
                    pronunciation: amendment.pronunciation.as_deref(),
                })
                .execute(conn)
                .await?;
            insert_variants(conn, &NewVariant::batch(order_id, user_id, INITIAL_VARIANTS)).await?;
            Ok(Some(order_id))
        }
        Effect::Upsell {
            original_id,
            variant_number,
            reopen,
        } => {
            insert_variants(
                conn,
                &[NewVariant::for_order(original_id, user_id, variant_number)],
            )
            .await?;
            if reopen {
                diesel::update(orders::table.filter(orders::id.eq(original_id.as_uuid())))
                    .set(orders::status.eq(OrderStatus::Paid.as_str()))
                    .execute(conn)
                    .await?;
            }
            Ok(Some(original_id))
        }
        Effect::Bundle { tier_id, quantity } => {
            let quantity = i32::try_from(quantity)
                .map_err(|_| PurchaseTxError::Decode(format!("bundle quantity {quantity}")))?;
            diesel::insert_into(bundles::table)
                .values(&NewBundleRow {
                    id: *BundleId::random().as_uuid(),
                    user_id: *user_id.as_uuid(),
                    order_id: *order_id.as_uuid(),
                    tier_id,
                    quantity_total: quantity,
                    quantity_remaining: quantity,
                })
                .execute(conn)
                .await?;
            Ok(None)
        }
    }
}
