//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain. Conversions into domain types live next
//! to the rows and report undecodable columns as plain messages; each
//! repository wraps them in its own query error.

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::{
    Customization, CustomizationBrief, CustomizationId, EmailPreferences, FailedJob,
    FailedJobId, FailedJobType, Genre, GenerationStatus, Mood, NewVariant, Occasion, Order,
    OrderId, OrderStatus, OrderType, PaymentMethod, ShareToken, SongLength, SongVariant,
    TweakAmendment, User, UserId, VariantId,
};

use super::schema::{
    bundles, customization_tweaks, customizations, email_preferences, failed_jobs, orders,
    song_variants, users,
};

fn parse_column<T>(column: &str, raw: &str) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|err: T::Err| format!("column {column}: {err}"))
}

fn narrow<T, U>(column: &str, value: T) -> Result<U, String>
where
    U: TryFrom<T>,
    T: Copy + std::fmt::Display,
{
    U::try_from(value).map_err(|_| format!("column {column}: {value} out of range"))
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserRow {
    pub id: Uuid,
    pub email: String,
}

impl UserRow {
    pub(crate) fn into_domain(self) -> Result<User, String> {
        User::new(UserId::from_uuid(self.id), &self.email).map_err(|err| err.to_string())
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub(crate) struct NewUserRow<'a> {
    pub id: Uuid,
    pub email: &'a str,
}

// ---------------------------------------------------------------------------
// Customizations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = customizations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct CustomizationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub recipient_name: String,
    pub author_name: String,
    pub occasion: String,
    pub length_seconds: i32,
    pub moods: Vec<String>,
    pub genre: String,
    pub special_memories: Option<String>,
    pub things_to_avoid: Option<String>,
    pub pronunciation: Option<String>,
    pub occasion_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl CustomizationRow {
    /// Rows are written from validated briefs, so decoding only fails on
    /// manual edits to the table.
    pub(crate) fn into_domain(
        self,
        latest_tweak: Option<TweakAmendment>,
    ) -> Result<Customization, String> {
        let seconds: u32 = narrow("length_seconds", self.length_seconds)?;
        let length = SongLength::try_from(seconds).map_err(|err| err.to_string())?;
        let moods = self
            .moods
            .iter()
            .map(|mood| parse_column::<Mood>("moods", mood))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Customization {
            id: CustomizationId::from_uuid(self.id),
            user_id: UserId::from_uuid(self.user_id),
            brief: CustomizationBrief {
                recipient_name: self.recipient_name,
                author_name: self.author_name,
                occasion: parse_column::<Occasion>("occasion", &self.occasion)?,
                length,
                moods,
                genre: parse_column::<Genre>("genre", &self.genre)?,
                special_memories: self.special_memories,
                things_to_avoid: self.things_to_avoid,
                pronunciation: self.pronunciation,
                occasion_date: self.occasion_date,
            },
            latest_tweak,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = customizations)]
pub(crate) struct NewCustomizationRow<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub recipient_name: &'a str,
    pub author_name: &'a str,
    pub occasion: &'static str,
    pub length_seconds: i32,
    pub moods: Vec<String>,
    pub genre: &'static str,
    pub special_memories: Option<&'a str>,
    pub things_to_avoid: Option<&'a str>,
    pub pronunciation: Option<&'a str>,
    pub occasion_date: Option<NaiveDate>,
}

impl<'a> NewCustomizationRow<'a> {
    pub(crate) fn from_brief(
        id: CustomizationId,
        user_id: UserId,
        brief: &'a CustomizationBrief,
    ) -> Self {
        Self {
            id: *id.as_uuid(),
            user_id: *user_id.as_uuid(),
            recipient_name: &brief.recipient_name,
            author_name: &brief.author_name,
            occasion: brief.occasion.as_str(),
            // 60, 90 and 120 always fit.
            length_seconds: i32::try_from(brief.length.seconds()).unwrap_or(i32::MAX),
            moods: brief.moods.iter().map(|mood| mood.as_str().to_owned()).collect(),
            genre: brief.genre.as_str(),
            special_memories: brief.special_memories.as_deref(),
            things_to_avoid: brief.things_to_avoid.as_deref(),
            pronunciation: brief.pronunciation.as_deref(),
            occasion_date: brief.occasion_date,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = customization_tweaks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct CustomizationTweakRow {
    pub special_memories: Option<String>,
    pub things_to_avoid: Option<String>,
    pub pronunciation: Option<String>,
}

impl From<CustomizationTweakRow> for TweakAmendment {
    fn from(row: CustomizationTweakRow) -> Self {
        Self {
            special_memories: row.special_memories,
            things_to_avoid: row.things_to_avoid,
            pronunciation: row.pronunciation,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = customization_tweaks)]
pub(crate) struct NewCustomizationTweakRow<'a> {
    pub id: Uuid,
    pub customization_id: Uuid,
    pub order_id: Uuid,
    pub special_memories: Option<&'a str>,
    pub things_to_avoid: Option<&'a str>,
    pub pronunciation: Option<&'a str>,
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct OrderRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub customization_id: Option<Uuid>,
    pub payment_session_id: Option<String>,
    pub amount_minor: i64,
    pub currency: String,
    pub order_type: String,
    pub status: String,
    pub payment_method: String,
    pub tweak_count: i16,
    pub parent_order_id: Option<Uuid>,
    pub occasion_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl OrderRow {
    pub(crate) fn into_domain(self) -> Result<Order, String> {
        Ok(Order {
            id: OrderId::from_uuid(self.id),
            user_id: UserId::from_uuid(self.user_id),
            customization_id: self.customization_id.map(CustomizationId::from_uuid),
            payment_session_id: self.payment_session_id,
            amount_minor: self.amount_minor,
            currency: self.currency,
            order_type: parse_column::<OrderType>("order_type", &self.order_type)?,
            status: parse_column::<OrderStatus>("status", &self.status)?,
            payment_method: parse_column::<PaymentMethod>("payment_method", &self.payment_method)?,
            tweak_count: narrow("tweak_count", self.tweak_count)?,
            parent_order_id: self.parent_order_id.map(OrderId::from_uuid),
            occasion_date: self.occasion_date,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = orders)]
pub(crate) struct NewOrderRow<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub customization_id: Option<Uuid>,
    pub payment_session_id: Option<&'a str>,
    pub amount_minor: i64,
    pub currency: &'a str,
    pub order_type: &'static str,
    pub status: &'static str,
    pub payment_method: &'static str,
    pub tweak_count: i16,
    pub parent_order_id: Option<Uuid>,
    pub occasion_date: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Song variants
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = song_variants)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct SongVariantRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_id: Uuid,
    pub variant_number: i16,
    pub generation_status: String,
    pub storage_path: String,
    pub duration_ms: Option<i32>,
    pub selected: bool,
    pub share_token: String,
    pub generation_started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SongVariantRow {
    pub(crate) fn into_domain(self) -> Result<SongVariant, String> {
        let duration_ms = self
            .duration_ms
            .map(|value| narrow("duration_ms", value))
            .transpose()?;
        Ok(SongVariant {
            id: VariantId::from_uuid(self.id),
            user_id: UserId::from_uuid(self.user_id),
            order_id: OrderId::from_uuid(self.order_id),
            variant_number: narrow("variant_number", self.variant_number)?,
            generation_status: parse_column::<GenerationStatus>(
                "generation_status",
                &self.generation_status,
            )?,
            storage_path: self.storage_path,
            duration_ms,
            selected: self.selected,
            share_token: ShareToken::from_stored(self.share_token),
            generation_started_at: self.generation_started_at,
            completed_at: self.completed_at,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = song_variants)]
pub(crate) struct NewSongVariantRow<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_id: Uuid,
    pub variant_number: i16,
    pub generation_status: &'static str,
    pub storage_path: &'a str,
    pub share_token: &'a str,
}

impl<'a> From<&'a NewVariant> for NewSongVariantRow<'a> {
    fn from(variant: &'a NewVariant) -> Self {
        Self {
            id: *variant.id.as_uuid(),
            user_id: *variant.user_id.as_uuid(),
            order_id: *variant.order_id.as_uuid(),
            variant_number: i16::from(variant.variant_number),
            generation_status: GenerationStatus::Pending.as_str(),
            storage_path: &variant.storage_path,
            share_token: variant.share_token.as_str(),
        }
    }
}

// ---------------------------------------------------------------------------
// Bundles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = bundles)]
pub(crate) struct NewBundleRow<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_id: Uuid,
    pub tier_id: &'a str,
    pub quantity_total: i32,
    pub quantity_remaining: i32,
}

// ---------------------------------------------------------------------------
// Failed jobs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = failed_jobs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct FailedJobRow {
    pub id: Uuid,
    pub job_type: String,
    pub event_data: serde_json::Value,
    pub error_message: String,
    pub failed_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl FailedJobRow {
    pub(crate) fn into_domain(self) -> Result<FailedJob, String> {
        Ok(FailedJob {
            id: FailedJobId::from_uuid(self.id),
            job_type: parse_column::<FailedJobType>("job_type", &self.job_type)?,
            event_data: self.event_data,
            error_message: self.error_message,
            failed_at: self.failed_at,
            resolved_at: self.resolved_at,
            notes: self.notes,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = failed_jobs)]
pub(crate) struct NewFailedJobRow<'a> {
    pub id: Uuid,
    pub job_type: &'static str,
    pub event_data: &'a serde_json::Value,
    pub error_message: &'a str,
}

// ---------------------------------------------------------------------------
// Email preferences
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = email_preferences)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct EmailPreferencesRow {
    pub user_id: Uuid,
    pub reminders_opted_out: bool,
    pub opted_out_order_ids: Vec<Uuid>,
    pub unsubscribe_token: String,
}

impl From<EmailPreferencesRow> for EmailPreferences {
    fn from(row: EmailPreferencesRow) -> Self {
        Self {
            user_id: UserId::from_uuid(row.user_id),
            reminders_opted_out: row.reminders_opted_out,
            opted_out_order_ids: row
                .opted_out_order_ids
                .into_iter()
                .map(OrderId::from_uuid)
                .collect(),
            unsubscribe_token: row.unsubscribe_token,
        }
    }
}
