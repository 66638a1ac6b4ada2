//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match `migrations/` exactly. Regenerate with
//! `diesel print-schema` after changing a migration.

diesel::table! {
    /// Users mirrored from the identity provider on first authenticated
    /// request.
    users (id) {
        id -> Uuid,
        email -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Song briefs.
    customizations (id) {
        id -> Uuid,
        user_id -> Uuid,
        recipient_name -> Text,
        author_name -> Text,
        occasion -> Text,
        /// One of 60, 90 or 120.
        length_seconds -> Int4,
        moods -> Array<Text>,
        genre -> Text,
        special_memories -> Nullable<Text>,
        things_to_avoid -> Nullable<Text>,
        pronunciation -> Nullable<Text>,
        occasion_date -> Nullable<Date>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Free-text amendments recorded by tweak purchases. The newest row
    /// overrides the brief's free text at prompt time.
    customization_tweaks (id) {
        id -> Uuid,
        customization_id -> Uuid,
        order_id -> Uuid,
        special_memories -> Nullable<Text>,
        things_to_avoid -> Nullable<Text>,
        pronunciation -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Purchases. `payment_session_id` is unique, which is what makes
    /// webhook redelivery idempotent.
    orders (id) {
        id -> Uuid,
        user_id -> Uuid,
        customization_id -> Nullable<Uuid>,
        payment_session_id -> Nullable<Text>,
        amount_minor -> Int8,
        currency -> Text,
        order_type -> Text,
        status -> Text,
        payment_method -> Text,
        tweak_count -> Int2,
        parent_order_id -> Nullable<Uuid>,
        occasion_date -> Nullable<Date>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Rendered (or pending) candidate songs. At most one row per order has
    /// `selected = true`, enforced by a partial unique index.
    song_variants (id) {
        id -> Uuid,
        user_id -> Uuid,
        order_id -> Uuid,
        variant_number -> Int2,
        generation_status -> Text,
        storage_path -> Text,
        duration_ms -> Nullable<Int4>,
        selected -> Bool,
        share_token -> Text,
        generation_started_at -> Nullable<Timestamptz>,
        completed_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Prepaid credit packs. `quantity_remaining` never drops below zero.
    bundles (id) {
        id -> Uuid,
        user_id -> Uuid,
        order_id -> Uuid,
        tier_id -> Text,
        quantity_total -> Int4,
        quantity_remaining -> Int4,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    failed_jobs (id) {
        id -> Uuid,
        job_type -> Text,
        event_data -> Jsonb,
        error_message -> Text,
        failed_at -> Timestamptz,
        resolved_at -> Nullable<Timestamptz>,
        notes -> Nullable<Text>,
    }
}

diesel::table! {
    email_preferences (user_id) {
        user_id -> Uuid,
        reminders_opted_out -> Bool,
        opted_out_order_ids -> Array<Uuid>,
        unsubscribe_token -> Text,
    }
}

diesel::joinable!(customizations -> users (user_id));
diesel::joinable!(customization_tweaks -> customizations (customization_id));
diesel::joinable!(orders -> users (user_id));
diesel::joinable!(song_variants -> orders (order_id));
diesel::joinable!(bundles -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    customizations,
    customization_tweaks,
    orders,
    song_variants,
    bundles,
    failed_jobs,
    email_preferences,
);
