/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Diesel table definitions for the three persisted tables: the
//! delivery queue, the dead-letter store, and the metrics flush
//! table.

diesel::table! {
    deliveries (id) {
        id -> Uuid,
        subscription_id -> Uuid,
        webhook_id -> Uuid,
        event -> Jsonb,
        payload -> Jsonb,
        status -> Text,
        attempts -> Int4,
        max_attempts -> Int4,
        next_visible_at -> Timestamptz,
        lease_expires_at -> Nullable<Timestamptz>,
        last_error -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    dead_letter_queue (id) {
        id -> Uuid,
        subscription_id -> Uuid,
        webhook_id -> Uuid,
        event -> Jsonb,
        payload -> Jsonb,
        failure_reason -> Text,
        last_error -> Nullable<Text>,
        attempts -> Int4,
        max_attempts -> Int4,
        failed_at -> Timestamptz,
    }
}

diesel::table! {
    metrics (id) {
        id -> Uuid,
        metric_name -> Text,
        metric_value -> Float8,
        labels -> Jsonb,
        timestamp -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(deliveries, dead_letter_queue, metrics,);
