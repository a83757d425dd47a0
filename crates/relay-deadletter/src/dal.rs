/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Data Access Layer for the `dead_letter_queue` table.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use relay_queue::ConnectionPool;
use relay_types::schema::dead_letter_queue;
use relay_types::{
    DeadLetterEntry, DeadLetterStats, FailureReasonCount, NewDeadLetterEntry, NewDelivery,
    DELIVERY_STATUS_PENDING,
};
use thiserror::Error;
use uuid::Uuid;

/// How many distinct failure reasons [`DeadLetterDAL::stats`] reports,
/// most frequent first.
const TOP_FAILURE_REASONS: usize = 5;

#[derive(Debug, Error)]
pub enum DlqError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("failed to acquire pooled connection: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("dead letter entry {0} not found")]
    NotFound(Uuid),
}

/// Data Access Layer for the dead-letter store.
pub struct DeadLetterDAL {
    pool: ConnectionPool,
}

impl DeadLetterDAL {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Records a permanently failed delivery. Reuses the originating
    /// delivery's id, so re-running a promotion is idempotent.
    pub fn add(&self, entry: &NewDeadLetterEntry) -> Result<DeadLetterEntry, DlqError> {
        let conn = &mut self.pool.get()?;
        diesel::insert_into(dead_letter_queue::table)
            .values(entry)
            .on_conflict(dead_letter_queue::id)
            .do_nothing()
            .get_result(conn)
            .or_else(|_| {
                dead_letter_queue::table
                    .filter(dead_letter_queue::id.eq(entry.id))
                    .first(conn)
            })
            .map_err(DlqError::from)
    }

    pub fn get(&self, id: Uuid) -> Result<Option<DeadLetterEntry>, DlqError> {
        let conn = &mut self.pool.get()?;
        dead_letter_queue::table
            .filter(dead_letter_queue::id.eq(id))
            .first(conn)
            .optional()
            .map_err(DlqError::from)
    }

    /// Lists entries, most recently failed first, optionally scoped to
    /// one webhook endpoint. `offset` pages past earlier windows so a
    /// caller can walk the full store instead of only ever seeing the
    /// first `limit` rows.
    pub fn list(&self, webhook_id: Option<Uuid>, limit: i64, offset: i64) -> Result<Vec<DeadLetterEntry>, DlqError> {
        let conn = &mut self.pool.get()?;
        let mut query = dead_letter_queue::table.into_boxed();
        if let Some(webhook_id) = webhook_id {
            query = query.filter(dead_letter_queue::webhook_id.eq(webhook_id));
        }
        query
            .order(dead_letter_queue::failed_at.desc())
            .limit(limit)
            .offset(offset)
            .load(conn)
            .map_err(DlqError::from)
    }

    /// Aggregate stats for the admin surface: total, last-24h,
    /// last-7d, and the top `TOP_FAILURE_REASONS` failure reasons by
    /// count.
    pub fn stats(&self) -> Result<DeadLetterStats, DlqError> {
        let conn = &mut self.pool.get()?;
        let entries: Vec<DeadLetterEntry> = dead_letter_queue::table.load(conn)?;

        let now = Utc::now();
        let mut by_webhook: BTreeMap<Uuid, i64> = BTreeMap::new();
        let mut by_reason: BTreeMap<String, i64> = BTreeMap::new();
        let mut last_24h = 0;
        let mut last_7d = 0;
        let mut oldest_failed_at = None;
        let mut newest_failed_at = None;

        for entry in &entries {
            *by_webhook.entry(entry.webhook_id).or_insert(0) += 1;
            *by_reason.entry(entry.failure_reason.clone()).or_insert(0) += 1;

            if now - entry.failed_at <= Duration::hours(24) {
                last_24h += 1;
            }
            if now - entry.failed_at <= Duration::days(7) {
                last_7d += 1;
            }

            oldest_failed_at = Some(match oldest_failed_at {
                Some(oldest) if oldest <= entry.failed_at => oldest,
                _ => entry.failed_at,
            });
            newest_failed_at = Some(match newest_failed_at {
                Some(newest) if newest >= entry.failed_at => newest,
                _ => entry.failed_at,
            });
        }

        let mut top_failure_reasons: Vec<FailureReasonCount> = by_reason
            .into_iter()
            .map(|(reason, count)| FailureReasonCount { reason, count })
            .collect();
        top_failure_reasons.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.reason.cmp(&b.reason)));
        top_failure_reasons.truncate(TOP_FAILURE_REASONS);

        Ok(DeadLetterStats {
            total_entries: entries.len() as i64,
            last_24h,
            last_7d,
            by_webhook,
            top_failure_reasons,
            oldest_failed_at,
            newest_failed_at,
        })
    }

    /// Replays a dead-lettered entry back into the delivery queue:
    /// atomically removes the entry and returns a fresh
    /// [`NewDelivery`] with `attempts` reset to `0` and status
    /// `pending`. Returns `Ok(None)` if no entry exists under
    /// `delivery_id`.
    pub fn retry(&self, delivery_id: Uuid) -> Result<Option<NewDelivery>, DlqError> {
        let conn = &mut self.pool.get()?;
        conn.transaction(|conn| {
            let entry: Option<DeadLetterEntry> = dead_letter_queue::table
                .filter(dead_letter_queue::id.eq(delivery_id))
                .first(conn)
                .optional()?;
            let Some(entry) = entry else { return Ok(None) };

            diesel::delete(dead_letter_queue::table.filter(dead_letter_queue::id.eq(delivery_id)))
                .execute(conn)?;

            Ok(Some(NewDelivery {
                id: entry.id,
                subscription_id: entry.subscription_id,
                webhook_id: entry.webhook_id,
                event: entry.event,
                payload: entry.payload,
                status: DELIVERY_STATUS_PENDING.to_string(),
                attempts: 0,
                max_attempts: entry.max_attempts,
                next_visible_at: Utc::now(),
                lease_expires_at: None,
                last_error: None,
                created_at: Utc::now(),
            }))
        })
        .map_err(DlqError::from)
    }

    /// Removes an entry without replaying it, for the admin purge
    /// route.
    pub fn remove(&self, id: Uuid) -> Result<(), DlqError> {
        let conn = &mut self.pool.get()?;
        let deleted = diesel::delete(dead_letter_queue::table.filter(dead_letter_queue::id.eq(id)))
            .execute(conn)?;
        if deleted == 0 {
            return Err(DlqError::NotFound(id));
        }
        Ok(())
    }

    /// Deletes entries older than `retention_days`. Returns the number
    /// of rows removed.
    pub fn cleanup_older_than(&self, retention_days: i64) -> Result<usize, DlqError> {
        let conn = &mut self.pool.get()?;
        let cutoff: DateTime<Utc> = Utc::now() - Duration::days(retention_days);
        diesel::delete(dead_letter_queue::table.filter(dead_letter_queue::failed_at.lt(cutoff)))
            .execute(conn)
            .map_err(DlqError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_default_shape() {
        let stats = DeadLetterStats {
            total_entries: 0,
            last_24h: 0,
            last_7d: 0,
            by_webhook: BTreeMap::new(),
            top_failure_reasons: Vec::new(),
            oldest_failed_at: None,
            newest_failed_at: None,
        };
        assert_eq!(stats.total_entries, 0);
        assert!(stats.by_webhook.is_empty());
        assert!(stats.top_failure_reasons.is_empty());
    }
}
