/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! Data Access Layer for the `deliveries` table.
//!
//! ## Lifecycle
//!
//! 1. `enqueue`: a formatted delivery is inserted `pending`.
//! 2. `lease`: a worker claims up to `max` visible rows, atomically
//!    moving them to `processing` and extending a lease deadline. Two
//!    workers never hold the same row — the claiming `SELECT` takes
//!    `FOR UPDATE SKIP LOCKED` inside the same transaction as the
//!    `UPDATE`.
//! 3. `complete` / `fail` / `schedule_retry` / `promote_to_dead`: the
//!    lease holder resolves the row. A lease that is never resolved
//!    expires and `reap_expired_leases` returns it to `pending`.

use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Text, Timestamptz, Uuid as SqlUuid};
use relay_types::schema::deliveries;
use relay_types::{
    Delivery, NewDelivery, DELIVERY_STATUS_DEAD, DELIVERY_STATUS_PENDING,
    DELIVERY_STATUS_PROCESSING,
};
use thiserror::Error;
use uuid::Uuid;

use crate::db::ConnectionPool;

/// Lease duration: a leased row becomes re-visible if its worker does
/// not resolve it within this window.
const DEFAULT_LEASE_TTL_SECONDS: i64 = 60;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("failed to acquire pooled connection: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("delivery {0} has no live lease")]
    NoLease(Uuid),
}

/// Pending / processing / completed / failed counts plus the
/// configured concurrency, for the admin stats surface.
#[derive(Debug, Clone, Default, QueryableByName)]
pub struct QueueStats {
    #[diesel(sql_type = BigInt)]
    pub pending: i64,
    #[diesel(sql_type = BigInt)]
    pub processing: i64,
    #[diesel(sql_type = BigInt)]
    pub completed: i64,
    #[diesel(sql_type = BigInt)]
    pub failed: i64,
    #[diesel(sql_type = BigInt)]
    pub dead: i64,
}

#[derive(QueryableByName)]
struct IdRow {
    #[diesel(sql_type = SqlUuid)]
    id: Uuid,
}

/// Data Access Layer for the durable delivery queue.
pub struct DeliveriesDAL {
    pool: ConnectionPool,
}

impl DeliveriesDAL {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Inserts `delivery` as `pending`. Idempotent by `id`: a second
    /// `enqueue` of the same `delivery_id` is a silent no-op, matching
    /// the Delivery Queue's idempotent-enqueue invariant.
    pub fn enqueue(&self, delivery: &NewDelivery) -> Result<(), QueueError> {
        let conn = &mut self.pool.get()?;
        diesel::insert_into(deliveries::table)
            .values(delivery)
            .on_conflict(deliveries::id)
            .do_nothing()
            .execute(conn)?;
        Ok(())
    }

    /// Leases up to `max` currently-visible pending deliveries,
    /// atomically transitioning them to `processing` and extending
    /// their lease deadline. No other call to `lease` (concurrent or
    /// not) can return a row already leased here, by construction of
    /// the `FOR UPDATE SKIP LOCKED` claim.
    pub fn lease(&self, max: i64) -> Result<Vec<Delivery>, QueueError> {
        let conn = &mut self.pool.get()?;
        let now = Utc::now();
        let lease_expires_at = now + Duration::seconds(DEFAULT_LEASE_TTL_SECONDS);

        conn.transaction(|conn| {
            let claimable: Vec<IdRow> = diesel::sql_query(
                "SELECT id FROM deliveries \
                 WHERE status = $1 AND next_visible_at <= $2 \
                 ORDER BY next_visible_at ASC \
                 LIMIT $3 \
                 FOR UPDATE SKIP LOCKED",
            )
            .bind::<Text, _>(DELIVERY_STATUS_PENDING)
            .bind::<Timestamptz, _>(now)
            .bind::<BigInt, _>(max)
            .load(conn)?;

            if claimable.is_empty() {
                return Ok(vec![]);
            }

            let ids: Vec<Uuid> = claimable.into_iter().map(|row| row.id).collect();

            diesel::update(deliveries::table.filter(deliveries::id.eq_any(&ids)))
                .set((
                    deliveries::status.eq(DELIVERY_STATUS_PROCESSING),
                    deliveries::lease_expires_at.eq(Some(lease_expires_at)),
                ))
                .get_results(conn)
        })
        .map_err(QueueError::from)
    }

    /// Marks a leased delivery `completed`. Fails with [`QueueError::NoLease`]
    /// if the row is not currently `processing` under `delivery_id`'s lease.
    pub fn complete(&self, delivery_id: Uuid) -> Result<(), QueueError> {
        let conn = &mut self.pool.get()?;
        let updated = diesel::update(
            deliveries::table
                .filter(deliveries::id.eq(delivery_id))
                .filter(deliveries::status.eq(DELIVERY_STATUS_PROCESSING)),
        )
        .set((
            deliveries::status.eq(relay_types::DELIVERY_STATUS_COMPLETED),
            deliveries::lease_expires_at.eq(None::<DateTime<Utc>>),
            deliveries::last_error.eq(None::<String>),
        ))
        .execute(conn)?;

        if updated == 0 {
            return Err(QueueError::NoLease(delivery_id));
        }
        Ok(())
    }

    /// Records a transient failure without scheduling a retry (used
    /// when the Processor will immediately call `schedule_retry` or
    /// `promote_to_dead` in the same tick); kept as a distinct verb for
    /// callers that only need to bump `attempts` and `last_error`.
    pub fn fail(&self, delivery_id: Uuid, err: &str) -> Result<Delivery, QueueError> {
        let conn = &mut self.pool.get()?;
        let updated = diesel::update(
            deliveries::table
                .filter(deliveries::id.eq(delivery_id))
                .filter(deliveries::status.eq(DELIVERY_STATUS_PROCESSING)),
        )
        .set((
            deliveries::attempts.eq(deliveries::attempts + 1),
            deliveries::last_error.eq(err),
        ))
        .get_result::<Delivery>(conn)
        .optional()?;

        updated.ok_or(QueueError::NoLease(delivery_id))
    }

    /// Schedules a retry: returns the lease holder's row to `pending`,
    /// visible again at `when`.
    pub fn schedule_retry(
        &self,
        delivery_id: Uuid,
        when: DateTime<Utc>,
        err: &str,
    ) -> Result<(), QueueError> {
        let conn = &mut self.pool.get()?;
        let updated = diesel::update(
            deliveries::table
                .filter(deliveries::id.eq(delivery_id))
                .filter(deliveries::status.eq(DELIVERY_STATUS_PROCESSING)),
        )
        .set((
            deliveries::status.eq(DELIVERY_STATUS_PENDING),
            deliveries::next_visible_at.eq(when),
            deliveries::lease_expires_at.eq(None::<DateTime<Utc>>),
            deliveries::last_error.eq(err),
        ))
        .execute(conn)?;

        if updated == 0 {
            return Err(QueueError::NoLease(delivery_id));
        }
        Ok(())
    }

    /// Promotes a leased delivery to `dead`, bumping `attempts` for the
    /// send that triggered the promotion (§4.6: both the non-retriable
    /// and max-attempts-exceeded rows count the attempt that sent them
    /// to the dead-letter store).
    pub fn promote_to_dead(&self, delivery_id: Uuid, reason: &str) -> Result<Delivery, QueueError> {
        let conn = &mut self.pool.get()?;
        let updated = diesel::update(
            deliveries::table
                .filter(deliveries::id.eq(delivery_id))
                .filter(deliveries::status.eq(DELIVERY_STATUS_PROCESSING)),
        )
        .set((
            deliveries::status.eq(DELIVERY_STATUS_DEAD),
            deliveries::attempts.eq(deliveries::attempts + 1),
            deliveries::lease_expires_at.eq(None::<DateTime<Utc>>),
            deliveries::last_error.eq(reason),
        ))
        .get_result::<Delivery>(conn)
        .optional()?;

        updated.ok_or(QueueError::NoLease(delivery_id))
    }

    /// Returns expired leases to `pending`, incrementing the caller's
    /// `lease_expired` counter once per row recovered. Should be
    /// called periodically by a background sweep and once at startup
    /// to recover leases abandoned by a crashed process.
    pub fn reap_expired_leases(&self) -> Result<usize, QueueError> {
        let conn = &mut self.pool.get()?;
        let now = Utc::now();

        let reaped = diesel::update(
            deliveries::table
                .filter(deliveries::status.eq(DELIVERY_STATUS_PROCESSING))
                .filter(deliveries::lease_expires_at.lt(now)),
        )
        .set((
            deliveries::status.eq(DELIVERY_STATUS_PENDING),
            deliveries::lease_expires_at.eq(None::<DateTime<Utc>>),
        ))
        .execute(conn)?;

        Ok(reaped)
    }

    /// Releases every currently-processing delivery back to `pending`,
    /// used by graceful shutdown to hand unresolved leases back
    /// immediately rather than waiting for their TTL.
    pub fn release_all_leases(&self) -> Result<usize, QueueError> {
        let conn = &mut self.pool.get()?;
        let released = diesel::update(deliveries::table.filter(deliveries::status.eq(DELIVERY_STATUS_PROCESSING)))
            .set((
                deliveries::status.eq(DELIVERY_STATUS_PENDING),
                deliveries::lease_expires_at.eq(None::<DateTime<Utc>>),
            ))
            .execute(conn)?;
        Ok(released)
    }

    /// Pending / processing / completed / failed / dead counts.
    pub fn stats(&self) -> Result<QueueStats, QueueError> {
        let conn = &mut self.pool.get()?;
        let stats: QueueStats = diesel::sql_query(
            "SELECT \
               COUNT(*) FILTER (WHERE status = 'pending') AS pending, \
               COUNT(*) FILTER (WHERE status = 'processing') AS processing, \
               COUNT(*) FILTER (WHERE status = 'completed') AS completed, \
               COUNT(*) FILTER (WHERE status = 'failed') AS failed, \
               COUNT(*) FILTER (WHERE status = 'dead') AS dead \
             FROM deliveries",
        )
        .get_result(conn)?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_stats_default_is_all_zero() {
        let stats = QueueStats::default();
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.dead, 0);
    }
}
