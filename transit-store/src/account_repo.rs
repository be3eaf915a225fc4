use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use transit_core::repository::{AccountBalances, BalanceMovement, DebitOutcome, MovementKind};
use transit_core::{CoreError, CoreResult};

use crate::storage_error;

/// Balances in `accounts`, journaled in `balance_movements`.
///
/// Each movement runs in one transaction: the journal insert claims the
/// reference, then a guarded update applies the amount. Dropping the
/// transaction on any early return rolls the journal entry back.
pub struct PgAccountBalances {
    pool: PgPool,
}

impl PgAccountBalances {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct MovementRow {
    user_id: i64,
    reference: String,
    kind: String,
    amount: i64,
    created_at: DateTime<Utc>,
}

fn kind_label(kind: MovementKind) -> &'static str {
    match kind {
        MovementKind::Debit => "debit",
        MovementKind::Credit => "credit",
    }
}

fn parse_kind(label: &str) -> CoreResult<MovementKind> {
    match label {
        "debit" => Ok(MovementKind::Debit),
        "credit" => Ok(MovementKind::Credit),
        other => Err(CoreError::StorageError(format!("Unknown movement kind: {}", other))),
    }
}

#[async_trait]
impl AccountBalances for PgAccountBalances {
    async fn balance(&self, user_id: i64) -> CoreResult<Option<i64>> {
        sqlx::query_scalar::<_, i64>("SELECT balance FROM accounts WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)
    }

    async fn try_debit(&self, user_id: i64, amount: i64, reference: &str) -> CoreResult<DebitOutcome> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let claimed = sqlx::query(
            r#"
            INSERT INTO balance_movements (user_id, reference, kind, amount, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (reference) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(reference)
        .bind(kind_label(MovementKind::Debit))
        .bind(amount)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        if claimed.rows_affected() == 0 {
            return Ok(DebitOutcome::DuplicateReference);
        }

        let remaining = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE accounts
            SET balance = balance - $2
            WHERE user_id = $1 AND balance >= $2
            RETURNING balance
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage_error)?;

        let Some(balance) = remaining else {
            let current = sqlx::query_scalar::<_, i64>("SELECT balance FROM accounts WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(storage_error)?;
            return match current {
                Some(available) => Ok(DebitOutcome::Insufficient { available }),
                None => Err(CoreError::UserNotFound(user_id)),
            };
        };

        tx.commit().await.map_err(storage_error)?;
        debug!(user_id, amount, balance, reference, "Balance debited");
        Ok(DebitOutcome::Applied)
    }

    async fn credit(&self, user_id: i64, amount: i64, reference: &str) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let claimed = sqlx::query(
            r#"
            INSERT INTO balance_movements (user_id, reference, kind, amount, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (reference) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(reference)
        .bind(kind_label(MovementKind::Credit))
        .bind(amount)
        .execute(&mut *tx)
        .await
        .map_err(storage_error)?;

        if claimed.rows_affected() == 0 {
            return Ok(());
        }

        let balance = sqlx::query_scalar::<_, i64>(
            "UPDATE accounts SET balance = balance + $2 WHERE user_id = $1 RETURNING balance",
        )
        .bind(user_id)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage_error)?
        .ok_or(CoreError::UserNotFound(user_id))?;

        tx.commit().await.map_err(storage_error)?;
        debug!(user_id, amount, balance, reference, "Balance credited");
        Ok(())
    }

    async fn movement(&self, reference: &str) -> CoreResult<Option<BalanceMovement>> {
        let row = sqlx::query_as::<_, MovementRow>(
            "SELECT user_id, reference, kind, amount, created_at FROM balance_movements WHERE reference = $1",
        )
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        row.map(|r| {
            Ok(BalanceMovement {
                user_id: r.user_id,
                reference: r.reference,
                kind: parse_kind(&r.kind)?,
                amount: r.amount,
                created_at: r.created_at,
            })
        })
        .transpose()
    }
}
