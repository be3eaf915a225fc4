use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;
use transit_core::repository::{AccountBalances, BalanceMovement, DebitOutcome, MovementKind};
use transit_core::{Clock, CoreError, CoreResult, SystemClock};

/// In-memory account balances with a movement journal.
pub struct InMemoryAccounts {
    state: Mutex<AccountState>,
    clock: Arc<dyn Clock>,
}

#[derive(Default)]
struct AccountState {
    balances: HashMap<i64, i64>,
    movements: HashMap<String, BalanceMovement>,
}

impl InMemoryAccounts {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(AccountState::default()),
            clock,
        }
    }

    /// Register an account holding `balance`. Stands in for the account
    /// service that owns user records.
    pub async fn open_account(&self, user_id: i64, balance: i64) {
        self.state.lock().await.balances.insert(user_id, balance);
    }
}

impl Default for InMemoryAccounts {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountBalances for InMemoryAccounts {
    async fn balance(&self, user_id: i64) -> CoreResult<Option<i64>> {
        Ok(self.state.lock().await.balances.get(&user_id).copied())
    }

    async fn try_debit(&self, user_id: i64, amount: i64, reference: &str) -> CoreResult<DebitOutcome> {
        let mut state = self.state.lock().await;
        if state.movements.contains_key(reference) {
            return Ok(DebitOutcome::DuplicateReference);
        }

        let balance = state
            .balances
            .get_mut(&user_id)
            .ok_or(CoreError::UserNotFound(user_id))?;
        if *balance < amount {
            return Ok(DebitOutcome::Insufficient { available: *balance });
        }
        *balance -= amount;
        debug!(user_id, amount, balance = *balance, reference, "Balance debited");

        let movement = BalanceMovement {
            user_id,
            reference: reference.to_string(),
            kind: MovementKind::Debit,
            amount,
            created_at: self.clock.now(),
        };
        state.movements.insert(reference.to_string(), movement);
        Ok(DebitOutcome::Applied)
    }

    async fn credit(&self, user_id: i64, amount: i64, reference: &str) -> CoreResult<()> {
        let mut state = self.state.lock().await;
        if state.movements.contains_key(reference) {
            return Ok(());
        }

        let balance = state
            .balances
            .get_mut(&user_id)
            .ok_or(CoreError::UserNotFound(user_id))?;
        *balance += amount;
        debug!(user_id, amount, balance = *balance, reference, "Balance credited");

        let movement = BalanceMovement {
            user_id,
            reference: reference.to_string(),
            kind: MovementKind::Credit,
            amount,
            created_at: self.clock.now(),
        };
        state.movements.insert(reference.to_string(), movement);
        Ok(())
    }

    async fn movement(&self, reference: &str) -> CoreResult<Option<BalanceMovement>> {
        Ok(self.state.lock().await.movements.get(reference).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_debit_is_conditional() {
        let accounts = InMemoryAccounts::new();
        accounts.open_account(1, 100).await;

        assert_eq!(
            accounts.try_debit(1, 150, "debit:a").await.unwrap(),
            DebitOutcome::Insufficient { available: 100 }
        );
        assert_eq!(accounts.try_debit(1, 100, "debit:b").await.unwrap(), DebitOutcome::Applied);
        assert_eq!(accounts.balance(1).await.unwrap(), Some(0));

        // A rejected debit leaves no journal entry behind
        assert!(accounts.movement("debit:a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_references_make_movements_idempotent() {
        let accounts = InMemoryAccounts::new();
        accounts.open_account(1, 100).await;

        assert_eq!(accounts.try_debit(1, 40, "debit:k").await.unwrap(), DebitOutcome::Applied);
        assert_eq!(
            accounts.try_debit(1, 40, "debit:k").await.unwrap(),
            DebitOutcome::DuplicateReference
        );

        accounts.credit(1, 40, "refund:k").await.unwrap();
        accounts.credit(1, 40, "refund:k").await.unwrap();
        assert_eq!(accounts.balance(1).await.unwrap(), Some(100));

        let movement = accounts.movement("refund:k").await.unwrap().unwrap();
        assert_eq!(movement.kind, MovementKind::Credit);
        assert_eq!(movement.amount, 40);
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let accounts = InMemoryAccounts::new();
        assert_eq!(accounts.balance(9).await.unwrap(), None);
        assert!(matches!(
            accounts.try_debit(9, 1, "debit:x").await,
            Err(CoreError::UserNotFound(9))
        ));
    }
}
