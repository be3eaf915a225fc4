use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use transit_core::repository::{AccountBalances, BookingLedger, DebitOutcome, TicketCatalog};
use transit_core::{
    BookingStatus, BookingView, Clock, CoreError, CoreResult, CreateBooking, NewBooking,
};
use uuid::Uuid;

/// A failed compensation is retried once before it is reported as fatal.
const COMPENSATION_ATTEMPTS: u32 = 2;

// Request keys are unique per user, so the user is part of every reference
// derived from one.
fn debit_reference(user_id: i64, request_key: &str) -> String {
    format!("debit:{}:{}", user_id, request_key)
}

fn refund_reference(user_id: i64, request_key: &str) -> String {
    format!("refund:{}:{}", user_id, request_key)
}

fn cancel_reference(booking_id: i32) -> String {
    format!("cancel:{}", booking_id)
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BookingRules {
    /// Credit the booking's price back to the user when it is canceled.
    #[serde(default = "default_refund_on_cancel")]
    pub refund_on_cancel: bool,
}

fn default_refund_on_cancel() -> bool {
    true
}

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            refund_on_cancel: default_refund_on_cancel(),
        }
    }
}

/// Orchestrates reservations against the catalog, the ledger and account
/// balances. The only component that knows about all three.
///
/// Reads made for validation are advisory. The authoritative checks are the
/// conditional debit and the conditional inventory decrement, and a debit is
/// compensated whenever a later step of the same reservation fails.
pub struct BookingCoordinator {
    catalog: Arc<dyn TicketCatalog>,
    ledger: Arc<dyn BookingLedger>,
    accounts: Arc<dyn AccountBalances>,
    clock: Arc<dyn Clock>,
    rules: BookingRules,
}

impl BookingCoordinator {
    pub fn new(
        catalog: Arc<dyn TicketCatalog>,
        ledger: Arc<dyn BookingLedger>,
        accounts: Arc<dyn AccountBalances>,
        clock: Arc<dyn Clock>,
        rules: BookingRules,
    ) -> Self {
        Self {
            catalog,
            ledger,
            accounts,
            clock,
            rules,
        }
    }

    /// Reserve `quantity` seats of a ticket and debit their price.
    ///
    /// Replaying a request key that already produced a booking returns that
    /// booking without charging again. Failed attempts are terminal.
    pub async fn create_booking(&self, user_id: i64, request: CreateBooking) -> CoreResult<BookingView> {
        if request.quantity < 1 {
            return Err(CoreError::ValidationError(
                "Ticket quantity must be at least 1".to_string(),
            ));
        }

        let request_key = match request.request_key {
            Some(key) if key.trim().is_empty() => {
                return Err(CoreError::ValidationError("Request key must not be blank".to_string()));
            }
            Some(key) => {
                if let Some(existing) = self.ledger.find_by_request_key(user_id, &key).await? {
                    info!(user_id, booking_id = existing.id, request_key = %key, "Replayed booking request");
                    return Ok(BookingView::from(&existing));
                }
                key
            }
            None => Uuid::new_v4().to_string(),
        };

        // 1. Fetch ticket
        let ticket = self
            .catalog
            .get(request.ticket_id)
            .await?
            .ok_or(CoreError::TicketNotFound(request.ticket_id))?;

        // 2. Advisory inventory check
        if ticket.available_tickets < request.quantity {
            warn!(
                ticket_id = ticket.id,
                requested = request.quantity,
                available = ticket.available_tickets,
                "Not enough tickets available"
            );
            return Err(CoreError::InsufficientInventory {
                ticket_id: ticket.id,
                requested: request.quantity,
                available: ticket.available_tickets,
            });
        }

        // 3. Fetch balance
        let balance = self
            .accounts
            .balance(user_id)
            .await?
            .ok_or(CoreError::UserNotFound(user_id))?;

        // 4. Advisory balance check
        let total = ticket
            .price
            .checked_mul(i64::from(request.quantity))
            .ok_or_else(|| CoreError::ValidationError("Total cost is out of range".to_string()))?;
        if balance < total {
            warn!(user_id, balance, required = total, "Insufficient balance");
            return Err(CoreError::InsufficientBalance {
                required: total,
                available: balance,
            });
        }

        // 5. Conditional debit
        let debit_reference = debit_reference(user_id, &request_key);
        match self.accounts.try_debit(user_id, total, &debit_reference).await? {
            DebitOutcome::Applied => {}
            DebitOutcome::Insufficient { available } => {
                warn!(user_id, available, required = total, "Debit rejected, balance changed concurrently");
                return Err(CoreError::InsufficientBalance {
                    required: total,
                    available,
                });
            }
            DebitOutcome::DuplicateReference => {
                return Err(self.duplicate_request(user_id, &request_key).await?);
            }
        }

        // 6. Conditional inventory decrement
        if let Err(e) = self.catalog.adjust_availability(ticket.id, -request.quantity).await {
            if e.is_business_rejection() {
                warn!(ticket_id = ticket.id, requested = request.quantity, error = %e, "Inventory decrement rejected");
            } else {
                error!(ticket_id = ticket.id, requested = request.quantity, error = %e, "Inventory decrement failed");
            }
            // 7. Roll the debit back
            self.compensate_debit(user_id, total, &request_key).await?;
            return Err(e);
        }

        // 8. Persist the booking
        let new_booking = NewBooking {
            user_id,
            ticket_id: ticket.id,
            quantity: request.quantity,
            total_price: total,
            booking_time: self.clock.now(),
            request_key: request_key.clone(),
        };
        match self.ledger.create(new_booking).await {
            Ok(booking) => {
                info!(
                    booking_id = booking.id,
                    user_id,
                    ticket_id = ticket.id,
                    quantity = booking.quantity,
                    total_price = total,
                    "Booking created"
                );
                Ok(BookingView::from(&booking))
            }
            Err(e) => {
                error!(user_id, ticket_id = ticket.id, error = %e, "Failed to persist booking");
                if let Err(release) = self.restore_inventory(ticket.id, request.quantity).await {
                    error!(
                        ticket_id = ticket.id,
                        quantity = request.quantity,
                        error = %release,
                        "Failed to release inventory of unpersisted booking"
                    );
                }
                self.compensate_debit(user_id, total, &request_key).await?;
                Err(e)
            }
        }
    }

    /// Cancel a pending booking owned by `user_id` and restore its seats.
    pub async fn cancel_booking(&self, user_id: i64, booking_id: i32) -> CoreResult<()> {
        let booking = self
            .ledger
            .find_by_id(booking_id)
            .await?
            .ok_or(CoreError::BookingNotFound(booking_id))?;

        if booking.user_id != user_id {
            warn!(booking_id, user_id, owner = booking.user_id, "Cancel requested by non-owner");
            return Err(CoreError::NotOwner { booking_id, user_id });
        }

        if booking.status == BookingStatus::Canceled {
            return Err(CoreError::AlreadyCanceled(booking_id));
        }

        // Only the caller that wins the status transition restores inventory
        let transitioned = self
            .ledger
            .transition_status(booking_id, BookingStatus::Pending, BookingStatus::Canceled)
            .await?;
        if !transitioned {
            return Err(CoreError::AlreadyCanceled(booking_id));
        }

        let available = match self.restore_inventory(booking.ticket_id, booking.quantity).await {
            Ok(available) => available,
            Err(e) => {
                // Nothing was restored yet, so putting the booking back makes the cancel retryable
                if let Err(revert) = self.ledger.set_status(booking_id, BookingStatus::Pending).await {
                    error!(
                        booking_id,
                        ticket_id = booking.ticket_id,
                        quantity = booking.quantity,
                        error = %e,
                        revert_error = %revert,
                        "Booking canceled but seats were not restored; manual reconciliation required"
                    );
                    return Err(CoreError::CancelIncomplete {
                        booking_id,
                        ticket_id: booking.ticket_id,
                        quantity: booking.quantity,
                        cause: e.to_string(),
                    });
                }
                warn!(booking_id, error = %e, "Seats not restored, cancellation reverted");
                return Err(e);
            }
        };

        if self.rules.refund_on_cancel && booking.total_price > 0 {
            let reference = cancel_reference(booking_id);
            if let Err(cause) = self.credit_with_retry(user_id, booking.total_price, &reference).await {
                error!(
                    booking_id,
                    user_id,
                    amount = booking.total_price,
                    reference = %reference,
                    cause = %cause,
                    "Booking canceled but refund failed; manual reconciliation required"
                );
                return Err(CoreError::RollbackFailed {
                    user_id,
                    amount: booking.total_price,
                    reference,
                    cause,
                });
            }
        }

        info!(
            booking_id,
            ticket_id = booking.ticket_id,
            returned = booking.quantity,
            available,
            "Booking canceled"
        );
        Ok(())
    }

    pub async fn list_bookings(&self, user_id: i64) -> CoreResult<Vec<BookingView>> {
        let bookings = self.ledger.find_all_by_user(user_id).await?;
        Ok(bookings.iter().map(BookingView::from).collect())
    }

    async fn compensate_debit(&self, user_id: i64, amount: i64, request_key: &str) -> CoreResult<()> {
        let reference = refund_reference(user_id, request_key);
        match self.credit_with_retry(user_id, amount, &reference).await {
            Ok(()) => {
                info!(user_id, amount, reference = %reference, "Debit rolled back");
                Ok(())
            }
            Err(cause) => {
                error!(
                    user_id,
                    amount,
                    reference = %reference,
                    debit = %debit_reference(user_id, request_key),
                    cause = %cause,
                    "Debit rollback failed, funds held without a booking; manual reconciliation required"
                );
                Err(CoreError::RollbackFailed {
                    user_id,
                    amount,
                    reference,
                    cause,
                })
            }
        }
    }

    /// Credits are idempotent per reference, so a failed one is simply repeated.
    async fn credit_with_retry(&self, user_id: i64, amount: i64, reference: &str) -> Result<(), String> {
        let mut attempt = 1;
        loop {
            match self.accounts.credit(user_id, amount, reference).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < COMPENSATION_ATTEMPTS => {
                    warn!(user_id, amount, reference, attempt, error = %e, "Credit failed, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e.to_string()),
            }
        }
    }

    async fn restore_inventory(&self, ticket_id: i32, quantity: i32) -> CoreResult<i32> {
        let mut attempt = 1;
        loop {
            match self.catalog.adjust_availability(ticket_id, quantity).await {
                Ok(available) => return Ok(available),
                Err(e) if attempt < COMPENSATION_ATTEMPTS => {
                    warn!(ticket_id, quantity, attempt, error = %e, "Inventory restore failed, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn duplicate_request(&self, user_id: i64, request_key: &str) -> CoreResult<CoreError> {
        let refund = self.accounts.movement(&refund_reference(user_id, request_key)).await?;
        Ok(if refund.is_some() {
            CoreError::ValidationError(format!(
                "Request {} already failed; resubmit with a new request key",
                request_key
            ))
        } else {
            CoreError::ConcurrencyConflict(format!("Request {} is already being processed", request_key))
        })
    }
}
