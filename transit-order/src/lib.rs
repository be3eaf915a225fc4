pub mod ledger;
pub mod accounts;
pub mod coordinator;

pub use ledger::InMemoryLedger;
pub use accounts::InMemoryAccounts;
pub use coordinator::{BookingCoordinator, BookingRules};
