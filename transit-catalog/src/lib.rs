pub mod inventory;
pub mod routes;
pub mod keyset;
pub mod offering;

pub use inventory::InMemoryCatalog;
pub use routes::InMemoryRoutes;
pub use keyset::{KeysetSearch, SearchLimits};
pub use offering::{NewTicketRequest, OfferingService};
