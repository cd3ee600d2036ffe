//! Persistence collaborators for the bakery order backend.
//!
//! The domain talks to storage only through three capability traits:
//! [`CatalogGateway`], [`CustomerDirectory`] and [`OrderStore`]. Two
//! backends implement all of them: [`InMemoryStore`] for tests and local
//! runs, and [`PostgresStore`] for production.

pub mod catalog;
pub mod directory;
pub mod error;
pub mod memory;
pub mod orders;
pub mod postgres;

pub use catalog::CatalogGateway;
pub use directory::CustomerDirectory;
pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use orders::{OrderStore, OrderStoreExt, OrderTransaction, with_transaction};
pub use postgres::PostgresStore;
