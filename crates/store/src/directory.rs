use async_trait::async_trait;
use common::{Customer, NewCustomer, UserId};

use crate::Result;

/// Lookup and registration of users.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    /// Finds a user by email. Emails are stored normalised (trimmed,
    /// lower-case), so callers pass the normalised form.
    async fn get_by_email(&self, email: &str) -> Result<Option<Customer>>;

    /// Finds a user by id.
    async fn get_customer_by_id(&self, id: UserId) -> Result<Option<Customer>>;

    /// Registers a user and returns its id.
    ///
    /// Fails with `UniqueViolation` if the email is already taken.
    async fn create(&self, customer: NewCustomer) -> Result<UserId>;
}
