//! Customer resolution.

use common::{Customer, NewCustomer, Role, UserId};
use store::{CustomerDirectory, StoreError};

use crate::error::DomainError;
use crate::validation::validate_email;

/// Contact details supplied with a purchase.
#[derive(Debug, Clone, Default)]
pub struct CustomerInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl CustomerInfo {
    /// Creates contact details.
    pub fn new(name: impl Into<String>, email: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            phone: phone.into(),
        }
    }
}

/// Looks up customers and registers new ones on first purchase.
pub struct CustomerService<D> {
    directory: D,
}

impl<D: CustomerDirectory> CustomerService<D> {
    /// Creates a new customer service over a directory.
    pub fn new(directory: D) -> Self {
        Self { directory }
    }

    /// Returns the customer registered under `info.email`, registering a new
    /// client without a password when none exists.
    #[tracing::instrument(skip(self, info), fields(email = %info.email))]
    pub async fn get_or_create_user(&self, info: &CustomerInfo) -> Result<Customer, DomainError> {
        let email = validate_email(&info.email)?;

        if let Some(existing) = self.directory.get_by_email(&email).await? {
            return Ok(existing);
        }

        let new_customer = NewCustomer {
            role: Role::Client,
            name: info.name.trim().to_string(),
            email: email.clone(),
            phone: info.phone.trim().to_string(),
            password_hash: None,
        };

        let id = match self.directory.create(new_customer).await {
            Ok(id) => id,
            // Registered concurrently by another request.
            Err(StoreError::UniqueViolation(_)) => {
                tracing::debug!(%email, "customer created concurrently, re-reading");
                return self
                    .directory
                    .get_by_email(&email)
                    .await?
                    .ok_or_else(|| {
                        DomainError::Persistence(StoreError::Corrupt(format!(
                            "customer {email} vanished after unique violation"
                        )))
                    });
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(customer_id = %id, "registered new customer");
        self.get_customer(id).await
    }

    /// Fetches a customer by id.
    pub async fn get_customer(&self, id: UserId) -> Result<Customer, DomainError> {
        self.directory
            .get_customer_by_id(id)
            .await?
            .ok_or(DomainError::CustomerNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationError;
    use store::InMemoryStore;

    fn info(email: &str) -> CustomerInfo {
        CustomerInfo::new("Marie", email, "555-0199")
    }

    #[tokio::test]
    async fn creates_client_without_password() {
        let store = InMemoryStore::new();
        let service = CustomerService::new(store.clone());

        let customer = service
            .get_or_create_user(&info("Marie@Example.com"))
            .await
            .unwrap();

        assert_eq!(customer.email, "marie@example.com");
        assert_eq!(customer.role, Role::Client);
        assert!(customer.password_hash.is_none());
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn second_call_returns_existing_record() {
        let store = InMemoryStore::new();
        let service = CustomerService::new(store.clone());

        let first = service
            .get_or_create_user(&info("marie@example.com"))
            .await
            .unwrap();
        let second = service
            .get_or_create_user(&info(" MARIE@example.com"))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn invalid_email_is_rejected_without_writes() {
        let store = InMemoryStore::new();
        let service = CustomerService::new(store.clone());

        let result = service.get_or_create_user(&info("not-an-email")).await;

        assert!(matches!(
            result,
            Err(DomainError::Validation(ValidationError::InvalidEmail(_)))
        ));
        assert_eq!(store.user_count().await, 0);
    }

    #[tokio::test]
    async fn lookup_failure_is_surfaced() {
        let store = InMemoryStore::new();
        store.set_fail_on_email_lookup(true);
        let service = CustomerService::new(store.clone());

        let result = service.get_or_create_user(&info("marie@example.com")).await;

        assert!(matches!(result, Err(DomainError::Persistence(_))));
        assert_eq!(store.user_count().await, 0);
    }

    #[tokio::test]
    async fn unknown_customer_is_not_found() {
        let service = CustomerService::new(InMemoryStore::new());
        let id = UserId::new();

        let result = service.get_customer(id).await;

        assert!(matches!(result, Err(DomainError::CustomerNotFound(missing)) if missing == id));
    }
}
