use crate::api::client::ApiClient;
use crate::api::errors::ApiError;
use crate::api::request::Transport;
use crate::config::ClientConfig;
use crate::search::BookSearchStore;
use crate::store::books::BookStore;
use crate::store::loans::LoanStore;
use crate::store::{CategoryStore, MemberStore};
use log::info;
use std::sync::Arc;

/// A store looked up by name
#[non_exhaustive]
#[derive(Clone, Copy)]
pub enum StoreHandle<'registry> {
    Categories(&'registry CategoryStore),
    Members(&'registry MemberStore),
    Books(&'registry BookStore),
    Loans(&'registry LoanStore),
    Search(&'registry BookSearchStore),
}

/// Owns one instance of every store, all sharing a single transport. Share it between tasks
/// with an `Arc`.
pub struct StoreRegistry {
    categories: CategoryStore,
    members: MemberStore,
    books: Arc<BookStore>,
    loans: LoanStore,
    search: BookSearchStore,
}

impl StoreRegistry {
    /// Names accepted by [`Self::by_name`]
    pub const NAMES: [&'static str; 5] = ["categories", "members", "books", "loans", "search"];

    #[must_use]
    #[inline]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let books = Arc::new(BookStore::new(Arc::clone(&transport)));
        Self {
            categories: CategoryStore::new(Arc::clone(&transport)),
            members: MemberStore::new(Arc::clone(&transport)),
            loans: LoanStore::new(Arc::clone(&transport)),
            search: BookSearchStore::new(transport, Arc::clone(&books)),
            books,
        }
    }

    /// Builds the HTTP client from `config` and mounts every store on it
    /// # Errors
    /// Fails if the HTTP client cannot be built from `config`
    #[inline]
    pub fn connect(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = ApiClient::new(config)?;
        info!("Stores connected to {}", client.base_url());
        Ok(Self::new(Arc::new(client)))
    }

    #[must_use]
    #[inline]
    pub const fn categories(&self) -> &CategoryStore {
        &self.categories
    }

    #[must_use]
    #[inline]
    pub const fn members(&self) -> &MemberStore {
        &self.members
    }

    #[must_use]
    #[inline]
    pub fn books(&self) -> &BookStore {
        &self.books
    }

    #[must_use]
    #[inline]
    pub const fn loans(&self) -> &LoanStore {
        &self.loans
    }

    #[must_use]
    #[inline]
    pub const fn search(&self) -> &BookSearchStore {
        &self.search
    }

    /// Looks a store up by its collection name, see [`Self::NAMES`]
    #[must_use]
    #[inline]
    pub fn by_name(&self, name: &str) -> Option<StoreHandle<'_>> {
        match name {
            "categories" => Some(StoreHandle::Categories(&self.categories)),
            "members" => Some(StoreHandle::Members(&self.members)),
            "books" => Some(StoreHandle::Books(&self.books)),
            "loans" => Some(StoreHandle::Loans(&self.loans)),
            "search" => Some(StoreHandle::Search(&self.search)),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "Tests are predefined and guaranteed to be Some/Ok"
)]
mod tests {
    use super::*;
    use crate::api::fake::FakeTransport;
    use crate::search::criteria::SearchCriteria;
    use pretty_assertions::assert_eq;
    use reqwest::Method;
    use serde_json::json;

    #[test]
    fn every_name_resolves() {
        let registry = StoreRegistry::new(Arc::new(FakeTransport::new()));
        for name in StoreRegistry::NAMES {
            assert!(registry.by_name(name).is_some(), "{name} is not mounted");
        }
        assert!(registry.by_name("authors").is_none());
        assert!(matches!(
            registry.by_name("loans"),
            Some(StoreHandle::Loans(_))
        ));
    }

    #[tokio::test]
    async fn search_reads_the_registry_book_store() {
        let fake = Arc::new(FakeTransport::new());
        let transport: Arc<dyn Transport> = fake.clone();
        let registry = StoreRegistry::new(transport);
        fake.respond(
            Method::GET,
            "books",
            json!([{ "id": "b1", "isbn": "1", "title": "Germinal" }]),
        );
        registry.books().fetch_all().await;

        let found = registry
            .search()
            .search_cached(&SearchCriteria::new().with_title("germ"))
            .await;
        assert_eq!(found.len(), 1);
        assert!(registry.categories().is_empty().await);
        assert!(registry.members().is_empty().await);
        assert!(registry.loans().is_empty().await);
    }

    #[test]
    fn connect_rejects_a_relative_base_url() {
        let config = ClientConfig {
            base_url: "api/v1/rest".to_owned(),
            ..ClientConfig::default()
        };
        assert!(StoreRegistry::connect(&config).is_err());
    }
}
