//! Derived search view over the book collection
//!
//! A search asks the server for the books it can pre-filter exactly (availability, adult
//! content) and then always narrows the answer with the same local [`SearchCriteria`], so the
//! remote and the cached variants agree on what matches.
pub mod criteria;

use crate::api::errors::ErrorInfo;
use crate::api::request::{self, ApiRequest, Transport};
use crate::model::Resource;
use crate::model::types::{Book, BookCopy};
use crate::search::criteria::SearchCriteria;
use crate::store::books::BookStore;
use crate::store::errors::StoreError;
use core::sync::atomic::{AtomicU64, Ordering};
use futures::future::try_join_all;
use log::{debug, error, info};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct SearchState {
    results: Vec<Book>,
    in_flight: usize,
    last_error: Option<ErrorInfo>,
    applied_generation: u64,
}

/// Holds the result of the latest search. Overlapping searches follow the same rule as
/// collection listings: an answer older than the one on display is dropped.
pub struct BookSearchStore {
    transport: Arc<dyn Transport>,
    books: Arc<BookStore>,
    state: RwLock<SearchState>,
    issued_generation: AtomicU64,
}

impl BookSearchStore {
    #[must_use]
    #[inline]
    pub fn new(transport: Arc<dyn Transport>, books: Arc<BookStore>) -> Self {
        Self {
            transport,
            books,
            state: RwLock::new(SearchState::default()),
            issued_generation: AtomicU64::new(0),
        }
    }

    async fn begin(&self) {
        let mut state = self.state.write().await;
        state.in_flight = state.in_flight.saturating_add(1);
        state.last_error = None;
    }

    async fn fail(&self, error: &StoreError) {
        error!("Book search failed: {error}");
        let mut state = self.state.write().await;
        state.in_flight = state.in_flight.saturating_sub(1);
        state.last_error = Some(ErrorInfo::from(error));
    }

    /// Searches the server's books and keeps the matches as the current results.
    ///
    /// On failure the error is recorded and the previous results are returned unchanged.
    #[allow(clippy::missing_inline_in_public_items, reason = "Large async function")]
    pub async fn search(&self, criteria: &SearchCriteria) -> Vec<Book> {
        let generation = self
            .issued_generation
            .fetch_add(1, Ordering::SeqCst)
            .saturating_add(1);
        self.begin().await;

        let query = criteria
            .server_filters()
            .into_iter()
            .fold(ApiRequest::get(Book::COLLECTION), |built, (key, value)| {
                built.with_query(key, value)
            });
        let result = request::fetch::<Vec<Book>>(self.transport.as_ref(), query).await;

        let mut state = self.state.write().await;
        state.in_flight = state.in_flight.saturating_sub(1);
        if generation < state.applied_generation {
            debug!(
                "Discarding stale search (request {generation}, applied {})",
                state.applied_generation
            );
            return state.results.clone();
        }
        match result {
            Ok(books) => {
                state.results = criteria.filter_books(books);
                state.applied_generation = generation;
                info!("Search matched {} books", state.results.len());
            }
            Err(error) => {
                let error = StoreError::from(error);
                error!("Book search failed: {error}");
                state.last_error = Some(ErrorInfo::from(&error));
            }
        }
        state.results.clone()
    }

    /// Filters the book store's cache without touching the network. The current results are
    /// left alone.
    #[inline]
    pub async fn search_cached(&self, criteria: &SearchCriteria) -> Vec<Book> {
        criteria.filter_books(self.books.items().await)
    }

    /// Borrowable copies of the current results that satisfy `criteria`. Each matching book's
    /// detail is fetched since the results may not carry copies.
    /// # Errors
    /// Returns the failure after recording it in `last_error`
    #[allow(clippy::missing_inline_in_public_items, reason = "Large async function")]
    pub async fn available_copies(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<Vec<BookCopy>, StoreError> {
        let matching = criteria.filter_books(self.results().await);
        self.begin().await;

        let transport = self.transport.as_ref();
        let details = matching.iter().filter_map(Resource::id).map(|id| {
            request::fetch::<Book>(
                transport,
                ApiRequest::get(format!("{}/{id}", Book::COLLECTION)),
            )
        });
        match try_join_all(details).await {
            Ok(books) => {
                let mut state = self.state.write().await;
                state.in_flight = state.in_flight.saturating_sub(1);
                drop(state);
                Ok(books
                    .iter()
                    .flat_map(Book::borrowable_copies)
                    .cloned()
                    .collect())
            }
            Err(error) => {
                let error = StoreError::from(error);
                self.fail(&error).await;
                Err(error)
            }
        }
    }

    #[inline]
    pub async fn results(&self) -> Vec<Book> {
        self.state.read().await.results.clone()
    }

    #[inline]
    pub async fn is_loading(&self) -> bool {
        self.state.read().await.in_flight > 0
    }

    #[inline]
    pub async fn last_error(&self) -> Option<ErrorInfo> {
        self.state.read().await.last_error.clone()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "Tests are predefined and guaranteed to be Some/Ok"
)]
mod tests {
    use super::*;
    use crate::api::errors::ErrorKind;
    use crate::api::fake::FakeTransport;
    use crate::model::types::CopyState;
    use pretty_assertions::assert_eq;
    use reqwest::Method;
    use serde_json::{Value, json};

    fn listing() -> Value {
        json!([
            { "id": "b1", "isbn": "9782070643028", "title": "Harry Potter à l'école des sorciers" },
            { "id": "b2", "isbn": "9782253096337", "title": "Les Misérables" }
        ])
    }

    fn stores() -> (Arc<FakeTransport>, Arc<BookStore>, BookSearchStore) {
        let fake = Arc::new(FakeTransport::new());
        let transport: Arc<dyn Transport> = fake.clone();
        let books = Arc::new(BookStore::new(Arc::clone(&transport)));
        let search = BookSearchStore::new(transport, Arc::clone(&books));
        (fake, books, search)
    }

    fn titles(books: &[Book]) -> Vec<&str> {
        books.iter().map(|book| book.title.as_str()).collect()
    }

    #[tokio::test]
    async fn remote_search_applies_the_local_filter() {
        let (fake, _books, search) = stores();
        fake.respond(Method::GET, "books", listing());

        let found = search
            .search(&SearchCriteria::new().with_title("harry").child_safe(true))
            .await;

        assert_eq!(titles(&found), ["Harry Potter à l'école des sorciers"]);
        assert_eq!(search.results().await, found);
        let sent = fake.requests().pop().unwrap();
        assert_eq!(sent.query, [("child".to_owned(), "true".to_owned())]);
    }

    #[tokio::test]
    async fn failed_search_keeps_previous_results() {
        let (fake, _books, search) = stores();
        fake.respond(Method::GET, "books", listing());
        search.search(&SearchCriteria::new()).await;

        fake.fail(Method::GET, "books", 502);
        let found = search
            .search(&SearchCriteria::new().with_title("misérables"))
            .await;

        assert_eq!(found.len(), 2);
        assert!(!search.is_loading().await);
        assert_eq!(
            search.last_error().await.unwrap().kind,
            ErrorKind::NetworkFailure
        );
    }

    #[tokio::test]
    async fn cached_search_uses_the_book_store() {
        let (fake, books, search) = stores();
        fake.respond(Method::GET, "books", listing());
        books.fetch_all().await;

        let found = search
            .search_cached(&SearchCriteria::new().with_title("MISÉRABLES"))
            .await;

        assert_eq!(titles(&found), ["Les Misérables"]);
        assert_eq!(fake.requests().len(), 1);
        assert!(search.results().await.is_empty());
    }

    #[tokio::test]
    async fn available_copies_come_from_book_details() {
        let (fake, _books, search) = stores();
        fake.respond(Method::GET, "books", listing());
        search.search(&SearchCriteria::new()).await;

        fake.respond(
            Method::GET,
            "books/b1",
            json!({
                "id": "b1",
                "isbn": "9782070643028",
                "title": "Harry Potter à l'école des sorciers",
                "copies": [
                    { "id": "x1", "state": "Neuf", "available": true, "removed": false },
                    { "id": "x2", "state": "Usé", "available": false, "removed": false }
                ]
            }),
        );
        let copies = search
            .available_copies(&SearchCriteria::new().with_title("potter"))
            .await
            .unwrap();

        assert_eq!(copies.len(), 1);
        assert_eq!(copies.first().unwrap().state, CopyState::New);
        assert!(!search.is_loading().await);
    }
}
