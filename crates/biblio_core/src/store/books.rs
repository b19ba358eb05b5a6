//! Book-scoped operations on copies and loans, on top of the generic [`ResourceStore`]
use crate::api::request::{self, ApiRequest};
use crate::model::Resource;
use crate::model::types::{Book, BookCopy, CopiesCreationOrder, CopyState, Loan};
use crate::store::StoreEvent;
use crate::store::errors::StoreError;
use crate::store::resource::ResourceStore;
use futures::future::try_join_all;
use log::info;

pub type BookStore = ResourceStore<Book>;

/// Applies `change` to the copies of book `book_id`, wherever that book is held with its
/// copies loaded
fn patch_copies<F>(items: &mut [Book], detail: Option<&mut Book>, book_id: &str, change: F)
where
    F: Fn(&mut Vec<BookCopy>),
{
    let cached = items.iter_mut().filter(|book| book.id() == Some(book_id));
    for book in cached.chain(detail.filter(|book| book.id() == Some(book_id))) {
        if let Some(copies) = book.copies.as_mut() {
            change(copies);
        }
    }
}

impl BookStore {
    fn copies_path(book_id: &str) -> String {
        format!("{}/copies", Self::item_path(book_id))
    }

    /// Adds `num_copies` new copies to a book and returns them
    /// # Errors
    /// Returns the failure after recording it in `last_error`
    #[allow(clippy::missing_inline_in_public_items, reason = "Large async function")]
    pub async fn create_copies(
        &self,
        book_id: &str,
        num_copies: u32,
        initial_state: CopyState,
    ) -> Result<Vec<BookCopy>, StoreError> {
        let order = CopiesCreationOrder::new(num_copies, initial_state);
        self.begin().await;
        let result = self
            .send::<Vec<BookCopy>>(ApiRequest::post(Self::copies_path(book_id), &order))
            .await;

        let created = match result {
            Ok(created) => created,
            Err(error) => {
                let error = StoreError::from(error);
                self.record_failure(&format!("add copies to book {book_id}"), &error)
                    .await;
                return Err(error);
            }
        };

        let mut guard = self.state.write().await;
        guard.finish();
        let state = &mut *guard;
        patch_copies(&mut state.items, state.detail.as_mut(), book_id, |copies| {
            copies.extend(created.iter().cloned());
        });
        drop(guard);
        info!("Added {} copies to book {book_id}", created.len());
        self.notify(StoreEvent::Updated {
            id: book_id.to_owned(),
        });
        Ok(created)
    }

    /// Loads one copy of a book. The copy is returned, not cached.
    /// # Errors
    /// Returns the failure after recording it in `last_error`
    #[allow(clippy::missing_inline_in_public_items, reason = "Large async function")]
    pub async fn fetch_copy(&self, book_id: &str, copy_id: &str) -> Result<BookCopy, StoreError> {
        self.begin().await;
        let path = format!("{}/{copy_id}", Self::copies_path(book_id));
        match request::fetch::<BookCopy>(self.transport.as_ref(), ApiRequest::get(path)).await {
            Ok(copy) => {
                self.state.write().await.finish();
                Ok(copy)
            }
            Err(error) => {
                let error = StoreError::from(error);
                self.record_failure(&format!("load copy {copy_id} of book {book_id}"), &error)
                    .await;
                Err(error)
            }
        }
    }

    /// Sends the full copy with its id forced to `copy_id` and replaces it in the owning book
    /// # Errors
    /// Returns the failure after recording it in `last_error`
    #[allow(clippy::missing_inline_in_public_items, reason = "Large async function")]
    pub async fn update_copy(
        &self,
        book_id: &str,
        copy_id: &str,
        copy: BookCopy,
    ) -> Result<BookCopy, StoreError> {
        let mut copy = copy;
        copy.id = Some(copy_id.to_owned());

        self.begin().await;
        let path = format!("{}/{copy_id}", Self::copies_path(book_id));
        let updated = match self.send::<BookCopy>(ApiRequest::put(path, &copy)).await {
            Ok(updated) => updated,
            Err(error) => {
                let error = StoreError::from(error);
                self.record_failure(&format!("update copy {copy_id} of book {book_id}"), &error)
                    .await;
                return Err(error);
            }
        };

        let mut guard = self.state.write().await;
        guard.finish();
        let state = &mut *guard;
        patch_copies(&mut state.items, state.detail.as_mut(), book_id, |copies| {
            if let Some(slot) = copies
                .iter_mut()
                .find(|cached| cached.id.as_deref() == Some(copy_id))
            {
                *slot = updated.clone();
            }
        });
        drop(guard);
        self.notify(StoreEvent::Updated {
            id: book_id.to_owned(),
        });
        Ok(updated)
    }

    /// Loan history of one book. The loans are returned, not cached.
    /// # Errors
    /// Returns the failure after recording it in `last_error`
    #[allow(clippy::missing_inline_in_public_items, reason = "Large async function")]
    pub async fn fetch_book_loans(&self, book_id: &str) -> Result<Vec<Loan>, StoreError> {
        self.begin().await;
        let path = format!("{}/loans", Self::item_path(book_id));
        match request::fetch::<Vec<Loan>>(self.transport.as_ref(), ApiRequest::get(path)).await {
            Ok(loans) => {
                self.state.write().await.finish();
                Ok(loans)
            }
            Err(error) => {
                let error = StoreError::from(error);
                self.record_failure(&format!("load loans of book {book_id}"), &error)
                    .await;
                Err(error)
            }
        }
    }

    /// Replaces the cache with the books that own at least one copy.
    ///
    /// Listings leave copies out, so every book's detail is fetched. This takes part in the
    /// same generation ordering as [`Self::fetch_all`].
    #[allow(clippy::missing_inline_in_public_items, reason = "Large async function")]
    pub async fn fetch_books_to_loan(&self) {
        let generation = self.next_generation();
        self.begin().await;
        let result = self.load_books_to_loan().await;
        self.apply_listing(generation, result).await;
    }

    async fn load_books_to_loan(&self) -> Result<Vec<Book>, StoreError> {
        let transport = self.transport.as_ref();
        let listing =
            request::fetch::<Vec<Book>>(transport, ApiRequest::get(Book::COLLECTION)).await?;
        let details = listing
            .iter()
            .filter_map(Resource::id)
            .map(|id| request::fetch::<Book>(transport, ApiRequest::get(Self::item_path(id))));
        let books = try_join_all(details).await?;
        Ok(books
            .into_iter()
            .filter(|book| book.copies.as_ref().is_some_and(|copies| !copies.is_empty()))
            .collect())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    reason = "Tests are predefined and guaranteed to be Some/Ok"
)]
mod tests {
    use super::*;
    use crate::api::errors::ErrorKind;
    use crate::api::fake::FakeTransport;
    use crate::api::request::Transport;
    use pretty_assertions::assert_eq;
    use reqwest::Method;
    use serde_json::json;
    use std::sync::Arc;

    fn copy(id: &str, available: bool) -> BookCopy {
        BookCopy {
            id: Some(id.to_owned()),
            ..BookCopy::new(CopyState::Good, available, false)
        }
    }

    fn book(id: &str, title: &str, copies: Option<Vec<BookCopy>>) -> Book {
        Book {
            id: Some(id.to_owned()),
            copies,
            ..Book::new(format!("isbn-{id}"), title.to_owned())
        }
    }

    fn store() -> (Arc<FakeTransport>, BookStore) {
        let fake = Arc::new(FakeTransport::new());
        let transport: Arc<dyn Transport> = fake.clone();
        (fake, BookStore::new(transport))
    }

    #[tokio::test]
    async fn created_copies_land_in_cache_and_detail() {
        let (fake, store) = store();
        let with_copies = book("b1", "Germinal", Some(vec![copy("x1", true)]));
        fake.respond(
            Method::GET,
            "books",
            serde_json::to_value([with_copies.clone(), book("b2", "Nana", None)]).unwrap(),
        );
        fake.respond(
            Method::GET,
            "books/b1",
            serde_json::to_value(&with_copies).unwrap(),
        );
        store.fetch_all().await;
        store.fetch_one("b1").await;

        fake.respond(
            Method::POST,
            "books/b1/copies",
            serde_json::to_value([copy("x2", true), copy("x3", true)]).unwrap(),
        );
        let created = store
            .create_copies("b1", 2, CopyState::Good)
            .await
            .unwrap();

        assert_eq!(created.len(), 2);
        let cached = store.get("b1").await.unwrap();
        assert_eq!(cached.copies.unwrap().len(), 3);
        assert_eq!(store.detail().await.unwrap().copies.unwrap().len(), 3);
        // copies that were never loaded stay unloaded
        assert_eq!(store.get("b2").await.unwrap().copies, None);

        let sent = fake.requests().pop().unwrap();
        assert_eq!(
            sent.body,
            Some(json!({ "numCopies": 2, "initialState": "GOOD" }))
        );
    }

    #[tokio::test]
    async fn updated_copy_is_replaced_in_place() {
        let (fake, store) = store();
        fake.respond(
            Method::GET,
            "books/b1",
            serde_json::to_value(book(
                "b1",
                "Germinal",
                Some(vec![copy("x1", true), copy("x2", true)]),
            ))
            .unwrap(),
        );
        store.fetch_one("b1").await;

        let withdrawn = BookCopy::new(CopyState::Bad, false, true);
        let mut expected = withdrawn.clone();
        expected.id = Some("x1".to_owned());
        fake.respond(
            Method::PUT,
            "books/b1/copies/x1",
            serde_json::to_value(&expected).unwrap(),
        );
        let updated = store.update_copy("b1", "x1", withdrawn).await.unwrap();

        assert_eq!(updated, expected);
        let copies = store.detail().await.unwrap().copies.unwrap();
        assert_eq!(copies, [expected, copy("x2", true)]);
    }

    #[tokio::test]
    async fn copy_and_loan_lookups_are_not_cached() {
        let (fake, store) = store();
        fake.respond(
            Method::GET,
            "books/b1/copies/x1",
            serde_json::to_value(copy("x1", true)).unwrap(),
        );
        fake.respond(
            Method::GET,
            "books/b1/loans",
            json!([{ "id": "l1", "loanDateTime": "2024-03-01T10:00:00", "initialState": "Neuf" }]),
        );

        assert_eq!(store.fetch_copy("b1", "x1").await.unwrap(), copy("x1", true));
        let loans = store.fetch_book_loans("b1").await.unwrap();
        assert_eq!(loans.len(), 1);
        assert!(loans[0].is_active());
        assert!(store.is_empty().await);
        assert_eq!(store.detail().await, None);
    }

    #[tokio::test]
    async fn failed_copy_creation_is_reported() {
        let (fake, store) = store();
        fake.fail(Method::POST, "books/b1/copies", 422);

        let error = store
            .create_copies("b1", 0, CopyState::New)
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::ValidationFailure);
        assert!(!store.is_loading().await);
        assert!(store.last_error().await.is_some());
    }

    #[tokio::test]
    async fn books_to_loan_keeps_books_with_copies() {
        let (fake, store) = store();
        fake.respond(
            Method::GET,
            "books",
            serde_json::to_value([book("b1", "Germinal", None), book("b2", "Nana", None)]).unwrap(),
        );
        let lendable = book("b1", "Germinal", Some(vec![copy("x1", false)]));
        fake.respond(
            Method::GET,
            "books/b1",
            serde_json::to_value(&lendable).unwrap(),
        );
        fake.respond(
            Method::GET,
            "books/b2",
            serde_json::to_value(book("b2", "Nana", Some(Vec::new()))).unwrap(),
        );

        store.fetch_books_to_loan().await;

        assert_eq!(store.items().await, [lendable]);
        assert_eq!(store.last_error().await, None);
    }

    #[tokio::test]
    async fn books_to_loan_fails_as_a_whole() {
        let (fake, store) = store();
        fake.respond(
            Method::GET,
            "books",
            serde_json::to_value([book("b1", "Germinal", None)]).unwrap(),
        );
        store.fetch_all().await;

        fake.respond(
            Method::GET,
            "books",
            serde_json::to_value([book("b1", "Germinal", None)]).unwrap(),
        );
        fake.fail(Method::GET, "books/b1", 500);
        store.fetch_books_to_loan().await;

        assert_eq!(store.items().await, [book("b1", "Germinal", None)]);
        assert_eq!(
            store.last_error().await.unwrap().kind,
            ErrorKind::NetworkFailure
        );
    }
}
