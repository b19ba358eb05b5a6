use crate::api::errors::{ApiError, ErrorInfo};
use crate::api::request::{self, ApiRequest, Transport};
use crate::model::Resource;
use crate::store::StoreEvent;
use crate::store::errors::StoreError;
use core::sync::atomic::{AtomicU64, Ordering};
use log::{debug, error, info, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};

/// Number of events a slow subscriber may lag behind before it starts missing some
const EVENT_CAPACITY: usize = 64;

pub(super) struct StoreState<R> {
    /// Bulk cache, at most one record per id, in server (or arrival) order
    pub(super) items: Vec<R>,
    /// Last record fetched on its own; never merged into `items`
    pub(super) detail: Option<R>,
    in_flight: usize,
    last_error: Option<ErrorInfo>,
    status_message: Option<String>,
    /// Generation of the most recent collection listing written to `items`
    applied_generation: u64,
}

impl<R> StoreState<R> {
    const fn new() -> Self {
        Self {
            items: Vec::new(),
            detail: None,
            in_flight: 0,
            last_error: None,
            status_message: None,
            applied_generation: 0,
        }
    }

    pub(super) const fn finish(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }
}

/// Result of a successful update
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome<R> {
    /// The cached record was replaced in place
    Replaced(R),
    /// The server accepted the update but the record was not cached, so nothing changed locally
    NotCached(R),
}

impl<R> UpdateOutcome<R> {
    /// The server's representation of the updated record
    #[inline]
    pub fn into_inner(self) -> R {
        match self {
            Self::Replaced(record) | Self::NotCached(record) => record,
        }
    }

    #[must_use]
    #[inline]
    pub const fn is_cached(&self) -> bool {
        matches!(*self, Self::Replaced(_))
    }
}

/// In-memory cache of one REST collection plus the operations that keep it in sync.
///
/// Reads (`fetch_all`, `fetch_one`) never fail towards the caller: failures end up in
/// [`Self::last_error`] and the previous cache stays available. `create` and `update` record
/// the failure as well and hand it back so a form can stay open; `remove` only records it.
pub struct ResourceStore<R: Resource> {
    pub(super) transport: Arc<dyn Transport>,
    pub(super) state: RwLock<StoreState<R>>,
    /// Generation handed to the latest collection listing request
    issued_generation: AtomicU64,
    events: broadcast::Sender<StoreEvent>,
}

impl<R: Resource> ResourceStore<R> {
    #[must_use]
    #[inline]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            state: RwLock::new(StoreState::new()),
            issued_generation: AtomicU64::new(0),
            events: broadcast::Sender::new(EVENT_CAPACITY),
        }
    }

    pub(super) fn item_path(id: &str) -> String {
        format!("{}/{id}", R::COLLECTION)
    }

    /// Marks a call as started and clears the previous error
    pub(super) async fn begin(&self) {
        let mut state = self.state.write().await;
        state.in_flight = state.in_flight.saturating_add(1);
        state.last_error = None;
    }

    /// Ends a call that failed, keeping the cache as it was
    pub(super) async fn record_failure(&self, action: &str, error: &StoreError) {
        error!("Failed to {action}: {error}");
        let mut state = self.state.write().await;
        state.finish();
        state.last_error = Some(ErrorInfo::from(error));
    }

    /// Sends a request whose body may have failed to encode and decodes the reply
    pub(super) async fn send<T: DeserializeOwned>(
        &self,
        built: Result<ApiRequest, ApiError>,
    ) -> Result<T, ApiError> {
        request::fetch(self.transport.as_ref(), built?).await
    }

    pub(super) fn notify(&self, event: StoreEvent) {
        if let Err(unsent) = self.events.send(event) {
            debug!("No subscriber for {:?}", unsent.0);
        }
    }

    pub(super) fn next_generation(&self) -> u64 {
        self.issued_generation
            .fetch_add(1, Ordering::SeqCst)
            .saturating_add(1)
    }

    /// Writes a collection listing to the cache unless a listing issued later was already
    /// applied
    pub(super) async fn apply_listing(&self, generation: u64, result: Result<Vec<R>, StoreError>) {
        let mut state = self.state.write().await;
        state.finish();
        if generation < state.applied_generation {
            debug!(
                "Discarding stale {} listing (request {generation}, applied {})",
                R::COLLECTION,
                state.applied_generation
            );
            return;
        }
        match result {
            Ok(items) => {
                let count = items.len();
                state.applied_generation = generation;
                state.items = items;
                drop(state);
                info!("Loaded {count} {}", R::COLLECTION);
                self.notify(StoreEvent::Replaced { count });
            }
            Err(error) => {
                error!("Failed to load {}: {error}", R::COLLECTION);
                state.last_error = Some(ErrorInfo::from(&error));
            }
        }
    }

    /// Replaces the whole cache with the server's collection
    #[allow(clippy::missing_inline_in_public_items, reason = "Large async function")]
    pub async fn fetch_all(&self) {
        let generation = self.next_generation();
        self.begin().await;
        let result =
            request::fetch::<Vec<R>>(self.transport.as_ref(), ApiRequest::get(R::COLLECTION))
                .await
                .map_err(StoreError::from);
        self.apply_listing(generation, result).await;
    }

    /// Loads a single record into the detail slot, leaving the bulk cache alone
    #[allow(clippy::missing_inline_in_public_items, reason = "Large async function")]
    pub async fn fetch_one(&self, id: &str) {
        self.begin().await;
        let result =
            request::fetch::<R>(self.transport.as_ref(), ApiRequest::get(Self::item_path(id)))
                .await;
        match result {
            Ok(record) => {
                let mut state = self.state.write().await;
                state.finish();
                state.detail = Some(record);
                drop(state);
                self.notify(StoreEvent::DetailLoaded { id: id.to_owned() });
            }
            Err(error) => {
                let action = format!("load {} {id}", R::LABEL.to_lowercase());
                self.record_failure(&action, &error.into()).await;
            }
        }
    }

    /// Creates a record on the server and appends the server's version to the cache
    /// # Errors
    /// Returns the failure after recording it, so the caller can report it
    #[allow(clippy::missing_inline_in_public_items, reason = "Large async function")]
    pub async fn create(&self, payload: &R) -> Result<R, StoreError> {
        self.create_from(R::COLLECTION.to_owned(), payload).await
    }

    /// `POST`s an arbitrary body to `path` and appends the returned record
    pub(super) async fn create_from<B: Serialize + Sync + ?Sized>(
        &self,
        path: String,
        body: &B,
    ) -> Result<R, StoreError> {
        self.begin().await;
        let result = self.send::<R>(ApiRequest::post(path, body)).await;

        let mut state = self.state.write().await;
        state.finish();
        match result {
            Ok(record) => {
                if let Some(id) = record.id() {
                    state.items.retain(|item| item.id() != Some(id));
                }
                state.items.push(record.clone());
                state.status_message = Some(format!("{} added successfully", R::LABEL));
                drop(state);
                self.notify(StoreEvent::Added {
                    id: record.id().map(str::to_owned),
                });
                Ok(record)
            }
            Err(error) => {
                let error = StoreError::from(error);
                error!("Failed to add {}: {error}", R::LABEL.to_lowercase());
                state.last_error = Some(ErrorInfo::from(&error));
                state.status_message = Some(format!("Error adding {}", R::LABEL.to_lowercase()));
                Err(error)
            }
        }
    }

    /// Sends the full record with its id forced to `id` and replaces the cached entry in place
    /// # Errors
    /// Returns the failure after recording it. An id missing from the cache is not an error:
    /// it is logged and reported as [`UpdateOutcome::NotCached`].
    #[allow(clippy::missing_inline_in_public_items, reason = "Large async function")]
    pub async fn update(&self, id: &str, patch: R) -> Result<UpdateOutcome<R>, StoreError> {
        let mut record = patch;
        record.set_id(id);

        self.begin().await;
        let result = self
            .send::<R>(ApiRequest::put(Self::item_path(id), &record))
            .await;

        let updated = match result {
            Ok(updated) => updated,
            Err(error) => {
                let error = StoreError::from(error);
                let action = format!("update {} {id}", R::LABEL.to_lowercase());
                self.record_failure(&action, &error).await;
                return Err(error);
            }
        };

        let mut state = self.state.write().await;
        state.finish();
        let Some(slot) = state.items.iter_mut().find(|item| item.id() == Some(id)) else {
            warn!(
                "Updated {} {id} is not in the local cache, leaving the cache untouched",
                R::LABEL.to_lowercase()
            );
            return Ok(UpdateOutcome::NotCached(updated));
        };
        *slot = updated.clone();
        drop(state);
        self.notify(StoreEvent::Updated { id: id.to_owned() });
        Ok(UpdateOutcome::Replaced(updated))
    }

    /// Deletes a record on the server and drops it from the cache. Failures are recorded in
    /// `last_error` and the status message.
    #[allow(clippy::missing_inline_in_public_items, reason = "Large async function")]
    pub async fn remove(&self, id: &str) {
        self.begin().await;
        let result = self
            .transport
            .execute(ApiRequest::delete(Self::item_path(id)))
            .await;

        let mut state = self.state.write().await;
        state.finish();
        match result {
            Ok(_) => {
                state.items.retain(|item| item.id() != Some(id));
                state.status_message = Some(format!("{} removed successfully", R::LABEL));
                drop(state);
                self.notify(StoreEvent::Removed { id: id.to_owned() });
            }
            Err(error) => {
                let error = StoreError::from(error);
                error!("Failed to remove {} {id}: {error}", R::LABEL.to_lowercase());
                state.last_error = Some(ErrorInfo::from(&error));
                state.status_message =
                    Some(format!("Error removing {}", R::LABEL.to_lowercase()));
            }
        }
    }

    /// Snapshot of the bulk cache
    #[inline]
    pub async fn items(&self) -> Vec<R> {
        self.state.read().await.items.clone()
    }

    #[inline]
    pub async fn get(&self, id: &str) -> Option<R> {
        self.state
            .read()
            .await
            .items
            .iter()
            .find(|item| item.id() == Some(id))
            .cloned()
    }

    #[inline]
    pub async fn detail(&self) -> Option<R> {
        self.state.read().await.detail.clone()
    }

    #[inline]
    pub async fn len(&self) -> usize {
        self.state.read().await.items.len()
    }

    #[inline]
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.items.is_empty()
    }

    #[inline]
    pub async fn is_loading(&self) -> bool {
        self.state.read().await.in_flight > 0
    }

    #[inline]
    pub async fn last_error(&self) -> Option<ErrorInfo> {
        self.state.read().await.last_error.clone()
    }

    #[inline]
    pub async fn status_message(&self) -> Option<String> {
        self.state.read().await.status_message.clone()
    }

    #[must_use]
    #[inline]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
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
    use crate::model::types::Category;
    use crate::store::CategoryStore;
    use pretty_assertions::assert_eq;
    use reqwest::Method;
    use serde_json::{Value, json};

    fn category(id: &str, name: &str) -> Category {
        Category {
            id: Some(id.to_owned()),
            code: name.to_uppercase(),
            name: name.to_owned(),
            adult_only: false,
        }
    }

    fn as_json(categories: &[Category]) -> Value {
        serde_json::to_value(categories).unwrap()
    }

    fn store() -> (Arc<FakeTransport>, CategoryStore) {
        let fake = Arc::new(FakeTransport::new());
        let transport: Arc<dyn Transport> = fake.clone();
        (fake, CategoryStore::new(transport))
    }

    async fn seeded(categories: &[Category]) -> (Arc<FakeTransport>, CategoryStore) {
        let (fake, store) = store();
        fake.respond(Method::GET, "categories", as_json(categories));
        store.fetch_all().await;
        assert_eq!(store.items().await, categories);
        (fake, store)
    }

    #[tokio::test]
    async fn fetch_all_replaces_the_whole_cache() {
        let (fake, store) = seeded(&[category("1", "roman"), category("2", "bd")]).await;
        let mut events = store.subscribe();

        let listing = [category("3", "poesie"), category("1", "roman")];
        fake.respond(Method::GET, "categories", as_json(&listing));
        store.fetch_all().await;

        assert_eq!(store.items().await, listing);
        assert!(!store.is_loading().await);
        assert_eq!(store.last_error().await, None);
        assert_eq!(
            events.recv().await.unwrap(),
            StoreEvent::Replaced { count: 2 }
        );
    }

    #[tokio::test]
    async fn failed_fetch_all_keeps_the_stale_cache() {
        let (fake, store) = seeded(&[category("1", "roman")]).await;

        fake.fail(Method::GET, "categories", 503);
        store.fetch_all().await;

        assert!(!store.is_loading().await);
        let error = store.last_error().await.unwrap();
        assert_eq!(error.kind, ErrorKind::NetworkFailure);
        assert_eq!(error.status, Some(503));
        assert_eq!(store.items().await, [category("1", "roman")]);
    }

    #[tokio::test]
    async fn fetch_one_fills_the_detail_slot_only() {
        let (fake, store) = seeded(&[category("1", "roman")]).await;

        let fresher = Category {
            name: "Romans".to_owned(),
            ..category("1", "roman")
        };
        fake.respond(Method::GET, "categories/1", serde_json::to_value(&fresher).unwrap());
        store.fetch_one("1").await;

        assert_eq!(store.detail().await, Some(fresher.clone()));
        // the bulk cache is not cross-invalidated
        assert_eq!(store.get("1").await, Some(category("1", "roman")));

        fake.fail(Method::GET, "categories/1", 500);
        store.fetch_one("1").await;
        assert_eq!(store.detail().await, Some(fresher));
        assert!(store.last_error().await.is_some());
    }

    #[tokio::test]
    async fn create_appends_the_server_record() {
        let (fake, store) = seeded(&[category("1", "roman"), category("2", "bd")]).await;

        fake.respond(
            Method::POST,
            "categories",
            serde_json::to_value(category("3", "jeunesse")).unwrap(),
        );
        let draft = Category::new("JEU".to_owned(), "jeunesse".to_owned(), false);
        let created = store.create(&draft).await.unwrap();

        assert_eq!(created, category("3", "jeunesse"));
        assert_eq!(
            store.items().await,
            [
                category("1", "roman"),
                category("2", "bd"),
                category("3", "jeunesse")
            ]
        );
        assert_eq!(
            store.status_message().await.as_deref(),
            Some("Category added successfully")
        );

        let sent = fake.requests().pop().unwrap();
        assert_eq!(sent.method, Method::POST);
        assert_eq!(
            sent.body,
            Some(json!({ "code": "JEU", "name": "jeunesse", "adultOnly": false }))
        );
    }

    #[tokio::test]
    async fn created_record_with_a_cached_id_is_kept_once() {
        let (fake, store) = seeded(&[category("1", "roman"), category("2", "bd")]).await;

        fake.respond(
            Method::POST,
            "categories",
            serde_json::to_value(category("1", "romans")).unwrap(),
        );
        let draft = Category::new("ROMANS".to_owned(), "romans".to_owned(), false);
        store.create(&draft).await.unwrap();

        let items = store.items().await;
        assert_eq!(items, [category("2", "bd"), category("1", "romans")]);
        assert_eq!(
            items
                .iter()
                .filter(|item| item.id.as_deref() == Some("1"))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn failed_create_is_reported_to_the_caller() {
        let (fake, store) = seeded(&[category("1", "roman")]).await;

        fake.fail(Method::POST, "categories", 400);
        let error = store
            .create(&Category::new(String::new(), String::new(), false))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::ValidationFailure);
        assert_eq!(
            store.last_error().await.unwrap().kind,
            ErrorKind::ValidationFailure
        );
        assert_eq!(
            store.status_message().await.as_deref(),
            Some("Error adding category")
        );
        assert_eq!(store.items().await, [category("1", "roman")]);
    }

    #[tokio::test]
    async fn update_replaces_in_place() {
        let (fake, store) = seeded(&[
            category("1", "roman"),
            category("2", "bd"),
            category("3", "poesie"),
        ])
        .await;

        let renamed = Category {
            name: "Bandes dessinées".to_owned(),
            ..category("2", "bd")
        };
        fake.respond(Method::PUT, "categories/2", serde_json::to_value(&renamed).unwrap());

        // the patch carries no id, the store forces it
        let patch = Category {
            id: None,
            ..renamed.clone()
        };
        let outcome = store.update("2", patch).await.unwrap();

        assert_eq!(outcome, UpdateOutcome::Replaced(renamed.clone()));
        let items = store.items().await;
        assert_eq!(items.len(), 3);
        assert_eq!(items[1], renamed);
        assert_eq!(fake.requests().pop().unwrap().body.unwrap()["id"], json!("2"));
    }

    #[tokio::test]
    async fn update_of_uncached_id_leaves_cache_untouched() {
        let (fake, store) = seeded(&[category("1", "roman")]).await;

        fake.respond(
            Method::PUT,
            "categories/9",
            serde_json::to_value(category("9", "essai")).unwrap(),
        );
        let outcome = store.update("9", category("9", "essai")).await.unwrap();

        assert!(!outcome.is_cached());
        assert_eq!(outcome.into_inner(), category("9", "essai"));
        assert_eq!(store.items().await, [category("1", "roman")]);
        assert_eq!(store.last_error().await, None);
    }

    #[tokio::test]
    async fn failed_update_propagates() {
        let (fake, store) = seeded(&[category("1", "roman")]).await;

        fake.fail(Method::PUT, "categories/1", 500);
        let result = store.update("1", category("1", "Romans")).await;

        assert!(matches!(result, Err(StoreError::Api(_))));
        assert!(store.last_error().await.is_some());
        assert!(!store.is_loading().await);
        assert_eq!(store.items().await, [category("1", "roman")]);
    }

    #[tokio::test]
    async fn remove_drops_the_entry() {
        let (fake, store) = seeded(&[category("1", "roman"), category("2", "bd")]).await;
        let mut events = store.subscribe();

        fake.respond(Method::DELETE, "categories/1", Value::Null);
        store.remove("1").await;

        assert_eq!(store.items().await, [category("2", "bd")]);
        assert_eq!(
            store.status_message().await.as_deref(),
            Some("Category removed successfully")
        );
        assert_eq!(
            events.recv().await.unwrap(),
            StoreEvent::Removed { id: "1".to_owned() }
        );
    }

    #[tokio::test]
    async fn failed_remove_keeps_the_entry() {
        let (fake, store) = seeded(&[category("1", "roman")]).await;

        fake.fail(Method::DELETE, "categories/1", 409);
        store.remove("1").await;

        assert_eq!(store.items().await, [category("1", "roman")]);
        assert_eq!(
            store.status_message().await.as_deref(),
            Some("Error removing category")
        );
        assert!(store.last_error().await.is_some());
    }

    #[tokio::test]
    async fn newest_listing_wins_when_it_resolves_first() {
        let (fake, store) = store();
        let older = fake.hold(Method::GET, "categories");
        let newer = fake.hold(Method::GET, "categories");

        let first_listing = [category("1", "roman")];
        let second_listing = [category("2", "bd")];

        let driver = async {
            while fake.requests().len() < 2 {
                tokio::task::yield_now().await;
            }
            newer.send(Ok(as_json(&second_listing))).unwrap();
            while store.items().await.is_empty() {
                tokio::task::yield_now().await;
            }
            older.send(Ok(as_json(&first_listing))).unwrap();
        };
        tokio::join!(store.fetch_all(), store.fetch_all(), driver);

        // The older response arrived last and was discarded
        assert_eq!(store.items().await, second_listing);
        assert!(!store.is_loading().await);
    }

    #[tokio::test]
    async fn loading_lasts_until_every_overlapping_call_resolves() {
        let (fake, store) = store();
        let first = fake.hold(Method::GET, "categories");
        let second = fake.hold(Method::GET, "categories");
        assert!(!store.is_loading().await);

        let driver = async {
            while fake.requests().len() < 2 {
                tokio::task::yield_now().await;
            }
            assert!(store.is_loading().await);

            first.send(Ok(as_json(&[category("1", "roman")]))).unwrap();
            while store.items().await.is_empty() {
                tokio::task::yield_now().await;
            }
            // the second listing is still pending
            assert!(store.is_loading().await);

            second.send(Ok(as_json(&[category("2", "bd")]))).unwrap();
        };
        tokio::join!(store.fetch_all(), store.fetch_all(), driver);

        assert!(!store.is_loading().await);
    }

    #[tokio::test]
    async fn listings_resolving_in_order_are_all_applied() {
        let (fake, store) = store();
        let older = fake.hold(Method::GET, "categories");
        let newer = fake.hold(Method::GET, "categories");

        let driver = async {
            while fake.requests().len() < 2 {
                tokio::task::yield_now().await;
            }
            older.send(Ok(as_json(&[category("1", "roman")]))).unwrap();
            while store.items().await.is_empty() {
                tokio::task::yield_now().await;
            }
            newer.send(Ok(as_json(&[category("2", "bd")]))).unwrap();
        };
        tokio::join!(store.fetch_all(), store.fetch_all(), driver);

        assert_eq!(store.items().await, [category("2", "bd")]);
    }
}
