//! Resource stores
//!
//! Each store owns the in-memory cache of one server collection and the async operations that
//! keep it in sync with the REST API. The cache only changes after the server confirmed a call;
//! every change is announced to subscribers as a [`StoreEvent`].
pub mod books;
pub mod errors;
pub mod loans;
pub mod resource;

use crate::model::types::{Category, Member};
use crate::store::resource::ResourceStore;

pub type CategoryStore = ResourceStore<Category>;
pub type MemberStore = ResourceStore<Member>;

/// Notification fired after a successful cache mutation. Receivers unsubscribe by dropping
/// their end of the channel.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// The whole collection was replaced by a listing of `count` records
    Replaced { count: usize },
    /// A record was appended to the collection
    Added { id: Option<String> },
    /// A cached record was replaced by the server's representation
    Updated { id: String },
    /// A record was deleted on the server and dropped from the cache
    Removed { id: String },
    /// The detail slot now holds record `id`
    DetailLoaded { id: String },
}
