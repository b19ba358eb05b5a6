//! Data model
//!
//! Plain records mirrored from the library REST API. The client never assigns identity: ids
//! are handed out by the server and are absent on records that have not been created yet.
pub mod types;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// A record type backed by a REST collection (`/{COLLECTION}`, `/{COLLECTION}/{id}`).
pub trait Resource: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Path segment of the collection below the API base URL
    const COLLECTION: &'static str;

    /// Capitalized singular name used in status messages, e.g. `Category`
    const LABEL: &'static str;

    /// Server-assigned id, `None` before creation
    fn id(&self) -> Option<&str>;

    /// Forces the id, used to build the full record sent on update
    fn set_id(&mut self, id: &str);
}
