//! `biblio_core`
//!
//! Client-side store layer for the library administration front end. Every store mirrors one
//! collection of the library REST API in memory and only changes its cache once the server
//! confirmed a call. Front ends build a [`StoreRegistry`] once and hand it to whatever needs a
//! store.

pub mod api;
pub mod config;
pub mod model;
pub mod registry;
pub mod search;
pub mod store;

pub use api::client::ApiClient;
pub use api::errors::{ApiError, ErrorInfo, ErrorKind};
pub use config::ClientConfig;
pub use registry::{StoreHandle, StoreRegistry};
pub use search::BookSearchStore;
pub use search::criteria::SearchCriteria;
pub use store::books::BookStore;
pub use store::errors::StoreError;
pub use store::loans::LoanStore;
pub use store::resource::{ResourceStore, UpdateOutcome};
pub use store::{CategoryStore, MemberStore, StoreEvent};
