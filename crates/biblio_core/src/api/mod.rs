//! REST API access
//!
//! The [`request::Transport`] trait is the only way the stores talk to the server. The
//! production implementation is [`client::ApiClient`] over `reqwest`.
pub mod client;
pub mod errors;
#[cfg(test)]
pub(crate) mod fake;
pub mod request;
