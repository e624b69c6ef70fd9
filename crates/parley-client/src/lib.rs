//! # parley-client
//!
//! Client-side state mirror for the Parley event-relay contract.
//!
//! A UI embeds a [`ClientState`], feeds it every [`ServerEvent`] received
//! over the gateway connection, and re-queries the HTTP API after a
//! reconnect to reconcile whatever was missed while offline (pushed events
//! are fire-and-forget and lost when the client is not connected).

pub mod state;

pub use state::ClientState;

pub use parley_shared::protocol::ServerEvent;
