#![deny(unsafe_code)]

//! Signaling client for the rendezvous protocol.
//!
//! Maintains a persistent WebSocket connection to a signaling server,
//! exchanges opcode-tagged operations to bind human-readable aliases to a
//! client identity and to request connections to remote aliases, and relays
//! offer/answer/candidate payloads so two peers can establish a direct
//! channel. Negotiation itself (producing and consuming session
//! descriptions) is delegated through the [`Delegate`] hooks.
//!
//! ```ignore
//! let client = Arc::new(Client::ws(
//!     "ws://signaler:6999",
//!     Duration::from_secs(1),
//!     Arc::new(MyNegotiator::new()),
//! ));
//! tokio::spawn(client.clone().run());
//!
//! // Once on_connected/on_acknowledged have fired:
//! client.bind("alice").await?;
//! client.connect("bob").await?;
//! ```

mod client;
mod delegate;
mod errors;
pub mod resolver;
mod transport;

pub use client::Client;
pub use delegate::{CandidateSink, Delegate};
pub use errors::{DispatchError, RequestError};
pub use transport::{Connector, SignalTransport, WsConnector, WsTransport};

pub use rendezvous_wire::Operation;
