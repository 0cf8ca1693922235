//! The signaling client: reconnect lifecycle, opcode dispatch, and the
//! bind/shutdown/connect request initiators.
//!
//! # Key invariant
//!
//! Only [`Client::run`] calls `transport.recv()`. Inbound operations are
//! handled one at a time, in arrival order, on that single loop; identity
//! and the correlation table are only ever touched from there and from the
//! initiators, which go through the resolver's mutex.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use rendezvous_wire::Operation;

use crate::delegate::{CandidateSink, Delegate};
use crate::errors::{DispatchError, RequestError};
use crate::resolver::{alias_key, connection_key, Polarity, Resolver, WaitError};
use crate::transport::{Connector, SignalTransport, WsConnector};

/// Outbound queue depth. Dispatch-produced sends are few and small.
const OUTBOUND_BUFFER: usize = 64;

/// Client for a rendezvous signaling server.
///
/// Construct with a [`Connector`], spawn [`run`](Self::run), then issue
/// [`bind`](Self::bind), [`shutdown`](Self::shutdown) and
/// [`connect`](Self::connect) from any task.
///
/// # Reconnection
///
/// The client never gives up: after every disconnect (or failed connect
/// attempt) it waits `reconnect_after` and dials again. Requests pending
/// across a disconnect are neither failed nor replayed; callers are
/// expected to re-issue them once [`Delegate::on_connected`] fires for the
/// new connection. A re-issued request takes over its correlation key, and
/// the orphaned original fails with [`RequestError::ClientClosed`].
pub struct Client<C: Connector> {
    connector: C,
    reconnect_after: Duration,
    delegate: Arc<dyn Delegate>,

    /// This client's identity; empty until the server acknowledges.
    identity: Mutex<String>,
    resolver: Resolver,

    out_tx: mpsc::Sender<Operation>,
    /// Receiver half, taken by `run` for the lifetime of the client.
    out_rx: AsyncMutex<mpsc::Receiver<Operation>>,
}

impl Client<WsConnector> {
    /// Client over a WebSocket connection to `url`.
    pub fn ws(
        url: impl Into<String>,
        reconnect_after: Duration,
        delegate: Arc<dyn Delegate>,
    ) -> Self {
        Self::new(WsConnector::new(url), reconnect_after, delegate)
    }
}

impl<C: Connector> Client<C> {
    pub fn new(connector: C, reconnect_after: Duration, delegate: Arc<dyn Delegate>) -> Self {
        let (out_tx, out_rx) = mpsc::channel(OUTBOUND_BUFFER);
        Self {
            connector,
            reconnect_after,
            delegate,
            identity: Mutex::new(String::new()),
            resolver: Resolver::new(),
            out_tx,
            out_rx: AsyncMutex::new(out_rx),
        }
    }

    /// The identity the server issued, or the empty string before the first
    /// acknowledgement.
    pub fn identity(&self) -> String {
        self.identity.lock().clone()
    }

    /// Run the connect/reconnect loop. Never returns.
    ///
    /// Disconnected -> Connecting -> Connected -> Disconnected -> ... with a
    /// fixed backoff between attempts. Transport errors end the current
    /// connection and are never surfaced to request callers.
    pub async fn run(self: Arc<Self>) {
        let mut out_rx = self.out_rx.lock().await;

        loop {
            let transport = match self.connector.connect().await {
                Ok(transport) => transport,
                Err(error) => {
                    warn!(%error, reconnect_in = ?self.reconnect_after, "connect failed");
                    sleep(self.reconnect_after).await;
                    continue;
                }
            };

            info!("server connected");
            self.delegate.on_connected().await;

            self.serve(&transport, &mut out_rx).await;

            info!(reconnect_in = ?self.reconnect_after, "server disconnected");
            self.delegate.on_disconnected().await;

            sleep(self.reconnect_after).await;
        }
    }

    /// Drive one live connection until it closes or fails.
    async fn serve(&self, transport: &C::Transport, out_rx: &mut mpsc::Receiver<Operation>) {
        loop {
            tokio::select! {
                outgoing = out_rx.recv() => {
                    // The client owns a sender, so the channel cannot close
                    // while we are here.
                    let Some(op) = outgoing else { return };
                    if let Err(error) = transport.send(&op).await {
                        error!(%error, "send failed, terminating connection");
                        transport.close().await;
                        return;
                    }
                }
                inbound = transport.recv() => {
                    match inbound {
                        Ok(Some(op)) => {
                            if let Err(error) = self.handle_operation(op).await {
                                warn!(%error, "dropping operation");
                            }
                        }
                        Ok(None) => return,
                        Err(error) => {
                            error!(%error, "transport error, terminating connection");
                            transport.close().await;
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Handle one inbound operation.
    async fn handle_operation(&self, op: Operation) -> Result<(), DispatchError> {
        debug!(opcode = op.opcode(), "handling operation");

        match op {
            Operation::Goodbye { id } => {
                info!(%id, "received goodbye");
                self.delegate.on_goodbye(&id).await;
            }

            Operation::Acknowledged { id } => {
                *self.identity.lock() = id.clone();
                info!(%id, "received acknowledgement");
                self.delegate.on_acknowledged(&id).await;

                // The acknowledgement is the protocol's entry point: it is
                // the only trigger for outbound offer production.
                let offer = self.delegate.produce_local_offer().await;
                self.enqueue(Operation::Offer {
                    id: id.clone(),
                    offer,
                })
                .await;
                info!(%id, "sent offer");
            }

            Operation::Offer { id, offer } => {
                info!(offerer_id = %id, "received offer");
                let answer = self.delegate.produce_local_answer(&offer).await;
                let answerer_id = self.identity();
                self.enqueue(Operation::Answer {
                    offerer_id: id.clone(),
                    answerer_id: answerer_id.clone(),
                    answer,
                })
                .await;
                info!(offerer_id = %id, %answerer_id, "sent answer");
            }

            Operation::Answer {
                offerer_id,
                answerer_id,
                answer,
            } => {
                info!(%offerer_id, %answerer_id, "received answer");
                let sink = CandidateSink::new(
                    offerer_id.clone(),
                    answerer_id.clone(),
                    self.out_tx.clone(),
                );
                self.delegate
                    .consume_remote_answer(&offerer_id, &answerer_id, &answer, sink)
                    .await;
            }

            Operation::Candidate {
                offerer_id,
                answerer_id,
                candidate,
            } => {
                info!(%offerer_id, %answerer_id, "received candidate");
                self.delegate
                    .consume_remote_candidate(&offerer_id, &answerer_id, &candidate)
                    .await;
            }

            Operation::Alias {
                id,
                alias,
                set,
                client_connection_id,
            } => {
                info!(%id, %alias, set, "received alias");
                match client_connection_id {
                    // Progress on a connect handshake.
                    Some(token) => self.resolver.notify(&connection_key(&token), set),
                    // Progress on a bind/shutdown.
                    None => self.resolver.notify(&alias_key(&id, &alias), set),
                }
                self.delegate.on_alias_changed(&id, &alias, set).await;
            }

            other @ (Operation::Bind { .. }
            | Operation::Shutdown { .. }
            | Operation::Connect { .. }) => {
                return Err(DispatchError::Unimplemented(other.opcode()));
            }
        }

        Ok(())
    }

    /// Bind `alias` to this client's identity.
    ///
    /// Resolves once the server confirms the alias (`set = true`); an
    /// alias event with `set = false` rejects. No timeout: see the note on
    /// [`run`](Self::run) about requests pending across a reconnect.
    pub async fn bind(&self, alias: &str) -> Result<(), RequestError> {
        let id = self.identity();
        let key = alias_key(&id, alias);
        info!(%id, alias, "binding");

        let subscription = self.resolver.subscribe(key.clone(), 1, Polarity::Set);
        self.enqueue(Operation::Bind {
            id,
            alias: alias.to_owned(),
        })
        .await;

        subscription.wait().await.map_err(|e| match e {
            WaitError::Rejected => RequestError::BindRejected(key),
            WaitError::Abandoned => RequestError::ClientClosed,
        })
    }

    /// Remove a previously bound alias.
    ///
    /// Polarity is inverted relative to [`bind`](Self::bind): the alias
    /// event with `set = false` confirms removal, `set = true` rejects.
    pub async fn shutdown(&self, alias: &str) -> Result<(), RequestError> {
        let id = self.identity();
        let key = alias_key(&id, alias);
        info!(%id, alias, "shutting down");

        let subscription = self.resolver.subscribe(key.clone(), 1, Polarity::Cleared);
        self.enqueue(Operation::Shutdown {
            id,
            alias: alias.to_owned(),
        })
        .await;

        subscription.wait().await.map_err(|e| match e {
            WaitError::Rejected => RequestError::ShutdownRejected(key),
            WaitError::Abandoned => RequestError::ClientClosed,
        })
    }

    /// Connect to a peer addressed by `remote_alias`.
    ///
    /// The server establishes the connection by creating alias bindings on
    /// both participating peers, so resolution requires two confirming
    /// alias events for the freshly generated connection token; waiting on
    /// just one would let the initiator proceed while the remote side's
    /// binding is still pending. Any `set = false` event for the token
    /// rejects immediately.
    pub async fn connect(&self, remote_alias: &str) -> Result<(), RequestError> {
        let id = self.identity();
        let client_connection_id = Uuid::new_v4().to_string();
        let key = connection_key(&client_connection_id);
        info!(%id, remote_alias, "connecting");

        let subscription = self.resolver.subscribe(key.clone(), 2, Polarity::Set);
        self.enqueue(Operation::Connect {
            id,
            client_connection_id,
            remote_alias: remote_alias.to_owned(),
        })
        .await;

        subscription.wait().await.map_err(|e| match e {
            WaitError::Rejected => RequestError::ConnectionRejected(key),
            WaitError::Abandoned => RequestError::ClientClosed,
        })
    }

    /// Queue an operation for the active (or next) connection.
    async fn enqueue(&self, op: Operation) {
        if self.out_tx.send(op).await.is_err() {
            // Unreachable while the client is alive; the client holds a sender.
            warn!("outbound queue closed");
        }
    }
}
