//! Hooks into the negotiation subsystem.
//!
//! The client drives WebRTC negotiation through these callbacks; producing
//! session descriptions and consuming remote ones is entirely the
//! delegate's business. All hooks are invoked sequentially from the
//! client's reaction loop and may suspend.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use rendezvous_wire::Operation;

/// The negotiation subsystem's view of the signaling client.
///
/// Lifecycle and event hooks default to no-ops; only the offer/answer
/// producers are mandatory.
#[async_trait]
pub trait Delegate: Send + Sync {
    /// The transport reached the server. Fires once per (re)connection.
    async fn on_connected(&self) {}

    /// The transport closed. Fires once per disconnect, before the
    /// reconnect backoff starts.
    async fn on_disconnected(&self) {}

    /// The server acknowledged this client and issued its identity.
    async fn on_acknowledged(&self, id: &str) {
        let _ = id;
    }

    /// Produce this client's session offer.
    async fn produce_local_offer(&self) -> String;

    /// Produce an answer for a remote peer's offer.
    async fn produce_local_answer(&self, offer: &str) -> String;

    /// A remote answer arrived for an offer this client made.
    ///
    /// The delegate is expected to drive ICE candidate discovery and push
    /// each discovered candidate into `candidates`.
    async fn consume_remote_answer(
        &self,
        offerer_id: &str,
        answerer_id: &str,
        answer: &str,
        candidates: CandidateSink,
    ) {
        let _ = (offerer_id, answerer_id, answer, candidates);
    }

    /// A remote peer trickled an ICE candidate.
    async fn consume_remote_candidate(&self, offerer_id: &str, answerer_id: &str, candidate: &str) {
        let _ = (offerer_id, answerer_id, candidate);
    }

    /// A peer left the rendezvous.
    async fn on_goodbye(&self, id: &str) {
        let _ = id;
    }

    /// An alias was set or removed, whether by this client's own requests or
    /// as a byproduct of a connect handshake.
    async fn on_alias_changed(&self, id: &str, alias: &str, set: bool) {
        let _ = (id, alias, set);
    }
}

/// Handle for sending locally discovered ICE candidates to the peer.
///
/// Bound to one offerer/answerer pair; each candidate goes out as a
/// `candidate` operation tagged with that pair.
#[derive(Clone)]
pub struct CandidateSink {
    offerer_id: String,
    answerer_id: String,
    outbound: mpsc::Sender<Operation>,
}

impl CandidateSink {
    pub(crate) fn new(
        offerer_id: String,
        answerer_id: String,
        outbound: mpsc::Sender<Operation>,
    ) -> Self {
        Self {
            offerer_id,
            answerer_id,
            outbound,
        }
    }

    /// The offerer this sink is bound to.
    pub fn offerer_id(&self) -> &str {
        &self.offerer_id
    }

    /// The answerer this sink is bound to.
    pub fn answerer_id(&self) -> &str {
        &self.answerer_id
    }

    /// Send one candidate to the peer.
    pub async fn send(&self, candidate: String) {
        debug!(
            offerer_id = %self.offerer_id,
            answerer_id = %self.answerer_id,
            "sending candidate"
        );
        let op = Operation::Candidate {
            offerer_id: self.offerer_id.clone(),
            answerer_id: self.answerer_id.clone(),
            candidate,
        };
        if self.outbound.send(op).await.is_err() {
            debug!("candidate dropped: client is gone");
        }
    }
}
