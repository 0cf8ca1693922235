//! Error types for the signaling client.
//!
//! Protocol-level rejections are local to one request and carry their
//! correlation key. Transport failures never appear here: they are absorbed
//! by the reconnect cycle.

/// Failure of one bind/shutdown/connect request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// The server rejected the bind; carries the correlation key.
    BindRejected(String),
    /// The server refused to remove the alias; carries the correlation key.
    ShutdownRejected(String),
    /// The connect handshake was rejected; carries the correlation key.
    ConnectionRejected(String),
    /// The client was shut down while the request was pending.
    ClientClosed,
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestError::BindRejected(key) => write!(f, "bind rejected: {key}"),
            RequestError::ShutdownRejected(key) => write!(f, "shutdown rejected: {key}"),
            RequestError::ConnectionRejected(key) => write!(f, "connection rejected: {key}"),
            RequestError::ClientClosed => write!(f, "client closed while request was pending"),
        }
    }
}

impl std::error::Error for RequestError {}

/// Failure to handle one inbound operation. Fatal to the message, never to
/// the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// A recognized opcode this client does not handle (bind, shutdown and
    /// connect are only ever sent, not received).
    Unimplemented(&'static str),
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::Unimplemented(opcode) => {
                write!(f, "unimplemented operation: {opcode}")
            }
        }
    }
}

impl std::error::Error for DispatchError {}
