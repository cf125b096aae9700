use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("not connected to upstream RPC")]
    NotConnected,
    #[error("rpc call failed: {0}")]
    Call(#[from] jsonrpsee::core::ClientError),
    #[error("rpc returned a value that failed to decode: {0}")]
    Decode(#[from] serde_json::Error),
}

impl RpcError {
    /// Transient upstream (spec §7): timeouts/disconnects retry on the next
    /// cycle or via the client's own reconnect loop.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RpcError::NotConnected | RpcError::Call(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, RpcError::Decode(_))
    }
}
