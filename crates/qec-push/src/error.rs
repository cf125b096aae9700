use thiserror::Error;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("store error: {0}")]
    Store(#[from] qec_store::StoreError),
    #[error("push send failed: {0}")]
    WebPush(#[from] web_push::WebPushError),
    #[error("failed to encode push payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("vapid key configuration invalid: {0}")]
    InvalidVapidKey(String),
}

impl PushError {
    /// Transport/signing failures are transient upstream (spec §7); a
    /// malformed configured key pair is a programmer/operator bug, not
    /// worth retrying blindly.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PushError::Store(_) | PushError::WebPush(_) | PushError::Encode(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, PushError::InvalidVapidKey(_))
    }

    /// Web-push "gone"/"not found" responses mean the browser unsubscribed;
    /// the subscription row should be removed rather than retried (spec
    /// §4.7 step 5).
    pub fn is_subscription_gone(&self) -> bool {
        matches!(
            self,
            PushError::WebPush(web_push::WebPushError::EndpointNotValid)
                | PushError::WebPush(web_push::WebPushError::EndpointNotFound)
        )
    }
}
