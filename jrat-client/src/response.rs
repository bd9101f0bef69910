//! Settled call outcome
//!
//! A [`Response`] is what a call resolves to when errors are not rejected:
//! `call_with(.., CallOptions { reject_on_error: false })` and every slot of
//! a batch. Exactly one of `error` and `result` is set. Both always
//! serialize, the unset one as `null`.

use jrat_core::{Error, Result, RpcError};
use serde::{Deserialize, Serialize};

/// `{error, result}` pair with exactly one side set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Protocol error, including the timeout sentinel
    pub error: Option<RpcError>,
    /// Result value on success
    pub result: Option<serde_json::Value>,
}

impl Response {
    /// Successful response
    pub fn success(result: serde_json::Value) -> Self {
        Self {
            error: None,
            result: Some(result),
        }
    }

    /// Failed response
    pub fn failure(error: RpcError) -> Self {
        Self {
            error: Some(error),
            result: None,
        }
    }

    /// Fold a call outcome into a response
    ///
    /// Protocol errors and timeouts become the error side. Any other failure
    /// (transport, shutdown, ...) cannot be represented and is returned as-is.
    pub fn from_outcome(outcome: Result<serde_json::Value>) -> Result<Self> {
        match outcome {
            Ok(result) => Ok(Self::success(result)),
            Err(error) => match error.protocol_error() {
                Some(rpc) => Ok(Self::failure(rpc)),
                None => Err(error),
            },
        }
    }

    /// Whether this is a success
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Whether this is the timeout sentinel
    pub fn is_timeout(&self) -> bool {
        self.error.as_ref().map(RpcError::is_timeout).unwrap_or(false)
    }

    /// Convert back into a result, mapping the timeout sentinel to `Error::Timeout`
    pub fn into_result(self) -> Result<serde_json::Value> {
        match self.error {
            Some(error) if error.is_timeout() => Err(Error::Timeout),
            Some(error) => Err(Error::Rpc(error)),
            None => Ok(self.result.unwrap_or(serde_json::Value::Null)),
        }
    }
}
