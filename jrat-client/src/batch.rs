//! Prepared calls and batch shapes
//!
//! JSON-RPC 2.0 allows sending multiple requests in a single message array.
//! Batching here is two-phase:
//!
//! 1. `ClientSession::prepare` registers a call and hands back a
//!    [`PreparedCall`]. Its correlation id exists from this point on, but
//!    nothing has been sent and no timer runs yet.
//! 2. `ClientSession::batch` takes a list or a keyed map of prepared calls,
//!    flushes the unsent ones as one transport message and resolves to a
//!    [`BatchResponse`] of the same shape.
//!
//! # Examples
//!
//! ```rust,no_run
//! use jrat_client::{BatchResponse, ClientSession};
//! use std::collections::BTreeMap;
//!
//! # async fn example(session: &ClientSession) -> jrat_core::Result<()> {
//! let sum = session.prepare("add", [5, 3])?;
//! let greeting = session.prepare("greet", serde_json::json!({"name": "Ada"}))?;
//!
//! // List in, list out, same order
//! let responses = session.batch(vec![sum, greeting]).await?;
//! assert_eq!(responses.len(), 2);
//!
//! // Keyed map in, keyed map out
//! let mut calls = BTreeMap::new();
//! calls.insert("sum".to_string(), session.prepare("add", [1, 1])?);
//! if let BatchResponse::Map(responses) = session.batch(calls).await? {
//!     println!("sum: {:?}", responses["sum"].result);
//! }
//! # Ok(())
//! # }
//! ```

use crate::client::{ClientSession, SessionInner};
use crate::engine::{CallOutcome, PendingHandle};
use crate::response::Response;
use jrat_core::{Error, Id, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::oneshot;

/// A registered call that has not necessarily been transmitted yet
///
/// Dropping a prepared call that was never flushed unregisters it.
pub struct PreparedCall {
    session: Arc<SessionInner>,
    id: Id,
    method: String,
    receiver: Option<oneshot::Receiver<CallOutcome>>,
}

impl PreparedCall {
    pub(crate) fn new(session: Arc<SessionInner>, handle: PendingHandle, method: &str) -> Self {
        Self {
            session,
            id: handle.id,
            method: method.to_string(),
            receiver: Some(handle.receiver),
        }
    }

    /// Correlation id of the call
    pub fn id(&self) -> &Id {
        &self.id
    }

    /// Method name of the call
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Flush this call on its own and wait for it, like a batch of one
    pub async fn settle(self) -> Result<Response> {
        let session = ClientSession::from_inner(Arc::clone(&self.session));
        match session.batch(vec![self]).await? {
            BatchResponse::List(mut responses) => responses
                .pop()
                .ok_or_else(|| Error::Internal("batch of one resolved empty".to_string())),
            BatchResponse::Map(_) => Err(Error::Internal(
                "batch of one resolved to a map".to_string(),
            )),
        }
    }

    pub(crate) fn belongs_to(&self, session: &Arc<SessionInner>) -> bool {
        Arc::ptr_eq(&self.session, session)
    }

    pub(crate) async fn wait(mut self) -> CallOutcome {
        let Some(receiver) = self.receiver.take() else {
            return Err(Error::Internal("prepared call awaited twice".to_string()));
        };
        receiver.await.unwrap_or(Err(Error::Shutdown))
    }
}

impl Drop for PreparedCall {
    fn drop(&mut self) {
        if self.receiver.is_some() {
            self.session.discard_unsent(&self.id);
        }
    }
}

impl std::fmt::Debug for PreparedCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedCall")
            .field("id", &self.id)
            .field("method", &self.method)
            .finish()
    }
}

/// Input of `ClientSession::batch`
#[derive(Debug)]
pub enum BatchRequest {
    /// Ordered calls; the response keeps the order
    List(Vec<PreparedCall>),
    /// Keyed calls; the response keeps the key set
    Map(BTreeMap<String, PreparedCall>),
}

impl BatchRequest {
    /// Number of calls
    pub fn len(&self) -> usize {
        match self {
            BatchRequest::List(calls) => calls.len(),
            BatchRequest::Map(calls) => calls.len(),
        }
    }

    /// Whether there are no calls
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn into_parts(self) -> (BatchShape, Vec<PreparedCall>) {
        match self {
            BatchRequest::List(calls) => (BatchShape::List, calls),
            BatchRequest::Map(calls) => {
                let (keys, calls) = calls.into_iter().unzip();
                (BatchShape::Map(keys), calls)
            }
        }
    }
}

impl From<Vec<PreparedCall>> for BatchRequest {
    fn from(calls: Vec<PreparedCall>) -> Self {
        BatchRequest::List(calls)
    }
}

impl<const N: usize> From<[PreparedCall; N]> for BatchRequest {
    fn from(calls: [PreparedCall; N]) -> Self {
        BatchRequest::List(calls.into())
    }
}

impl From<BTreeMap<String, PreparedCall>> for BatchRequest {
    fn from(calls: BTreeMap<String, PreparedCall>) -> Self {
        BatchRequest::Map(calls)
    }
}

impl From<HashMap<String, PreparedCall>> for BatchRequest {
    fn from(calls: HashMap<String, PreparedCall>) -> Self {
        BatchRequest::Map(calls.into_iter().collect())
    }
}

/// Shape of a batch input, used to rebuild the output
pub(crate) enum BatchShape {
    List,
    Map(Vec<String>),
}

impl BatchShape {
    pub(crate) fn rebuild(self, responses: Vec<Response>) -> BatchResponse {
        match self {
            BatchShape::List => BatchResponse::List(responses),
            BatchShape::Map(keys) => BatchResponse::Map(keys.into_iter().zip(responses).collect()),
        }
    }
}

/// Output of `ClientSession::batch`, shaped like its input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchResponse {
    /// Responses in input order
    List(Vec<Response>),
    /// Responses under the input keys
    Map(BTreeMap<String, Response>),
}

impl BatchResponse {
    /// Number of responses
    pub fn len(&self) -> usize {
        match self {
            BatchResponse::List(responses) => responses.len(),
            BatchResponse::Map(responses) => responses.len(),
        }
    }

    /// Whether there are no responses
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Response at `index` of a list batch
    pub fn at(&self, index: usize) -> Option<&Response> {
        match self {
            BatchResponse::List(responses) => responses.get(index),
            BatchResponse::Map(_) => None,
        }
    }

    /// Response under `key` of a map batch
    pub fn get(&self, key: &str) -> Option<&Response> {
        match self {
            BatchResponse::Map(responses) => responses.get(key),
            BatchResponse::List(_) => None,
        }
    }

    /// Whether every call succeeded
    pub fn all_success(&self) -> bool {
        match self {
            BatchResponse::List(responses) => responses.iter().all(Response::is_success),
            BatchResponse::Map(responses) => responses.values().all(Response::is_success),
        }
    }

    /// The list of a list batch
    pub fn into_list(self) -> Option<Vec<Response>> {
        match self {
            BatchResponse::List(responses) => Some(responses),
            BatchResponse::Map(_) => None,
        }
    }

    /// The map of a map batch
    pub fn into_map(self) -> Option<BTreeMap<String, Response>> {
        match self {
            BatchResponse::Map(responses) => Some(responses),
            BatchResponse::List(_) => None,
        }
    }
}
