//! Operations sent to the API and the results kept for them

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CombinedError, TransportError};

/// A query document with its variables, serialized as the request body
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub query: String,
    pub variables: Map<String, Value>,
}

impl Operation {
    pub fn new(query: impl Into<String>, variables: Map<String, Value>) -> Self {
        Self {
            query: query.into(),
            variables,
        }
    }
}

/// An entry of a response's `errors` list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GraphQLError {
    pub message: String,

    /// Response keys and list indices leading to the failed field
    #[serde(default)]
    pub path: Vec<Value>,
}

/// A decoded `{data, errors}` response body
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResponseBody {
    #[serde(default)]
    pub data: Option<Value>,

    #[serde(default)]
    pub errors: Vec<GraphQLError>,
}

/// What the cache keeps for one key: data, errors, or both
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationResult {
    pub data: Option<Value>,
    pub error: Option<CombinedError>,
}

impl OperationResult {
    /// Result carrying a network failure and no data
    pub fn network_error(err: TransportError) -> Self {
        Self {
            data: None,
            error: Some(CombinedError::network(err)),
        }
    }

    /// Whether the operation ended in any kind of error
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

impl From<ResponseBody> for OperationResult {
    fn from(body: ResponseBody) -> Self {
        Self {
            data: body.data.filter(|data| !data.is_null()),
            error: (!body.errors.is_empty()).then(|| CombinedError::graphql(body.errors)),
        }
    }
}
