//! Query execution
//!
//! Root fields are resolved concurrently against the entity store, each call
//! bounded by a timeout. Nested fields are then completed from the records
//! the store returned, so the result tree always mirrors the planned
//! selection no matter in which order root fields finish.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::{Map, Value};

use crate::error::ExecutionError;
use crate::plan::{self, FieldTarget, PlannedField};
use crate::response::{GraphQLError, PathSegment, Request, Response};
use crate::schema::{self, ObjectType, Resolver};
use crate::store::{EntityStore, FieldValue, Record};

/// Default bound on a single entity store read
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Executes GraphQL requests against an entity store
#[derive(Clone)]
pub struct Executor {
    store: Arc<dyn EntityStore>,
    store_timeout: Duration,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("store_timeout", &self.store_timeout)
            .finish_non_exhaustive()
    }
}

impl Executor {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            store,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Override the per-read store timeout
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Execute one request
    ///
    /// Malformed or invalid documents yield `data: null` and a single error.
    /// Otherwise every requested root field is present in `data`, failed
    /// fields as `null` with an error entry.
    pub async fn execute(&self, request: &Request) -> Response {
        let document = match async_graphql_parser::parse_query(&request.query) {
            Ok(document) => document,
            Err(err) => {
                tracing::debug!(error = %err, "rejecting unparsable document");
                return Response::rejected(ExecutionError::validation(format!("Syntax Error: {err}")));
            }
        };

        let empty = Map::new();
        let variables = request.variables.as_ref().unwrap_or(&empty);
        let plan = match plan::plan(&document, request.operation_name.as_deref(), variables) {
            Ok(plan) => plan,
            Err(err) => {
                tracing::debug!(error = %err, "rejecting invalid document");
                return Response::rejected(err);
            }
        };

        let mut errors = plan.errors;
        let resolved = join_all(plan.fields.iter().map(|field| self.resolve_root(field))).await;

        let mut data = Map::new();
        for (field, (value, field_errors)) in plan.fields.iter().zip(resolved) {
            data.insert(field.response_key.clone(), value);
            errors.extend(field_errors);
        }

        Response {
            data: Value::Object(data),
            errors,
        }
    }

    async fn resolve_root(&self, field: &PlannedField) -> (Value, Vec<GraphQLError>) {
        let mut errors = Vec::new();
        let mut path = vec![PathSegment::Key(field.response_key.clone())];

        let value = match field.target {
            FieldTarget::Declared(def) => match def.resolver {
                Resolver::FindMany { entity } => {
                    match self.find_many(entity, &field.children).await {
                        Ok(records) => match schema::object(entity) {
                            Some(object) => {
                                complete_list(object, &records, &field.children, &mut path, &mut errors)
                            }
                            None => field_error(
                                ExecutionError::validation(format!("Unknown type \"{entity}\"")),
                                &path,
                                &mut errors,
                            ),
                        },
                        Err(err) => field_error(err, &path, &mut errors),
                    }
                }
                Resolver::Column | Resolver::Relation { .. } => {
                    complete_field(&schema::QUERY, &Record::new(), field, &mut path, &mut errors)
                }
            },
            FieldTarget::Typename => Value::String(schema::QUERY_TYPE.to_string()),
        };

        (value, errors)
    }

    /// Forward the sub-selection to the store as a projection
    async fn find_many(
        &self,
        entity: &'static str,
        children: &[PlannedField],
    ) -> Result<Vec<Record>, ExecutionError> {
        let projection = plan::projection(children);
        match tokio::time::timeout(self.store_timeout, self.store.find_many(entity, &projection)).await {
            Ok(Ok(records)) => {
                tracing::debug!(entity, count = records.len(), "entity store read");
                Ok(records)
            }
            Ok(Err(err)) => {
                tracing::warn!(entity, error = %err, "entity store read failed");
                Err(ExecutionError::DataSourceUnavailable)
            }
            Err(_) => {
                tracing::warn!(entity, timeout = ?self.store_timeout, "entity store read timed out");
                Err(ExecutionError::DataSourceUnavailable)
            }
        }
    }
}

fn field_error(error: ExecutionError, path: &[PathSegment], errors: &mut Vec<GraphQLError>) -> Value {
    errors.push(GraphQLError::new(&error, path.to_vec()));
    Value::Null
}

fn complete_list(
    object: &'static ObjectType,
    records: &[Record],
    fields: &[PlannedField],
    path: &mut Vec<PathSegment>,
    errors: &mut Vec<GraphQLError>,
) -> Value {
    let items = records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            path.push(PathSegment::Index(i));
            let item = complete_object(object, record, fields, path, errors);
            path.pop();
            item
        })
        .collect();
    Value::Array(items)
}

fn complete_object(
    object: &'static ObjectType,
    record: &Record,
    fields: &[PlannedField],
    path: &mut Vec<PathSegment>,
    errors: &mut Vec<GraphQLError>,
) -> Value {
    let mut out = Map::new();
    for field in fields {
        path.push(PathSegment::Key(field.response_key.clone()));
        let value = complete_field(object, record, field, path, errors);
        path.pop();
        out.insert(field.response_key.clone(), value);
    }
    Value::Object(out)
}

fn complete_field(
    object: &'static ObjectType,
    record: &Record,
    field: &PlannedField,
    path: &mut Vec<PathSegment>,
    errors: &mut Vec<GraphQLError>,
) -> Value {
    let def = match field.target {
        FieldTarget::Typename => return Value::String(object.name.to_string()),
        FieldTarget::Declared(def) => def,
    };

    let missing = || {
        ExecutionError::validation(format!(
            "Cannot return null for non-nullable field {}.{}",
            object.name, def.name
        ))
    };

    match (def.resolver, record.get(def.name)) {
        (Resolver::Column, Some(FieldValue::Scalar(value))) => Value::String(value.clone()),
        (Resolver::Relation { target }, Some(FieldValue::Records(records))) => {
            match schema::object(target) {
                Some(related) => complete_list(related, records, &field.children, path, errors),
                None => field_error(missing(), path, errors),
            }
        }
        _ => field_error(missing(), path, errors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::{MemoryStore, Projection};
    use async_trait::async_trait;
    use serde_json::json;

    fn executor(store: MemoryStore) -> Executor {
        Executor::new(Arc::new(store))
    }

    async fn run(executor: &Executor, query: &str) -> Value {
        serde_json::to_value(executor.execute(&Request::new(query)).await).unwrap()
    }

    #[tokio::test]
    async fn test_users_with_messages() {
        let executor = executor(MemoryStore::demo());
        let response = run(&executor, "{ users { id name messages { body } } }").await;
        assert_eq!(
            response,
            json!({
                "data": {
                    "users": [{
                        "id": "1",
                        "name": "Prisma Fan",
                        "messages": [
                            { "body": "Prisma rocks!" },
                            { "body": "Did I mention I Love Prisma?" }
                        ]
                    }]
                }
            })
        );
    }

    #[tokio::test]
    async fn test_result_keys_follow_request_order() {
        let executor = executor(MemoryStore::demo());
        let response = executor
            .execute(&Request::new("{ users { name __typename author: id } }"))
            .await;
        let user = &response.data["users"][0];
        let keys: Vec<_> = user.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["name", "__typename", "author"]);
        assert_eq!(user["__typename"], json!("User"));
        assert_eq!(user["author"], json!("1"));
    }

    #[tokio::test]
    async fn test_empty_store() {
        let executor = executor(MemoryStore::new());
        let response = run(&executor, "{ users { id name messages { body } } }").await;
        assert_eq!(response, json!({ "data": { "users": [] } }));
    }

    #[tokio::test]
    async fn test_unavailable_store_is_a_field_error() {
        let store = MemoryStore::demo();
        store.set_available(false);
        let executor = executor(store);

        let response = run(&executor, "{ users { id name messages { body } } }").await;
        assert_eq!(
            response,
            json!({
                "data": { "users": null },
                "errors": [{ "message": "DataSourceUnavailable", "path": ["users"] }]
            })
        );
    }

    #[tokio::test]
    async fn test_unknown_field_keeps_siblings() {
        let executor = executor(MemoryStore::demo());
        let response = run(&executor, "{ users { name nickname } }").await;
        assert_eq!(
            response,
            json!({
                "data": { "users": [{ "name": "Prisma Fan" }] },
                "errors": [{
                    "message": "Unknown field \"nickname\" on type \"User\"",
                    "path": ["users", "nickname"]
                }]
            })
        );
    }

    #[tokio::test]
    async fn test_syntax_error_rejects_request() {
        let executor = executor(MemoryStore::demo());
        let response = executor.execute(&Request::new("{ users { id ")).await;
        assert_eq!(response.data, Value::Null);
        assert_eq!(response.errors.len(), 1);
        assert!(response.errors[0].message.starts_with("Syntax Error"));
        assert!(response.errors[0].path.is_empty());
    }

    #[tokio::test]
    async fn test_repeated_execution_is_identical() {
        let executor = executor(MemoryStore::demo());
        let query = "{ users { id name messages { id body } } }";
        let first = serde_json::to_vec(&executor.execute(&Request::new(query)).await).unwrap();
        let second = serde_json::to_vec(&executor.execute(&Request::new(query)).await).unwrap();
        assert_eq!(first, second);
    }

    /// Fails whenever messages are requested
    struct FlakyStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl EntityStore for FlakyStore {
        async fn find_many(
            &self,
            entity_kind: &str,
            projection: &Projection,
        ) -> Result<Vec<Record>, StoreError> {
            if projection.contains("messages") {
                return Err(StoreError::Unavailable("messages shard down".to_string()));
            }
            self.inner.find_many(entity_kind, projection).await
        }
    }

    #[tokio::test]
    async fn test_sibling_root_fields_fail_independently() {
        let executor = Executor::new(Arc::new(FlakyStore {
            inner: MemoryStore::demo(),
        }));
        let response = run(
            &executor,
            "{ plain: users { name } full: users { messages { body } } }",
        )
        .await;
        assert_eq!(
            response,
            json!({
                "data": { "plain": [{ "name": "Prisma Fan" }], "full": null },
                "errors": [{ "message": "DataSourceUnavailable", "path": ["full"] }]
            })
        );
    }

    /// Answers `id` selections late and records completion order
    struct StaggeredStore {
        inner: MemoryStore,
        finished: std::sync::Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl EntityStore for StaggeredStore {
        async fn find_many(
            &self,
            entity_kind: &str,
            projection: &Projection,
        ) -> Result<Vec<Record>, StoreError> {
            let label = if projection.contains("id") {
                tokio::time::sleep(Duration::from_millis(50)).await;
                "id"
            } else {
                "name"
            };
            self.finished.lock().unwrap().push(label);
            self.inner.find_many(entity_kind, projection).await
        }
    }

    #[tokio::test]
    async fn test_root_fields_keep_request_order_when_finishing_out_of_order() {
        let store = Arc::new(StaggeredStore {
            inner: MemoryStore::demo(),
            finished: std::sync::Mutex::new(Vec::new()),
        });
        let executor = Executor::new(store.clone());
        let response = executor
            .execute(&Request::new("{ slow: users { id } fast: users { name } }"))
            .await;

        assert_eq!(*store.finished.lock().unwrap(), vec!["name", "id"]);
        let keys: Vec<_> = response.data.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["slow", "fast"]);
        assert_eq!(response.data["slow"], json!([{ "id": "1" }]));
        assert_eq!(response.data["fast"], json!([{ "name": "Prisma Fan" }]));
    }

    struct SlowStore;

    #[async_trait]
    impl EntityStore for SlowStore {
        async fn find_many(&self, _: &str, _: &Projection) -> Result<Vec<Record>, StoreError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_store_timeout() {
        let executor = Executor::new(Arc::new(SlowStore)).with_store_timeout(Duration::from_millis(50));
        let response = executor.execute(&Request::new("{ users { id } }")).await;
        assert_eq!(response.data, json!({ "users": null }));
        assert_eq!(response.errors[0].message, "DataSourceUnavailable");
    }

    struct MissingColumnStore;

    #[async_trait]
    impl EntityStore for MissingColumnStore {
        async fn find_many(&self, _: &str, _: &Projection) -> Result<Vec<Record>, StoreError> {
            Ok(vec![Record::new().with("id", FieldValue::Scalar("7".to_string()))])
        }
    }

    #[tokio::test]
    async fn test_missing_column_nulls_only_that_field() {
        let executor = Executor::new(Arc::new(MissingColumnStore));
        let response = run(&executor, "{ users { id name } }").await;
        assert_eq!(response["data"], json!({ "users": [{ "id": "7", "name": null }] }));
        assert_eq!(response["errors"][0]["path"], json!(["users", 0, "name"]));
    }
}
