//! In-process entity store

use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use super::{EntityStore, FieldValue, Projection, Record};
use crate::error::StoreError;

/// A user row
#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub name: String,
}

/// A message row, owned by a user through `user_id`
#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub body: String,
    pub user_id: String,
}

#[derive(Debug, Default)]
struct Tables {
    users: Vec<UserRow>,
    messages: Vec<MessageRow>,
}

/// Entity store holding its tables in memory
///
/// Rows are returned in insertion order. The store can be marked
/// unavailable to model an unreachable database.
#[derive(Debug)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            available: AtomicBool::new(true),
        }
    }

    /// Store seeded with the demo user and messages
    pub fn demo() -> Self {
        let store = Self::new();
        store.insert_user("1", "Prisma Fan");
        store.insert_message("1", "Prisma rocks!", "1");
        store.insert_message("2", "Did I mention I Love Prisma?", "1");
        store
    }

    pub fn insert_user(&self, id: impl Into<String>, name: impl Into<String>) {
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        tables.users.push(UserRow {
            id: id.into(),
            name: name.into(),
        });
    }

    pub fn insert_message(
        &self,
        id: impl Into<String>,
        body: impl Into<String>,
        user_id: impl Into<String>,
    ) {
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        tables.messages.push(MessageRow {
            id: id.into(),
            body: body.into(),
            user_id: user_id.into(),
        });
    }

    /// Toggle reachability; an unavailable store fails every read
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn message_record(row: &MessageRow, projection: &Projection) -> Record {
        let mut record = Record::new();
        for name in projection.names() {
            let value = match name {
                "id" => FieldValue::Scalar(row.id.clone()),
                "body" => FieldValue::Scalar(row.body.clone()),
                _ => continue,
            };
            record.insert(name, value);
        }
        record
    }

    fn user_record(tables: &Tables, row: &UserRow, projection: &Projection) -> Record {
        let mut record = Record::new();
        for name in projection.names() {
            let value = match name {
                "id" => FieldValue::Scalar(row.id.clone()),
                "name" => FieldValue::Scalar(row.name.clone()),
                "messages" => {
                    let nested = projection.nested(name).cloned().unwrap_or_default();
                    FieldValue::Records(
                        tables
                            .messages
                            .iter()
                            .filter(|m| m.user_id == row.id)
                            .map(|m| Self::message_record(m, &nested))
                            .collect(),
                    )
                }
                _ => continue,
            };
            record.insert(name, value);
        }
        record
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn find_many(
        &self,
        entity_kind: &str,
        projection: &Projection,
    ) -> Result<Vec<Record>, StoreError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".to_string()));
        }

        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        match entity_kind {
            "User" => Ok(tables
                .users
                .iter()
                .map(|row| Self::user_record(&tables, row, projection))
                .collect()),
            "Message" => Ok(tables
                .messages
                .iter()
                .map(|row| Self::message_record(row, projection))
                .collect()),
            other => Err(StoreError::UnknownEntity(other.to_string())),
        }
    }
}
