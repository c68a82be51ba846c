//! SeaORM-backed entity store
//!
//! Users and messages live in two tables joined through `messages.user_id`.
//! Relations are fetched with one batched query per level rather than one
//! query per parent row.

use async_trait::async_trait;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, EntityTrait, LoaderTrait,
    QueryOrder, Schema,
};

use super::{EntityStore, FieldValue, Projection, Record};
use crate::error::StoreError;

/// SeaORM entity definitions
pub mod entity {
    /// `users` table
    pub mod user {
        use sea_orm::entity::prelude::*;

        #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
        #[sea_orm(table_name = "users")]
        pub struct Model {
            #[sea_orm(primary_key)]
            pub id: i32,
            pub name: String,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {
            #[sea_orm(has_many = "super::message::Entity")]
            Message,
        }

        impl Related<super::message::Entity> for Entity {
            fn to() -> RelationDef {
                Relation::Message.def()
            }
        }

        impl ActiveModelBehavior for ActiveModel {}
    }

    /// `messages` table
    pub mod message {
        use sea_orm::entity::prelude::*;

        #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
        #[sea_orm(table_name = "messages")]
        pub struct Model {
            #[sea_orm(primary_key)]
            pub id: i32,
            pub body: String,
            pub user_id: i32,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {
            #[sea_orm(
                belongs_to = "super::user::Entity",
                from = "Column::UserId",
                to = "super::user::Column::Id"
            )]
            User,
        }

        impl Related<super::user::Entity> for Entity {
            fn to() -> RelationDef {
                Relation::User.def()
            }
        }

        impl ActiveModelBehavior for ActiveModel {}
    }
}

use entity::{message, user};

/// Entity store reading through a SeaORM connection
#[derive(Debug, Clone)]
pub struct SeaOrmStore {
    db: DatabaseConnection,
}

impl SeaOrmStore {
    /// Wrap an existing connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Connect to `url` and create any missing tables
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let mut options = ConnectOptions::new(url);
        options.sqlx_logging(false);
        if url.contains(":memory:") {
            // each pooled connection would otherwise see its own database
            options.max_connections(1);
        }

        let store = Self::new(Database::connect(options).await?);
        store.create_tables().await?;
        Ok(store)
    }

    /// Create the `users` and `messages` tables if they do not exist
    pub async fn create_tables(&self) -> Result<(), StoreError> {
        let backend = self.db.get_database_backend();
        let schema = Schema::new(backend);

        let mut users = schema.create_table_from_entity(user::Entity);
        users.if_not_exists();
        self.db.execute(backend.build(&users)).await?;

        let mut messages = schema.create_table_from_entity(message::Entity);
        messages.if_not_exists();
        self.db.execute(backend.build(&messages)).await?;

        tracing::debug!("entity tables ready");
        Ok(())
    }

    /// Underlying connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn find_users(&self, projection: &Projection) -> Result<Vec<Record>, StoreError> {
        let users = user::Entity::find()
            .order_by_asc(user::Column::Id)
            .all(&self.db)
            .await?;

        let messages = match projection.nested("messages") {
            Some(_) if users.is_empty() => Vec::new(),
            Some(_) => {
                users
                    .load_many(
                        message::Entity::find().order_by_asc(message::Column::Id),
                        &self.db,
                    )
                    .await?
            }
            None => Vec::new(),
        };

        Ok(users
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let mut record = Record::new();
                for name in projection.names() {
                    let value = match name {
                        "id" => FieldValue::Scalar(row.id.to_string()),
                        "name" => FieldValue::Scalar(row.name.clone()),
                        "messages" => {
                            let nested = projection.nested(name).cloned().unwrap_or_default();
                            FieldValue::Records(
                                messages
                                    .get(i)
                                    .map(|rows| {
                                        rows.iter().map(|m| message_record(m, &nested)).collect()
                                    })
                                    .unwrap_or_default(),
                            )
                        }
                        _ => continue,
                    };
                    record.insert(name, value);
                }
                record
            })
            .collect())
    }

    async fn find_messages(&self, projection: &Projection) -> Result<Vec<Record>, StoreError> {
        let rows = message::Entity::find()
            .order_by_asc(message::Column::Id)
            .all(&self.db)
            .await?;
        Ok(rows.iter().map(|m| message_record(m, projection)).collect())
    }
}

fn message_record(row: &message::Model, projection: &Projection) -> Record {
    let mut record = Record::new();
    for name in projection.names() {
        let value = match name {
            "id" => FieldValue::Scalar(row.id.to_string()),
            "body" => FieldValue::Scalar(row.body.clone()),
            _ => continue,
        };
        record.insert(name, value);
    }
    record
}

#[async_trait]
impl EntityStore for SeaOrmStore {
    async fn find_many(
        &self,
        entity_kind: &str,
        projection: &Projection,
    ) -> Result<Vec<Record>, StoreError> {
        match entity_kind {
            "User" => self.find_users(projection).await,
            "Message" => self.find_messages(projection).await,
            other => Err(StoreError::UnknownEntity(other.to_string())),
        }
    }
}
