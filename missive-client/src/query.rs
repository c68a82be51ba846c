//! The users query and its typed result

use serde::{Deserialize, Deserializer};

/// Every user with their messages
pub const GET_USERS: &str = "query GetUsers { users { id name messages { body } } }";

/// `data` of [`GET_USERS`]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UsersData {
    pub users: Vec<User>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,

    /// A nulled relation reads as no messages
    #[serde(default, deserialize_with = "null_as_empty")]
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Message {
    pub body: String,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
