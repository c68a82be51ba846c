//! Error types for query execution
//!
//! This module contains the error taxonomy shared by the planner, the
//! executor and the entity stores.

/// Error raised while validating or executing a GraphQL request
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    /// The selection named a field the parent type does not declare.
    /// Reported per field; the rest of the request is still served.
    #[error("Unknown field \"{field}\" on type \"{parent_type}\"")]
    UnknownField {
        /// The offending field name
        field: String,
        /// The type the field was selected on
        parent_type: String,
    },

    /// The entity store could not be reached. Reported per field.
    #[error("DataSourceUnavailable")]
    DataSourceUnavailable,

    /// The document is malformed or invalid; the whole request is rejected
    #[error("{0}")]
    Validation(String),
}

impl ExecutionError {
    /// Build a validation error from any displayable message
    pub fn validation(message: impl Into<String>) -> Self {
        ExecutionError::Validation(message.into())
    }
}

/// Error type for entity store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store has no table for the requested entity kind
    #[error("unknown entity kind: {0}")]
    UnknownEntity(String),

    /// The backing store is not reachable
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The database driver reported an error
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable held a value that could not be parsed
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue {
        /// Variable name
        name: &'static str,
        /// Raw value as found in the environment
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_field_names_field_and_parent() {
        let err = ExecutionError::UnknownField {
            field: "bogus".to_string(),
            parent_type: "User".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown field \"bogus\" on type \"User\"");
    }

    #[test]
    fn test_data_source_unavailable_message() {
        assert_eq!(
            ExecutionError::DataSourceUnavailable.to_string(),
            "DataSourceUnavailable"
        );
    }
}
