//! Static schema registry
//!
//! The schema is an explicit table mapping each object type name to its
//! field descriptors. Every field carries a tagged resolver telling the
//! executor where its value comes from, so there is no reflection over a
//! separate schema definition.

use std::collections::HashMap;
use std::fmt::Write;

use once_cell::sync::Lazy;

/// Name of the root query type
pub const QUERY_TYPE: &str = "Query";

/// Meta field resolvable on every object type
pub const TYPENAME_FIELD: &str = "__typename";

/// A GraphQL object type
#[derive(Debug)]
pub struct ObjectType {
    /// Type name as exposed in the API
    pub name: &'static str,

    /// Declared fields, in declaration order
    pub fields: &'static [FieldDef],
}

impl ObjectType {
    /// Look up a declared field by name
    pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A field on an object type
#[derive(Debug)]
pub struct FieldDef {
    /// Field name
    pub name: &'static str,

    /// Output type
    pub ty: FieldType,

    /// How the field value is produced
    pub resolver: Resolver,
}

/// Output types. All declared fields are non-null.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Id,
    String,
    /// Non-null list of non-null objects of the named type
    List(&'static str),
}

impl FieldType {
    /// Object type name for composite fields
    pub fn object_name(&self) -> Option<&'static str> {
        match self {
            FieldType::List(name) => Some(name),
            FieldType::Id | FieldType::String => None,
        }
    }

    /// Whether the field is a leaf in a selection
    pub fn is_leaf(&self) -> bool {
        self.object_name().is_none()
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::Id => f.write_str("ID!"),
            FieldType::String => f.write_str("String!"),
            FieldType::List(name) => write!(f, "[{}!]!", name),
        }
    }
}

/// Tagged resolver variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolver {
    /// Root field: forward the sub-selection to `EntityStore::find_many`
    FindMany {
        /// Entity kind passed to the store
        entity: &'static str,
    },

    /// Scalar read from the parent record
    Column,

    /// Nested records read from the parent record
    Relation {
        /// Related object type
        target: &'static str,
    },
}

pub static QUERY: ObjectType = ObjectType {
    name: QUERY_TYPE,
    fields: &[FieldDef {
        name: "users",
        ty: FieldType::List("User"),
        resolver: Resolver::FindMany { entity: "User" },
    }],
};

pub static USER: ObjectType = ObjectType {
    name: "User",
    fields: &[
        FieldDef {
            name: "id",
            ty: FieldType::Id,
            resolver: Resolver::Column,
        },
        FieldDef {
            name: "name",
            ty: FieldType::String,
            resolver: Resolver::Column,
        },
        FieldDef {
            name: "messages",
            ty: FieldType::List("Message"),
            resolver: Resolver::Relation { target: "Message" },
        },
    ],
};

pub static MESSAGE: ObjectType = ObjectType {
    name: "Message",
    fields: &[
        FieldDef {
            name: "id",
            ty: FieldType::Id,
            resolver: Resolver::Column,
        },
        FieldDef {
            name: "body",
            ty: FieldType::String,
            resolver: Resolver::Column,
        },
    ],
};

/// All object types, root first
pub static TYPES: &[&ObjectType] = &[&QUERY, &USER, &MESSAGE];

static BY_NAME: Lazy<HashMap<&'static str, &'static ObjectType>> =
    Lazy::new(|| TYPES.iter().map(|t| (t.name, *t)).collect());

/// Look up an object type by name
pub fn object(name: &str) -> Option<&'static ObjectType> {
    BY_NAME.get(name).copied()
}

/// Print the registry as GraphQL SDL
pub fn sdl() -> String {
    let mut out = String::new();
    for (i, ty) in TYPES.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "type {} {{", ty.name);
        for field in ty.fields {
            let _ = writeln!(out, "  {}: {}", field.name, field.ty);
        }
        out.push_str("}\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_declared_types() {
        assert_eq!(object("Query").map(|t| t.name), Some("Query"));
        assert_eq!(object("User").map(|t| t.name), Some("User"));
        assert_eq!(object("Message").map(|t| t.name), Some("Message"));
        assert!(object("Post").is_none());
    }

    #[test]
    fn test_relation_targets_are_registered() {
        for ty in TYPES {
            for field in ty.fields {
                if let Some(target) = field.ty.object_name() {
                    assert!(object(target).is_some(), "{}.{}", ty.name, field.name);
                }
                if let Resolver::Relation { target } = field.resolver {
                    assert_eq!(field.ty.object_name(), Some(target));
                }
            }
        }
    }

    #[test]
    fn test_sdl_output() {
        let sdl = sdl();
        assert!(sdl.contains("type Query {\n  users: [User!]!\n}"));
        assert!(sdl.contains("  messages: [Message!]!"));
        assert!(sdl.contains("type Message {\n  id: ID!\n  body: String!\n}"));
    }
}
