//! Render layer
//!
//! Turns a cache snapshot into a [`View`]: one list item per user, a loading
//! placeholder while nothing is cached, and an error indicator whenever the
//! last result carried errors. Rendering is pure and never fails; data of an
//! unexpected shape is treated as absent.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::cache::Snapshot;
use crate::error::CombinedError;
use crate::query::User;

/// One rendered element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    /// A user with the bodies of their messages, in returned order
    UserItem { name: String, messages: Vec<String> },
    /// Shown while loading with no data to display
    Loading,
    /// Inline indicator for a failed or partially failed result
    ErrorIndicator(String),
}

/// Rendered output, in display order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct View {
    pub elements: Vec<Element>,
}

impl View {
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Number of user list items
    pub fn item_count(&self) -> usize {
        self.elements
            .iter()
            .filter(|e| matches!(e, Element::UserItem { .. }))
            .count()
    }

    pub fn has_error(&self) -> bool {
        self.elements
            .iter()
            .any(|e| matches!(e, Element::ErrorIndicator(_)))
    }
}

/// Render the snapshot of the users query
pub fn render(snapshot: &Snapshot) -> View {
    render_parts(snapshot.data(), snapshot.error(), snapshot.is_loading())
}

/// Render from the three inputs directly
pub fn render_parts(data: Option<&Value>, error: Option<&CombinedError>, loading: bool) -> View {
    let mut elements = Vec::new();

    match data.and_then(|data| data.get("users")).and_then(Value::as_array) {
        Some(users) => {
            // a malformed record drops only itself
            elements.extend(
                users
                    .iter()
                    .filter_map(|user| User::deserialize(user).ok())
                    .map(|user| Element::UserItem {
                        name: user.name,
                        messages: user.messages.into_iter().map(|m| m.body).collect(),
                    }),
            );
        }
        None if loading => elements.push(Element::Loading),
        None => {}
    }

    if let Some(error) = error {
        elements.push(Element::ErrorIndicator(error.to_string().replace('\n', "; ")));
    }

    View { elements }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for element in &self.elements {
            match element {
                Element::UserItem { name, messages } => {
                    writeln!(f, "* {name}")?;
                    for body in messages {
                        writeln!(f, "  - {body}")?;
                    }
                }
                Element::Loading => writeln!(f, "[loading]")?,
                Element::ErrorIndicator(message) => writeln!(f, "[error] {message}")?,
            }
        }
        Ok(())
    }
}
