//! Selection planning
//!
//! Checks a parsed document against the schema registry and turns the chosen
//! operation into a tree of planned fields. Fragments are expanded,
//! `@skip`/`@include` are evaluated and selections sharing a response key are
//! merged, so the executor only ever walks declared fields.
//!
//! Unknown fields are the one per-field failure: they are dropped from the
//! plan and reported in [`Plan::errors`]. Everything else that is wrong with a
//! document rejects the whole request.

use async_graphql_parser::Positioned;
use async_graphql_parser::types::{
    Directive, DocumentOperations, ExecutableDocument, Field, FragmentDefinition,
    OperationDefinition, OperationType, Selection, SelectionSet,
};
use async_graphql_value::{ConstValue, Value};
use serde_json::{Map, Value as JsonValue};

use crate::error::ExecutionError;
use crate::response::{GraphQLError, PathSegment};
use crate::schema::{self, FieldDef, ObjectType, TYPENAME_FIELD};
use crate::store::Projection;

/// What a planned field reads
#[derive(Debug, Clone, Copy)]
pub enum FieldTarget {
    /// The `__typename` meta field
    Typename,
    /// A field declared in the registry
    Declared(&'static FieldDef),
}

/// A validated field selection
#[derive(Debug, Clone)]
pub struct PlannedField {
    /// Alias if given, otherwise the field name
    pub response_key: String,
    pub target: FieldTarget,
    /// Sub-selection, empty for leaves
    pub children: Vec<PlannedField>,
}

/// The planned root selection of an operation
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub fields: Vec<PlannedField>,
    /// Per-field errors found while planning
    pub errors: Vec<GraphQLError>,
}

/// Build the store projection requested by a planned selection
///
/// Aliases collapse: the store sees field names only.
pub fn projection(fields: &[PlannedField]) -> Projection {
    let mut projection = Projection::new();
    for field in fields {
        if let FieldTarget::Declared(def) = field.target {
            if def.ty.is_leaf() {
                projection.add_scalar(def.name);
            } else {
                projection.add_relation(def.name, self::projection(&field.children));
            }
        }
    }
    projection
}

/// Plan the operation named `operation_name` (or the only one) of `document`
pub fn plan(
    document: &ExecutableDocument,
    operation_name: Option<&str>,
    variables: &Map<String, JsonValue>,
) -> Result<Plan, ExecutionError> {
    let operation = select_operation(document, operation_name)?;
    match operation.ty {
        OperationType::Query => {}
        OperationType::Mutation => {
            return Err(ExecutionError::validation("Mutations are not supported"));
        }
        OperationType::Subscription => {
            return Err(ExecutionError::validation("Subscriptions are not supported"));
        }
    }
    check_fragment_cycles(document)?;

    let mut planner = Planner {
        document,
        operation,
        variables,
        errors: Vec::new(),
    };
    let fields = planner.plan_selection(
        &schema::QUERY,
        &[&operation.selection_set.node],
        &mut Vec::new(),
    )?;

    Ok(Plan {
        fields,
        errors: planner.errors,
    })
}

fn select_operation<'a>(
    document: &'a ExecutableDocument,
    name: Option<&str>,
) -> Result<&'a OperationDefinition, ExecutionError> {
    match (&document.operations, name) {
        (DocumentOperations::Single(operation), _) => Ok(&operation.node),
        (DocumentOperations::Multiple(operations), Some(name)) => operations
            .iter()
            .find(|(key, _)| key.as_str() == name)
            .map(|(_, operation)| &operation.node)
            .ok_or_else(|| ExecutionError::validation(format!("Unknown operation named \"{name}\""))),
        (DocumentOperations::Multiple(operations), None) => {
            let mut iter = operations.values();
            match (iter.next(), iter.next()) {
                (Some(operation), None) => Ok(&operation.node),
                _ => Err(ExecutionError::validation(
                    "Operation name is required when the document contains several operations",
                )),
            }
        }
    }
}

fn find_fragment<'a>(document: &'a ExecutableDocument, name: &str) -> Option<&'a FragmentDefinition> {
    document
        .fragments
        .iter()
        .find(|(key, _)| key.as_str() == name)
        .map(|(_, fragment)| &fragment.node)
}

fn check_fragment_cycles(document: &ExecutableDocument) -> Result<(), ExecutionError> {
    for (name, fragment) in &document.fragments {
        let mut stack = vec![name.as_str()];
        visit_spreads(document, &fragment.node.selection_set.node, &mut stack)?;
    }
    Ok(())
}

fn visit_spreads<'a>(
    document: &'a ExecutableDocument,
    set: &'a SelectionSet,
    stack: &mut Vec<&'a str>,
) -> Result<(), ExecutionError> {
    for item in &set.items {
        match &item.node {
            Selection::Field(field) => {
                visit_spreads(document, &field.node.selection_set.node, stack)?;
            }
            Selection::InlineFragment(inline) => {
                visit_spreads(document, &inline.node.selection_set.node, stack)?;
            }
            Selection::FragmentSpread(spread) => {
                let name = spread.node.fragment_name.node.as_str();
                if stack.contains(&name) {
                    return Err(ExecutionError::validation(format!(
                        "Cannot spread fragment \"{name}\" within itself"
                    )));
                }
                if let Some(fragment) = find_fragment(document, name) {
                    stack.push(name);
                    visit_spreads(document, &fragment.selection_set.node, stack)?;
                    stack.pop();
                }
            }
        }
    }
    Ok(())
}

fn check_type_condition(parent: &ObjectType, on: &str) -> Result<(), ExecutionError> {
    if schema::object(on).is_none() {
        return Err(ExecutionError::validation(format!("Unknown type \"{on}\"")));
    }
    if on != parent.name {
        return Err(ExecutionError::validation(format!(
            "Fragment cannot be spread here as objects of type \"{}\" can never be of type \"{on}\"",
            parent.name
        )));
    }
    Ok(())
}

fn not_boolean(directive: &str) -> ExecutionError {
    ExecutionError::validation(format!(
        "Argument \"if\" of directive \"@{directive}\" must be a Boolean"
    ))
}

/// Response keys in first-seen order with every field node selected under each
type FieldGroups<'a> = Vec<(String, Vec<&'a Field>)>;

struct Planner<'a> {
    document: &'a ExecutableDocument,
    operation: &'a OperationDefinition,
    variables: &'a Map<String, JsonValue>,
    errors: Vec<GraphQLError>,
}

impl<'a> Planner<'a> {
    fn plan_selection(
        &mut self,
        parent: &'static ObjectType,
        sets: &[&'a SelectionSet],
        path: &mut Vec<PathSegment>,
    ) -> Result<Vec<PlannedField>, ExecutionError> {
        let mut groups = FieldGroups::new();
        for set in sets {
            self.collect_fields(parent, set, &mut groups)?;
        }

        let mut planned = Vec::with_capacity(groups.len());
        for (key, fields) in groups {
            let name = fields[0].name.node.as_str();
            if let Some(other) = fields.iter().find(|f| f.name.node.as_str() != name) {
                return Err(ExecutionError::validation(format!(
                    "Fields \"{key}\" conflict because \"{name}\" and \"{}\" are different fields",
                    other.name.node
                )));
            }

            path.push(PathSegment::Key(key.clone()));
            let field = self.plan_field(parent, key, name, &fields, path);
            path.pop();

            if let Some(field) = field? {
                planned.push(field);
            }
        }
        Ok(planned)
    }

    fn plan_field(
        &mut self,
        parent: &'static ObjectType,
        response_key: String,
        name: &str,
        fields: &[&'a Field],
        path: &mut Vec<PathSegment>,
    ) -> Result<Option<PlannedField>, ExecutionError> {
        for field in fields {
            if let Some((argument, _)) = field.arguments.first() {
                return Err(ExecutionError::validation(format!(
                    "Unknown argument \"{}\" on field \"{}.{name}\"",
                    argument.node, parent.name
                )));
            }
        }
        let has_selection = fields.iter().any(|f| !f.selection_set.node.items.is_empty());

        if name == TYPENAME_FIELD {
            if has_selection {
                return Err(leaf_with_selection(name, "String!"));
            }
            return Ok(Some(PlannedField {
                response_key,
                target: FieldTarget::Typename,
                children: Vec::new(),
            }));
        }

        let Some(def) = parent.field(name) else {
            let error = ExecutionError::UnknownField {
                field: name.to_string(),
                parent_type: parent.name.to_string(),
            };
            tracing::debug!(%error, "dropping unknown field from plan");
            self.errors.push(GraphQLError::new(&error, path.clone()));
            return Ok(None);
        };

        let children = match def.ty.object_name() {
            None if has_selection => return Err(leaf_with_selection(name, &def.ty.to_string())),
            None => Vec::new(),
            Some(_) if !has_selection => {
                return Err(ExecutionError::validation(format!(
                    "Field \"{name}\" of type \"{}\" must have a selection of subfields",
                    def.ty
                )));
            }
            Some(type_name) => {
                let object = schema::object(type_name).ok_or_else(|| {
                    ExecutionError::validation(format!("Unknown type \"{type_name}\""))
                })?;
                let sets: Vec<&'a SelectionSet> =
                    fields.iter().map(|f| &f.selection_set.node).collect();
                self.plan_selection(object, &sets, path)?
            }
        };

        Ok(Some(PlannedField {
            response_key,
            target: FieldTarget::Declared(def),
            children,
        }))
    }

    fn collect_fields(
        &self,
        parent: &'static ObjectType,
        set: &'a SelectionSet,
        groups: &mut FieldGroups<'a>,
    ) -> Result<(), ExecutionError> {
        for item in &set.items {
            match &item.node {
                Selection::Field(field) => {
                    let field = &field.node;
                    if !self.included(&field.directives)? {
                        continue;
                    }
                    let key = field.alias.as_ref().unwrap_or(&field.name).node.to_string();
                    match groups.iter_mut().find(|(k, _)| *k == key) {
                        Some((_, fields)) => fields.push(field),
                        None => groups.push((key, vec![field])),
                    }
                }
                Selection::FragmentSpread(spread) => {
                    let spread = &spread.node;
                    if !self.included(&spread.directives)? {
                        continue;
                    }
                    let name = spread.fragment_name.node.as_str();
                    let fragment = find_fragment(self.document, name).ok_or_else(|| {
                        ExecutionError::validation(format!("Unknown fragment \"{name}\""))
                    })?;
                    check_type_condition(parent, fragment.type_condition.node.on.node.as_str())?;
                    self.collect_fields(parent, &fragment.selection_set.node, groups)?;
                }
                Selection::InlineFragment(inline) => {
                    let inline = &inline.node;
                    if !self.included(&inline.directives)? {
                        continue;
                    }
                    if let Some(condition) = &inline.type_condition {
                        check_type_condition(parent, condition.node.on.node.as_str())?;
                    }
                    self.collect_fields(parent, &inline.selection_set.node, groups)?;
                }
            }
        }
        Ok(())
    }

    /// Evaluate `@skip` and `@include`
    fn included(&self, directives: &[Positioned<Directive>]) -> Result<bool, ExecutionError> {
        for directive in directives {
            let directive = &directive.node;
            let name = directive.name.node.as_str();
            let skip_when = match name {
                "skip" => true,
                "include" => false,
                other => {
                    return Err(ExecutionError::validation(format!(
                        "Unknown directive \"@{other}\""
                    )));
                }
            };
            let condition = directive
                .arguments
                .iter()
                .find(|(argument, _)| argument.node.as_str() == "if")
                .map(|(_, value)| &value.node)
                .ok_or_else(|| {
                    ExecutionError::validation(format!(
                        "Directive \"@{name}\" argument \"if\" of type \"Boolean!\" is required"
                    ))
                })?;
            if self.boolean(condition, name)? == skip_when {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn boolean(&self, value: &Value, directive: &str) -> Result<bool, ExecutionError> {
        match value {
            Value::Boolean(b) => Ok(*b),
            Value::Variable(variable) => self.variable_boolean(variable.as_str(), directive),
            _ => Err(not_boolean(directive)),
        }
    }

    fn variable_boolean(&self, name: &str, directive: &str) -> Result<bool, ExecutionError> {
        let definition = self
            .operation
            .variable_definitions
            .iter()
            .find(|d| d.node.name.node.as_str() == name)
            .ok_or_else(|| ExecutionError::validation(format!("Variable \"${name}\" is not defined")))?;

        if let Some(value) = self.variables.get(name) {
            return match value {
                JsonValue::Bool(b) => Ok(*b),
                _ => Err(not_boolean(directive)),
            };
        }
        match definition.node.default_value.as_ref().map(|v| &v.node) {
            Some(ConstValue::Boolean(b)) => Ok(*b),
            Some(_) => Err(not_boolean(directive)),
            None => Err(ExecutionError::validation(format!(
                "Variable \"${name}\" was not provided"
            ))),
        }
    }
}

fn leaf_with_selection(name: &str, ty: &str) -> ExecutionError {
    ExecutionError::validation(format!(
        "Field \"{name}\" must not have a selection since type \"{ty}\" has no subfields"
    ))
}
