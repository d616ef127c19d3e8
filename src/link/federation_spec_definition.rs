use apollo_compiler::ast::FieldDefinition;
use apollo_compiler::name;
use apollo_compiler::schema::DirectiveList;
use apollo_compiler::schema::Name;
use apollo_compiler::schema::Value;
use apollo_compiler::NodeStr;
use apollo_compiler::Schema;

use crate::error::FederationError;

pub(crate) const FEDERATION_KEY_DIRECTIVE_NAME_IN_SPEC: Name = name!("key");
pub(crate) const FEDERATION_REQUIRES_DIRECTIVE_NAME_IN_SPEC: Name = name!("requires");
pub(crate) const FEDERATION_PROVIDES_DIRECTIVE_NAME_IN_SPEC: Name = name!("provides");
pub(crate) const FEDERATION_EXTERNAL_DIRECTIVE_NAME_IN_SPEC: Name = name!("external");

pub(crate) const FEDERATION_FIELDS_ARGUMENT_NAME: Name = name!("fields");
pub(crate) const FEDERATION_RESOLVABLE_ARGUMENT_NAME: Name = name!("resolvable");

/// The arguments of a single `@key` application on a type.
pub(crate) struct KeyDirectiveArguments {
    pub(crate) fields: NodeStr,
    pub(crate) resolvable: bool,
}

/// Whether the schema is a federation subgraph schema, which we detect by the presence of the
/// `@key` directive definition (subgraph schemas always define the federation directives, whether
/// by hand for federation 1 or through `@link` expansion for federation 2).
pub(crate) fn is_federation_subgraph_schema(schema: &Schema) -> bool {
    schema
        .directive_definitions
        .contains_key(&FEDERATION_KEY_DIRECTIVE_NAME_IN_SPEC)
}

/// All `@key` applications in the given type-level directive list. Applications missing their
/// (required) `fields` argument are an error; `resolvable` defaults to true.
pub(crate) fn key_directive_applications(
    directives: &DirectiveList,
) -> Result<Vec<KeyDirectiveArguments>, FederationError> {
    let mut applications = Vec::new();
    for directive in directives.get_all(FEDERATION_KEY_DIRECTIVE_NAME_IN_SPEC.as_str()) {
        let fields = directive
            .argument_by_name(FEDERATION_FIELDS_ARGUMENT_NAME.as_str())
            .and_then(|value| value.as_str())
            .ok_or_else(|| {
                FederationError::internal(format!(
                    "@{} application is missing its \"{}\" argument",
                    FEDERATION_KEY_DIRECTIVE_NAME_IN_SPEC, FEDERATION_FIELDS_ARGUMENT_NAME,
                ))
            })?;
        let resolvable = directive
            .argument_by_name(FEDERATION_RESOLVABLE_ARGUMENT_NAME.as_str())
            .map(|value| matches!(**value, Value::Boolean(true)))
            .unwrap_or(true);
        applications.push(KeyDirectiveArguments {
            fields: NodeStr::new(fields),
            resolvable,
        });
    }
    Ok(applications)
}

pub(crate) fn requires_application(
    field: &FieldDefinition,
) -> Result<Option<NodeStr>, FederationError> {
    fields_argument_of(field, &FEDERATION_REQUIRES_DIRECTIVE_NAME_IN_SPEC)
}

pub(crate) fn provides_application(
    field: &FieldDefinition,
) -> Result<Option<NodeStr>, FederationError> {
    fields_argument_of(field, &FEDERATION_PROVIDES_DIRECTIVE_NAME_IN_SPEC)
}

fn fields_argument_of(
    field: &FieldDefinition,
    directive_name: &Name,
) -> Result<Option<NodeStr>, FederationError> {
    let Some(directive) = field.directives.get(directive_name.as_str()) else {
        return Ok(None);
    };
    let fields = directive
        .argument_by_name(FEDERATION_FIELDS_ARGUMENT_NAME.as_str())
        .and_then(|value| value.as_str())
        .ok_or_else(|| {
            FederationError::internal(format!(
                "@{} application on field \"{}\" is missing its \"{}\" argument",
                directive_name, field.name, FEDERATION_FIELDS_ARGUMENT_NAME,
            ))
        })?;
    Ok(Some(NodeStr::new(fields)))
}

/// Fields marked `@external` only exist to ensure the subgraph schema is valid GraphQL; they are
/// not resolvable in this subgraph.
pub(crate) fn is_external(field: &FieldDefinition) -> bool {
    field
        .directives
        .get(FEDERATION_EXTERNAL_DIRECTIVE_NAME_IN_SPEC.as_str())
        .is_some()
}
