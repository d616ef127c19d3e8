use std::fmt::Display;
use std::fmt::Formatter;

use apollo_compiler::ast::FieldDefinition;
use apollo_compiler::schema::Component;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::Name;
use apollo_compiler::Schema;

use crate::error::FederationError;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumIter,
)]
pub enum SchemaRootDefinitionKind {
    #[strum(to_string = "query")]
    Query,
    #[strum(to_string = "mutation")]
    Mutation,
    #[strum(to_string = "subscription")]
    Subscription,
}

/// Refers to a field of an object or interface type in some schema.
///
/// PORT_NOTE: The JS codebase stored live references to field definitions, whose owning schema
/// kept them alive. Here we store the names and look the definition up on demand, so the graph
/// never borrows from the schemas it was built against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDefinitionPosition {
    pub type_name: Name,
    pub field_name: Name,
}

impl FieldDefinitionPosition {
    pub(crate) fn get<'schema>(
        &self,
        schema: &'schema Schema,
    ) -> Result<&'schema Component<FieldDefinition>, FederationError> {
        self.try_get(schema).ok_or_else(|| {
            FederationError::internal(format!("Schema has no field \"{self}\""))
        })
    }

    pub(crate) fn try_get<'schema>(
        &self,
        schema: &'schema Schema,
    ) -> Option<&'schema Component<FieldDefinition>> {
        let fields = match schema.types.get(&self.type_name)? {
            ExtendedType::Object(type_) => &type_.fields,
            ExtendedType::Interface(type_) => &type_.fields,
            _ => return None,
        };
        fields.get(&self.field_name)
    }

    pub fn field_name(&self) -> &Name {
        &self.field_name
    }
}

impl Display for FieldDefinitionPosition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.type_name, self.field_name)
    }
}
