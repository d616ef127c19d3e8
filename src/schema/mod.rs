use std::sync::Arc;

use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::NamedType;
use apollo_compiler::validation::Valid;
use apollo_compiler::Schema;
use indexmap::IndexSet;

use crate::error::FederationError;
use crate::schema::position::SchemaRootDefinitionKind;

pub(crate) mod definitions;
pub(crate) mod field_set;
pub mod position;

/// A GraphQL schema that has been validated, wrapped with the lookups query graph construction
/// needs. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ValidFederationSchema {
    schema: Arc<Valid<Schema>>,
}

impl ValidFederationSchema {
    pub fn new(schema: Valid<Schema>) -> Self {
        Self {
            schema: Arc::new(schema),
        }
    }

    pub fn parse(source_text: &str, path: &str) -> Result<Self, FederationError> {
        Ok(Self::new(Schema::parse_and_validate(source_text, path)?))
    }

    pub fn schema(&self) -> &Valid<Schema> {
        &self.schema
    }

    pub(crate) fn get_type(&self, name: &NamedType) -> Result<&ExtendedType, FederationError> {
        self.schema.types.get(name).ok_or_else(|| {
            FederationError::internal(format!("Schema has no type \"{name}\""))
        })
    }

    pub(crate) fn try_get_type(&self, name: &NamedType) -> Option<&ExtendedType> {
        self.schema.types.get(name)
    }

    /// The root object type declared for the given root kind, if any.
    pub(crate) fn root_type(&self, root_kind: SchemaRootDefinitionKind) -> Option<&NamedType> {
        let schema_definition = &self.schema.schema_definition;
        let root = match root_kind {
            SchemaRootDefinitionKind::Query => &schema_definition.query,
            SchemaRootDefinitionKind::Mutation => &schema_definition.mutation,
            SchemaRootDefinitionKind::Subscription => &schema_definition.subscription,
        };
        root.as_ref().map(|component| &component.name)
    }

    /// The possible runtime object types of the given composite type: the type itself for an
    /// object type, the implementing object types for an interface, and the members for a union.
    pub(crate) fn possible_runtime_types(
        &self,
        type_name: &NamedType,
    ) -> Result<IndexSet<NamedType>, FederationError> {
        Ok(match self.get_type(type_name)? {
            ExtendedType::Object(_) => IndexSet::from([type_name.clone()]),
            ExtendedType::Interface(_) => self
                .schema
                .types
                .iter()
                .filter(|(_, type_)| match type_ {
                    ExtendedType::Object(type_) => type_
                        .implements_interfaces
                        .iter()
                        .any(|itf| itf.name == *type_name),
                    _ => false,
                })
                .map(|(name, _)| name.clone())
                .collect(),
            ExtendedType::Union(type_) => type_
                .members
                .iter()
                .map(|member| member.name.clone())
                .collect(),
            _ => {
                return Err(FederationError::internal(format!(
                    "Type \"{type_name}\" was unexpectedly not a composite type"
                )));
            }
        })
    }

    pub(crate) fn is_composite_type(&self, name: &NamedType) -> Result<bool, FederationError> {
        definitions::is_composite_type(name, &self.schema)
    }
}
