use apollo_compiler::NodeStr;
use indexmap::IndexMap;

use crate::error::FederationError;
use crate::link::federation_spec_definition::is_federation_subgraph_schema;
use crate::schema::ValidFederationSchema;

/// A subgraph schema participating in a federation, keyed across the federation by its name.
#[derive(Debug, Clone)]
pub struct ValidFederationSubgraph {
    pub name: NodeStr,
    pub schema: ValidFederationSchema,
}

impl ValidFederationSubgraph {
    pub fn new(name: &str, schema: ValidFederationSchema) -> Self {
        Self {
            name: NodeStr::new(name),
            schema,
        }
    }

    /// Parses and validates a subgraph schema. The schema must define the federation directives
    /// (for federation 2 subgraphs, after `@link` expansion).
    pub fn parse(name: &str, source_text: &str) -> Result<Self, FederationError> {
        let schema = ValidFederationSchema::parse(source_text, name)?;
        if !is_federation_subgraph_schema(schema.schema()) {
            return Err(FederationError::internal(format!(
                "Schema for subgraph \"{name}\" does not define the federation directives"
            )));
        }
        Ok(Self::new(name, schema))
    }
}

/// The subgraphs of a federation, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ValidFederationSubgraphs {
    subgraphs: IndexMap<NodeStr, ValidFederationSubgraph>,
}

impl ValidFederationSubgraphs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, subgraph: ValidFederationSubgraph) -> Result<(), FederationError> {
        if self.subgraphs.contains_key(subgraph.name.as_str()) {
            return Err(FederationError::internal(format!(
                "A subgraph named \"{}\" already exists",
                subgraph.name,
            )));
        }
        self.subgraphs.insert(subgraph.name.clone(), subgraph);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ValidFederationSubgraph> {
        self.subgraphs.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidFederationSubgraph> {
        self.subgraphs.values()
    }

    pub fn len(&self) -> usize {
        self.subgraphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subgraphs.is_empty()
    }
}
