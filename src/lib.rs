//! Query graph construction for federated GraphQL schemas.
//!
//! A query graph is an immutable, directed, indexed multigraph layered over one or more GraphQL
//! schemas. Its vertices are `(type, source)` positions and its edges are the ways a traversal
//! may move between them: collecting a field, downcasting to a runtime type, or jumping across
//! subgraphs through an entity key. Composition validation and query planning consume the graphs
//! built here; neither lives in this crate.
//!
//! The two main entry points are [`build_query_graph`] (a query graph over a single schema) and
//! [`build_federated_query_graph`] (one graph merging every subgraph of a supergraph, with
//! `@key`, `@requires` and `@provides` edges wired in).

pub mod error;
mod link;
pub mod query_graph;
pub mod schema;
pub mod subgraph;

use crate::error::FederationError;
use crate::schema::ValidFederationSchema;
use crate::subgraph::ValidFederationSubgraph;
use crate::subgraph::ValidFederationSubgraphs;

pub use crate::query_graph::build_query_graph::build_federated_query_graph;
pub use crate::query_graph::build_query_graph::build_query_graph;
pub use crate::query_graph::build_query_graph::build_supergraph_api_query_graph;
pub use crate::query_graph::graph_state::QueryGraphState;
pub use crate::query_graph::matches_transition;
pub use crate::query_graph::simple_traversal;
pub use crate::query_graph::QueryGraph;
pub use crate::query_graph::QueryGraphEdge;
pub use crate::query_graph::QueryGraphEdgeTransition;
pub use crate::query_graph::QueryGraphVertex;
pub use crate::query_graph::VertexIndex;

/// A supergraph: the merged schema view of a federation, together with the subgraphs it was
/// composed from.
///
/// Extracting subgraph schemas back out of a composed supergraph's `join__` directives is a
/// separate concern; constructing a `Supergraph` takes the already-extracted subgraphs and
/// exposes them through [`Supergraph::extract_subgraphs`].
pub struct Supergraph {
    pub schema: ValidFederationSchema,
    subgraphs: ValidFederationSubgraphs,
}

impl Supergraph {
    pub fn new(schema: ValidFederationSchema, subgraphs: ValidFederationSubgraphs) -> Self {
        Self { schema, subgraphs }
    }

    /// Parses a supergraph from its (API-level) schema plus `(name, schema)` subgraph SDL pairs.
    pub fn parse(
        supergraph_sdl: &str,
        subgraph_sdls: &[(&str, &str)],
    ) -> Result<Self, FederationError> {
        let schema = ValidFederationSchema::parse(supergraph_sdl, "supergraph.graphql")?;
        let mut subgraphs = ValidFederationSubgraphs::new();
        for (name, sdl) in subgraph_sdls {
            subgraphs.add(ValidFederationSubgraph::parse(name, sdl)?)?;
        }
        Ok(Self::new(schema, subgraphs))
    }

    pub fn extract_subgraphs(&self) -> &ValidFederationSubgraphs {
        &self.subgraphs
    }
}
