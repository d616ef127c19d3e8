use std::fmt::Display;
use std::fmt::Formatter;
use std::sync::Arc;

use apollo_compiler::executable::SelectionSet;
use apollo_compiler::schema::NamedType;
use apollo_compiler::NodeStr;
use indexmap::IndexMap;
use indexmap::IndexSet;

use crate::error::FederationError;
use crate::schema::definitions::is_structural_field_subtype;
use crate::schema::field_set::merge_selection_sets;
use crate::schema::field_set::DisplaySelectionSet;
use crate::schema::position::FieldDefinitionPosition;
use crate::schema::position::SchemaRootDefinitionKind;
use crate::schema::ValidFederationSchema;

pub mod build_query_graph;
pub mod graph_state;
pub mod output;

pub use build_query_graph::build_federated_query_graph;
pub use build_query_graph::build_query_graph;
pub use build_query_graph::build_supergraph_api_query_graph;

/// Identifies a vertex of a query graph, as a dense index into the graph's vertex array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexIndex(usize);

impl VertexIndex {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for VertexIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The GraphQL type a vertex of a query graph points to.
///
/// The root vertices of a "federated" query graph do not point into any schema: they stand for
/// the synthetic types `[query]`, `[mutation]` and `[subscription]`, whose names are deliberately
/// not valid GraphQL names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::From)]
pub enum QueryGraphVertexType {
    SchemaType(NamedType),
    FederatedRootType(SchemaRootDefinitionKind),
}

impl QueryGraphVertexType {
    /// The name of the schema type this vertex points to, unless it's a federated root.
    pub fn type_name(&self) -> Option<&NamedType> {
        match self {
            QueryGraphVertexType::SchemaType(name) => Some(name),
            QueryGraphVertexType::FederatedRootType(_) => None,
        }
    }
}

impl Display for QueryGraphVertexType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryGraphVertexType::SchemaType(name) => name.fmt(f),
            QueryGraphVertexType::FederatedRootType(root_kind) => {
                write!(f, "[{root_kind}]")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryGraphVertex {
    /// Position of this vertex in the owning graph's vertex array. Vertices are never removed, so
    /// the index is immutable once the vertex is created.
    pub index: VertexIndex,
    /// The GraphQL type this vertex points to.
    pub type_: QueryGraphVertexType,
    /// An identifier of the underlying schema containing the type this vertex points to. This is
    /// mainly used in federated query graphs, where the `source` is a subgraph name.
    pub source: NodeStr,
    /// If present, this vertex is the root vertex of the corresponding kind.
    pub root_kind: Option<SchemaRootDefinitionKind>,
}

impl Display for QueryGraphVertex {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.type_, self.source)?;
        if self.root_kind.is_some() {
            write!(f, "*")?;
        }
        Ok(())
    }
}

/// The type of query graph edge "transition".
///
/// An edge transition encodes what the edge corresponds to, in the underlying GraphQL schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryGraphEdgeTransition {
    /// A field edge, going from (a vertex for) the field parent type to the field's (base) type.
    FieldCollection {
        /// The name of the schema containing the field.
        source: NodeStr,
        /// The object/interface field being collected.
        field_definition_position: FieldDefinitionPosition,
    },
    /// A downcast edge, going from an abstract type (interface or union) to a type that narrows
    /// it: an implementation of the interface, or a member of the union.
    Downcast {
        /// The name of the schema containing the from/to types.
        source: NodeStr,
        /// The type of the selection set containing the type condition.
        from_type_name: NamedType,
        /// The type of the type condition, i.e. the type coming after "... on".
        to_type_name: NamedType,
    },
    /// A key edge (only found in federated query graphs) going from an entity type in a particular
    /// subgraph to the same entity type but in another subgraph. Key transition edges _must_ have
    /// `conditions` corresponding to the key fields.
    KeyResolution,
    /// An unconditional synthetic edge, only found in federated query graphs, going from the
    /// federated root of some kind to the root of that kind in a subgraph. It does not correspond
    /// to any physical GraphQL element; it encodes the fact that a query may start in any of the
    /// subgraph services.
    FreeTransition,
}

impl Display for QueryGraphEdgeTransition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryGraphEdgeTransition::FieldCollection {
                field_definition_position,
                ..
            } => {
                write!(f, "{}", field_definition_position.field_name())
            }
            QueryGraphEdgeTransition::Downcast { to_type_name, .. } => {
                write!(f, "... on {}", to_type_name)
            }
            QueryGraphEdgeTransition::KeyResolution => {
                write!(f, "key()")
            }
            QueryGraphEdgeTransition::FreeTransition => {
                write!(f, "∅")
            }
        }
    }
}

/// Whether transition `a` "matches" transition `b`, the compatibility relation used by downstream
/// consumers when advancing two graphs in lockstep. Field collections match when `a`'s field is a
/// structural field subtype of `b`'s (so the relation is not symmetric for fields in general);
/// downcasts match on their target type name; the remaining variants match on the variant alone.
pub fn matches_transition(
    a: &QueryGraphEdgeTransition,
    b: &QueryGraphEdgeTransition,
    a_schema: &ValidFederationSchema,
    b_schema: &ValidFederationSchema,
) -> Result<bool, FederationError> {
    match (a, b) {
        (
            QueryGraphEdgeTransition::FieldCollection {
                field_definition_position: a_position,
                ..
            },
            QueryGraphEdgeTransition::FieldCollection {
                field_definition_position: b_position,
                ..
            },
        ) => {
            let a_field = a_position.get(a_schema.schema())?;
            let b_field = b_position.get(b_schema.schema())?;
            Ok(is_structural_field_subtype(
                a_field,
                b_field,
                b_schema.schema(),
            ))
        }
        (
            QueryGraphEdgeTransition::Downcast {
                to_type_name: a_to, ..
            },
            QueryGraphEdgeTransition::Downcast {
                to_type_name: b_to, ..
            },
        ) => Ok(a_to == b_to),
        (QueryGraphEdgeTransition::KeyResolution, QueryGraphEdgeTransition::KeyResolution) => {
            Ok(true)
        }
        (QueryGraphEdgeTransition::FreeTransition, QueryGraphEdgeTransition::FreeTransition) => {
            Ok(true)
        }
        _ => Ok(false),
    }
}

#[derive(Debug, Clone)]
pub struct QueryGraphEdge {
    /// Position of this edge in its head vertex's adjacency list. Indices are contiguous from 0
    /// within each head and never change once the edge is created.
    pub index: usize,
    pub head: VertexIndex,
    pub tail: VertexIndex,
    /// Indicates what kind of edge this is and what the edge does/represents. For instance, if the
    /// edge represents a field, the `transition` will be a `FieldCollection` transition and will
    /// link to the definition of the field it represents.
    pub transition: QueryGraphEdgeTransition,
    /// Optional conditions on an edge.
    ///
    /// Conditions are a set of selections (in the GraphQL sense) that the traversal of a query
    /// graph needs to "collect" (traverse edges with transitions corresponding to those
    /// selections) in order to be able to collect that edge.
    ///
    /// Conditions are primarily used for edges corresponding to @key, in which case they
    /// correspond to the fields composing the @key. In other words, for an @key edge, conditions
    /// basically represent the fact that you need the key to be able to use the edge.
    ///
    /// Outside of keys, @requires edges also rely on conditions.
    pub conditions: Option<Arc<SelectionSet>>,
}

impl QueryGraphEdge {
    /// True if this edge collects the field of that name.
    pub fn is_edge_for_field(&self, name: &str) -> bool {
        matches!(
            &self.transition,
            QueryGraphEdgeTransition::FieldCollection {
                field_definition_position,
                ..
            } if field_definition_position.field_name.as_str() == name
        )
    }

    pub fn label(&self) -> String {
        self.to_string()
    }

    /// Merges the given selections into this edge's conditions (building only; a built graph
    /// never changes).
    pub(crate) fn add_to_conditions(&mut self, new_conditions: &SelectionSet) {
        self.conditions = Some(Arc::new(match &self.conditions {
            Some(existing) => merge_selection_sets(existing, new_conditions),
            None => new_conditions.clone(),
        }));
    }
}

impl Display for QueryGraphEdge {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if matches!(self.transition, QueryGraphEdgeTransition::FreeTransition)
            && self.conditions.is_none()
        {
            return Ok(());
        }
        if let Some(conditions) = &self.conditions {
            write!(f, "{} ⊢ {}", DisplaySelectionSet(conditions), self.transition)
        } else {
            self.transition.fmt(f)
        }
    }
}

/// An immutable, directed, indexed multigraph over one or more GraphQL schemas.
///
/// Vertices and edges are addressed by dense indices into parallel arrays (with adjacency stored
/// per vertex), which is what makes graph copies and side tables plain index arithmetic; see
/// [`graph_state::QueryGraphState`].
#[derive(Debug)]
pub struct QueryGraph {
    /// The name of the graph. For query graphs representing a single source, this is the source
    /// name; for "federated" query graphs, this is the reserved federated-root source name.
    name: NodeStr,
    vertices: Vec<QueryGraphVertex>,
    /// Adjacency, parallel to `vertices`: the out-edges of vertex `i` live at `out_edges[i]`, in
    /// insertion order.
    out_edges: Vec<Vec<QueryGraphEdge>>,
    /// Associates type names of the underlying schemas to every vertex that points to a type of
    /// that name. Note that in a supergraph API query graph, each type name maps to a single
    /// vertex.
    types_to_vertices: IndexMap<NamedType, IndexSet<VertexIndex>>,
    root_vertices: IndexMap<SchemaRootDefinitionKind, VertexIndex>,
    /// The sources on which the query graph was built, which is a set (potentially of size 1) of
    /// GraphQL schemas keyed by the name identifying them. The `source` strings in the vertices
    /// of a query graph are guaranteed to be valid keys in this map.
    sources: IndexMap<NodeStr, ValidFederationSchema>,
}

impl QueryGraph {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vertices_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edges_count(&self) -> usize {
        self.out_edges.iter().map(Vec::len).sum()
    }

    pub fn vertex(&self, vertex: VertexIndex) -> Result<&QueryGraphVertex, FederationError> {
        self.vertices.get(vertex.index()).ok_or_else(|| {
            FederationError::internal(format!("Vertex {vertex} unexpectedly missing"))
        })
    }

    pub fn vertices(&self) -> impl Iterator<Item = &QueryGraphVertex> {
        self.vertices.iter()
    }

    pub fn edges(&self) -> impl Iterator<Item = &QueryGraphEdge> {
        self.out_edges.iter().flatten()
    }

    pub fn root_kinds(&self) -> impl Iterator<Item = SchemaRootDefinitionKind> + '_ {
        self.root_vertices.keys().copied()
    }

    /// The root vertices of the graph, in root creation order.
    pub fn roots(&self) -> impl Iterator<Item = &QueryGraphVertex> {
        self.root_vertices
            .values()
            .map(|vertex| &self.vertices[vertex.index()])
    }

    pub fn root(&self, kind: SchemaRootDefinitionKind) -> Option<&QueryGraphVertex> {
        self.root_vertices
            .get(&kind)
            .map(|vertex| &self.vertices[vertex.index()])
    }

    /// The out-edges of the given vertex, in insertion order. Each edge's `index` is its position
    /// in the returned slice.
    pub fn out_edges(&self, vertex: VertexIndex) -> &[QueryGraphEdge] {
        self.out_edges
            .get(vertex.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn out_edge(&self, vertex: VertexIndex, index: usize) -> Option<&QueryGraphEdge> {
        self.out_edges(vertex).get(index)
    }

    pub fn is_terminal(&self, vertex: VertexIndex) -> bool {
        self.out_edges(vertex).is_empty()
    }

    /// Every vertex whose type has the given name, in insertion order.
    pub fn vertices_for_type<'graph>(
        &'graph self,
        name: &NamedType,
    ) -> impl Iterator<Item = &'graph QueryGraphVertex> + 'graph {
        self.types_to_vertices
            .get(name)
            .into_iter()
            .flatten()
            .map(|vertex| &self.vertices[vertex.index()])
    }

    pub fn sources(&self) -> impl Iterator<Item = (&NodeStr, &ValidFederationSchema)> {
        self.sources.iter()
    }

    pub fn schema_by_source(
        &self,
        source: &str,
    ) -> Result<&ValidFederationSchema, FederationError> {
        self.sources.get(source).ok_or_else(|| {
            FederationError::internal(format!("Schema for source \"{source}\" unexpectedly missing"))
        })
    }
}

/// Visits every vertex and edge of the graph reachable from its roots, exactly once, depth-first,
/// ignoring edge conditions entirely.
///
/// `on_vertex` is invoked for a vertex before `on_edge` is invoked for any of its out-edges, and
/// an edge's tail is only scheduled for visitation if `on_edge` returns true for it (and the tail
/// has not been visited already). Callers must not rely on any ordering beyond that.
pub fn simple_traversal<OnVertex, OnEdge>(
    graph: &QueryGraph,
    mut on_vertex: OnVertex,
    mut on_edge: OnEdge,
) -> Result<(), FederationError>
where
    OnVertex: FnMut(&QueryGraphVertex) -> Result<(), FederationError>,
    OnEdge: FnMut(&QueryGraphEdge) -> Result<bool, FederationError>,
{
    let mut marked = vec![false; graph.vertices_count()];
    let mut stack = Vec::new();
    for root in graph.roots() {
        if !marked[root.index.index()] {
            marked[root.index.index()] = true;
            stack.push(root.index);
        }
    }
    while let Some(vertex) = stack.pop() {
        on_vertex(graph.vertex(vertex)?)?;
        for edge in graph.out_edges(vertex) {
            if on_edge(edge)? && !marked[edge.tail.index()] {
                marked[edge.tail.index()] = true;
                stack.push(edge.tail);
            }
        }
    }
    Ok(())
}
