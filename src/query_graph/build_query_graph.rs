use std::sync::Arc;

use apollo_compiler::ast::FieldDefinition;
use apollo_compiler::executable::Selection;
use apollo_compiler::executable::SelectionSet;
use apollo_compiler::schema::Component;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::Name;
use apollo_compiler::schema::NamedType;
use apollo_compiler::schema::ObjectType;
use apollo_compiler::validation::Valid;
use apollo_compiler::Node;
use apollo_compiler::NodeStr;
use apollo_compiler::Schema;
use indexmap::IndexMap;
use indexmap::IndexSet;
use lazy_static::lazy_static;
use strum::IntoEnumIterator;
use tracing::debug;

use crate::error::FederationError;
use crate::link::federation_spec_definition::is_external;
use crate::link::federation_spec_definition::key_directive_applications;
use crate::link::federation_spec_definition::provides_application;
use crate::link::federation_spec_definition::requires_application;
use crate::query_graph::QueryGraph;
use crate::query_graph::QueryGraphEdge;
use crate::query_graph::QueryGraphEdgeTransition;
use crate::query_graph::QueryGraphVertex;
use crate::query_graph::QueryGraphVertexType;
use crate::query_graph::VertexIndex;
use crate::schema::field_set::parse_field_set;
use crate::schema::position::FieldDefinitionPosition;
use crate::schema::position::SchemaRootDefinitionKind;
use crate::schema::ValidFederationSchema;
use crate::Supergraph;

lazy_static! {
    /// The (reserved) source name of the synthetic root vertices of federated query graphs.
    pub static ref FEDERATED_GRAPH_ROOT_SOURCE: NodeStr = NodeStr::new("federated_subgraphs");
}

/// Builds a query graph over a single schema: vertices for every output type reachable from the
/// schema's root types, and edges for field collection and abstract-type downcasts.
///
/// Assumes the given schema has been validated.
pub fn build_query_graph(
    name: NodeStr,
    schema: ValidFederationSchema,
) -> Result<QueryGraph, FederationError> {
    let graph = SchemaQueryGraphBuilder::new(name, schema, false, None)?.build()?;
    debug!(
        name = graph.name(),
        vertices = graph.vertices_count(),
        edges = graph.edges_count(),
        "built query graph"
    );
    Ok(graph)
}

/// Builds the query graph of a supergraph's API schema. The result has a single source, no edge
/// conditions and no key edges: it describes the queries a client can make, not how subgraphs
/// resolve them.
pub fn build_supergraph_api_query_graph(
    schema: ValidFederationSchema,
) -> Result<QueryGraph, FederationError> {
    build_query_graph(NodeStr::new("supergraph"), schema)
}

/// Builds a "federated" query graph based on the provided supergraph: one query graph per
/// subgraph, merged under synthetic per-kind roots, with `@key`, `@requires` and `@provides`
/// edges wired across the copies.
///
/// A federated query graph is used to reason about queries made by a router against a set of
/// federated subgraph services.
pub fn build_federated_query_graph(
    supergraph: &Supergraph,
) -> Result<QueryGraph, FederationError> {
    let subgraphs = supergraph.extract_subgraphs();
    let mut subgraph_graphs = Vec::with_capacity(subgraphs.len());
    for subgraph in subgraphs.iter() {
        let graph = SchemaQueryGraphBuilder::new(
            subgraph.name.clone(),
            subgraph.schema.clone(),
            true,
            Some(supergraph.schema.clone()),
        )?
        .build()?;
        debug!(
            subgraph = subgraph.name.as_str(),
            vertices = graph.vertices_count(),
            edges = graph.edges_count(),
            "built subgraph query graph"
        );
        subgraph_graphs.push(graph);
    }
    let graph = FederatedQueryGraphBuilder::new(subgraph_graphs).build()?;
    debug!(
        vertices = graph.vertices_count(),
        edges = graph.edges_count(),
        "built federated query graph"
    );
    Ok(graph)
}

/// Mutable scaffolding for vertices, edges, roots and sources. Freezing it with [`Self::build`]
/// produces the immutable [`QueryGraph`]; nothing of the builder survives past that point.
struct BaseQueryGraphBuilder {
    /// Slot-addressed vertex storage: `copy_graph` and the federated builder place vertices at
    /// explicit indices, so unoccupied slots can temporarily precede occupied ones. Every slot
    /// must be filled by the time `build` runs.
    vertices: Vec<Option<QueryGraphVertex>>,
    /// Adjacency, parallel to `vertices`.
    out_edges: Vec<Vec<QueryGraphEdge>>,
    next_index: usize,
    types_to_vertices: IndexMap<NamedType, IndexSet<VertexIndex>>,
    root_vertices: IndexMap<SchemaRootDefinitionKind, VertexIndex>,
    sources: IndexMap<NodeStr, ValidFederationSchema>,
}

/// Maps the vertices of a copied graph to their copies, by index arithmetic.
struct CopyPointer {
    offset: usize,
}

impl CopyPointer {
    fn copied_vertex(&self, vertex: VertexIndex) -> VertexIndex {
        VertexIndex::new(vertex.index() + self.offset)
    }
}

impl BaseQueryGraphBuilder {
    fn new() -> Self {
        Self {
            vertices: Vec::new(),
            out_edges: Vec::new(),
            next_index: 0,
            types_to_vertices: IndexMap::new(),
            root_vertices: IndexMap::new(),
            sources: IndexMap::new(),
        }
    }

    /// Allocates a vertex at the given index (defaulting to the next unused one). Writing to an
    /// occupied slot is an error. The source→schema mapping is registered the first time a source
    /// is seen.
    fn create_new_vertex(
        &mut self,
        type_: QueryGraphVertexType,
        source: NodeStr,
        schema: &ValidFederationSchema,
        index: Option<usize>,
    ) -> Result<VertexIndex, FederationError> {
        let index = match index {
            Some(index) => index,
            None => {
                let index = self.next_index;
                self.next_index += 1;
                index
            }
        };
        if self.vertices.len() <= index {
            self.vertices.resize_with(index + 1, || None);
            self.out_edges.resize_with(index + 1, Vec::new);
        }
        if self.vertices[index].is_some() {
            return Err(FederationError::internal(format!(
                "Vertex slot {index} is already in use"
            )));
        }
        let vertex_index = VertexIndex::new(index);
        if let QueryGraphVertexType::SchemaType(type_name) = &type_ {
            self.types_to_vertices
                .entry(type_name.clone())
                .or_default()
                .insert(vertex_index);
        }
        if !self.sources.contains_key(source.as_str()) {
            self.sources.insert(source.clone(), schema.clone());
        }
        self.vertices[index] = Some(QueryGraphVertex {
            index: vertex_index,
            type_,
            source,
            root_kind: None,
        });
        Ok(vertex_index)
    }

    fn create_root_vertex(
        &mut self,
        kind: SchemaRootDefinitionKind,
        type_: QueryGraphVertexType,
        source: NodeStr,
        schema: &ValidFederationSchema,
    ) -> Result<VertexIndex, FederationError> {
        let vertex = self.create_new_vertex(type_, source, schema, None)?;
        self.set_as_root(kind, vertex)?;
        Ok(vertex)
    }

    /// Promotes the vertex at `index` to the root vertex for `kind`. Since edges address their
    /// head by index, existing out-edges of the vertex follow the promotion as-is.
    fn set_as_root(
        &mut self,
        kind: SchemaRootDefinitionKind,
        index: VertexIndex,
    ) -> Result<(), FederationError> {
        if self.root_vertices.contains_key(&kind) {
            return Err(FederationError::internal(format!(
                "Root vertex for {kind} already exists"
            )));
        }
        self.vertex_mut(index)?.root_kind = Some(kind);
        self.root_vertices.insert(kind, index);
        Ok(())
    }

    /// Appends an edge to `head`'s adjacency; the new edge's local index is the prior length.
    /// Conditions are only allowed out of composite-type vertices.
    fn add_edge(
        &mut self,
        head: VertexIndex,
        tail: VertexIndex,
        transition: QueryGraphEdgeTransition,
        conditions: Option<Arc<SelectionSet>>,
    ) -> Result<(), FederationError> {
        if conditions.is_some() {
            let head_vertex = self.vertex(head)?;
            let composite = match &head_vertex.type_ {
                QueryGraphVertexType::SchemaType(type_name) => self
                    .schema_for_source(&head_vertex.source)?
                    .is_composite_type(type_name)?,
                QueryGraphVertexType::FederatedRootType(_) => false,
            };
            if !composite {
                return Err(FederationError::internal(format!(
                    "Cannot have conditions on an edge out of non-composite vertex \"{}\"",
                    self.vertex(head)?,
                )));
            }
        }
        let adjacency = self.out_edges.get_mut(head.index()).ok_or_else(|| {
            FederationError::internal(format!("Vertex {head} unexpectedly missing"))
        })?;
        let index = adjacency.len();
        adjacency.push(QueryGraphEdge {
            index,
            head,
            tail,
            transition,
            conditions,
        });
        Ok(())
    }

    fn vertex(&self, index: VertexIndex) -> Result<&QueryGraphVertex, FederationError> {
        self.vertices
            .get(index.index())
            .and_then(|slot| slot.as_ref())
            .ok_or_else(|| {
                FederationError::internal(format!("Vertex {index} unexpectedly missing"))
            })
    }

    fn vertex_mut(&mut self, index: VertexIndex) -> Result<&mut QueryGraphVertex, FederationError> {
        self.vertices
            .get_mut(index.index())
            .and_then(|slot| slot.as_mut())
            .ok_or_else(|| {
                FederationError::internal(format!("Vertex {index} unexpectedly missing"))
            })
    }

    fn edge(&self, head: VertexIndex, index: usize) -> Result<&QueryGraphEdge, FederationError> {
        self.out_edges
            .get(head.index())
            .and_then(|adjacency| adjacency.get(index))
            .ok_or_else(|| {
                FederationError::internal(format!(
                    "Edge {index} of vertex {head} unexpectedly missing"
                ))
            })
    }

    fn out_edges_of(&self, vertex: VertexIndex) -> Result<&[QueryGraphEdge], FederationError> {
        self.out_edges
            .get(vertex.index())
            .map(Vec::as_slice)
            .ok_or_else(|| {
                FederationError::internal(format!("Vertex {vertex} unexpectedly missing"))
            })
    }

    fn schema_for_source(
        &self,
        source: &str,
    ) -> Result<&ValidFederationSchema, FederationError> {
        self.sources.get(source).ok_or_else(|| {
            FederationError::internal(format!(
                "Schema for source \"{source}\" unexpectedly missing"
            ))
        })
    }

    /// Replaces the tail of the given edge. The edge must still be the occupant of its
    /// `(head, index)` slot.
    fn update_edge_tail(
        &mut self,
        edge: &QueryGraphEdge,
        new_tail: VertexIndex,
    ) -> Result<(), FederationError> {
        let slot = self
            .out_edges
            .get_mut(edge.head.index())
            .and_then(|adjacency| adjacency.get_mut(edge.index))
            .ok_or_else(|| {
                FederationError::internal(format!(
                    "Edge {} of vertex {} unexpectedly missing",
                    edge.index, edge.head
                ))
            })?;
        if slot.transition != edge.transition {
            return Err(FederationError::internal(format!(
                "Edge {} of vertex {} is no longer the occupant of its slot",
                edge.index, edge.head
            )));
        }
        slot.tail = new_tail;
        Ok(())
    }

    /// Merges the given selections into the conditions of the edge at `(head, edge_index)`.
    fn add_to_edge_conditions(
        &mut self,
        head: VertexIndex,
        edge_index: usize,
        conditions: &SelectionSet,
    ) -> Result<(), FederationError> {
        let edge = self
            .out_edges
            .get_mut(head.index())
            .and_then(|adjacency| adjacency.get_mut(edge_index))
            .ok_or_else(|| {
                FederationError::internal(format!(
                    "Edge {edge_index} of vertex {head} unexpectedly missing"
                ))
            })?;
        edge.add_to_conditions(conditions);
        Ok(())
    }

    /// Allocates a fresh vertex with the same type and source as the given one, and copies its
    /// out-edges one for one (same transitions, conditions, tails and local indices). The copy
    /// has no in-edges.
    fn make_copy(&mut self, vertex: VertexIndex) -> Result<VertexIndex, FederationError> {
        let original = self.vertex(vertex)?.clone();
        let schema = self.schema_for_source(&original.source)?.clone();
        let copy = self.create_new_vertex(original.type_, original.source, &schema, None)?;
        let copied_edges = self.out_edges[vertex.index()].clone();
        for edge in copied_edges {
            self.add_edge(copy, edge.tail, edge.transition, edge.conditions)?;
        }
        Ok(copy)
    }

    /// Copies the whole of `graph` into this builder, placing the copy of each vertex at
    /// `old index + offset` where `offset` is the current `next_index`. The copy walks the graph
    /// in [`simple_traversal`](crate::query_graph::simple_traversal) order, which visits each
    /// head's out-edges in adjacency order and therefore preserves local edge indices.
    fn copy_graph(&mut self, graph: &QueryGraph) -> Result<CopyPointer, FederationError> {
        let offset = self.next_index;
        let mut marked = vec![false; graph.vertices_count()];
        let mut stack = Vec::new();
        for root in graph.roots() {
            if !marked[root.index.index()] {
                marked[root.index.index()] = true;
                stack.push(root.index);
            }
        }
        while let Some(vertex) = stack.pop() {
            self.copy_vertex_if_needed(graph, vertex, offset)?;
            for edge in graph.out_edges(vertex) {
                self.copy_vertex_if_needed(graph, edge.tail, offset)?;
                self.add_edge(
                    VertexIndex::new(vertex.index() + offset),
                    VertexIndex::new(edge.tail.index() + offset),
                    edge.transition.clone(),
                    edge.conditions.clone(),
                )?;
                if !marked[edge.tail.index()] {
                    marked[edge.tail.index()] = true;
                    stack.push(edge.tail);
                }
            }
        }
        self.next_index += graph.vertices_count();
        Ok(CopyPointer { offset })
    }

    fn copy_vertex_if_needed(
        &mut self,
        graph: &QueryGraph,
        vertex: VertexIndex,
        offset: usize,
    ) -> Result<(), FederationError> {
        let new_index = vertex.index() + offset;
        if self
            .vertices
            .get(new_index)
            .is_some_and(|slot| slot.is_some())
        {
            return Ok(());
        }
        let old_vertex = graph.vertex(vertex)?;
        let schema = graph.schema_by_source(&old_vertex.source)?.clone();
        self.create_new_vertex(
            old_vertex.type_.clone(),
            old_vertex.source.clone(),
            &schema,
            Some(new_index),
        )?;
        Ok(())
    }

    /// The first vertex pointing to the given type in the given source, if any.
    fn vertex_for_type_and_source(
        &self,
        type_name: &NamedType,
        source: &NodeStr,
    ) -> Option<VertexIndex> {
        self.types_to_vertices.get(type_name)?.iter().copied().find(|vertex| {
            self.vertices[vertex.index()]
                .as_ref()
                .is_some_and(|vertex| vertex.source == *source)
        })
    }

    /// Freezes the builder into a query graph. Every reserved vertex slot must have been filled.
    fn build(self, name: NodeStr) -> Result<QueryGraph, FederationError> {
        let mut vertices = Vec::with_capacity(self.vertices.len());
        for (index, slot) in self.vertices.into_iter().enumerate() {
            vertices.push(slot.ok_or_else(|| {
                FederationError::internal(format!(
                    "Vertex slot {index} was reserved but never created"
                ))
            })?);
        }
        Ok(QueryGraph {
            name,
            vertices,
            out_edges: self.out_edges,
            types_to_vertices: self.types_to_vertices,
            root_vertices: self.root_vertices,
            sources: self.sources,
        })
    }
}

/// Specialises [`BaseQueryGraphBuilder`] to walk a single GraphQL schema, creating vertices and
/// edges for everything reachable from its root types.
struct SchemaQueryGraphBuilder {
    base: BaseQueryGraphBuilder,
    source: NodeStr,
    schema: ValidFederationSchema,
    is_federated_subgraph: bool,
    supergraph_schema: Option<ValidFederationSchema>,
}

impl SchemaQueryGraphBuilder {
    /// `supergraph_schema` must be supplied when building the graph of a federated subgraph; it
    /// gates the interface-field shortcut edges.
    fn new(
        source: NodeStr,
        schema: ValidFederationSchema,
        is_federated_subgraph: bool,
        supergraph_schema: Option<ValidFederationSchema>,
    ) -> Result<Self, FederationError> {
        if is_federated_subgraph && supergraph_schema.is_none() {
            return Err(FederationError::internal(
                "Missing supergraph schema for building a federated subgraph query graph",
            ));
        }
        Ok(Self {
            base: BaseQueryGraphBuilder::new(),
            source,
            schema,
            is_federated_subgraph,
            supergraph_schema,
        })
    }

    fn build(mut self) -> Result<QueryGraph, FederationError> {
        for root_kind in SchemaRootDefinitionKind::iter() {
            let root_type_name = self.schema.root_type(root_kind).cloned();
            if let Some(root_type_name) = root_type_name {
                self.add_recursively_from_root(root_kind, root_type_name)?;
            }
        }
        self.base.build(self.source)
    }

    /// Adds a vertex for the provided root object type (marking it as the root vertex for the
    /// provided kind) and recursively descends into the type definition, so that everything
    /// reachable from the root ends up in the graph.
    fn add_recursively_from_root(
        &mut self,
        root_kind: SchemaRootDefinitionKind,
        root_type_name: NamedType,
    ) -> Result<(), FederationError> {
        if !matches!(self.schema.get_type(&root_type_name)?, ExtendedType::Object(_)) {
            return Err(FederationError::internal(format!(
                "Root type \"{root_type_name}\" was unexpectedly not an object type"
            )));
        }
        let vertex = self.add_type_recursively(root_type_name)?;
        self.base.set_as_root(root_kind, vertex)
    }

    /// Adds a vertex for the provided type, if none exists yet, and recursively adds the edges
    /// and vertices its definition implies (for object types, one edge per field plus the fields'
    /// types; for abstract types, downcasts to the runtime types; and so on).
    fn add_type_recursively(
        &mut self,
        type_name: NamedType,
    ) -> Result<VertexIndex, FederationError> {
        if let Some(existing) = self.base.types_to_vertices.get(&type_name) {
            if let Some(first) = existing.first() {
                if existing.len() > 1 {
                    return Err(FederationError::internal(format!(
                        "Only one vertex should have been created for type \"{type_name}\", got {}",
                        existing.len(),
                    )));
                }
                return Ok(*first);
            }
        }
        let vertex = self.base.create_new_vertex(
            QueryGraphVertexType::SchemaType(type_name.clone()),
            self.source.clone(),
            &self.schema,
            None,
        )?;
        match self.schema.get_type(&type_name)?.clone() {
            ExtendedType::Object(type_) => {
                self.add_object_type_edges(&type_, vertex)?;
            }
            ExtendedType::Interface(type_) => {
                // For interfaces, we generally don't add direct edges for fields: which subgraph
                // can resolve a given field depends on the runtime implementation in general.
                // However, if this subgraph provides a field locally for all of the supergraph
                // interface's implementations, a direct edge on the interface is safe, and it
                // avoids unnecessary type explosion in planning.
                if self.is_federated_subgraph {
                    self.maybe_add_interface_fields_edges(&type_.name, &type_.fields, vertex)?;
                }
                self.add_abstract_type_edges(type_.name.clone(), vertex)?;
            }
            ExtendedType::Union(type_) => {
                self.add_abstract_type_edges(type_.name.clone(), vertex)?;
            }
            // Scalars and enums are terminal (and input objects cannot appear in output
            // positions).
            _ => {}
        }
        Ok(vertex)
    }

    fn add_object_type_edges(
        &mut self,
        type_: &Node<ObjectType>,
        head: VertexIndex,
    ) -> Result<(), FederationError> {
        for (field_name, field) in &type_.fields {
            // Fields marked @external only exist to ensure the subgraph schema is valid GraphQL;
            // they don't create edges. @provides handling later adds path-specific edges for
            // them, creating whatever vertices it needs.
            if is_external(field) {
                continue;
            }
            self.add_edge_for_field(type_.name.clone(), field_name.clone(), field, head)?;
        }
        Ok(())
    }

    fn add_edge_for_field(
        &mut self,
        parent_type_name: NamedType,
        field_name: Name,
        field: &Component<FieldDefinition>,
        head: VertexIndex,
    ) -> Result<(), FederationError> {
        let tail_type_name = field.ty.inner_named_type().clone();
        if matches!(
            self.schema.get_type(&tail_type_name)?,
            ExtendedType::InputObject(_)
        ) {
            return Err(FederationError::internal(format!(
                "Field \"{parent_type_name}.{field_name}\" has non-output type \"{tail_type_name}\""
            )));
        }
        let tail = self.add_type_recursively(tail_type_name)?;
        let transition = QueryGraphEdgeTransition::FieldCollection {
            source: self.source.clone(),
            field_definition_position: FieldDefinitionPosition {
                type_name: parent_type_name,
                field_name,
            },
        };
        self.base.add_edge(head, tail, transition, None)
    }

    fn maybe_add_interface_fields_edges(
        &mut self,
        interface_type_name: &NamedType,
        fields: &IndexMap<Name, Component<FieldDefinition>>,
        head: VertexIndex,
    ) -> Result<(), FederationError> {
        let Some(supergraph_schema) = self.supergraph_schema.clone() else {
            return Err(FederationError::internal(
                "Missing supergraph schema when building a subgraph query graph",
            ));
        };
        // An interface the supergraph doesn't know gets no shortcut edges at all; they are an
        // optimization, nothing more.
        if !matches!(
            supergraph_schema.try_get_type(interface_type_name),
            Some(ExtendedType::Interface(_))
        ) {
            return Ok(());
        }
        // The subgraph may not know some of the supergraph's runtime types for the interface.
        // Edges to an interface can only come from within the current subgraph though, so
        // whatever field led to it was resolved here and can never return one of those unknown
        // types; we can ignore them.
        let local_runtime_types: Vec<NamedType> = supergraph_schema
            .possible_runtime_types(interface_type_name)?
            .into_iter()
            .filter(|runtime_type_name| self.schema.try_get_type(runtime_type_name).is_some())
            .collect();
        for (field_name, field) in fields {
            // To get a direct edge, the interface field must not be external itself, and every
            // local runtime type must directly provide it.
            if is_external(field) {
                continue;
            }
            let mut provided_by_all = true;
            for runtime_type_name in &local_runtime_types {
                if !self.is_directly_provided_by_type(runtime_type_name, field_name)? {
                    provided_by_all = false;
                    break;
                }
            }
            if !provided_by_all {
                continue;
            }
            self.add_edge_for_field(interface_type_name.clone(), field_name.clone(), field, head)?;
        }
        Ok(())
    }

    /// The field is directly provided by an implementation type if the type declares it, it is
    /// not external there, and it carries no @requires there (a @requires on an implementation
    /// forces type explosion so the requirement gets handled).
    fn is_directly_provided_by_type(
        &self,
        type_name: &NamedType,
        field_name: &Name,
    ) -> Result<bool, FederationError> {
        let ExtendedType::Object(type_) = self.schema.get_type(type_name)? else {
            return Ok(false);
        };
        let Some(field) = type_.fields.get(field_name) else {
            return Ok(false);
        };
        Ok(!is_external(field) && requires_application(field)?.is_none())
    }

    /// Adds the downcast edges out of an abstract type: one per implementation for interfaces,
    /// one per member for unions.
    fn add_abstract_type_edges(
        &mut self,
        from_type_name: NamedType,
        head: VertexIndex,
    ) -> Result<(), FederationError> {
        let runtime_types = self.schema.possible_runtime_types(&from_type_name)?;
        for to_type_name in runtime_types {
            let tail = self.add_type_recursively(to_type_name.clone())?;
            let transition = QueryGraphEdgeTransition::Downcast {
                source: self.source.clone(),
                from_type_name: from_type_name.clone(),
                to_type_name,
            };
            self.base.add_edge(head, tail, transition, None)?;
        }
        Ok(())
    }
}

/// Merges per-subgraph query graphs into a single federated one: synthetic roots first, then a
/// copy of every subgraph graph, then the cross-subgraph `@key` edges, `@requires` conditions and
/// `@provides` duplications.
struct FederatedQueryGraphBuilder {
    base: BaseQueryGraphBuilder,
    subgraph_graphs: Vec<QueryGraph>,
    copy_pointers: Vec<CopyPointer>,
}

impl FederatedQueryGraphBuilder {
    fn new(subgraph_graphs: Vec<QueryGraph>) -> Self {
        Self {
            base: BaseQueryGraphBuilder::new(),
            subgraph_graphs,
            copy_pointers: Vec::new(),
        }
    }

    fn build(mut self) -> Result<QueryGraph, FederationError> {
        self.add_federated_roots()?;
        self.copy_subgraphs()?;
        self.link_roots()?;
        self.add_key_edges()?;
        self.add_requires_conditions()?;
        // Every @key edge exists at this point, so the vertices @provides duplicates inherit
        // them. Changing this ordering would break that.
        self.add_provides_edges()?;
        self.base.build(FEDERATED_GRAPH_ROOT_SOURCE.clone())
    }

    /// Creates the per-kind federated root vertices, in the first `|root kinds|` slots. Their
    /// types are synthetic and have no backing schema.
    fn add_federated_roots(&mut self) -> Result<(), FederationError> {
        let root_schema = ValidFederationSchema::new(Valid::assume_valid(Schema::new()));
        let mut root_kinds = IndexSet::new();
        for graph in &self.subgraph_graphs {
            root_kinds.extend(graph.root_kinds());
        }
        for root_kind in root_kinds {
            self.base.create_root_vertex(
                root_kind,
                QueryGraphVertexType::FederatedRootType(root_kind),
                FEDERATED_GRAPH_ROOT_SOURCE.clone(),
                &root_schema,
            )?;
        }
        Ok(())
    }

    fn copy_subgraphs(&mut self) -> Result<(), FederationError> {
        let Self {
            base,
            subgraph_graphs,
            copy_pointers,
        } = self;
        for graph in subgraph_graphs.iter() {
            copy_pointers.push(base.copy_graph(graph)?);
        }
        Ok(())
    }

    /// Links each federated root to the same-kind root of every subgraph, unconditionally: a
    /// query is always free to start in any of the subgraph services.
    fn link_roots(&mut self) -> Result<(), FederationError> {
        let Self {
            base,
            subgraph_graphs,
            copy_pointers,
        } = self;
        for (graph, pointer) in subgraph_graphs.iter().zip(copy_pointers.iter()) {
            for root in graph.roots() {
                let root_kind = root.root_kind.ok_or_else(|| {
                    FederationError::internal("Root vertex unexpectedly missing its root kind")
                })?;
                let federated_root =
                    base.root_vertices.get(&root_kind).copied().ok_or_else(|| {
                        FederationError::internal(format!(
                            "Federated root for {root_kind} unexpectedly missing"
                        ))
                    })?;
                base.add_edge(
                    federated_root,
                    pointer.copied_vertex(root.index),
                    QueryGraphEdgeTransition::FreeTransition,
                    None,
                )?;
            }
        }
        Ok(())
    }

    /// For every `@key` application on a type of a subgraph, adds a key edge from every other
    /// subgraph's vertex for that type into this subgraph's, with the key fields as conditions.
    /// A subgraph not knowing the type simply gets no edge for that direction.
    fn add_key_edges(&mut self) -> Result<(), FederationError> {
        let Self {
            base,
            subgraph_graphs,
            copy_pointers,
        } = self;
        for (i, graph) in subgraph_graphs.iter().enumerate() {
            let schema = graph.schema_by_source(graph.name())?.clone();
            for vertex in graph.vertices() {
                let QueryGraphVertexType::SchemaType(type_name) = &vertex.type_ else {
                    continue;
                };
                let type_ = schema.get_type(type_name)?;
                let applications = key_directive_applications(type_.directives())?;
                if applications.is_empty() {
                    continue;
                }
                if !matches!(
                    type_,
                    ExtendedType::Object(_) | ExtendedType::Interface(_)
                ) {
                    return Err(FederationError::internal(format!(
                        "Invalid @key on non-object, non-interface type \"{type_name}\""
                    )));
                }
                for application in applications {
                    if !application.resolvable {
                        continue;
                    }
                    // The key's fields are the edge's conditions: you need the key to take it.
                    let conditions =
                        Arc::new(parse_field_set(&schema, type_name.clone(), application.fields)?);
                    for (j, other_graph) in subgraph_graphs.iter().enumerate() {
                        if i == j {
                            continue;
                        }
                        let mut other_vertices = other_graph.vertices_for_type(type_name);
                        let Some(other_vertex) = other_vertices.next() else {
                            continue;
                        };
                        // Only true at this stage of construction: @provides handling duplicates
                        // type vertices on purpose, but it runs after key wiring.
                        if other_vertices.next().is_some() {
                            return Err(FederationError::internal(format!(
                                "Subgraph \"{}\" unexpectedly has multiple vertices for type \"{type_name}\"",
                                other_graph.name(),
                            )));
                        }
                        base.add_edge(
                            copy_pointers[j].copied_vertex(other_vertex.index),
                            copy_pointers[i].copied_vertex(vertex.index),
                            QueryGraphEdgeTransition::KeyResolution,
                            Some(conditions.clone()),
                        )?;
                    }
                }
            }
        }
        Ok(())
    }

    /// For every field edge whose field carries `@requires`, merges the required fields (parsed
    /// against the head type) into the copied edge's conditions.
    fn add_requires_conditions(&mut self) -> Result<(), FederationError> {
        let Self {
            base,
            subgraph_graphs,
            copy_pointers,
        } = self;
        for (i, graph) in subgraph_graphs.iter().enumerate() {
            let schema = graph.schema_by_source(graph.name())?.clone();
            for vertex in graph.vertices() {
                for edge in graph.out_edges(vertex.index) {
                    let QueryGraphEdgeTransition::FieldCollection {
                        field_definition_position,
                        ..
                    } = &edge.transition
                    else {
                        continue;
                    };
                    let field = field_definition_position.get(schema.schema())?;
                    let Some(fields) = requires_application(field)? else {
                        continue;
                    };
                    let conditions = parse_field_set(
                        &schema,
                        field_definition_position.type_name.clone(),
                        fields,
                    )?;
                    // copy_graph preserves local edge indices, so the copied edge lives at the
                    // same position under the copied head.
                    base.add_to_edge_conditions(
                        copy_pointers[i].copied_vertex(edge.head),
                        edge.index,
                        &conditions,
                    )?;
                }
            }
        }
        Ok(())
    }

    /// For every field edge whose field carries `@provides`, duplicates the edge's tail (the
    /// duplicate keeps all out-edges but gains no in-edge besides this field), retargets the edge
    /// to the duplicate, and walks the provided selection from there.
    fn add_provides_edges(&mut self) -> Result<(), FederationError> {
        let Self {
            base,
            subgraph_graphs,
            copy_pointers,
        } = self;
        for (i, graph) in subgraph_graphs.iter().enumerate() {
            let source = NodeStr::new(graph.name());
            let schema = graph.schema_by_source(graph.name())?.clone();
            for vertex in graph.vertices() {
                for edge in graph.out_edges(vertex.index) {
                    let QueryGraphEdgeTransition::FieldCollection {
                        field_definition_position,
                        ..
                    } = &edge.transition
                    else {
                        continue;
                    };
                    let field = field_definition_position.get(schema.schema())?;
                    let Some(fields) = provides_application(field)? else {
                        continue;
                    };
                    let field_type_name = field.ty.inner_named_type().clone();
                    if !schema.is_composite_type(&field_type_name)? {
                        return Err(FederationError::internal(format!(
                            "Invalid @provides on field \"{field_definition_position}\" of non-composite type \"{field_type_name}\""
                        )));
                    }
                    let provided = parse_field_set(&schema, field_type_name, fields)?;
                    let copied_edge = base
                        .edge(copy_pointers[i].copied_vertex(edge.head), edge.index)?
                        .clone();
                    let provided_tail = base.make_copy(copied_edge.tail)?;
                    base.update_edge_tail(&copied_edge, provided_tail)?;
                    add_provides_edges_for_selection(
                        base,
                        &schema,
                        &source,
                        provided_tail,
                        &provided,
                    )?;
                }
            }
        }
        Ok(())
    }
}

/// Walks a `@provides` selection from the duplicated tail vertex, materialising what the
/// providing subgraph additionally exposes: new field edges for each selected field, and
/// downcast hops for each type condition.
fn add_provides_edges_for_selection(
    base: &mut BaseQueryGraphBuilder,
    schema: &ValidFederationSchema,
    source: &NodeStr,
    head: VertexIndex,
    provided: &SelectionSet,
) -> Result<(), FederationError> {
    let mut stack = vec![(head, provided.clone())];
    while let Some((vertex, selection_set)) = stack.pop() {
        // Reversed so the new edges end up in selection order.
        for selection in selection_set.selections.iter().rev() {
            match selection {
                Selection::Field(field_selection) => {
                    let field_name = &field_selection.name;
                    let existing_edge = base
                        .out_edges_of(vertex)?
                        .iter()
                        .find(|edge| edge.is_edge_for_field(field_name.as_str()))
                        .cloned();
                    if let Some(existing_edge) = existing_edge {
                        // If the field is a leaf, there is nothing to do; otherwise, copy the
                        // tail and keep propagating the provides from the copy.
                        if !field_selection.selection_set.selections.is_empty() {
                            let provided_tail = base.make_copy(existing_edge.tail)?;
                            base.update_edge_tail(&existing_edge, provided_tail)?;
                            stack.push((provided_tail, field_selection.selection_set.clone()));
                        }
                    } else {
                        // No existing edge, so this is an edge the provides adds (typically, the
                        // field is @external in this subgraph).
                        let head_type_name = match &base.vertex(vertex)?.type_ {
                            QueryGraphVertexType::SchemaType(name) => name.clone(),
                            QueryGraphVertexType::FederatedRootType(_) => {
                                return Err(FederationError::internal(
                                    "@provides selection unexpectedly walked into a federated root",
                                ));
                            }
                        };
                        let field_type_name =
                            field_selection.definition.ty.inner_named_type().clone();
                        let existing_tail =
                            base.vertex_for_type_and_source(&field_type_name, source);
                        let transition = QueryGraphEdgeTransition::FieldCollection {
                            source: source.clone(),
                            field_definition_position: FieldDefinitionPosition {
                                type_name: head_type_name,
                                field_name: field_name.clone(),
                            },
                        };
                        if field_selection.selection_set.selections.is_empty() {
                            // A leaf: reuse the existing same-source vertex for the leaf type
                            // when there is one.
                            let tail = match existing_tail {
                                Some(tail) => tail,
                                None => base.create_new_vertex(
                                    QueryGraphVertexType::SchemaType(field_type_name),
                                    source.clone(),
                                    schema,
                                    None,
                                )?,
                            };
                            base.add_edge(vertex, tail, transition, None)?;
                        } else {
                            // A non-leaf provided field reaches only the provided subset of its
                            // type, so it always gets a brand-new vertex.
                            let tail = match existing_tail {
                                Some(existing_tail) => base.make_copy(existing_tail)?,
                                None => base.create_new_vertex(
                                    QueryGraphVertexType::SchemaType(field_type_name),
                                    source.clone(),
                                    schema,
                                    None,
                                )?,
                            };
                            base.add_edge(vertex, tail, transition, None)?;
                            stack.push((tail, field_selection.selection_set.clone()));
                        }
                    }
                }
                Selection::InlineFragment(fragment) => {
                    if let Some(type_condition) = &fragment.type_condition {
                        let existing_edge = base
                            .out_edges_of(vertex)?
                            .iter()
                            .find(|edge| {
                                matches!(
                                    &edge.transition,
                                    QueryGraphEdgeTransition::Downcast { to_type_name, .. }
                                        if to_type_name == type_condition
                                )
                            })
                            .cloned();
                        // There is no way to mark a whole type @external, so a type condition in
                        // a validated @provides always has a matching downcast edge.
                        let Some(existing_edge) = existing_edge else {
                            return Err(FederationError::internal(format!(
                                "Shouldn't have selection \"... on {type_condition}\" in a @provides if the type is not reachable"
                            )));
                        };
                        let provided_tail = base.make_copy(existing_edge.tail)?;
                        base.update_edge_tail(&existing_edge, provided_tail)?;
                        stack.push((provided_tail, fragment.selection_set.clone()));
                    } else {
                        // A conditionless inline fragment doesn't change the position.
                        stack.push((vertex, fragment.selection_set.clone()));
                    }
                }
                Selection::FragmentSpread(_) => {
                    return Err(FederationError::internal(
                        "Unexpectedly encountered a fragment spread in a @provides field set",
                    ));
                }
            }
        }
    }
    Ok(())
}
