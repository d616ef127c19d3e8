mod build_query_graph_tests;
mod graph_state_tests;
mod output_tests;

use apollo_compiler::schema::Name;
use apollo_compiler::NodeStr;
use federation_query_graph::build_query_graph;
use federation_query_graph::build_federated_query_graph;
use federation_query_graph::schema::ValidFederationSchema;
use federation_query_graph::QueryGraph;
use federation_query_graph::QueryGraphVertex;
use federation_query_graph::Supergraph;

/// The federation directive definitions subgraph schemas carry (for federation 2 subgraphs,
/// `@link` expansion is what would put them there).
const FEDERATION_DIRECTIVES: &str = r#"
directive @key(fields: String!, resolvable: Boolean = true) repeatable on OBJECT | INTERFACE
directive @external on FIELD_DEFINITION | OBJECT
directive @requires(fields: String!) on FIELD_DEFINITION
directive @provides(fields: String!) on FIELD_DEFINITION
"#;

pub(crate) fn subgraph_sdl(body: &str) -> String {
    format!("{FEDERATION_DIRECTIVES}{body}")
}

pub(crate) fn single_graph(name: &str, sdl: &str) -> QueryGraph {
    let schema = ValidFederationSchema::parse(sdl, "schema.graphql").unwrap();
    build_query_graph(NodeStr::new(name), schema).unwrap()
}

pub(crate) fn federated_graph(supergraph_sdl: &str, subgraphs: &[(&str, &str)]) -> QueryGraph {
    let expanded: Vec<(String, String)> = subgraphs
        .iter()
        .map(|(name, body)| (name.to_string(), subgraph_sdl(body)))
        .collect();
    let expanded_refs: Vec<(&str, &str)> = expanded
        .iter()
        .map(|(name, sdl)| (name.as_str(), sdl.as_str()))
        .collect();
    let supergraph = Supergraph::parse(supergraph_sdl, &expanded_refs).unwrap();
    build_federated_query_graph(&supergraph).unwrap()
}

pub(crate) fn type_name(name: &str) -> Name {
    Name::new_unchecked(NodeStr::new(name))
}

/// The unique vertex for the given type name and source.
pub(crate) fn vertex_for<'a>(
    graph: &'a QueryGraph,
    type_: &str,
    source: &str,
) -> &'a QueryGraphVertex {
    let mut vertices = graph
        .vertices_for_type(&type_name(type_))
        .filter(|vertex| vertex.source.as_str() == source);
    let vertex = vertices
        .next()
        .unwrap_or_else(|| panic!("no vertex for type {type_} in source {source}"));
    assert!(
        vertices.next().is_none(),
        "multiple vertices for type {type_} in source {source}"
    );
    vertex
}

/// Checks the structural invariants every built graph upholds: dense vertex indices, per-head
/// contiguous edge indices, heads matching their adjacency row, and sources closed over every
/// vertex's source.
pub(crate) fn assert_graph_invariants(graph: &QueryGraph) {
    for (position, vertex) in graph.vertices().enumerate() {
        assert_eq!(vertex.index.index(), position);
        assert!(graph.schema_by_source(&vertex.source).is_ok());
    }
    for vertex in graph.vertices() {
        for (position, edge) in graph.out_edges(vertex.index).iter().enumerate() {
            assert_eq!(edge.head, vertex.index);
            assert_eq!(edge.index, position);
            assert!(graph.vertex(edge.tail).is_ok());
        }
    }
    for root in graph.roots() {
        assert!(root.root_kind.is_some());
        assert_eq!(
            graph.vertex(root.index).unwrap().index,
            root.index,
        );
    }
}
