use federation_query_graph::schema::position::SchemaRootDefinitionKind;
use federation_query_graph::QueryGraphState;
use federation_query_graph::VertexIndex;

use super::single_graph;

fn graph() -> federation_query_graph::QueryGraph {
    single_graph(
        "test",
        r#"
          type Query {
            a: A
          }

          type A {
            x: Int
            y: String
          }
        "#,
    )
}

#[test]
fn vertex_state_round_trips() {
    let graph = graph();
    let mut state: QueryGraphState<&str> = QueryGraphState::new(&graph);

    let root = graph.root(SchemaRootDefinitionKind::Query).unwrap();
    assert_eq!(state.get_vertex_state(root.index), None);
    state.set_vertex_state(root.index, "root").unwrap();
    assert_eq!(state.get_vertex_state(root.index), Some(&"root"));
    state.set_vertex_state(root.index, "updated").unwrap();
    assert_eq!(state.get_vertex_state(root.index), Some(&"updated"));
    state.remove_vertex_state(root.index).unwrap();
    assert_eq!(state.get_vertex_state(root.index), None);
}

#[test]
fn edge_state_round_trips() {
    let graph = graph();
    let mut state: QueryGraphState<(), u32> = QueryGraphState::new(&graph);

    let root = graph.root(SchemaRootDefinitionKind::Query).unwrap();
    let a_vertex = graph.vertex(graph.out_edges(root.index)[0].tail).unwrap();
    let x_edge = &graph.out_edges(a_vertex.index)[0];
    let y_edge = &graph.out_edges(a_vertex.index)[1];

    assert_eq!(state.get_edge_state(x_edge), None);
    state.set_edge_state(y_edge, 7).unwrap();
    // Writing one edge's state doesn't invent state for its siblings.
    assert_eq!(state.get_edge_state(x_edge), None);
    assert_eq!(state.get_edge_state(y_edge), Some(&7));
    state.set_edge_state(x_edge, 3).unwrap();
    assert_eq!(state.get_edge_state(x_edge), Some(&3));
    state.remove_edge_state(y_edge).unwrap();
    assert_eq!(state.get_edge_state(y_edge), None);
    assert_eq!(state.get_edge_state(x_edge), Some(&3));
}

#[test]
fn out_of_range_vertex_writes_are_errors() {
    let graph = graph();
    let mut state: QueryGraphState<u32> = QueryGraphState::new(&graph);
    let bogus = VertexIndex::new(graph.vertices_count());
    assert!(state.set_vertex_state(bogus, 1).is_err());
    assert_eq!(state.get_vertex_state(bogus), None);
}
