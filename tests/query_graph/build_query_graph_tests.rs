use federation_query_graph::build_supergraph_api_query_graph;
use federation_query_graph::matches_transition;
use federation_query_graph::schema::position::SchemaRootDefinitionKind;
use federation_query_graph::schema::ValidFederationSchema;
use federation_query_graph::QueryGraphEdgeTransition;

use super::assert_graph_invariants;
use super::single_graph;
use super::type_name;
use super::vertex_for;

#[test]
fn builds_graph_for_single_schema_with_two_object_types() {
    let graph = single_graph(
        "test",
        r#"
          type Query {
            a: A
          }

          type A {
            x: Int
          }
        "#,
    );
    assert_graph_invariants(&graph);

    assert_eq!(graph.vertices_count(), 3);
    assert_eq!(graph.edges_count(), 2);

    let root = graph.root(SchemaRootDefinitionKind::Query).unwrap();
    assert_eq!(root.type_.type_name(), Some(&type_name("Query")));
    assert_eq!(graph.roots().count(), 1);
    assert_eq!(
        graph.root_kinds().collect::<Vec<_>>(),
        vec![SchemaRootDefinitionKind::Query]
    );

    let query_edges = graph.out_edges(root.index);
    assert_eq!(query_edges.len(), 1);
    assert!(query_edges[0].is_edge_for_field("a"));
    let a_vertex = graph.vertex(query_edges[0].tail).unwrap();
    assert_eq!(a_vertex.type_.type_name(), Some(&type_name("A")));

    let a_edges = graph.out_edges(a_vertex.index);
    assert_eq!(a_edges.len(), 1);
    assert!(a_edges[0].is_edge_for_field("x"));
    let int_vertex = graph.vertex(a_edges[0].tail).unwrap();
    assert_eq!(int_vertex.type_.type_name(), Some(&type_name("Int")));
    assert!(graph.is_terminal(int_vertex.index));
    assert!(!graph.is_terminal(root.index));

    assert!(graph.out_edge(root.index, 0).is_some());
    assert!(graph.out_edge(root.index, 1).is_none());
}

#[test]
fn builds_downcast_edges_for_union_types() {
    let graph = single_graph(
        "test",
        r#"
          type Query {
            u: U
          }

          union U = A | B

          type A {
            x: Int
          }

          type B {
            y: Int
          }
        "#,
    );
    assert_graph_invariants(&graph);

    assert_eq!(graph.vertices_count(), 5);
    assert_eq!(graph.edges_count(), 5);

    let u_vertex = vertex_for(&graph, "U", "test");
    let u_edges = graph.out_edges(u_vertex.index);
    assert_eq!(u_edges.len(), 2);
    let downcast_targets: Vec<_> = u_edges
        .iter()
        .map(|edge| match &edge.transition {
            QueryGraphEdgeTransition::Downcast { to_type_name, .. } => to_type_name.clone(),
            other => panic!("expected a downcast transition, got {other:?}"),
        })
        .collect();
    assert_eq!(downcast_targets, vec![type_name("A"), type_name("B")]);

    let root = graph.root(SchemaRootDefinitionKind::Query).unwrap();
    let query_edges = graph.out_edges(root.index);
    assert_eq!(query_edges.len(), 1);
    assert!(query_edges[0].is_edge_for_field("u"));
    assert_eq!(query_edges[0].tail, u_vertex.index);
}

#[test]
fn scalar_and_enum_roots_of_fields_are_terminal() {
    let graph = single_graph(
        "test",
        r#"
          type Query {
            name: String
            status: Status
          }

          enum Status {
            ACTIVE
            INACTIVE
          }
        "#,
    );
    assert_graph_invariants(&graph);

    assert_eq!(graph.vertices_count(), 3);
    assert_eq!(graph.edges_count(), 2);
    assert!(graph.is_terminal(vertex_for(&graph, "String", "test").index));
    assert!(graph.is_terminal(vertex_for(&graph, "Status", "test").index));
}

#[test]
fn interface_without_implementations_gets_no_downcast_edges() {
    let graph = single_graph(
        "test",
        r#"
          type Query {
            i: I
          }

          interface I {
            x: Int
          }
        "#,
    );
    assert_graph_invariants(&graph);

    let i_vertex = vertex_for(&graph, "I", "test");
    assert!(graph.is_terminal(i_vertex.index));
}

#[test]
fn supergraph_api_graph_has_single_source_and_no_conditions() {
    let schema = ValidFederationSchema::parse(
        r#"
          type Query {
            i: I
          }

          interface I {
            x: Int
          }

          type A implements I {
            x: Int
            y: Int
          }
        "#,
        "schema.graphql",
    )
    .unwrap();
    let graph = build_supergraph_api_query_graph(schema).unwrap();
    assert_graph_invariants(&graph);

    assert_eq!(graph.name(), "supergraph");
    assert_eq!(graph.sources().count(), 1);
    for edge in graph.edges() {
        assert!(edge.conditions.is_none());
        assert!(!matches!(
            edge.transition,
            QueryGraphEdgeTransition::KeyResolution
        ));
    }
    // In a supergraph API graph each type name maps to at most one vertex.
    for vertex in graph.vertices() {
        let name = vertex.type_.type_name().unwrap();
        assert_eq!(graph.vertices_for_type(name).count(), 1);
    }
    // No interface-field shortcuts outside of federated subgraphs: the interface only gets its
    // downcast edge.
    let i_vertex = vertex_for(&graph, "I", "supergraph");
    let i_edges = graph.out_edges(i_vertex.index);
    assert_eq!(i_edges.len(), 1);
    assert!(matches!(
        &i_edges[0].transition,
        QueryGraphEdgeTransition::Downcast { to_type_name, .. } if to_type_name == "A"
    ));
}

#[test]
fn building_twice_produces_isomorphic_graphs() {
    let sdl = r#"
      type Query {
        u: U
        a: A
      }

      union U = A | B

      type A {
        x: Int
      }

      type B {
        y: Int
        z: String
      }
    "#;
    let first = single_graph("test", sdl);
    let second = single_graph("test", sdl);

    assert_eq!(first.vertices_count(), second.vertices_count());
    assert_eq!(first.edges_count(), second.edges_count());
    for vertex in first.vertices() {
        let name = vertex.type_.type_name().unwrap();
        assert_eq!(
            first.vertices_for_type(name).count(),
            second.vertices_for_type(name).count(),
        );
    }
    let transition_counts = |graph: &federation_query_graph::QueryGraph| {
        let mut fields = 0;
        let mut downcasts = 0;
        let mut others = 0;
        for edge in graph.edges() {
            match &edge.transition {
                QueryGraphEdgeTransition::FieldCollection { .. } => fields += 1,
                QueryGraphEdgeTransition::Downcast { .. } => downcasts += 1,
                _ => others += 1,
            }
        }
        (fields, downcasts, others)
    };
    assert_eq!(transition_counts(&first), transition_counts(&second));
}

#[test]
fn transitions_match_on_structure() {
    let graph = single_graph(
        "test",
        r#"
          type Query {
            u: U
            a: A
          }

          union U = A | B

          type A {
            x: Int
          }

          type B {
            x: Int
          }
        "#,
    );
    let schema = graph.schema_by_source("test").unwrap();

    let root = graph.root(SchemaRootDefinitionKind::Query).unwrap();
    let u_edge = &graph.out_edges(root.index)[0];
    let a_edge = &graph.out_edges(root.index)[1];
    // A field matches itself, and does not match a different field.
    assert!(matches_transition(&u_edge.transition, &u_edge.transition, schema, schema).unwrap());
    assert!(!matches_transition(&u_edge.transition, &a_edge.transition, schema, schema).unwrap());

    let u_vertex = vertex_for(&graph, "U", "test");
    let downcast_a = &graph.out_edges(u_vertex.index)[0];
    let downcast_b = &graph.out_edges(u_vertex.index)[1];
    // Downcasts match on their target type name.
    assert!(
        matches_transition(&downcast_a.transition, &downcast_a.transition, schema, schema)
            .unwrap()
    );
    assert!(
        !matches_transition(&downcast_a.transition, &downcast_b.transition, schema, schema)
            .unwrap()
    );
    // Different variants never match.
    assert!(
        !matches_transition(&u_edge.transition, &downcast_a.transition, schema, schema).unwrap()
    );
}
