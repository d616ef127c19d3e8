use federation_query_graph::query_graph::output::to_dot;
use federation_query_graph::query_graph::output::to_mermaid;

use super::federated_graph;
use super::single_graph;

#[test]
fn renders_single_source_graph_as_dot() {
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
    insta::assert_snapshot!(to_dot(&graph), @r###"
    digraph "test" {
      0 [label="Query"]
      1 [label="A"]
      2 [label="Int"]
      0 -> 1 [label="a"]
      1 -> 2 [label="x"]
    }
    "###);
}

#[test]
fn renders_single_source_graph_as_mermaid() {
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
    insta::assert_snapshot!(to_mermaid(&graph), @r###"
    flowchart LR
      0["Query(test)*"]
      1["A(test)"]
      2["Int(test)"]
      0 -->|"a"| 1
      1 -->|"x"| 2
    "###);
}

#[test]
fn renders_federated_graph_with_subgraph_clusters() {
    let graph = federated_graph(
        r#"
          type Query {
            t: T
          }

          type T {
            id: ID
          }
        "#,
        &[
            (
                "S1",
                r#"
                  type Query {
                    t: T
                  }

                  type T @key(fields: "id") {
                    id: ID
                  }
                "#,
            ),
            (
                "S2",
                r#"
                  type Query {
                    t: T
                  }

                  type T @key(fields: "id") {
                    id: ID
                  }
                "#,
            ),
        ],
    );
    let dot = to_dot(&graph);
    assert!(dot.starts_with("digraph \"federated_subgraphs\" {"));
    assert!(dot.contains("subgraph \"cluster_S1\""));
    assert!(dot.contains("subgraph \"cluster_S2\""));
    // The federated root and its free-transition links live outside the clusters, and the key
    // edges cross them.
    assert!(dot.contains("label=\"[query]\""));
    assert!(dot.contains("label=\"{ id } ⊢ key()\""));
}
