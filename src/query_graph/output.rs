// Debug renderings of a built query graph, in Graphviz DOT and Mermaid form. Federated graphs
// get one DOT cluster per subgraph, with the synthetic roots and cross-subgraph edges at the top
// level. Construction never depends on anything here; the CLI is the main consumer.

use crate::query_graph::QueryGraph;
use crate::query_graph::QueryGraphEdge;
use crate::query_graph::QueryGraphVertex;

fn label_edge(edge: &QueryGraphEdge) -> String {
    let label = edge.to_string();
    if label.is_empty() {
        String::new()
    } else {
        format!("label=\"{}\"", label)
    }
}

fn label_vertex(vertex: &QueryGraphVertex) -> String {
    format!("label=\"{}\"", vertex.type_)
}

fn label_cluster_vertex(vertex: &QueryGraphVertex) -> String {
    format!("label=\"{}@{}\"", vertex.type_, vertex.source)
}

/// Renders the graph as Graphviz DOT: a flat digraph for single-source graphs, one cluster per
/// subgraph plus the cross-source edges for federated ones.
pub fn to_dot(graph: &QueryGraph) -> String {
    if graph.sources().count() > 1 {
        return to_dot_federated(graph);
    }

    let mut dot = format!("digraph \"{}\" {{\n", graph.name());
    for vertex in graph.vertices() {
        dot.push_str(&format!("  {} [{}]\n", vertex.index, label_vertex(vertex)));
    }
    for edge in graph.edges() {
        let label = label_edge(edge);
        if label.is_empty() {
            dot.push_str(&format!("  {} -> {}\n", edge.head, edge.tail));
        } else {
            dot.push_str(&format!("  {} -> {} [{}]\n", edge.head, edge.tail, label));
        }
    }
    dot.push('}');
    dot
}

fn to_dot_federated(graph: &QueryGraph) -> String {
    let mut dot = format!("digraph \"{}\" {{\n", graph.name());

    // Subgraph clusters: the vertices of each source, and the edges staying within it.
    for (cluster_name, _) in graph.sources() {
        if cluster_name.as_str() == graph.name() {
            continue; // the synthetic root source is rendered at the top level below
        }
        dot.push_str(&format!("  subgraph \"cluster_{}\" {{\n", cluster_name));
        dot.push_str(&format!(
            "    label = \"Subgraph \\\"{}\\\"\";\n",
            cluster_name
        ));
        dot.push_str("    color = \"black\"\n");
        dot.push_str("    style = \"\"\n");
        for vertex in graph.vertices().filter(|vertex| vertex.source == *cluster_name) {
            dot.push_str(&format!(
                "    {} [{}]\n",
                vertex.index,
                label_cluster_vertex(vertex)
            ));
        }
        for edge in graph.edges() {
            let (Ok(head), Ok(tail)) = (graph.vertex(edge.head), graph.vertex(edge.tail)) else {
                continue;
            };
            if head.source != *cluster_name || tail.source != *cluster_name {
                continue;
            }
            let label = label_edge(edge);
            if label.is_empty() {
                dot.push_str(&format!("    {} -> {}\n", edge.head, edge.tail));
            } else {
                dot.push_str(&format!("    {} -> {} [{}]\n", edge.head, edge.tail, label));
            }
        }
        dot.push_str("  }\n");
    }

    // Root-source vertices.
    for vertex in graph.vertices().filter(|vertex| vertex.source.as_str() == graph.name()) {
        dot.push_str(&format!("  {} [{}]\n", vertex.index, label_vertex(vertex)));
    }

    // Cross-source edges.
    for edge in graph.edges() {
        let (Ok(head), Ok(tail)) = (graph.vertex(edge.head), graph.vertex(edge.tail)) else {
            continue;
        };
        if head.source == tail.source {
            continue;
        }
        let label = label_edge(edge);
        if label.is_empty() {
            dot.push_str(&format!("  {} -> {}\n", edge.head, edge.tail));
        } else {
            dot.push_str(&format!("  {} -> {} [{}]\n", edge.head, edge.tail, label));
        }
    }

    dot.push('}');
    dot
}

/// Renders the graph as a Mermaid flowchart.
pub fn to_mermaid(graph: &QueryGraph) -> String {
    let mut out = String::from("flowchart LR\n");
    for vertex in graph.vertices() {
        out.push_str(&format!("  {}[\"{}\"]\n", vertex.index, vertex));
    }
    for edge in graph.edges() {
        let label = edge.to_string();
        if label.is_empty() {
            out.push_str(&format!("  {} --> {}\n", edge.head, edge.tail));
        } else {
            out.push_str(&format!("  {} -->|\"{}\"| {}\n", edge.head, label, edge.tail));
        }
    }
    out
}
