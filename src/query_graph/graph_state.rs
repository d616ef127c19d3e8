use crate::error::FederationError;
use crate::query_graph::QueryGraph;
use crate::query_graph::QueryGraphEdge;
use crate::query_graph::VertexIndex;

/// A side table attaching mutable user state to the vertices and edges of a query graph, without
/// touching the graph itself.
///
/// Vertex state lives in a dense vector of `|V|` slots. Edge state is a jagged per-head table
/// whose rows are allocated lazily on the first write for that head (many vertices never get any
/// edge state). The table holds no reference into the graph; it is on the caller to not outlive
/// the graph the indices came from.
#[derive(Debug, Clone)]
pub struct QueryGraphState<VertexState, EdgeState = ()> {
    vertex_states: Vec<Option<VertexState>>,
    edge_states: Vec<Option<Vec<Option<EdgeState>>>>,
}

impl<VertexState, EdgeState> QueryGraphState<VertexState, EdgeState> {
    pub fn new(graph: &QueryGraph) -> Self {
        Self {
            vertex_states: (0..graph.vertices_count()).map(|_| None).collect(),
            edge_states: (0..graph.vertices_count()).map(|_| None).collect(),
        }
    }

    pub fn set_vertex_state(
        &mut self,
        vertex: VertexIndex,
        state: VertexState,
    ) -> Result<(), FederationError> {
        let slot = self.vertex_states.get_mut(vertex.index()).ok_or_else(|| {
            FederationError::internal(format!("Vertex {vertex} is not part of this graph"))
        })?;
        *slot = Some(state);
        Ok(())
    }

    pub fn remove_vertex_state(&mut self, vertex: VertexIndex) -> Result<(), FederationError> {
        let slot = self.vertex_states.get_mut(vertex.index()).ok_or_else(|| {
            FederationError::internal(format!("Vertex {vertex} is not part of this graph"))
        })?;
        *slot = None;
        Ok(())
    }

    pub fn get_vertex_state(&self, vertex: VertexIndex) -> Option<&VertexState> {
        self.vertex_states
            .get(vertex.index())
            .and_then(|slot| slot.as_ref())
    }

    pub fn set_edge_state(
        &mut self,
        edge: &QueryGraphEdge,
        state: EdgeState,
    ) -> Result<(), FederationError> {
        let head_states = self.edge_states.get_mut(edge.head.index()).ok_or_else(|| {
            FederationError::internal(format!("Vertex {} is not part of this graph", edge.head))
        })?;
        let slots = head_states.get_or_insert_with(Vec::new);
        if slots.len() <= edge.index {
            slots.resize_with(edge.index + 1, || None);
        }
        slots[edge.index] = Some(state);
        Ok(())
    }

    pub fn remove_edge_state(&mut self, edge: &QueryGraphEdge) -> Result<(), FederationError> {
        let head_states = self.edge_states.get_mut(edge.head.index()).ok_or_else(|| {
            FederationError::internal(format!("Vertex {} is not part of this graph", edge.head))
        })?;
        if let Some(slots) = head_states {
            if let Some(slot) = slots.get_mut(edge.index) {
                *slot = None;
            }
        }
        Ok(())
    }

    pub fn get_edge_state(&self, edge: &QueryGraphEdge) -> Option<&EdgeState> {
        self.edge_states
            .get(edge.head.index())
            .and_then(|slots| slots.as_ref())
            .and_then(|slots| slots.get(edge.index))
            .and_then(|slot| slot.as_ref())
    }
}
