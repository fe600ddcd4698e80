//! Generic directed graph of named vertices
//!
//! Vertices are keyed by name and keep their outgoing edges in insertion
//! order. The graph knows nothing about modules; the orchestrator keeps
//! module names and vertex names in lockstep and hangs every module off a
//! synthetic root so one traversal can reach the whole graph.

pub mod cycle;

pub use cycle::find_cycle;

use std::collections::HashMap;

use crate::error::{Result, WireError};

/// A named vertex with ordered outgoing edges and optional opaque data
#[derive(Debug, Clone)]
pub struct Vertex<D> {
    /// Unique vertex name
    pub name: String,
    /// Outgoing edge targets in insertion order
    pub edges: Vec<String>,
    /// Opaque payload attached at insertion
    pub data: Option<D>,
}

/// Directed graph keyed by vertex name
#[derive(Debug)]
pub struct DependencyGraph<D> {
    vertices: HashMap<String, Vertex<D>>,
}

impl<D> DependencyGraph<D> {
    /// Create an empty graph
    pub fn new() -> Self {
        Self {
            vertices: HashMap::new(),
        }
    }

    /// Insert a vertex, replacing any existing vertex with the same name
    /// (replacement drops the old vertex's edges)
    pub fn add_vertex(&mut self, name: impl Into<String>, data: Option<D>) {
        let name = name.into();
        self.vertices.insert(
            name.clone(),
            Vertex {
                name,
                edges: Vec::new(),
                data,
            },
        );
    }

    /// Insert a directed edge between two existing vertices
    ///
    /// Re-inserting an existing edge is a no-op. An absent endpoint is a
    /// `VertexNotFound` error.
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<()> {
        if !self.vertices.contains_key(to) {
            return Err(WireError::VertexNotFound(to.to_string()));
        }
        let vertex = self
            .vertices
            .get_mut(from)
            .ok_or_else(|| WireError::VertexNotFound(from.to_string()))?;
        if !vertex.edges.iter().any(|edge| edge == to) {
            vertex.edges.push(to.to_string());
        }
        Ok(())
    }

    /// Look up a vertex by name
    pub fn vertex(&self, name: &str) -> Option<&Vertex<D>> {
        self.vertices.get(name)
    }

    /// Whether a vertex with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.vertices.contains_key(name)
    }

    /// Iterate all vertices, order unspecified
    pub fn vertices(&self) -> impl Iterator<Item = &Vertex<D>> {
        self.vertices.values()
    }

    /// Number of vertices
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Whether the graph has no vertices
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

impl<D> Default for DependencyGraph<D> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_edge_requires_both_endpoints() {
        let mut graph: DependencyGraph<()> = DependencyGraph::new();
        graph.add_vertex("a", None);

        let err = graph.add_edge("a", "missing").unwrap_err();
        assert!(matches!(err, WireError::VertexNotFound(name) if name == "missing"));

        let err = graph.add_edge("missing", "a").unwrap_err();
        assert!(matches!(err, WireError::VertexNotFound(name) if name == "missing"));
    }

    #[test]
    fn duplicate_edge_is_noop() {
        let mut graph: DependencyGraph<()> = DependencyGraph::new();
        graph.add_vertex("a", None);
        graph.add_vertex("b", None);

        graph.add_edge("a", "b").unwrap();
        graph.add_edge("a", "b").unwrap();

        assert_eq!(graph.vertex("a").unwrap().edges, vec!["b".to_string()]);
    }

    #[test]
    fn edges_keep_insertion_order() {
        let mut graph: DependencyGraph<()> = DependencyGraph::new();
        graph.add_vertex("a", None);
        graph.add_vertex("b", None);
        graph.add_vertex("c", None);

        graph.add_edge("a", "c").unwrap();
        graph.add_edge("a", "b").unwrap();

        assert_eq!(
            graph.vertex("a").unwrap().edges,
            vec!["c".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn readding_vertex_replaces_it() {
        let mut graph: DependencyGraph<u32> = DependencyGraph::new();
        graph.add_vertex("a", Some(1));
        graph.add_vertex("b", None);
        graph.add_edge("a", "b").unwrap();

        graph.add_vertex("a", Some(2));

        let vertex = graph.vertex("a").unwrap();
        assert!(vertex.edges.is_empty());
        assert_eq!(vertex.data, Some(2));
        assert_eq!(graph.len(), 2);
    }
}
