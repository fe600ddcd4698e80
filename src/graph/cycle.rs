//! Depth-first cycle detection
//!
//! Walks from a designated root keeping an explicit ordered path stack.
//! The first cycle found wins and stops the whole search; the reported
//! path runs from the first occurrence of the repeated vertex through the
//! repeat itself. Vertices may be revisited via different paths; with tens
//! of vertices there is no need for global memoization.

use super::DependencyGraph;

/// Find the first cycle reachable from `root`, if any
///
/// Children are explored in edge insertion order, so for a given graph the
/// same cycle is reported every time.
pub fn find_cycle<D>(graph: &DependencyGraph<D>, root: &str) -> Option<Vec<String>> {
    let mut path = Vec::new();
    let mut found = None;
    walk(graph, root, &mut path, &mut found);
    found
}

fn walk<D>(
    graph: &DependencyGraph<D>,
    name: &str,
    path: &mut Vec<String>,
    found: &mut Option<Vec<String>>,
) {
    if found.is_some() {
        return;
    }
    if let Some(first) = path.iter().position(|visited| visited == name) {
        let mut cycle = path[first..].to_vec();
        cycle.push(name.to_string());
        *found = Some(cycle);
        return;
    }
    // An edge to a vertex that was never added is the caller's bug; the
    // walk treats it as a dead end rather than a cycle.
    let Some(vertex) = graph.vertex(name) else {
        return;
    };
    path.push(name.to_string());
    for next in &vertex.edges {
        walk(graph, next, path, found);
        if found.is_some() {
            return;
        }
    }
    path.pop();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_of(edges: &[(&str, &str)]) -> DependencyGraph<()> {
        let mut graph = DependencyGraph::new();
        for (from, to) in edges {
            if !graph.contains(from) {
                graph.add_vertex(*from, None);
            }
            if !graph.contains(to) {
                graph.add_vertex(*to, None);
            }
        }
        for (from, to) in edges {
            graph.add_edge(from, to).unwrap();
        }
        graph
    }

    #[test]
    fn acyclic_graph_has_no_cycle() {
        let graph = graph_of(&[("root", "a"), ("root", "b"), ("a", "b"), ("b", "c")]);
        assert_eq!(find_cycle(&graph, "root"), None);
    }

    #[test]
    fn detects_direct_cycle() {
        let graph = graph_of(&[("root", "a"), ("a", "b"), ("b", "a")]);
        let cycle = find_cycle(&graph, "root").unwrap();
        assert_eq!(cycle, vec!["a", "b", "a"]);
    }

    #[test]
    fn detects_transitive_cycle() {
        let graph = graph_of(&[("root", "a"), ("a", "b"), ("b", "c"), ("c", "a")]);
        let cycle = find_cycle(&graph, "root").unwrap();
        assert_eq!(cycle, vec!["a", "b", "c", "a"]);
    }

    #[test]
    fn detects_self_loop() {
        let graph = graph_of(&[("root", "a"), ("a", "a")]);
        let cycle = find_cycle(&graph, "root").unwrap();
        assert_eq!(cycle, vec!["a", "a"]);
    }

    #[test]
    fn first_cycle_wins() {
        // Both a->b->a and c->d->c are reachable; the walk reaches the
        // a/b cycle first because root's edges were inserted in order.
        let graph = graph_of(&[
            ("root", "a"),
            ("root", "c"),
            ("a", "b"),
            ("b", "a"),
            ("c", "d"),
            ("d", "c"),
        ]);
        let cycle = find_cycle(&graph, "root").unwrap();
        assert_eq!(cycle, vec!["a", "b", "a"]);
    }

    #[test]
    fn revisiting_via_different_paths_is_not_a_cycle() {
        // Diamond: root -> a -> c, root -> b -> c.
        let graph = graph_of(&[("root", "a"), ("root", "b"), ("a", "c"), ("b", "c")]);
        assert_eq!(find_cycle(&graph, "root"), None);
    }

    #[test]
    fn missing_root_yields_no_cycle() {
        let graph: DependencyGraph<()> = DependencyGraph::new();
        assert_eq!(find_cycle(&graph, "root"), None);
    }
}
