//! Waits-on graph used for cycle detection.
//!
//! While a task waits for another (static dependency or dynamic `require`),
//! the executor records an edge `waiter -> awaited`. An edge that would make
//! the awaited task (transitively) wait for the waiter closes a cycle; such an
//! edge is rejected before anything waits on it, so cycles surface as errors
//! instead of deadlocks. Edges are removed as soon as the wait ends.

use std::collections::{HashMap, HashSet};

use super::types::TaskId;

/// In-flight waits between tasks of one run.
#[derive(Debug, Default)]
pub struct WaitGraph {
    /// waiter -> (awaited -> number of outstanding waits)
    edges: HashMap<TaskId, HashMap<TaskId, usize>>,
}

impl WaitGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `from` waits on `to`.
    ///
    /// Returns the cycle `[from, to, ..., from]` if the edge would close one.
    pub fn add_edge(&mut self, from: &TaskId, to: &TaskId) -> Result<(), Vec<TaskId>> {
        if let Some(path) = self.path(to, from) {
            let mut cycle = Vec::with_capacity(path.len() + 1);
            cycle.push(from.clone());
            cycle.extend(path);
            return Err(cycle);
        }

        *self
            .edges
            .entry(from.clone())
            .or_default()
            .entry(to.clone())
            .or_insert(0) += 1;
        Ok(())
    }

    /// Remove one outstanding wait of `from` on `to`.
    pub fn remove_edge(&mut self, from: &TaskId, to: &TaskId) {
        if let Some(targets) = self.edges.get_mut(from) {
            if let Some(count) = targets.get_mut(to) {
                *count -= 1;
                if *count == 0 {
                    targets.remove(to);
                }
            }
            if targets.is_empty() {
                self.edges.remove(from);
            }
        }
    }

    /// Number of distinct outstanding edges.
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(HashMap::len).sum()
    }

    /// Find a path `start -> ... -> goal` over current edges (depth-first).
    fn path(&self, start: &TaskId, goal: &TaskId) -> Option<Vec<TaskId>> {
        if start == goal {
            return Some(vec![start.clone()]);
        }

        let mut visited: HashSet<&TaskId> = HashSet::new();
        let mut stack: Vec<(&TaskId, Vec<TaskId>)> = vec![(start, vec![start.clone()])];

        while let Some((node, path)) = stack.pop() {
            if !visited.insert(node) {
                continue;
            }
            let Some(next) = self.edges.get(node) else {
                continue;
            };
            for neighbour in next.keys() {
                let mut extended = path.clone();
                extended.push(neighbour.clone());
                if neighbour == goal {
                    return Some(extended);
                }
                stack.push((neighbour, extended));
            }
        }
        None
    }
}
