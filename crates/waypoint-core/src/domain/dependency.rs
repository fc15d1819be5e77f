//! Dependency graph over the tasks of one workflow.
//!
//! Edges point from a task to the tasks it depends on (waits for).
//! Used to reject cycles when `dependsOn` is assigned.

use std::collections::{HashMap, HashSet};

use super::ids::TaskId;
use super::task::Task;

/// Dependency graph for tracking task dependencies.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// task -> tasks it depends on
    edges: HashMap<TaskId, HashSet<TaskId>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// On the current DFS path.
    Gray,
    /// Fully explored.
    Black,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph from the `depends_on` lists of `tasks`.
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut graph = Self::new();
        for task in tasks {
            for dep in &task.depends_on {
                graph.add_dependency(task.id, *dep);
            }
        }
        graph
    }

    /// Add a dependency: `task` depends on `depends_on`.
    ///
    /// Example: add_dependency(task_b, task_a) means "B waits for A"
    pub fn add_dependency(&mut self, task: TaskId, depends_on: TaskId) {
        self.edges.entry(task).or_default().insert(depends_on);
    }

    pub fn get_dependencies(&self, task: TaskId) -> Vec<TaskId> {
        self.edges
            .get(&task)
            .map(|deps| deps.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Detect a cycle in the dependency graph.
    ///
    /// Depth-first search with white/gray/black colouring, O(V + E).
    /// Returns the first cycle found as a closed path (`[a, b, .., a]`),
    /// or None if the graph is a DAG.
    pub fn detect_cycle(&self) -> Option<Vec<TaskId>> {
        let mut colors: HashMap<TaskId, Color> = HashMap::new();
        let mut path: Vec<TaskId> = Vec::new();

        for &start in self.edges.keys() {
            if colors.contains_key(&start) {
                continue;
            }
            if let Some(cycle) = self.dfs_cycle(start, &mut colors, &mut path) {
                return Some(cycle);
            }
        }
        None
    }

    fn dfs_cycle(
        &self,
        node: TaskId,
        colors: &mut HashMap<TaskId, Color>,
        path: &mut Vec<TaskId>,
    ) -> Option<Vec<TaskId>> {
        colors.insert(node, Color::Gray);
        path.push(node);

        for dep in self.get_dependencies(node) {
            match colors.get(&dep) {
                Some(Color::Gray) => {
                    // dep は現在のパス上にある: そこから先が閉路
                    let start = path.iter().position(|n| *n == dep).unwrap_or(0);
                    let mut cycle = path[start..].to_vec();
                    cycle.push(dep);
                    return Some(cycle);
                }
                Some(Color::Black) => {}
                None => {
                    if let Some(cycle) = self.dfs_cycle(dep, colors, path) {
                        return Some(cycle);
                    }
                }
            }
        }

        colors.insert(node, Color::Black);
        path.pop();
        None
    }
}
