// src/dag/graph.rs

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;

use crate::action::Action;
use crate::dag::registry::{Step, TaskRegistry};
use crate::errors::{Result, TaskweaveError};
use crate::project::ProcessGroup;
use crate::types::{GroupName, TaskName};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Node<'a> {
    Task(&'a str),
    Group(&'a str),
}

impl fmt::Display for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Task(name) => f.write_str(name),
            Node::Group(name) => write!(f, "group({name})"),
        }
    }
}

/// Whole-configuration reference graph.
///
/// Edge direction: referrer -> referenced. For
///
/// ```toml
/// [task.server]
/// steps = ["build:dev", { kind = "concurrent", group = "dev" }]
/// ```
///
/// we add `server -> build:dev` and `server -> group(dev)`, and each member
/// of `dev` gets an edge `group(dev) -> member`. Unknown references are
/// skipped here; they are reported separately by config validation.
#[derive(Debug)]
pub struct TaskGraph<'a> {
    graph: DiGraphMap<Node<'a>, ()>,
}

impl<'a> TaskGraph<'a> {
    pub fn build(
        registry: &'a TaskRegistry,
        groups: &'a BTreeMap<GroupName, ProcessGroup>,
    ) -> Self {
        let mut graph: DiGraphMap<Node<'a>, ()> = DiGraphMap::new();

        for task in registry.tasks() {
            let from = Node::Task(task.name.as_str());
            graph.add_node(from);

            for step in &task.steps {
                match step {
                    Step::Task(name) => {
                        for target in referenced_tasks(registry, name) {
                            graph.add_edge(from, Node::Task(target), ());
                        }
                    }
                    Step::Action(Action::Concurrent(opts)) => {
                        if let Some((name, _)) = groups.get_key_value(&opts.group) {
                            graph.add_edge(from, Node::Group(name.as_str()), ());
                        }
                    }
                    Step::Action(_) => {}
                }
            }
        }

        for (name, group) in groups {
            let from = Node::Group(name.as_str());
            graph.add_node(from);
            for member in &group.members {
                for target in referenced_tasks(registry, &member.task) {
                    graph.add_edge(from, Node::Task(target), ());
                }
            }
        }

        Self { graph }
    }

    /// Direct task references of `task` (group edges excluded).
    pub fn dependencies_of(&self, task: &str) -> Vec<&'a str> {
        let Some(node) = self
            .graph
            .nodes()
            .find(|n| matches!(n, Node::Task(name) if *name == task))
        else {
            return Vec::new();
        };
        self.graph
            .neighbors(node)
            .filter_map(|n| match n {
                Node::Task(name) => Some(name),
                Node::Group(_) => None,
            })
            .collect()
    }

    /// Fail with `CyclicTask` if any task reaches itself, directly or
    /// through other tasks and process groups.
    pub fn check_acyclic(&self) -> Result<()> {
        for scc in tarjan_scc(&self.graph) {
            let is_cycle = scc.len() > 1
                || scc
                    .first()
                    .is_some_and(|&n| self.graph.contains_edge(n, n));
            if is_cycle {
                return Err(TaskweaveError::CyclicTask {
                    cycle: self.cycle_path(&scc),
                });
            }
        }
        Ok(())
    }

    /// Find a concrete path through a strongly connected component that
    /// starts and ends at its smallest node.
    fn cycle_path(&self, scc: &[Node<'a>]) -> Vec<TaskName> {
        let members: HashSet<Node<'a>> = scc.iter().copied().collect();
        let Some(&start) = scc.iter().min() else {
            return Vec::new();
        };

        let mut visited: HashSet<Node<'a>> = HashSet::new();
        let mut stack: Vec<(Node<'a>, Vec<Node<'a>>)> = vec![(start, vec![start])];

        while let Some((node, path)) = stack.pop() {
            let mut next_nodes: Vec<Node<'a>> = self.graph.neighbors(node).collect();
            next_nodes.sort();
            for next in next_nodes {
                if !members.contains(&next) {
                    continue;
                }
                if next == start {
                    let mut cycle: Vec<TaskName> = path.iter().map(|n| n.to_string()).collect();
                    cycle.push(start.to_string());
                    return cycle;
                }
                if visited.insert(next) {
                    let mut extended = path.clone();
                    extended.push(next);
                    stack.push((next, extended));
                }
            }
        }

        scc.iter().map(|n| n.to_string()).collect()
    }
}

/// Registered tasks a step reference stands for: the task itself, or every
/// `name:<target>` task when `name` is a bare prefix.
fn referenced_tasks<'r>(registry: &'r TaskRegistry, name: &str) -> Vec<&'r str> {
    if let Some(task) = registry.get(name) {
        return vec![task.name.as_str()];
    }
    registry
        .targets_of(name)
        .into_iter()
        .map(|t| t.name.as_str())
        .collect()
}
