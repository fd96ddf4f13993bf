use std::collections::HashMap;
use std::fmt::Write;

use petgraph::Graph;
use petgraph::graph::NodeIndex;

use crate::engine::Task;

pub(crate) struct Node {
    pub label: String,
    pub named: bool,
}

/// Composition tree of one or more tasks, flattened into a graph. Named tasks
/// appear once no matter how many pipelines share them; edges point from a
/// series to its members and carry the member's position.
pub(crate) struct TaskGraph {
    pub(crate) graph: Graph<Node, usize>,
}

impl TaskGraph {
    pub(crate) fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut this = Self {
            graph: Graph::new(),
        };
        let mut seen = HashMap::new();

        for task in tasks {
            this.visit(task, &mut seen);
        }

        this
    }

    fn visit(&mut self, task: &Task, seen: &mut HashMap<String, NodeIndex>) -> NodeIndex {
        if let Some(name) = task.name()
            && let Some(&index) = seen.get(name)
        {
            return index;
        }

        let index = self.graph.add_node(Node {
            label: task.label().into_owned(),
            named: task.name().is_some(),
        });

        if let Some(name) = task.name() {
            seen.insert(name.to_string(), index);
        }

        for (position, child) in task.children().iter().enumerate() {
            let child = self.visit(child, seen);
            self.graph.add_edge(index, child, position + 1);
        }

        index
    }

    /// Writes the graph in Mermaid syntax. `annotate` may give a node an extra
    /// label line and a fill color.
    pub(crate) fn write_mermaid(
        &self,
        f: &mut impl Write,
        annotate: impl Fn(&Node) -> Option<(String, String)>,
    ) -> std::fmt::Result {
        writeln!(f, "graph LR")?;

        for index in self.graph.node_indices() {
            let node = &self.graph[index];
            let name = node
                .label
                .replace('"', "\\\"")
                .replace('<', "&lt;")
                .replace('>', "&gt;");

            match annotate(node) {
                Some((extra, color)) => {
                    writeln!(f, "    {}[\"{}\\n{}\"]", index.index(), name, extra)?;
                    writeln!(f, "    style {} fill:{}", index.index(), color)?;
                }
                None => writeln!(f, "    {}[\"{}\"]", index.index(), name)?,
            }
        }

        for edge in self.graph.edge_indices() {
            if let Some((source, target)) = self.graph.edge_endpoints(edge) {
                writeln!(
                    f,
                    "    {} -- \"{}\" --> {}",
                    source.index(),
                    self.graph[edge],
                    target.index()
                )?;
            }
        }

        Ok(())
    }
}
