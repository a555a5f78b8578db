//! The frame graph turns the ordered pass list of a frame into a validated execution order.
//!
//! Edges are derived from resource versions. A pass that writes version `v` of a resource (declared with
//! `required_version = v - 1` and a [`Write`](crate::Usage::Write) or [`Combined`](crate::Usage::Combined) usage) becomes the
//! producer of `(resource, v)`. Any pass that reads the resource at `required_version = v` depends on that producer.
//! If several passes claim to produce the same version, the last one in declaration order wins.
//! Reads of a version that no pass produces add no edge, their input is assumed to be set up outside the graph.
//!
//! The graph is sorted with Kahn's algorithm. Passes that are connected to at least one edge are ordered by their
//! topological rank (the length of the longest edge path leading to them), ties broken by declaration order.
//! Passes without any edge are appended afterwards, in declaration order.
//!
//! Through the [`GraphViz`] trait, the graph can be exported in graphviz `dot` format.

use std::collections::{HashMap, VecDeque};
use std::fmt::{Display, Formatter};

use anyhow::Result;
use petgraph::dot::Dot;
use petgraph::graph::{EdgeReference, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::{Direction, Graph};

use crate::graph::dependency::DependencyDeclaration;
use crate::resource::ResourceId;
use crate::Error;

/// A pass in the frame graph.
#[derive(Debug, Clone)]
pub struct PassNode {
    /// Index of the pass in the declared pass list
    pub index: usize,
    /// Name of the pass
    pub name: String,
}

/// A producer to consumer dependency. Holds every `(resource, version)` pair that caused it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyEdge {
    /// The resources and versions passed along this edge
    pub resources: Vec<(ResourceId, u32)>,
}

/// A read that found no producer for its version.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct UnmatchedRead {
    /// Index of the reading pass
    pub pass: usize,
    /// The resource read
    pub resource: ResourceId,
    /// The version the pass expected
    pub version: u32,
}

/// A built and sorted frame graph.
#[derive(Debug)]
pub struct FrameGraph {
    graph: Graph<PassNode, DependencyEdge>,
    schedule: Vec<usize>,
    unmatched: Vec<UnmatchedRead>,
}

impl FrameGraph {
    /// Build the graph for a list of passes, given as `(name, declaration)` in declaration order.
    /// # Errors
    /// * [`Error::GraphHasCycle`] if the dependencies form a cycle. The error lists every pass that could not be scheduled.
    pub fn build<'a, I>(passes: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a DependencyDeclaration)>, {
        let passes = passes.into_iter().collect::<Vec<_>>();
        let mut graph = Graph::<PassNode, DependencyEdge>::with_capacity(passes.len(), passes.len());
        let nodes = passes
            .iter()
            .enumerate()
            .map(|(index, (name, _))| {
                graph.add_node(PassNode {
                    index,
                    name: name.to_string(),
                })
            })
            .collect::<Vec<NodeIndex>>();

        // Producers, keyed by the version they produce.
        let mut writers = HashMap::<(ResourceId, u32), usize>::new();
        for (index, (_, declaration)) in passes.iter().enumerate() {
            for access in declaration.accesses().filter(|access| access.usage.produces_version()) {
                let produced = access
                    .required_version
                    .checked_add(1)
                    .ok_or_else(|| Error::VersionOverflow(format!("{:?}", access.resource)))?;
                writers.insert((access.resource, produced), index);
            }
        }

        let mut unmatched = Vec::new();
        for (consumer, (_, declaration)) in passes.iter().enumerate() {
            for access in declaration.accesses().filter(|access| access.usage.is_read()) {
                let key = (access.resource, access.required_version);
                let Some(&producer) = writers.get(&key) else {
                    unmatched.push(UnmatchedRead {
                        pass: consumer,
                        resource: access.resource,
                        version: access.required_version,
                    });
                    continue;
                };
                let (from, to) = (nodes[producer], nodes[consumer]);
                match graph.find_edge(from, to) {
                    Some(edge) => graph[edge].resources.push(key),
                    None => {
                        graph.add_edge(
                            from,
                            to,
                            DependencyEdge {
                                resources: vec![key],
                            },
                        );
                    }
                }
            }
        }

        let schedule = Self::sort(&graph)?;
        Ok(Self {
            graph,
            schedule,
            unmatched,
        })
    }

    fn is_connected(graph: &Graph<PassNode, DependencyEdge>, node: NodeIndex) -> bool {
        graph.edges_directed(node, Direction::Incoming).next().is_some()
            || graph.edges_directed(node, Direction::Outgoing).next().is_some()
    }

    fn sort(graph: &Graph<PassNode, DependencyEdge>) -> Result<Vec<usize>> {
        let count = graph.node_count();
        // Parallel edges are merged when building, so this counts distinct producers.
        let mut in_degree = graph
            .node_indices()
            .map(|node| graph.neighbors_directed(node, Direction::Incoming).count())
            .collect::<Vec<_>>();
        let mut rank = vec![0usize; count];
        let connected = graph
            .node_indices()
            .filter(|&node| Self::is_connected(graph, node))
            .collect::<Vec<_>>();

        let mut queue = connected
            .iter()
            .copied()
            .filter(|node| in_degree[node.index()] == 0)
            .collect::<VecDeque<_>>();
        let mut emitted = Vec::with_capacity(connected.len());
        while let Some(node) = queue.pop_front() {
            emitted.push(node.index());
            for edge in graph.edges_directed(node, Direction::Outgoing) {
                let next = edge.target();
                rank[next.index()] = rank[next.index()].max(rank[node.index()] + 1);
                in_degree[next.index()] -= 1;
                if in_degree[next.index()] == 0 {
                    queue.push_back(next);
                }
            }
        }

        if emitted.len() != connected.len() {
            let remaining = connected
                .iter()
                .filter(|node| !emitted.contains(&node.index()))
                .map(|&node| graph[node].name.clone())
                .collect::<Vec<_>>();
            return Err(Error::GraphHasCycle(remaining).into());
        }

        // Node indices are declaration indices, so this is a stable sort on rank.
        emitted.sort_by_key(|&index| (rank[index], index));
        emitted.extend(
            graph
                .node_indices()
                .filter(|&node| !Self::is_connected(graph, node))
                .map(|node| node.index()),
        );
        Ok(emitted)
    }

    /// The execution order, as indices into the declared pass list.
    pub fn schedule(&self) -> &[usize] {
        &self.schedule
    }

    /// The execution order, as pass names.
    pub fn schedule_names(&self) -> Vec<&str> {
        self.schedule
            .iter()
            .map(|&index| self.graph[NodeIndex::new(index)].name.as_str())
            .collect()
    }

    /// Name of a pass by declaration index.
    pub fn pass_name(&self, index: usize) -> Option<&str> {
        self.graph
            .node_weight(NodeIndex::new(index))
            .map(|node| node.name.as_str())
    }

    /// Number of passes in the graph.
    pub fn num_passes(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of distinct producer to consumer edges.
    pub fn num_edges(&self) -> usize {
        self.graph.edge_count()
    }

    /// All edges as `(producer, consumer, edge)`, using declaration indices.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize, &DependencyEdge)> {
        self.graph
            .edge_references()
            .map(|edge| (edge.source().index(), edge.target().index(), edge.weight()))
    }

    /// Whether `consumer` depends directly on `producer`.
    pub fn has_edge(&self, producer: usize, consumer: usize) -> bool {
        producer < self.graph.node_count()
            && consumer < self.graph.node_count()
            && self
                .graph
                .find_edge(NodeIndex::new(producer), NodeIndex::new(consumer))
                .is_some()
    }

    /// Whether a pass has no edges at all.
    pub fn is_isolated(&self, index: usize) -> bool {
        index < self.graph.node_count() && !Self::is_connected(&self.graph, NodeIndex::new(index))
    }

    /// Reads that did not match any producer. These add no edge.
    pub fn unmatched_reads(&self) -> &[UnmatchedRead] {
        &self.unmatched
    }

    fn get_edge_attributes(_: &Graph<PassNode, DependencyEdge>, _: EdgeReference<DependencyEdge>) -> String {
        String::from("")
    }

    fn get_node_attributes(_: &Graph<PassNode, DependencyEdge>, _: (NodeIndex, &PassNode)) -> String {
        String::from("fillcolor = \"#5e6df7\"")
    }
}

/// Implemented by graphs that can be exported to graphviz.
pub trait GraphViz {
    /// Get the string representation of this graph in `dot` format.
    fn dot(&self) -> Result<String>;
}

impl GraphViz for FrameGraph {
    fn dot(&self) -> Result<String> {
        Ok(format!(
            "{}",
            Dot::with_attr_getters(&self.graph, &[], &Self::get_edge_attributes, &Self::get_node_attributes)
        ))
    }
}

impl Display for PassNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("Pass: {}", &self.name))
    }
}

impl Display for DependencyEdge {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let labels = self
            .resources
            .iter()
            .map(|(resource, version)| format!("{}@v{}", resource.index(), version))
            .collect::<Vec<_>>();
        f.write_str(&labels.join(", "))
    }
}

