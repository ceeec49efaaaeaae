//! Stream graph validation and ordering

use super::types::{StreamKind, StreamNode};
use crate::context::path_variables;
use crate::error::{Error, Result};
use crate::walker::{BLOCK_ID_KEY, PAGE_ID_KEY};
use std::collections::{HashMap, HashSet, VecDeque};

/// Validated forest of streams
///
/// Construction checks everything that can be checked without a request:
/// unique names, known parents, no cycles, path variables and lineage keys
/// covered by the parent's context rule.
#[derive(Debug, Clone)]
pub struct StreamGraph {
    nodes: Vec<StreamNode>,
    index: HashMap<String, usize>,
    order: Vec<usize>,
}

/// Streams to run for a selection, in execution order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Streams to run, parents first
    pub streams: Vec<String>,
    /// Streams whose records are emitted
    pub emitted: HashSet<String>,
}

impl Selection {
    /// Whether records of a stream are emitted
    pub fn emits(&self, stream: &str) -> bool {
        self.emitted.contains(stream)
    }
}

impl StreamGraph {
    /// Validate nodes into a graph
    pub fn new(nodes: Vec<StreamNode>) -> Result<Self> {
        let mut index = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if node.name.trim().is_empty() {
                return Err(Error::graph("stream name must not be empty"));
            }
            if index.insert(node.name.clone(), i).is_some() {
                return Err(Error::graph(format!("duplicate stream '{}'", node.name)));
            }
        }

        for node in &nodes {
            validate_node(node, &index)?;
        }

        let order = topological_order(&nodes, &index)?;

        Ok(Self {
            nodes,
            index,
            order,
        })
    }

    /// Look up a stream
    pub fn get(&self, name: &str) -> Option<&StreamNode> {
        self.index.get(name).map(|&i| &self.nodes[i])
    }

    /// All streams in declaration order
    pub fn nodes(&self) -> &[StreamNode] {
        &self.nodes
    }

    /// Streams without a parent, in declaration order
    pub fn roots(&self) -> Vec<&StreamNode> {
        self.nodes.iter().filter(|n| n.is_root()).collect()
    }

    /// Direct children of a stream, in declaration order
    pub fn children(&self, name: &str) -> Vec<&StreamNode> {
        self.nodes
            .iter()
            .filter(|n| n.parent_name() == Some(name))
            .collect()
    }

    /// Every stream, parents strictly before children
    pub fn execution_order(&self) -> Vec<&StreamNode> {
        self.order.iter().map(|&i| &self.nodes[i]).collect()
    }

    /// Chain of ancestors of a stream, nearest first
    pub fn ancestors(&self, name: &str) -> Vec<&StreamNode> {
        let mut chain = Vec::new();
        let mut current = self.get(name).and_then(StreamNode::parent_name);
        while let Some(parent) = current {
            match self.get(parent) {
                Some(node) => {
                    chain.push(node);
                    current = node.parent_name();
                }
                None => break,
            }
        }
        chain
    }

    /// Resolve selected stream names into the streams that must run
    ///
    /// An empty selection means every stream. Ancestors of a selected stream
    /// run so their records can produce contexts, but are only emitted when
    /// selected themselves.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Selection> {
        if names.is_empty() {
            return Ok(Selection {
                streams: self.order.iter().map(|&i| self.nodes[i].name.clone()).collect(),
                emitted: self.nodes.iter().map(|n| n.name.clone()).collect(),
            });
        }

        let mut emitted = HashSet::new();
        let mut needed = HashSet::new();
        for name in names {
            let name = name.as_ref();
            if self.get(name).is_none() {
                return Err(Error::stream_not_found(name));
            }
            emitted.insert(name.to_string());
            needed.insert(name.to_string());
            for ancestor in self.ancestors(name) {
                needed.insert(ancestor.name.clone());
            }
        }

        let streams = self
            .order
            .iter()
            .map(|&i| &self.nodes[i].name)
            .filter(|name| needed.contains(*name))
            .cloned()
            .collect();

        Ok(Selection { streams, emitted })
    }
}

fn validate_node(node: &StreamNode, index: &HashMap<String, usize>) -> Result<()> {
    if node.is_incremental() && node.replication_key.is_none() {
        return Err(Error::graph(format!(
            "incremental stream '{}' has no replication key",
            node.name
        )));
    }

    let mut available: HashSet<&str> = HashSet::new();
    if let Some(link) = &node.parent {
        if link.stream == node.name {
            return Err(Error::graph(format!(
                "stream '{}' cannot be its own parent",
                node.name
            )));
        }
        if !index.contains_key(&link.stream) {
            return Err(Error::graph(format!(
                "stream '{}' references unknown parent '{}'",
                node.name, link.stream
            )));
        }
        if link.rule.fields.is_empty() {
            return Err(Error::graph(format!(
                "stream '{}' has a parent but its context rule maps no fields",
                node.name
            )));
        }
        available.extend(link.rule.keys());
    }

    if node.kind == StreamKind::BlockTree {
        if !available.contains(PAGE_ID_KEY) {
            return Err(Error::graph(format!(
                "block tree stream '{}' needs a '{PAGE_ID_KEY}' context",
                node.name
            )));
        }
        available.insert(BLOCK_ID_KEY);
    }

    for variable in path_variables(&node.path) {
        if !available.contains(variable.as_str()) {
            return Err(Error::graph(format!(
                "stream '{}' path uses '{{{variable}}}' which its context does not provide",
                node.name
            )));
        }
    }

    for (field, key) in &node.lineage {
        if !available.contains(key.as_str()) {
            return Err(Error::graph(format!(
                "stream '{}' stamps '{field}' from missing context key '{key}'",
                node.name
            )));
        }
    }

    Ok(())
}

/// Kahn's algorithm, peers kept in declaration order
fn topological_order(nodes: &[StreamNode], index: &HashMap<String, usize>) -> Result<Vec<usize>> {
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut in_degree = vec![0usize; nodes.len()];

    for (i, node) in nodes.iter().enumerate() {
        if let Some(parent) = node.parent_name() {
            if let Some(&p) = index.get(parent) {
                children[p].push(i);
                in_degree[i] += 1;
            }
        }
    }

    let mut queue: VecDeque<usize> = (0..nodes.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(i) = queue.pop_front() {
        order.push(i);
        for &child in &children[i] {
            in_degree[child] -= 1;
            if in_degree[child] == 0 {
                queue.push_back(child);
            }
        }
    }

    if order.len() != nodes.len() {
        let stuck: Vec<&str> = (0..nodes.len())
            .filter(|&i| in_degree[i] > 0)
            .map(|i| nodes[i].name.as_str())
            .collect();
        return Err(Error::graph(format!(
            "cycle between streams: {}",
            stuck.join(", ")
        )));
    }

    Ok(order)
}
