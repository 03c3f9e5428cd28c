//! Address graph construction from a block's transaction records.
//!
//! Nodes are addresses, deduplicated by id and kept in first-seen order.
//! Links are never deduplicated: repeated payments between the same pair
//! become parallel edges, so `add_edge` is used instead of `update_edge`.

use std::collections::HashMap;
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::record::{decode_links, DecodeError, TransactionRecord};

/// Role an address had when it was first seen in the block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Group {
    From,
    To,
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::From => write!(f, "from"),
            Self::To => write!(f, "to"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub group: Group,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub source: String,
    pub target: String,
}

/// Directed multigraph of one block's fund movements.
#[derive(Clone, Debug, Default)]
pub struct BlockGraph {
    graph: DiGraph<Node, ()>,
    index: HashMap<String, NodeIndex>,
}

impl BlockGraph {
    /// Build the graph from decoded records.
    ///
    /// A sender is inserted before any of its links, so every link endpoint
    /// is always present in the node set. An address keeps the group it
    /// was first classified with.
    pub fn build(records: &[TransactionRecord]) -> Self {
        let mut graph = Self::default();

        for record in records {
            let source = graph.ensure_node(&record.sender, Group::From);
            for recipient in &record.recipients {
                let target = graph.ensure_node(recipient, Group::To);
                graph.graph.add_edge(source, target, ());
            }
        }

        tracing::debug!(
            nodes = graph.node_count(),
            links = graph.link_count(),
            "built block graph"
        );
        graph
    }

    /// Decode the service's `links` string and build the graph from it.
    pub fn from_links_json(links: &str) -> Result<Self, DecodeError> {
        Ok(Self::build(&decode_links(links)?))
    }

    fn ensure_node(&mut self, id: &str, group: Group) -> NodeIndex {
        if let Some(ix) = self.index.get(id) {
            return *ix;
        }
        let ix = self.graph.add_node(Node {
            id: id.to_string(),
            group,
        });
        self.index.insert(id.to_string(), ix);
        ix
    }

    /// Nodes in first-insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.graph.node_weights()
    }

    /// Links in record order.
    pub fn links(&self) -> Vec<Link> {
        self.graph
            .edge_references()
            .map(|edge| Link {
                source: self.graph[edge.source()].id.clone(),
                target: self.graph[edge.target()].id.clone(),
            })
            .collect()
    }

    /// Link endpoints as positions in [`BlockGraph::nodes`] order.
    pub fn link_endpoints(&self) -> Vec<(usize, usize)> {
        self.graph
            .edge_references()
            .map(|edge| (edge.source().index(), edge.target().index()))
            .collect()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|ix| &self.graph[*ix])
    }

    /// Position of a node in [`BlockGraph::nodes`] order.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).map(|ix| ix.index())
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn link_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }
}
