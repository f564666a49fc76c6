//! Typed directed graph over accounts, currencies and commodities.
//!
//! Nodes are keyed by string id. Price edges are kept bidirectional (the
//! inverse rate is added automatically) and carry a validity window so a
//! breadth-first search at a given date walks exactly the rates in force on
//! that date. Account hierarchy queries are derived from the `:`-separated
//! id segments; opening/closing edges record lifecycle events.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use rust_decimal::Decimal;
use thiserror::Error;

use beanledger_core::{Date, OwnedMeta};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NodeKind {
    Account,
    Currency,
    Commodity,
    Unknown,
}

#[derive(Clone, Debug)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    /// Present only when the node was introduced by an explicit directive
    /// (`open`, `commodity`); implicitly created nodes carry none, which is
    /// how reports tell declared entities from inferred ones.
    pub meta: Option<OwnedMeta>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EdgeKind {
    Price,
    Opening,
    Closing,
    TransactionPosting,
}

#[derive(Clone, Debug)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
    pub date: Option<Date>,
    pub rate: Option<Decimal>,
    /// True for edges the engine created itself (inverse rates).
    pub inferred: bool,
    /// A price edge stops applying once a newer rate for the same pair
    /// takes over.
    pub valid_until: Option<Date>,
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("no conversion path from {from} to {to} as of {as_of}")]
    NoPath { from: String, to: String, as_of: Date },

    #[error("price rate must be nonzero for {from}->{to}")]
    ZeroRate { from: String, to: String },
}

/// Directed graph with adjacency in insertion order and a by-date index of
/// price edges.
#[derive(Clone, Debug, Default)]
pub struct Graph {
    nodes: HashMap<String, Node>,
    edges: Vec<Edge>,
    adjacency: HashMap<String, Vec<usize>>,
    /// Price edges grouped by date; the BTreeMap keeps dates sorted.
    price_index: BTreeMap<Date, Vec<usize>>,
    /// Posting edges are queryable per account but excluded from traversal.
    posting_index: HashMap<String, Vec<usize>>,
}

impl Graph {
    pub fn new() -> Self {
        Graph::default()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Inserts a node if absent. An existing node keeps its id but may be
    /// upgraded: `Unknown` yields to any typed kind, and a `Currency` node
    /// becomes `Commodity` when an explicit declaration arrives. Metadata is
    /// attached only when the node had none.
    pub fn add_node(&mut self, id: &str, kind: NodeKind, meta: Option<OwnedMeta>) {
        match self.nodes.get_mut(id) {
            Some(node) => {
                let upgrade = node.kind == NodeKind::Unknown
                    || (node.kind == NodeKind::Currency && kind == NodeKind::Commodity);
                if upgrade && kind != NodeKind::Unknown {
                    node.kind = kind;
                }
                if node.meta.is_none() {
                    node.meta = meta;
                }
            }
            None => {
                self.nodes.insert(
                    id.to_string(),
                    Node {
                        id: id.to_string(),
                        kind,
                        meta,
                    },
                );
            }
        }
    }

    /// Appends an edge, creating unknown endpoints as needed.
    pub fn add_edge(&mut self, edge: Edge) {
        self.add_node(&edge.from.clone(), NodeKind::Unknown, None);
        self.add_node(&edge.to.clone(), NodeKind::Unknown, None);
        let idx = self.edges.len();
        match edge.kind {
            EdgeKind::TransactionPosting => {
                self.posting_index
                    .entry(edge.from.clone())
                    .or_default()
                    .push(idx);
            }
            _ => {
                self.adjacency.entry(edge.from.clone()).or_default().push(idx);
                if edge.kind == EdgeKind::Price {
                    if let Some(date) = edge.date {
                        self.price_index.entry(date).or_default().push(idx);
                    }
                }
            }
        }
        self.edges.push(edge);
    }

    /// Records a price observation: a dated edge plus its automatic
    /// inverse. A prior rate for the same pair has its validity window
    /// closed at the new date.
    pub fn add_price_edge(
        &mut self,
        from: &str,
        to: &str,
        date: Date,
        rate: Decimal,
        inferred: bool,
    ) -> Result<(), GraphError> {
        if rate.is_zero() {
            return Err(GraphError::ZeroRate {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        self.add_node(from, NodeKind::Currency, None);
        self.add_node(to, NodeKind::Currency, None);
        self.expire_prior_rates(from, to, date);
        self.expire_prior_rates(to, from, date);
        self.add_edge(Edge {
            from: from.to_string(),
            to: to.to_string(),
            kind: EdgeKind::Price,
            date: Some(date),
            rate: Some(rate),
            inferred,
            valid_until: None,
        });
        self.add_edge(Edge {
            from: to.to_string(),
            to: from.to_string(),
            kind: EdgeKind::Price,
            date: Some(date),
            rate: Some(Decimal::ONE / rate),
            inferred: true,
            valid_until: None,
        });
        Ok(())
    }

    fn expire_prior_rates(&mut self, from: &str, to: &str, until: Date) {
        let indices = match self.adjacency.get(from) {
            Some(indices) => indices.clone(),
            None => return,
        };
        for idx in indices {
            let edge = &mut self.edges[idx];
            if edge.kind == EdgeKind::Price
                && edge.to == to
                && edge.valid_until.is_none()
                && edge.date.map_or(false, |d| d < until)
            {
                edge.valid_until = Some(until);
            }
        }
    }

    /// Outgoing traversable edges of a node, in insertion order.
    pub fn outgoing(&self, id: &str) -> impl Iterator<Item = &Edge> + '_ {
        self.adjacency
            .get(id)
            .into_iter()
            .flatten()
            .map(move |&idx| &self.edges[idx])
    }

    /// Posting edges recorded for an account.
    pub fn posting_edges(&self, account: &str) -> impl Iterator<Item = &Edge> + '_ {
        self.posting_index
            .get(account)
            .into_iter()
            .flatten()
            .map(move |&idx| &self.edges[idx])
    }

    /// Price edges observed on one date.
    pub fn price_edges_on(&self, date: Date) -> impl Iterator<Item = &Edge> + '_ {
        self.price_index
            .get(&date)
            .into_iter()
            .flatten()
            .map(move |&idx| &self.edges[idx])
    }

    /// Dates carrying at least one price edge, ascending.
    pub fn price_dates(&self) -> impl Iterator<Item = Date> + '_ {
        self.price_index.keys().copied()
    }

    /// True when the node was created by an explicit directive rather than
    /// showing up implicitly (ancestor account, referenced currency).
    pub fn is_explicit(&self, id: &str) -> bool {
        self.nodes.get(id).map_or(false, |n| n.meta.is_some())
    }

    /// The parent account id, derived from the `:` segments.
    pub fn parent_of(&self, id: &str) -> Option<&Node> {
        let (parent, _) = id.rsplit_once(':')?;
        self.nodes.get(parent)
    }

    /// Direct children of an account node, in id order.
    pub fn children_of(&self, id: &str) -> Vec<&Node> {
        let prefix = format!("{}:", id);
        let mut children: Vec<&Node> = self
            .nodes
            .values()
            .filter(|n| {
                n.kind == NodeKind::Account
                    && n.id.starts_with(&prefix)
                    && !n.id[prefix.len()..].contains(':')
            })
            .collect();
        children.sort_by(|a, b| a.id.cmp(&b.id));
        children
    }

    /// All account nodes below this one, in id order.
    pub fn descendants_of(&self, id: &str) -> Vec<&Node> {
        let prefix = format!("{}:", id);
        let mut descendants: Vec<&Node> = self
            .nodes
            .values()
            .filter(|n| n.kind == NodeKind::Account && n.id.starts_with(&prefix))
            .collect();
        descendants.sort_by(|a, b| a.id.cmp(&b.id));
        descendants
    }

    fn edge_valid_at(edge: &Edge, as_of: Date) -> bool {
        let started = edge.date.map_or(true, |d| d <= as_of);
        let not_expired = edge.valid_until.map_or(true, |until| until > as_of);
        started && not_expired
    }

    /// Breadth-first search for a rate-bearing path valid as of a date.
    /// Deterministic: neighbors are visited in edge insertion order, and the
    /// first complete path wins.
    pub fn find_path(&self, from: &str, to: &str, as_of: Date) -> Option<Vec<&Edge>> {
        if from == to {
            return Some(Vec::new());
        }
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<(&str, Vec<&Edge>)> = VecDeque::new();
        visited.insert(from);
        queue.push_back((from, Vec::new()));

        while let Some((current, path)) = queue.pop_front() {
            for edge in self.outgoing(current) {
                if edge.rate.is_none() || !Self::edge_valid_at(edge, as_of) {
                    continue;
                }
                if visited.contains(edge.to.as_str()) {
                    continue;
                }
                let mut next_path = path.clone();
                next_path.push(edge);
                if edge.to == to {
                    return Some(next_path);
                }
                visited.insert(edge.to.as_str());
                queue.push_back((edge.to.as_str(), next_path));
            }
        }
        None
    }

    /// Converts a seed value between commodities using the product of edge
    /// rates along the first valid path. `from == to` converts at 1.
    pub fn convert_amount(
        &self,
        seed: Decimal,
        from: &str,
        to: &str,
        as_of: Date,
    ) -> Result<Decimal, GraphError> {
        if from == to {
            return Ok(seed);
        }
        let path = self.find_path(from, to, as_of).ok_or_else(|| GraphError::NoPath {
            from: from.to_string(),
            to: to.to_string(),
            as_of,
        })?;
        let mut value = seed;
        for edge in path {
            let rate = edge.rate.expect("conversion paths only use rate-bearing edges");
            value *= rate;
        }
        Ok(value)
    }
}
