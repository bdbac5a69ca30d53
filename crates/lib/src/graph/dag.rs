//! Generic dependency DAG with deterministic ordering.
//!
//! Used for both stack ordering and resource ordering within a stack. Node
//! insertion order is the declaration order and breaks every tie, so the
//! same definitions always produce the same order and the same waves.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::hash::Hash;

use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

/// A DAG whose edges point from a dependency to its dependent.
#[derive(Debug, Clone)]
pub struct DependencyDag<K> {
  graph: DiGraph<K, ()>,
  nodes: HashMap<K, NodeIndex>,
}

impl<K: Clone + Eq + Hash> Default for DependencyDag<K> {
  fn default() -> Self {
    Self {
      graph: DiGraph::new(),
      nodes: HashMap::new(),
    }
  }
}

impl<K: Clone + Eq + Hash> DependencyDag<K> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a node. Adding an existing key is a no-op.
  pub fn add_node(&mut self, key: K) {
    if !self.nodes.contains_key(&key) {
      let idx = self.graph.add_node(key.clone());
      self.nodes.insert(key, idx);
    }
  }

  /// Record that `dependent` must come after `dependency`.
  ///
  /// Returns false when either node is unknown.
  pub fn add_edge(&mut self, dependency: &K, dependent: &K) -> bool {
    match (self.nodes.get(dependency), self.nodes.get(dependent)) {
      (Some(&from), Some(&to)) => {
        self.graph.update_edge(from, to, ());
        true
      }
      _ => false,
    }
  }

  /// Topological order via Kahn's algorithm.
  ///
  /// Among ready nodes the earliest declared is always taken first.
  ///
  /// # Errors
  ///
  /// Returns the members of every cycle, in declaration order. No partial
  /// order is ever returned.
  pub fn topological_order(&self) -> Result<Vec<K>, Vec<K>> {
    let mut in_degree: Vec<usize> = self
      .graph
      .node_indices()
      .map(|idx| self.graph.neighbors_directed(idx, Direction::Incoming).count())
      .collect();

    let mut ready: BinaryHeap<Reverse<NodeIndex>> = self
      .graph
      .node_indices()
      .filter(|idx| in_degree[idx.index()] == 0)
      .map(Reverse)
      .collect();

    let mut order = Vec::with_capacity(self.graph.node_count());

    while let Some(Reverse(idx)) = ready.pop() {
      order.push(idx);

      for dependent in self.graph.neighbors_directed(idx, Direction::Outgoing) {
        let deg = &mut in_degree[dependent.index()];
        *deg = deg.saturating_sub(1);
        if *deg == 0 {
          ready.push(Reverse(dependent));
        }
      }
    }

    if order.len() != self.graph.node_count() {
      return Err(self.cycle_members());
    }

    Ok(order.into_iter().map(|idx| self.graph[idx].clone()).collect())
  }

  /// Group nodes into waves: every node's dependencies sit in earlier waves.
  ///
  /// Nodes within a wave are in declaration order.
  pub fn waves(&self) -> Result<Vec<Vec<K>>, Vec<K>> {
    let order = self.topological_order()?;
    let mut level: HashMap<NodeIndex, usize> = HashMap::new();
    let mut waves: Vec<Vec<NodeIndex>> = Vec::new();

    for key in &order {
      let idx = self.nodes[key];
      let node_level = self
        .graph
        .neighbors_directed(idx, Direction::Incoming)
        .filter_map(|dep| level.get(&dep))
        .map(|l| l + 1)
        .max()
        .unwrap_or(0);

      level.insert(idx, node_level);
      if waves.len() <= node_level {
        waves.resize_with(node_level + 1, Vec::new);
      }
      waves[node_level].push(idx);
    }

    Ok(
      waves
        .into_iter()
        .map(|mut wave| {
          wave.sort();
          wave.into_iter().map(|idx| self.graph[idx].clone()).collect()
        })
        .collect(),
    )
  }

  /// Direct dependencies of `key`, in declaration order.
  pub fn dependencies(&self, key: &K) -> Vec<K> {
    let Some(&idx) = self.nodes.get(key) else {
      return Vec::new();
    };

    let mut found: Vec<NodeIndex> = self.graph.neighbors_directed(idx, Direction::Incoming).collect();
    found.sort();
    found.dedup();
    found.into_iter().map(|i| self.graph[i].clone()).collect()
  }

  /// Every node `key` depends on, directly or transitively.
  pub fn transitive_dependencies(&self, key: &K) -> HashSet<K> {
    let mut seen = HashSet::new();
    let Some(&start) = self.nodes.get(key) else {
      return HashSet::new();
    };

    let mut stack = vec![start];
    while let Some(idx) = stack.pop() {
      for dep in self.graph.neighbors_directed(idx, Direction::Incoming) {
        if seen.insert(dep) {
          stack.push(dep);
        }
      }
    }

    seen.into_iter().map(|idx| self.graph[idx].clone()).collect()
  }

  /// Nodes that sit on a cycle, in declaration order.
  fn cycle_members(&self) -> Vec<K> {
    let mut members: Vec<NodeIndex> = tarjan_scc(&self.graph)
      .into_iter()
      .filter(|scc| scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0]))
      .flatten()
      .collect();
    members.sort();
    members.into_iter().map(|idx| self.graph[idx].clone()).collect()
  }
}
