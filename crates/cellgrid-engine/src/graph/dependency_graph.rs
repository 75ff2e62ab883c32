//! Producer → consumer dependency graph over cell keys.
//!
//! An edge `a → b` means "b's value depends on a, so invalidating a
//! schedules b". Both adjacency directions are maintained for O(1)
//! neighborhood queries. The graph itself is policy-free: it will happily
//! store a cycle; the engine's set-formula path is what keeps the live
//! graph acyclic.

use std::collections::BTreeSet;

use ahash::{AHashMap, AHashSet};
use cellgrid_model::CellKey;

#[derive(Debug, Default)]
pub struct DepGraph {
    /// producer → consumers.
    outgoing: AHashMap<CellKey, AHashSet<CellKey>>,
    /// consumer → producers.
    incoming: AHashMap<CellKey, AHashSet<CellKey>>,
}

impl DepGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_edge(&mut self, from: CellKey, to: CellKey) {
        self.outgoing.entry(from).or_default().insert(to);
        self.incoming.entry(to).or_default().insert(from);
    }

    pub fn remove_edge(&mut self, from: CellKey, to: CellKey) {
        if let Some(set) = self.outgoing.get_mut(&from) {
            set.remove(&to);
            if set.is_empty() {
                self.outgoing.remove(&from);
            }
        }
        if let Some(set) = self.incoming.get_mut(&to) {
            set.remove(&from);
            if set.is_empty() {
                self.incoming.remove(&to);
            }
        }
    }

    /// Atomically replace every edge `* → node` with edges from
    /// `producers`. Duplicates in `producers` collapse; no intermediate
    /// state is observable.
    pub fn replace_all_inbound(&mut self, node: CellKey, producers: &[CellKey]) {
        if let Some(old) = self.incoming.remove(&node) {
            for producer in old {
                if let Some(set) = self.outgoing.get_mut(&producer) {
                    set.remove(&node);
                    if set.is_empty() {
                        self.outgoing.remove(&producer);
                    }
                }
            }
        }

        if producers.is_empty() {
            return;
        }

        let mut new_set = AHashSet::with_capacity(producers.len());
        for &producer in producers {
            if new_set.insert(producer) {
                self.outgoing.entry(producer).or_default().insert(node);
            }
        }
        self.incoming.insert(node, new_set);
    }

    /// Retract every edge touching `node`, in both directions.
    pub fn remove_all(&mut self, node: CellKey) {
        self.replace_all_inbound(node, &[]);
        if let Some(consumers) = self.outgoing.remove(&node) {
            for consumer in consumers {
                if let Some(set) = self.incoming.get_mut(&consumer) {
                    set.remove(&node);
                    if set.is_empty() {
                        self.incoming.remove(&consumer);
                    }
                }
            }
        }
    }

    /// Forward transitive closure over consumer edges, including the
    /// input keys themselves. This is the invalidation frontier of a
    /// change to `changed`.
    pub fn affected_from(&self, changed: impl IntoIterator<Item = CellKey>) -> AHashSet<CellKey> {
        let mut seen: AHashSet<CellKey> = AHashSet::new();
        let mut queue: Vec<CellKey> = Vec::new();

        for key in changed {
            if seen.insert(key) {
                queue.push(key);
            }
        }

        while let Some(cur) = queue.pop() {
            if let Some(consumers) = self.outgoing.get(&cur) {
                for &consumer in consumers {
                    if seen.insert(consumer) {
                        queue.push(consumer);
                    }
                }
            }
        }

        seen
    }

    /// True iff adding the edge `from → to` would close a loop, i.e. a
    /// path `to ⇒* from` already exists (a self-edge always would).
    pub fn would_create_cycle(&self, from: CellKey, to: CellKey) -> bool {
        if from == to {
            return true;
        }

        let mut seen: AHashSet<CellKey> = AHashSet::new();
        let mut queue: Vec<CellKey> = vec![to];
        seen.insert(to);

        while let Some(cur) = queue.pop() {
            if let Some(consumers) = self.outgoing.get(&cur) {
                for &consumer in consumers {
                    if consumer == from {
                        return true;
                    }
                    if seen.insert(consumer) {
                        queue.push(consumer);
                    }
                }
            }
        }

        false
    }

    /// Direct producers of `node`, sorted for determinism.
    pub fn dependencies_of(&self, node: CellKey) -> Vec<CellKey> {
        let mut out: Vec<CellKey> = self
            .incoming
            .get(&node)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        out.sort();
        out
    }

    /// Direct consumers of `node`, sorted for determinism.
    pub fn dependents_of(&self, node: CellKey) -> Vec<CellKey> {
        let mut out: Vec<CellKey> = self
            .outgoing
            .get(&node)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        out.sort();
        out
    }

    /// Every key that currently appears as an edge endpoint.
    pub fn keys(&self) -> AHashSet<CellKey> {
        let mut keys: AHashSet<CellKey> = AHashSet::new();
        keys.extend(self.outgoing.keys().copied());
        keys.extend(self.incoming.keys().copied());
        keys
    }

    /// Total directed edge count (for tests and stats).
    pub fn edge_count(&self) -> usize {
        self.outgoing.values().map(|set| set.len()).sum()
    }

    /// Topological order of `subset` under Kahn's algorithm, treating
    /// edges that escape the subset as absent. Returns the ordered keys
    /// plus the members of any cycle. Nodes merely downstream of a cycle
    /// are still ordered (after the cycle is cut), so their evaluation
    /// can propagate the `#CYCLE!` sentinels written to cycle members;
    /// no ordering guarantee is made among members of a cycle.
    pub fn topo_order(&self, subset: &AHashSet<CellKey>) -> (Vec<CellKey>, Vec<CellKey>) {
        let (mut order, leftover) = self.kahn(subset, |key| subset.contains(key));
        if leftover.is_empty() {
            return (order, Vec::new());
        }

        // Every cycle in the subset lies inside the leftover set; a
        // leftover node is a cycle member iff it can reach itself there.
        let leftover_set: AHashSet<CellKey> = leftover.iter().copied().collect();
        let mut cycle_members: Vec<CellKey> = leftover
            .iter()
            .copied()
            .filter(|&key| self.reaches_itself(key, &leftover_set))
            .collect();
        cycle_members.sort();

        // Order the rest with the cycle cut out of the graph.
        let cycle_set: AHashSet<CellKey> = cycle_members.iter().copied().collect();
        let remaining: AHashSet<CellKey> = leftover_set
            .difference(&cycle_set)
            .copied()
            .collect();
        let (tail, _) = self.kahn(&remaining, |key| remaining.contains(key));
        order.extend(tail);

        (order, cycle_members)
    }

    fn kahn(
        &self,
        subset: &AHashSet<CellKey>,
        in_scope: impl Fn(&CellKey) -> bool,
    ) -> (Vec<CellKey>, Vec<CellKey>) {
        let mut in_degree: AHashMap<CellKey, usize> = AHashMap::with_capacity(subset.len());
        for &key in subset {
            let deg = self
                .incoming
                .get(&key)
                .map(|producers| producers.iter().filter(|&p| in_scope(p)).count())
                .unwrap_or(0);
            in_degree.insert(key, deg);
        }

        let mut ready: BTreeSet<CellKey> = in_degree
            .iter()
            .filter_map(|(&key, &deg)| (deg == 0).then_some(key))
            .collect();

        let mut order = Vec::with_capacity(subset.len());
        let mut done: AHashSet<CellKey> = AHashSet::with_capacity(subset.len());
        while let Some(key) = ready.pop_first() {
            order.push(key);
            done.insert(key);
            if let Some(consumers) = self.outgoing.get(&key) {
                for consumer in consumers {
                    if let Some(deg) = in_degree.get_mut(consumer) {
                        *deg = deg.saturating_sub(1);
                        if *deg == 0 {
                            ready.insert(*consumer);
                        }
                    }
                }
            }
        }

        let leftover: Vec<CellKey> = subset
            .iter()
            .copied()
            .filter(|key| !done.contains(key))
            .collect();
        (order, leftover)
    }

    fn reaches_itself(&self, start: CellKey, scope: &AHashSet<CellKey>) -> bool {
        let mut seen: AHashSet<CellKey> = AHashSet::new();
        let mut queue: Vec<CellKey> = vec![start];
        while let Some(cur) = queue.pop() {
            if let Some(consumers) = self.outgoing.get(&cur) {
                for &consumer in consumers {
                    if consumer == start {
                        return true;
                    }
                    if scope.contains(&consumer) && seen.insert(consumer) {
                        queue.push(consumer);
                    }
                }
            }
        }
        false
    }
}
