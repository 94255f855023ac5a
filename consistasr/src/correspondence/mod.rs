use std::collections::{BTreeSet, HashMap};
use std::fmt::Display;

use hashbrown::HashMap as FastMap;
use log::{info, warn};

use crate::clades::{Clade, CladeIndex};
use crate::tree::Tree;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingStatus {
    Mapped,
    Unmapped,
}

impl Display for MappingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MappingStatus::Mapped => write!(f, "mapped"),
            MappingStatus::Unmapped => write!(f, "unmapped"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmappedReason {
    /// No labelled internal node of the other tree has the same clade.
    NoMatchingClade,
    /// The clade is held by this many labelled internal nodes across both trees, so no
    /// one-to-one match exists.
    AmbiguousClade(usize),
}

impl Display for UnmappedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnmappedReason::NoMatchingClade => write!(f, "no node with an identical clade"),
            UnmappedReason::AmbiguousClade(n) => {
                write!(f, "clade shared by {} nodes, no unique match", n)
            }
        }
    }
}

/// One row of the node correspondence. At least one of `node` and `peer` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeMapping {
    /// Identity in the primary (amino-acid reconstruction) namespace.
    pub node: Option<String>,
    /// Identity in the peer (binary indel reconstruction) namespace.
    pub peer: Option<String>,
    pub n_tips: usize,
    pub status: MappingStatus,
    pub reason: Option<UnmappedReason>,
    pub is_root: bool,
}

impl Display for NodeMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let side = match (&self.node, &self.peer) {
            (Some(node), Some(peer)) => format!("{} <-> {}", node, peer),
            (Some(node), None) => format!("{} (primary)", node),
            (None, Some(peer)) => format!("{} (peer)", peer),
            (None, None) => String::from("<unlabelled>"),
        };
        write!(f, "{}, {} tips, {}", side, self.n_tips, self.status)?;
        if let Some(reason) = self.reason {
            write!(f, ": {}", reason)?;
        }
        if self.is_root {
            write!(f, " (root, expected when the trees are rooted differently)")?;
        }
        Ok(())
    }
}

/// Partial bijection between labelled internal nodes of two trees, established by identical
/// clades, together with a report of every node that could not be matched.
#[derive(Debug, Clone, Default)]
pub struct NodeCorrespondence {
    entries: Vec<NodeMapping>,
    to_peer: HashMap<String, String>,
    from_peer: HashMap<String, String>,
    unlabelled: (usize, usize),
}

struct LabelledClades<'a> {
    nodes: Vec<(&'a str, &'a Clade, bool)>,
    counts: FastMap<&'a Clade, usize>,
    by_clade: FastMap<&'a Clade, &'a str>,
    unlabelled: usize,
}

impl<'a> LabelledClades<'a> {
    fn new(tree: &'a Tree, clades: &'a CladeIndex) -> Self {
        let mut nodes = Vec::new();
        let mut counts = FastMap::new();
        let mut by_clade = FastMap::new();
        let mut unlabelled = 0;
        for idx in tree.preorder.iter() {
            let node = tree.node(idx);
            let Some(clade) = clades.clade(idx) else {
                continue;
            };
            if !node.has_label() {
                unlabelled += 1;
                continue;
            }
            nodes.push((node.id.as_str(), clade, tree.is_root(idx)));
            *counts.entry(clade).or_insert(0) += 1;
            by_clade.insert(clade, node.id.as_str());
        }
        LabelledClades {
            nodes,
            counts,
            by_clade,
            unlabelled,
        }
    }

    fn count(&self, clade: &Clade) -> usize {
        self.counts.get(clade).copied().unwrap_or(0)
    }
}

impl NodeCorrespondence {
    /// Matches the labelled internal nodes of `tree` (primary namespace) against those of
    /// `peer_tree` by exact clade equality.
    ///
    /// A pair is mapped only if its clade occurs exactly once among the labelled internal nodes
    /// of each tree, so swapping the two trees yields the same pairs. Near matches (subsets or
    /// supersets) are never accepted. Every unmatched node of either tree is reported.
    ///
    /// # Example
    /// ```
    /// use consistasr::clades::{CladeIndex, LeafNameMap};
    /// use consistasr::correspondence::NodeCorrespondence;
    /// use consistasr::tree::tree_parser::from_newick;
    ///
    /// let a = from_newick("((T1,T2)I1,(T3,(T4,T5)I2)I3)I0;").unwrap().pop().unwrap();
    /// let b = from_newick("((T1,T2)11,(T3,(T4,T5)12)13)10;").unwrap().pop().unwrap();
    /// let a_clades = CladeIndex::new(&a, &LeafNameMap::verbatim(&a));
    /// let b_clades = CladeIndex::new(&b, &LeafNameMap::verbatim(&b));
    /// let map = NodeCorrespondence::resolve(&a, &a_clades, &b, &b_clades);
    /// assert_eq!(map.mapped_count(), 4);
    /// assert_eq!(map.peer_of("I1"), Some("11"));
    /// assert_eq!(map.node_of_peer("13"), Some("I3"));
    /// ```
    pub fn resolve(
        tree: &Tree,
        clades: &CladeIndex,
        peer_tree: &Tree,
        peer_clades: &CladeIndex,
    ) -> Self {
        let primary = LabelledClades::new(tree, clades);
        let peer = LabelledClades::new(peer_tree, peer_clades);
        info!(
            "Labelled internal nodes: {} in the primary tree, {} in the peer tree",
            primary.nodes.len(),
            peer.nodes.len()
        );
        for (side, count) in [("primary", primary.unlabelled), ("peer", peer.unlabelled)] {
            if count > 0 {
                warn!(
                    "{} unlabelled internal node(s) in the {} tree cannot be mapped",
                    count, side
                );
            }
        }

        let mut correspondence = NodeCorrespondence {
            unlabelled: (primary.unlabelled, peer.unlabelled),
            ..Default::default()
        };
        for &(id, clade, is_root) in primary.nodes.iter() {
            let own = primary.count(clade);
            let other = peer.count(clade);
            let entry = if own == 1 && other == 1 {
                let peer_id = peer.by_clade[clade];
                correspondence
                    .to_peer
                    .insert(id.to_string(), peer_id.to_string());
                correspondence
                    .from_peer
                    .insert(peer_id.to_string(), id.to_string());
                NodeMapping {
                    node: Some(id.to_string()),
                    peer: Some(peer_id.to_string()),
                    n_tips: clade.len(),
                    status: MappingStatus::Mapped,
                    reason: None,
                    is_root,
                }
            } else {
                NodeMapping {
                    node: Some(id.to_string()),
                    peer: None,
                    n_tips: clade.len(),
                    status: MappingStatus::Unmapped,
                    reason: Some(unmapped_reason(own, other)),
                    is_root,
                }
            };
            correspondence.entries.push(entry);
        }
        for &(peer_id, clade, is_root) in peer.nodes.iter() {
            if correspondence.from_peer.contains_key(peer_id) {
                continue;
            }
            correspondence.entries.push(NodeMapping {
                node: None,
                peer: Some(peer_id.to_string()),
                n_tips: clade.len(),
                status: MappingStatus::Unmapped,
                reason: Some(unmapped_reason(peer.count(clade), primary.count(clade))),
                is_root,
            });
        }
        correspondence.sort_entries();
        correspondence.log_report();
        correspondence
    }

    fn sort_entries(&mut self) {
        self.entries.sort_by(|a, b| match (&a.node, &b.node) {
            (Some(x), Some(y)) => natord::compare(x, y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => natord::compare(
                a.peer.as_deref().unwrap_or_default(),
                b.peer.as_deref().unwrap_or_default(),
            ),
        });
    }

    fn log_report(&self) {
        info!("Mapped internal nodes: {}", self.mapped_count());
        let unmapped: Vec<&NodeMapping> = self.unmapped().collect();
        if !unmapped.is_empty() {
            warn!(
                "{} internal node(s) could not be mapped (topology mismatch, polytomy or differing root):",
                unmapped.len()
            );
            for entry in unmapped {
                warn!("  {}", entry);
            }
        }
    }

    pub fn entries(&self) -> &[NodeMapping] {
        &self.entries
    }

    pub fn peer_of(&self, node: &str) -> Option<&str> {
        self.to_peer.get(node).map(String::as_str)
    }

    pub fn node_of_peer(&self, peer: &str) -> Option<&str> {
        self.from_peer.get(peer).map(String::as_str)
    }

    pub fn mapped_count(&self) -> usize {
        self.to_peer.len()
    }

    pub fn unmapped(&self) -> impl Iterator<Item = &NodeMapping> {
        self.entries
            .iter()
            .filter(|e| e.status == MappingStatus::Unmapped)
    }

    pub fn unmapped_count(&self) -> usize {
        self.unmapped().count()
    }

    /// Number of unlabelled internal nodes skipped in the primary and the peer tree.
    pub fn unlabelled(&self) -> (usize, usize) {
        self.unlabelled
    }

    /// Mapped pairs as (primary, peer) identities.
    pub fn mapped_pairs(&self) -> BTreeSet<(String, String)> {
        self.to_peer
            .iter()
            .map(|(node, peer)| (node.clone(), peer.clone()))
            .collect()
    }
}

fn unmapped_reason(own: usize, other: usize) -> UnmappedReason {
    if other == 0 {
        UnmappedReason::NoMatchingClade
    } else {
        UnmappedReason::AmbiguousClade(own + other)
    }
}

#[cfg(test)]
#[cfg_attr(coverage, coverage(off))]
mod tests;
