use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::Display;

use anyhow::bail;
use log::{debug, warn};

use crate::tree::{NodeIdx, Tree};
use crate::Result;

/// Set of (normalised) leaf names below an internal node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Clade(BTreeSet<String>);

impl Clade {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, leaf: &str) -> bool {
        self.0.contains(leaf)
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    fn extend(&mut self, other: &Clade) {
        self.0.extend(other.0.iter().cloned());
    }
}

impl FromIterator<String> for Clade {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Clade(iter.into_iter().collect())
    }
}

/// How leaf names of one tree are brought into the naming convention of the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafNameNormalisation {
    /// Leaf names are compared as they are.
    Verbatim,
    /// Leading `<digits>_` tokens are dropped until the name is known to the reference set,
    /// e.g. PAML's `112_OG_WP_010903286` becomes `OG_WP_010903286`.
    NumericPrefix,
}

impl Display for LeafNameNormalisation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LeafNameNormalisation::Verbatim => write!(f, "verbatim"),
            LeafNameNormalisation::NumericPrefix => write!(f, "numeric prefix stripping"),
        }
    }
}

/// A leaf whose normalised name could not be pinned down by the reference leaf set.
#[derive(Debug, Clone, PartialEq)]
pub struct FlaggedLeaf {
    pub raw: String,
    pub normalised: String,
    /// Number of candidate tails found in the reference set (0 or more than 1).
    pub matches: usize,
}

impl Display for FlaggedLeaf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.matches == 0 {
            write!(
                f,
                "leaf {} normalised to {} without a match in the reference leaf set",
                self.raw, self.normalised
            )
        } else {
            write!(
                f,
                "leaf {} normalised to {} but {} candidate names match the reference leaf set",
                self.raw, self.normalised, self.matches
            )
        }
    }
}

/// Total mapping from raw leaf names of one tree to normalised names.
#[derive(Debug, Clone, Default)]
pub struct LeafNameMap {
    names: HashMap<String, String>,
    pub flagged: Vec<FlaggedLeaf>,
}

impl LeafNameMap {
    /// Leaves every leaf name untouched.
    pub fn verbatim(tree: &Tree) -> Self {
        LeafNameMap {
            names: tree
                .leaf_ids
                .iter()
                .map(|id| (id.clone(), id.clone()))
                .collect(),
            flagged: Vec::new(),
        }
    }

    /// Builds the normalised names for all leaves of `tree`.
    ///
    /// With [`LeafNameNormalisation::NumericPrefix`] the candidate tails of a name are the name
    /// itself followed by the names obtained by dropping one leading `<digits>_` token at a time.
    /// The first candidate found in `reference` wins. Without a match the fully stripped tail is
    /// used. Both the no-match and the multiple-match case are flagged.
    /// Fails if two leaves end up with the same normalised name.
    ///
    /// # Example
    /// ```
    /// use std::collections::HashSet;
    /// use consistasr::clades::{LeafNameMap, LeafNameNormalisation};
    /// use consistasr::tree::tree_parser::from_newick;
    ///
    /// let tree = from_newick("((1_OG_A,2_B)5,3_C)4;").unwrap().pop().unwrap();
    /// let reference: HashSet<String> = ["OG_A", "B", "C"].iter().map(|s| s.to_string()).collect();
    /// let names = LeafNameMap::new(&tree, LeafNameNormalisation::NumericPrefix, Some(&reference))
    ///     .unwrap();
    /// assert_eq!(names.get("1_OG_A"), "OG_A");
    /// assert_eq!(names.get("3_C"), "C");
    /// assert!(names.flagged.is_empty());
    /// ```
    pub fn new(
        tree: &Tree,
        normalisation: LeafNameNormalisation,
        reference: Option<&HashSet<String>>,
    ) -> Result<Self> {
        let mut map = match normalisation {
            LeafNameNormalisation::Verbatim => LeafNameMap::verbatim(tree),
            LeafNameNormalisation::NumericPrefix => {
                let mut map = LeafNameMap::default();
                for id in tree.leaf_ids.iter() {
                    let (normalised, flag) = strip_numeric_prefix(id, reference);
                    if let Some(flag) = flag {
                        warn!("Ambiguous leaf name normalisation: {}", flag);
                        map.flagged.push(flag);
                    }
                    debug!("Leaf {} normalised to {}", id, normalised);
                    map.names.insert(id.clone(), normalised);
                }
                map
            }
        };
        map.check_injective(tree)?;
        map.flagged.sort_by(|a, b| natord::compare(&a.raw, &b.raw));
        Ok(map)
    }

    /// Normalised name of a raw leaf name, the raw name itself if it is unknown.
    pub fn get<'a>(&'a self, raw: &'a str) -> &'a str {
        self.names.get(raw).map(String::as_str).unwrap_or(raw)
    }

    pub fn normalised_names(&self) -> HashSet<String> {
        self.names.values().cloned().collect()
    }

    fn check_injective(&self, tree: &Tree) -> Result<()> {
        let mut seen: HashMap<&str, &str> = HashMap::with_capacity(self.names.len());
        for raw in tree.leaf_ids.iter() {
            let normalised = self.get(raw);
            if let Some(other) = seen.insert(normalised, raw.as_str()) {
                bail!(
                    "Leaf names {} and {} both normalise to {}",
                    other,
                    raw,
                    normalised
                );
            }
        }
        Ok(())
    }
}

/// Candidate names obtained by repeatedly dropping a leading `<digits>_` token.
/// The first candidate is always the name itself.
pub(crate) fn numeric_prefix_tails(name: &str) -> Vec<&str> {
    let mut tails = vec![name];
    let mut rest = name;
    while let Some((head, tail)) = rest.split_once('_') {
        if head.is_empty() || tail.is_empty() || !head.bytes().all(|b| b.is_ascii_digit()) {
            break;
        }
        tails.push(tail);
        rest = tail;
    }
    tails
}

fn strip_numeric_prefix(
    name: &str,
    reference: Option<&HashSet<String>>,
) -> (String, Option<FlaggedLeaf>) {
    let tails = numeric_prefix_tails(name);
    // Last element always exists, the name itself is the first tail.
    let fully_stripped = tails[tails.len() - 1];
    let Some(reference) = reference else {
        return (fully_stripped.to_string(), None);
    };
    let matches: Vec<&str> = tails
        .iter()
        .copied()
        .filter(|tail| reference.contains(*tail))
        .collect();
    match matches.as_slice() {
        [single] => (single.to_string(), None),
        [] => (
            fully_stripped.to_string(),
            Some(FlaggedLeaf {
                raw: name.to_string(),
                normalised: fully_stripped.to_string(),
                matches: 0,
            }),
        ),
        [first, ..] => (
            first.to_string(),
            Some(FlaggedLeaf {
                raw: name.to_string(),
                normalised: first.to_string(),
                matches: matches.len(),
            }),
        ),
    }
}

/// Clades of all internal nodes of a tree, in terms of normalised leaf names.
#[derive(Debug, Clone)]
pub struct CladeIndex {
    clades: HashMap<NodeIdx, Clade>,
}

impl CladeIndex {
    /// Computes the clade of every internal node in one postorder pass.
    ///
    /// # Example
    /// ```
    /// use consistasr::clades::{CladeIndex, LeafNameMap};
    /// use consistasr::tree::tree_parser::from_newick;
    ///
    /// let tree = from_newick("((T1,T2)I1,(T3,(T4,T5)I2)I3)I0;").unwrap().pop().unwrap();
    /// let index = CladeIndex::new(&tree, &LeafNameMap::verbatim(&tree));
    /// let i3 = tree.try_idx("I3").unwrap();
    /// assert_eq!(index.clade(&i3).unwrap().len(), 3);
    /// assert_eq!(index.len(), 4);
    /// ```
    pub fn new(tree: &Tree, names: &LeafNameMap) -> Self {
        let mut below: Vec<Clade> = vec![Clade::default(); tree.len()];
        for idx in tree.postorder.iter() {
            let node = tree.node(idx);
            let mut clade = Clade::default();
            if node.is_leaf() {
                clade.0.insert(names.get(&node.id).to_string());
            } else {
                for child in node.children.iter() {
                    clade.extend(&below[usize::from(child)]);
                }
            }
            below[usize::from(idx)] = clade;
        }
        let clades = tree
            .internals()
            .into_iter()
            .map(|node| (node.idx, std::mem::take(&mut below[usize::from(node.idx)])))
            .collect();
        CladeIndex { clades }
    }

    pub fn clade(&self, idx: &NodeIdx) -> Option<&Clade> {
        self.clades.get(idx)
    }

    pub fn len(&self) -> usize {
        self.clades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clades.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeIdx, &Clade)> {
        self.clades.iter()
    }
}

#[cfg(test)]
#[cfg_attr(coverage, coverage(off))]
mod tests;
