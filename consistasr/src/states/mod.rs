use std::collections::{BTreeMap, HashSet};
use std::fmt::Display;
use std::fs;
use std::path::Path;

use anyhow::bail;
use itertools::Itertools;
use log::{info, warn};

use crate::io::DataError;
use crate::Result;

mod posterior_table;
mod rst_blocks;

/// Shape of the amino-acid reconstruction output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateTableFormat {
    /// Flat per-site table as written by IQ-TREE (`.state`): `Node Site State p_A p_R ...`.
    PosteriorTable,
    /// Per-node sequence blocks (`node #12  MKV...`) as listed in a PAML `.rst` file.
    RstBlocks,
}

impl Display for StateTableFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateTableFormat::PosteriorTable => write!(f, "posterior table"),
            StateTableFormat::RstBlocks => write!(f, "rst node blocks"),
        }
    }
}

/// Reconstructed symbol per alignment column for every node, keyed by node identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AncestralStates {
    seqs: BTreeMap<String, Vec<u8>>,
}

impl AncestralStates {
    pub fn get(&self, node: &str) -> Option<&[u8]> {
        self.seqs.get(node).map(Vec::as_slice)
    }

    pub fn contains(&self, node: &str) -> bool {
        self.seqs.contains_key(node)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &String> {
        self.seqs.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<u8>)> {
        self.seqs.iter()
    }

    pub fn len(&self) -> usize {
        self.seqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty()
    }

    pub(crate) fn insert(&mut self, node: String, seq: Vec<u8>) {
        self.seqs.insert(node, seq);
    }
}

impl FromIterator<(String, Vec<u8>)> for AncestralStates {
    fn from_iter<I: IntoIterator<Item = (String, Vec<u8>)>>(iter: I) -> Self {
        AncestralStates {
            seqs: iter.into_iter().collect(),
        }
    }
}

/// Reads per-node ancestral amino-acid states in one of the supported [`StateTableFormat`]s.
pub struct StateTableReader {
    format: StateTableFormat,
    nodes: Option<HashSet<String>>,
    alignment_length: Option<usize>,
}

impl StateTableReader {
    /// Creates a reader that keeps every node and does not check sequence lengths.
    ///
    /// # Example
    /// ```
    /// use consistasr::states::{StateTableFormat, StateTableReader};
    ///
    /// let table = "Node\tSite\tState\tp_A\tp_C\nN1\t1\tA\t0.9\t0.1\nN1\t2\tC\t0.2\t0.8\n";
    /// let states = StateTableReader::new(StateTableFormat::PosteriorTable)
    ///     .alignment_length(Some(2))
    ///     .parse(table, "example.state")
    ///     .unwrap();
    /// assert_eq!(states.get("N1"), Some(&b"AC"[..]));
    /// ```
    pub fn new(format: StateTableFormat) -> StateTableReader {
        StateTableReader {
            format,
            nodes: None,
            alignment_length: None,
        }
    }

    /// Restricts reading to the given node identities. Rows of other nodes are ignored,
    /// and every requested node must be present.
    pub fn nodes(mut self, nodes: Option<HashSet<String>>) -> StateTableReader {
        self.nodes = nodes;
        self
    }

    /// Sets the expected number of alignment columns per node.
    pub fn alignment_length(mut self, length: Option<usize>) -> StateTableReader {
        self.alignment_length = length;
        self
    }

    pub fn read(&self, path: &Path) -> Result<AncestralStates> {
        info!(
            "Reading ancestral states ({}) from file {}",
            self.format,
            path.display()
        );
        let content = fs::read_to_string(path)?;
        let states = self.parse(&content, &path.display().to_string())?;
        info!("Loaded ancestral states for {} nodes", states.len());
        Ok(states)
    }

    /// Parses the text of a state table. `source` names the input in error messages.
    pub fn parse(&self, content: &str, source: &str) -> Result<AncestralStates> {
        let wanted = |node: &str| self.nodes.as_ref().map_or(true, |n| n.contains(node));
        let states = match self.format {
            StateTableFormat::PosteriorTable => posterior_table::parse(content, source, &wanted)?,
            StateTableFormat::RstBlocks => rst_blocks::parse(content, source, &wanted)?,
        };
        self.validate(&states, source)?;
        Ok(states)
    }

    fn validate(&self, states: &AncestralStates, source: &str) -> Result<()> {
        if let Some(nodes) = &self.nodes {
            let missing = nodes
                .iter()
                .filter(|node| !states.contains(node))
                .sorted_by(|a, b| natord::compare(a, b))
                .collect_vec();
            if !missing.is_empty() {
                bail!(DataError {
                    message: format!(
                        "Requested node(s) {} not found in {}",
                        missing.iter().join(", "),
                        source
                    )
                });
            }
        }
        if states.is_empty() {
            bail!(DataError {
                message: format!("No ancestral states found in {}", source)
            });
        }
        match self.alignment_length {
            Some(length) => {
                for (node, seq) in states.iter() {
                    if seq.len() != length {
                        bail!(DataError {
                            message: format!(
                                "Node {} in {} has {} sites, but the alignment has {} columns",
                                node,
                                source,
                                seq.len(),
                                length
                            )
                        });
                    }
                }
            }
            None => {
                let lengths = states
                    .iter()
                    .map(|(_, seq)| seq.len())
                    .unique()
                    .sorted()
                    .collect_vec();
                if lengths.len() > 1 {
                    warn!(
                        "Ancestral sequences in {} have differing lengths: {:?}",
                        source, lengths
                    );
                }
            }
        }
        Ok(())
    }
}
