use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::bail;
use bitvec::prelude::*;
use itertools::Itertools;
use log::{info, warn};

use crate::correspondence::NodeCorrespondence;
use crate::io::DataError;
use crate::merge::{Exclusion, ExclusionReason};
use crate::Result;

/// Per-column presence (1) or absence (0) of a residue at each node, as reconstructed by a
/// binary-character ASR run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndelProfiles {
    profiles: BTreeMap<String, BitVec>,
}

impl IndelProfiles {
    pub fn get(&self, node: &str) -> Option<&BitSlice> {
        self.profiles.get(node).map(BitVec::as_bitslice)
    }

    pub fn contains(&self, node: &str) -> bool {
        self.profiles.contains_key(node)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &String> {
        self.profiles.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BitVec)> {
        self.profiles.iter()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn read(path: &Path) -> Result<IndelProfiles> {
        info!("Reading indel profiles from file {}", path.display());
        let content = fs::read_to_string(path)?;
        let profiles = Self::parse(&content, &path.display().to_string())?;
        info!("Loaded indel profiles for {} nodes", profiles.len());
        Ok(profiles)
    }

    /// Parses rows of `<node> <bits>`. Bits may be split over several whitespace separated
    /// fields, which are joined. `source` names the input in error messages.
    ///
    /// # Example
    /// ```
    /// use consistasr::indels::IndelProfiles;
    ///
    /// let profiles = IndelProfiles::parse("11 1011\n12 11 00\n", "example.txt").unwrap();
    /// assert_eq!(profiles.len(), 2);
    /// assert_eq!(profiles.get("12").unwrap().count_ones(), 2);
    /// ```
    pub fn parse(content: &str, source: &str) -> Result<IndelProfiles> {
        let mut profiles = BTreeMap::new();
        for (line_no, line) in content.lines().enumerate() {
            let line_no = line_no + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace();
            let Some(node) = fields.next() else {
                continue;
            };
            let mut bits = BitVec::new();
            for byte in fields.flat_map(str::bytes) {
                match byte {
                    b'0' => bits.push(false),
                    b'1' => bits.push(true),
                    _ => bail!(DataError {
                        message: format!(
                            "{}:{}: invalid indel state '{}' for node {}, expected 0 or 1",
                            source, line_no, byte as char, node
                        )
                    }),
                }
            }
            if bits.is_empty() {
                bail!(DataError {
                    message: format!("{}:{}: node {} has no indel states", source, line_no, node)
                });
            }
            if profiles.insert(node.to_string(), bits).is_some() {
                bail!(DataError {
                    message: format!(
                        "{}:{}: duplicate indel profile for node {}",
                        source, line_no, node
                    )
                });
            }
        }
        if profiles.is_empty() {
            bail!(DataError {
                message: format!("No indel profiles found in {}", source)
            });
        }
        Ok(IndelProfiles { profiles })
    }

    /// Rewrites the profile identities from the peer namespace into the primary one.
    /// Rows without a mapped counterpart are returned as exclusions under their peer identity.
    pub fn rename(&self, correspondence: &NodeCorrespondence) -> (IndelProfiles, Vec<Exclusion>) {
        let mut renamed = BTreeMap::new();
        let mut excluded = Vec::new();
        for (peer, bits) in self.profiles.iter() {
            match correspondence.node_of_peer(peer) {
                Some(node) => {
                    renamed.insert(node.to_string(), bits.clone());
                }
                None => excluded.push(Exclusion::new(peer, ExclusionReason::IndelProfileUnmapped)),
            }
        }
        excluded.sort_by(|a, b| natord::compare(&a.node, &b.node));
        info!(
            "Renamed {} of {} indel profiles into the primary namespace",
            renamed.len(),
            self.profiles.len()
        );
        if !excluded.is_empty() {
            warn!(
                "Indel profiles without a mapped node: {}",
                excluded.iter().map(|e| &e.node).join(", ")
            );
        }
        (IndelProfiles { profiles: renamed }, excluded)
    }

    /// Tab separated `<node>\t<bits>` rows in natural identity order.
    pub fn to_table(&self) -> String {
        self.profiles
            .iter()
            .sorted_by(|(a, _), (b, _)| natord::compare(a, b))
            .map(|(node, bits)| {
                let bits: String = bits.iter().map(|b| if *b { '1' } else { '0' }).collect();
                format!("{}\t{}\n", node, bits)
            })
            .collect()
    }
}

impl FromIterator<(String, BitVec)> for IndelProfiles {
    fn from_iter<I: IntoIterator<Item = (String, BitVec)>>(iter: I) -> Self {
        IndelProfiles {
            profiles: iter.into_iter().collect(),
        }
    }
}
