use std::collections::BTreeSet;
use std::fmt::Display;

use bio::io::fasta::Record;
use itertools::Itertools;
use log::{debug, info, warn};

use crate::alphabets::{is_gap, GAP};
use crate::indels::IndelProfiles;
use crate::states::AncestralStates;

/// Merges one reconstructed symbol with its indel presence bit.
///
/// An absent column is always a gap, and a present column keeps the reconstructed symbol.
/// Presence never turns a reconstructed gap into a residue.
///
/// # Example
/// ```
/// use consistasr::merge::merge_symbol;
///
/// assert_eq!(merge_symbol(b'A', true), b'A');
/// assert_eq!(merge_symbol(b'A', false), b'-');
/// assert_eq!(merge_symbol(b'-', true), b'-');
/// ```
pub fn merge_symbol(symbol: u8, present: bool) -> u8 {
    if present && !is_gap(symbol) {
        symbol
    } else {
        GAP
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusionReason {
    /// Indel row whose identity has no counterpart in the primary namespace.
    IndelProfileUnmapped,
    /// Reconstructed sequence without an indel row.
    IndelProfileMissing,
    /// Indel row without a reconstructed sequence.
    StateRecordMissing,
    LengthMismatch { state_len: usize, indel_len: usize },
}

impl Display for ExclusionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExclusionReason::IndelProfileUnmapped => {
                write!(f, "indel profile unmapped, excluded from output")
            }
            ExclusionReason::IndelProfileMissing => write!(f, "indel profile missing"),
            ExclusionReason::StateRecordMissing => write!(f, "ancestral state record missing"),
            ExclusionReason::LengthMismatch {
                state_len,
                indel_len,
            } => write!(
                f,
                "length mismatch, {} states vs {} indel bits",
                state_len, indel_len
            ),
        }
    }
}

/// A node identity left out of the merged output, with the cause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exclusion {
    pub node: String,
    pub reason: ExclusionReason,
}

impl Exclusion {
    pub fn new(node: &str, reason: ExclusionReason) -> Exclusion {
        Exclusion {
            node: node.to_string(),
            reason,
        }
    }
}

impl Display for Exclusion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.node, self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedSequence {
    pub id: String,
    pub seq: Vec<u8>,
}

impl MergedSequence {
    /// Full-length record, one symbol per alignment column.
    pub fn with_gap(&self) -> Record {
        Record::with_attrs(&self.id, None, &self.seq)
    }

    /// Record with every gap column removed.
    pub fn gap_stripped(&self) -> Record {
        let seq = self.seq.iter().copied().filter(|s| !is_gap(*s)).collect_vec();
        Record::with_attrs(&self.id, None, &seq)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    pub merged: Vec<MergedSequence>,
    pub excluded: Vec<Exclusion>,
    /// Identities present in at least one of the two inputs.
    pub attempted: BTreeSet<String>,
}

/// Merges reconstructed states with indel profiles that are already in the same namespace.
///
/// Only identities present in both inputs with equal lengths are merged. Everything else ends
/// up in `excluded`. Both lists are sorted by natural identity order.
pub fn merge(states: &AncestralStates, indels: &IndelProfiles) -> MergeReport {
    let mut report = MergeReport {
        attempted: states
            .node_ids()
            .chain(indels.node_ids())
            .cloned()
            .collect(),
        ..Default::default()
    };

    for node in report.attempted.iter() {
        let (symbols, bits) = match (states.get(node), indels.get(node)) {
            (Some(symbols), Some(bits)) => (symbols, bits),
            (Some(_), None) => {
                report
                    .excluded
                    .push(Exclusion::new(node, ExclusionReason::IndelProfileMissing));
                continue;
            }
            (None, Some(_)) => {
                report
                    .excluded
                    .push(Exclusion::new(node, ExclusionReason::StateRecordMissing));
                continue;
            }
            (None, None) => continue,
        };
        if symbols.len() != bits.len() {
            report.excluded.push(Exclusion::new(
                node,
                ExclusionReason::LengthMismatch {
                    state_len: symbols.len(),
                    indel_len: bits.len(),
                },
            ));
            continue;
        }
        let seq = symbols
            .iter()
            .zip_eq(bits.iter().by_vals())
            .map(|(symbol, present)| merge_symbol(*symbol, present))
            .collect_vec();
        debug!(
            "Merged node {}: {} of {} columns present",
            node,
            seq.iter().filter(|s| !is_gap(**s)).count(),
            seq.len()
        );
        report.merged.push(MergedSequence {
            id: node.clone(),
            seq,
        });
    }

    report.merged.sort_by(|a, b| natord::compare(&a.id, &b.id));
    report.excluded.sort_by(|a, b| natord::compare(&a.node, &b.node));
    info!(
        "Merged {} of {} node identities",
        report.merged.len(),
        report.attempted.len()
    );
    for exclusion in report.excluded.iter() {
        warn!("Excluded {}", exclusion);
    }
    report
}
