use std::collections::HashSet;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::bail;
use bio::io::fasta::Record;
use itertools::Itertools;
use log::{error, info, warn};

use crate::clades::{CladeIndex, LeafNameMap, LeafNameNormalisation};
use crate::correspondence::NodeCorrespondence;
use crate::indels::IndelProfiles;
use crate::io::{
    read_alignment, read_newick_from_file, read_rst_tree, write_indel_table,
    write_newick_to_file, write_node_map, write_sequences_to_file, DataError,
};
use crate::merge::{merge, Exclusion};
use crate::states::{StateTableFormat, StateTableReader};
use crate::tree::{node_ids_are_unique, Tree};
use crate::Result;

pub const DEFAULT_MAX_EXCLUDED_FRACTION: f64 = 0.5;

/// Reconstruction tool whose amino-acid states define the output namespace. The binary indel
/// reconstruction always comes from a RAxML-style ancestral tree and state table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    /// IQ-TREE `.treefile` with `Node<k>/support` labels and a `.state` posterior table.
    Iqtree,
    /// PAML `.rst` file holding both the labelled tree and the `node #k` sequence blocks.
    Paml,
}

impl Pipeline {
    pub fn state_format(&self) -> StateTableFormat {
        match self {
            Pipeline::Iqtree => StateTableFormat::PosteriorTable,
            Pipeline::Paml => StateTableFormat::RstBlocks,
        }
    }

    /// Leaf-name normalisation used unless the configuration overrides it.
    pub fn leaf_names(&self) -> LeafNameNormalisation {
        match self {
            Pipeline::Iqtree => LeafNameNormalisation::Verbatim,
            Pipeline::Paml => LeafNameNormalisation::NumericPrefix,
        }
    }

    /// Header of the primary identity column in the node map.
    pub fn node_column(&self) -> &'static str {
        match self {
            Pipeline::Iqtree => "iqtree_node",
            Pipeline::Paml => "paml_node",
        }
    }

    fn load_tree(&self, path: &Path) -> Result<Tree> {
        match self {
            Pipeline::Iqtree => {
                let mut tree = first_tree(read_newick_from_file(path)?, path)?;
                let stripped = tree.strip_internal_label_annotations('/');
                info!("Stripped support annotations from {} internal labels", stripped);
                node_ids_are_unique(&tree)?;
                Ok(tree)
            }
            Pipeline::Paml => read_rst_tree(path),
        }
    }
}

impl Display for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pipeline::Iqtree => write!(f, "iqtree"),
            Pipeline::Paml => write!(f, "paml"),
        }
    }
}

/// All inputs, outputs and thresholds of one reconciliation run.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    pub pipeline: Pipeline,
    /// Labelled tree of the amino-acid reconstruction (treefile or `.rst`).
    pub tree: PathBuf,
    /// Amino-acid state table (`.state` or `.rst`).
    pub states: PathBuf,
    /// Labelled tree of the binary indel reconstruction.
    pub peer_tree: PathBuf,
    /// Binary indel state table.
    pub indels: PathBuf,
    /// Aligned fasta used to check leaf names and the number of columns.
    pub alignment: Option<PathBuf>,
    /// How leaf names of the states tree are matched to those of the indel tree.
    pub leaf_names: LeafNameNormalisation,
    pub out_dir: PathBuf,
    pub prefix: String,
    pub max_excluded_fraction: f64,
    /// Also write the renamed indel table and the primary tree as newick.
    pub write_intermediates: bool,
    pub overwrite: bool,
}

impl Display for ReconcileConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Pipeline: {}", self.pipeline)?;
        writeln!(f, "Tree: {}", self.tree.display())?;
        writeln!(f, "States: {}", self.states.display())?;
        writeln!(f, "Indel tree: {}", self.peer_tree.display())?;
        writeln!(f, "Indel states: {}", self.indels.display())?;
        if let Some(alignment) = &self.alignment {
            writeln!(f, "Alignment: {}", alignment.display())?;
        }
        writeln!(f, "Leaf names: {}", self.leaf_names)?;
        writeln!(f, "Output: {}/{}_*", self.out_dir.display(), self.prefix)?;
        write!(
            f,
            "Max excluded fraction: {}, overwrite: {}",
            self.max_excluded_fraction, self.overwrite
        )
    }
}

/// Locations of the files written by a run.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPaths {
    pub with_gap: PathBuf,
    pub no_gap: PathBuf,
    pub node_map: PathBuf,
    pub renamed_indels: PathBuf,
    pub tree: PathBuf,
}

impl OutputPaths {
    pub fn new(config: &ReconcileConfig) -> OutputPaths {
        let path = |suffix: &str| config.out_dir.join(format!("{}_{}", config.prefix, suffix));
        OutputPaths {
            with_gap: path("indel_withgap.fasta"),
            no_gap: path("indel_nogap.fasta"),
            node_map: path("node_map.tsv"),
            renamed_indels: path("indel_renamed.txt"),
            tree: path(&format!("{}_tree.nwk", config.pipeline)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Internal nodes of the primary and the peer tree.
    pub nodes_loaded: (usize, usize),
    pub mapped: usize,
    pub unmapped: usize,
    /// State records and indel rows that were candidates for merging.
    pub attempted: usize,
    pub merged: usize,
    pub excluded: Vec<Exclusion>,
}

impl RunSummary {
    pub fn excluded_fraction(&self) -> f64 {
        if self.attempted == 0 {
            return 0.0;
        }
        self.excluded.len() as f64 / self.attempted as f64
    }

    fn log(&self) {
        for line in self.to_string().lines() {
            info!("{}", line);
        }
    }
}

impl Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Internal nodes loaded: {} (states tree), {} (indel tree)",
            self.nodes_loaded.0, self.nodes_loaded.1
        )?;
        writeln!(f, "Nodes mapped: {}, unmapped: {}", self.mapped, self.unmapped)?;
        writeln!(f, "Nodes attempted: {}, merged: {}", self.attempted, self.merged)?;
        write!(f, "Nodes excluded: {}", self.excluded.len())?;
        for exclusion in self.excluded.iter() {
            write!(f, "\n  {}", exclusion)?;
        }
        Ok(())
    }
}

/// Runs the whole reconciliation: loads both trees, maps nodes by clade, reads the state and
/// indel tables, merges them and writes the node map and both fasta files.
///
/// Every labelled internal node of the states tree must have a state record.
/// The node map is written before the coverage check, the fasta files only after it passes.
pub fn run(config: &ReconcileConfig) -> Result<RunSummary> {
    check_inputs(config)?;
    let outputs = OutputPaths::new(config);
    fs::create_dir_all(&config.out_dir)?;

    let tree = config.pipeline.load_tree(&config.tree)?;
    let mut peer_tree = first_tree(read_newick_from_file(&config.peer_tree)?, &config.peer_tree)?;
    peer_tree.collapse_unary_root();
    info!(
        "Loaded trees with {} and {} leaves",
        tree.leaf_ids.len(),
        peer_tree.leaf_ids.len()
    );

    let peer_names = LeafNameMap::verbatim(&peer_tree);
    let names = LeafNameMap::new(
        &tree,
        config.leaf_names,
        Some(&peer_names.normalised_names()),
    )?;
    check_leaf_sets(&names, &peer_names);
    let alignment_length = match &config.alignment {
        Some(path) => {
            let alignment = read_alignment(path)?;
            let ids: HashSet<String> = alignment.ids.into_iter().collect();
            check_against_alignment(&names, "states", &ids, path)?;
            check_against_alignment(&peer_names, "indel", &ids, path)?;
            Some(alignment.length)
        }
        None => None,
    };

    let clades = CladeIndex::new(&tree, &names);
    let peer_clades = CladeIndex::new(&peer_tree, &peer_names);
    let correspondence = NodeCorrespondence::resolve(&tree, &clades, &peer_tree, &peer_clades);
    write_node_map(
        &correspondence,
        (config.pipeline.node_column(), "raxml_node"),
        &outputs.node_map,
        config.overwrite,
    )?;
    if config.write_intermediates {
        write_newick_to_file(&tree, &outputs.tree, config.overwrite)?;
    }

    let labelled: HashSet<String> = tree
        .internals()
        .iter()
        .filter(|node| node.has_label())
        .map(|node| node.id.clone())
        .collect();
    let states = StateTableReader::new(config.pipeline.state_format())
        .nodes(Some(labelled))
        .alignment_length(alignment_length)
        .read(&config.states)?;
    let (indels, unmapped_indels) = IndelProfiles::read(&config.indels)?.rename(&correspondence);
    if config.write_intermediates {
        write_indel_table(&indels, &outputs.renamed_indels, config.overwrite)?;
    }

    let report = merge(&states, &indels);
    let summary = RunSummary {
        nodes_loaded: (tree.internals().len(), peer_tree.internals().len()),
        mapped: correspondence.mapped_count(),
        unmapped: correspondence.unmapped_count(),
        attempted: report.attempted.len() + unmapped_indels.len(),
        merged: report.merged.len(),
        excluded: unmapped_indels
            .into_iter()
            .chain(report.excluded)
            .sorted_by(|a, b| natord::compare(&a.node, &b.node))
            .collect(),
    };
    summary.log();

    if summary.excluded_fraction() > config.max_excluded_fraction {
        error!(
            "{} of {} nodes were excluded, above the allowed fraction of {}. \
             The inputs are likely not from the same alignment and taxon set.",
            summary.excluded.len(),
            summary.attempted,
            config.max_excluded_fraction
        );
        bail!(DataError {
            message: format!(
                "Excluded fraction {:.3} exceeds the maximum of {}, no fasta written",
                summary.excluded_fraction(),
                config.max_excluded_fraction
            )
        });
    }

    let with_gap: Vec<Record> = report.merged.iter().map(|m| m.with_gap()).collect();
    let no_gap: Vec<Record> = report.merged.iter().map(|m| m.gap_stripped()).collect();
    write_sequences_to_file(&with_gap, &outputs.with_gap, config.overwrite)?;
    write_sequences_to_file(&no_gap, &outputs.no_gap, config.overwrite)?;
    info!("Finished reconciliation successfully");
    Ok(summary)
}

fn check_inputs(config: &ReconcileConfig) -> Result<()> {
    let inputs = [
        Some(&config.tree),
        Some(&config.states),
        Some(&config.peer_tree),
        Some(&config.indels),
        config.alignment.as_ref(),
    ];
    let missing = inputs
        .into_iter()
        .flatten()
        .filter(|path| !path.is_file())
        .map(|path| path.display().to_string())
        .collect_vec();
    if !missing.is_empty() {
        bail!(DataError {
            message: format!("Input file(s) not found: {}", missing.join(", "))
        });
    }
    Ok(())
}

fn first_tree(mut trees: Vec<Tree>, path: &Path) -> Result<Tree> {
    if trees.len() > 1 {
        warn!(
            "Found {} trees in {}, only the first one will be used",
            trees.len(),
            path.display()
        );
    }
    if trees.is_empty() {
        bail!(DataError {
            message: format!("No trees found in {}", path.display())
        });
    }
    Ok(trees.swap_remove(0))
}

fn check_leaf_sets(names: &LeafNameMap, peer_names: &LeafNameMap) {
    let leaves = names.normalised_names();
    let peer_leaves = peer_names.normalised_names();
    let only = |a: &HashSet<String>, b: &HashSet<String>| {
        a.difference(b)
            .sorted_by(|x, y| natord::compare(x, y))
            .join(", ")
    };
    if leaves != peer_leaves {
        warn!(
            "Leaf sets differ. Only in the states tree: [{}], only in the indel tree: [{}]",
            only(&leaves, &peer_leaves),
            only(&peer_leaves, &leaves)
        );
    }
}

fn check_against_alignment(
    names: &LeafNameMap,
    side: &str,
    ids: &HashSet<String>,
    path: &Path,
) -> Result<()> {
    let unknown = names
        .normalised_names()
        .into_iter()
        .filter(|name| !ids.contains(name))
        .sorted_by(|a, b| natord::compare(a, b))
        .collect_vec();
    if !unknown.is_empty() {
        bail!(DataError {
            message: format!(
                "Leaves of the {} tree not found in alignment {}: {}",
                side,
                path.display(),
                unknown.join(", ")
            )
        });
    }
    Ok(())
}
