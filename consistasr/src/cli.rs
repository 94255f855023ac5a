use std::fmt::Display;
use std::path::PathBuf;

use anyhow::bail;
use clap::{Parser, ValueEnum};
use log::LevelFilter;

use consistasr::clades::LeafNameNormalisation;
use consistasr::reconcile::{Pipeline, ReconcileConfig, DEFAULT_MAX_EXCLUDED_FRACTION};

use crate::Result;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum PipelineArg {
    /// IQ-TREE treefile and .state table
    Iqtree,
    /// PAML .rst file with the labelled tree and node sequences
    Paml,
}

impl From<PipelineArg> for Pipeline {
    fn from(arg: PipelineArg) -> Self {
        match arg {
            PipelineArg::Iqtree => Pipeline::Iqtree,
            PipelineArg::Paml => Pipeline::Paml,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum LeafNamesArg {
    /// Compare leaf names as they are
    Verbatim,
    /// Drop leading `<digits>_` tokens until the name matches the indel tree
    NumericPrefix,
}

impl From<LeafNamesArg> for LeafNameNormalisation {
    fn from(arg: LeafNamesArg) -> Self {
        match arg {
            LeafNamesArg::Verbatim => LeafNameNormalisation::Verbatim,
            LeafNamesArg::NumericPrefix => LeafNameNormalisation::NumericPrefix,
        }
    }
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub(super) struct Cli {
    /// Tool that reconstructed the amino-acid states
    #[arg(long, value_enum, value_name = "PIPELINE")]
    pub(super) pipeline: PipelineArg,

    /// Labelled tree of the amino-acid reconstruction (IQ-TREE treefile or PAML .rst)
    #[arg(short, long, value_name = "TREE_FILE")]
    pub(super) tree_file: PathBuf,

    /// Amino-acid state table, defaults to the tree file for the paml pipeline
    #[arg(short, long, value_name = "STATE_FILE")]
    pub(super) state_file: Option<PathBuf>,

    /// Labelled tree of the binary indel reconstruction
    #[arg(short = 'r', long, value_name = "INDEL_TREE_FILE")]
    pub(super) indel_tree_file: PathBuf,

    /// Binary indel ancestral state table
    #[arg(short, long, value_name = "INDEL_STATE_FILE")]
    pub(super) indel_state_file: PathBuf,

    /// Aligned sequences in fasta format, used to check leaf names and alignment length
    #[arg(short, long, value_name = "ALIGNMENT_FILE")]
    pub(super) alignment: Option<PathBuf>,

    /// Leaf-name matching between the trees, defaults to numeric-prefix for paml
    /// and verbatim for iqtree
    #[arg(long, value_enum, value_name = "LEAF_NAMES")]
    pub(super) leaf_names: Option<LeafNamesArg>,

    /// Output directory
    #[arg(short, long, value_name = "OUT_DIR", default_value = ".")]
    pub(super) out_dir: PathBuf,

    /// Prefix of the output files, defaults to the pipeline name
    #[arg(short, long, value_name = "PREFIX")]
    pub(super) prefix: Option<String>,

    /// Fail if more than this fraction of nodes is excluded from the merge
    #[arg(long, value_name = "FRACTION", default_value_t = DEFAULT_MAX_EXCLUDED_FRACTION)]
    pub(super) max_excluded_fraction: f64,

    /// Also write the renamed indel table and the labelled tree
    #[arg(long)]
    pub(super) write_intermediates: bool,

    /// Replace existing output files
    #[arg(long)]
    pub(super) overwrite: bool,

    /// Write the run log to this file as well
    #[arg(long, value_name = "LOG_FILE")]
    pub(super) log_file: Option<PathBuf>,

    /// Debug level logging
    #[arg(short, long)]
    pub(super) verbose: bool,
}

pub(super) struct Config {
    pub(super) reconcile: ReconcileConfig,
    pub(super) log_file: Option<PathBuf>,
    pub(super) log_level: LevelFilter,
}

impl Display for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.reconcile)?;
        write!(f, "Log level: {}", self.log_level)
    }
}

pub(super) struct ConfigBuilder {
    cli: Cli,
}

impl From<Cli> for ConfigBuilder {
    fn from(cli: Cli) -> Self {
        ConfigBuilder { cli }
    }
}

impl ConfigBuilder {
    pub(super) fn setup(self) -> Result<Config> {
        let cli = self.cli;
        let pipeline = Pipeline::from(cli.pipeline);
        let states = match (cli.state_file, pipeline) {
            (Some(states), _) => states,
            (None, Pipeline::Paml) => cli.tree_file.clone(),
            (None, Pipeline::Iqtree) => {
                bail!("A state file (--state-file) is required for the iqtree pipeline")
            }
        };
        if !(0.0..=1.0).contains(&cli.max_excluded_fraction) {
            bail!(
                "Maximum excluded fraction must be between 0 and 1, got {}",
                cli.max_excluded_fraction
            );
        }
        let prefix = cli.prefix.unwrap_or_else(|| pipeline.to_string());
        let leaf_names = cli
            .leaf_names
            .map_or(pipeline.leaf_names(), LeafNameNormalisation::from);
        Ok(Config {
            reconcile: ReconcileConfig {
                pipeline,
                tree: cli.tree_file,
                states,
                peer_tree: cli.indel_tree_file,
                indels: cli.indel_state_file,
                alignment: cli.alignment,
                leaf_names,
                out_dir: cli.out_dir,
                prefix,
                max_excluded_fraction: cli.max_excluded_fraction,
                write_intermediates: cli.write_intermediates,
                overwrite: cli.overwrite,
            },
            log_file: cli.log_file,
            log_level: if cli.verbose {
                LevelFilter::Debug
            } else {
                LevelFilter::Info
            },
        })
    }
}
