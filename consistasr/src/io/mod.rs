use std::error::Error;
use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::bail;
use bio::io::fasta::{Reader, Record, Writer};
use log::info;

use crate::correspondence::NodeCorrespondence;
use crate::indels::IndelProfiles;
use crate::tree::{tree_parser, Tree};
use crate::Result;

/// Marker line after which PAML prints the tree with its internal node numbers.
const RST_TREE_MARKER: &str = "tree with node labels";

pub(crate) struct DataError {
    pub(crate) message: String,
}
impl fmt::Debug for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}
impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}
impl Error for DataError {}

/// Leaf names and column count of a multiple sequence alignment.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentInfo {
    pub ids: Vec<String>,
    pub length: usize,
}

/// Refuses to clobber an existing file unless `overwrite` is set.
pub fn check_output_path(path: &Path, overwrite: bool) -> Result<()> {
    if path.exists() && !overwrite {
        bail!(DataError {
            message: format!("File {} already exists", path.display())
        });
    }
    Ok(())
}

/// Reads newick trees from a file, returning a vector of trees.
///
/// # Example
/// ```
/// use consistasr::io::read_newick_from_file;
/// use std::path::PathBuf;
/// let trees = read_newick_from_file(&PathBuf::from("./data/iqtree_toy.treefile")).unwrap();
/// # assert_eq!(trees.len(), 1);
/// # assert_eq!(trees[0].leaves().len(), 5);
/// ```
pub fn read_newick_from_file(path: &Path) -> Result<Vec<Tree>> {
    info!("Reading newick trees from file {}", path.display());
    let newick = fs::read_to_string(path)?;
    tree_parser::from_newick(&newick)
}

/// Reads the node-labelled tree that PAML embeds in its `.rst` output.
pub fn read_rst_tree(path: &Path) -> Result<Tree> {
    info!("Reading the labelled tree from rst file {}", path.display());
    let content = fs::read_to_string(path)?;
    let newick = extract_rst_newick(&content, &path.display().to_string())?;
    tree_parser::first_from_newick(&newick)
}

/// Finds the line containing "tree with node labels" and joins the following non-empty
/// lines up to the first `;`.
pub fn extract_rst_newick(content: &str, source: &str) -> Result<String> {
    let mut lines = content.lines();
    if !lines
        .by_ref()
        .any(|line| line.to_lowercase().contains(RST_TREE_MARKER))
    {
        bail!(DataError {
            message: format!("'{}' section not found in {}", RST_TREE_MARKER, source)
        });
    }
    let mut newick = Vec::new();
    for line in lines.map(str::trim).filter(|line| !line.is_empty()) {
        match line.split_once(';') {
            Some((head, _)) => {
                newick.push(format!("{};", head));
                return Ok(newick.join(" "));
            }
            None => newick.push(line.to_string()),
        }
    }
    bail!(DataError {
        message: format!(
            "No newick string terminated by ';' after '{}' in {}",
            RST_TREE_MARKER, source
        )
    })
}

/// Writes a tree as one-line newick.
pub fn write_newick_to_file(tree: &Tree, path: &Path, overwrite: bool) -> Result<()> {
    info!("Writing newick tree to file {}", path.display());
    check_output_path(path, overwrite)?;
    let mut writer = File::create(path)?;
    writer.write_all(tree.to_newick().as_bytes())?;
    writer.write_all(b"\n")?;
    Ok(())
}

/// Reads the leaf names and the number of columns of an aligned fasta file.
/// All records must have the same length.
pub fn read_alignment(path: &Path) -> Result<AlignmentInfo> {
    info!("Reading alignment from file {}", path.display());
    let reader = Reader::from_file(path)?;
    let mut ids = Vec::new();
    let mut length = None;
    for result in reader.records() {
        let rec = result?;
        if let Err(e) = rec.check() {
            bail!(DataError {
                message: e.to_string()
            });
        }
        match length {
            None => length = Some(rec.seq().len()),
            Some(len) if len != rec.seq().len() => bail!(DataError {
                message: format!(
                    "Sequence {} has length {}, expected {} in aligned file {}",
                    rec.id(),
                    rec.seq().len(),
                    len,
                    path.display()
                )
            }),
            Some(_) => {}
        }
        ids.push(rec.id().to_string());
    }
    let Some(length) = length else {
        bail!(DataError {
            message: format!("No sequences found in file {}", path.display())
        });
    };
    info!("Read {} aligned sequences of length {}", ids.len(), length);
    Ok(AlignmentInfo { ids, length })
}

/// Writes fasta records to the given file path.
///
/// # Example
/// ```
/// # use std::fs;
/// use bio::io::fasta::Record;
/// use consistasr::io::write_sequences_to_file;
///
/// let dir = tempfile::tempdir().unwrap();
/// let path = dir.path().join("out.fasta");
/// let sequences = vec![Record::with_attrs("I1", None, b"MK-L")];
/// write_sequences_to_file(&sequences, &path, false).unwrap();
/// assert_eq!(fs::read_to_string(&path).unwrap(), ">I1\nMK-L\n");
/// assert!(write_sequences_to_file(&sequences, &path, false).is_err());
/// ```
pub fn write_sequences_to_file(sequences: &[Record], path: &Path, overwrite: bool) -> Result<()> {
    info!(
        "Writing {} sequences to file {}",
        sequences.len(),
        path.display()
    );
    check_output_path(path, overwrite)?;
    let mut writer = Writer::to_file(path)?;
    for rec in sequences {
        writer.write_record(rec)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the audit table of the node correspondence. `columns` names the primary and peer
/// identity columns, e.g. `("iqtree_node", "raxml_node")`.
pub fn write_node_map(
    correspondence: &NodeCorrespondence,
    columns: (&str, &str),
    path: &Path,
    overwrite: bool,
) -> Result<()> {
    info!("Writing node mapping table to file {}", path.display());
    check_output_path(path, overwrite)?;
    let mut writer = File::create(path)?;
    writeln!(writer, "{}\t{}\tn_tips\tstatus", columns.0, columns.1)?;
    for entry in correspondence.entries() {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}",
            entry.node.as_deref().unwrap_or_default(),
            entry.peer.as_deref().unwrap_or_default(),
            entry.n_tips,
            entry.status
        )?;
    }
    Ok(())
}

/// Writes indel profiles as a tab separated `<node>\t<bits>` table.
pub fn write_indel_table(profiles: &IndelProfiles, path: &Path, overwrite: bool) -> Result<()> {
    info!(
        "Writing {} renamed indel profiles to file {}",
        profiles.len(),
        path.display()
    );
    check_output_path(path, overwrite)?;
    fs::write(path, profiles.to_table())?;
    Ok(())
}
