use std::fmt;
use std::result::Result as stdResult;

use anyhow::bail;
use log::{info, warn};
use pest::{
    error::{Error as PestError, ErrorVariant},
    iterators::Pair,
    Parser,
};
use pest_derive::Parser;

use crate::tree::{
    node_ids_are_unique, Node,
    NodeIdx::{self, Internal as Int, Leaf},
    Tree,
};
use crate::Result;

#[derive(Parser)]
#[grammar = "./tree/newick.pest"]
pub struct NewickParser;

#[derive(Debug)]
pub struct ParsingError(pub(crate) Box<PestError<Rule>>);

impl fmt::Display for ParsingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Malformed newick string")?;
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ParsingError {}

/// Parses all trees in a newick string.
///
/// Internal nodes may carry labels (e.g. `Node12`, `240` or PAML's bare integers) and may have
/// any number of children. Branch lengths are optional and kept as given.
/// Leaf names must be non-empty and unique, and so must internal labels.
///
/// # Example
/// ```
/// use consistasr::tree::tree_parser::from_newick;
/// let trees = from_newick("((A:1.0,B:2.0)I1:1.0,(C,D,E)I2)I0;").unwrap();
/// assert_eq!(trees.len(), 1);
/// assert_eq!(trees[0].leaf_ids, vec!["A", "B", "C", "D", "E"]);
/// assert_eq!(trees[0].internals().len(), 3);
/// ```
pub fn from_newick(newick: &str) -> Result<Vec<Tree>> {
    info!("Parsing newick trees.");
    let newick_rule = match NewickParser::parse(Rule::newick, newick) {
        Ok(mut pairs) => match pairs.next() {
            Some(rule) => rule,
            None => bail!("Empty newick input"),
        },
        Err(e) => bail!(ParsingError(Box::new(e))),
    };
    let mut trees = Vec::new();
    for tree_rule in newick_rule.into_inner() {
        if tree_rule.as_rule() != Rule::tree {
            continue;
        }
        let mut tree = Tree::new_empty();
        if let Err(e) = tree.parse_tree_rule(tree_rule) {
            bail!(ParsingError(e));
        }
        node_ids_are_unique(&tree)?;
        trees.push(tree);
    }
    info!("Finished parsing {} newick tree(s) successfully.", trees.len());
    Ok(trees)
}

/// Parses the first tree of a newick string, warning if more trees follow.
pub fn first_from_newick(newick: &str) -> Result<Tree> {
    let mut trees = from_newick(newick)?;
    if trees.len() > 1 {
        warn!(
            "Found {} trees, only the first one will be used.",
            trees.len()
        );
    }
    if trees.is_empty() {
        bail!("No trees found in newick input");
    }
    Ok(trees.swap_remove(0))
}

impl Tree {
    fn new_empty() -> Self {
        Self {
            root: Int(0),
            nodes: Vec::new(),
            postorder: Vec::new(),
            preorder: Vec::new(),
            leaf_ids: Vec::new(),
        }
    }

    fn parse_tree_rule(&mut self, tree_rule: Pair<Rule>) -> stdResult<(), Box<PestError<Rule>>> {
        let mut node_idx = 0;
        for rule in tree_rule.into_inner() {
            match rule.as_rule() {
                Rule::leaf => {
                    self.root = Leaf(0);
                    self.parse_leaf_rule(&mut node_idx, None, rule)?;
                }
                Rule::internal => {
                    self.root = Int(0);
                    self.parse_internal_rule(&mut node_idx, None, rule)?;
                }
                _ => unreachable!(),
            }
        }
        self.complete();
        Ok(())
    }

    fn complete(&mut self) {
        self.compute_postorder();
        self.compute_preorder();
    }

    fn parse_internal_rule(
        &mut self,
        node_idx: &mut usize,
        parent: Option<NodeIdx>,
        internal_rule: Pair<Rule>,
    ) -> stdResult<(), Box<PestError<Rule>>> {
        let cur_idx = *node_idx;
        let mut node = Node::new_empty_internal(cur_idx);
        node.parent = parent;
        self.nodes.push(node);
        *node_idx += 1;
        for rule in internal_rule.into_inner() {
            match rule.as_rule() {
                Rule::label => self.nodes[cur_idx].id = Tree::parse_label_rule(rule),
                Rule::branch_length => {
                    self.nodes[cur_idx].blen = Tree::parse_branch_length_rule(rule)
                }
                Rule::internal => {
                    self.nodes[cur_idx].children.push(Int(*node_idx));
                    self.parse_internal_rule(node_idx, Some(Int(cur_idx)), rule)?;
                }
                Rule::leaf => {
                    self.nodes[cur_idx].children.push(Leaf(*node_idx));
                    self.parse_leaf_rule(node_idx, Some(Int(cur_idx)), rule)?;
                }
                _ => unreachable!(),
            }
        }
        Ok(())
    }

    fn parse_leaf_rule(
        &mut self,
        node_idx: &mut usize,
        parent: Option<NodeIdx>,
        leaf_rule: Pair<Rule>,
    ) -> stdResult<(), Box<PestError<Rule>>> {
        let span = leaf_rule.as_span();
        let mut id = String::new();
        let mut blen = None;
        for rule in leaf_rule.into_inner() {
            match rule.as_rule() {
                Rule::label => id = Tree::parse_label_rule(rule),
                Rule::branch_length => blen = Tree::parse_branch_length_rule(rule),
                _ => unreachable!(),
            }
        }
        if id.trim().is_empty() {
            return Err(Box::new(PestError::new_from_span(
                ErrorVariant::CustomError {
                    message: String::from("Empty leaf name"),
                },
                span,
            )));
        }
        self.nodes
            .push(Node::new_leaf(*node_idx, parent, blen, id.clone()));
        self.leaf_ids.push(id);
        *node_idx += 1;
        Ok(())
    }

    fn parse_branch_length_rule(rule: Pair<Rule>) -> Option<f64> {
        rule.into_inner()
            .next()
            .and_then(|float| float.as_str().trim().parse::<f64>().ok())
    }

    fn parse_label_rule(rule: Pair<Rule>) -> String {
        let label = rule.as_str();
        if label.len() >= 2 && label.starts_with('\'') && label.ends_with('\'') {
            label[1..label.len() - 1].replace("''", "'")
        } else {
            label.to_string()
        }
    }
}
