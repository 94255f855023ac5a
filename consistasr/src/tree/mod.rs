use std::collections::HashSet;
use std::fmt::Display;

use anyhow::bail;
use log::{debug, info};

use crate::Result;

pub mod tree_node;
pub mod tree_parser;

pub use tree_node::Node;
use NodeIdx::{Internal as Int, Leaf};

#[derive(Debug, PartialEq, Clone, Copy, PartialOrd, Eq, Ord, Hash)]
pub enum NodeIdx {
    Internal(usize),
    Leaf(usize),
}

impl Display for NodeIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Int(idx) => write!(f, "Internal node {}", idx),
            Leaf(idx) => write!(f, "Leaf node {}", idx),
        }
    }
}

impl From<NodeIdx> for usize {
    fn from(node_idx: NodeIdx) -> usize {
        match node_idx {
            Int(idx) => idx,
            Leaf(idx) => idx,
        }
    }
}

impl From<&NodeIdx> for usize {
    fn from(node_idx: &NodeIdx) -> usize {
        usize::from(*node_idx)
    }
}

/// Rooted tree stored as an arena of nodes. Node indices are positions in `nodes`,
/// assigned in preorder by the parser. Internal nodes may have any number of children.
#[derive(Debug, Clone)]
pub struct Tree {
    pub root: NodeIdx,
    pub nodes: Vec<Node>,
    pub postorder: Vec<NodeIdx>,
    pub preorder: Vec<NodeIdx>,
    pub leaf_ids: Vec<String>,
}

impl Tree {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, idx: &NodeIdx) -> &Node {
        &self.nodes[usize::from(idx)]
    }

    pub fn children(&self, idx: &NodeIdx) -> &[NodeIdx] {
        &self.node(idx).children
    }

    pub fn is_root(&self, idx: &NodeIdx) -> bool {
        self.root == *idx
    }

    pub fn leaves(&self) -> Vec<&Node> {
        self.nodes.iter().filter(|n| n.is_leaf()).collect()
    }

    pub fn internals(&self) -> Vec<&Node> {
        self.nodes.iter().filter(|n| !n.is_leaf()).collect()
    }

    pub fn try_idx(&self, id: &str) -> Result<NodeIdx> {
        match self.nodes.iter().find(|n| n.id == id) {
            Some(node) => Ok(node.idx),
            None => bail!("No node with id {} found in the tree", id),
        }
    }

    pub(crate) fn compute_postorder(&mut self) {
        let mut order = Vec::<NodeIdx>::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(cur) = stack.pop() {
            order.push(cur);
            stack.extend(self.children(&cur).iter().copied());
        }
        order.reverse();
        self.postorder = order;
    }

    pub(crate) fn compute_preorder(&mut self) {
        self.preorder = self.preorder_subroot(&self.root);
    }

    pub fn preorder_subroot(&self, subroot_idx: &NodeIdx) -> Vec<NodeIdx> {
        let mut order = Vec::<NodeIdx>::with_capacity(self.nodes.len());
        let mut stack = vec![*subroot_idx];
        while let Some(cur) = stack.pop() {
            order.push(cur);
            stack.extend(self.children(&cur).iter().rev().copied());
        }
        order
    }

    /// Copies the subtree rooted at `subroot_idx` into a new tree with a fresh arena.
    pub fn subtree(&self, subroot_idx: &NodeIdx) -> Tree {
        let order = self.preorder_subroot(subroot_idx);
        let mut new_pos = vec![usize::MAX; self.nodes.len()];
        for (pos, idx) in order.iter().enumerate() {
            new_pos[usize::from(idx)] = pos;
        }
        let remap = |idx: &NodeIdx| match idx {
            Int(i) => Int(new_pos[*i]),
            Leaf(i) => Leaf(new_pos[*i]),
        };

        let mut nodes = Vec::with_capacity(order.len());
        let mut leaf_ids = Vec::new();
        for idx in order.iter() {
            let old = self.node(idx);
            let parent = if idx == subroot_idx {
                None
            } else {
                old.parent.as_ref().map(remap)
            };
            let node = match remap(idx) {
                Int(i) => Node::new_internal(
                    i,
                    parent,
                    old.children.iter().map(remap).collect(),
                    old.blen,
                    old.id.clone(),
                ),
                Leaf(i) => {
                    leaf_ids.push(old.id.clone());
                    Node::new_leaf(i, parent, old.blen, old.id.clone())
                }
            };
            nodes.push(node);
        }

        let mut tree = Tree {
            root: remap(subroot_idx),
            nodes,
            postorder: Vec::new(),
            preorder: Vec::new(),
            leaf_ids,
        };
        tree.compute_postorder();
        tree.compute_preorder();
        tree
    }

    /// Removes dummy roots with a single child, as written by RAxML (`(...)ROOT;`).
    /// Returns the labels of the removed nodes, outermost first.
    pub fn collapse_unary_root(&mut self) -> Vec<String> {
        let mut removed = Vec::new();
        let mut new_root = self.root;
        while self.children(&new_root).len() == 1 {
            removed.push(self.node(&new_root).id.clone());
            new_root = self.children(&new_root)[0];
        }
        if !removed.is_empty() {
            info!(
                "Collapsing {} single-child root node(s): {:?}",
                removed.len(),
                removed
            );
            *self = self.subtree(&new_root);
        }
        removed
    }

    /// Cuts internal node labels at the first `separator`, e.g. IQ-TREE's
    /// `Node6/100/100` becomes `Node6` with `'/'`. Returns the number of labels changed.
    pub fn strip_internal_label_annotations(&mut self, separator: char) -> usize {
        let mut changed = 0;
        for node in self.nodes.iter_mut().filter(|n| !n.is_leaf()) {
            if let Some(pos) = node.id.find(separator) {
                debug!("Stripping annotation from internal label {}", node.id);
                node.id.truncate(pos);
                changed += 1;
            }
        }
        changed
    }

    pub fn to_newick(&self) -> String {
        let mut newick = String::new();
        self.subtree_to_newick(&self.root, &mut newick);
        newick.push(';');
        newick
    }

    fn subtree_to_newick(&self, idx: &NodeIdx, out: &mut String) {
        let node = self.node(idx);
        if !node.children.is_empty() {
            out.push('(');
            for (i, child) in node.children.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                self.subtree_to_newick(child, out);
            }
            out.push(')');
        }
        out.push_str(&newick_label(&node.id));
        if let Some(blen) = node.blen {
            out.push_str(&format!(":{}", blen));
        }
    }
}

fn newick_label(id: &str) -> String {
    let needs_quotes = id
        .chars()
        .any(|c| matches!(c, '(' | ')' | ',' | ':' | ';' | '[' | ']' | '\'') || c.is_whitespace());
    if needs_quotes {
        format!("'{}'", id.replace('\'', "''"))
    } else {
        id.to_string()
    }
}

/// Checks that leaf names are unique and that labelled internal nodes do not share a label.
pub fn node_ids_are_unique(tree: &Tree) -> Result<()> {
    let mut leaf_ids = HashSet::with_capacity(tree.leaf_ids.len());
    for id in tree.leaf_ids.iter() {
        if !leaf_ids.insert(id.as_str()) {
            bail!("Duplicate leaf name {} in tree", id);
        }
    }
    let mut internal_ids = HashSet::new();
    for node in tree.internals().into_iter().filter(|n| n.has_label()) {
        if !internal_ids.insert(node.id.as_str()) {
            bail!("Duplicate internal node label {} in tree", node.id);
        }
    }
    Ok(())
}

#[cfg(test)]
#[cfg_attr(coverage, coverage(off))]
mod tests;
