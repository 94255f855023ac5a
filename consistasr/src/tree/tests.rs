use rstest::*;

use crate::tree;
use crate::tree::{
    tree_parser::{first_from_newick, from_newick, ParsingError},
    Node,
    NodeIdx::{Internal as I, Leaf as L},
    Tree,
};

fn check_parsing_error(error: anyhow::Error) {
    assert!(error.downcast_ref::<ParsingError>().is_some());
    assert!(error.to_string().contains("Malformed newick string"));
}

#[test]
fn newick_single_correct() {
    let trees = from_newick("(((A:1.0,B:1.0)E:2.0,C:1.0)F:1.0,D:1.0)G:2.0;").unwrap();
    assert_eq!(trees.len(), 1);
    assert_eq!(trees[0].root, I(0));
    let nodes = vec![
        Node::new_internal(0, None, vec![I(1), L(6)], Some(2.0), "G".to_string()),
        Node::new_internal(1, Some(I(0)), vec![I(2), L(5)], Some(1.0), "F".to_string()),
        Node::new_internal(2, Some(I(1)), vec![L(3), L(4)], Some(2.0), "E".to_string()),
        Node::new_leaf(3, Some(I(2)), Some(1.0), "A".to_string()),
        Node::new_leaf(4, Some(I(2)), Some(1.0), "B".to_string()),
        Node::new_leaf(5, Some(I(1)), Some(1.0), "C".to_string()),
        Node::new_leaf(6, Some(I(0)), Some(1.0), "D".to_string()),
    ];
    assert_eq!(trees[0].nodes, nodes);
    assert_eq!(trees[0].leaf_ids, vec!["A", "B", "C", "D"]);
    assert_eq!(trees[0].postorder.len(), 7);
    assert_eq!(trees[0].preorder.len(), 7);
}

#[test]
fn newick_without_branch_lengths() {
    let tree = tree!("((T1,T2)I1,(T3,(T4,T5)I2)I3)I0;");
    assert_eq!(tree.len(), 9);
    assert_eq!(tree.leaves().len(), 5);
    assert_eq!(tree.internals().len(), 4);
    assert!(tree.nodes.iter().all(|n| n.blen.is_none()));
    assert_eq!(tree.try_idx("I3").unwrap(), I(4));
    assert!(tree.try_idx("I9").is_err());
}

#[test]
fn newick_multifurcations() {
    let tree = tree!("(A,B,(C,D,E)X,F)R;");
    assert_eq!(tree.children(&tree.root).len(), 4);
    let x = tree.try_idx("X").unwrap();
    assert_eq!(tree.children(&x).len(), 3);
    assert_eq!(tree.leaves().len(), 6);
}

#[test]
fn newick_paml_style_whitespace() {
    let tree = tree!("((1_A, 2_B) 7 , (3_C, 4_D) 8 ) 6 ;");
    assert_eq!(tree.leaf_ids, vec!["1_A", "2_B", "3_C", "4_D"]);
    assert_eq!(tree.node(&tree.root).id, "6");
    assert!(tree.try_idx("7").is_ok());
    assert!(tree.try_idx("8").is_ok());
}

#[test]
fn newick_quoted_labels_and_comments() {
    let tree = tree!("(('a b':1,'it''s':2)[&support=100]'x y',C);");
    assert_eq!(tree.leaf_ids, vec!["a b", "it's", "C"]);
    assert!(tree.try_idx("x y").is_ok());
}

#[test]
fn newick_scientific_floats() {
    let tree = tree!("((A:1e-3,B:2.5E+2):.5,C:-0.1);");
    let blens: Vec<Option<f64>> = tree.nodes.iter().map(|n| n.blen).collect();
    assert_eq!(blens, vec![None, Some(0.5), Some(1e-3), Some(250.0), Some(-0.1)]);
}

#[test]
fn newick_tiny_correct() {
    let tree = tree!("A:1.0;");
    assert_eq!(tree.root, L(0));
    assert_eq!(tree.len(), 1);
    assert_eq!(tree.preorder, vec![L(0)]);
}

#[test]
fn newick_multiple_trees() {
    let trees = from_newick("(A,B)C;\n(D,E)F;").unwrap();
    assert_eq!(trees.len(), 2);
    let tree = first_from_newick("(A,B)C;\n(D,E)F;").unwrap();
    assert_eq!(tree.leaf_ids, vec!["A", "B"]);
}

#[rstest]
#[case::only_semicolon(";")]
#[case::unbalanced_open("((A:1.0,B:1.0);")]
#[case::unbalanced_close("(A,B));")]
#[case::empty_leaves("(:1.0,:2.0)E:5.1;")]
#[case::empty_leaf_in_list("(,A)B;")]
#[case::missing_semicolon("(A,B)C")]
#[case::empty_quoted_leaf("('',A)B;")]
fn newick_garbage(#[case] newick: &str) {
    check_parsing_error(from_newick(newick).unwrap_err());
}

#[rstest]
#[case::leaves("((A,B)C,A)D;", "Duplicate leaf name A")]
#[case::internals("((A,B)C,(D,E)C)F;", "Duplicate internal node label C")]
fn newick_duplicate_ids(#[case] newick: &str, #[case] message: &str) {
    let err = from_newick(newick).unwrap_err();
    assert!(err.to_string().contains(message));
}

#[test]
fn postorder_visits_children_first() {
    let tree = tree!("((A,B)E,(C,D)F)G;");
    assert_eq!(
        tree.postorder,
        vec![L(2), L(3), I(1), L(5), L(6), I(4), I(0)]
    );
    assert_eq!(
        tree.preorder,
        vec![I(0), I(1), L(2), L(3), I(4), L(5), L(6)]
    );
}

#[test]
fn subroot_preorder() {
    let tree = tree!("((A,B)E,(C,(D,H)J)F)G;");
    let f = tree.try_idx("F").unwrap();
    let ids: Vec<&str> = tree
        .preorder_subroot(&f)
        .iter()
        .map(|idx| tree.node(idx).id.as_str())
        .collect();
    assert_eq!(ids, vec!["F", "C", "J", "D", "H"]);
    assert_eq!(tree.preorder_subroot(&tree.root), tree.preorder);
}

#[test]
fn subtree_has_fresh_arena() {
    let tree = tree!("((A:1,B:2)E:3,(C:1,D:1)F:2)G;");
    let sub = tree.subtree(&tree.try_idx("F").unwrap());
    assert_eq!(sub.root, I(0));
    assert_eq!(sub.len(), 3);
    assert_eq!(sub.node(&sub.root).parent, None);
    assert_eq!(sub.leaf_ids, vec!["C", "D"]);
    assert_eq!(sub.node(&L(1)).parent, Some(I(0)));
    assert_eq!(sub.to_newick(), "(C:1,D:1)F:2;");
}

#[test]
fn collapse_raxml_dummy_root() {
    let mut tree = tree!("(((A,B)12,(C,D)13)11)ROOT;");
    let removed = tree.collapse_unary_root();
    assert_eq!(removed, vec!["ROOT"]);
    assert_eq!(tree.node(&tree.root).id, "11");
    assert_eq!(tree.len(), 7);
    assert_eq!(tree.to_newick(), "((A,B)12,(C,D)13)11;");
}

#[test]
fn collapse_keeps_proper_root() {
    let mut tree = tree!("((A,B)12,(C,D)13)11;");
    assert!(tree.collapse_unary_root().is_empty());
    assert_eq!(tree.len(), 7);
}

#[test]
fn strip_iqtree_label_annotations() {
    let mut tree = tree!("((A,B)Node2/100/98,(C,D)Node3)Node1;");
    assert_eq!(tree.strip_internal_label_annotations('/'), 1);
    assert!(tree.try_idx("Node2").is_ok());
    assert!(tree.try_idx("Node3").is_ok());
}

#[rstest]
#[case("(((A:1,B:5.5)C:2,D:0.25)E);")]
#[case("((T1,T2)I1,(T3,(T4,T5)I2)I3)I0;")]
#[case("(('a b',C)'x y',D);")]
fn to_newick_round_trip(#[case] newick: &str) {
    let tree = tree!(newick);
    assert_eq!(tree.to_newick(), newick);
    let again: Tree = tree!(&tree.to_newick());
    assert_eq!(again.nodes, tree.nodes);
}
