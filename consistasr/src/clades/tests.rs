use std::collections::HashSet;

use rstest::*;

use crate::clades::{numeric_prefix_tails, CladeIndex, LeafNameMap, LeafNameNormalisation};
use crate::{clade, tree};

fn names(ids: &[&str]) -> HashSet<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

#[test]
fn clades_of_all_internal_nodes() {
    let tree = tree!("((T1,T2)I1,(T3,(T4,T5)I2)I3)I0;");
    let index = CladeIndex::new(&tree, &LeafNameMap::verbatim(&tree));
    assert_eq!(index.len(), 4);
    let expected = [
        ("I0", clade!("T1", "T2", "T3", "T4", "T5")),
        ("I1", clade!("T1", "T2")),
        ("I2", clade!("T4", "T5")),
        ("I3", clade!("T3", "T4", "T5")),
    ];
    for (id, clade) in expected.iter() {
        let idx = tree.try_idx(id).unwrap();
        assert_eq!(index.clade(&idx).unwrap(), clade);
    }
    let leaf = tree.try_idx("T1").unwrap();
    assert!(index.clade(&leaf).is_none());
}

#[rstest]
#[case("((T1,T2)I1,(T3,(T4,T5)I2)I3)I0;", "((T3,(T5,T4)I2)I3,(T2,T1)I1)I0;")]
#[case("(A,B,(C,D,E)X,F)R;", "(F,(E,C,D)X,B,A)R;")]
fn clades_ignore_child_order(#[case] newick: &str, #[case] reordered: &str) {
    let tree = tree!(newick);
    let other = tree!(reordered);
    let index = CladeIndex::new(&tree, &LeafNameMap::verbatim(&tree));
    let other_index = CladeIndex::new(&other, &LeafNameMap::verbatim(&other));
    for node in tree.internals() {
        let other_idx = other.try_idx(&node.id).unwrap();
        assert_eq!(
            index.clade(&node.idx).unwrap(),
            other_index.clade(&other_idx).unwrap()
        );
    }
}

#[test]
fn clades_are_laminar() {
    let tree = tree!("(((A,B)X,(C,D)Y)Z,(E,(F,G)V)W)R;");
    let index = CladeIndex::new(&tree, &LeafNameMap::verbatim(&tree));
    let clades: Vec<_> = index.iter().map(|(_, c)| c).collect();
    for a in clades.iter() {
        for b in clades.iter() {
            let a_in_b = a.iter().all(|l| b.contains(l));
            let b_in_a = b.iter().all(|l| a.contains(l));
            let disjoint = a.iter().all(|l| !b.contains(l));
            assert!(a_in_b || b_in_a || disjoint);
        }
    }
}

#[rstest]
#[case::plain("OG_WP_010903286", vec!["OG_WP_010903286"])]
#[case::paml("112_OG_WP_010903286", vec!["112_OG_WP_010903286", "OG_WP_010903286"])]
#[case::nested("12_34_X", vec!["12_34_X", "34_X", "X"])]
#[case::only_digits("12_34", vec!["12_34", "34"])]
#[case::trailing_underscore("12_", vec!["12_"])]
#[case::leading_underscore("_12_A", vec!["_12_A"])]
fn tails(#[case] name: &str, #[case] expected: Vec<&str>) {
    assert_eq!(numeric_prefix_tails(name), expected);
}

#[test]
fn paml_leaf_names_normalised() {
    let tree = tree!("((1_OG_WP_010903286,2_SzR_1)5,3_HeR_2)4;");
    let reference = names(&["OG_WP_010903286", "SzR_1", "HeR_2"]);
    let map = LeafNameMap::new(
        &tree,
        LeafNameNormalisation::NumericPrefix,
        Some(&reference),
    )
    .unwrap();
    assert!(map.flagged.is_empty());
    assert_eq!(map.normalised_names(), reference);
    let index = CladeIndex::new(&tree, &map);
    let idx = tree.try_idx("5").unwrap();
    assert_eq!(index.clade(&idx).unwrap(), &clade!("OG_WP_010903286", "SzR_1"));
}

#[test]
fn raw_name_wins_if_known() {
    let tree = tree!("(12_A,B)C;");
    let reference = names(&["12_A", "A", "B"]);
    let map = LeafNameMap::new(
        &tree,
        LeafNameNormalisation::NumericPrefix,
        Some(&reference),
    )
    .unwrap();
    assert_eq!(map.get("12_A"), "12_A");
    assert_eq!(map.flagged.len(), 1);
    assert_eq!(map.flagged[0].matches, 2);
}

#[test]
fn unmatched_leaf_is_flagged() {
    let tree = tree!("(1_A,2_B)C;");
    let reference = names(&["A"]);
    let map = LeafNameMap::new(
        &tree,
        LeafNameNormalisation::NumericPrefix,
        Some(&reference),
    )
    .unwrap();
    assert_eq!(map.get("2_B"), "B");
    assert_eq!(map.flagged.len(), 1);
    assert_eq!(map.flagged[0].raw, "2_B");
    assert_eq!(map.flagged[0].matches, 0);
    assert!(map.flagged[0].to_string().contains("without a match"));
}

#[test]
fn stripping_without_reference() {
    let tree = tree!("(1_A,2_B)C;");
    let map = LeafNameMap::new(&tree, LeafNameNormalisation::NumericPrefix, None).unwrap();
    assert_eq!(map.normalised_names(), names(&["A", "B"]));
    assert!(map.flagged.is_empty());
}

#[test]
fn verbatim_keeps_names() {
    let tree = tree!("(1_A,2_B)C;");
    let map = LeafNameMap::new(&tree, LeafNameNormalisation::Verbatim, None).unwrap();
    assert_eq!(map.get("1_A"), "1_A");
    assert_eq!(map.get("unknown"), "unknown");
}

#[test]
fn colliding_normalisation_fails() {
    let tree = tree!("(1_A,2_A)C;");
    let res = LeafNameMap::new(&tree, LeafNameNormalisation::NumericPrefix, None);
    assert!(res.unwrap_err().to_string().contains("both normalise to A"));
}
