use std::collections::{BTreeSet, HashSet};

use assert_matches::assert_matches;
use rstest::*;

use crate::clades::{CladeIndex, LeafNameMap, LeafNameNormalisation};
use crate::correspondence::{MappingStatus, NodeCorrespondence, UnmappedReason};
use crate::tree;
use crate::tree::Tree;

fn resolve(a: &Tree, b: &Tree) -> NodeCorrespondence {
    let a_clades = CladeIndex::new(a, &LeafNameMap::verbatim(a));
    let b_clades = CladeIndex::new(b, &LeafNameMap::verbatim(b));
    NodeCorrespondence::resolve(a, &a_clades, b, &b_clades)
}

fn swapped(pairs: impl IntoIterator<Item = (String, String)>) -> BTreeSet<(String, String)> {
    pairs.into_iter().map(|(a, b)| (b, a)).collect()
}

#[test]
fn identical_topologies_fully_mapped() {
    let a = tree!("((T1,T2)I1,(T3,(T4,T5)I2)I3)I0;");
    let b = tree!("((T1,T2)11,(T3,(T4,T5)12)13)10;");
    let map = resolve(&a, &b);
    assert_eq!(map.mapped_count(), 4);
    assert_eq!(map.unmapped_count(), 0);
    for (node, peer) in [("I0", "10"), ("I1", "11"), ("I2", "12"), ("I3", "13")] {
        assert_eq!(map.peer_of(node), Some(peer));
        assert_eq!(map.node_of_peer(peer), Some(node));
    }
    let tips: Vec<usize> = map.entries().iter().map(|e| e.n_tips).collect();
    assert_eq!(tips, vec![5, 2, 2, 3]);
}

#[test]
fn child_order_does_not_matter() {
    let a = tree!("((T1,T2)I1,(T3,(T4,T5)I2)I3)I0;");
    let b = tree!("(((T5,T4)12,T3)13,(T2,T1)11)10;");
    assert_eq!(resolve(&a, &b).mapped_count(), 4);
}

#[test]
fn unlabelled_peer_root_is_reported_unmapped() {
    let a = tree!("((T1,T2)I1,(T3,(T4,T5)I2)I3)I0;");
    let b = tree!("((T1,T2)11,(T3,(T4,T5)12)13);");
    let map = resolve(&a, &b);
    assert_eq!(map.mapped_count(), 3);
    assert_eq!(map.unlabelled(), (0, 1));
    let unmapped: Vec<_> = map.unmapped().collect();
    assert_eq!(unmapped.len(), 1);
    assert_eq!(unmapped[0].node.as_deref(), Some("I0"));
    assert!(unmapped[0].is_root);
    assert_eq!(unmapped[0].status, MappingStatus::Unmapped);
    assert_matches!(unmapped[0].reason, Some(UnmappedReason::NoMatchingClade));
    assert!(unmapped[0].to_string().contains("root"));
}

#[test]
fn rerooted_trees_report_both_sides() {
    let a = tree!("((T1,T2)I1,(T3,(T4,T5)I2)I3)I0;");
    let b = tree!("(T1,(T2,(T3,(T4,T5)12)13)14)10;");
    let map = resolve(&a, &b);
    assert_eq!(map.peer_of("I0"), Some("10"));
    assert_eq!(map.peer_of("I2"), Some("12"));
    assert_eq!(map.peer_of("I3"), Some("13"));
    assert_eq!(map.peer_of("I1"), None);
    let unmapped: Vec<_> = map.unmapped().collect();
    assert_eq!(unmapped.len(), 2);
    assert_eq!(unmapped[0].node.as_deref(), Some("I1"));
    assert_eq!(unmapped[1].node, None);
    assert_eq!(unmapped[1].peer.as_deref(), Some("14"));
    assert_eq!(unmapped[1].n_tips, 4);
}

#[test]
fn near_matches_are_not_accepted() {
    let a = tree!("((T1,T2,T3)I1,(T4,T5)I2)I0;");
    let b = tree!("(((T1,T2)11,T3)13,(T4,T5)12)10;");
    let map = resolve(&a, &b);
    assert_eq!(map.peer_of("I1"), Some("13"));
    assert_eq!(map.node_of_peer("11"), None);
    assert_eq!(map.mapped_count(), 3);
}

#[test]
fn duplicate_clades_are_ambiguous() {
    let a = tree!("(((T1,T2)I2)I1,T3)I0;");
    let b = tree!("((T1,T2)11,T3)10;");
    let map = resolve(&a, &b);
    assert_eq!(map.peer_of("I0"), Some("10"));
    assert_eq!(map.peer_of("I1"), None);
    assert_eq!(map.peer_of("I2"), None);
    assert_eq!(map.node_of_peer("11"), None);
    for entry in map.unmapped() {
        assert_matches!(entry.reason, Some(UnmappedReason::AmbiguousClade(3)));
    }
    assert_eq!(map.unmapped_count(), 3);
}

#[rstest]
#[case("((T1,T2)I1,(T3,(T4,T5)I2)I3)I0;", "((T1,T2)11,(T3,(T4,T5)12)13)10;")]
#[case("((T1,T2)I1,(T3,(T4,T5)I2)I3)I0;", "(T1,(T2,(T3,(T4,T5)12)13)14)10;")]
#[case("(((T1,T2)I2)I1,T3)I0;", "((T1,T2)11,T3)10;")]
#[case("((A,B)X,(C,D)Y,(E,F)Z)R;", "(((A,B)1,(C,D)2)3,(E,F)4)5;")]
fn correspondence_is_symmetric(#[case] newick_a: &str, #[case] newick_b: &str) {
    let a = tree!(newick_a);
    let b = tree!(newick_b);
    let forward = resolve(&a, &b).mapped_pairs();
    let backward = resolve(&b, &a).mapped_pairs();
    assert_eq!(swapped(backward), forward);
}

#[test]
fn normalised_leaf_names_are_matched() {
    let a = tree!("((1_OG_A,2_B)7,(3_C,4_D)8)6;");
    let b = tree!("((OG_A,B)101,(C,D)102)100;");
    let reference: HashSet<String> = b.leaf_ids.iter().cloned().collect();
    let names =
        LeafNameMap::new(&a, LeafNameNormalisation::NumericPrefix, Some(&reference)).unwrap();
    let a_clades = CladeIndex::new(&a, &names);
    let b_clades = CladeIndex::new(&b, &LeafNameMap::verbatim(&b));
    let map = NodeCorrespondence::resolve(&a, &a_clades, &b, &b_clades);
    assert_eq!(map.mapped_count(), 3);
    assert_eq!(map.node_of_peer("101"), Some("7"));
}

#[test]
fn entries_sorted_naturally() {
    let a = tree!("(((A,B)Node10,C)Node2,(D,E)Node1)Node3;");
    let b = tree!("(((A,B)x,C)y,(D,E)z)w;");
    let map = resolve(&a, &b);
    let order: Vec<&str> = map
        .entries()
        .iter()
        .map(|e| e.node.as_deref().unwrap())
        .collect();
    assert_eq!(order, vec!["Node1", "Node2", "Node3", "Node10"]);
}
