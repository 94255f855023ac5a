#[macro_export]
macro_rules! record_wo_desc {
    ($e1:expr,$e2:expr) => {{
        use bio::io::fasta::Record;
        Record::with_attrs($e1, None, $e2)
    }};
}

#[macro_export]
macro_rules! tree {
    ($e:expr) => {{
        use $crate::tree::tree_parser::from_newick;
        from_newick($e).unwrap().pop().unwrap()
    }};
}

#[macro_export]
macro_rules! clade {
    ($($leaf:expr),* $(,)?) => {{
        use $crate::clades::Clade;
        Clade::from_iter([$($leaf),*].iter().map(|s: &&str| s.to_string()))
    }};
}

#[macro_export]
macro_rules! bits {
    ($e:expr) => {{
        use bitvec::prelude::*;
        $e.bytes().map(|b| b == b'1').collect::<BitVec>()
    }};
}

#[cfg(test)]
#[cfg_attr(coverage, coverage(off))]
pub mod tests {
    use crate::clades::Clade;

    #[test]
    fn test_record_macro() {
        let record = record_wo_desc!("seq1", b"ATCG");
        assert_eq!(record.id(), "seq1");
        assert_eq!(record.desc(), None);
        assert_eq!(record.seq(), b"ATCG");
    }

    #[test]
    fn test_tree_macro() {
        let tree = tree!("((A,B)C,D)E;");
        assert_eq!(tree.leaf_ids, vec!["A", "B", "D"]);
    }

    #[test]
    fn test_clade_macro() {
        let clade = clade!("B", "A", "B");
        assert_eq!(clade.len(), 2);
        assert_eq!(clade, Clade::from_iter(vec!["A".to_string(), "B".to_string()]));
    }

    #[test]
    fn test_bits_macro() {
        let bits = bits!("1011");
        assert_eq!(bits.len(), 4);
        assert!(!bits[1]);
        assert_eq!(bits.count_ones(), 3);
    }
}
