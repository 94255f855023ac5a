use rstest::*;

use crate::alphabets::{is_gap, normalise_symbol, AMINOACIDS, GAP};

#[test]
fn all_aminoacids_are_kept() {
    for &aa in AMINOACIDS {
        assert_eq!(normalise_symbol(aa), Some(aa));
        assert_eq!(normalise_symbol(aa.to_ascii_lowercase()), Some(aa));
    }
}

#[rstest]
#[case::dash(b'-')]
#[case::dot(b'.')]
#[case::tilde(b'~')]
fn gap_like_symbols_fold_to_gap(#[case] symbol: u8) {
    assert_eq!(normalise_symbol(symbol), Some(GAP));
    assert!(is_gap(normalise_symbol(symbol).unwrap()));
}

#[rstest]
#[case::ambiguous(b'X', Some(b'X'))]
#[case::stop(b'*', Some(b'*'))]
#[case::digit(b'1', None)]
#[case::underscore(b'_', None)]
#[case::space(b' ', None)]
fn other_symbols(#[case] symbol: u8, #[case] expected: Option<u8>) {
    assert_eq!(normalise_symbol(symbol), expected);
}
