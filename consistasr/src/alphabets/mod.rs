pub static AMINOACIDS: &[u8] = b"ARNDCQEGHILKMFPSTWYV";
pub static AMB_AMINOACIDS: &[u8] = b"BJZXUO*?";
pub static GAP: u8 = b'-';
pub static POSSIBLE_GAPS: &[u8] = b"-.~";

/// Upper-cases a reconstructed symbol and folds all gap-like characters into [`GAP`].
/// Returns `None` if the symbol is not an amino acid, an ambiguity code or a gap.
pub fn normalise_symbol(symbol: u8) -> Option<u8> {
    let symbol = symbol.to_ascii_uppercase();
    if POSSIBLE_GAPS.contains(&symbol) {
        Some(GAP)
    } else if AMINOACIDS.contains(&symbol) || AMB_AMINOACIDS.contains(&symbol) {
        Some(symbol)
    } else {
        None
    }
}

pub fn is_gap(symbol: u8) -> bool {
    symbol == GAP
}

#[cfg(test)]
#[cfg_attr(coverage, coverage(off))]
mod tests;
