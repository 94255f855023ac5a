use anyhow::bail;
use log::{debug, warn};

use crate::alphabets::normalise_symbol;
use crate::io::DataError;
use crate::states::AncestralStates;
use crate::Result;

/// Lines starting with these words end a node block even though they consist of letters only.
const BLOCK_TERMINATORS: [&str; 4] = ["TREE", "Ancestral", "Probab", "List"];

struct Block {
    node: String,
    symbols: Vec<u8>,
    line_no: usize,
}

pub(super) fn parse(
    content: &str,
    source: &str,
    wanted: &dyn Fn(&str) -> bool,
) -> Result<AncestralStates> {
    let mut states = AncestralStates::default();
    let mut current: Option<Block> = None;
    let mut blocks = 0;

    for (line_no, line) in content.lines().enumerate() {
        let line_no = line_no + 1;
        if let Some((node, tail)) = block_header(line) {
            finish_block(&mut states, current.take(), source, wanted);
            let Some(symbols) = sequence_symbols(tail) else {
                bail!(DataError {
                    message: format!(
                        "{}:{}: unexpected characters in sequence of node {}",
                        source, line_no, node
                    )
                });
            };
            blocks += 1;
            current = Some(Block {
                node,
                symbols,
                line_no,
            });
            continue;
        }
        if let Some(block) = current.as_mut() {
            match continuation_symbols(line) {
                Some(symbols) => block.symbols.extend(symbols),
                None => finish_block(&mut states, current.take(), source, wanted),
            }
        }
    }
    finish_block(&mut states, current.take(), source, wanted);

    if blocks == 0 {
        bail!(DataError {
            message: format!("No 'node #' sequence blocks found in {}", source)
        });
    }
    debug!("Read {} node blocks from {}", blocks, source);
    Ok(states)
}

fn finish_block(
    states: &mut AncestralStates,
    block: Option<Block>,
    source: &str,
    wanted: &dyn Fn(&str) -> bool,
) {
    let Some(block) = block else {
        return;
    };
    if !wanted(&block.node) {
        return;
    }
    if states.contains(&block.node) {
        warn!(
            "{}:{}: repeated block for node {}, keeping the first one",
            source, block.line_no, block.node
        );
        return;
    }
    states.insert(block.node, block.symbols);
}

/// Splits `node #12  MKV...` into the node number and the rest of the line.
fn block_header(line: &str) -> Option<(String, &str)> {
    let rest = line.trim_start();
    if !rest.get(..4)?.eq_ignore_ascii_case("node") {
        return None;
    }
    let rest = rest[4..].trim_start().strip_prefix('#')?.trim_start();
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let tail = &rest[digits..];
    if tail.starts_with(|c: char| c.is_alphanumeric() || c == '_') {
        return None;
    }
    Some((rest[..digits].to_string(), tail))
}

/// Symbols of a piece of sequence text, ignoring whitespace. `None` if anything else is found.
/// Reconstructed sequences are printed in upper case, so lower case letters are rejected too.
fn sequence_symbols(text: &str) -> Option<Vec<u8>> {
    text.bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .map(|b| {
            if b.is_ascii_lowercase() {
                None
            } else {
                normalise_symbol(b)
            }
        })
        .collect()
}

fn continuation_symbols(line: &str) -> Option<Vec<u8>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || BLOCK_TERMINATORS.iter().any(|t| trimmed.starts_with(t)) {
        return None;
    }
    sequence_symbols(trimmed)
}
