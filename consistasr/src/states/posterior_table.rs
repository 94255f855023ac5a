use std::collections::BTreeMap;
use std::result::Result as stdResult;

use anyhow::bail;
use log::debug;
use ordered_float::OrderedFloat;

use crate::alphabets::normalise_symbol;
use crate::io::DataError;
use crate::states::AncestralStates;
use crate::Result;

/// Probability column index for each state symbol, taken from the `p_X` header fields.
type ProbabilityColumns = Vec<(u8, usize)>;

pub(super) fn parse(
    content: &str,
    source: &str,
    wanted: &dyn Fn(&str) -> bool,
) -> Result<AncestralStates> {
    let mut columns: Option<ProbabilityColumns> = None;
    let mut sites: BTreeMap<String, BTreeMap<usize, u8>> = BTreeMap::new();

    for (line_no, line) in content.lines().enumerate() {
        let line_no = line_no + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if is_header(&fields) {
            let header = probability_columns(&fields);
            debug!("Found {} posterior probability columns", header.len());
            columns = Some(header);
            continue;
        }
        if fields.len() < 3 {
            bail!(row_error(
                source,
                line_no,
                &format!("expected node, site and state, found '{}'", line)
            ));
        }
        let node = fields[0];
        if !wanted(node) {
            continue;
        }
        let site = match fields[1].parse::<usize>() {
            Ok(site) if site > 0 => site,
            _ => bail!(row_error(
                source,
                line_no,
                &format!("invalid site index '{}'", fields[1])
            )),
        };
        let symbol = match select_state(&fields, columns.as_deref()) {
            Ok(symbol) => symbol,
            Err(message) => bail!(row_error(source, line_no, &message)),
        };

        let seq = sites.entry(node.to_string()).or_default();
        if seq.insert(site, symbol).is_some() {
            bail!(row_error(
                source,
                line_no,
                &format!("duplicate entry for node {} at site {}", node, site)
            ));
        }
    }

    let mut states = AncestralStates::default();
    for (node, seq) in sites {
        // Sites are sorted, so the first index out of step marks the first hole.
        if let Some(pos) = seq.keys().enumerate().position(|(i, site)| *site != i + 1) {
            bail!(DataError {
                message: format!("{}: node {} has no state for site {}", source, node, pos + 1)
            });
        }
        states.insert(node, seq.into_values().collect());
    }
    Ok(states)
}

fn row_error(source: &str, line_no: usize, message: &str) -> DataError {
    DataError {
        message: format!("{}:{}: {}", source, line_no, message),
    }
}

fn is_header(fields: &[&str]) -> bool {
    fields.len() >= 3
        && fields[0].eq_ignore_ascii_case("node")
        && fields[1].eq_ignore_ascii_case("site")
}

fn probability_columns(fields: &[&str]) -> ProbabilityColumns {
    fields
        .iter()
        .enumerate()
        .filter_map(|(i, field)| match field.strip_prefix("p_")?.as_bytes() {
            [symbol] => Some((symbol.to_ascii_uppercase(), i)),
            _ => None,
        })
        .collect()
}

/// Picks the state of a row. A single listed state is taken as is. Several candidates
/// (`A/R`) are resolved by the highest posterior probability, the first listed on ties.
fn select_state(fields: &[&str], columns: Option<&[(u8, usize)]>) -> stdResult<u8, String> {
    let candidates: Vec<&str> = fields[2].split('/').filter(|c| !c.is_empty()).collect();
    match candidates.as_slice() {
        [] => Err(format!("empty state field '{}'", fields[2])),
        [single] => parse_symbol(single),
        _ => {
            let Some(columns) = columns else {
                return Err(format!(
                    "state '{}' lists several candidates, but no p_X header was found",
                    fields[2]
                ));
            };
            let mut best: Option<(OrderedFloat<f64>, u8)> = None;
            for candidate in candidates.iter() {
                let symbol = parse_symbol(candidate)?;
                let prob = columns
                    .iter()
                    .find(|(s, _)| *s == symbol)
                    .and_then(|(_, col)| fields.get(*col))
                    .and_then(|value| value.parse::<f64>().ok())
                    .ok_or(format!("no posterior probability for state {}", candidate))?;
                if best.map_or(true, |(best_prob, _)| OrderedFloat(prob) > best_prob) {
                    best = Some((OrderedFloat(prob), symbol));
                }
            }
            best.map(|(_, symbol)| symbol)
                .ok_or(format!("no usable state in '{}'", fields[2]))
        }
    }
}

fn parse_symbol(field: &str) -> stdResult<u8, String> {
    match field.as_bytes() {
        [byte] => normalise_symbol(*byte).ok_or(format!("invalid state symbol '{}'", field)),
        _ => Err(format!("invalid state symbol '{}'", field)),
    }
}
