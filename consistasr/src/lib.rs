use anyhow::Error;

pub mod alphabets;
pub mod clades;
pub mod correspondence;
pub mod indels;
pub mod io;
pub mod merge;
pub mod reconcile;
pub mod states;
pub mod tree;

mod macros;

type Result<T> = std::result::Result<T, Error>;
