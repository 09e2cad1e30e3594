//! Token counting keyed by model family.
//!
//! Counts with a BPE encoder when one is available for the family and falls
//! back to a four-characters-per-token heuristic otherwise. The encoders
//! are built once and shared.

use std::sync::OnceLock;

use tiktoken_rs::CoreBPE;
use tracing::debug;

pub fn count_tokens(family: &str, text: &str) -> usize {
    match encoder_for_family(family) {
        Some(bpe) => bpe.encode_with_special_tokens(text).len(),
        None => heuristic(text),
    }
}

fn heuristic(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

fn encoder_for_family(family: &str) -> Option<&'static CoreBPE> {
    if uses_o200k(family) {
        o200k().or_else(cl100k)
    } else {
        cl100k()
    }
}

fn uses_o200k(family: &str) -> bool {
    let family = family.to_ascii_lowercase();
    family.contains("gpt-4o")
        || family.contains("gpt-4.1")
        || family.starts_with("o1")
        || family.starts_with("o3")
        || family.starts_with("o4")
}

fn cl100k() -> Option<&'static CoreBPE> {
    static BPE: OnceLock<Option<CoreBPE>> = OnceLock::new();
    BPE.get_or_init(|| match tiktoken_rs::cl100k_base() {
        Ok(bpe) => Some(bpe),
        Err(err) => {
            debug!(error = %err, "cl100k encoder unavailable; using heuristic");
            None
        }
    })
    .as_ref()
}

fn o200k() -> Option<&'static CoreBPE> {
    static BPE: OnceLock<Option<CoreBPE>> = OnceLock::new();
    BPE.get_or_init(|| match tiktoken_rs::o200k_base() {
        Ok(bpe) => Some(bpe),
        Err(err) => {
            debug!(error = %err, "o200k encoder unavailable; using heuristic");
            None
        }
    })
    .as_ref()
}
