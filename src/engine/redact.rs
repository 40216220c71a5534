//! Secret redaction for run logs
//!
//! Every secret value found in text bound for a run log is replaced with
//! [`MASK`]. Matching is leftmost-longest, so a secret that is a substring of
//! another secret never leaves part of the longer one visible.

use crate::secrets::SecretStore;
use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};

pub const MASK: &str = "***";

#[derive(Debug, Clone)]
pub struct Redactor {
    strategy: Strategy,
}

#[derive(Debug, Clone)]
enum Strategy {
    Nothing,
    Automaton(AhoCorasick),
    /// The automaton could not be built; nothing is let through
    Withhold,
}

impl Redactor {
    pub fn new(secrets: &SecretStore) -> Self {
        let values: Vec<&str> = secrets.values().filter(|v| !v.is_empty()).collect();
        if values.is_empty() {
            return Self {
                strategy: Strategy::Nothing,
            };
        }

        let strategy = match AhoCorasickBuilder::new()
            .match_kind(MatchKind::LeftmostLongest)
            .build(&values)
        {
            Ok(ac) => Strategy::Automaton(ac),
            Err(e) => {
                tracing::error!("Failed to build redaction automaton, withholding all output: {}", e);
                Strategy::Withhold
            }
        };

        Self { strategy }
    }

    pub fn redact(&self, input: &str) -> String {
        match &self.strategy {
            Strategy::Nothing => input.to_string(),
            Strategy::Automaton(ac) => {
                let masks = vec![MASK; ac.patterns_len()];
                ac.replace_all(input, masks.as_slice())
            }
            Strategy::Withhold => MASK.to_string(),
        }
    }
}
