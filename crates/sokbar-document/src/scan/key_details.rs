// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Key-detail classifier — surfaces acronyms, hyphenated names, years and proper
// names from transcribed text.
//
// Rules are tried in a fixed order and the first match wins, so `"ABC-2023"` is
// an acronym even though it also contains a year. Matching is purely textual:
// confidence and geometry are never consulted. Swedish Å/Ä/Ö count as letters.

use std::sync::LazyLock;

use regex::Regex;
use sokbar_core::types::{KeyDetail, KeyDetailKind, ProperNameMode};
use tracing::debug;

static ACRONYM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-ZÅÄÖ]{2,}(\.[A-ZÅÄÖ]{2,})*\b").expect("valid acronym regex")
});
static HYPHENATED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-ZÅÄÖ][a-zåäö]+-[A-ZÅÄÖ][a-zåäö]+\b").expect("valid hyphenated name regex")
});
static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{4}\b").expect("valid year regex"));

/// Sanitised text shorter than this is too short to judge capitalisation.
const MIN_NAME_CHARS: usize = 2;

/// Ordered rule chain over transcribed strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyDetailClassifier {
    proper_name_mode: ProperNameMode,
}

impl KeyDetailClassifier {
    /// Evaluation order of the rules.
    pub const ORDER: [KeyDetailKind; 4] = [
        KeyDetailKind::Acronym,
        KeyDetailKind::HyphenatedName,
        KeyDetailKind::Year,
        KeyDetailKind::ProperName,
    ];

    pub fn new(proper_name_mode: ProperNameMode) -> Self {
        Self { proper_name_mode }
    }

    pub fn proper_name_mode(&self) -> ProperNameMode {
        self.proper_name_mode
    }

    /// The first rule in [`Self::ORDER`] that matches `text`, if any.
    pub fn classify(&self, text: &str) -> Option<KeyDetailKind> {
        Self::ORDER.into_iter().find(|&kind| self.matches(kind, text))
    }

    /// Whether a single rule matches `text`, independent of rule order.
    pub fn matches(&self, kind: KeyDetailKind, text: &str) -> bool {
        match kind {
            KeyDetailKind::Acronym => ACRONYM.is_match(text),
            KeyDetailKind::HyphenatedName => HYPHENATED_NAME.is_match(text),
            KeyDetailKind::Year => YEAR.is_match(text),
            KeyDetailKind::ProperName => self.is_proper_name(text),
        }
    }

    /// Classify every text in order and keep the matches.
    ///
    /// The whole text of a matching input is kept, not just the matched span.
    /// Repeated texts yield repeated key details.
    pub fn extract<'a, I>(&self, texts: I) -> Vec<KeyDetail>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let details: Vec<KeyDetail> = texts
            .into_iter()
            .filter_map(|text| {
                self.classify(text).map(|kind| KeyDetail {
                    text: text.to_string(),
                    kind,
                })
            })
            .collect();
        debug!(matched = details.len(), "Key details extracted");
        details
    }

    /// Capitalised first letter followed by a lowercase tail.
    ///
    /// The first-letter check runs on the sanitised text; which tail is checked
    /// depends on [`ProperNameMode`].
    fn is_proper_name(&self, text: &str) -> bool {
        let sanitized = sanitize(text);
        if sanitized.chars().count() < MIN_NAME_CHARS {
            return false;
        }
        let starts_upper = sanitized.chars().next().is_some_and(char::is_uppercase);
        if !starts_upper {
            return false;
        }
        match self.proper_name_mode {
            ProperNameMode::RawTail => is_lowercase_run(text.chars().skip(1)),
            ProperNameMode::SanitizedTail => is_lowercase_run(sanitized.chars().skip(1)),
        }
    }
}

/// Keep letters, digits, `å`, `ä`, `ö` and `-`.
fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, 'å' | 'ä' | 'ö' | '-'))
        .collect()
}

/// True when the run has at least one cased character and none of its cased
/// characters is upper- or titlecase. Uncased characters (digits, punctuation,
/// spaces) are ignored.
fn is_lowercase_run(chars: impl Iterator<Item = char>) -> bool {
    let mut saw_cased = false;
    for c in chars {
        if c.is_lowercase() {
            saw_cased = true;
        } else if c.is_uppercase() || c.to_lowercase().any(|l| l != c) {
            return false;
        }
    }
    saw_cased
}
