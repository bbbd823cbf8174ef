// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `sokbar key-details` — run the classifier over a text file, one candidate per
// line, without any OCR.

use std::path::Path;

use sokbar_core::error::Result;
use sokbar_core::types::{KeyDetail, ProperNameMode};
use sokbar_document::KeyDetailClassifier;

pub fn run(text_file: &Path, mode: ProperNameMode) -> Result<()> {
    let text = std::fs::read_to_string(text_file)?;
    let details = classify_lines(&text, mode);
    for detail in &details {
        println!("{:<16} {}", detail.kind.label(), detail.text);
    }
    eprintln!("{} key detail(s) in {}", details.len(), text_file.display());
    Ok(())
}

/// Lines of `text` that match a rule, classified exactly as written.
///
/// Lines are not trimmed: surrounding whitespace takes part in the raw-tail
/// proper-name check and is kept in the reported text, the same as for
/// transcribed strings.
pub fn classify_lines(text: &str, mode: ProperNameMode) -> Vec<KeyDetail> {
    KeyDetailClassifier::new(mode).extract(text.lines())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sokbar_core::types::KeyDetailKind;

    #[test]
    fn lines_are_classified_in_order() {
        let text = "  Anna-Lena\nhej\n\nFN 1945\n(Malmö\n";
        let kinds: Vec<KeyDetailKind> = classify_lines(text, ProperNameMode::RawTail)
            .iter()
            .map(|d| d.kind)
            .collect();
        assert_eq!(kinds, [KeyDetailKind::HyphenatedName, KeyDetailKind::Acronym]);

        let sanitized = classify_lines(text, ProperNameMode::SanitizedTail);
        assert_eq!(sanitized.last().unwrap().text, "(Malmö");
        assert_eq!(sanitized[0].text, "  Anna-Lena");
    }

    #[test]
    fn leading_whitespace_is_not_trimmed() {
        assert!(classify_lines(" Malmö\n", ProperNameMode::RawTail).is_empty());

        let sanitized = classify_lines(" Malmö\n", ProperNameMode::SanitizedTail);
        assert_eq!(sanitized.len(), 1);
        assert_eq!(sanitized[0].kind, KeyDetailKind::ProperName);
        assert_eq!(sanitized[0].text, " Malmö");
    }
}
