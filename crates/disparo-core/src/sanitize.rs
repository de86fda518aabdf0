//! Deterministic name sanitization for storage identifiers.
//!
//! Company names and file-name bases both go through [`sanitize`] before they
//! become bucket names or storage keys. The function is pure and total: any
//! input string maps to a string over `[a-z0-9_]` with no leading, trailing,
//! or doubled separators. Callers add a millisecond timestamp for uniqueness.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Sanitize an arbitrary name into a safe storage identifier.
///
/// Lowercases, NFD-normalizes and strips diacritics, collapses every run of
/// non-alphanumeric characters into a single `_`, and trims separators at
/// both ends. Idempotent: `sanitize(sanitize(x)) == sanitize(x)`.
pub fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;

    for c in raw.nfd() {
        if is_combining_mark(c) {
            continue;
        }
        let c = c.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c);
        } else {
            // Non-alphanumeric characters (including non-ASCII letters that
            // survive decomposition) collapse into a single separator.
            pending_sep = true;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_strips_diacritics() {
        assert_eq!(sanitize("Relatório Já"), "relatorio_ja");
        assert_eq!(sanitize("São João"), "sao_joao");
        assert_eq!(sanitize("CAMPANHA-2024"), "campanha_2024");
    }

    #[test]
    fn collapses_separator_runs_and_trims() {
        assert_eq!(sanitize("  foto -- comício!.png "), "foto_comicio_png");
        assert_eq!(sanitize("___a___b___"), "a_b");
        assert_eq!(sanitize("..."), "");
    }

    #[test]
    fn total_on_degenerate_input() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("!!!"), "");
        assert_eq!(sanitize("日本語"), "");
    }

    #[test]
    fn idempotent() {
        for raw in [
            "Instituto São João.pdf",
            "vídeo final (v2).mp4",
            "",
            "Já_sanitizado_123",
            "a--b__c  d",
        ] {
            let once = sanitize(raw);
            assert_eq!(sanitize(&once), once, "not idempotent for {raw:?}");
        }
    }
}
