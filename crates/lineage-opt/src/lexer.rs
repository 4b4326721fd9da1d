//! Lexical scan of compute expressions.
//!
//! This is not a parser: it only extracts identifier-like tokens, which is
//! enough to check column provenance on a best-effort basis.

use std::collections::HashSet;

use logos::Logos;

/// Token kinds recognized in an expression.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
pub enum ExprToken {
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[regex(r"[0-9]+")]
    Number,
}

/// Distinct identifiers of an expression, in order of first appearance.
///
/// Identifiers differing only in case are kept apart. Anything that is not
/// an identifier or a digit run (operators, quotes, punctuation) is skipped.
pub fn identifiers(expression: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    ExprToken::lexer(expression)
        .filter_map(|token| match token {
            Ok(ExprToken::Ident(name)) => Some(name),
            _ => None,
        })
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lex_empty() {
        assert!(identifiers("").is_empty());
    }

    #[test]
    fn test_arithmetic_expression() {
        assert_eq!(identifiers("salary * 0.1"), vec!["salary"]);
        assert_eq!(identifiers("weekly_rate / 7 + bonus_2"), vec!["weekly_rate", "bonus_2"]);
    }

    #[test]
    fn test_function_calls_and_duplicates() {
        assert_eq!(
            identifiers("TRUNC((claim_start - dob) / 365.25) + TRUNC(dob)"),
            vec!["TRUNC", "claim_start", "dob"]
        );
    }

    #[test]
    fn test_digits_split_tokens() {
        // A digit run cannot start an identifier, so the letters that follow
        // it form their own token.
        assert_eq!(identifiers("1abc + x1.5"), vec!["abc", "x1"]);
    }

    #[test]
    fn test_case_variants_kept_apart() {
        assert_eq!(identifiers("Age + age"), vec!["Age", "age"]);
    }

    #[test]
    fn test_quoted_text_is_still_scanned() {
        assert_eq!(identifiers("sex = 'M'"), vec!["sex", "M"]);
    }

    #[test]
    fn test_underscore_start() {
        assert_eq!(identifiers("_tmp+$x"), vec!["_tmp", "x"]);
    }
}
