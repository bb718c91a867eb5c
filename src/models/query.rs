//! Query classification types.

use serde::{Deserialize, Serialize};

/// What the user wants from a query.
///
/// Decided at the start of the retrieval funnel but only acted on at the final
/// branch: `Retrieval` returns matching items, `Question` additionally
/// synthesizes an answer over them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    /// Locate specific memories.
    Retrieval,
    /// Ask a question needing a synthesized answer.
    Question,
}

impl QueryKind {
    /// Parses a classifier response; anything other than `retrieval` is
    /// treated as a question.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.trim().trim_matches('"').eq_ignore_ascii_case("retrieval") {
            Self::Retrieval
        } else {
            Self::Question
        }
    }

    /// Returns the lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Retrieval => "retrieval",
            Self::Question => "question",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_retrieval() {
        assert_eq!(QueryKind::parse("retrieval"), QueryKind::Retrieval);
        assert_eq!(QueryKind::parse("\"Retrieval\"\n"), QueryKind::Retrieval);
    }

    #[test]
    fn test_parse_defaults_to_question() {
        assert_eq!(QueryKind::parse("question"), QueryKind::Question);
        assert_eq!(QueryKind::parse("something else"), QueryKind::Question);
    }
}
