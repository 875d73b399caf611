use crate::error::{Result, SweaError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Placeholder value some clients send when no engine was picked.
const UNSELECTED: &str = "select search engine";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchEngine {
    Bing,
    Google,
    #[serde(rename = "duckduckgo")]
    DuckDuckGo,
}

impl SearchEngine {
    pub fn all() -> &'static [SearchEngine] {
        &[
            SearchEngine::Bing,
            SearchEngine::Google,
            SearchEngine::DuckDuckGo,
        ]
    }

    /// Lowercase identifier used on the wire and in config.
    pub fn as_str(self) -> &'static str {
        match self {
            SearchEngine::Bing => "bing",
            SearchEngine::Google => "google",
            SearchEngine::DuckDuckGo => "duckduckgo",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            SearchEngine::Bing => "Bing",
            SearchEngine::Google => "Google",
            SearchEngine::DuckDuckGo => "DuckDuckGo",
        }
    }

    /// Resolve a client-supplied engine name. Absent, blank and placeholder
    /// values fall back to `default`; unknown names are rejected.
    pub fn resolve(requested: Option<&str>, default: SearchEngine) -> Result<SearchEngine> {
        match requested.map(str::trim) {
            None => Ok(default),
            Some(s) if s.is_empty() || s.eq_ignore_ascii_case(UNSELECTED) => Ok(default),
            Some(s) => s.parse(),
        }
    }
}

impl fmt::Display for SearchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for SearchEngine {
    type Err = SweaError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "bing" => Ok(SearchEngine::Bing),
            "google" => Ok(SearchEngine::Google),
            "duckduckgo" | "ddg" => Ok(SearchEngine::DuckDuckGo),
            _ => Err(SweaError::Validation(format!(
                "unknown search engine '{s}' (expected one of: bing, google, duckduckgo)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Google".parse::<SearchEngine>().unwrap(), SearchEngine::Google);
        assert_eq!("BING".parse::<SearchEngine>().unwrap(), SearchEngine::Bing);
        assert_eq!(
            "Duck Duck Go".parse::<SearchEngine>().unwrap(),
            SearchEngine::DuckDuckGo
        );
        assert_eq!("ddg".parse::<SearchEngine>().unwrap(), SearchEngine::DuckDuckGo);
    }

    #[test]
    fn unknown_engine_is_validation_error() {
        assert!(matches!(
            "altavista".parse::<SearchEngine>(),
            Err(SweaError::Validation(_))
        ));
    }

    #[test]
    fn resolve_falls_back_to_default() {
        let d = SearchEngine::Google;
        assert_eq!(SearchEngine::resolve(None, d).unwrap(), d);
        assert_eq!(SearchEngine::resolve(Some("  "), d).unwrap(), d);
        assert_eq!(
            SearchEngine::resolve(Some("Select Search Engine"), d).unwrap(),
            d
        );
        assert_eq!(
            SearchEngine::resolve(Some("bing"), d).unwrap(),
            SearchEngine::Bing
        );
    }

    #[test]
    fn serde_uses_lowercase_ids() {
        assert_eq!(
            serde_json::to_string(&SearchEngine::DuckDuckGo).unwrap(),
            "\"duckduckgo\""
        );
        let e: SearchEngine = serde_json::from_str("\"bing\"").unwrap();
        assert_eq!(e, SearchEngine::Bing);
    }

    #[test]
    fn display_names() {
        let names: Vec<_> = SearchEngine::all().iter().map(|e| e.to_string()).collect();
        assert_eq!(names, ["Bing", "Google", "DuckDuckGo"]);
    }
}
