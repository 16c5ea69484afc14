//! Language profile table: which language codes the parsing backend accepts,
//! grouped by script family.
//!
//! The table is immutable. Build it once with [`LanguageTable::builtin`],
//! wrap it in an `Arc`, and hand it to every component that needs it.
//!
//! The four family selectors (`latin`, `arabic`, `cyrillic`, `devanagari`)
//! are accepted directly as a language code; the backend then uses the
//! family's shared recognition model.

use crate::error::DocRouteError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

const LATIN: &[&str] = &[
    "af", "az", "bs", "cs", "cy", "da", "de", "es", "et", "fr", "ga", "hr", "hu", "id", "is",
    "it", "ku", "la", "lt", "lv", "mi", "ms", "mt", "nl", "no", "oc", "pi", "pl", "pt", "ro",
    "rs_latin", "sk", "sl", "sq", "sv", "sw", "tl", "tr", "uz", "vi", "french", "german",
];

const ARABIC: &[&str] = &["ar", "fa", "ug", "ur"];

const CYRILLIC: &[&str] = &[
    "ru", "rs_cyrillic", "be", "bg", "uk", "mn", "abq", "ady", "kbd", "ava", "dar", "inh", "che",
    "lbe", "lez", "tab",
];

const DEVANAGARI: &[&str] = &[
    "hi", "mr", "ne", "bh", "mai", "ang", "bho", "mah", "sck", "new", "gom", "sa", "bgc",
];

const OTHER: &[&str] = &[
    "ch", "ch_lite", "ch_server", "en", "korean", "japan", "chinese_cht", "ta", "te", "ka",
];

/// Writing-system grouping of a language code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptFamily {
    Latin,
    Arabic,
    Cyrillic,
    Devanagari,
    Other,
}

impl ScriptFamily {
    pub const ALL: [ScriptFamily; 5] = [
        ScriptFamily::Latin,
        ScriptFamily::Arabic,
        ScriptFamily::Cyrillic,
        ScriptFamily::Devanagari,
        ScriptFamily::Other,
    ];

    /// The aggregate selector code for this family, if it has one.
    pub fn aggregate_code(&self) -> Option<&'static str> {
        match self {
            ScriptFamily::Latin => Some("latin"),
            ScriptFamily::Arabic => Some("arabic"),
            ScriptFamily::Cyrillic => Some("cyrillic"),
            ScriptFamily::Devanagari => Some("devanagari"),
            ScriptFamily::Other => None,
        }
    }

    fn codes(&self) -> &'static [&'static str] {
        match self {
            ScriptFamily::Latin => LATIN,
            ScriptFamily::Arabic => ARABIC,
            ScriptFamily::Cyrillic => CYRILLIC,
            ScriptFamily::Devanagari => DEVANAGARI,
            ScriptFamily::Other => OTHER,
        }
    }
}

impl fmt::Display for ScriptFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScriptFamily::Latin => "latin",
            ScriptFamily::Arabic => "arabic",
            ScriptFamily::Cyrillic => "cyrillic",
            ScriptFamily::Devanagari => "devanagari",
            ScriptFamily::Other => "other",
        };
        f.write_str(s)
    }
}

/// Static language code → script family lookup.
#[derive(Debug, Clone)]
pub struct LanguageTable {
    by_code: HashMap<&'static str, ScriptFamily>,
    aggregates: HashMap<&'static str, ScriptFamily>,
}

impl LanguageTable {
    /// The table of languages supported by the MinerU pipeline backend.
    pub fn builtin() -> Self {
        let mut by_code = HashMap::new();
        for family in ScriptFamily::ALL {
            for &code in family.codes() {
                by_code.insert(code, family);
            }
        }
        let aggregates = ScriptFamily::ALL
            .iter()
            .filter_map(|f| f.aggregate_code().map(|c| (c, *f)))
            .collect();
        Self {
            by_code,
            aggregates,
        }
    }

    /// Family of a concrete language code or of an aggregate selector.
    pub fn family_of(&self, code: &str) -> Option<ScriptFamily> {
        self.by_code
            .get(code)
            .or_else(|| self.aggregates.get(code))
            .copied()
    }

    /// Whether `code` is a concrete language or an aggregate selector.
    pub fn contains(&self, code: &str) -> bool {
        self.family_of(code).is_some()
    }

    /// Whether `code` is one of the four family selectors.
    pub fn is_aggregate(&self, code: &str) -> bool {
        self.aggregates.contains_key(code)
    }

    /// Concrete codes in `family`, in table order.
    pub fn codes_in(&self, family: ScriptFamily) -> &'static [&'static str] {
        family.codes()
    }

    /// Codes offered for selection: the directly-named languages followed
    /// by the four family selectors.
    pub fn selectable(&self) -> Vec<&'static str> {
        OTHER
            .iter()
            .copied()
            .chain(ScriptFamily::ALL.iter().filter_map(|f| f.aggregate_code()))
            .collect()
    }

    /// Every concrete code, family by family.
    pub fn all_codes(&self) -> Vec<&'static str> {
        ScriptFamily::ALL
            .iter()
            .flat_map(|f| f.codes().iter().copied())
            .collect()
    }

    /// Check that `code` is known; returns it unchanged.
    pub fn validate<'a>(&self, code: &'a str) -> Result<&'a str, DocRouteError> {
        if self.contains(code) {
            Ok(code)
        } else {
            Err(DocRouteError::InvalidLanguage {
                code: code.to_string(),
            })
        }
    }
}

impl Default for LanguageTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn families_resolve() {
        let t = LanguageTable::builtin();
        assert_eq!(t.family_of("de"), Some(ScriptFamily::Latin));
        assert_eq!(t.family_of("rs_latin"), Some(ScriptFamily::Latin));
        assert_eq!(t.family_of("ur"), Some(ScriptFamily::Arabic));
        assert_eq!(t.family_of("rs_cyrillic"), Some(ScriptFamily::Cyrillic));
        assert_eq!(t.family_of("bgc"), Some(ScriptFamily::Devanagari));
        assert_eq!(t.family_of("japan"), Some(ScriptFamily::Other));
        assert_eq!(t.family_of("klingon"), None);
    }

    #[test]
    fn aggregates_are_accepted() {
        let t = LanguageTable::builtin();
        for code in ["latin", "arabic", "cyrillic", "devanagari"] {
            assert!(t.contains(code), "{code}");
            assert!(t.is_aggregate(code), "{code}");
        }
        assert_eq!(t.family_of("cyrillic"), Some(ScriptFamily::Cyrillic));
        assert!(!t.is_aggregate("en"));
    }

    #[test]
    fn family_sizes() {
        let t = LanguageTable::builtin();
        assert_eq!(t.codes_in(ScriptFamily::Latin).len(), 42);
        assert_eq!(t.codes_in(ScriptFamily::Arabic).len(), 4);
        assert_eq!(t.codes_in(ScriptFamily::Cyrillic).len(), 16);
        assert_eq!(t.codes_in(ScriptFamily::Devanagari).len(), 13);
        assert_eq!(t.codes_in(ScriptFamily::Other).len(), 10);
        assert_eq!(t.all_codes().len(), 85);
    }

    #[test]
    fn codes_are_unique_across_families() {
        let t = LanguageTable::builtin();
        let mut all = t.all_codes();
        let n = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), n);
    }

    #[test]
    fn selectable_matches_dropdown() {
        let t = LanguageTable::builtin();
        let s = t.selectable();
        assert_eq!(s.first(), Some(&"ch"));
        assert_eq!(&s[s.len() - 4..], &["latin", "arabic", "cyrillic", "devanagari"]);
        assert_eq!(s.len(), 14);
    }

    #[test]
    fn validate_rejects_unknown() {
        let t = LanguageTable::builtin();
        assert_eq!(t.validate("en").unwrap(), "en");
        assert!(matches!(
            t.validate("EN"),
            Err(DocRouteError::InvalidLanguage { .. })
        ));
        assert!(t.validate("").is_err());
    }
}
