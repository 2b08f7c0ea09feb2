//! Language catalog: display names and the codes the provider accepts.
//!
//! The catalog is only used to validate and populate language parameters.
//! It is loaded from a remote listing when one is available, and falls back
//! to a static built-in mapping otherwise, so a failed listing never blocks
//! translation.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::request::AUTO_LANG;

/// One supported language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageEntry {
    /// Display name (e.g., "Vietnamese", "Chinese (Simplified)")
    pub name: String,

    /// Code sent to the provider (e.g., "vi", "zh-CN")
    pub code: String,
}

/// Where a catalog's entries came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogSource {
    Remote,
    BuiltIn,
}

/// Name → code mapping with case-insensitive lookup.
#[derive(Debug, Clone)]
pub struct LanguageCatalog {
    entries: Vec<LanguageEntry>,
    source: CatalogSource,
}

/// Static fallback used when no listing can be fetched.
const BUILTIN_LANGUAGES: &[(&str, &str)] = &[
    ("Afrikaans", "af"),
    ("Arabic", "ar"),
    ("Bulgarian", "bg"),
    ("Chinese (Simplified)", "zh-CN"),
    ("Chinese (Traditional)", "zh-TW"),
    ("Czech", "cs"),
    ("Dutch", "nl"),
    ("English", "en"),
    ("French", "fr"),
    ("German", "de"),
    ("Hindi", "hi"),
    ("Indonesian", "id"),
    ("Italian", "it"),
    ("Japanese", "ja"),
    ("Korean", "ko"),
    ("Polish", "pl"),
    ("Portuguese", "pt"),
    ("Russian", "ru"),
    ("Spanish", "es"),
    ("Thai", "th"),
    ("Turkish", "tr"),
    ("Ukrainian", "uk"),
    ("Vietnamese", "vi"),
];

/// Regional spellings the provider does not list under their own code.
const ALIASES: &[(&str, &str)] = &[
    ("zh-cn", "zh-CN"),
    ("zh-tw", "zh-TW"),
    ("pt-br", "pt"),
    ("pt-pt", "pt"),
];

static BUILTIN: OnceLock<LanguageCatalog> = OnceLock::new();

impl LanguageCatalog {
    /// The built-in catalog (initialized once, shared thereafter).
    pub fn builtin() -> &'static LanguageCatalog {
        BUILTIN.get_or_init(|| LanguageCatalog {
            entries: sorted(
                BUILTIN_LANGUAGES
                    .iter()
                    .map(|(name, code)| LanguageEntry {
                        name: name.to_string(),
                        code: code.to_string(),
                    })
                    .collect(),
            ),
            source: CatalogSource::BuiltIn,
        })
    }

    /// Build a catalog from `(name, code)` pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            entries: sorted(
                pairs
                    .into_iter()
                    .map(|(name, code)| LanguageEntry { name, code })
                    .collect(),
            ),
            source: CatalogSource::Remote,
        }
    }

    /// Load the catalog from `fetch`, falling back to the built-in mapping.
    ///
    /// A failed or empty listing is logged and never surfaces as an error.
    ///
    /// # Arguments
    /// * `fetch` - Future resolving to the remote `(name, code)` listing
    pub async fn load<F, E>(fetch: F) -> LanguageCatalog
    where
        F: Future<Output = Result<Vec<(String, String)>, E>>,
        E: Display,
    {
        match fetch.await {
            Ok(pairs) if !pairs.is_empty() => {
                debug!("Loaded {} languages from remote listing", pairs.len());
                Self::from_pairs(pairs)
            }
            Ok(_) => {
                warn!("Remote language listing was empty, using built-in catalog");
                Self::builtin().clone()
            }
            Err(e) => {
                warn!("Failed to fetch language listing, using built-in catalog: {}", e);
                Self::builtin().clone()
            }
        }
    }

    pub fn source(&self) -> CatalogSource {
        self.source
    }

    /// All entries, sorted by name (case-insensitive).
    pub fn entries(&self) -> &[LanguageEntry] {
        &self.entries
    }

    /// Name → code mapping.
    pub fn as_map(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|e| (e.name.clone(), e.code.clone()))
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    /// Look up an entry by its code (case-insensitive).
    pub fn get_by_code(&self, code: &str) -> Option<&LanguageEntry> {
        self.entries
            .iter()
            .find(|e| e.code.eq_ignore_ascii_case(code))
    }

    /// Normalize user input to a provider code.
    ///
    /// Empty input and `auto` resolve to `auto`. Otherwise a case-insensitive
    /// code match wins, then a display name match, then the known aliases
    /// (after `_` → `-`). Anything else is returned unchanged for the provider
    /// to judge.
    pub fn resolve(&self, input: &str) -> String {
        let key = input.trim().to_lowercase().replace('_', "-");
        if key.is_empty() || key == AUTO_LANG {
            return AUTO_LANG.to_string();
        }

        if let Some(entry) = self.entries.iter().find(|e| e.code.to_lowercase() == key) {
            return entry.code.clone();
        }

        if let Some(entry) = self.entries.iter().find(|e| e.name.to_lowercase() == key) {
            return entry.code.clone();
        }

        if let Some((_, code)) = ALIASES.iter().find(|(alias, _)| *alias == key) {
            return code.to_string();
        }

        input.to_string()
    }

    /// Entries whose name or code contains `query` (case-insensitive), by name.
    pub fn search(&self, query: &str) -> Vec<&LanguageEntry> {
        let query = query.trim().to_lowercase();
        self.entries
            .iter()
            .filter(|e| {
                query.is_empty()
                    || e.name.to_lowercase().contains(&query)
                    || e.code.to_lowercase().contains(&query)
            })
            .collect()
    }
}

fn sorted(mut entries: Vec<LanguageEntry>) -> Vec<LanguageEntry> {
    entries.sort_by_key(|e| e.name.to_lowercase());
    entries
}
