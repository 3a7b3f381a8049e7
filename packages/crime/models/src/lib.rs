#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Urgency tier taxonomy and crime keyword tables.
//!
//! Citizens pick free-form crime-type tokens when they submit a report
//! (`"Murder"`, `"Physical Injury"`, `"Cybercrime"`, ...). Everything that
//! needs to classify those tokens goes through the tables in this crate so
//! that scoring, focus-crime flagging and jurisdiction routing all agree on
//! what a token means. Matching is always a case-insensitive substring test.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Urgency tier of a report, derived from its crime-type tokens.
///
/// Ordered from least to most urgent so that `max()` over a set of tiers
/// yields the tier that should drive the response.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum UrgencyTier {
    /// Anything not recognized, including empty token lists.
    Low,
    /// Property and financial offenses (theft, burglary, fraud, ...).
    Medium,
    /// Crimes against persons short of the critical set.
    High,
    /// Murder, homicide, rape and sexual assault.
    Critical,
}

impl UrgencyTier {
    /// Base urgency score for this tier, before any bonus modifiers.
    #[must_use]
    pub const fn base_score(self) -> u8 {
        match self {
            Self::Low => 30,
            Self::Medium => 50,
            Self::High => 75,
            Self::Critical => 100,
        }
    }

    /// Keywords that place a token in this tier.
    ///
    /// [`Self::Low`] has no keywords; it is the fallback.
    #[must_use]
    pub const fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::Critical => CRITICAL_KEYWORDS,
            Self::High => HIGH_KEYWORDS,
            Self::Medium => MEDIUM_KEYWORDS,
            Self::Low => &[],
        }
    }

    /// Returns all variants, most urgent first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Critical, Self::High, Self::Medium, Self::Low]
    }

    /// Classifies a single crime-type token.
    ///
    /// The most urgent tier with a matching keyword wins, so
    /// `"Sexual Assault and Robbery"` is [`Self::Critical`].
    #[must_use]
    pub fn for_token(token: &str) -> Self {
        let lower = normalize(token);

        Self::all()
            .iter()
            .copied()
            .find(|tier| contains_any(&lower, tier.keywords()))
            .unwrap_or(Self::Low)
    }

    /// Resolves the tier of a whole token list: the maximum over all
    /// tokens, [`Self::Low`] for an empty list.
    #[must_use]
    pub fn for_tokens<S: AsRef<str>>(tokens: &[S]) -> Self {
        tokens
            .iter()
            .map(|t| Self::for_token(t.as_ref()))
            .max()
            .unwrap_or(Self::Low)
    }
}

const CRITICAL_KEYWORDS: &[&str] = &["murder", "homicide", "rape", "sexual assault"];

const HIGH_KEYWORDS: &[&str] = &[
    "robbery",
    "physical injury",
    "domestic violence",
    "missing person",
    "harassment",
];

const MEDIUM_KEYWORDS: &[&str] = &[
    "theft",
    "burglary",
    "break-in",
    "carnapping",
    "motornapping",
    "threats",
    "fraud",
    "cybercrime",
];

/// The fixed set of focus crimes. A report mentioning any of these is
/// flagged regardless of its score.
pub const FOCUS_CRIMES: &[&str] = &[
    "murder",
    "homicide",
    "physical injury",
    "rape",
    "robbery",
    "theft",
    "carnapping",
    "motornapping",
];

/// Keywords that route a report to the cybercrime unit.
pub const CYBERCRIME_KEYWORDS: &[&str] = &["cybercrime", "cyber crime"];

/// Returns `true` if the token names one of the [`FOCUS_CRIMES`].
#[must_use]
pub fn is_focus_crime(token: &str) -> bool {
    contains_any(&normalize(token), FOCUS_CRIMES)
}

/// Returns `true` if the token marks the report as a cybercrime.
#[must_use]
pub fn is_cybercrime(token: &str) -> bool {
    contains_any(&normalize(token), CYBERCRIME_KEYWORDS)
}

/// Parses a stored crime-type payload into tokens.
///
/// Older rows hold a single bare string (`"Theft"`), newer rows a JSON
/// array (`["Theft","Robbery"]`) or a JSON string. Blank tokens are
/// dropped.
#[must_use]
pub fn parse_crime_types(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let tokens = match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                serde_json::Value::String(s) => Some(s),
                serde_json::Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Ok(serde_json::Value::String(s)) => vec![s],
        _ => vec![trimmed.to_string()],
    };

    tokens
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn normalize(token: &str) -> String {
    token.trim().to_lowercase()
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}
