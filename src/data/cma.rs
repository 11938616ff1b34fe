use strsim::normalized_levenshtein;
use tracing::{debug, warn};

use crate::config::Settings;

/// Older trade sheets still use the pre-merger name for Melbourne Water.
pub const PORT_PHILLIP: &str = "Port Phillip and Westernport";

/// Scores below this are still accepted, but logged.
const LOW_CONFIDENCE: f64 = 60.0;

/// A candidate chosen for a raw label, scored 0 to 100.
#[derive(Debug, Clone, PartialEq)]
pub struct CmaMatch {
    pub name: String,
    pub score: f64,
}

/// Maps free-text CMA labels from the trade register onto canonical names.
///
/// The register is typed by hand, so the same region turns up as
/// "Goulburn-Broken", "Goulburn Broken CMA", "goulburn broken" and so on.
/// Every non-blank label is assigned its best-scoring choice.
#[derive(Debug, Clone)]
pub struct CmaMatcher {
    choices: Vec<String>,
    aliases: Vec<(String, String)>,
}

impl Default for CmaMatcher {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl CmaMatcher {
    /// Creates a matcher over `choices`.
    ///
    /// # Arguments
    /// * `choices`: canonical names a label can be matched to
    /// * `aliases`: `(matched, reported)` pairs renaming a matched choice
    pub fn new(choices: Vec<String>, aliases: Vec<(String, String)>) -> Self {
        Self { choices, aliases }
    }

    /// Matches against the configured CMAs, plus the old Port Phillip name
    /// reported as Melbourne Water.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut choices = settings.cmas.clone();
        choices.push(PORT_PHILLIP.to_string());
        Self::new(
            choices,
            vec![(PORT_PHILLIP.to_string(), "Melbourne Water".to_string())],
        )
    }

    /// Best-scoring choice for `raw`, or `None` for a blank label.
    pub fn best_match(&self, raw: &str) -> Option<CmaMatch> {
        let query = preprocess(raw);
        if query.is_empty() {
            return None;
        }

        self.choices
            .iter()
            .map(|choice| CmaMatch {
                name: choice.clone(),
                score: weighted_ratio(&query, &preprocess(choice)),
            })
            .fold(None, |best: Option<CmaMatch>, m| match best {
                Some(b) if b.score >= m.score => Some(b),
                _ => Some(m),
            })
    }

    /// Canonical name for `raw` with aliases applied.
    ///
    /// Blank labels come back trimmed and unmatched.
    pub fn normalise(&self, raw: &str) -> String {
        let Some(found) = self.best_match(raw) else {
            return raw.trim().to_string();
        };

        if found.score < LOW_CONFIDENCE {
            warn!(raw, matched = %found.name, score = found.score, "low confidence CMA match");
        } else {
            debug!(raw, matched = %found.name, score = found.score, "CMA matched");
        }

        self.aliases
            .iter()
            .find(|(from, _)| *from == found.name)
            .map(|(_, to)| to.clone())
            .unwrap_or(found.name)
    }
}

/// Lower-cases, turns punctuation into spaces and collapses whitespace.
fn preprocess(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn ratio(a: &str, b: &str) -> f64 {
    normalized_levenshtein(a, b) * 100.0
}

fn token_sort(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Best ratio of the shorter string against every same-length window of the
/// longer one.
fn partial_ratio(a: &str, b: &str) -> f64 {
    let (short, long) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    let long_chars: Vec<char> = long.chars().collect();
    let width = short.chars().count();
    if width == 0 {
        return 0.0;
    }

    long_chars
        .windows(width)
        .map(|w| ratio(short, &w.iter().collect::<String>()))
        .fold(0.0, f64::max)
}

fn weighted_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let (la, lb) = (a.chars().count() as f64, b.chars().count() as f64);
    let mut score = ratio(a, b).max(ratio(&token_sort(a), &token_sort(b)) * 0.95);
    if la.max(lb) / la.min(lb) >= 1.5 || a.contains(b) || b.contains(a) {
        score = score.max(partial_ratio(a, b) * 0.9);
    }
    score
}
