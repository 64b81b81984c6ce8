use std::sync::Arc;

use crate::Result;

/// Polarity backend
pub trait SentimentModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Polarity of `text` in [-1.0, 1.0]
    fn polarity(&self, text: &str) -> Result<f64>;
}

/// Sentiment scoring over an optional backend
#[derive(Clone)]
pub struct SentimentScorer {
    backend: Option<Arc<dyn SentimentModel>>,
}

impl SentimentScorer {
    pub fn new(backend: Arc<dyn SentimentModel>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    pub fn unavailable() -> Self {
        Self { backend: None }
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    /// `None` for blank text, a missing backend, or a backend error. Never a sentinel value.
    pub fn score(&self, text: &str) -> Option<f64> {
        if text.trim().is_empty() {
            return None;
        }
        let backend = self.backend.as_ref()?;

        match backend.polarity(text) {
            Ok(score) if score.is_finite() => Some(score.clamp(-1.0, 1.0)),
            Ok(score) => {
                tracing::warn!(backend = backend.name(), score, "Discarding non-finite sentiment");
                None
            }
            Err(e) => {
                tracing::warn!(backend = backend.name(), error = %e, "Sentiment scoring failed");
                None
            }
        }
    }
}

/// Word valences on a -4..4 scale, general news plus energy-market vocabulary
const LEXICON: &[(&str, f64)] = &[
    // positive
    ("good", 1.9), ("great", 3.1), ("excellent", 3.2), ("strong", 2.3), ("stronger", 2.0),
    ("growth", 1.8), ("grow", 1.6), ("grows", 1.6), ("gain", 1.6), ("gains", 1.6),
    ("rise", 1.0), ("rises", 1.0), ("rose", 1.0), ("surge", 1.8), ("surged", 1.8),
    ("record", 1.2), ("profit", 1.9), ("profits", 1.9), ("profitable", 2.0),
    ("success", 2.7), ("successful", 2.8), ("benefit", 2.0), ("benefits", 2.0),
    ("improve", 1.9), ("improved", 2.1), ("improvement", 2.0), ("recovery", 1.4),
    ("rebound", 1.4), ("boost", 1.7), ("boosted", 1.7), ("approve", 1.8), ("approved", 1.8),
    ("approval", 1.8), ("agreement", 1.3), ("win", 2.8), ("won", 2.7), ("award", 2.5),
    ("awarded", 2.4), ("secure", 1.4), ("secured", 1.4), ("stable", 1.2), ("resilient", 1.8),
    ("efficient", 1.8), ("innovative", 1.9), ("breakthrough", 2.3), ("optimistic", 2.3),
    ("confident", 2.2), ("robust", 1.9), ("upbeat", 2.0), ("expand", 1.3), ("expansion", 1.3),
    ("milestone", 1.8), ("discovery", 1.5), ("safe", 1.9), ("clean", 1.7), ("positive", 2.6),
    ("best", 3.2), ("higher", 0.8), ("beat", 1.2), ("beats", 1.2),
    // negative
    ("bad", -2.5), ("poor", -2.1), ("weak", -1.9), ("weaker", -1.8), ("decline", -1.6),
    ("declines", -1.6), ("declined", -1.6), ("fall", -1.3), ("falls", -1.3), ("fell", -1.3),
    ("drop", -1.1), ("drops", -1.1), ("dropped", -1.1), ("slump", -2.0), ("plunge", -2.2),
    ("plunged", -2.2), ("loss", -1.9), ("losses", -2.0), ("deficit", -1.6), ("debt", -1.2),
    ("bankrupt", -2.8), ("bankruptcy", -2.8), ("crisis", -3.1), ("shortage", -1.9),
    ("outage", -1.8), ("outages", -1.8), ("shutdown", -1.9), ("disruption", -1.9),
    ("disruptions", -1.9), ("delay", -1.3), ("delayed", -1.3), ("delays", -1.3),
    ("cancel", -1.7), ("cancelled", -1.8), ("canceled", -1.8), ("strike", -1.5),
    ("sanctions", -1.7), ("sanction", -1.5), ("war", -2.9), ("conflict", -2.1),
    ("attack", -2.9), ("attacks", -2.9), ("explosion", -2.8), ("fire", -1.4), ("spill", -2.4),
    ("leak", -1.9), ("leaks", -1.9), ("accident", -2.1), ("fatal", -3.0), ("killed", -3.2),
    ("injured", -2.2), ("damage", -2.2), ("damaged", -2.2), ("risk", -1.1), ("risks", -1.1),
    ("warning", -1.4), ("warns", -1.4), ("concern", -1.3), ("concerns", -1.3),
    ("uncertainty", -1.4), ("volatile", -1.6), ("volatility", -1.4), ("fear", -2.2),
    ("fears", -2.2), ("fail", -2.3), ("failed", -2.3), ("failure", -2.3), ("lawsuit", -1.8),
    ("fine", -0.8), ("fined", -1.9), ("penalty", -1.7), ("protest", -1.4), ("protests", -1.4),
    ("pollution", -2.1), ("violation", -2.2), ("worse", -2.1), ("worst", -3.1),
    ("lower", -0.7), ("cut", -1.1), ("cuts", -1.1), ("layoffs", -2.2), ("negative", -2.7),
    ("miss", -1.2), ("missed", -1.2), ("glut", -1.5), ("oversupply", -1.4),
];

/// Multiply the next word's valence up
const BOOSTERS: &[&str] = &[
    "very", "extremely", "highly", "sharply", "significantly", "substantially", "strongly",
    "deeply", "hugely", "massively", "really", "most",
];

/// Multiply the next word's valence down
const DAMPENERS: &[&str] = &[
    "slightly", "somewhat", "marginally", "modestly", "barely", "partly", "little",
];

const NEGATORS: &[&str] = &[
    "not", "no", "never", "none", "nor", "neither", "without", "cannot", "hardly",
];

const BOOST: f64 = 0.293;
const NEGATION_SCALAR: f64 = -0.74;
const NEGATION_WINDOW: usize = 3;
const NORMALIZATION_ALPHA: f64 = 15.0;

/// Valence-lexicon scorer with negation and intensity modifiers
#[derive(Debug, Clone, Default)]
pub struct LexiconSentiment;

impl LexiconSentiment {
    pub fn new() -> Self {
        Self
    }

    fn valence(word: &str) -> Option<f64> {
        LEXICON
            .iter()
            .find(|(w, _)| *w == word)
            .map(|&(_, v)| v)
    }

    /// Raw, unnormalised sum of token valences
    pub fn raw_score(&self, text: &str) -> f64 {
        let tokens = tokenize(text);
        let mut total = 0.0;

        for (i, token) in tokens.iter().enumerate() {
            let Some(mut valence) = Self::valence(token) else {
                continue;
            };

            if i > 0 {
                let previous = tokens[i - 1].as_str();
                let modifier = if BOOSTERS.contains(&previous) {
                    BOOST
                } else if DAMPENERS.contains(&previous) {
                    -BOOST
                } else {
                    0.0
                };
                valence += modifier * valence.signum();
            }

            let negated = (1..=NEGATION_WINDOW)
                .filter(|k| i >= *k)
                .any(|k| is_negator(&tokens[i - k]));
            if negated {
                valence *= NEGATION_SCALAR;
            }

            total += valence;
        }

        total
    }
}

impl SentimentModel for LexiconSentiment {
    fn name(&self) -> &'static str {
        "lexicon"
    }

    fn polarity(&self, text: &str) -> Result<f64> {
        Ok(normalize(self.raw_score(text)))
    }
}

/// Map an unbounded sum into (-1, 1)
fn normalize(score: f64) -> f64 {
    score / (score * score + NORMALIZATION_ALPHA).sqrt()
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|t| t.trim_matches('\''))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn is_negator(token: &str) -> bool {
    NEGATORS.contains(&token) || token.ends_with("n't")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> SentimentScorer {
        SentimentScorer::new(Arc::new(LexiconSentiment::new()))
    }

    #[test]
    fn test_empty_text_is_none_not_zero() {
        assert_eq!(scorer().score(""), None);
        assert_eq!(scorer().score("   \n"), None);
    }

    #[test]
    fn test_neutral_text_is_zero() {
        assert_eq!(scorer().score("The pipeline runs north to the terminal."), Some(0.0));
    }

    #[test]
    fn test_polarity_direction() {
        let positive = scorer().score("Strong growth and record profit this quarter").unwrap();
        let negative = scorer().score("Refinery explosion causes outage and losses").unwrap();
        assert!(positive > 0.0);
        assert!(negative < 0.0);
    }

    #[test]
    fn test_negation_flips_within_window() {
        let lexicon = LexiconSentiment::new();
        assert!(lexicon.raw_score("the outlook is not good") < 0.0);
        assert!(lexicon.raw_score("the project wasn't a failure") > 0.0);
        // negator four tokens back is out of range
        assert!(lexicon.raw_score("not that the outlook is good") > 0.0);
    }

    #[test]
    fn test_boosters_and_dampeners() {
        let lexicon = LexiconSentiment::new();
        let plain = lexicon.raw_score("demand is strong");
        assert!(lexicon.raw_score("demand is very strong") > plain);
        assert!(lexicon.raw_score("demand is slightly strong") < plain);
    }

    #[test]
    fn test_scores_stay_bounded() {
        let text = "great excellent best success win breakthrough ".repeat(50);
        let score = scorer().score(&text).unwrap();
        assert!(score > 0.9 && score < 1.0);
    }

    #[test]
    fn test_unavailable_and_failing_backends() {
        struct Broken;
        impl SentimentModel for Broken {
            fn name(&self) -> &'static str {
                "broken"
            }
            fn polarity(&self, _text: &str) -> Result<f64> {
                Err(crate::Error::Enrichment("model not loaded".into()))
            }
        }
        struct NotANumber;
        impl SentimentModel for NotANumber {
            fn name(&self) -> &'static str {
                "nan"
            }
            fn polarity(&self, _text: &str) -> Result<f64> {
                Ok(f64::NAN)
            }
        }

        assert_eq!(SentimentScorer::unavailable().score("good"), None);
        assert_eq!(SentimentScorer::new(Arc::new(Broken)).score("good"), None);
        assert_eq!(SentimentScorer::new(Arc::new(NotANumber)).score("good"), None);
    }
}
