use std::path::Path;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use super::{unique_case_insensitive, Entities};
use crate::{Error, Result};

/// Entity categories a recognizer can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityLabel {
    /// Companies, agencies, institutions
    Org,
    /// Countries, states, cities
    Gpe,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMention {
    pub text: String,
    pub label: EntityLabel,
    /// Byte offset in the analysed text
    pub start: usize,
}

/// Named-entity recognition backend
pub trait EntityRecognizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Mentions in text order
    fn recognize(&self, text: &str) -> Result<Vec<EntityMention>>;
}

/// Organization/place extraction over an optional backend
#[derive(Clone)]
pub struct EntityExtractor {
    backend: Option<Arc<dyn EntityRecognizer>>,
}

impl EntityExtractor {
    pub fn new(backend: Arc<dyn EntityRecognizer>) -> Self {
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

    /// Organizations and places in `title + "\n" + text`, deduplicated case-insensitively
    pub fn extract(&self, text: &str, title: &str) -> Entities {
        let Some(backend) = &self.backend else {
            return Entities::default();
        };

        let document = match (title.trim().is_empty(), text.trim().is_empty()) {
            (true, true) => return Entities::default(),
            (false, true) => title.to_string(),
            (true, false) => text.to_string(),
            (false, false) => format!("{}\n{}", title, text),
        };

        let mentions = match backend.recognize(&document) {
            Ok(mentions) => mentions,
            Err(e) => {
                tracing::warn!(backend = backend.name(), error = %e, "Entity recognition failed");
                return Entities::default();
            }
        };

        let mut org = Vec::new();
        let mut gpe = Vec::new();
        for mention in mentions {
            match mention.label {
                EntityLabel::Org => org.push(mention.text),
                EntityLabel::Gpe => gpe.push(mention.text),
                EntityLabel::Other => {}
            }
        }

        Entities {
            org: unique_case_insensitive(org),
            gpe: unique_case_insensitive(gpe),
        }
    }
}

const BUILTIN_ORGS: &[&str] = &[
    // supermajors and large integrateds
    "ExxonMobil", "Exxon", "Chevron", "Shell", "BP", "TotalEnergies", "Eni", "Equinor",
    "ConocoPhillips", "Occidental Petroleum", "Oxy", "Repsol", "OMV", "Galp",
    // national oil companies
    "Saudi Aramco", "Aramco", "ADNOC", "QatarEnergy", "Petrobras", "Petronas", "Pemex",
    "Ecopetrol", "Sinopec", "PetroChina", "CNPC", "CNOOC", "Rosneft", "Gazprom", "Lukoil",
    "Kuwait Petroleum Corporation", "Sonatrach", "NNPC", "ONGC", "Pertamina",
    // midstream and LNG
    "Enbridge", "Williams", "Kinder Morgan", "TC Energy", "Cheniere", "Cheniere Energy",
    "Sempra", "Sempra Infrastructure", "Tellurian", "Venture Global", "Energy Transfer",
    "Novatek",
    // services and EPC
    "SLB", "Schlumberger", "Halliburton", "Baker Hughes", "Saipem", "Wood", "McDermott",
    "Subsea7", "TechnipFMC", "Technip Energies", "Transocean", "Valaris", "Noble Corporation",
    // APAC and Europe independents
    "Woodside", "Woodside Energy", "Santos", "Origin Energy", "INPEX", "Var Energi",
    "Harbour Energy", "Neptune Energy", "Tullow Oil", "Kosmos Energy", "Aker BP", "Orsted",
    "Vattenfall", "RWE", "Iberdrola", "Enel", "EDF", "Engie", "NextEra Energy",
    // US independents
    "Pioneer Natural Resources", "Devon Energy", "EOG Resources", "Diamondback Energy",
    "Hess", "Marathon Oil", "Apache", "APA Corporation", "Coterra", "EQT",
    // institutions and agencies
    "OPEC", "OPEC+", "IEA", "EIA", "International Energy Agency",
    "Energy Information Administration", "Department of Energy", "DOE", "FERC",
    "European Commission", "European Union", "World Bank", "IMF", "United Nations",
    "Reuters", "Bloomberg", "S&P Global", "Platts", "Argus", "Wood Mackenzie", "Rystad Energy",
];

/// Organization names that are also ordinary words; only their capitalised form counts
const COMMON_WORD_ORGS: &[&str] = &[
    "Shell", "Wood", "Williams", "Apache", "Hess", "Santos", "Oxy", "Noble Corporation",
    "Origin Energy", "Energy Transfer", "Venture Global",
];

const BUILTIN_GPES: &[&str] = &[
    // countries
    "United States", "USA", "US", "U.S.", "Canada", "Mexico", "Brazil", "Argentina", "Guyana",
    "Venezuela", "Colombia", "Suriname", "United Kingdom", "UK", "Britain", "Norway",
    "Netherlands", "Germany", "France", "Italy", "Spain", "Portugal", "Poland", "Denmark",
    "Russia", "Ukraine", "Turkey", "Kazakhstan", "Azerbaijan", "Saudi Arabia",
    "United Arab Emirates", "UAE", "Qatar", "Kuwait", "Iraq", "Iran", "Oman", "Israel", "Egypt",
    "Libya", "Algeria", "Nigeria", "Angola", "Mozambique", "Namibia", "South Africa", "China",
    "India", "Japan", "South Korea", "Indonesia", "Malaysia", "Singapore", "Vietnam",
    "Australia", "New Zealand", "Europe", "Asia", "Africa", "Middle East",
    // US states and basins
    "Texas", "Louisiana", "Oklahoma", "New Mexico", "North Dakota", "Alaska", "California",
    "Colorado", "Pennsylvania", "Wyoming", "Gulf of Mexico", "North Sea", "Permian",
    // cities
    "Houston", "Calgary", "London", "Aberdeen", "Stavanger", "Oslo", "Paris", "Rome",
    "Vienna", "Moscow", "Riyadh", "Dubai", "Abu Dhabi", "Doha", "Beijing", "Shanghai",
    "Tokyo", "Singapore City", "Perth", "Sydney", "Rio de Janeiro", "Washington",
    "New York", "Brussels",
];

/// Capitalised phrase ending in a corporate suffix ("Talos Energy", "Wood Group plc")
static CORPORATE_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:[A-Z][A-Za-z0-9&'-]*[ \t]+){1,3}(?:Energy|Petroleum|Resources|Holdings|Corporation|Corp|Inc|Ltd|Limited|plc|PLC|Group|Partners|Midstream|Exploration|Drilling)\b",
    )
    .expect("valid regex")
});

/// Sentence-initial words that are not part of a company name
const LEADING_STOPWORDS: &[&str] = &[
    "The", "A", "An", "In", "On", "At", "For", "And", "But", "Its", "This", "That", "By",
    "From", "With", "As", "Of", "To", "While", "After", "Before", "Meanwhile", "Shares",
];

/// Rule-based recognizer: gazetteer lookup plus a corporate-suffix heuristic
pub struct GazetteerRecognizer {
    org: Option<Regex>,
    gpe: Option<Regex>,
}

impl GazetteerRecognizer {
    pub fn new(orgs: &[String], gpes: &[String]) -> Result<Self> {
        Ok(Self {
            org: build_pattern(orgs, COMMON_WORD_ORGS)?,
            gpe: build_pattern(gpes, &[])?,
        })
    }

    pub fn builtin() -> Result<Self> {
        let (orgs, gpes) = builtin_terms();
        Self::new(&orgs, &gpes)
    }

    /// Built-in gazetteer extended with a JSON file `{"org": [...], "gpe": [...]}`
    pub fn with_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let extra = Entities::from_json(&content)?;

        let (mut orgs, mut gpes) = builtin_terms();
        orgs.extend(extra.org);
        gpes.extend(extra.gpe);

        tracing::info!(path = %path.display(), orgs = orgs.len(), gpes = gpes.len(), "Loaded gazetteer");
        Self::new(&orgs, &gpes)
    }
}

impl EntityRecognizer for GazetteerRecognizer {
    fn name(&self) -> &'static str {
        "gazetteer"
    }

    fn recognize(&self, text: &str) -> Result<Vec<EntityMention>> {
        let mut mentions = Vec::new();

        for (regex, label) in [(&self.org, EntityLabel::Org), (&self.gpe, EntityLabel::Gpe)] {
            if let Some(regex) = regex {
                mentions.extend(regex.find_iter(text).map(|m| EntityMention {
                    text: m.as_str().to_string(),
                    label,
                    start: m.start(),
                }));
            }
        }

        let known: Vec<(usize, usize)> = mentions
            .iter()
            .map(|m| (m.start, m.start + m.text.len()))
            .collect();

        for candidate in CORPORATE_SUFFIX_RE.find_iter(text) {
            let overlaps = known
                .iter()
                .any(|&(start, end)| candidate.start() < end && start < candidate.end());
            if overlaps {
                continue;
            }
            if let Some((offset, name)) = strip_leading_stopwords(candidate.as_str()) {
                mentions.push(EntityMention {
                    text: name.to_string(),
                    label: EntityLabel::Org,
                    start: candidate.start() + offset,
                });
            }
        }

        mentions.sort_by_key(|m| m.start);
        Ok(mentions)
    }
}

fn builtin_terms() -> (Vec<String>, Vec<String>) {
    (
        BUILTIN_ORGS.iter().map(|s| s.to_string()).collect(),
        BUILTIN_GPES.iter().map(|s| s.to_string()).collect(),
    )
}

/// Whole-word alternation, longest terms first. All-caps acronyms and `exact` terms
/// match case-sensitively, everything else case-insensitively.
fn build_pattern(terms: &[String], exact: &[&str]) -> Result<Option<Regex>> {
    let mut terms: Vec<&str> = terms
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();
    if terms.is_empty() {
        return Ok(None);
    }
    terms.sort_by_key(|t| std::cmp::Reverse(t.len()));
    terms.dedup();

    let case_sensitive = |t: &str| t.chars().all(|c| !c.is_lowercase()) || exact.contains(&t);

    let branches: Vec<String> = terms
        .into_iter()
        .map(|t| {
            // Terms may end in punctuation ("OPEC+", "U.S."), where a trailing \b would never match
            let edge = if t.ends_with(|c: char| c.is_alphanumeric()) { r"\b" } else { "" };
            let term = regex::escape(t);
            if case_sensitive(t) {
                format!("{}{}", term, edge)
            } else {
                format!("(?i:{}){}", term, edge)
            }
        })
        .collect();

    let pattern = format!(r"\b(?:{})", branches.join("|"));
    let regex = Regex::new(&pattern).map_err(|e| Error::Enrichment(e.to_string()))?;
    Ok(Some(regex))
}

/// Drop leading stopwords; `None` if only the suffix would remain
fn strip_leading_stopwords(candidate: &str) -> Option<(usize, &str)> {
    let mut rest = candidate;
    let mut offset = 0;

    loop {
        let (word, tail) = rest.split_once(char::is_whitespace)?;
        if !LEADING_STOPWORDS.contains(&word) {
            break;
        }
        let trimmed = tail.trim_start();
        offset += rest.len() - trimmed.len();
        rest = trimmed;
    }

    Some((offset, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> EntityExtractor {
        EntityExtractor::new(Arc::new(GazetteerRecognizer::builtin().unwrap()))
    }

    #[test]
    fn test_case_insensitive_dedup_keeps_first_casing() {
        let entities = extractor().extract(
            "ExxonMobil announced a deal in Texas and Exxonmobil confirmed it",
            "",
        );
        assert_eq!(entities.org, vec!["ExxonMobil"]);
        assert!(entities.gpe.contains(&"Texas".to_string()));
    }

    #[test]
    fn test_title_comes_first() {
        let entities = extractor().extract("Shell and Petrobras sign deal.", "Equinor in Brazil");
        assert_eq!(entities.org, vec!["Equinor", "Shell", "Petrobras"]);
        assert_eq!(entities.gpe, vec!["Brazil"]);
    }

    #[test]
    fn test_corporate_suffix_heuristic() {
        let entities = extractor().extract(
            "Talos Energy and Kosmos Energy signed a farm-in off Mexico. The Energy Department said nothing.",
            "",
        );
        assert_eq!(entities.org, vec!["Talos Energy", "Kosmos Energy"]);
        assert_eq!(entities.gpe, vec!["Mexico"]);
    }

    #[test]
    fn test_acronyms_are_case_sensitive() {
        let entities = extractor().extract("The bp of the engine was high in us.", "");
        assert!(entities.org.is_empty());
        assert!(entities.gpe.is_empty());

        let entities = extractor().extract("OPEC+ met as BP raised output in the US.", "");
        assert_eq!(entities.org, vec!["OPEC+", "BP"]);
        assert_eq!(entities.gpe, vec!["US"]);
    }

    #[test]
    fn test_empty_input_and_unavailable_backend() {
        assert!(extractor().extract("", "  ").is_empty());
        assert!(EntityExtractor::unavailable()
            .extract("ExxonMobil in Texas", "")
            .is_empty());
    }

    #[test]
    fn test_other_labels_are_discarded() {
        struct Fixed;
        impl EntityRecognizer for Fixed {
            fn name(&self) -> &'static str {
                "fixed"
            }
            fn recognize(&self, _text: &str) -> Result<Vec<EntityMention>> {
                Ok(vec![
                    EntityMention { text: "Monday".into(), label: EntityLabel::Other, start: 0 },
                    EntityMention { text: "Eni".into(), label: EntityLabel::Org, start: 7 },
                ])
            }
        }

        let entities = EntityExtractor::new(Arc::new(Fixed)).extract("Monday Eni", "");
        assert_eq!(entities.org, vec!["Eni"]);
        assert!(entities.gpe.is_empty());
    }

    #[test]
    fn test_gazetteer_file_extends_builtin() {
        let dir = std::env::temp_dir().join(format!("petropulse-gaz-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("gazetteer.json");
        std::fs::write(&path, r#"{"org": ["Ithaca Energy"], "gpe": ["Shetland"]}"#).unwrap();

        let recognizer = GazetteerRecognizer::with_file(&path).unwrap();
        let entities = EntityExtractor::new(Arc::new(recognizer))
            .extract("Ithaca Energy drills west of Shetland for Chevron.", "");
        assert_eq!(entities.org, vec!["Ithaca Energy", "Chevron"]);
        assert_eq!(entities.gpe, vec!["Shetland"]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_common_word_orgs_need_capitals() {
        let entities = extractor().extract(
            "The news was a bombshell for wood pellet makers, and the shell company paid apache fees.",
            "",
        );
        assert!(entities.org.is_empty(), "{:?}", entities.org);

        let entities = extractor().extract("Shell hired Wood Mackenzie while Wood bid for Santos.", "");
        assert_eq!(entities.org, vec!["Shell", "Wood Mackenzie", "Wood", "Santos"]);
    }
}
