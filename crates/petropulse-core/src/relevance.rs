//! Energy-domain relevance filter.

/// Bumped whenever `ENERGY_VOCABULARY` changes, so stored batches can be traced to a list
pub const VOCABULARY_VERSION: &str = "2024.2";

/// Canonical lowercase vocabulary
pub const ENERGY_VOCABULARY: &[&str] = &[
    // upstream
    "oil", "gas", "petroleum", "exploration", "production", "drilling", "completion",
    "fracturing", "hydraulic fracturing", "reservoir", "reservoir engineering", "perforation",
    "wellbore", "wellhead", "well logging", "well intervention", "well completion", "upstream",
    "midstream", "downstream", "flaring", "flaring reduction", "seismic", "seismic surveys",
    "mudlogging", "production optimization", "enhanced oil recovery", "shale gas", "oil sands",
    "deepwater", "offshore", "onshore", "offshore drilling", "directional drilling",
    "digital oilfield", "permian basin",
    // equipment and operations
    "pipeline", "pipeline transportation", "pipeline safety", "compressor", "compressor stations",
    "separator", "flow assurance", "subsea", "fpso", "platform", "casing", "coiled tubing",
    "metering and scada", "crude transport", "turnarounds",
    // gas, lng, hydrogen and storage
    "natural gas", "liquefied natural gas", "methane", "lng", "lng export", "cng",
    "gas processing", "hydrogen", "hydrogen blending", "blue hydrogen", "green hydrogen",
    "underground hydrogen storage", "salt cavern", "gas storage", "storage",
    "strategic petroleum reserve", "strategic reserve", "sour gas", "sweet gas",
    // refining and products
    "refinery", "refining", "petrochemicals", "retail fuels", "sulfur recovery",
    "crude oil pricing", "trading and supply",
    // renewables and transition
    "renewables", "solar", "solar integration", "wind", "wind energy", "photovoltaic",
    "photovoltaics", "geothermal", "tidal", "tidal energy", "biomass", "biofuels",
    "hybrid energy systems", "clean energy", "green energy", "energy transition",
    "decarbonization", "sustainability", "net zero", "energy mix", "renewable integration",
    // carbon and climate
    "carbon", "ccs", "ccus", "carbon capture", "carbon dioxide", "co2 storage",
    "co2 sequestration", "carbon footprint", "carbon trading", "carbon markets",
    "carbon intensity", "methane emissions", "greenhouse gas", "ghg emissions", "climate change",
    // power and grid
    "energy", "power", "electricity", "smart grid", "energy efficiency", "load forecasting",
    "grid resilience", "power generation", "distributed energy",
    // digital
    "ai in energy", "artificial intelligence", "machine learning", "data science",
    "digital twin", "iot in energy", "internet of things", "cloud", "edge computing",
    "predictive maintenance", "remote monitoring", "data-driven", "big data", "analytics",
    "deep learning", "robotics", "automation", "image analysis", "remote sensing",
    "subsurface modeling", "blockchain in oil and gas",
    // subsurface science
    "core flooding", "porosity", "permeability", "petrophysics", "fluid saturation",
    "capillary pressure", "formation damage", "asphaltene", "wax deposition",
    // policy, markets and investment
    "oil price", "oil prices", "brent", "wti", "energy policy", "opec", "iea",
    "supply chain", "energy markets", "energy security", "subsidy", "inflation reduction act",
    "energy bill", "fossil fuel", "energy investment",
    // esg
    "esg", "environmental social governance", "safety", "hse", "emissions reporting",
    "carbon disclosure", "environmental compliance", "energy innovation", "workforce transition",
    "digital transformation", "energy workforce",
];

/// Keyword classifier over title + summary + body.
///
/// A text is relevant iff some term is a case-insensitive substring of it.
#[derive(Debug, Clone)]
pub struct RelevanceFilter {
    terms: Vec<String>,
}

impl Default for RelevanceFilter {
    fn default() -> Self {
        let mut filter = Self { terms: Vec::new() };
        for term in ENERGY_VOCABULARY {
            filter.add_term(term);
        }
        filter
    }
}

impl RelevanceFilter {
    fn add_term(&mut self, term: &str) {
        let term = term.trim().to_lowercase();
        if !term.is_empty() && !self.terms.contains(&term) {
            self.terms.push(term);
        }
    }

    /// Canonical vocabulary plus configured terms
    pub fn with_extra_keywords(mut self, extra: &[String]) -> Self {
        for term in extra {
            self.add_term(term);
        }
        self
    }

    pub fn is_relevant(&self, text: &str) -> bool {
        self.matched_keyword(text).is_some()
    }

    /// First vocabulary term found in `text`
    pub fn matched_keyword(&self, text: &str) -> Option<&str> {
        if text.trim().is_empty() {
            return None;
        }
        let lowered = text.to_lowercase();
        self.terms
            .iter()
            .find(|term| lowered.contains(term.as_str()))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Title, summary and body joined the way the filter sees them
pub fn combined_text(title: &str, summary: &str, body: &str) -> String {
    [title, summary, body]
        .iter()
        .filter(|part| !part.trim().is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_without_keywords_is_rejected() {
        let filter = RelevanceFilter::default();
        assert!(!filter.is_relevant("The museum opened a new wing for modern sculpture."));
        assert!(!filter.is_relevant(""));
    }

    #[test]
    fn test_single_keyword_any_case_is_accepted() {
        let filter = RelevanceFilter::default();
        assert!(filter.is_relevant("Offshore"));
        assert_eq!(filter.matched_keyword("OFFSHORE"), Some("offshore"));
    }

    #[test]
    fn test_terms_match_inside_longer_words() {
        let filter = RelevanceFilter::default();
        assert_eq!(filter.matched_keyword("Gasoline prices rise"), Some("gas"));
        assert_eq!(filter.matched_keyword("Oilfield services demand climbs"), Some("oil"));
        assert!(filter.is_relevant("Shale-gas output"));
        assert!(filter.is_relevant("Asian LNG spot prices slipped."));
    }

    #[test]
    fn test_ambiguous_short_terms_are_not_in_vocabulary() {
        for term in ["ai", "ml", "h2", "uhs", "ira", "epc", "rig", "iot"] {
            assert!(!ENERGY_VOCABULARY.contains(&term), "{term} should not be a bare term");
        }
        let filter = RelevanceFilter::default();
        assert!(!filter.is_relevant("The mayor said the bright origin story was a riot."));
    }

    #[test]
    fn test_extra_keywords() {
        let filter = RelevanceFilter::default()
            .with_extra_keywords(&["Uranium".to_string(), " ".to_string()]);
        assert!(filter.is_relevant("Kazakh uranium output rises"));
        assert_eq!(filter.len(), RelevanceFilter::default().len() + 1);
    }

    #[test]
    fn test_vocabulary_is_large_and_lowercase() {
        assert!(ENERGY_VOCABULARY.len() >= 100);
        assert!(ENERGY_VOCABULARY.iter().all(|t| *t == t.to_lowercase()));
    }

    #[test]
    fn test_combined_text_skips_blank_parts() {
        assert_eq!(combined_text("Title", "", "Body"), "Title Body");
    }
}
