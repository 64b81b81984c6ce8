//! Static catalog of energy-sector feeds.

use std::collections::HashSet;
use std::path::Path;

use super::models::{FeedCategory, FeedSource};
use super::opml::parse_opml_file;
use crate::config::AppConfig;
use crate::Result;

const GOVERNMENT_DATA: &[&str] = &[
    "https://www.eia.gov/rss/todayinenergy.xml",
    "https://www.eia.gov/rss/whatsnew.xml",
    "https://www.iea.org/rss/news.xml",
    "https://www.iea.org/rss/pressreleases.xml",
];

const MAJOR_WIRES: &[&str] = &[
    "https://www.reuters.com/markets/commodities/rss",
    "https://www.cnbc.com/id/10000113/device/rss/rss.html",
    "https://www.ft.com/companies/energy?format=rss",
    "https://www.ft.com/world?format=rss",
    "https://www.bbc.co.uk/news/business/rss.xml",
    "https://www.bbc.co.uk/news/world/rss.xml",
    "https://www.economist.com/business/rss.xml",
];

const INDUSTRY_CORE: &[&str] = &[
    "https://www.ogj.com/__rss/rss2.xml",
    "https://www.worldoil.com/rss/",
    "https://www.rigzone.com/news/rss/",
    "https://www.offshore-energy.biz/feed/",
    "https://www.offshore-mag.com/__rss/rss2.xml",
    "https://www.jpt.spe.org/rss.xml",
    "https://pubs.spe.org/twa/rss",
    "https://www.upstreamonline.com/rss",
    "https://www.hartenergy.com/rss.xml",
    "https://www.energyvoice.com/feed/",
    "https://www.argusmedia.com/rss",
    "https://www.plattslive.com/feed",
];

const LNG_SHIPPING: &[&str] = &[
    "https://www.lngindustry.com/rss",
    "https://splash247.com/feed/",
    "https://gcaptain.com/feed/",
    "https://www.offshorewind.biz/feed/",
];

const UTILITIES_RENEWABLES: &[&str] = &[
    "https://www.utilitydive.com/feeds/news/",
    "https://www.pv-tech.org/feed/",
    "https://www.windpowermonthly.com/rss",
];

const COMPANY_SUPERMAJORS: &[&str] = &[
    "https://corporate.exxonmobil.com/en/company/news/newsroom.rss",
    "https://www.shell.com/media/news-and-media-releases/_jcr_content/par/list.feed",
    "https://www.bp.com/en/global/corporate/news-and-insights/_jcr_content/par/section/section_0/teaser_list.feed",
    "https://www.totalenergies.com/media/news/newsroom/rss",
    "https://www.chevron.com/rss/press-releases",
    "https://www.eni.com/en-IT/media/press-releases.rss",
    "https://www.equinor.com/news.rss",
    "https://www.conocophillips.com/newsroom/rss/",
    "https://www.oxy.com/newsroom/press-releases/feed/",
];

const COMPANY_NOC: &[&str] = &[
    "https://www.saudiaramco.com/en/news/rss",
    "https://www.adnoc.ae/media-center/rss",
    "https://www.petrobras.com.br/en/press-center/news/feed/",
    "https://www.qatarenergy.qa/en/MediaCenter/Pages/press-releases.aspx?rss=1",
    "https://www.petronas.com/rss.xml",
    "https://www.repsol.com/en/press-room/_jcr_content.feed",
    "https://www.omv.com/en/news/press-releases?format=rss",
    "https://www.ecopetrol.com.co/wps/portal/ecopetrol-web/rss/noticias",
    "https://www.pemex.com/en/rss/news.xml",
];

const COMPANY_MIDSTREAM_LNG: &[&str] = &[
    "https://www.enbridge.com/media-center/rss",
    "https://www.williams.com/feed/",
    "https://www.kindermorgan.com/rss/press-releases",
    "https://www.tcenergy.com/siteassets/rss/news.xml",
    "https://www.cheniere.com/rss/press-releases.xml",
    "https://semprainfrastructure.com/feed/",
    "https://www.tellurianinc.com/feed/",
];

const COMPANY_OFS_EPC: &[&str] = &[
    "https://investors.slb.com/news-releases/rss",
    "https://ir.halliburton.com/rss/press-releases.xml",
    "https://investors.bakerhughes.com/news-releases/rss",
    "https://www.saipem.com/en/media/press-releases/feed",
    "https://www.woodplc.com/news/rss",
    "https://www.mcdermott.com/rss/news.xml",
    "https://www.subsea7.com/en/media/press-releases/_jcr_content.feed",
    "https://www.technipfmc.com/media/press-releases/_jcr_content.feed",
];

const COMPANY_APAC_AUS: &[&str] = &[
    "https://www.woodside.com/newsroom/_jcr_content.feed",
    "https://www.santos.com/news/_jcr_content.feed",
    "https://www.originenergy.com.au/blog/feed/",
    "https://www.inpex.co.jp/english/news/feed/",
    "https://www.cnooc.com.cn/data/rss/englishNews.xml",
];

const COMPANY_EU_INDEPENDENTS: &[&str] = &[
    "https://www.varenergi.no/feed/",
    "https://www.harbourenergy.com/media-centre/_jcr_content.feed",
    "https://www.neptunenergy.com/newsroom/_jcr_content.feed",
    "https://www.tullowoil.com/media-feed.xml",
    "https://www.kosmosenergy.com/feed/",
];

fn urls_for(category: FeedCategory) -> &'static [&'static str] {
    match category {
        FeedCategory::GovernmentData => GOVERNMENT_DATA,
        FeedCategory::MajorWires => MAJOR_WIRES,
        FeedCategory::IndustryCore => INDUSTRY_CORE,
        FeedCategory::LngShipping => LNG_SHIPPING,
        FeedCategory::UtilitiesRenewables => UTILITIES_RENEWABLES,
        FeedCategory::CompanySupermajors => COMPANY_SUPERMAJORS,
        FeedCategory::CompanyNoc => COMPANY_NOC,
        FeedCategory::CompanyMidstreamLng => COMPANY_MIDSTREAM_LNG,
        FeedCategory::CompanyOfsEpc => COMPANY_OFS_EPC,
        FeedCategory::CompanyApacAus => COMPANY_APAC_AUS,
        FeedCategory::CompanyEuIndependents => COMPANY_EU_INDEPENDENTS,
        FeedCategory::Custom => &[],
    }
}

/// Immutable set of feeds for one run
#[derive(Debug, Clone, Default)]
pub struct FeedRegistry {
    feeds: Vec<FeedSource>,
}

impl FeedRegistry {
    /// The built-in catalog, in category order
    pub fn default_feeds() -> Self {
        let feeds = FeedCategory::ALL
            .iter()
            .flat_map(|&category| {
                urls_for(category)
                    .iter()
                    .map(move |url| FeedSource::new(category, *url))
            })
            .collect();
        Self { feeds }
    }

    /// The catalog plus the configured OPML feeds, narrowed to the configured categories
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let mut registry = Self::default_feeds();
        if let Some(path) = &config.fetch.opml_path {
            registry = registry.with_opml(path)?;
        }

        let categories = config
            .fetch
            .categories
            .iter()
            .map(|name| name.parse())
            .collect::<Result<Vec<FeedCategory>>>()?;
        Ok(registry.filter_categories(&categories))
    }

    pub fn from_sources(feeds: Vec<FeedSource>) -> Self {
        Self { feeds }
    }

    /// Append feeds from an OPML file as `Custom`, skipping URLs already present
    pub fn with_opml(mut self, path: &Path) -> Result<Self> {
        let imported = parse_opml_file(path)?;
        let mut seen: HashSet<String> = self.feeds.iter().map(|f| f.url.clone()).collect();

        let mut added = 0usize;
        for feed in imported {
            if seen.insert(feed.url.clone()) {
                let category = opml_category(feed.group.as_deref());
                self.feeds.push(FeedSource::new(category, feed.url).with_name(feed.name));
                added += 1;
            }
        }

        tracing::info!(added, path = %path.display(), "Imported feeds from OPML");
        Ok(self)
    }

    /// Keep only feeds in the given categories; an empty list keeps everything
    pub fn filter_categories(mut self, categories: &[FeedCategory]) -> Self {
        if !categories.is_empty() {
            self.feeds.retain(|f| categories.contains(&f.category));
        }
        self
    }

    pub fn by_category(&self, category: FeedCategory) -> Vec<&FeedSource> {
        self.feeds.iter().filter(|f| f.category == category).collect()
    }

    pub fn feeds(&self) -> &[FeedSource] {
        &self.feeds
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }
}

/// An OPML group named after a registry category files its feeds there
fn opml_category(group: Option<&str>) -> FeedCategory {
    group
        .and_then(|g| g.parse().ok())
        .unwrap_or(FeedCategory::Custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_covers_every_builtin_category() {
        let registry = FeedRegistry::default_feeds();
        assert!(registry.len() > 70);

        for category in FeedCategory::ALL {
            let count = registry.by_category(category).len();
            if category == FeedCategory::Custom {
                assert_eq!(count, 0);
            } else {
                assert!(count > 0, "no feeds for {}", category);
            }
        }
    }

    #[test]
    fn test_default_catalog_has_unique_urls() {
        let registry = FeedRegistry::default_feeds();
        let unique: HashSet<_> = registry.feeds().iter().map(|f| &f.url).collect();
        assert_eq!(unique.len(), registry.len());
    }

    #[test]
    fn test_filter_categories() {
        let registry =
            FeedRegistry::default_feeds().filter_categories(&[FeedCategory::GovernmentData]);
        assert_eq!(registry.len(), GOVERNMENT_DATA.len());
        assert!(registry
            .feeds()
            .iter()
            .all(|f| f.category == FeedCategory::GovernmentData));

        let everything = FeedRegistry::default_feeds().filter_categories(&[]);
        assert_eq!(everything.len(), FeedRegistry::default_feeds().len());
    }

    #[test]
    fn test_from_config_applies_categories() {
        let mut config = AppConfig::default();
        config.fetch.categories = vec!["lng-shipping".to_string()];
        let registry = FeedRegistry::from_config(&config).unwrap();
        assert!(!registry.is_empty());
        assert!(registry.feeds().iter().all(|f| f.category == FeedCategory::LngShipping));

        config.fetch.categories = vec!["not-a-category".to_string()];
        assert!(FeedRegistry::from_config(&config).is_err());
    }

    #[test]
    fn test_with_opml_skips_known_urls() {
        let dir = std::env::temp_dir().join(format!("petropulse-opml-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("feeds.opml");
        std::fs::write(
            &path,
            r#"<?xml version="1.0"?>
<opml version="2.0"><body>
  <outline text="EIA" xmlUrl="https://www.eia.gov/rss/todayinenergy.xml"/>
  <outline text="Local paper" xmlUrl="https://news.example.com/energy.xml"/>
</body></opml>"#,
        )
        .unwrap();

        let base = FeedRegistry::default_feeds();
        let before = base.len();
        let registry = base.with_opml(&path).unwrap();

        assert_eq!(registry.len(), before + 1);
        let custom = registry.by_category(FeedCategory::Custom);
        assert_eq!(custom.len(), 1);
        assert_eq!(custom[0].url, "https://news.example.com/energy.xml");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_with_opml_uses_group_and_name() {
        let dir = std::env::temp_dir().join(format!("petropulse-opml-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("feeds.opml");
        std::fs::write(
            &path,
            r#"<?xml version="1.0"?>
<opml version="2.0"><body>
  <outline text="lng-shipping">
    <outline text="Harbour Gazette" xmlUrl="https://gazette.example.com/lng.xml"/>
  </outline>
  <outline text="Reading list">
    <outline text="Coast Weekly" xmlUrl="https://coast.example.com/rss"/>
  </outline>
</body></opml>"#,
        )
        .unwrap();

        let registry = FeedRegistry::default().with_opml(&path).unwrap();
        assert_eq!(registry.len(), 2);

        let lng = &registry.feeds()[0];
        assert_eq!(lng.category, FeedCategory::LngShipping);
        assert_eq!(lng.name.as_deref(), Some("Harbour Gazette"));

        let other = &registry.feeds()[1];
        assert_eq!(other.category, FeedCategory::Custom);
        assert_eq!(other.name.as_deref(), Some("Coast Weekly"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
