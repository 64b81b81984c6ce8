use anyhow::Result;

use petropulse_core::{
    feed::{FeedCategory, FeedRegistry},
    AppConfig,
};

pub fn run(config: &AppConfig, category: Option<&str>) -> Result<()> {
    let registry = FeedRegistry::from_config(config)?;

    let categories: Vec<FeedCategory> = match category {
        Some(name) => vec![name.parse()?],
        None => FeedCategory::ALL.to_vec(),
    };

    println!("Feeds ({}):", registry.len());

    for category in categories {
        let feeds = registry.by_category(category);
        if feeds.is_empty() {
            continue;
        }

        println!("\n  {} ({}):", category, feeds.len());
        for feed in feeds {
            match &feed.name {
                Some(name) => println!("    {} <{}>", name, feed.url),
                None => println!("    {}", feed.url),
            }
        }
    }

    Ok(())
}
