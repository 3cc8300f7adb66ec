//! Prints how many elements each listing-page selector matches, to spot markup drift.
//!
//! Usage: `analyze_html <url-or-file>`

use anyhow::{bail, Context, Result};
use reqwest::Client;
use scraper::{Html, Selector};
use std::fs;

const SELECTORS: [&str; 6] = [
    r#"div[data-testid="listing-grid"]"#,
    r#"div[data-testid="listing-grid"] div[data-cy="l-card"]"#,
    r#"div[data-cy="l-card"] h4"#,
    r#"div[data-cy="l-card"] a[href]"#,
    r#"div[data-cy="l-card"] p[data-testid="ad-price"]"#,
    r#"div[data-cy="l-card"] p[data-testid="location-date"]"#,
];

#[tokio::main]
async fn main() -> Result<()> {
    let Some(target) = std::env::args().nth(1) else {
        bail!("usage: analyze_html <url-or-file>");
    };

    let html = if target.starts_with("http://") || target.starts_with("https://") {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36")
            .build()?;

        println!("Fetching {}...", target);
        let html = client
            .get(&target)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        fs::write("olx_sample.html", &html)?;
        println!("Saved page to olx_sample.html");
        html
    } else {
        fs::read_to_string(&target).with_context(|| format!("Failed to read {}", target))?
    };

    let document = Html::parse_document(&html);

    for css in SELECTORS {
        let selector = Selector::parse(css).map_err(|e| anyhow::anyhow!("{}: {:?}", css, e))?;
        println!("{:>4}  {}", document.select(&selector).count(), css);
    }

    // Show the location/date text of the first few cards
    let location = Selector::parse(r#"p[data-testid="location-date"]"#)
        .map_err(|e| anyhow::anyhow!("{:?}", e))?;
    for (i, element) in document.select(&location).take(5).enumerate() {
        let text = element.text().collect::<String>();
        println!("  [{}] {}", i + 1, text.split_whitespace().collect::<Vec<_>>().join(" "));
    }

    Ok(())
}
