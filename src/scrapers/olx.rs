use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::error::ExtractError;
use crate::models::{Listing, LOCALITY};
use crate::parsers::{absolute_url, clean_text};

// Selection is keyed on data attributes, which survive restyling of the page.
static LISTING_GRID: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"div[data-testid="listing-grid"]"#).expect("Invalid listing grid selector")
});
static LISTING_CARD: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"div[data-testid="listing-grid"] div[data-cy="l-card"]"#)
        .expect("Invalid listing card selector")
});
static TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h4").expect("Invalid title selector"));
static PRICE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"p[data-testid="ad-price"]"#).expect("Invalid price selector")
});
static LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("Invalid link selector"));
static LOCATION_DATE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"p[data-testid="location-date"]"#).expect("Invalid location/date selector")
});

/// Turns an OLX search results page into [`Listing`]s located in [`LOCALITY`].
#[derive(Debug, Clone)]
pub struct ListingExtractor {
    origin: String,
    locality: String,
}

impl ListingExtractor {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            locality: LOCALITY.to_string(),
        }
    }

    /// Lazily yields the kept listings of `document` in document order.
    ///
    /// Cards missing a price or date produce empty strings for those fields;
    /// only the locality substring decides whether a card is kept.
    pub fn extract<'a>(
        &'a self,
        document: &'a Html,
    ) -> Result<impl Iterator<Item = Listing> + 'a, ExtractError> {
        if document.select(&LISTING_GRID).next().is_none() {
            return Err(ExtractError::MissingListingGrid);
        }

        Ok(document
            .select(&LISTING_CARD)
            .filter_map(move |card| self.parse_card(card))
            .filter(move |listing| listing.is_in(&self.locality)))
    }

    /// Parses `html` and drains [`extract`](Self::extract) so that no DOM outlives the call.
    pub fn extract_page(&self, html: &str) -> Result<Vec<Listing>, ExtractError> {
        let document = Html::parse_document(html);
        let listings: Vec<Listing> = self.extract(&document)?.collect();
        Ok(listings)
    }

    fn parse_card(&self, card: ElementRef<'_>) -> Option<Listing> {
        let href = card
            .select(&LINK)
            .next()
            .and_then(|link| link.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty());

        let Some(href) = href else {
            debug!("Skipping listing card without a link");
            return None;
        };

        Some(Listing {
            title: first_text(card, &TITLE),
            price: first_text(card, &PRICE),
            date: first_text(card, &LOCATION_DATE),
            url: absolute_url(&self.origin, href),
        })
    }
}

fn first_text(card: ElementRef<'_>, selector: &Selector) -> String {
    card.select(selector)
        .next()
        .map(|element| clean_text(&element.text().collect::<String>()))
        .unwrap_or_default()
}
