use serde::{Deserialize, Serialize};

/// One ad card extracted from a listing page.
///
/// `price` and `date` are kept exactly as the page renders them; `date` carries
/// both the location and the posting date because the site does not separate them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub title: String,
    pub price: String,
    pub date: String,
    pub url: String,
}

impl Listing {
    /// Deduplication identity. Only the absolute URL participates.
    pub fn id(&self) -> &str {
        &self.url
    }

    pub fn is_in(&self, locality: &str) -> bool {
        self.date.contains(locality)
    }
}
