use crate::models::Listing;

/// `<tag><title>\n<price>\n<date>\n<url>`; the tag is inserted verbatim.
pub fn format_message(listing: &Listing, tag: Option<&str>) -> String {
    format!(
        "{}{}\n{}\n{}\n{}",
        tag.unwrap_or(""),
        listing.title,
        listing.price,
        listing.date,
        listing.url
    )
}
