pub mod channel;
pub mod listing;

pub use channel::*;
pub use listing::*;

/// Prefix that flags listings from the no-fee search.
pub const TAX_FREE_TAG: &str = "‼️ БЕЗ КОМІСІЇ ‼️\n";

/// Only listings whose location/date text contains this are kept.
pub const LOCALITY: &str = "Луцьк";

pub const DEFAULT_SITE_ORIGIN: &str = "https://www.olx.ua";
