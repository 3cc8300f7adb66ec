//! Scrape, dedupe and notify, one channel after another.
//!
//! Ordering policy is *immediate*: for each listing the seen-set is checked, the
//! notification is sent and the URL is marked seen before the next listing is
//! looked at. If a send succeeds but the mark fails (or the process dies between
//! the two), that single listing is notified again on the next run. Nothing is
//! retried here; the scheduler's next tick is the retry.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::{ChannelError, ListingError};
use crate::models::{Channel, Listing};
use crate::scrapers::{ListingExtractor, PageFetcher};
use crate::storage::SeenStore;
use crate::telegram::{format_message, Notifier};

pub struct Pipeline {
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn SeenStore>,
    notifier: Arc<dyn Notifier>,
    extractor: ListingExtractor,
    channels: Vec<Channel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListingOutcome {
    Notified,
    AlreadySeen,
}

#[derive(Debug)]
pub struct ListingFailure {
    pub url: String,
    pub error: ListingError,
}

/// What happened to one channel during a run.
#[derive(Debug)]
pub struct ChannelReport {
    pub channel: String,
    pub found: usize,
    pub notified: usize,
    pub already_seen: usize,
    pub failures: Vec<ListingFailure>,
    /// Set when the channel was abandoned before its listings were processed.
    pub error: Option<ChannelError>,
}

impl ChannelReport {
    fn new(channel: &str) -> Self {
        Self {
            channel: channel.to_string(),
            found: 0,
            notified: 0,
            already_seen: 0,
            failures: Vec::new(),
            error: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub channels: Vec<ChannelReport>,
}

impl RunSummary {
    pub fn notified(&self) -> usize {
        self.channels.iter().map(|c| c.notified).sum()
    }

    pub fn channel(&self, name: &str) -> Option<&ChannelReport> {
        self.channels.iter().find(|c| c.channel == name)
    }
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<dyn SeenStore>,
        notifier: Arc<dyn Notifier>,
        extractor: ListingExtractor,
        channels: Vec<Channel>,
    ) -> Self {
        Self {
            fetcher,
            store,
            notifier,
            extractor,
            channels,
        }
    }

    /// Processes every channel in configured order. Never fails; problems are
    /// logged and recorded in the returned summary.
    pub async fn run(&self) -> RunSummary {
        let mut summary = RunSummary::default();

        for channel in &self.channels {
            info!("Processing channel: {}", channel.name);
            let mut report = ChannelReport::new(&channel.name);

            if let Err(e) = self.process_channel(channel, &mut report).await {
                error!(channel = %channel.name, "Channel processing failed: {}", e);
                report.error = Some(e);
            } else if report.notified == 0 {
                info!("No new listings on {}", channel.name);
            } else {
                info!("Sent {} new listings from {}", report.notified, channel.name);
            }

            summary.channels.push(report);
        }

        summary
    }

    async fn process_channel(
        &self,
        channel: &Channel,
        report: &mut ChannelReport,
    ) -> Result<(), ChannelError> {
        let html = self.fetcher.fetch(&channel.source_url).await?;
        let listings = self.extractor.extract_page(&html)?;
        report.found = listings.len();
        info!("Found {} matching listings on {}", listings.len(), channel.name);

        // A page can repeat a card; notify each URL at most once per run even
        // if marking it seen failed.
        let mut handled: HashSet<String> = HashSet::new();

        for listing in listings {
            if !handled.insert(listing.url.clone()) {
                debug!("Duplicate card for {} on {}", listing.url, channel.name);
                continue;
            }

            match self.process_listing(channel, &listing).await {
                Ok(ListingOutcome::Notified) => report.notified += 1,
                Ok(ListingOutcome::AlreadySeen) => report.already_seen += 1,
                Err(e) => {
                    match &e {
                        ListingError::MembershipCheck(_) => warn!(
                            channel = %channel.name,
                            "Skipping {} (treated as seen): {}", listing.url, e
                        ),
                        ListingError::Notify(_) => error!(
                            channel = %channel.name,
                            "Not marking {} as seen: {}", listing.url, e
                        ),
                        ListingError::MarkSeen(_) => {
                            report.notified += 1;
                            error!(
                                channel = %channel.name,
                                "Notified {} but {}; it will be notified again next run",
                                listing.url, e
                            )
                        }
                    }
                    report.failures.push(ListingFailure {
                        url: listing.url,
                        error: e,
                    });
                }
            }
        }

        Ok(())
    }

    async fn process_listing(
        &self,
        channel: &Channel,
        listing: &Listing,
    ) -> Result<ListingOutcome, ListingError> {
        let seen = self
            .store
            .is_member(&channel.seen_set_key, listing.id())
            .await
            .map_err(ListingError::MembershipCheck)?;
        if seen {
            return Ok(ListingOutcome::AlreadySeen);
        }

        let text = format_message(listing, channel.message_tag.as_deref());
        info!("New listing found:\n{}", text);
        self.notifier.send(&text).await?;

        self.store
            .add(&channel.seen_set_key, listing.id())
            .await
            .map_err(ListingError::MarkSeen)?;

        Ok(ListingOutcome::Notified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, NotifyError, StoreError};
    use crate::models::TAX_FREE_TAG;
    use crate::storage::SqliteStore;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use reqwest::StatusCode;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const TAX_FREE_URL: &str = "https://www.olx.ua/uk/lutsk/?private=1";
    const REGULAR_URL: &str = "https://www.olx.ua/uk/lutsk/";

    #[derive(Default)]
    struct FakeFetcher {
        pages: HashMap<String, String>,
    }

    impl FakeFetcher {
        fn with_page(mut self, url: &str, html: String) -> Self {
            self.pages.insert(url.to_string(), html);
            self
        }
    }

    #[async_trait]
    impl PageFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.pages.get(url).cloned().ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: StatusCode::SERVICE_UNAVAILABLE,
            })
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<String>>,
        fail_containing: Option<String>,
    }

    impl RecordingNotifier {
        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, text: &str) -> Result<(), NotifyError> {
            if let Some(needle) = &self.fail_containing {
                if text.contains(needle.as_str()) {
                    return Err(NotifyError::Status {
                        status: StatusCode::TOO_MANY_REQUESTS,
                        body: "Too Many Requests".to_string(),
                    });
                }
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    /// Wraps a real store and fails selected operations.
    struct FlakyStore {
        inner: SqliteStore,
        fail_check_for: Option<String>,
        fail_adds: bool,
    }

    #[async_trait]
    impl SeenStore for FlakyStore {
        async fn is_member(&self, key: &str, url: &str) -> Result<bool, StoreError> {
            if self.fail_check_for.as_deref() == Some(url) {
                return Err(StoreError::Rejected("connection reset".to_string()));
            }
            self.inner.is_member(key, url).await
        }

        async fn add_all(&self, key: &str, urls: &[String]) -> Result<(), StoreError> {
            if self.fail_adds {
                return Err(StoreError::Rejected("read only replica".to_string()));
            }
            self.inner.add_all(key, urls).await
        }
    }

    fn card(title: &str, href: &str) -> String {
        format!(
            r#"<div data-cy="l-card"><a href="{href}"><h4>{title}</h4></a><p data-testid="ad-price">5000 грн</p><p data-testid="location-date">Луцьк, 13 жовтня</p></div>"#
        )
    }

    fn kyiv_card(title: &str, href: &str) -> String {
        format!(
            r#"<div data-cy="l-card"><a href="{href}"><h4>{title}</h4></a><p data-testid="location-date">Київ, 13 жовтня</p></div>"#
        )
    }

    fn page(cards: &[String]) -> String {
        format!(r#"<div data-testid="listing-grid">{}</div>"#, cards.join(""))
    }

    fn channels() -> Vec<Channel> {
        vec![
            Channel::tax_free(TAX_FREE_URL, "seen_taxfree"),
            Channel::regular(REGULAR_URL, "seen_regular"),
        ]
    }

    fn pipeline(
        fetcher: FakeFetcher,
        store: Arc<dyn SeenStore>,
        notifier: Arc<RecordingNotifier>,
    ) -> Pipeline {
        Pipeline::new(
            Arc::new(fetcher),
            store,
            notifier,
            ListingExtractor::new("https://www.olx.ua"),
            channels(),
        )
    }

    #[tokio::test]
    async fn second_run_over_same_page_sends_nothing() {
        let fetcher = FakeFetcher::default()
            .with_page(TAX_FREE_URL, page(&[card("Studio", "/d/obyava/a.html")]))
            .with_page(
                REGULAR_URL,
                page(&[
                    card("Flat", "/d/obyava/b.html"),
                    kyiv_card("Kyiv flat", "/d/obyava/k.html"),
                ]),
            );
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let notifier = Arc::new(RecordingNotifier::default());
        let pipeline = pipeline(fetcher, store.clone(), notifier.clone());

        let first = pipeline.run().await;
        let second = pipeline.run().await;

        assert_eq!(first.notified(), 2);
        assert_eq!(second.notified(), 0);
        assert_eq!(second.channel("regular").unwrap().already_seen, 1);
        assert_eq!(notifier.sent().len(), 2);
        assert_eq!(store.count("seen_taxfree").unwrap(), 1);
        assert_eq!(store.count("seen_regular").unwrap(), 1);
    }

    #[tokio::test]
    async fn tax_free_messages_carry_the_tag_and_run_first() {
        let fetcher = FakeFetcher::default()
            .with_page(TAX_FREE_URL, page(&[card("Studio", "/d/obyava/x.html")]))
            .with_page(REGULAR_URL, page(&[card("Flat", "/d/obyava/y.html")]));
        let notifier = Arc::new(RecordingNotifier::default());
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());

        pipeline(fetcher, store, notifier.clone()).run().await;

        assert_eq!(
            notifier.sent(),
            vec![
                format!(
                    "{}Studio\n5000 грн\nЛуцьк, 13 жовтня\nhttps://www.olx.ua/d/obyava/x.html",
                    TAX_FREE_TAG
                ),
                "Flat\n5000 грн\nЛуцьк, 13 жовтня\nhttps://www.olx.ua/d/obyava/y.html"
                    .to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn duplicate_card_is_notified_once() {
        let fetcher = FakeFetcher::default()
            .with_page(TAX_FREE_URL, page(&[]))
            .with_page(
                REGULAR_URL,
                page(&[
                    card("Flat", "/d/obyava/dup.html"),
                    card("Flat", "/d/obyava/dup.html"),
                ]),
            );
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let notifier = Arc::new(RecordingNotifier::default());

        let summary = pipeline(fetcher, store.clone(), notifier.clone()).run().await;

        assert_eq!(summary.notified(), 1);
        assert_eq!(notifier.sent().len(), 1);
        assert_eq!(store.count("seen_regular").unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_card_is_notified_once_even_if_mark_fails() {
        let fetcher = FakeFetcher::default()
            .with_page(TAX_FREE_URL, page(&[]))
            .with_page(
                REGULAR_URL,
                page(&[
                    card("Flat", "/d/obyava/dup.html"),
                    card("Flat", "/d/obyava/dup.html"),
                ]),
            );
        let store = Arc::new(FlakyStore {
            inner: SqliteStore::open_in_memory().unwrap(),
            fail_check_for: None,
            fail_adds: true,
        });
        let notifier = Arc::new(RecordingNotifier::default());

        let summary = pipeline(fetcher, store, notifier.clone()).run().await;

        assert_eq!(notifier.sent().len(), 1);
        let regular = summary.channel("regular").unwrap();
        assert_eq!(regular.failures.len(), 1);
        assert!(matches!(regular.failures[0].error, ListingError::MarkSeen(_)));
    }

    #[tokio::test]
    async fn tax_free_fetch_failure_does_not_stop_regular() {
        let fetcher =
            FakeFetcher::default().with_page(REGULAR_URL, page(&[card("Flat", "/d/obyava/b.html")]));
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let notifier = Arc::new(RecordingNotifier::default());

        let summary = pipeline(fetcher, store, notifier.clone()).run().await;

        let tax_free = summary.channel("tax-free").unwrap();
        assert!(matches!(tax_free.error, Some(ChannelError::Fetch(_))));
        assert_eq!(summary.channel("regular").unwrap().notified, 1);
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn page_without_grid_is_reported_per_channel() {
        let fetcher = FakeFetcher::default()
            .with_page(TAX_FREE_URL, "<html><body>Access denied</body></html>".to_string())
            .with_page(REGULAR_URL, page(&[card("Flat", "/d/obyava/b.html")]));
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let notifier = Arc::new(RecordingNotifier::default());

        let summary = pipeline(fetcher, store, notifier).run().await;

        assert!(matches!(
            summary.channel("tax-free").unwrap().error,
            Some(ChannelError::Extract(_))
        ));
        assert_eq!(summary.channel("regular").unwrap().notified, 1);
    }

    #[tokio::test]
    async fn failed_membership_check_skips_only_that_listing() {
        let fetcher = FakeFetcher::default()
            .with_page(TAX_FREE_URL, page(&[]))
            .with_page(
                REGULAR_URL,
                page(&[
                    card("Broken", "/d/obyava/broken.html"),
                    card("Fine", "/d/obyava/fine.html"),
                ]),
            );
        let store = Arc::new(FlakyStore {
            inner: SqliteStore::open_in_memory().unwrap(),
            fail_check_for: Some("https://www.olx.ua/d/obyava/broken.html".to_string()),
            fail_adds: false,
        });
        let notifier = Arc::new(RecordingNotifier::default());

        let summary = pipeline(fetcher, store.clone(), notifier.clone()).run().await;

        let regular = summary.channel("regular").unwrap();
        assert_eq!(regular.notified, 1);
        assert_eq!(regular.failures.len(), 1);
        assert_eq!(
            regular.failures[0].url,
            "https://www.olx.ua/d/obyava/broken.html"
        );
        assert!(matches!(
            regular.failures[0].error,
            ListingError::MembershipCheck(_)
        ));
        assert_eq!(notifier.sent().len(), 1);
        assert!(notifier.sent()[0].starts_with("Fine\n"));
        assert!(!store
            .inner
            .is_member("seen_regular", "https://www.olx.ua/d/obyava/broken.html")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn failed_notification_is_retried_on_next_run() {
        let fetcher = FakeFetcher::default()
            .with_page(TAX_FREE_URL, page(&[]))
            .with_page(REGULAR_URL, page(&[card("Flat", "/d/obyava/b.html")]));
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let failing = Arc::new(RecordingNotifier {
            fail_containing: Some("Flat".to_string()),
            ..Default::default()
        });

        let first = pipeline(
            FakeFetcher::default()
                .with_page(TAX_FREE_URL, page(&[]))
                .with_page(REGULAR_URL, page(&[card("Flat", "/d/obyava/b.html")])),
            store.clone(),
            failing.clone(),
        )
        .run()
        .await;

        assert_eq!(first.notified(), 0);
        assert!(matches!(
            first.channel("regular").unwrap().failures[0].error,
            ListingError::Notify(_)
        ));
        assert_eq!(store.count("seen_regular").unwrap(), 0);

        let working = Arc::new(RecordingNotifier::default());
        let second = pipeline(fetcher, store.clone(), working.clone()).run().await;

        assert_eq!(second.notified(), 1);
        assert_eq!(working.sent().len(), 1);
        assert_eq!(store.count("seen_regular").unwrap(), 1);
    }
}
