//! Recursive forum traversal
//!
//! This module walks the forum → topic → post hierarchy: each level loads
//! its pages in sequence, checks every child item against its stored
//! freshness marker, recurses into the ones that changed, and follows the
//! configured next-page rule until it yields the sentinel. An item's own
//! marker is persisted only after its full page set has been processed, so
//! a failure mid-pagination leaves the item due for a retry on the next run.

use std::collections::HashMap;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::config::ForumConfig;
use crate::extract::{eval_integer, eval_timestamp, ExtractError, Extracted};
use crate::forms;
use crate::item::{ItemKind, ItemRef, PostDetails};
use crate::notify::{Notifier, Outcome};
use crate::scanner::{fetch_document, Throttle};
use crate::storage::ScanStorage;
use crate::{ConfigError, Result, ScanError};

/// Counters reported at the end of one forum's scan
#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    pub pages_fetched: u32,
    pub new_posts: u32,
    pub notifications_sent: u32,
}

/// Walks one configured forum
pub struct Scanner<'a> {
    tenant: String,
    config: &'a ForumConfig,
    client: &'a reqwest::blocking::Client,
    storage: &'a mut ScanStorage,
    notifier: Notifier<'a>,
    throttle: Throttle,
    id_patterns: HashMap<ItemKind, Regex>,
    summary: ScanSummary,
}

impl<'a> Scanner<'a> {
    /// Creates a scanner for one configured forum
    ///
    /// # Arguments
    ///
    /// * `tenant` - The forum's configuration key, used as the id prefix
    /// * `config` - The forum's crawl configuration
    /// * `client` - HTTP client (shared cookie store with the login step)
    /// * `storage` - The persistent state store
    /// * `throttle` - The process-wide bandwidth throttle
    /// * `dry_run` - When set, notifications are logged but not transmitted
    pub fn new(
        tenant: &str,
        config: &'a ForumConfig,
        client: &'a reqwest::blocking::Client,
        storage: &'a mut ScanStorage,
        throttle: Throttle,
        dry_run: bool,
    ) -> Result<Self> {
        let mut id_patterns = HashMap::new();
        for (kind, pattern) in [
            (ItemKind::Forum, &config.forums.id_pattern),
            (ItemKind::Topic, &config.topics.id_pattern),
            (ItemKind::Post, &config.posts.id_pattern),
        ] {
            let compiled = Regex::new(pattern).map_err(|e| {
                ConfigError::Validation(format!("invalid {} id-pattern: {}", kind, e))
            })?;
            id_patterns.insert(kind, compiled);
        }

        let notifier = Notifier::new(config.email.as_ref(), dry_run)?;

        Ok(Self {
            tenant: tenant.to_string(),
            config,
            client,
            storage,
            notifier,
            throttle,
            id_patterns,
            summary: ScanSummary::default(),
        })
    }

    /// Runs the scan: optional login, then the recursive traversal
    pub fn scan(&mut self) -> Result<ScanSummary> {
        if let Some(login) = &self.config.login_form {
            tracing::info!("Logging in via {}", login.url);
            forms::load_and_submit(self.client, login)?;
        }

        let root = ItemRef::root(&self.tenant, &self.config.root_url);
        self.process_forum(root)?;

        self.summary.notifications_sent = self.notifier.sent_count();
        Ok(self.summary.clone())
    }

    /// Processes one forum node across all of its pages
    fn process_forum(&mut self, mut forum: ItemRef) -> Result<()> {
        tracing::info!("Processing {}", forum);

        loop {
            let page_url = Url::parse(&forum.link)?;
            let document = self.load_page(&forum.link)?;
            let root = document.root_element();

            for child in select_all(&document, &self.config.forums.item)? {
                if let Some(item) = self.check_updated(ItemKind::Forum, &page_url, root, child)? {
                    self.process_forum(item)?;
                }
            }

            for child in select_all(&document, &self.config.topics.item)? {
                if let Some(item) = self.check_updated(ItemKind::Topic, &page_url, root, child)? {
                    self.process_topic(&forum, item)?;
                }
            }

            match self.config.forums.next.eval(root)? {
                Extracted::Default(_) => break,
                Extracted::Value(next) => forum.link = resolve_link(&page_url, &next),
            }
        }

        self.storage.set_marker(forum.kind, &forum.id, &forum.marker)?;
        Ok(())
    }

    /// Processes one topic node across all of its pages
    fn process_topic(&mut self, forum: &ItemRef, mut topic: ItemRef) -> Result<()> {
        tracing::info!("  Processing {}", topic);

        loop {
            let page_url = Url::parse(&topic.link)?;
            let document = self.load_page(&topic.link)?;
            let root = document.root_element();

            for child in select_all(&document, &self.config.posts.item)? {
                if let Some(item) = self.check_updated(ItemKind::Post, &page_url, root, child)? {
                    self.process_post(forum, &topic, item)?;
                }
            }

            match self.config.topics.next.eval(root)? {
                Extracted::Default(_) => break,
                Extracted::Value(next) => topic.link = resolve_link(&page_url, &next),
            }
        }

        self.storage.set_marker(topic.kind, &topic.id, &topic.marker)?;

        // The send cap is evaluated at topic granularity so a topic's thread
        // of notifications is never cut in half.
        if self.notifier.limit_reached() {
            return Err(ScanError::EmailLimitReached);
        }

        Ok(())
    }

    /// Hands one changed post to the notification pipeline
    ///
    /// The post's marker is withheld when the send attempt failed, which is
    /// what makes the post eligible for a retry on the next run.
    fn process_post(&mut self, forum: &ItemRef, topic: &ItemRef, post: ItemRef) -> Result<()> {
        tracing::info!("    Processing {}", post);
        self.summary.new_posts += 1;

        let outcome = self.notifier.notify(self.storage, forum, topic, &post)?;
        if outcome == Outcome::Failed {
            tracing::warn!("Leaving {} unmarked for retry next run", post.id);
            return Ok(());
        }

        self.storage.set_marker(post.kind, &post.id, &post.marker)?;
        Ok(())
    }

    /// Resolves one child node against its stored freshness marker
    ///
    /// Returns `None` when the extracted marker equals the stored one, which
    /// skips the whole subtree. Otherwise builds the child's [`ItemRef`],
    /// including the post payload for post nodes.
    fn check_updated(
        &mut self,
        kind: ItemKind,
        page_url: &Url,
        doc_root: ElementRef,
        node: ElementRef,
    ) -> Result<Option<ItemRef>> {
        let (_, link_rule, updated_rule, _) = self.config.level(kind);
        let link_raw = link_rule.eval(node)?;
        let marker = updated_rule.eval(node)?.into_string();

        let id = self.derive_id(kind, node, &link_raw)?;

        if let Some(stored) = self.storage.get_marker(kind, &id)? {
            if stored == marker {
                tracing::debug!("Skipping unchanged {} {}", kind, id);
                return Ok(None);
            }
        }

        let link = match link_raw {
            Extracted::Value(raw) => resolve_link(page_url, &raw),
            sentinel => sentinel.into_string(),
        };

        let post = match kind {
            ItemKind::Post => Some(self.extract_post_details(doc_root, node)?),
            _ => None,
        };

        Ok(Some(ItemRef {
            kind,
            id,
            link,
            marker,
            post,
        }))
    }

    /// Derives an item's tenant-prefixed id
    ///
    /// The configured pattern is matched against the extracted link for
    /// forums and topics, and against the element's `id` attribute for
    /// posts; its first capture group must parse as an integer.
    fn derive_id(&self, kind: ItemKind, node: ElementRef, link: &Extracted) -> Result<String> {
        let target = match kind {
            ItemKind::Post => node
                .value()
                .attr("id")
                .ok_or_else(|| ScanError::IdExtraction {
                    kind,
                    detail: "post element has no id attribute".to_string(),
                })?
                .to_string(),
            _ => link.clone().into_string(),
        };

        let captured = self.id_patterns[&kind]
            .captures(&target)
            .and_then(|caps| caps.get(1))
            .ok_or_else(|| ScanError::IdExtraction {
                kind,
                detail: format!("id pattern found no capture in '{}'", target),
            })?
            .as_str();

        let local: u64 = captured.parse().map_err(|_| ScanError::IdExtraction {
            kind,
            detail: format!("cannot parse id '{}'", captured),
        })?;

        Ok(format!("{}/{}", self.tenant, local))
    }

    /// Pulls the post-only fields out of a post node
    fn extract_post_details(
        &self,
        doc_root: ElementRef,
        node: ElementRef,
    ) -> Result<PostDetails> {
        let rules = &self.config.posts;

        let index = eval_integer(&rules.index, node)?;
        let index = u32::try_from(index).map_err(|_| {
            ScanError::Extract(ExtractError::FieldParse {
                value: index.to_string(),
                wanted: "post index",
            })
        })?;

        Ok(PostDetails {
            forum_name: rules.forum_name.eval(doc_root)?.into_string(),
            topic_name: rules.topic_name.eval(doc_root)?.into_string(),
            reply_link: rules.reply_link.eval(node)?.into_string(),
            index,
            date: eval_timestamp(&rules.date, node, rules.date_format.as_deref())?,
            author: rules.author.eval(node)?.into_string(),
            body: rules.body.eval(node)?.into_string(),
        })
    }

    fn load_page(&mut self, url: &str) -> Result<Html> {
        let document = fetch_document(self.client, url, &self.throttle)?;
        self.summary.pages_fetched += 1;
        Ok(document)
    }
}

/// Collects the nodes matching an item selector, in document order
fn select_all<'b>(document: &'b Html, selector: &str) -> Result<Vec<ElementRef<'b>>> {
    let parsed = Selector::parse(selector)
        .map_err(|_| ExtractError::InvalidSelector(selector.to_string()))?;
    Ok(document.select(&parsed).collect())
}

/// Resolves a possibly-relative link against the page it appeared on
fn resolve_link(base: &Url, link: &str) -> String {
    match base.join(link) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => link.to_string(),
    }
}
