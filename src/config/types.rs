use serde::Deserialize;
use std::collections::BTreeMap;

use crate::extract::ExtractionRule;
use crate::item::ItemKind;
use crate::scanner::DEFAULT_MAX_BYTES_PER_SEC;

/// Main configuration structure for Forum-Scanner
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Path to the SQLite database file shared by all configured forums
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Sustained download ceiling applied between fetches (bytes per second)
    #[serde(rename = "max-bandwidth-bytes-per-sec", default = "default_bandwidth")]
    pub max_bandwidth_bytes_per_sec: u32,

    /// Configured forums, keyed by tenant name
    ///
    /// The key becomes the tenant prefix on every persisted item id, which is
    /// what keeps several forums' records distinct in the shared store.
    #[serde(default)]
    pub forums: BTreeMap<String, ForumConfig>,
}

fn default_bandwidth() -> u32 {
    DEFAULT_MAX_BYTES_PER_SEC
}

/// Per-forum crawl configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ForumConfig {
    /// URL of the forum's root listing page
    #[serde(rename = "root-url")]
    pub root_url: String,

    /// Optional login form submitted before the crawl starts
    #[serde(rename = "login-form")]
    pub login_form: Option<LoginFormConfig>,

    /// Rules for child forums on a forum listing page
    pub forums: LevelRules,

    /// Rules for topics on a forum listing page
    pub topics: LevelRules,

    /// Rules for posts on a topic page
    pub posts: PostRules,

    /// Notification settings; notifications are opt-in per forum
    pub email: Option<EmailConfig>,
}

impl ForumConfig {
    /// Returns the shared extraction rules for one hierarchy level
    pub fn level(&self, kind: ItemKind) -> (&str, &ExtractionRule, &ExtractionRule, &str) {
        match kind {
            ItemKind::Forum => (
                &self.forums.item,
                &self.forums.link,
                &self.forums.updated,
                &self.forums.id_pattern,
            ),
            ItemKind::Topic => (
                &self.topics.item,
                &self.topics.link,
                &self.topics.updated,
                &self.topics.id_pattern,
            ),
            ItemKind::Post => (
                &self.posts.item,
                &self.posts.link,
                &self.posts.updated,
                &self.posts.id_pattern,
            ),
        }
    }
}

/// Login form description
#[derive(Debug, Clone, Deserialize)]
pub struct LoginFormConfig {
    /// Page carrying the login form
    pub url: String,

    /// Selector locating the form element
    pub form: String,

    /// Selector locating the submit control within the form
    pub submit: String,

    /// Field values overriding the form's discovered defaults
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

/// Extraction rules shared by the forum and topic levels
#[derive(Debug, Clone, Deserialize)]
pub struct LevelRules {
    /// Selector yielding this level's item nodes in document order
    pub item: String,

    /// Rule yielding an item's link
    pub link: ExtractionRule,

    /// Rule yielding an item's freshness marker
    pub updated: ExtractionRule,

    /// Pattern whose first capture group derives the item's local id
    #[serde(rename = "id-pattern")]
    pub id_pattern: String,

    /// Rule yielding the next-page link; the sentinel ends pagination
    pub next: ExtractionRule,
}

/// Extraction rules for post items
#[derive(Debug, Clone, Deserialize)]
pub struct PostRules {
    pub item: String,

    pub link: ExtractionRule,

    pub updated: ExtractionRule,

    /// Pattern applied to the post element's `id` attribute
    #[serde(rename = "id-pattern")]
    pub id_pattern: String,

    /// Evaluated against the topic page's document root
    #[serde(rename = "forum-name")]
    pub forum_name: ExtractionRule,

    /// Evaluated against the topic page's document root
    #[serde(rename = "topic-name")]
    pub topic_name: ExtractionRule,

    /// 1-based position of the post within its topic
    pub index: ExtractionRule,

    #[serde(rename = "reply-link")]
    pub reply_link: ExtractionRule,

    pub date: ExtractionRule,

    /// chrono format string for the date rule; defaults apply when absent
    #[serde(rename = "date-format")]
    pub date_format: Option<String>,

    pub author: ExtractionRule,

    pub body: ExtractionRule,
}

/// Notification settings for one forum
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub from: AddressConfig,

    pub to: AddressConfig,

    #[serde(rename = "smtp-server")]
    pub smtp_server: String,

    #[serde(rename = "smtp-username")]
    pub smtp_username: Option<String>,

    #[serde(rename = "smtp-password")]
    pub smtp_password: Option<String>,

    /// Error-journal entries per source before further sends are suppressed
    #[serde(rename = "max-errors", default = "default_max_errors")]
    pub max_errors: u32,

    /// Cap on sends per run; reaching it ends the run early and cleanly
    #[serde(rename = "max-emails-per-run")]
    pub max_emails_per_run: Option<u32>,
}

fn default_max_errors() -> u32 {
    3
}

/// One mail address with an optional display name
#[derive(Debug, Clone, Deserialize)]
pub struct AddressConfig {
    pub name: Option<String>,
    pub email: String,
}
