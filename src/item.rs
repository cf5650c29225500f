//! Item model for the forum hierarchy
//!
//! This module defines the three item kinds the scanner walks and the
//! reference type that identifies one crawled node across runs.

use chrono::{DateTime, FixedOffset};

/// The hierarchy level an item belongs to
///
/// The kind selects which configuration sub-tree applies to the item and
/// which persisted table holds its freshness marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Forum,
    Topic,
    Post,
}

impl ItemKind {
    /// Returns the name of the persisted marker table for this kind
    pub fn table(&self) -> &'static str {
        match self {
            Self::Forum => "Forums",
            Self::Topic => "Topics",
            Self::Post => "Posts",
        }
    }

    /// Returns the name of the id column in this kind's marker table
    pub fn id_column(&self) -> &'static str {
        match self {
            Self::Forum => "ForumId",
            Self::Topic => "TopicId",
            Self::Post => "PostId",
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forum => write!(f, "forum"),
            Self::Topic => write!(f, "topic"),
            Self::Post => write!(f, "post"),
        }
    }
}

/// Identifies one crawled node of the forum hierarchy
///
/// The `id` is stable across re-fetches of the same logical item even as the
/// `marker` changes: it is derived from the item's link or DOM id via the
/// configured pattern and prefixed with the tenant key, never taken from the
/// item's position in a listing. Post items additionally carry the fields
/// needed to build a notification.
#[derive(Debug, Clone)]
pub struct ItemRef {
    pub kind: ItemKind,

    /// Globally-unique id, composed as `<tenant>/<local-id>`
    pub id: String,

    /// URL to fetch for this item
    pub link: String,

    /// Opaque freshness token, compared verbatim against the stored marker
    pub marker: String,

    /// Post-only payload; `Some` exactly when `kind == ItemKind::Post`
    pub post: Option<PostDetails>,
}

impl ItemRef {
    /// Creates the synthetic root reference for a configured forum
    ///
    /// The root has no marker of its own; its id is the configured root URL
    /// under the tenant prefix.
    pub fn root(tenant: &str, root_url: &str) -> Self {
        Self {
            kind: ItemKind::Forum,
            id: format!("{}/{}", tenant, root_url),
            link: root_url.to_string(),
            marker: String::new(),
            post: None,
        }
    }
}

impl std::fmt::Display for ItemRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ({})", self.kind, self.id, self.link)
    }
}

/// Post-only fields of an [`ItemRef`]
#[derive(Debug, Clone)]
pub struct PostDetails {
    /// Name of the forum that owns the post's topic
    pub forum_name: String,

    /// Name of the owning topic
    pub topic_name: String,

    /// Link for replying to the post
    pub reply_link: String,

    /// 1-based position within the topic; index 1 is the topic-opening post
    pub index: u32,

    /// Publication timestamp as displayed by the forum
    pub date: DateTime<FixedOffset>,

    pub author: String,

    /// Raw inner markup of the post body
    pub body: String,
}
