//! Notification message construction
//!
//! Each post becomes one MIME message. The deterministic Message-Id
//! (`{topicId}/{postIndex}@{domain}`) plus an In-Reply-To reference to the
//! previous index turn a topic's posts into one linear mail thread.

use lettre::message::header::{ContentType, HeaderName, HeaderValue};
use lettre::message::{Mailbox, Message};

use crate::config::{AddressConfig, EmailConfig};
use crate::item::{ItemRef, PostDetails};
use crate::notify::body::build_email_body;
use crate::notify::NotifyError;

/// Builds the notification message for one post
///
/// The From mailbox borrows the post author's name so threads read
/// naturally in a mail client, while the address stays the configured one.
pub fn build_message(
    config: &EmailConfig,
    forum: &ItemRef,
    topic: &ItemRef,
    post: &ItemRef,
    details: &PostDetails,
) -> Result<Message, NotifyError> {
    let from = mailbox(&config.from, Some(&details.author))?;
    let to = mailbox(&config.to, None)?;
    let domain = config.from.email.rsplit('@').next().unwrap_or("localhost");

    let subject = if details.index == 1 {
        details.topic_name.clone()
    } else {
        format!("Re: {}", details.topic_name)
    };

    let mut builder = Message::builder()
        .from(from)
        .to(to)
        .subject(subject)
        .date(std::time::SystemTime::from(details.date))
        .message_id(Some(message_id(topic, details.index, domain)));

    if details.index >= 2 {
        builder = builder.in_reply_to(message_id(topic, details.index - 1, domain));
    }

    let mut message = builder
        .header(ContentType::TEXT_HTML)
        .body(build_email_body(post, details))?;

    let headers = message.headers_mut();
    for (name, value) in [
        ("X-ForumScanner-Forum", forum.id.clone()),
        ("X-ForumScanner-ForumName", details.forum_name.clone()),
        ("X-ForumScanner-Topic", topic.id.clone()),
        ("X-ForumScanner-TopicName", details.topic_name.clone()),
        ("X-ForumScanner-Post", post.id.clone()),
        ("X-ForumScanner-PostIndex", details.index.to_string()),
    ] {
        headers.insert_raw(HeaderValue::new(
            HeaderName::new_from_ascii_str(name),
            value,
        ));
    }

    Ok(message)
}

/// Renders the deterministic message id for one (topic, index) pair
fn message_id(topic: &ItemRef, index: u32, domain: &str) -> String {
    format!("<{}/{}@{}>", topic.id, index, domain)
}

fn mailbox(address: &AddressConfig, display_name: Option<&str>) -> Result<Mailbox, NotifyError> {
    let name = display_name
        .map(str::to_string)
        .or_else(|| address.name.clone());
    Ok(Mailbox::new(name, address.email.parse()?))
}
