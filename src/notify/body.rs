//! Notification body construction
//!
//! Post bodies arrive as raw forum markup. Before mailing they get
//! normalized: citation "snapback" anchors are dropped and the forum's
//! div-based quote wrappers are rewritten into semantic `<blockquote>`
//! elements. The transform walks the parsed fragment and re-serializes it,
//! so the original document is never mutated.

use std::fmt::Write;

use ego_tree::NodeRef;
use scraper::node::Element;
use scraper::{Html, Node};

use crate::item::{ItemRef, PostDetails};

/// Footer time format (clock part of the displayed post date)
pub(crate) const TIME_FORMAT: &str = "%H:%M:%S";

/// Footer date format (day part of the displayed post date)
pub(crate) const DATE_FORMAT: &str = "%A, %e %B %Y";

/// Elements serialized without closing tags or children
const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Builds the complete HTML document mailed for one post
pub fn build_email_body(post: &ItemRef, details: &PostDetails) -> String {
    format!(
        "<!DOCTYPE html>\
        <html>\
            <head>\
                <style>\
                    html {{ font-family: sans-serif; }} \
                    p.citation {{ background: lightgrey; padding: 0.5ex; }} \
                    blockquote {{ border-left: 0.5ex solid lightgrey; padding-left: 1.0ex; }} \
                    .email-notifications-footer hr {{ border: 1px solid grey; }} \
                    .email-notifications-footer a {{ color: grey; }}\
                </style>\
            </head>\
            <body>\
                {body}\
                <div class='email-notifications-footer'>\
                    <hr>\
                    Post #{index} at {time} on {date} by {author} in {forum} \
                    (<a href=\"{reply}\">reply</a>, <a href=\"{view}\">view in forum</a>)\
                </div>\
            </body>\
        </html>",
        body = format_body(&details.body),
        index = details.index,
        time = details.date.format(TIME_FORMAT),
        date = details.date.format(DATE_FORMAT),
        author = html_escape::encode_text(&details.author),
        forum = html_escape::encode_text(&details.forum_name),
        reply = html_escape::encode_double_quoted_attribute(&details.reply_link),
        view = html_escape::encode_double_quoted_attribute(&post.link),
    )
}

/// Normalizes a post body's quoting markup
///
/// Two forum conventions collapse into one here:
/// - `a.snapback` anchors inside `p.citation` paragraphs are removed
/// - a `div.blockquote` whose only element child is a `div.quote` becomes a
///   `<blockquote>` carrying the quote's children
pub fn format_body(body_markup: &str) -> String {
    let fragment = Html::parse_fragment(body_markup);
    let mut out = String::new();
    for child in fragment.root_element().children() {
        render(child, &mut out);
    }
    out
}

fn render(node: NodeRef<Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => {
            let content: &str = &text;
            out.push_str(&html_escape::encode_text(content));
        }

        Node::Comment(comment) => {
            let content: &str = &comment;
            let _ = write!(out, "<!--{}-->", content);
        }

        Node::Element(element) => {
            if is_citation_snapback(node, &element) {
                return;
            }

            if let Some(quote) = quote_wrapper_target(node, &element) {
                out.push_str("<blockquote>");
                for child in quote.children() {
                    render(child, out);
                }
                out.push_str("</blockquote>");
                return;
            }

            let name = element.name();
            let _ = write!(out, "<{}", name);
            for (attr, value) in element.attrs() {
                let _ = write!(
                    out,
                    " {}=\"{}\"",
                    attr,
                    html_escape::encode_double_quoted_attribute(value)
                );
            }
            out.push('>');

            if VOID_ELEMENTS.contains(&name) {
                return;
            }

            for child in node.children() {
                render(child, out);
            }
            let _ = write!(out, "</{}>", name);
        }

        _ => {}
    }
}

/// True for `a.snapback` anchors whose parent is a `p.citation`
fn is_citation_snapback(node: NodeRef<Node>, element: &Element) -> bool {
    if element.name() != "a" || !has_class(element, "snapback") {
        return false;
    }

    node.parent()
        .and_then(|parent| match parent.value() {
            Node::Element(parent_el) => Some(parent_el.name() == "p" && has_class(&parent_el, "citation")),
            _ => None,
        })
        .unwrap_or(false)
}

/// Returns the inner `div.quote` when `node` is a single-child quote wrapper
fn quote_wrapper_target<'a>(node: NodeRef<'a, Node>, element: &Element) -> Option<NodeRef<'a, Node>> {
    if element.name() != "div" || !has_class(element, "blockquote") {
        return None;
    }

    let mut element_children = node
        .children()
        .filter(|child| child.value().is_element());
    let only_child = element_children.next()?;
    if element_children.next().is_some() {
        return None;
    }

    match only_child.value() {
        Node::Element(child_el) if child_el.name() == "div" && has_class(&child_el, "quote") => {
            Some(only_child)
        }
        _ => None,
    }
}

fn has_class(element: &Element, class: &str) -> bool {
    element
        .attr("class")
        .map(|classes| classes.split_whitespace().any(|c| c == class))
        .unwrap_or(false)
}
