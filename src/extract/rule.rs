//! Extraction rule evaluation
//!
//! A rule describes where one value lives relative to an HTML node. Rules
//! come straight from configuration and evaluating one never mutates the
//! document; the same (node, rule) pair always yields the same result.

use scraper::{ElementRef, Selector};
use serde::Deserialize;

use crate::extract::{ExtractError, ExtractResult};

/// One declarative extraction rule
///
/// Exactly one variant is configured per rule. `Attribute` and `InnerText`
/// yield the [`Extracted::Default`] sentinel when the selector matches
/// nothing, so callers can treat the location as optional (end of
/// pagination, absent field). `InnerHtml` locations are required and fail
/// instead.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionRule {
    /// A literal configured string; the node is ignored
    Constant(String),

    /// The named attribute of the first descendant matching `selector`
    Attribute { selector: String, name: String },

    /// The inner text of the first match, whitespace-collapsed and trimmed
    InnerText(String),

    /// The raw inner markup of the first match
    InnerHtml(String),
}

/// The outcome of evaluating a rule against a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    /// A value was found
    Value(String),

    /// No matching node or attribute; carries the rule location for
    /// diagnostics
    Default(String),
}

impl Extracted {
    /// Returns true if this is the "no matching node" sentinel
    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default(_))
    }

    /// Renders the result as a plain string
    ///
    /// The sentinel renders as `<default:…>`, a form no real forum value
    /// takes, so it can be stored and compared verbatim like any other
    /// marker.
    pub fn into_string(self) -> String {
        match self {
            Self::Value(value) => value,
            Self::Default(path) => format!("<default:{}>", path),
        }
    }
}

impl ExtractionRule {
    /// Evaluates this rule against one node
    ///
    /// Attribute and text values come back entity-decoded because the HTML
    /// parser decodes them during tokenization.
    pub fn eval(&self, node: ElementRef) -> ExtractResult<Extracted> {
        match self {
            Self::Constant(value) => Ok(Extracted::Value(value.clone())),

            Self::Attribute { selector, name } => {
                match first_match(node, selector)?.and_then(|el| el.value().attr(name)) {
                    Some(value) => Ok(Extracted::Value(value.to_string())),
                    None => Ok(Extracted::Default(format!("{}@{}", selector, name))),
                }
            }

            Self::InnerText(selector) => match first_match(node, selector)? {
                Some(el) => {
                    let text: String = el.text().collect();
                    Ok(Extracted::Value(collapse_whitespace(&text)))
                }
                None => Ok(Extracted::Default(selector.clone())),
            },

            Self::InnerHtml(selector) => match first_match(node, selector)? {
                Some(el) => Ok(Extracted::Value(el.inner_html())),
                None => Err(ExtractError::MissingNode {
                    selector: selector.clone(),
                }),
            },
        }
    }
}

/// Selects the first descendant of `node` matching `selector`
fn first_match<'a>(node: ElementRef<'a>, selector: &str) -> ExtractResult<Option<ElementRef<'a>>> {
    let parsed = Selector::parse(selector)
        .map_err(|_| ExtractError::InvalidSelector(selector.to_string()))?;
    Ok(node.select(&parsed).next())
}

/// Collapses whitespace runs to single spaces and trims the ends
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn eval_on(html: &str, rule: &ExtractionRule) -> ExtractResult<Extracted> {
        let doc = Html::parse_fragment(html);
        rule.eval(doc.root_element())
    }

    #[test]
    fn test_constant_ignores_node() {
        let rule = ExtractionRule::Constant("fixed".to_string());
        let result = eval_on("<p>other</p>", &rule).unwrap();
        assert_eq!(result, Extracted::Value("fixed".to_string()));
    }

    #[test]
    fn test_attribute_value() {
        let rule = ExtractionRule::Attribute {
            selector: "a.topic".to_string(),
            name: "href".to_string(),
        };
        let result = eval_on(r#"<a class="topic" href="/t/1">One</a>"#, &rule).unwrap();
        assert_eq!(result, Extracted::Value("/t/1".to_string()));
    }

    #[test]
    fn test_attribute_is_entity_decoded() {
        let rule = ExtractionRule::Attribute {
            selector: "a".to_string(),
            name: "title".to_string(),
        };
        let result = eval_on(r#"<a title="Fish &amp; Chips">x</a>"#, &rule).unwrap();
        assert_eq!(result, Extracted::Value("Fish & Chips".to_string()));
    }

    #[test]
    fn test_attribute_missing_node_is_default() {
        let rule = ExtractionRule::Attribute {
            selector: "a.next".to_string(),
            name: "href".to_string(),
        };
        let result = eval_on("<p>no links here</p>", &rule).unwrap();
        assert!(result.is_default());
        assert_eq!(result.into_string(), "<default:a.next@href>");
    }

    #[test]
    fn test_attribute_missing_attribute_is_default() {
        let rule = ExtractionRule::Attribute {
            selector: "a".to_string(),
            name: "rel".to_string(),
        };
        let result = eval_on(r#"<a href="/x">x</a>"#, &rule).unwrap();
        assert!(result.is_default());
    }

    #[test]
    fn test_inner_text_collapses_whitespace() {
        let rule = ExtractionRule::InnerText("span.author".to_string());
        let result = eval_on(
            "<span class=\"author\">  Some\n\t  Author  </span>",
            &rule,
        )
        .unwrap();
        assert_eq!(result, Extracted::Value("Some Author".to_string()));
    }

    #[test]
    fn test_inner_text_missing_is_default() {
        let rule = ExtractionRule::InnerText("span.missing".to_string());
        let result = eval_on("<p>text</p>", &rule).unwrap();
        assert_eq!(result, Extracted::Default("span.missing".to_string()));
    }

    #[test]
    fn test_inner_html_returns_markup() {
        let rule = ExtractionRule::InnerHtml("div.body".to_string());
        let result = eval_on(r#"<div class="body"><p>Hi <b>you</b></p></div>"#, &rule).unwrap();
        assert_eq!(result, Extracted::Value("<p>Hi <b>you</b></p>".to_string()));
    }

    #[test]
    fn test_inner_html_missing_is_error() {
        let rule = ExtractionRule::InnerHtml("div.body".to_string());
        let result = eval_on("<p>no body</p>", &rule);
        assert!(matches!(
            result,
            Err(ExtractError::MissingNode { selector }) if selector == "div.body"
        ));
    }

    #[test]
    fn test_invalid_selector() {
        let rule = ExtractionRule::InnerText("[[nope".to_string());
        let result = eval_on("<p>x</p>", &rule);
        assert!(matches!(result, Err(ExtractError::InvalidSelector(_))));
    }

    #[test]
    fn test_rule_deserializes_from_toml() {
        #[derive(Deserialize)]
        struct Holder {
            link: ExtractionRule,
            next: ExtractionRule,
            title: ExtractionRule,
        }

        let holder: Holder = toml::from_str(
            r#"
            link = { attribute = { selector = "a.topic", name = "href" } }
            next = { inner-text = "a.next" }
            title = { constant = "Fixed Title" }
            "#,
        )
        .unwrap();

        assert!(matches!(holder.link, ExtractionRule::Attribute { .. }));
        assert!(matches!(holder.next, ExtractionRule::InnerText(_)));
        assert!(matches!(holder.title, ExtractionRule::Constant(_)));
    }
}
