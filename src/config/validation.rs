use crate::config::types::{Config, EmailConfig, ForumConfig, LoginFormConfig};
use crate::extract::ExtractionRule;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
///
/// Every selector and id pattern is compiled here so a typo fails at startup
/// rather than halfway through a crawl.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.max_bandwidth_bytes_per_sec == 0 {
        return Err(ConfigError::Validation(
            "max-bandwidth-bytes-per-sec must be >= 1".to_string(),
        ));
    }

    if config.forums.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [forums.<name>] section is required".to_string(),
        ));
    }

    for (tenant, forum) in &config.forums {
        validate_forum(tenant, forum)?;
    }

    Ok(())
}

fn validate_forum(tenant: &str, forum: &ForumConfig) -> Result<(), ConfigError> {
    if tenant.contains('/') {
        return Err(ConfigError::Validation(format!(
            "forum name '{}' must not contain '/', it prefixes stored ids",
            tenant
        )));
    }

    Url::parse(&forum.root_url).map_err(|e| {
        ConfigError::Validation(format!("{}: invalid root-url '{}': {}", tenant, forum.root_url, e))
    })?;

    if let Some(login) = &forum.login_form {
        validate_login_form(tenant, login)?;
    }

    validate_selector(tenant, "forums.item", &forum.forums.item)?;
    validate_rule(tenant, "forums.link", &forum.forums.link)?;
    validate_rule(tenant, "forums.updated", &forum.forums.updated)?;
    validate_id_pattern(tenant, "forums.id-pattern", &forum.forums.id_pattern)?;
    validate_rule(tenant, "forums.next", &forum.forums.next)?;

    validate_selector(tenant, "topics.item", &forum.topics.item)?;
    validate_rule(tenant, "topics.link", &forum.topics.link)?;
    validate_rule(tenant, "topics.updated", &forum.topics.updated)?;
    validate_id_pattern(tenant, "topics.id-pattern", &forum.topics.id_pattern)?;
    validate_rule(tenant, "topics.next", &forum.topics.next)?;

    validate_selector(tenant, "posts.item", &forum.posts.item)?;
    validate_rule(tenant, "posts.link", &forum.posts.link)?;
    validate_rule(tenant, "posts.updated", &forum.posts.updated)?;
    validate_id_pattern(tenant, "posts.id-pattern", &forum.posts.id_pattern)?;
    validate_rule(tenant, "posts.forum-name", &forum.posts.forum_name)?;
    validate_rule(tenant, "posts.topic-name", &forum.posts.topic_name)?;
    validate_rule(tenant, "posts.index", &forum.posts.index)?;
    validate_rule(tenant, "posts.reply-link", &forum.posts.reply_link)?;
    validate_rule(tenant, "posts.date", &forum.posts.date)?;
    validate_rule(tenant, "posts.author", &forum.posts.author)?;
    validate_rule(tenant, "posts.body", &forum.posts.body)?;

    if let Some(email) = &forum.email {
        validate_email(tenant, email)?;
    }

    Ok(())
}

fn validate_login_form(tenant: &str, login: &LoginFormConfig) -> Result<(), ConfigError> {
    Url::parse(&login.url).map_err(|e| {
        ConfigError::Validation(format!("{}: invalid login-form.url '{}': {}", tenant, login.url, e))
    })?;
    validate_selector(tenant, "login-form.form", &login.form)?;
    validate_selector(tenant, "login-form.submit", &login.submit)?;
    Ok(())
}

fn validate_email(tenant: &str, email: &EmailConfig) -> Result<(), ConfigError> {
    for (key, address) in [("from", &email.from), ("to", &email.to)] {
        address
            .email
            .parse::<lettre::Address>()
            .map_err(|e| {
                ConfigError::Validation(format!(
                    "{}: invalid email.{} address '{}': {}",
                    tenant, key, address.email, e
                ))
            })?;
    }

    if email.smtp_server.is_empty() {
        return Err(ConfigError::Validation(format!(
            "{}: email.smtp-server cannot be empty",
            tenant
        )));
    }

    Ok(())
}

/// Checks that a CSS selector string compiles
fn validate_selector(tenant: &str, key: &str, selector: &str) -> Result<(), ConfigError> {
    scraper::Selector::parse(selector).map_err(|_| {
        ConfigError::Validation(format!("{}: invalid selector for {}: '{}'", tenant, key, selector))
    })?;
    Ok(())
}

/// Checks every selector referenced by a rule
fn validate_rule(tenant: &str, key: &str, rule: &ExtractionRule) -> Result<(), ConfigError> {
    match rule {
        ExtractionRule::Constant(_) => Ok(()),
        ExtractionRule::Attribute { selector, .. }
        | ExtractionRule::InnerText(selector)
        | ExtractionRule::InnerHtml(selector) => validate_selector(tenant, key, selector),
    }
}

/// Checks that an id pattern compiles and captures the local id
fn validate_id_pattern(tenant: &str, key: &str, pattern: &str) -> Result<(), ConfigError> {
    let compiled = regex::Regex::new(pattern).map_err(|e| {
        ConfigError::Validation(format!("{}: invalid {}: {}", tenant, key, e))
    })?;

    if compiled.captures_len() < 2 {
        return Err(ConfigError::Validation(format!(
            "{}: {} must contain a capture group for the local id",
            tenant, key
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(selector: &str) -> ExtractionRule {
        ExtractionRule::InnerText(selector.to_string())
    }

    #[test]
    fn test_validate_selector_rejects_garbage() {
        assert!(validate_selector("t", "k", "[[nope").is_err());
        assert!(validate_selector("t", "k", "div.post a[href]").is_ok());
    }

    #[test]
    fn test_validate_rule_checks_inner_selectors() {
        assert!(validate_rule("t", "k", &rule("a.next")).is_ok());
        assert!(validate_rule("t", "k", &rule("[[nope")).is_err());
        assert!(validate_rule("t", "k", &ExtractionRule::Constant("x".into())).is_ok());
    }

    #[test]
    fn test_id_pattern_requires_capture_group() {
        assert!(validate_id_pattern("t", "k", r"topic-(\d+)").is_ok());
        assert!(validate_id_pattern("t", "k", r"topic-\d+").is_err());
        assert!(validate_id_pattern("t", "k", r"topic-(\d+").is_err());
    }

    #[test]
    fn test_tenant_name_must_not_contain_slash() {
        let forum: ForumConfig = toml::from_str(
            r#"
            root-url = "https://forum.example.com/"
            [forums]
            item = "li.forum"
            link = { inner-text = "a" }
            updated = { inner-text = "abbr" }
            id-pattern = "forumid=(\\d+)"
            next = { inner-text = "a.next" }
            [topics]
            item = "li.topic"
            link = { inner-text = "a" }
            updated = { inner-text = "abbr" }
            id-pattern = "topicid=(\\d+)"
            next = { inner-text = "a.next" }
            [posts]
            item = "div.post"
            link = { inner-text = "a" }
            updated = { inner-text = "abbr" }
            id-pattern = "post-(\\d+)"
            forum-name = { inner-text = "h1" }
            topic-name = { inner-text = "h2" }
            index = { inner-text = "a.index" }
            reply-link = { inner-text = "a.reply" }
            date = { inner-text = "span.date" }
            author = { inner-text = "span.author" }
            body = { inner-html = "div.body" }
            "#,
        )
        .unwrap();

        assert!(validate_forum("example", &forum).is_ok());
        assert!(matches!(
            validate_forum("a/b", &forum),
            Err(ConfigError::Validation(_))
        ));
    }
}
