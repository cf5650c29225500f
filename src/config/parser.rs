use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    let config: Config = toml::from_str(&content)?;

    validate(&config)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const VALID_CONFIG: &str = r#"
database-path = "./forum-scanner.db"
max-bandwidth-bytes-per-sec = 12500

[forums.example]
root-url = "https://forum.example.com/"

[forums.example.forums]
item = "li.forum"
link = { attribute = { selector = "a.forum-title", name = "href" } }
updated = { attribute = { selector = "abbr.last-post", name = "title" } }
id-pattern = "forumid=(\\d+)"
next = { attribute = { selector = "a.next", name = "href" } }

[forums.example.topics]
item = "li.topic"
link = { attribute = { selector = "a.topic-title", name = "href" } }
updated = { inner-text = "span.last-post" }
id-pattern = "topicid=(\\d+)"
next = { attribute = { selector = "a.next", name = "href" } }

[forums.example.posts]
item = "div.post"
link = { attribute = { selector = "a.permalink", name = "href" } }
updated = { attribute = { selector = "abbr.edited", name = "title" } }
id-pattern = "post-(\\d+)"
forum-name = { inner-text = "h1.forum-name" }
topic-name = { inner-text = "h2.topic-name" }
index = { inner-text = "a.post-index" }
reply-link = { attribute = { selector = "a.reply", name = "href" } }
date = { inner-text = "span.post-date" }
author = { inner-text = "span.author" }
body = { inner-html = "div.post-body" }

[forums.example.email]
from = { name = "Scanner", email = "scanner@example.com" }
to = { email = "inbox@example.com" }
smtp-server = "smtp.example.com"
max-errors = 3
max-emails-per-run = 50
"#;

    #[test]
    fn test_load_valid_config() {
        let file = create_temp_config(VALID_CONFIG);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.database_path, "./forum-scanner.db");
        assert_eq!(config.max_bandwidth_bytes_per_sec, 12_500);
        assert_eq!(config.forums.len(), 1);

        let forum = &config.forums["example"];
        assert_eq!(forum.root_url, "https://forum.example.com/");
        assert!(forum.login_form.is_none());
        assert_eq!(forum.email.as_ref().unwrap().max_emails_per_run, Some(50));
    }

    #[test]
    fn test_default_bandwidth_applies() {
        let trimmed = VALID_CONFIG.replace("max-bandwidth-bytes-per-sec = 12500\n", "");
        let file = create_temp_config(&trimmed);
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.max_bandwidth_bytes_per_sec, 12_500);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let broken = VALID_CONFIG.replace("id-pattern = \"post-(\\\\d+)\"", "id-pattern = \"post-\\\\d+\"");
        let file = create_temp_config(&broken);
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
