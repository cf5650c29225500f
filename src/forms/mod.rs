//! Login form interpreter
//!
//! Loads a page, locates a form, merges its discovered field defaults with
//! configured overrides, encodes the result per the form's method/enctype,
//! and submits it. Used once before a crawl to establish a session; the
//! cookie store on the shared HTTP client carries the session onward.

use std::collections::BTreeMap;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::config::LoginFormConfig;
use crate::extract::ExtractError;
use crate::{Result, ScanError};

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Loads the configured page and submits its login form
///
/// # Arguments
///
/// * `client` - The HTTP client; its cookie store receives the session
/// * `config` - The login form description
///
/// # Returns
///
/// * `Ok(())` - The form was submitted (one or two HTTP requests)
/// * `Err(ScanError)` - Transport failure, missing form/submit node, or an
///   unsupported method/enctype
pub fn load_and_submit(client: &Client, config: &LoginFormConfig) -> Result<()> {
    let response = client
        .get(&config.url)
        .send()
        .map_err(|source| ScanError::Fetch {
            url: config.url.clone(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(ScanError::HttpStatus {
            url: config.url.clone(),
            status: status.as_u16(),
        });
    }

    let body = response.text().map_err(|source| ScanError::Fetch {
        url: config.url.clone(),
        source,
    })?;
    let document = Html::parse_document(&body);

    let form_selector = Selector::parse(&config.form)
        .map_err(|_| ExtractError::InvalidSelector(config.form.clone()))?;
    let form = document
        .select(&form_selector)
        .next()
        .ok_or_else(|| ExtractError::MissingNode {
            selector: config.form.clone(),
        })?;

    let base = Url::parse(&config.url)?;
    let action = match form.value().attr("action") {
        Some(raw) if !raw.is_empty() => base.join(raw)?.to_string(),
        _ => config.url.clone(),
    };
    let method = form
        .value()
        .attr("method")
        .map(str::to_uppercase)
        .unwrap_or_else(|| "GET".to_string());
    let enctype = form
        .value()
        .attr("enctype")
        .map(str::to_lowercase)
        .unwrap_or_else(|| FORM_URLENCODED.to_string());

    let data = collect_form_data(form, config)?;
    let encoded = encode_form_data(&enctype, &data)?;

    tracing::debug!("Submitting login form to {} via {}", action, method);

    let submission = match method.as_str() {
        "GET" => {
            let separator = if action.contains('?') { '&' } else { '?' };
            client.get(format!("{}{}{}", action, separator, encoded)).send()
        }
        "POST" => client
            .post(&action)
            .header(CONTENT_TYPE, enctype)
            .body(encoded)
            .send(),
        _ => return Err(ScanError::UnsupportedFormMethod(method)),
    };

    submission.map_err(|source| ScanError::Fetch {
        url: action,
        source,
    })?;

    Ok(())
}

/// Builds the field-name → value map for a form
///
/// Discovered defaults come from every named `input`/`select`/`textarea`
/// descendant; checkbox and radio controls contribute their value only when
/// `checked` is present (falling back to `"on"` when checked but valueless).
/// Configured overrides win over discovered defaults, and the submit
/// control's name/value pair is added last so nothing overrides it.
fn collect_form_data(
    form: ElementRef,
    config: &LoginFormConfig,
) -> Result<BTreeMap<String, String>> {
    let field_selector = Selector::parse("input[name], select[name], textarea[name]")
        .map_err(|_| ExtractError::InvalidSelector("form field selector".to_string()))?;

    let mut data = BTreeMap::new();
    for field in form.select(&field_selector) {
        let Some(name) = field.value().attr("name") else {
            continue;
        };

        let declared = field.value().attr("value").map(str::to_string);
        let discovered = match field.value().attr("type") {
            Some("checkbox") | Some("radio") => {
                if field.value().attr("checked").is_some() {
                    Some(declared.unwrap_or_else(|| "on".to_string()))
                } else {
                    None
                }
            }
            _ => Some(declared.unwrap_or_default()),
        };

        if let Some(value) = config.fields.get(name).cloned().or(discovered) {
            data.insert(name.to_string(), value);
        }
    }

    let submit_selector = Selector::parse(&config.submit)
        .map_err(|_| ExtractError::InvalidSelector(config.submit.clone()))?;
    let submit = form
        .select(&submit_selector)
        .next()
        .ok_or_else(|| ExtractError::MissingNode {
            selector: config.submit.clone(),
        })?;

    if let (Some(name), Some(value)) = (submit.value().attr("name"), submit.value().attr("value")) {
        data.insert(name.to_string(), value.to_string());
    }

    Ok(data)
}

/// Percent-encodes the field map for submission
fn encode_form_data(enctype: &str, data: &BTreeMap<String, String>) -> Result<String> {
    match enctype {
        FORM_URLENCODED => {
            let mut serializer = url::form_urlencoded::Serializer::new(String::new());
            for (name, value) in data {
                serializer.append_pair(name, value);
            }
            Ok(serializer.finish())
        }
        other => Err(ScanError::UnsupportedFormEncoding(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn login_config(fields: &[(&str, &str)]) -> LoginFormConfig {
        LoginFormConfig {
            url: "https://forum.example.com/login".to_string(),
            form: "form#login".to_string(),
            submit: "input[type=submit]".to_string(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn form_data(html: &str, config: &LoginFormConfig) -> BTreeMap<String, String> {
        let document = Html::parse_document(html);
        let selector = Selector::parse(&config.form).unwrap();
        let form = document.select(&selector).next().unwrap();
        collect_form_data(form, config).unwrap()
    }

    const LOGIN_FORM: &str = r#"
        <form id="login" action="/do-login" method="post">
            <input type="text" name="username" value="">
            <input type="password" name="password">
            <input type="checkbox" name="remember" value="1">
            <input type="checkbox" name="tos" value="agreed" checked>
            <input type="radio" name="lang" value="en" checked>
            <input type="radio" name="lang" value="de">
            <input type="hidden" name="csrf" value="tok123">
            <input type="submit" name="do" value="Log in">
        </form>"#;

    #[test]
    fn test_checkbox_and_radio_gating() {
        let data = form_data(LOGIN_FORM, &login_config(&[]));

        // Unchecked checkbox omitted, checked ones contribute their value.
        assert!(!data.contains_key("remember"));
        assert_eq!(data["tos"], "agreed");
        assert_eq!(data["lang"], "en");
    }

    #[test]
    fn test_checked_without_value_defaults_to_on() {
        let html = r#"<form id="login"><input type="checkbox" name="stay" checked>
            <input type="submit" value="go"></form>"#;
        let data = form_data(html, &login_config(&[]));
        assert_eq!(data["stay"], "on");
    }

    #[test]
    fn test_configured_overrides_win() {
        let data = form_data(
            LOGIN_FORM,
            &login_config(&[("username", "alice"), ("password", "hunter2")]),
        );
        assert_eq!(data["username"], "alice");
        assert_eq!(data["password"], "hunter2");
        assert_eq!(data["csrf"], "tok123");
    }

    #[test]
    fn test_submit_pair_added_last() {
        // An override for the submit control's name must not shadow the
        // name/value pair the control itself carries.
        let data = form_data(LOGIN_FORM, &login_config(&[("do", "something-else")]));
        assert_eq!(data["do"], "Log in");
    }

    #[test]
    fn test_submit_without_name_adds_nothing() {
        let html = r#"<form id="login"><input type="text" name="q" value="x">
            <input type="submit" value="go"></form>"#;
        let data = form_data(html, &login_config(&[]));
        assert_eq!(data.len(), 1);
        assert_eq!(data["q"], "x");
    }

    #[test]
    fn test_encode_percent_escapes() {
        let mut data = BTreeMap::new();
        data.insert("user name".to_string(), "a&b=c".to_string());
        let encoded = encode_form_data(FORM_URLENCODED, &data).unwrap();
        assert_eq!(encoded, "user+name=a%26b%3Dc");
    }

    #[test]
    fn test_unsupported_enctype() {
        let result = encode_form_data("multipart/form-data", &BTreeMap::new());
        assert!(matches!(
            result,
            Err(ScanError::UnsupportedFormEncoding(enc)) if enc == "multipart/form-data"
        ));
    }
}
