use std::time::Duration;

use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::USER_AGENT;
use serde::{Deserialize, Serialize};
use url::Url;

pub const HN_API_BASE: &str = "https://hacker-news.firebaseio.com/v0";
pub const HN_SITE_BASE: &str = "https://news.ycombinator.com";

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub user_agent: String,
    pub api_base: Option<String>,
    pub site_base: Option<String>,
    pub http_client: Option<HttpClient>,
}

#[derive(Debug)]
pub struct Client {
    http: HttpClient,
    user_agent: String,
    api_base: String,
    site_base: String,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("net: user agent required");
        }

        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(Duration::from_secs(20))
                .build()?,
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
            api_base: config.api_base.unwrap_or_else(|| HN_API_BASE.to_string()),
            site_base: config.site_base.unwrap_or_else(|| HN_SITE_BASE.to_string()),
        })
    }

    pub fn site_base(&self) -> &str {
        &self.site_base
    }

    pub fn user_info(&self, username: &str) -> Result<User> {
        let url = format!("{}/user/{}.json", self.api_base, username);
        let user: User = self
            .http
            .get(&url)
            .header(USER_AGENT, &self.user_agent)
            .send()?
            .error_for_status()?
            .json()
            .with_context(|| format!("net: parse user {username}"))?;
        Ok(user)
    }

    pub fn item_info(&self, id: i64) -> Result<Item> {
        let url = format!("{}/item/{}.json", self.api_base, id);
        let item: Item = self
            .http
            .get(&url)
            .header(USER_AGENT, &self.user_agent)
            .send()?
            .error_for_status()?
            .json()
            .with_context(|| format!("net: parse item {id}"))?;
        Ok(item)
    }

    /// Fetch a page fragment (reply/edit form, item page) as raw markup.
    /// Relative urls resolve against the site base.
    pub fn fetch_fragment(&self, url: &str) -> Result<String> {
        let absolute = self.absolutize(url)?;
        let body = self
            .http
            .get(absolute.as_str())
            .header(USER_AGENT, &self.user_agent)
            .send()?
            .error_for_status()?
            .text()
            .with_context(|| format!("net: read fragment {url}"))?;
        Ok(body)
    }

    /// Fire-and-check action GET (favorite/unfavorite toggles).
    pub fn send_action(&self, url: &str) -> Result<()> {
        let absolute = self.absolutize(url)?;
        self.http
            .get(absolute.as_str())
            .header(USER_AGENT, &self.user_agent)
            .send()?
            .error_for_status()
            .with_context(|| format!("net: action {url}"))?;
        Ok(())
    }

    fn absolutize(&self, url: &str) -> Result<Url> {
        let base = Url::parse(&self.site_base)
            .with_context(|| format!("net: parse site base {}", self.site_base))?;
        base.join(url).with_context(|| format!("net: parse url {url}"))
    }
}

static ACTION_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"href="((?:hide|fave)\?[^"]*)""#).expect("action link pattern"));

/// Pull the authorization token off the first hide/fave link embedded in a
/// fetched item page.
pub fn auth_token_from_page(page: &str) -> Option<String> {
    let captures = ACTION_LINK.captures(page)?;
    let href = captures.get(1)?.as_str().replace("&amp;", "&");
    query_param(&href, "auth")
}

/// Read one query parameter off a url, absolute or site-relative.
pub fn query_param(url: &str, name: &str) -> Option<String> {
    let base = Url::parse(HN_SITE_BASE).ok()?;
    let parsed = base.join(url).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub created: i64,
    pub karma: i64,
    #[serde(default)]
    pub about: Option<String>,
    #[serde(default)]
    pub submitted: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default)]
    pub by: Option<String>,
    #[serde(default)]
    pub time: Option<i64>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub dead: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub parent: Option<i64>,
    #[serde(default)]
    pub kids: Option<Vec<i64>>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub descendants: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_user_agent_is_rejected() {
        let err = Client::new(ClientConfig::default()).unwrap_err();
        assert!(err.to_string().contains("user agent"));
    }

    #[test]
    fn query_param_handles_relative_urls() {
        assert_eq!(
            query_param("fave?id=42&auth=abc", "auth").as_deref(),
            Some("abc")
        );
        assert_eq!(
            query_param("https://news.ycombinator.com/hide?id=1&auth=xyz", "auth").as_deref(),
            Some("xyz")
        );
        assert_eq!(query_param("fave?id=42", "auth"), None);
    }

    #[test]
    fn auth_token_extracted_from_item_page() {
        let page = r#"<td class="subtext"><a href="hide?id=42&amp;auth=deadbeef&amp;goto=news">hide</a></td>"#;
        assert_eq!(auth_token_from_page(page).as_deref(), Some("deadbeef"));
    }

    #[test]
    fn auth_token_prefers_first_action_link() {
        let page = r#"
            <a href="item?id=1">comments</a>
            <a href="fave?id=42&amp;auth=tok1">favorite</a>
            <a href="hide?id=42&amp;auth=tok2">hide</a>
        "#;
        assert_eq!(auth_token_from_page(page).as_deref(), Some("tok1"));
    }

    #[test]
    fn missing_auth_link_yields_none() {
        assert_eq!(auth_token_from_page("<html><body>no links</body></html>"), None);
    }

    #[test]
    fn item_payload_deserializes_with_defaults() {
        let item: Item =
            serde_json::from_str(r#"{"id": 1, "type": "story", "title": "Hello"}"#).unwrap();
        assert_eq!(item.id, 1);
        assert_eq!(item.title.as_deref(), Some("Hello"));
        assert!(item.kids.is_none());
        assert!(!item.deleted);
    }
}
