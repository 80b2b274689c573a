//! When the shell injects a watcher into a tab.
//!
//! Injection is deliberately loose: every qualifying navigation injects a
//! fresh copy and the copies sort out ownership among themselves.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

/// Pull request page path, e.g. `/octo/repo/pull/42`.
static PULL_REQUEST_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"/pull/\d+$").unwrap());

/// How the browser got to a committed navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionType {
    Link,
    Typed,
    AutoBookmark,
    AutoSubframe,
    ManualSubframe,
    Generated,
    StartPage,
    FormSubmit,
    Reload,
    Keyword,
    KeywordGenerated,
}

impl TransitionType {
    pub fn as_str(self) -> &'static str {
        match self {
            TransitionType::Link => "link",
            TransitionType::Typed => "typed",
            TransitionType::AutoBookmark => "auto_bookmark",
            TransitionType::AutoSubframe => "auto_subframe",
            TransitionType::ManualSubframe => "manual_subframe",
            TransitionType::Generated => "generated",
            TransitionType::StartPage => "start_page",
            TransitionType::FormSubmit => "form_submit",
            TransitionType::Reload => "reload",
            TransitionType::Keyword => "keyword",
            TransitionType::KeywordGenerated => "keyword_generated",
        }
    }

    /// Navigations that load a new top-level page the user asked for.
    pub fn injects(self) -> bool {
        matches!(
            self,
            TransitionType::Reload
                | TransitionType::Link
                | TransitionType::Typed
                | TransitionType::Generated
        )
    }
}

impl fmt::Display for TransitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransitionType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let transition = match value {
            "link" => TransitionType::Link,
            "typed" => TransitionType::Typed,
            "auto_bookmark" => TransitionType::AutoBookmark,
            "auto_subframe" => TransitionType::AutoSubframe,
            "manual_subframe" => TransitionType::ManualSubframe,
            "generated" => TransitionType::Generated,
            "start_page" => TransitionType::StartPage,
            "form_submit" => TransitionType::FormSubmit,
            "reload" => TransitionType::Reload,
            "keyword" => TransitionType::Keyword,
            "keyword_generated" => TransitionType::KeywordGenerated,
            other => return Err(format!("unknown transition type: {}", other)),
        };
        Ok(transition)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionPolicy {
    host_permissions: Vec<String>,
}

impl InjectionPolicy {
    pub fn new(host_permissions: Vec<String>) -> Self {
        Self { host_permissions }
    }

    pub fn is_permitted(&self, url: &str) -> bool {
        self.host_permissions
            .iter()
            .any(|prefix| url.starts_with(prefix.as_str()))
    }

    /// Navigation committed in a tab; the watcher goes in once loading completes.
    pub fn on_committed(&self, url: &str, transition: TransitionType) -> bool {
        transition.injects() && self.is_permitted(url)
    }

    pub fn on_tab_created(&self, url: Option<&str>) -> bool {
        url.is_some_and(|url| self.is_permitted(url))
    }

    /// Install-time sweep over already open tabs: pull request pages only.
    pub fn on_install(&self, url: &str) -> bool {
        self.is_permitted(url) && is_pull_request_url(url)
    }
}

/// Whether the URL's path ends in `/pull/<number>`; query and fragment are ignored.
pub fn is_pull_request_url(url: &str) -> bool {
    let after_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = match after_scheme.find('/') {
        Some(start) => &after_scheme[start..],
        None => return false,
    };
    let path = path.split(['?', '#']).next().unwrap_or_default();
    PULL_REQUEST_PATH.is_match(path)
}
