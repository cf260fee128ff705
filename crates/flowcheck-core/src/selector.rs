//! Typed element queries and their interpreter
//!
//! Configuration files carry selector strings in the familiar CSS /
//! `:has-text()` dialect. [`Query::parse`] lifts each string into a tagged
//! variant so every strategy can be evaluated (and tested) on its own:
//!
//! - `#login-email`, `input[type='email']`, `[placeholder*='Search']` become [`Query::ByAttribute`]
//! - `button:has-text('Accept')`, `text=Next` become [`Query::ByText`]
//! - `[role='main']` becomes [`Query::ByRole`]
//! - anything else stays [`Query::Generic`] and is left to the driver's CSS engine
//!
//! Drivers that work from element snapshots narrow the page with
//! [`Query::css_prefilter`] and then call [`Query::matches`] on each snapshot.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::{FlowError, Result};

/// How an attribute value is compared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum AttrMatch {
    /// Attribute exists, any value
    Present,
    /// Exact value (`[a='v']`)
    Equals(String),
    /// Substring, case-insensitive (`[a*='v']`)
    Contains(String),
    /// Whitespace-separated token (`[a~='v']`, `.class`)
    Token(String),
}

/// One element-query strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Query {
    ByAttribute {
        tag: Option<String>,
        name: String,
        value: AttrMatch,
    },
    ByText {
        tag: Option<String>,
        text: String,
        /// Reject elements whose text also contains this (e.g. third-party OAuth buttons)
        exclude: Option<String>,
    },
    ByRole {
        role: String,
        name: Option<String>,
    },
    /// Raw CSS, evaluated by the driver
    Generic(String),
}

/// What a driver knows about one element when it snapshots the page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    /// Lowercase tag name
    pub tag: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Trimmed text content
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub visible: bool,
}

impl ElementSnapshot {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            text: String::new(),
            visible: true,
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

const TAG_PATTERN: &str = r"[a-zA-Z][a-zA-Z0-9-]*";

fn id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^#(?P<id>[A-Za-z_][-A-Za-z0-9_:.]*)$").expect("valid regex"))
}

fn class_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"^(?P<tag>{TAG_PATTERN})?\.(?P<class>[-A-Za-z0-9_]+)$"))
            .expect("valid regex")
    })
}

fn attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r#"^(?P<tag>{TAG_PATTERN})?\[\s*(?P<name>[a-zA-Z_:][-a-zA-Z0-9_:.]*)\s*(?:(?P<op>[*~]?=)\s*(?:'(?P<sq>[^']*)'|"(?P<dq>[^"]*)"|(?P<bare>[^\]\s'"]+))\s*)?\]$"#
        ))
        .expect("valid regex")
    })
}

fn text_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r#"^(?P<tag>{TAG_PATTERN})?:has-text\((?:'(?P<sq>[^']*)'|"(?P<dq>[^"]*)")\)(?::not\(:has-text\((?:'(?P<nsq>[^']*)'|"(?P<ndq>[^"]*)")\)\))?$"#
        ))
        .expect("valid regex")
    })
}

/// Tags that carry an implicit ARIA role
fn implicit_role_tags(role: &str) -> &'static [&'static str] {
    match role {
        "button" => &["button"],
        "link" => &["a"],
        "textbox" => &["input", "textarea"],
        "main" => &["main"],
        "navigation" => &["nav"],
        "form" => &["form"],
        "search" => &["search"],
        _ => &[],
    }
}

/// Tags considered when a text query names no tag
const TEXT_HOST_TAGS: &str =
    "a, button, [role='button'], [role='link'], input[type='submit'], input[type='button'], label, span";

impl Query {
    /// Parse a selector string into a typed query
    pub fn parse(selector: &str) -> Result<Self> {
        let selector = selector.trim();
        if selector.is_empty() {
            return Err(FlowError::InvalidSelector("empty selector".to_string()));
        }

        if let Some(text) = selector.strip_prefix("text=") {
            let text = text.trim().trim_matches(|c| c == '\'' || c == '"');
            if text.is_empty() {
                return Err(FlowError::InvalidSelector(selector.to_string()));
            }
            return Ok(Query::ByText {
                tag: None,
                text: text.to_string(),
                exclude: None,
            });
        }

        if let Some(caps) = id_re().captures(selector) {
            return Ok(Query::ByAttribute {
                tag: None,
                name: "id".to_string(),
                value: AttrMatch::Equals(caps["id"].to_string()),
            });
        }

        if let Some(caps) = class_re().captures(selector) {
            return Ok(Query::ByAttribute {
                tag: caps.name("tag").map(|m| m.as_str().to_ascii_lowercase()),
                name: "class".to_string(),
                value: AttrMatch::Token(caps["class"].to_string()),
            });
        }

        if let Some(caps) = attr_re().captures(selector) {
            let tag = caps.name("tag").map(|m| m.as_str().to_ascii_lowercase());
            let name = caps["name"].to_ascii_lowercase();
            let raw = caps
                .name("sq")
                .or_else(|| caps.name("dq"))
                .or_else(|| caps.name("bare"))
                .map(|m| m.as_str().to_string());
            let value = match (caps.name("op").map(|m| m.as_str()), raw) {
                (None, _) => AttrMatch::Present,
                (Some("="), Some(v)) => AttrMatch::Equals(v),
                (Some("*="), Some(v)) => AttrMatch::Contains(v),
                (Some("~="), Some(v)) => AttrMatch::Token(v),
                _ => return Err(FlowError::InvalidSelector(selector.to_string())),
            };

            if name == "role" && tag.is_none() {
                if let AttrMatch::Equals(role) = &value {
                    return Ok(Query::ByRole {
                        role: role.clone(),
                        name: None,
                    });
                }
            }

            return Ok(Query::ByAttribute { tag, name, value });
        }

        if let Some(caps) = text_re().captures(selector) {
            let text = caps
                .name("sq")
                .or_else(|| caps.name("dq"))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            if text.is_empty() {
                return Err(FlowError::InvalidSelector(selector.to_string()));
            }
            let exclude = caps
                .name("nsq")
                .or_else(|| caps.name("ndq"))
                .map(|m| m.as_str().to_string());
            return Ok(Query::ByText {
                tag: caps.name("tag").map(|m| m.as_str().to_ascii_lowercase()),
                text,
                exclude,
            });
        }

        Ok(Query::Generic(selector.to_string()))
    }

    /// CSS that narrows the page to elements this query could match
    pub fn css_prefilter(&self) -> String {
        match self {
            Query::ByAttribute { tag, name, .. } => {
                format!("{}[{}]", tag.as_deref().unwrap_or(""), name)
            }
            Query::ByText { tag: Some(tag), .. } => tag.clone(),
            Query::ByText { tag: None, .. } => TEXT_HOST_TAGS.to_string(),
            Query::ByRole { role, .. } => {
                let mut parts = vec![format!("[role='{}']", role)];
                parts.extend(implicit_role_tags(role).iter().map(|t| t.to_string()));
                parts.join(", ")
            }
            Query::Generic(css) => css.clone(),
        }
    }

    /// Evaluate this query against a snapshot
    ///
    /// `Generic` queries are resolved by the driver's own CSS engine, so every
    /// element the driver pre-filtered for them is accepted here. Visibility is
    /// not part of matching; callers filter on [`ElementSnapshot::visible`].
    pub fn matches(&self, el: &ElementSnapshot) -> bool {
        match self {
            Query::ByAttribute { tag, name, value } => {
                tag_matches(tag.as_deref(), &el.tag)
                    && match el.attr(name) {
                        None => false,
                        Some(actual) => value.accepts(actual),
                    }
            }
            Query::ByText { tag, text, exclude } => {
                let haystack = el.text.to_lowercase();
                tag_matches(tag.as_deref(), &el.tag)
                    && haystack.contains(&text.to_lowercase())
                    && exclude
                        .as_ref()
                        .map_or(true, |ex| !haystack.contains(&ex.to_lowercase()))
            }
            Query::ByRole { role, name } => {
                let role_ok = match el.attr("role") {
                    Some(explicit) => explicit.eq_ignore_ascii_case(role),
                    None => implicit_role(el).is_some_and(|r| r == role),
                };
                role_ok
                    && name.as_ref().map_or(true, |n| {
                        let n = n.to_lowercase();
                        el.attr("aria-label")
                            .is_some_and(|l| l.to_lowercase().contains(&n))
                            || el.text.to_lowercase().contains(&n)
                    })
            }
            Query::Generic(_) => true,
        }
    }
}

impl AttrMatch {
    fn accepts(&self, actual: &str) -> bool {
        match self {
            AttrMatch::Present => true,
            AttrMatch::Equals(v) => actual == v,
            AttrMatch::Contains(v) => actual.to_lowercase().contains(&v.to_lowercase()),
            AttrMatch::Token(v) => actual.split_whitespace().any(|t| t == v),
        }
    }
}

fn tag_matches(wanted: Option<&str>, actual: &str) -> bool {
    wanted.map_or(true, |t| t == "*" || t.eq_ignore_ascii_case(actual))
}

fn implicit_role(el: &ElementSnapshot) -> Option<&'static str> {
    match el.tag.as_str() {
        "button" => Some("button"),
        "a" if el.attr("href").is_some() => Some("link"),
        "textarea" => Some("textbox"),
        "input" => match el.attr("type").unwrap_or("text") {
            "submit" | "button" | "reset" => Some("button"),
            "text" | "email" | "tel" | "url" | "search" => Some("textbox"),
            _ => None,
        },
        "main" => Some("main"),
        "nav" => Some("navigation"),
        "form" => Some("form"),
        _ => None,
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::ByAttribute { tag, name, value } => {
                let tag = tag.as_deref().unwrap_or("");
                match value {
                    AttrMatch::Equals(v) if name == "id" && tag.is_empty() => write!(f, "#{}", v),
                    AttrMatch::Token(v) if name == "class" => write!(f, "{}.{}", tag, v),
                    AttrMatch::Present => write!(f, "{}[{}]", tag, name),
                    AttrMatch::Equals(v) => write!(f, "{}[{}='{}']", tag, name, v),
                    AttrMatch::Contains(v) => write!(f, "{}[{}*='{}']", tag, name, v),
                    AttrMatch::Token(v) => write!(f, "{}[{}~='{}']", tag, name, v),
                }
            }
            Query::ByText { tag: None, text, exclude: None } => write!(f, "text={}", text),
            Query::ByText { tag, text, exclude } => {
                write!(f, "{}:has-text('{}')", tag.as_deref().unwrap_or(""), text)?;
                if let Some(ex) = exclude {
                    write!(f, ":not(:has-text('{}'))", ex)?;
                }
                Ok(())
            }
            Query::ByRole { role, name: None } => write!(f, "[role='{}']", role),
            Query::ByRole { role, name: Some(n) } => write!(f, "[role='{}'][name~='{}']", role, n),
            Query::Generic(css) => write!(f, "{}", css),
        }
    }
}

/// Ordered, non-empty list of queries: most specific first, most generic last
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct SelectorCandidates(Vec<Query>);

impl SelectorCandidates {
    pub fn new(queries: Vec<Query>) -> Result<Self> {
        if queries.is_empty() {
            return Err(FlowError::Config(
                "selector candidate list must not be empty".to_string(),
            ));
        }
        Ok(Self(queries))
    }

    /// Parse every selector string, preserving order
    pub fn parse<S: AsRef<str>>(selectors: &[S]) -> Result<Self> {
        let queries = selectors
            .iter()
            .map(|s| Query::parse(s.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Self::new(queries)
    }

    /// Built-in lists; strings that fail to parse degrade to raw CSS
    pub(crate) fn builtin(selectors: &[&str]) -> Self {
        Self(
            selectors
                .iter()
                .map(|s| Query::parse(s).unwrap_or_else(|_| Query::Generic(s.to_string())))
                .collect(),
        )
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Query> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for clippy's `len_without_is_empty`
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Query> {
        self.0.get(index)
    }
}

impl TryFrom<Vec<String>> for SelectorCandidates {
    type Error = FlowError;

    fn try_from(value: Vec<String>) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<SelectorCandidates> for Vec<String> {
    fn from(value: SelectorCandidates) -> Self {
        value.0.iter().map(|q| q.to_string()).collect()
    }
}

impl<'a> IntoIterator for &'a SelectorCandidates {
    type Item = &'a Query;
    type IntoIter = std::slice::Iter<'a, Query>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Last-resort scan: look at every element of a broad kind and score it
/// against loose keyword hints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSpec {
    /// Element kind to scan (`input`, `div`, `button`)
    pub tag: String,
    /// Attributes to inspect; `text` means the element's text content
    pub attributes: Vec<String>,
    pub keywords: Vec<String>,
    /// Stop after this many elements
    pub limit: usize,
}

impl ScanSpec {
    /// Count keyword hits across the inspected values
    pub fn score<'a, I>(&self, values: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let keywords: Vec<String> = self.keywords.iter().map(|k| k.to_lowercase()).collect();
        values
            .into_iter()
            .map(|v| {
                let v = v.to_lowercase();
                keywords.iter().filter(|k| v.contains(k.as_str())).count()
            })
            .sum()
    }
}
