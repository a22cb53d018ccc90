use std::convert::Infallible;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

/// What kind of resource a request is loading, as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Document,
    Script,
    Style,
    Image,
    #[default]
    Other,
}

/// Unknown values (including the empty string browsers report for
/// fetch/XHR) map to `Other`.
impl FromStr for Destination {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "document" => Destination::Document,
            "script" => Destination::Script,
            "style" => Destination::Style,
            "image" => Destination::Image,
            _ => Destination::Other,
        })
    }
}

impl Destination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::Document => "document",
            Destination::Script => "script",
            Destination::Style => "style",
            Destination::Image => "image",
            Destination::Other => "other",
        }
    }

    /// Subresources served cache-first with no offline page.
    pub fn is_asset(&self) -> bool {
        matches!(
            self,
            Destination::Script | Destination::Style | Destination::Image
        )
    }
}

/// An intercepted outgoing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub destination: Destination,
}

impl Request {
    pub fn new(method: &str, url: impl Into<String>, destination: Destination) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            url: url.into(),
            destination,
        }
    }

    /// Shorthand for a GET request.
    pub fn get(url: impl Into<String>, destination: Destination) -> Self {
        Self::new("GET", url, destination)
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    /// Key under which a response to this request is stored.
    ///
    /// Only GET requests are ever stored, so the URL alone identifies an
    /// entry. Absolute URLs on `origin` reduce to path and query, so
    /// `http://host/manifest.json` and `/manifest.json` share one entry.
    /// Fragments never take part in the key.
    pub fn cache_key(&self, origin: Option<&Url>) -> String {
        match Url::parse(&self.url) {
            Ok(url) if origin.is_some_and(|o| o.origin() == url.origin()) => match url.query() {
                Some(query) => format!("{}?{}", url.path(), query),
                None => url.path().to_string(),
            },
            Ok(mut url) => {
                url.set_fragment(None);
                url.into()
            }
            Err(_) => match self.url.split_once('#') {
                Some((path, _)) => path.to_string(),
                None => self.url.clone(),
            },
        }
    }

    /// Whether the request targets the application shell (`/` or `/index.html`).
    pub fn is_app_shell(&self) -> bool {
        self.url.ends_with('/') || self.url.ends_with("/index.html")
    }
}
