//! Bundle-relative file references.

use serde::{Deserialize, Serialize};

/// Where the viewer fetches a [`Url`] from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlKind {
    /// Relative to the sample directory.
    #[default]
    Local,
    /// An absolute address served elsewhere.
    Network,
}

/// A file referenced from the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Url {
    pub url: String,
    #[serde(rename = "type", default)]
    pub kind: UrlKind,
}

impl Url {
    /// A file inside the sample directory.
    pub fn local(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: UrlKind::Local,
        }
    }

    pub fn network(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: UrlKind::Network,
        }
    }
}

impl std::fmt::Display for Url {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_string(&Url::local("spots.csv")).unwrap();
        assert_eq!(json, r#"{"url":"spots.csv","type":"local"}"#);
        let back: Url = serde_json::from_str(r#"{"url":"https://x/y.bin"}"#).unwrap();
        assert_eq!(back.kind, UrlKind::Local);
        let net: Url = serde_json::from_str(r#"{"url":"https://x/y.bin","type":"network"}"#).unwrap();
        assert_eq!(net, Url::network("https://x/y.bin"));
    }
}
