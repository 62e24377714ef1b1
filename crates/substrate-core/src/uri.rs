//! URI parsing, scheme taxonomy, and the program key.
//!
//! A URI is `<scheme>://<authority><path>`. The program key is
//! `<scheme>://<authority>`; validators are registered against it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use substrate_error::SubstrateError;

/// The well-known scheme taxonomy from the data model. Schemes outside this
/// set (`msg://`, app-defined schemes) still parse fine — only their
/// matched variant differs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// Overwrite-in-place semantics.
    Mutable,
    /// First-write-wins semantics.
    Immutable,
    /// Content-addressed by `<algo>:<digest>` embedded in the authority.
    Hash,
    /// A record whose data is itself a URI (or an envelope wrapping one).
    Link,
    /// Content-addressed blob, conventionally `blob://open/sha256:<hex>`.
    Blob,
    /// No built-in semantics beyond the uniform protocol.
    Msg,
    /// Reserved for tests.
    Test,
    /// Any other application-defined scheme.
    Other(String),
}

impl Scheme {
    /// Parse a scheme label (the text before `://`).
    pub fn parse(label: &str) -> Self {
        match label {
            "mutable" => Self::Mutable,
            "immutable" => Self::Immutable,
            "hash" => Self::Hash,
            "link" => Self::Link,
            "blob" => Self::Blob,
            "msg" => Self::Msg,
            "test" => Self::Test,
            other => Self::Other(other.to_string()),
        }
    }

    /// The scheme label as it appears in a URI.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Mutable => "mutable",
            Self::Immutable => "immutable",
            Self::Hash => "hash",
            Self::Link => "link",
            Self::Blob => "blob",
            Self::Msg => "msg",
            Self::Test => "test",
            Self::Other(s) => s,
        }
    }

    /// Content-addressed schemes require the digest of the stored data to
    /// match a digest declared in the URI.
    pub fn is_content_addressed(&self) -> bool {
        matches!(self, Self::Hash | Self::Blob)
    }

    /// First-write-wins schemes reject a second `receive` to the same URI.
    pub fn is_first_write_wins(&self) -> bool {
        matches!(self, Self::Immutable | Self::Hash | Self::Blob)
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `<scheme>://<authority>` prefix of a [`Uri`]. Validators are keyed by
/// program key, not by the full URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProgramKey(String);

impl ProgramKey {
    /// Construct a program key from its textual `scheme://authority` form.
    pub fn new(scheme: &str, authority: &str) -> Self {
        Self(format!("{scheme}://{authority}"))
    }

    /// The raw `scheme://authority` string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProgramKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A parsed URI of the form `<scheme>://<authority><path>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Uri {
    raw: String,
    scheme_end: usize,
    authority_end: usize,
}

impl Uri {
    /// Parse a URI string. Fails if it has no `://` separator or an empty
    /// scheme/authority.
    pub fn parse(raw: &str) -> Result<Self, SubstrateError> {
        if raw.is_empty() {
            return Err(SubstrateError::validation_failed("uri must not be empty"));
        }
        let sep = raw.find("://").ok_or_else(|| {
            SubstrateError::validation_failed(format!("uri missing scheme separator: {raw}"))
        })?;
        if sep == 0 {
            return Err(SubstrateError::validation_failed("uri scheme must not be empty"));
        }
        let after_scheme = sep + 3;
        let rest = &raw[after_scheme..];
        let authority_len = rest.find('/').unwrap_or(rest.len());
        if authority_len == 0 {
            return Err(SubstrateError::validation_failed("uri authority must not be empty"));
        }
        Ok(Self {
            raw: raw.to_string(),
            scheme_end: sep,
            authority_end: after_scheme + authority_len,
        })
    }

    /// The full URI string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The scheme label.
    pub fn scheme_str(&self) -> &str {
        &self.raw[..self.scheme_end]
    }

    /// The parsed [`Scheme`].
    pub fn scheme(&self) -> Scheme {
        Scheme::parse(self.scheme_str())
    }

    /// The authority segment (opaque label after `scheme://`, before the
    /// first `/`).
    pub fn authority(&self) -> &str {
        &self.raw[self.scheme_end + 3..self.authority_end]
    }

    /// The path, including its leading `/` if present, or `""` if the URI
    /// has no path beyond its authority.
    pub fn path(&self) -> &str {
        &self.raw[self.authority_end..]
    }

    /// The `scheme://authority` program key.
    pub fn program_key(&self) -> ProgramKey {
        ProgramKey::new(self.scheme_str(), self.authority())
    }

    /// `true` if `self` begins with `prefix` treated as a directory-like
    /// path prefix — used by `list` to enumerate children.
    pub fn has_prefix(&self, prefix: &Uri) -> bool {
        self.raw.starts_with(prefix.raw.as_str())
    }

    /// Extracts `(algo, hex_digest)` for content-addressed URIs.
    ///
    /// `hash://<algo>:<digest>/…` embeds it in the authority; the
    /// `blob://open/sha256:<hex>` convention embeds it as a path segment.
    /// Both are searched for a token containing `:`.
    pub fn content_digest(&self) -> Option<(&str, &str)> {
        if let Some((algo, hex)) = self.authority().split_once(':') {
            return Some((algo, hex));
        }
        self.path()
            .trim_start_matches('/')
            .split('/')
            .find_map(|seg| seg.split_once(':'))
    }
}

impl FromStr for Uri {
    type Err = SubstrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for Uri {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Uri {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Uri::parse(&s).map_err(serde::de::Error::custom)
    }
}
