//! HTTP method as a typed enum.
//!
//! Covers the verbs an RPC route can be declared with, plus `ALL`, the
//! catch-any method a route table falls back to when the specific verb has no
//! registration for a path.

use std::fmt;
use std::str::FromStr;

/// A route method.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Method {
    Delete,
    Get,
    Head,
    Options,
    Patch,
    Post,
    Put,
    /// Matches any verb. Only consulted after the specific-method lookup misses.
    All,
}

impl Method {
    /// Returns the uppercase representation (e.g. `"GET"`, `"ALL"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delete  => "DELETE",
            Self::Get     => "GET",
            Self::Head    => "HEAD",
            Self::Options => "OPTIONS",
            Self::Patch   => "PATCH",
            Self::Post    => "POST",
            Self::Put     => "PUT",
            Self::All     => "ALL",
        }
    }

    /// Parses a method-prefixed proxy property such as `"$get"` or `"$all"`.
    pub fn from_marker(marker: &str) -> Option<Self> {
        marker.strip_prefix('$')?.parse().ok()
    }

    /// The wire method. `All` has none: a request always carries a real verb.
    pub fn to_http(self) -> Option<http::Method> {
        Some(match self {
            Self::Delete  => http::Method::DELETE,
            Self::Get     => http::Method::GET,
            Self::Head    => http::Method::HEAD,
            Self::Options => http::Method::OPTIONS,
            Self::Patch   => http::Method::PATCH,
            Self::Post    => http::Method::POST,
            Self::Put     => http::Method::PUT,
            Self::All     => return None,
        })
    }
}

/// Parses a method name in any ASCII case (`"get"`, `"GET"`, `"All"`).
impl FromStr for Method {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const ALL: [Method; 8] = [
            Method::Delete,
            Method::Get,
            Method::Head,
            Method::Options,
            Method::Patch,
            Method::Post,
            Method::Put,
            Method::All,
        ];
        ALL.into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or(())
    }
}

impl TryFrom<&http::Method> for Method {
    type Error = ();

    fn try_from(method: &http::Method) -> Result<Self, Self::Error> {
        method.as_str().parse()
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_any_case() {
        assert_eq!("get".parse::<Method>(), Ok(Method::Get));
        assert_eq!("PATCH".parse::<Method>(), Ok(Method::Patch));
        assert_eq!("All".parse::<Method>(), Ok(Method::All));
        assert!("BREW".parse::<Method>().is_err());
    }

    #[test]
    fn markers_need_the_dollar_prefix() {
        assert_eq!(Method::from_marker("$post"), Some(Method::Post));
        assert_eq!(Method::from_marker("$all"), Some(Method::All));
        assert_eq!(Method::from_marker("post"), None);
    }

    #[test]
    fn all_has_no_wire_method() {
        assert_eq!(Method::All.to_http(), None);
        assert_eq!(Method::Put.to_http(), Some(http::Method::PUT));
        assert_eq!(Method::try_from(&http::Method::DELETE), Ok(Method::Delete));
    }
}
