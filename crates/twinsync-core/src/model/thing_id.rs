// ── Twin identity ──
//
// Every twin on the server is addressed by a stable name. `ThingId` wraps
// that name so it can't be confused with feature names or raw child tokens.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identity of a remote twin, e.g. `"device-1/sensor"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThingId(String);

impl ThingId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Identity of the sub-resource `suffix` of the child named `raw` in the
    /// root twin's membership list.
    pub fn child(raw: &str, suffix: &str) -> Self {
        Self(format!("{raw}{suffix}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ThingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ThingId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<String> for ThingId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ThingId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl Borrow<str> for ThingId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ThingId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn child_appends_suffix() {
        assert_eq!(ThingId::child("dev1", "/sensor").as_str(), "dev1/sensor");
        assert_eq!(ThingId::child("dev1", "").as_str(), "dev1");
    }

    #[test]
    fn lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(ThingId::from("a/sensor"), 1);
        assert_eq!(map.get("a/sensor"), Some(&1));
    }

    #[test]
    fn serializes_as_plain_string() {
        let id: ThingId = "root".parse().unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"root\"");
    }
}
