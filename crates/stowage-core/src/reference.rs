//! Package references, settings, options and profiles
//!
//! A reference has the form `name/version[@user/channel][#revision]`.
//! Settings and options are ordered string maps so that everything derived
//! from them (package IDs, generated file names) is deterministic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Reference to a package recipe
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageRef {
    pub name: String,
    pub version: String,
    pub user: Option<String>,
    pub channel: Option<String>,
    pub revision: Option<String>,
}

impl PackageRef {
    /// Create a reference with only name and version
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            user: None,
            channel: None,
            revision: None,
        }
    }

    /// Whether this reference names the same recipe as `other`, ignoring the revision
    pub fn same_recipe(&self, other: &PackageRef) -> bool {
        self.name == other.name
            && self.version == other.version
            && self.user == other.user
            && self.channel == other.channel
    }
}

fn valid_token(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '+'))
}

impl FromStr for PackageRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |detail: &str| {
            Error::reference(
                format!("'{}': {}", s, detail),
                "References look like name/version, optionally followed by @user/channel and #revision",
            )
        };

        let (rest, revision) = match s.split_once('#') {
            Some((rest, rev)) => (rest, Some(rev.to_string())),
            None => (s, None),
        };
        let (name_version, user_channel) = match rest.split_once('@') {
            Some((nv, uc)) => (nv, Some(uc)),
            None => (rest, None),
        };

        let (name, version) = name_version
            .split_once('/')
            .ok_or_else(|| invalid("missing '/version'"))?;
        if !valid_token(name) {
            return Err(invalid("invalid package name"));
        }
        if !valid_token(version) {
            return Err(invalid("invalid version"));
        }

        let (user, channel) = match user_channel {
            Some(uc) => {
                let (user, channel) = uc
                    .split_once('/')
                    .ok_or_else(|| invalid("user must be followed by '/channel'"))?;
                if !valid_token(user) || !valid_token(channel) {
                    return Err(invalid("invalid user or channel"));
                }
                (Some(user.to_string()), Some(channel.to_string()))
            }
            None => (None, None),
        };

        if let Some(ref rev) = revision {
            if !valid_token(rev) {
                return Err(invalid("invalid revision"));
            }
        }

        Ok(PackageRef {
            name: name.to_string(),
            version: version.to_string(),
            user,
            channel,
            revision,
        })
    }
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)?;
        if let (Some(user), Some(channel)) = (&self.user, &self.channel) {
            write!(f, "@{}/{}", user, channel)?;
        }
        if let Some(ref rev) = self.revision {
            write!(f, "#{}", rev)?;
        }
        Ok(())
    }
}

impl Serialize for PackageRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PackageRef {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Dependency context: packages consumed at run time (host) or build time (build)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Context {
    Host,
    Build,
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Context::Host => write!(f, "host"),
            Context::Build => write!(f, "build"),
        }
    }
}

/// Build settings such as `build_type` and `arch`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(BTreeMap<String, String>);

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of a setting, if defined
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|s| s.as_str())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for Settings {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Package options such as `shared`
pub type Options = Settings;

/// Split a `key=value` argument
pub fn parse_key_value(arg: &str) -> Result<(String, String)> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(Error::reference(
            format!("'{}' is not a key=value pair", arg),
            "Use the form key=value, for example build_type=Debug",
        )),
    }
}

/// An option value applying to the packages matched by `pattern`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionOverride {
    /// `*`, an exact package name, or a `prefix*` glob
    pub pattern: String,
    pub key: String,
    pub value: String,
}

impl OptionOverride {
    /// Parse `pattern:key=value`; a missing pattern means every package
    pub fn parse(arg: &str) -> Result<Self> {
        let (lhs, value) = parse_key_value(arg)?;
        let (pattern, key) = match lhs.rsplit_once(':') {
            Some((pattern, key)) => (pattern.to_string(), key.to_string()),
            None => ("*".to_string(), lhs),
        };
        Ok(Self {
            pattern,
            key,
            value,
        })
    }

    pub fn matches(&self, package_name: &str) -> bool {
        if self.pattern == "*" {
            return true;
        }
        match self.pattern.strip_suffix('*') {
            Some(prefix) => package_name.starts_with(prefix),
            None => self.pattern == package_name,
        }
    }
}

/// Settings and option overrides used to select binaries
#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub settings: Settings,
    pub options: Vec<OptionOverride>,
}

impl Profile {
    /// Apply `key=value` setting overrides and `pattern:key=value` option overrides
    pub fn with_overrides(mut self, settings: &[String], options: &[String]) -> Result<Self> {
        for arg in settings {
            let (key, value) = parse_key_value(arg)?;
            self.settings.set(key, value);
        }
        for arg in options {
            self.options.push(OptionOverride::parse(arg)?);
        }
        Ok(self)
    }

    /// Value requested for option `key` of package `package_name`; the last matching override wins
    pub fn option_value(&self, package_name: &str, key: &str) -> Option<&str> {
        self.options
            .iter()
            .rev()
            .find(|o| o.key == key && o.matches(package_name))
            .map(|o| o.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_reference() {
        let r: PackageRef = "hello/0.1".parse().unwrap();
        assert_eq!(r.name, "hello");
        assert_eq!(r.version, "0.1");
        assert!(r.user.is_none());
        assert_eq!(r.to_string(), "hello/0.1");
    }

    #[test]
    fn test_parse_full_reference() {
        let r: PackageRef = "zlib/1.3.1@acme/stable#abc123".parse().unwrap();
        assert_eq!(r.user.as_deref(), Some("acme"));
        assert_eq!(r.channel.as_deref(), Some("stable"));
        assert_eq!(r.revision.as_deref(), Some("abc123"));
        assert_eq!(r.to_string(), "zlib/1.3.1@acme/stable#abc123");
        assert!(r.same_recipe(&"zlib/1.3.1@acme/stable".parse().unwrap()));
    }

    #[test]
    fn test_parse_invalid_references() {
        assert!("hello".parse::<PackageRef>().is_err());
        assert!("/1.0".parse::<PackageRef>().is_err());
        assert!("hello/".parse::<PackageRef>().is_err());
        assert!("hello/1.0@user".parse::<PackageRef>().is_err());
        assert!("hel lo/1.0".parse::<PackageRef>().is_err());
    }

    #[test]
    fn test_option_override_patterns() {
        let all = OptionOverride::parse("*:shared=True").unwrap();
        assert!(all.matches("hello"));

        let exact = OptionOverride::parse("hello:shared=False").unwrap();
        assert!(exact.matches("hello"));
        assert!(!exact.matches("hello2"));

        let prefix = OptionOverride::parse("boost*:header_only=True").unwrap();
        assert!(prefix.matches("boost_asio"));
        assert!(!prefix.matches("zlib"));

        let bare = OptionOverride::parse("fPIC=True").unwrap();
        assert_eq!(bare.pattern, "*");
        assert_eq!(bare.key, "fPIC");
    }

    #[test]
    fn test_profile_overrides_last_wins() {
        let profile = Profile::default()
            .with_overrides(
                &["build_type=Debug".to_string()],
                &["*:shared=True".to_string(), "hello:shared=False".to_string()],
            )
            .unwrap();

        assert_eq!(profile.settings.get("build_type"), Some("Debug"));
        assert_eq!(profile.option_value("hello", "shared"), Some("False"));
        assert_eq!(profile.option_value("tool", "shared"), Some("True"));
        assert_eq!(profile.option_value("tool", "fPIC"), None);
    }

    #[test]
    fn test_parse_key_value_requires_equals() {
        assert!(parse_key_value("build_type").is_err());
        assert_eq!(
            parse_key_value("arch=x86").unwrap(),
            ("arch".to_string(), "x86".to_string())
        );
    }
}
