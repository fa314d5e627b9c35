//! Declarative cache policy and per-endpoint resolution.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::GateError;

/// How long a stored response stays valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ttl {
    /// Never expires.
    Forever,
    /// Expires after the given duration. Zero means "do not cache".
    After(Duration),
}

impl Ttl {
    /// A TTL of whole seconds.
    pub const fn seconds(secs: u64) -> Self {
        Ttl::After(Duration::from_secs(secs))
    }

    /// Parse a TTL from (possibly fractional) seconds.
    ///
    /// Negative and non-finite values are configuration errors, as are
    /// durations whose millisecond count does not fit in a `u64`.
    pub fn from_seconds(secs: f64) -> Result<Self, GateError> {
        let ttl = Duration::try_from_secs_f64(secs)
            .map_err(|_| GateError::config(format!("invalid TTL: {secs} seconds")))?;
        if u64::try_from(ttl.as_millis()).is_err() {
            return Err(GateError::config(format!("TTL too large: {secs} seconds")));
        }
        Ok(Ttl::After(ttl))
    }

    /// Whether this TTL makes a stored entry immediately stale.
    ///
    /// Entries are stamped in whole milliseconds, so anything under 1ms
    /// counts as zero.
    pub fn is_zero(&self) -> bool {
        matches!(self, Ttl::After(d) if d.as_millis() == 0)
    }

    /// The duration, or `None` for [`Ttl::Forever`].
    pub fn duration(&self) -> Option<Duration> {
        match self {
            Ttl::Forever => None,
            Ttl::After(d) => Some(*d),
        }
    }
}

/// Where cached responses live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Volatile in-process map, lost on exit.
    Memory,
    /// Single-file embedded database that survives restarts.
    #[default]
    #[serde(alias = "sqlite")]
    Persistent,
}

impl std::fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheBackend::Memory => write!(f, "memory"),
            CacheBackend::Persistent => write!(f, "persistent"),
        }
    }
}

/// Cache settings for every path under one endpoint prefix.
///
/// Unset fields fall back to the [`CacheConfig`] defaults. A `ttl` of `null`
/// in JSON means [`Ttl::Forever`]; an absent `ttl` inherits the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EndpointOverride {
    /// Enable or disable caching for the prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// TTL for the prefix.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "ttl_seconds::optional"
    )]
    pub ttl: Option<Ttl>,
}

impl EndpointOverride {
    /// Override only the TTL.
    pub fn ttl(ttl: Ttl) -> Self {
        Self {
            enabled: None,
            ttl: Some(ttl),
        }
    }

    /// Disable caching for the prefix.
    pub fn disabled() -> Self {
        Self {
            enabled: Some(false),
            ttl: None,
        }
    }
}

/// Table of endpoint-prefix overrides resolved by longest match.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointOverrides(BTreeMap<String, EndpointOverride>);

impl EndpointOverrides {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the override for `prefix`.
    pub fn insert(&mut self, prefix: impl Into<String>, config: EndpointOverride) {
        self.0.insert(prefix.into(), config);
    }

    /// The override with the longest prefix of `path`, if any.
    pub fn longest_match(&self, path: &str) -> Option<(&str, &EndpointOverride)> {
        self.0
            .iter()
            .filter(|(prefix, _)| path.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(prefix, config)| (prefix.as_str(), config))
    }

    /// Number of configured prefixes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no prefixes are configured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<P: Into<String>> FromIterator<(P, EndpointOverride)> for EndpointOverrides {
    fn from_iter<I: IntoIterator<Item = (P, EndpointOverride)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(p, c)| (p.into(), c)).collect())
    }
}

/// Effective caching policy for one request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPolicy {
    /// Whether caching applies.
    pub enabled: bool,
    /// TTL for entries written under this policy.
    pub ttl: Ttl,
}

impl ResolvedPolicy {
    /// Whether the store should be consulted and written at all.
    pub fn is_cacheable(&self) -> bool {
        self.enabled && !self.ttl.is_zero()
    }
}

/// Configuration for response caching.
///
/// ```rust
/// use api_gatekeeper::cache::{CacheConfig, EndpointOverride, Ttl};
///
/// let mut config = CacheConfig::memory();
/// config.default_ttl = Ttl::seconds(60);
/// config.endpoint_overrides.insert("/a", EndpointOverride::ttl(Ttl::seconds(3600)));
/// config.endpoint_overrides.insert("/a/b", EndpointOverride::ttl(Ttl::seconds(0)));
///
/// assert_eq!(config.resolve("/a/b/c").ttl, Ttl::seconds(0));
/// assert_eq!(config.resolve("/a/x").ttl, Ttl::seconds(3600));
/// assert_eq!(config.resolve("/other").ttl, Ttl::seconds(60));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Master switch; when off no path is cached.
    pub enabled: bool,
    /// File stem of the persistent store.
    pub cache_name: String,
    /// Storage backend.
    pub backend: CacheBackend,
    /// Directory holding the persistent store (current directory if unset).
    pub cache_dir: Option<PathBuf>,
    /// TTL for paths without an override.
    #[serde(with = "ttl_seconds")]
    pub default_ttl: Ttl,
    /// Per-prefix overrides.
    pub endpoint_overrides: EndpointOverrides,
}

/// Default TTL: one hour.
pub const DEFAULT_TTL: Ttl = Ttl::seconds(3600);

/// Default file stem for the persistent store.
pub const DEFAULT_CACHE_NAME: &str = "gatekeeper_cache";

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_name: DEFAULT_CACHE_NAME.to_string(),
            backend: CacheBackend::Persistent,
            cache_dir: None,
            default_ttl: DEFAULT_TTL,
            endpoint_overrides: EndpointOverrides::new(),
        }
    }
}

impl CacheConfig {
    /// In-memory cache with the default TTL.
    pub fn memory() -> Self {
        Self {
            backend: CacheBackend::Memory,
            ..Self::default()
        }
    }

    /// Per-endpoint TTLs tuned for account, match and league data.
    ///
    /// Static data is kept for a day, finished matches forever, and live
    /// listings for minutes.
    pub fn smart() -> Self {
        Self {
            endpoint_overrides: smart_endpoints(),
            ..Self::default()
        }
    }

    /// [`CacheConfig::smart`] backed by memory.
    pub fn smart_memory() -> Self {
        Self {
            backend: CacheBackend::Memory,
            ..Self::smart()
        }
    }

    /// Cache everything forever.
    pub fn permanent() -> Self {
        Self {
            default_ttl: Ttl::Forever,
            ..Self::default()
        }
    }

    /// No caching at all.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Parse a JSON configuration, reporting any problem as a configuration error.
    pub fn from_json(json: &str) -> Result<Self, GateError> {
        serde_json::from_str(json).map_err(|e| GateError::config(e.to_string()))
    }

    /// Full path of the persistent store file.
    pub fn storage_path(&self) -> PathBuf {
        let dir = self.cache_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        dir.join(format!("{}.redb", self.cache_name))
    }

    /// Resolve the effective policy for a request path.
    ///
    /// Any query string is ignored. The longest configured prefix wins; its
    /// unset fields fall back to the defaults. The master switch always wins.
    pub fn resolve(&self, path: &str) -> ResolvedPolicy {
        let path = path.split_once('?').map_or(path, |(p, _)| p);
        match self.endpoint_overrides.longest_match(path) {
            Some((_, config)) => ResolvedPolicy {
                enabled: self.enabled && config.enabled.unwrap_or(true),
                ttl: config.ttl.unwrap_or(self.default_ttl),
            },
            None => ResolvedPolicy {
                enabled: self.enabled,
                ttl: self.default_ttl,
            },
        }
    }
}

fn smart_endpoints() -> EndpointOverrides {
    [
        (
            "/riot/account/v1/accounts/by-riot-id",
            EndpointOverride::ttl(Ttl::seconds(86_400)),
        ),
        (
            "/lol/summoner/v4/summoners/by-puuid",
            EndpointOverride::ttl(Ttl::seconds(86_400)),
        ),
        ("/lol/match/v5/matches", EndpointOverride::ttl(Ttl::Forever)),
        (
            "/lol/league/v4/entries/by-puuid",
            EndpointOverride::ttl(Ttl::seconds(300)),
        ),
        (
            "/lol/match/v5/matches/by-puuid",
            EndpointOverride::ttl(Ttl::seconds(60)),
        ),
    ]
    .into_iter()
    .collect()
}

/// Serialize a [`Ttl`] as seconds, with `null` meaning forever.
pub mod ttl_seconds {
    use serde::{Deserialize, Deserializer, Serializer, de};

    use super::Ttl;

    /// Serialize a TTL as a number of seconds or `null`.
    pub fn serialize<S>(ttl: &Ttl, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match ttl {
            Ttl::Forever => serializer.serialize_none(),
            Ttl::After(d) if d.subsec_nanos() == 0 => serializer.serialize_u64(d.as_secs()),
            Ttl::After(d) => serializer.serialize_f64(d.as_secs_f64()),
        }
    }

    /// Deserialize seconds or `null` into a TTL.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Ttl, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<f64>::deserialize(deserializer)? {
            None => Ok(Ttl::Forever),
            Some(secs) => Ttl::from_seconds(secs).map_err(de::Error::custom),
        }
    }

    /// Optional TTL where an absent field and `null` differ.
    ///
    /// Use with `#[serde(default)]`: absent yields `None`, `null` yields
    /// `Some(Ttl::Forever)`.
    pub mod optional {
        use serde::{Deserializer, Serializer};

        use super::Ttl;

        /// Serialize a present TTL; pair with `skip_serializing_if`.
        pub fn serialize<S>(ttl: &Option<Ttl>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match ttl {
                Some(ttl) => super::serialize(ttl, serializer),
                None => serializer.serialize_none(),
            }
        }

        /// Deserialize a present field, which may be `null`.
        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Ttl>, D::Error>
        where
            D: Deserializer<'de>,
        {
            super::deserialize(deserializer).map(Some)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn precedence_config() -> CacheConfig {
        let mut config = CacheConfig::memory();
        config.default_ttl = Ttl::seconds(60);
        config
            .endpoint_overrides
            .insert("/a/b", EndpointOverride::ttl(Ttl::seconds(0)));
        config
            .endpoint_overrides
            .insert("/a", EndpointOverride::ttl(Ttl::seconds(3600)));
        config
    }

    #[test]
    fn test_longest_prefix_wins() {
        let config = precedence_config();

        let nested = config.resolve("/a/b/c");
        assert_eq!(nested.ttl, Ttl::seconds(0));
        assert!(!nested.is_cacheable());

        let sibling = config.resolve("/a/x");
        assert_eq!(sibling.ttl, Ttl::seconds(3600));
        assert!(sibling.is_cacheable());
    }

    #[test]
    fn test_defaults_without_match() {
        let config = precedence_config();
        let policy = config.resolve("/elsewhere");
        assert!(policy.enabled);
        assert_eq!(policy.ttl, Ttl::seconds(60));
    }

    #[test]
    fn test_query_string_ignored() {
        let config = precedence_config();
        assert_eq!(config.resolve("/a/x?count=5").ttl, Ttl::seconds(3600));
    }

    #[test]
    fn test_override_disables_but_keeps_default_ttl() {
        let mut config = CacheConfig::memory();
        config
            .endpoint_overrides
            .insert("/live", EndpointOverride::disabled());

        let policy = config.resolve("/live/feed");
        assert!(!policy.enabled);
        assert_eq!(policy.ttl, DEFAULT_TTL);
    }

    #[test]
    fn test_master_switch_wins() {
        let mut config = CacheConfig::disabled();
        config.endpoint_overrides.insert(
            "/a",
            EndpointOverride {
                enabled: Some(true),
                ttl: None,
            },
        );
        assert!(!config.resolve("/a/b").enabled);
    }

    #[test]
    fn test_smart_preset() {
        let config = CacheConfig::smart();
        assert_eq!(config.resolve("/lol/match/v5/matches/EUW1_1").ttl, Ttl::Forever);
        assert_eq!(
            config.resolve("/lol/match/v5/matches/by-puuid/abc/ids").ttl,
            Ttl::seconds(60)
        );
        assert_eq!(config.resolve("/unlisted").ttl, DEFAULT_TTL);
        assert_eq!(CacheConfig::smart_memory().backend, CacheBackend::Memory);
    }

    #[test]
    fn test_from_json_distinguishes_null_and_absent() {
        let config = CacheConfig::from_json(
            r#"{
                "backend": "memory",
                "default_ttl": 120,
                "endpoint_overrides": {
                    "/forever": {"ttl": null},
                    "/inherit": {"enabled": true},
                    "/off": {"enabled": false}
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.backend, CacheBackend::Memory);
        assert_eq!(config.cache_name, DEFAULT_CACHE_NAME);
        assert_eq!(config.resolve("/forever/x").ttl, Ttl::Forever);
        assert_eq!(config.resolve("/inherit/x").ttl, Ttl::seconds(120));
        assert!(!config.resolve("/off/x").enabled);
    }

    #[test]
    fn test_from_json_null_default_is_forever() {
        let config = CacheConfig::from_json(r#"{"default_ttl": null}"#).unwrap();
        assert_eq!(config.default_ttl, Ttl::Forever);
    }

    #[test]
    fn test_from_json_rejects_malformed_ttl() {
        let err = CacheConfig::from_json(r#"{"endpoint_overrides": {"/a": {"ttl": -5}}}"#)
            .unwrap_err();
        assert!(matches!(err, GateError::Configuration(_)));

        assert!(CacheConfig::from_json(r#"{"default_ttl": "soon"}"#).is_err());
    }

    #[test]
    fn test_from_json_rejects_ttl_beyond_millisecond_range() {
        let err = CacheConfig::from_json(r#"{"default_ttl": 18446744073709552}"#).unwrap_err();
        assert!(matches!(err, GateError::Configuration(_)));

        let config = CacheConfig::from_json(r#"{"default_ttl": 18446744073709}"#).unwrap();
        assert!(config.resolve("/a").is_cacheable());
    }

    #[test]
    fn test_sub_millisecond_ttl_is_zero() {
        assert!(Ttl::After(Duration::from_micros(400)).is_zero());
        assert!(!Ttl::After(Duration::from_millis(1)).is_zero());
        assert!(!Ttl::Forever.is_zero());

        let config = CacheConfig::from_json(r#"{"default_ttl": 0.0004}"#).unwrap();
        assert!(!config.resolve("/a").is_cacheable());
    }

    #[test]
    fn test_sqlite_alias() {
        let config = CacheConfig::from_json(r#"{"backend": "sqlite"}"#).unwrap();
        assert_eq!(config.backend, CacheBackend::Persistent);
    }

    #[test]
    fn test_serialize_round_trips_forever() {
        let config = CacheConfig::smart_memory();
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(CacheConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_storage_path() {
        let config = CacheConfig {
            cache_dir: Some(PathBuf::from("/tmp/cache")),
            cache_name: "responses".to_string(),
            ..CacheConfig::default()
        };
        assert_eq!(config.storage_path(), PathBuf::from("/tmp/cache/responses.redb"));
    }
}
