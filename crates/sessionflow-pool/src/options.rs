//! Backend options (C2): one concrete, validated type per backend kind.
//!
//! Grounded in the original `RedisOptions`/`SQLiteOptions`/`MemoryOptions`
//! dataclasses: each backend gets its own option struct rather than a
//! runtime-synthesized option bag, and each carries the subset of its
//! fields that identify a unique pool instance for the registry (§4.2).

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::OptionsError;

/// Which storage substrate a pool (or cache/limiter instance) talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    InMemory,
    Sql,
    Kv,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BackendKind::InMemory => "memory",
            BackendKind::Sql => "sqlite",
            BackendKind::Kv => "redis",
        };
        write!(f, "{s}")
    }
}

impl FromStr for BackendKind {
    type Err = OptionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" | "inmemory" | "in-memory" => Ok(BackendKind::InMemory),
            "sqlite" | "sql" => Ok(BackendKind::Sql),
            "redis" | "kv" => Ok(BackendKind::Kv),
            other => Err(OptionsError::InvalidEnumValue {
                field: "backend",
                allowed: &["memory", "sqlite", "redis"],
                got: other.to_string(),
            }),
        }
    }
}

/// The 8 Redis `maxmemory-policy` values, carried over verbatim since they
/// name a Redis server concept this workspace doesn't get to redesign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaxMemoryPolicy {
    VolatileLru,
    AllKeysLru,
    VolatileLfu,
    AllKeysLfu,
    VolatileRandom,
    AllKeysRandom,
    VolatileTtl,
    NoEviction,
}

impl MaxMemoryPolicy {
    pub const ALL: &'static [&'static str] = &[
        "volatile-lru",
        "allkeys-lru",
        "volatile-lfu",
        "allkeys-lfu",
        "volatile-random",
        "allkeys-random",
        "volatile-ttl",
        "noeviction",
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MaxMemoryPolicy::VolatileLru => "volatile-lru",
            MaxMemoryPolicy::AllKeysLru => "allkeys-lru",
            MaxMemoryPolicy::VolatileLfu => "volatile-lfu",
            MaxMemoryPolicy::AllKeysLfu => "allkeys-lfu",
            MaxMemoryPolicy::VolatileRandom => "volatile-random",
            MaxMemoryPolicy::AllKeysRandom => "allkeys-random",
            MaxMemoryPolicy::VolatileTtl => "volatile-ttl",
            MaxMemoryPolicy::NoEviction => "noeviction",
        }
    }
}

impl FromStr for MaxMemoryPolicy {
    type Err = OptionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "volatile-lru" => MaxMemoryPolicy::VolatileLru,
            "allkeys-lru" => MaxMemoryPolicy::AllKeysLru,
            "volatile-lfu" => MaxMemoryPolicy::VolatileLfu,
            "allkeys-lfu" => MaxMemoryPolicy::AllKeysLfu,
            "volatile-random" => MaxMemoryPolicy::VolatileRandom,
            "allkeys-random" => MaxMemoryPolicy::AllKeysRandom,
            "volatile-ttl" => MaxMemoryPolicy::VolatileTtl,
            "noeviction" => MaxMemoryPolicy::NoEviction,
            other => {
                return Err(OptionsError::InvalidEnumValue {
                    field: "maxmemory_policy",
                    allowed: MaxMemoryPolicy::ALL,
                    got: other.to_string(),
                })
            }
        })
    }
}

/// Options for the in-process, shared-mutex-guarded memory backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InMemoryOptions {
    pub namespace: String,
    pub cache_timeout: Duration,
    pub check_frequency: Duration,
}

impl InMemoryOptions {
    pub fn new(namespace: impl Into<String>) -> Result<Self, OptionsError> {
        Ok(InMemoryOptions {
            namespace: namespace.into(),
            cache_timeout: Duration::from_secs(300),
            check_frequency: Duration::from_secs(15),
        })
    }

    pub fn with_cache_timeout(mut self, cache_timeout: Duration) -> Self {
        self.cache_timeout = cache_timeout;
        self
    }

    pub fn with_check_frequency(mut self, check_frequency: Duration) -> Self {
        self.check_frequency = check_frequency;
        self
    }

    /// Identity used by the pool registry: every session with the same
    /// namespace shares the same underlying mapping.
    pub fn identity(&self) -> String {
        self.namespace.clone()
    }
}

/// Options for the embedded SQL (SQLite) backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SqlOptions {
    pub db_path: PathBuf,
    pub max_connections: u32,
    pub idle_timeout: Duration,
}

impl SqlOptions {
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self, OptionsError> {
        Ok(SqlOptions {
            db_path: db_path.into(),
            max_connections: 5,
            idle_timeout: Duration::from_millis(500),
        })
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Result<Self, OptionsError> {
        if max_connections == 0 {
            return Err(OptionsError::InconsistentOptions(
                "max_connections must be at least 1",
            ));
        }
        self.max_connections = max_connections;
        Ok(self)
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Identity used by the pool registry: the database path.
    pub fn identity(&self) -> String {
        self.db_path.to_string_lossy().into_owned()
    }
}

/// Options for the remote key/value (Redis-compatible) backend.
#[derive(Debug, Clone)]
pub struct KvOptions {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub unix_socket_path: Option<PathBuf>,
    pub db: u32,
    pub username: Option<String>,
    pub password: Option<String>,
    pub maxmemory_policy: MaxMemoryPolicy,
    pub save: Vec<String>,
    pub cache_timeout: Duration,
}

impl PartialEq for KvOptions {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}
impl Eq for KvOptions {}

impl Hash for KvOptions {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl KvOptions {
    pub fn host_port(host: impl Into<String>, port: u16) -> Result<Self, OptionsError> {
        if port == 0 {
            return Err(OptionsError::InvalidPort(port as u32));
        }
        Ok(KvOptions {
            host: Some(host.into()),
            port: Some(port),
            unix_socket_path: None,
            db: 0,
            username: None,
            password: None,
            maxmemory_policy: MaxMemoryPolicy::NoEviction,
            save: vec!["900 1".into(), "300 100".into(), "60 200".into(), "15 1000".into()],
            cache_timeout: Duration::from_secs(300),
        })
    }

    pub fn unix_socket(path: impl Into<PathBuf>) -> Result<Self, OptionsError> {
        Ok(KvOptions {
            host: None,
            port: None,
            unix_socket_path: Some(path.into()),
            db: 0,
            username: None,
            password: None,
            maxmemory_policy: MaxMemoryPolicy::NoEviction,
            save: vec!["900 1".into(), "300 100".into(), "60 200".into(), "15 1000".into()],
            cache_timeout: Duration::from_secs(300),
        })
    }

    pub fn with_db(mut self, db: u32) -> Self {
        self.db = db;
        self
    }

    pub fn with_credentials(mut self, username: Option<String>, password: Option<String>) -> Self {
        self.username = username;
        self.password = password;
        self
    }

    /// A non-default eviction policy only makes sense once a memory cap is
    /// configured; `maxmemory` itself is a server-side concern this crate
    /// doesn't set directly, but the combination is still rejected here
    /// per §4.2's validation contract.
    pub fn with_maxmemory_policy(
        mut self,
        policy: MaxMemoryPolicy,
        maxmemory_is_set: bool,
    ) -> Result<Self, OptionsError> {
        if policy != MaxMemoryPolicy::NoEviction && !maxmemory_is_set {
            return Err(OptionsError::InconsistentOptions(
                "maxmemory_policy other than noeviction requires maxmemory to be set",
            ));
        }
        self.maxmemory_policy = policy;
        Ok(self)
    }

    /// Identity used by the pool registry: (host, port, socket, db, user).
    pub fn identity(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.host.as_deref().unwrap_or(""),
            self.port.map(|p| p.to_string()).unwrap_or_default(),
            self.unix_socket_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
            self.db,
            self.username.as_deref().unwrap_or(""),
        )
    }
}
