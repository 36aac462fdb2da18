//! Target descriptor parsing.
//!
//! A descriptor has the form `[mongodb://][user@]host[:port][,host...][/database][?k=v&...]`.
//! An empty descriptor resolves to [`DEFAULT_HOST`]/[`DEFAULT_DATABASE`].

use std::fmt;

use crate::error::LogError;

/// Host used when the descriptor is empty.
pub const DEFAULT_HOST: &str = "localhost";
/// Database used when the descriptor names none.
pub const DEFAULT_DATABASE: &str = "rlogs";

const SCHEME: &str = "mongodb://";
/// Write concern and read preference options. The session policy sets both,
/// and the driver rejects tags or staleness without a preference mode.
const CONFLICTING_OPTIONS: [&str; 6] = [
    "w",
    "journal",
    "wtimeoutMS",
    "readPreference",
    "readPreferenceTags",
    "maxStalenessSeconds",
];
const REPLICA_SET_OPTION: &str = "replicaSet";

/// One `host[:port]` entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostAddr {
    pub host: String,
    pub port: Option<u16>,
}

impl fmt::Display for HostAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{port}", self.host),
            None => f.write_str(&self.host),
        }
    }
}

/// Parsed connection target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionTarget {
    userinfo: Option<String>,
    hosts: Vec<HostAddr>,
    database: String,
    options: Vec<(String, String)>,
}

impl ConnectionTarget {
    /// Parse a descriptor. No network activity happens here.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Config`] for an empty host entry, a bad port or an
    /// option without `=`.
    pub fn parse(descriptor: &str) -> Result<Self, LogError> {
        let descriptor = descriptor.trim();
        let rest = descriptor.strip_prefix(SCHEME).unwrap_or(descriptor);
        if rest.is_empty() {
            return Ok(Self::default());
        }

        let (rest, query) = match rest.split_once('?') {
            Some((head, query)) => (head, Some(query)),
            None => (rest, None),
        };
        let (authority, database) = match rest.split_once('/') {
            Some((authority, db)) => (authority, db),
            None => (rest, ""),
        };
        let (userinfo, hosts) = match authority.rsplit_once('@') {
            Some((user, hosts)) => (Some(user.to_owned()), hosts),
            None => (None, authority),
        };

        let hosts = hosts
            .split(',')
            .map(|entry| parse_host(entry, descriptor))
            .collect::<Result<Vec<_>, _>>()?;
        let options = query.map(parse_options).transpose()?.unwrap_or_default();
        let database = if database.is_empty() {
            DEFAULT_DATABASE.to_owned()
        } else {
            database.to_owned()
        };

        Ok(Self {
            userinfo,
            hosts,
            database,
            options,
        })
    }

    /// Remove options that would override the session policy.
    pub fn strip_conflicting_options(&mut self) {
        self.options.retain(|(key, _)| {
            !CONFLICTING_OPTIONS
                .iter()
                .any(|name| key.eq_ignore_ascii_case(name))
        });
    }

    pub fn hosts(&self) -> &[HostAddr] {
        &self.hosts
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn options(&self) -> &[(String, String)] {
        &self.options
    }

    /// Value of the named option (case-insensitive key match).
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.as_str())
    }

    /// Replica set name, if the target names one.
    pub fn replica_set(&self) -> Option<&str> {
        self.option(REPLICA_SET_OPTION).filter(|name| !name.is_empty())
    }

    /// `hosts/database` without credentials or options, used in messages.
    pub fn address(&self) -> String {
        format!("{}/{}", self.host_list(), self.database)
    }

    /// Full connection URI including credentials and remaining options.
    pub fn uri(&self) -> String {
        let mut uri = String::from(SCHEME);
        if let Some(user) = &self.userinfo {
            uri.push_str(user);
            uri.push('@');
        }
        uri.push_str(&self.address());
        if !self.options.is_empty() {
            uri.push('?');
            let pairs: Vec<String> = self
                .options
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect();
            uri.push_str(&pairs.join("&"));
        }
        uri
    }

    fn host_list(&self) -> String {
        self.hosts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Default for ConnectionTarget {
    fn default() -> Self {
        Self {
            userinfo: None,
            hosts: vec![HostAddr {
                host: DEFAULT_HOST.to_owned(),
                port: None,
            }],
            database: DEFAULT_DATABASE.to_owned(),
            options: Vec::new(),
        }
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address())
    }
}

fn parse_host(entry: &str, descriptor: &str) -> Result<HostAddr, LogError> {
    let invalid = |why: &str| {
        LogError::Config(format!(
            "connection string ({descriptor}) is not correct: {why}"
        ))
    };
    if entry.is_empty() {
        return Err(invalid("empty host"));
    }

    // Bracketed IPv6 literal: [::1]:27017
    let (host, port) = if let Some(rest) = entry.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| invalid("unterminated IPv6 literal"))?;
        match tail {
            "" => (host, None),
            tail => (
                host,
                Some(
                    tail.strip_prefix(':')
                        .ok_or_else(|| invalid("junk after IPv6 literal"))?,
                ),
            ),
        }
    } else {
        match entry.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (entry, None),
        }
    };

    if host.is_empty() {
        return Err(invalid("empty host"));
    }
    let port = port
        .map(|p| {
            p.parse::<u16>()
                .ok()
                .filter(|p| *p != 0)
                .ok_or_else(|| invalid(format!("invalid port {p:?}").as_str()))
        })
        .transpose()?;

    Ok(HostAddr {
        host: host.to_owned(),
        port,
    })
}

fn parse_options(query: &str) -> Result<Vec<(String, String)>, LogError> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            pair.split_once('=')
                .map(|(key, value)| (key.to_owned(), value.to_owned()))
                .ok_or_else(|| LogError::Config(format!("malformed option {pair:?}")))
        })
        .collect()
}
