//! Operator configuration
//!
//! Built once at startup from an optional YAML file plus CLI/environment
//! overrides, validated, and then handed to the controller by reference.

use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::controller::aliases::merge_host_aliases;
use crate::controller::types::{AliasStrategy, DesiredMutation, HostAliasEntry};
use crate::error::{Error, Result};

pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_WATCH_TIMEOUT_SECS: u64 = 10;

/// Aliases injected when neither the file nor the CLI names any
pub fn default_host_aliases() -> Vec<HostAliasEntry> {
    vec![HostAliasEntry::new(
        "127.0.0.1",
        ["example.com", "test.local"],
    )]
}

/// On-disk configuration; every field is optional.
///
/// ```yaml
/// namespace: apps
/// intervalSeconds: 60
/// watchTimeoutSeconds: 10
/// clusterContext: kind-dev
/// aliasStrategy: merge
/// hostAliases:
///   - ip: 127.0.0.1
///     hostnames: [example.com, test.local]
/// ```
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigFile {
    pub namespace: Option<String>,
    pub interval_seconds: Option<u64>,
    pub watch_timeout_seconds: Option<u64>,
    pub cluster_context: Option<String>,
    pub alias_strategy: Option<AliasStrategy>,
    pub host_aliases: Option<Vec<HostAliasEntry>>,
}

impl ConfigFile {
    pub fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }
}

/// Values supplied on the command line or through the environment.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub namespace: Option<String>,
    pub interval_secs: Option<u64>,
    pub watch_timeout_secs: Option<u64>,
    pub cluster_context: Option<String>,
    /// Replaces the file's alias list when non-empty
    pub host_aliases: Vec<HostAliasEntry>,
    pub replace_aliases: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Scope of every watch and patch
    pub namespace: String,
    /// Period of the timer trigger
    pub interval: Duration,
    /// Length of one watch session
    pub watch_timeout: Duration,
    pub desired_mutation: DesiredMutation,
    pub alias_strategy: AliasStrategy,
    /// Passed through to kubeconfig loading, never interpreted by the controller
    pub cluster_context: Option<String>,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            watch_timeout: Duration::from_secs(DEFAULT_WATCH_TIMEOUT_SECS),
            desired_mutation: DesiredMutation::new(default_host_aliases()),
            alias_strategy: AliasStrategy::Merge,
            cluster_context: None,
        }
    }
}

impl OperatorConfig {
    /// Read the optional file, apply overrides, and validate.
    pub fn load(path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let file = match path {
            Some(path) => ConfigFile::read(path)?,
            None => ConfigFile::default(),
        };
        Self::resolve(file, overrides).validate()
    }

    /// Combine sources: overrides win over the file, the file over defaults.
    pub fn resolve(file: ConfigFile, overrides: ConfigOverrides) -> Self {
        let defaults = Self::default();

        let entries = if !overrides.host_aliases.is_empty() {
            overrides.host_aliases
        } else {
            file.host_aliases
                .unwrap_or(defaults.desired_mutation.entries)
        };

        let alias_strategy = if overrides.replace_aliases {
            AliasStrategy::Replace
        } else {
            file.alias_strategy.unwrap_or(defaults.alias_strategy)
        };

        Self {
            namespace: overrides
                .namespace
                .or(file.namespace)
                .unwrap_or(defaults.namespace),
            interval: overrides
                .interval_secs
                .or(file.interval_seconds)
                .map(Duration::from_secs)
                .unwrap_or(defaults.interval),
            watch_timeout: overrides
                .watch_timeout_secs
                .or(file.watch_timeout_seconds)
                .map(Duration::from_secs)
                .unwrap_or(defaults.watch_timeout),
            desired_mutation: DesiredMutation::new(entries),
            alias_strategy,
            cluster_context: overrides.cluster_context.or(file.cluster_context),
        }
    }

    /// Check invariants and normalise the desired aliases.
    pub fn validate(mut self) -> Result<Self> {
        if self.namespace.trim().is_empty() {
            return Err(Error::ValidationError(
                "namespace must not be empty".to_string(),
            ));
        }
        if self.interval.is_zero() {
            return Err(Error::ValidationError(
                "interval must be greater than zero".to_string(),
            ));
        }
        if self.watch_timeout.is_zero() {
            return Err(Error::ValidationError(
                "watch timeout must be greater than zero".to_string(),
            ));
        }

        let mut entries = Vec::with_capacity(self.desired_mutation.entries.len());
        for entry in &self.desired_mutation.entries {
            entries.push(validate_entry(entry)?);
        }
        // Folds repeated IPs and hostnames into one entry each.
        self.desired_mutation = DesiredMutation::new(merge_host_aliases(&[], &entries));

        Ok(self)
    }

    /// Timer invocations overlap when a session outlives the interval.
    pub fn sessions_overlap(&self) -> bool {
        self.watch_timeout > self.interval
    }
}

fn validate_entry(entry: &HostAliasEntry) -> Result<HostAliasEntry> {
    let ip: IpAddr = entry.ip.trim().parse().map_err(|_| {
        Error::ValidationError(format!("'{}' is not a valid IP address", entry.ip))
    })?;

    if entry.hostnames.is_empty() {
        return Err(Error::ValidationError(format!(
            "host alias {} has no hostnames",
            ip
        )));
    }
    if let Some(bad) = entry
        .hostnames
        .iter()
        .find(|h| h.is_empty() || h.chars().any(char::is_whitespace))
    {
        return Err(Error::ValidationError(format!(
            "host alias {} has invalid hostname '{}'",
            ip, bad
        )));
    }

    Ok(HostAliasEntry {
        ip: ip.to_string(),
        hostnames: entry.hostnames.clone(),
    })
}

/// Parse `IP=host1,host2` as given to `--host-alias`.
pub fn parse_host_alias(raw: &str) -> std::result::Result<HostAliasEntry, String> {
    let (ip, hostnames) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected IP=HOST[,HOST...], got '{}'", raw))?;

    let hostnames: Vec<String> = hostnames
        .split(',')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .collect();

    if hostnames.is_empty() {
        return Err(format!("no hostnames given for {}", ip));
    }

    Ok(HostAliasEntry {
        ip: ip.trim().to_string(),
        hostnames,
    })
}
