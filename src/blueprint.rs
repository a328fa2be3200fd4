// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Blueprint layout.
//!
//! Specify the layout of the osbuild __blueprint__ document that imagecfg
//! consumes. A blueprint is a TOML file describing the desired state of a
//! system image: packages to install, and a set of __customizations__ like the
//! hostname, users, groups, firewall rules, and so on.
//!
//! # Unknown Keys
//!
//! A blueprint is a trusted build-time document, but a typo in it should never
//! be silently dropped. Parsing first decodes the document into [`Blueprint`],
//! then compares the decoded layout with the raw table. Any key that the
//! layout did not consume is reported through [`BlueprintError::UnknownKeys`]
//! with its full dotted path, e.g., `customizations.user.colour`.
//!
//! # Unsupported Customizations
//!
//! Some customizations are valid blueprint sections that only make sense to an
//! image builder, e.g., `filesystem` or `installation_device`. These are
//! accepted so that the same blueprint can drive both pipelines, but they are
//! never turned into commands. See [`Blueprint::unsupported_customizations`].
//!
//! File I/O beyond [`Blueprint::load`] is left to the caller to figure out.

pub mod view;

use serde::{Deserialize, Serialize};
use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};
use toml::{Table, Value};
use tracing::{debug, instrument};

/// Blueprint document layout.
///
/// Top-level of an osbuild blueprint. Only the fields that affect command
/// generation are typed. Everything else is kept as raw TOML so that it counts
/// as known during unknown key detection.
#[derive(Default, Debug, PartialEq, Clone, Deserialize, Serialize)]
pub struct Blueprint {
    /// Name of the blueprint.
    #[serde(default)]
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub distro: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimal: Option<bool>,

    /// Packages to install.
    #[serde(default)]
    pub packages: Vec<Package>,

    /// Modules to install. Treated just like packages.
    #[serde(default)]
    pub modules: Vec<Package>,

    /// Package groups to install, not to be confused with user groups.
    #[serde(default)]
    pub groups: Vec<PackageGroup>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled_modules: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub containers: Option<Value>,

    /// System customizations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customizations: Option<Customizations>,
}

impl Blueprint {
    /// Load blueprint from target path.
    ///
    /// # Errors
    ///
    /// - Return [`BlueprintError::Read`] if file cannot be read.
    /// - Return any error [`Blueprint::from_str`] produces.
    #[instrument(skip(path), level = "debug")]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        debug!("load blueprint {:?}", path.as_ref().display());
        read_to_string(path.as_ref())
            .map_err(|err| BlueprintError::Read {
                source: err,
                path: path.as_ref().to_path_buf(),
            })?
            .parse()
    }

    /// List recognized customizations that imagecfg does not act on.
    pub fn unsupported_customizations(&self) -> Vec<&'static str> {
        let Some(custom) = &self.customizations else {
            return Vec::new();
        };

        let mut unsupported: Vec<&'static str> = [
            ("kernel", custom.kernel.as_ref()),
            ("filesystem", custom.filesystem.as_ref()),
            ("disk", custom.disk.as_ref()),
            ("partitioning_mode", custom.partitioning_mode.as_ref()),
            ("directories", custom.directories.as_ref()),
            ("files", custom.files.as_ref()),
            ("repositories", custom.repositories.as_ref()),
            ("fips", custom.fips.as_ref()),
            ("installation_device", custom.installation_device.as_ref()),
            ("openscap", custom.openscap.as_ref()),
            ("ignition", custom.ignition.as_ref()),
            ("fdo", custom.fdo.as_ref()),
            ("installer", custom.installer.as_ref()),
            ("rpm", custom.rpm.as_ref()),
            ("rhsm", custom.rhsm.as_ref()),
            ("cacerts", custom.cacerts.as_ref()),
            ("wsl", custom.wsl.as_ref()),
        ]
        .into_iter()
        .filter_map(|(name, section)| section.map(|_| name))
        .collect();

        if let Some(firewall) = &custom.firewall {
            if firewall.zones.is_some() {
                unsupported.push("firewall.zones");
            }

            let disabled = firewall
                .services
                .as_ref()
                .is_some_and(|services| !services.disabled.is_empty());
            if disabled {
                unsupported.push("firewall.services.disabled");
            }
        }

        unsupported
    }
}

impl FromStr for Blueprint {
    type Err = BlueprintError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let blueprint: Blueprint = toml::de::from_str(data)?;
        let raw: Table = toml::de::from_str(data)?;

        // INVARIANT: Everything in the raw document must have been decoded.
        let decoded = Value::try_from(&blueprint)?;
        let mut unknown = Vec::new();
        if let Some(decoded) = decoded.as_table() {
            collect_undecoded("", &raw, decoded, &mut unknown);
        }

        if !unknown.is_empty() {
            return Err(BlueprintError::UnknownKeys(unknown));
        }

        Ok(blueprint)
    }
}

fn collect_undecoded(prefix: &str, raw: &Table, decoded: &Table, found: &mut Vec<String>) {
    for (key, value) in raw {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };

        let Some(known) = decoded.get(key) else {
            if !found.contains(&path) {
                found.push(path);
            }
            continue;
        };

        match (value, known) {
            (Value::Table(raw), Value::Table(known)) => {
                collect_undecoded(&path, raw, known, found);
            }
            (Value::Array(raw), Value::Array(known)) => {
                // INVARIANT: Arrays of tables line up element by element.
                for (item, known) in raw.iter().zip(known) {
                    if let (Value::Table(raw), Value::Table(known)) = (item, known) {
                        collect_undecoded(&path, raw, known, found);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Package or module entry.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Package {
    pub name: String,

    /// Version glob. Empty or "*" means any version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Package {
    /// Package specification to hand to the package manager.
    pub fn to_name_version(&self) -> String {
        match self.version.as_deref() {
            None | Some("") | Some("*") => self.name.clone(),
            Some(version) => format!("{}-{}", self.name, version),
        }
    }
}

/// Package group entry.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct PackageGroup {
    pub name: String,
}

/// Customization section of a blueprint.
#[derive(Default, Debug, PartialEq, Clone, Deserialize, Serialize)]
pub struct Customizations {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    /// Legacy SSH key listing that predates full user customization.
    #[serde(default)]
    pub sshkey: Vec<SshKeyCustomization>,

    #[serde(default)]
    pub user: Vec<UserCustomization>,

    #[serde(default)]
    pub group: Vec<GroupCustomization>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<TimezoneCustomization>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<LocaleCustomization>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub firewall: Option<FirewallCustomization>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub services: Option<ServicesCustomization>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub kernel: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filesystem: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub partitioning_mode: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub directories: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub repositories: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fips: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub installation_device: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub openscap: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignition: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fdo: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub installer: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpm: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rhsm: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cacerts: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub wsl: Option<Value>,
}

/// Legacy SSH key entry for an existing user.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct SshKeyCustomization {
    pub user: String,
    pub key: String,
}

/// User account to create or configure.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct UserCustomization {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Pre-hashed password. Never hashed again.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// SSH public key to authorize.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub home: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,

    /// Secondary groups.
    #[serde(default)]
    pub groups: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gid: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiredate: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_password_reset: Option<bool>,
}

/// User group to create.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct GroupCustomization {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gid: Option<u32>,
}

#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct TimezoneCustomization {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,

    #[serde(default)]
    pub ntpservers: Vec<String>,
}

#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct LocaleCustomization {
    /// Languages to configure. Only the first one becomes the system locale.
    #[serde(default)]
    pub languages: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyboard: Option<String>,
}

#[derive(Default, Debug, PartialEq, Clone, Deserialize, Serialize)]
pub struct FirewallCustomization {
    /// Ports as "port:proto" or "port/proto".
    #[serde(default)]
    pub ports: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub services: Option<FirewallServices>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub zones: Option<Value>,
}

#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct FirewallServices {
    #[serde(default)]
    pub enabled: Vec<String>,

    #[serde(default)]
    pub disabled: Vec<String>,
}

/// Systemd units to enable, disable, or mask.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ServicesCustomization {
    #[serde(default)]
    pub enabled: Vec<String>,

    #[serde(default)]
    pub disabled: Vec<String>,

    #[serde(default)]
    pub masked: Vec<String>,
}

/// Blueprint error types.
#[derive(Debug, thiserror::Error)]
pub enum BlueprintError {
    /// Blueprint file cannot be read.
    #[error("failed to read blueprint at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize blueprint.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize blueprint.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Blueprint contains keys that are not part of the layout.
    #[error("unknown blueprint keys: {}", .0.join(", "))]
    UnknownKeys(Vec<String>),
}

/// Friendly result alias :3
type Result<T, E = BlueprintError> = std::result::Result<T, E>;
