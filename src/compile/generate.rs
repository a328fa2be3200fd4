// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Block generators.
//!
//! One pure function per customization category. Each generator reads its
//! category from a [`BlueprintView`] and returns the shell commands for it as
//! one string. An empty string means there is nothing to do for the category.
//!
//! Statements that must succeed together are chained with `&&`. Groups and
//! users are the exception: every entry gets its own line, so the statements
//! for one entry never depend on the statements of another.
//!
//! Every value taken from the blueprint is quoted for the shell before it is
//! interpolated. Plain words stay bare, anything else is single-quoted.

use crate::blueprint::view::BlueprintView;

use shlex::{try_quote, QuoteError};
use std::borrow::Cow;

const CHRONY_CONF: &str = "/etc/chrony.conf";

/// Generate package installation command.
pub fn packages(view: &dyn BlueprintView) -> Result<String> {
    let packages = view.packages();
    if packages.is_empty() {
        return Ok(String::new());
    }

    let names = packages
        .iter()
        .map(|name| quote(name))
        .collect::<Result<Vec<_>>>()?;

    Ok(format!("dnf install -y {}", names.join(" ")))
}

/// Generate hostname command.
pub fn hostname(view: &dyn BlueprintView) -> Result<String> {
    match non_empty(view.hostname()) {
        Some(hostname) => Ok(format!("echo {} > /etc/hostname", quote(hostname)?)),
        None => Ok(String::new()),
    }
}

/// Generate timezone and NTP server commands.
pub fn timezone(view: &dyn BlueprintView) -> Result<String> {
    let (timezone, ntpservers) = view.timezone_settings();
    let mut cmds = Vec::new();

    if let Some(timezone) = non_empty(timezone) {
        let zoneinfo = format!("/usr/share/zoneinfo/{timezone}");
        cmds.push(format!("ln -sf {} /etc/localtime", quote(&zoneinfo)?));
    }

    for server in ntpservers {
        // INVARIANT: Drop any stale line for this server before adding it back.
        let expression = format!("/^server {} /d", escape_regex(server));
        let line = format!("server {server} iburst");
        cmds.push(format!("sed -i {} {CHRONY_CONF}", quote(&expression)?));
        cmds.push(format!("echo {} >> {CHRONY_CONF}", quote(&line)?));
    }

    Ok(cmds.join(" && "))
}

/// Generate locale and keyboard layout commands.
pub fn locale(view: &dyn BlueprintView) -> Result<String> {
    let (locale, keyboard) = view.primary_locale();
    let mut cmds = Vec::new();

    if let Some(locale) = non_empty(locale) {
        let line = format!("LANG={locale}");
        cmds.push(format!("echo {} > /etc/locale.conf", quote(&line)?));
    }

    if let Some(keyboard) = non_empty(keyboard) {
        let line = format!("KEYMAP={keyboard}");
        cmds.push(format!("echo {} > /etc/vconsole.conf", quote(&line)?));
    }

    Ok(cmds.join(" && "))
}

/// Generate guarded group creation commands.
pub fn groups(view: &dyn BlueprintView) -> Result<String> {
    let mut lines = Vec::new();

    for (index, group) in view.groups().iter().enumerate() {
        if group.name.is_empty() {
            return Err(GenerateError::EmptyName {
                kind: "group",
                index,
            });
        }

        let name = quote(&group.name)?;
        let groupadd = match group.gid {
            Some(gid) => format!("groupadd --gid {gid} {name}"),
            None => format!("groupadd {name}"),
        };
        lines.push(format!("(getent group {name} > /dev/null || {groupadd})"));
    }

    Ok(lines.join("\n"))
}

/// Generate guarded user creation and configuration commands.
///
/// SSH key ownership is set to `<name>:<name>`, which assumes the primary
/// group of the user shares its name. Blueprints do not expose the primary
/// group name, so users created with an explicit `gid` of a differently named
/// group will fail the `chown`.
pub fn users(view: &dyn BlueprintView) -> Result<String> {
    let mut lines = Vec::new();

    for (index, user) in view.users().iter().enumerate() {
        if user.name.is_empty() {
            return Err(GenerateError::EmptyName {
                kind: "user",
                index,
            });
        }

        let name = quote(&user.name)?;
        let home = non_empty(user.home.as_deref());
        let mut cmds = Vec::new();

        let mut useradd = vec![Cow::Borrowed("useradd"), Cow::Borrowed("-m")];
        if let Some(home) = home {
            useradd.extend([Cow::Borrowed("-d"), quote(home)?]);
        }
        if let Some(shell) = non_empty(user.shell.as_deref()) {
            useradd.extend([Cow::Borrowed("-s"), quote(shell)?]);
        }
        if let Some(uid) = user.uid {
            useradd.extend([Cow::Borrowed("-u"), Cow::Owned(uid.to_string())]);
        }
        if let Some(gid) = user.gid {
            useradd.extend([Cow::Borrowed("-g"), Cow::Owned(gid.to_string())]);
        }
        useradd.push(name.clone());
        cmds.push(format!(
            "(getent passwd {name} > /dev/null || {})",
            useradd.join(" ")
        ));

        if !user.groups.is_empty() {
            let groups = user.groups.join(",");
            cmds.push(format!("usermod -aG {} {name}", quote(&groups)?));
        }

        if let Some(password) = non_empty(user.password.as_deref()) {
            let entry = format!("{}:{password}", user.name);
            cmds.push(format!("echo {} | chpasswd -e", quote(&entry)?));
        }

        if let Some(key) = non_empty(user.key.as_deref()) {
            let home = match home {
                Some(home) => home.to_string(),
                None => format!("/home/{}", user.name),
            };
            let ssh_dir = format!("{home}/.ssh");
            let keys_file = format!("{ssh_dir}/authorized_keys");
            let owner = format!("{0}:{0}", user.name);
            let (ssh_dir, keys_file) = (quote(&ssh_dir)?, quote(&keys_file)?);
            cmds.extend([
                format!("mkdir -p {ssh_dir}"),
                format!("echo {} > {keys_file}", quote(key)?),
                format!("chmod 700 {ssh_dir}"),
                format!("chmod 600 {keys_file}"),
                format!("chown -R {} {ssh_dir}", quote(&owner)?),
            ]);
        }

        lines.push(cmds.join(" && "));
    }

    Ok(lines.join("\n"))
}

/// Generate offline firewall rule commands.
pub fn firewall(view: &dyn BlueprintView) -> Result<String> {
    let Some(rules) = view.firewall() else {
        return Ok(String::new());
    };

    let mut cmds = Vec::new();
    for port in &rules.ports {
        cmds.push(format!("firewall-offline-cmd --add-port={}", quote(port)?));
    }
    for service in &rules.enabled_services {
        cmds.push(format!("firewall-offline-cmd --add-service={}", quote(service)?));
    }

    Ok(cmds.join(" && "))
}

/// Generate systemd unit state commands.
pub fn services(view: &dyn BlueprintView) -> Result<String> {
    let Some(services) = view.services() else {
        return Ok(String::new());
    };

    let actions = [
        ("enable", &services.enabled),
        ("disable", &services.disabled),
        ("mask", &services.masked),
    ];

    let mut cmds = Vec::new();
    for (action, units) in actions {
        for unit in units {
            cmds.push(format!("systemctl {action} {}", quote(unit)?));
        }
    }

    Ok(cmds.join(" && "))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

fn quote(value: &str) -> Result<Cow<'_, str>> {
    try_quote(value).map_err(|err| GenerateError::Quote {
        source: err,
        value: value.to_string(),
    })
}

// Escape characters that carry meaning in a sed basic regular expression.
fn escape_regex(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '/' | '.' | '*' | '[' | ']' | '^' | '$') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }

    escaped
}

/// Command generation error types.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// Blueprint value cannot be represented as a shell word.
    #[error("cannot quote {value:?} for the shell")]
    Quote {
        #[source]
        source: QuoteError,
        value: String,
    },

    /// Group or user entry without a name.
    #[error("{kind} entry {index} has an empty name")]
    EmptyName { kind: &'static str, index: usize },
}

/// Friendly result alias :3
pub type Result<T, E = GenerateError> = std::result::Result<T, E>;
