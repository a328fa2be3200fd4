// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Narrow read-only view of a blueprint.
//!
//! The compiler only ever sees a blueprint through [`BlueprintView`]. Each
//! accessor hands back one customization category already merged and
//! normalized, so command generation never has to know how the document was
//! laid out.

use crate::blueprint::{Blueprint, GroupCustomization, ServicesCustomization, UserCustomization};

/// Category accessors over a parsed blueprint.
pub trait BlueprintView {
    /// Hostname of the system.
    fn hostname(&self) -> Option<&str>;

    /// Timezone to select, and NTP servers to use in document order.
    fn timezone_settings(&self) -> (Option<&str>, &[String]);

    /// Primary locale and keyboard layout.
    fn primary_locale(&self) -> (Option<&str>, Option<&str>);

    /// User groups to create.
    fn groups(&self) -> &[GroupCustomization];

    /// Users to create or configure.
    fn users(&self) -> Vec<UserCustomization>;

    /// Firewall rules, if a firewall section exists at all.
    fn firewall(&self) -> Option<FirewallRules>;

    /// Systemd unit states, if a services section exists at all.
    fn services(&self) -> Option<&ServicesCustomization>;

    /// Deduplicated package specifications to install.
    fn packages(&self) -> Vec<String>;
}

/// Normalized firewall rules.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct FirewallRules {
    /// Ports as "port/proto".
    pub ports: Vec<String>,
    pub enabled_services: Vec<String>,
}

impl BlueprintView for Blueprint {
    fn hostname(&self) -> Option<&str> {
        self.customizations
            .as_ref()
            .and_then(|custom| custom.hostname.as_deref())
    }

    fn timezone_settings(&self) -> (Option<&str>, &[String]) {
        match self
            .customizations
            .as_ref()
            .and_then(|custom| custom.timezone.as_ref())
        {
            Some(tz) => (tz.timezone.as_deref(), tz.ntpservers.as_slice()),
            None => (None, &[][..]),
        }
    }

    fn primary_locale(&self) -> (Option<&str>, Option<&str>) {
        match self
            .customizations
            .as_ref()
            .and_then(|custom| custom.locale.as_ref())
        {
            Some(locale) => (
                locale.languages.first().map(String::as_str),
                locale.keyboard.as_deref(),
            ),
            None => (None, None),
        }
    }

    fn groups(&self) -> &[GroupCustomization] {
        self.customizations
            .as_ref()
            .map(|custom| custom.group.as_slice())
            .unwrap_or_default()
    }

    fn users(&self) -> Vec<UserCustomization> {
        let Some(custom) = &self.customizations else {
            return Vec::new();
        };

        let mut users = custom.user.clone();
        let mut legacy: Vec<UserCustomization> = Vec::new();
        for sshkey in &custom.sshkey {
            // INVARIANT: User names stay unique, legacy keys fold into matching entries.
            match users.iter_mut().find(|user| user.name == sshkey.user) {
                Some(user) if user.key.as_deref().is_some_and(|key| !key.is_empty()) => {}
                Some(user) => user.key = Some(sshkey.key.clone()),
                None if legacy.iter().any(|user| user.name == sshkey.user) => {}
                None => legacy.push(UserCustomization {
                    name: sshkey.user.clone(),
                    key: Some(sshkey.key.clone()),
                    ..Default::default()
                }),
            }
        }

        legacy
            .into_iter()
            .chain(users)
            .map(|mut user| {
                // INVARIANT: No trailing slash on home directories.
                if let Some(home) = user.home.as_mut() {
                    let trimmed = home.trim_end_matches('/').len();
                    home.truncate(trimmed);
                }
                user
            })
            .collect()
    }

    fn firewall(&self) -> Option<FirewallRules> {
        let firewall = self.customizations.as_ref()?.firewall.as_ref()?;
        let enabled_services = firewall
            .services
            .as_ref()
            .map(|services| services.enabled.clone())
            .unwrap_or_default();

        Some(FirewallRules {
            ports: firewall.ports.iter().map(|port| port.replace(':', "/")).collect(),
            enabled_services,
        })
    }

    fn services(&self) -> Option<&ServicesCustomization> {
        self.customizations.as_ref()?.services.as_ref()
    }

    fn packages(&self) -> Vec<String> {
        let specs = self
            .packages
            .iter()
            .chain(&self.modules)
            .map(|package| package.to_name_version())
            .chain(self.groups.iter().map(|group| format!("@{}", group.name)));

        let mut packages: Vec<String> = Vec::new();
        for spec in specs {
            if !packages.contains(&spec) {
                packages.push(spec);
            }
        }

        packages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_blueprint_has_nothing() {
        let blueprint = Blueprint::default();

        assert_eq!(blueprint.hostname(), None);
        assert_eq!(blueprint.timezone_settings(), (None, &[][..]));
        assert_eq!(blueprint.primary_locale(), (None, None));
        assert!(blueprint.groups().is_empty());
        assert!(blueprint.users().is_empty());
        assert_eq!(blueprint.firewall(), None);
        assert_eq!(blueprint.services(), None);
        assert!(blueprint.packages().is_empty());
    }

    #[test]
    fn merge_and_deduplicate_packages() -> anyhow::Result<()> {
        let blueprint: Blueprint = indoc! {r#"
            [[packages]]
            name = "nginx"

            [[packages]]
            name = "tmux"
            version = "*"

            [[modules]]
            name = "nginx"

            [[modules]]
            name = "nodejs"
            version = "20"

            [[groups]]
            name = "core"
        "#}
        .parse()?;

        assert_eq!(
            blueprint.packages(),
            vec!["nginx", "tmux", "nodejs-20", "@core"]
        );

        Ok(())
    }

    #[test]
    fn users_include_legacy_ssh_keys() -> anyhow::Result<()> {
        let blueprint: Blueprint = indoc! {r#"
            [[customizations.sshkey]]
            user = "root"
            key = "ssh-ed25519 AAAAroot"

            [[customizations.user]]
            name = "alice"
            home = "/srv/alice//"
        "#}
        .parse()?;

        let users = blueprint.users();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].name, "root");
        assert_eq!(users[0].key.as_deref(), Some("ssh-ed25519 AAAAroot"));
        assert_eq!(users[1].name, "alice");
        assert_eq!(users[1].home.as_deref(), Some("/srv/alice"));

        Ok(())
    }

    #[test]
    fn legacy_ssh_keys_fold_into_matching_users() -> anyhow::Result<()> {
        let blueprint: Blueprint = indoc! {r#"
            [[customizations.sshkey]]
            user = "alice"
            key = "ssh-ed25519 AAAAlegacy"

            [[customizations.sshkey]]
            user = "bob"
            key = "ssh-ed25519 AAAAlegacy-bob"

            [[customizations.user]]
            name = "alice"
            home = "/srv/alice"
            uid = 1200

            [[customizations.user]]
            name = "bob"
            key = "ssh-ed25519 AAAAbob"
        "#}
        .parse()?;

        let expect = vec![
            UserCustomization {
                name: "alice".into(),
                home: Some("/srv/alice".into()),
                uid: Some(1200),
                key: Some("ssh-ed25519 AAAAlegacy".into()),
                ..Default::default()
            },
            UserCustomization {
                name: "bob".into(),
                key: Some("ssh-ed25519 AAAAbob".into()),
                ..Default::default()
            },
        ];
        assert_eq!(blueprint.users(), expect);

        Ok(())
    }

    #[test]
    fn normalize_firewall_ports() -> anyhow::Result<()> {
        let blueprint: Blueprint = indoc! {r#"
            [customizations.firewall]
            ports = ["22:tcp", "443/tcp", "30000-32767:udp"]

            [customizations.firewall.services]
            enabled = ["http"]
            disabled = ["telnet"]
        "#}
        .parse()?;

        let expect = FirewallRules {
            ports: vec!["22/tcp".into(), "443/tcp".into(), "30000-32767/udp".into()],
            enabled_services: vec!["http".into()],
        };
        assert_eq!(blueprint.firewall(), Some(expect));

        Ok(())
    }

    #[test]
    fn primary_locale_is_first_language() -> anyhow::Result<()> {
        let blueprint: Blueprint = indoc! {r#"
            [customizations.locale]
            languages = ["en_US.UTF-8", "de_DE.UTF-8"]
            keyboard = "us"
        "#}
        .parse()?;

        assert_eq!(blueprint.primary_locale(), (Some("en_US.UTF-8"), Some("us")));

        Ok(())
    }
}
