// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{exec_lock, BlueprintFixture};

use anyhow::Result;
use imagecfg::{
    apply::{ApplyError, RunError},
    blueprint::BlueprintError,
    compile::SCRIPT_HEADER,
    Applier, BashRunner, Blueprint, NamedCommandBlock, Script,
};
use indoc::indoc;
use pretty_assertions::assert_eq;
use std::fs::read_dir;

const FULL_BLUEPRINT: &str = indoc! {r#"
    name = "web-server"
    description = "Web server image"
    version = "0.0.1"

    [[packages]]
    name = "nginx"

    [[packages]]
    name = "firewalld"

    [customizations]
    hostname = "my-server"

    [customizations.timezone]
    timezone = "America/New_York"
    ntpservers = ["pool.ntp.org"]

    [customizations.locale]
    languages = ["en_US.UTF-8"]
    keyboard = "us"

    [[customizations.group]]
    name = "webadmin"
    gid = 1500

    [[customizations.user]]
    name = "admin"
    password = "$6$rounds=4096$salt$hash"
    key = "ssh-ed25519 AAAAC3Nza admin@example.com"
    groups = ["wheel", "webadmin"]

    [customizations.firewall]
    ports = ["80/tcp", "443/tcp"]

    [customizations.firewall.services]
    enabled = ["http", "https"]

    [customizations.services]
    enabled = ["nginx"]
    disabled = ["telnet"]
"#};

#[test]
fn bash_translation_of_full_blueprint() -> Result<()> {
    let fixture = BlueprintFixture::new(FULL_BLUEPRINT)?;
    let blueprint = Blueprint::load(fixture.path())?;
    let script = imagecfg::compile(&blueprint)?;

    let names: Vec<&str> = script.blocks().iter().map(NamedCommandBlock::name).collect();
    assert_eq!(
        names,
        vec![
            "Packages", "Hostname", "Timezone", "Locale", "Groups", "Users", "Firewall",
            "Services"
        ]
    );

    let output = script.to_string();
    assert!(output.starts_with(SCRIPT_HEADER));
    for part in [
        "dnf install -y nginx firewalld",
        "echo my-server > /etc/hostname",
        "ln -sf /usr/share/zoneinfo/America/New_York /etc/localtime",
        "en_US.UTF-8",
        "groupadd --gid 1500 webadmin",
        "useradd -m admin",
        "chpasswd -e",
        "--add-port=80/tcp",
        "--add-port=443/tcp",
        "--add-service=http",
        "--add-service=https",
        "systemctl enable nginx",
        "systemctl disable telnet",
    ] {
        assert!(output.contains(part), "script should contain {part:?}");
    }

    // Packages come first, services last.
    let install = output.find("dnf install").unwrap();
    let hostname = output.find("/etc/hostname").unwrap();
    assert!(install < hostname);
    assert!(output.trim_end().ends_with("systemctl disable telnet"));

    Ok(())
}

#[test]
fn unknown_keys_are_rejected() -> Result<()> {
    let fixture = BlueprintFixture::new(indoc! {r#"
        name = "typo"

        [customizations]
        hostname = "my-server"
        timezon = "UTC"
    "#})?;

    match Blueprint::load(fixture.path()) {
        Err(BlueprintError::UnknownKeys(keys)) => {
            assert_eq!(keys, vec!["customizations.timezon".to_string()]);
        }
        other => panic!("expected unknown keys, got {other:?}"),
    }

    Ok(())
}

#[test]
fn missing_blueprint_is_read_error() -> Result<()> {
    let fixture = BlueprintFixture::new("")?;
    let result = Blueprint::load(fixture.dir().join("nope.toml"));
    assert!(matches!(result, Err(BlueprintError::Read { .. })));

    Ok(())
}

#[test]
fn empty_blueprint_applies_nothing() -> Result<()> {
    let fixture = BlueprintFixture::new("name = \"empty\"\n")?;
    let blueprint = Blueprint::load(fixture.path())?;
    let script = imagecfg::compile(&blueprint)?;

    assert_eq!(script.to_string(), SCRIPT_HEADER);
    let report = imagecfg::apply(&script)?;
    assert!(report.is_noop());

    Ok(())
}

#[test]
fn apply_halts_at_failing_block() -> Result<()> {
    let _guard = exec_lock();
    let fixture = BlueprintFixture::new("")?;
    let first = fixture.dir().join("first");
    let third = fixture.dir().join("third");
    let script = Script::new([
        NamedCommandBlock::new("Hostname", format!("touch '{}'", first.display())),
        NamedCommandBlock::new("Groups", "false"),
        NamedCommandBlock::new("Services", format!("touch '{}'", third.display())),
    ]);

    let runner = BashRunner::new().with_scratch_dir(fixture.dir());
    match Applier::new(&script, runner).run() {
        Err(ApplyError::Block {
            source,
            index,
            name,
            commands,
        }) => {
            assert_eq!(index, 1);
            assert_eq!(name, "Groups");
            assert_eq!(commands, "false");
            assert!(matches!(source, RunError::Status(_)));
        }
        Ok(report) => panic!("expected failure, got {report:?}"),
    }

    // No rollback, and nothing after the failure.
    assert!(first.exists());
    assert!(!third.exists());

    Ok(())
}

#[test]
fn strict_mode_rejects_unset_variables() -> Result<()> {
    let _guard = exec_lock();
    let fixture = BlueprintFixture::new("")?;
    let script = Script::new([NamedCommandBlock::new(
        "Hostname",
        "echo \"$IMAGECFG_SURELY_UNSET_VARIABLE\"",
    )]);

    let runner = BashRunner::new().with_scratch_dir(fixture.dir());
    let result = Applier::new(&script, runner).run();
    assert!(matches!(result, Err(ApplyError::Block { index: 0, .. })));

    Ok(())
}

#[test]
fn scripts_are_removed_after_each_block() -> Result<()> {
    let _guard = exec_lock();
    let fixture = BlueprintFixture::new("")?;
    let scratch = fixture.dir().join("scratch");
    std::fs::create_dir(&scratch)?;

    let script = Script::new([
        NamedCommandBlock::new("Hostname", "true"),
        NamedCommandBlock::new("Locale", "exit 3"),
    ]);
    let runner = BashRunner::new().with_scratch_dir(&scratch);
    assert!(Applier::new(&script, runner).run().is_err());

    assert_eq!(read_dir(&scratch)?.count(), 0);

    Ok(())
}

#[test]
fn guarded_creation_is_idempotent() -> Result<()> {
    let _guard = exec_lock();
    let fixture = BlueprintFixture::new(indoc! {r#"
        [[customizations.group]]
        name = "root"

        [[customizations.user]]
        name = "root"
    "#})?;
    let blueprint = Blueprint::load(fixture.path())?;
    let script = imagecfg::compile(&blueprint)?;

    // Root always exists, so the guards must skip creation every time.
    for _ in 0..2 {
        let runner = BashRunner::new().with_scratch_dir(fixture.dir());
        let report = Applier::new(&script, runner).run()?;
        assert_eq!(report.applied, vec!["Groups", "Users"]);
    }

    Ok(())
}
