// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Blueprint compilation.
//!
//! Compile a blueprint into a [`Script`]: a fixed header plus an ordered list
//! of named command blocks, one per customization category that has anything
//! to do.
//!
//! # Category Order
//!
//! Categories are always compiled in the same order, no matter how the
//! blueprint itself was written:
//!
//! 1. Packages
//! 2. Hostname
//! 3. Timezone
//! 4. Locale
//! 5. Groups
//! 6. Users
//! 7. Firewall
//! 8. Services
//!
//! Packages go first so later steps can rely on the tools they provide, e.g.,
//! `firewall-offline-cmd`. Groups go before users, because users reference
//! groups as secondary groups.
//!
//! # Script Header
//!
//! Every script starts with [`SCRIPT_HEADER`]. It runs bash in strict mode:
//! exit on error, exit on unset variables, fail on any failed pipeline stage,
//! and no glob expansion.

pub mod generate;

use crate::blueprint::view::BlueprintView;

use std::fmt::{Display, Formatter, Result as FmtResult};
use tracing::{debug, instrument};

/// Shebang and strict mode preamble shared by every script.
pub const SCRIPT_HEADER: &str = "#!/bin/bash\nset -euf -o pipefail\n";

/// Customization category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Packages,
    Hostname,
    Timezone,
    Locale,
    Groups,
    Users,
    Firewall,
    Services,
}

impl Category {
    /// Label of category used as block name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Packages => "Packages",
            Self::Hostname => "Hostname",
            Self::Timezone => "Timezone",
            Self::Locale => "Locale",
            Self::Groups => "Groups",
            Self::Users => "Users",
            Self::Firewall => "Firewall",
            Self::Services => "Services",
        }
    }
}

impl Display for Category {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.name())
    }
}

/// Block generator signature.
pub type Generator = fn(&dyn BlueprintView) -> generate::Result<String>;

/// Dispatch table of categories to generators in compilation order.
pub const BLOCK_GENERATORS: [(Category, Generator); 8] = [
    (Category::Packages, generate::packages),
    (Category::Hostname, generate::hostname),
    (Category::Timezone, generate::timezone),
    (Category::Locale, generate::locale),
    (Category::Groups, generate::groups),
    (Category::Users, generate::users),
    (Category::Firewall, generate::firewall),
    (Category::Services, generate::services),
];

/// Named block of shell commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedCommandBlock {
    name: String,
    commands: String,
}

impl NamedCommandBlock {
    /// Construct new command block.
    pub fn new(name: impl Into<String>, commands: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commands: commands.into(),
        }
    }

    /// Name of the block.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shell commands of the block.
    pub fn commands(&self) -> &str {
        &self.commands
    }
}

/// Compiled script.
///
/// Holds the shared header and every non-empty block in category order.
/// Displaying a script yields the full inspection artifact: the header
/// followed by each block, separated by blank lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    header: &'static str,
    blocks: Vec<NamedCommandBlock>,
}

impl Script {
    /// Construct new script from blocks.
    pub fn new(blocks: impl IntoIterator<Item = NamedCommandBlock>) -> Self {
        Self {
            header: SCRIPT_HEADER,
            blocks: blocks.into_iter().collect(),
        }
    }

    /// Shared script header.
    pub fn header(&self) -> &'static str {
        self.header
    }

    /// Command blocks in order.
    pub fn blocks(&self) -> &[NamedCommandBlock] {
        &self.blocks
    }

    /// Check if there is nothing to run.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Standalone script for one block.
    pub fn materialize(&self, block: &NamedCommandBlock) -> String {
        format!("{}\n{}\n", self.header, block.commands)
    }
}

impl Display for Script {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.header)?;
        if self.blocks.is_empty() {
            return Ok(());
        }

        let body = self
            .blocks
            .iter()
            .map(NamedCommandBlock::commands)
            .collect::<Vec<_>>()
            .join("\n\n");

        write!(fmt, "\n{body}\n")
    }
}

/// Compile blueprint into script.
///
/// Calls every generator exactly once in [`BLOCK_GENERATORS`] order, and
/// drops categories with nothing to do.
///
/// # Errors
///
/// - Return [`CompileError::Generate`] for the first generator that fails.
///   No further generators are run.
#[instrument(skip(view), level = "debug")]
pub fn compile(view: &dyn BlueprintView) -> Result<Script> {
    let mut blocks = Vec::new();

    for (category, generator) in BLOCK_GENERATORS {
        let commands =
            generator(view).map_err(|err| CompileError::Generate { source: err, category })?;

        if commands.is_empty() {
            debug!("no commands for {category}");
            continue;
        }

        debug!("generated {category} block:\n{commands}");
        blocks.push(NamedCommandBlock::new(category.name(), commands));
    }

    Ok(Script::new(blocks))
}

/// Compilation error types.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// Generator for a category failed.
    #[error("could not generate commands for {category}")]
    Generate {
        #[source]
        source: generate::GenerateError,
        category: Category,
    },
}

/// Friendly result alias :3
type Result<T, E = CompileError> = std::result::Result<T, E>;
