// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine where the blueprint to work with lives when the caller does not
//! say so explicitly.

use std::{env, path::PathBuf};

/// Blueprint location used by bootc-image-builder.
pub const DEFAULT_BLUEPRINT_PATH: &str = "/usr/lib/bootc-image-builder/config.toml";

/// Environment variable overriding [`DEFAULT_BLUEPRINT_PATH`].
pub const BLUEPRINT_PATH_ENV: &str = "IMAGECFG_BLUEPRINT";

/// Determine path to blueprint.
///
/// Uses the explicit path if given, then `$IMAGECFG_BLUEPRINT` if set and not
/// empty, and finally [`DEFAULT_BLUEPRINT_PATH`]. Does not check if the path
/// returned actually exists.
pub fn blueprint_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| {
            env::var_os(BLUEPRINT_PATH_ENV)
                .filter(|path| !path.is_empty())
                .map(PathBuf::from)
        })
        .unwrap_or_else(|| PathBuf::from(DEFAULT_BLUEPRINT_PATH))
}
