// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Blueprint to shell command compiler.
//!
//! Imagecfg translates an osbuild __blueprint__ into ordered, idempotent blocks
//! of shell commands. The same blueprint can then drive both an image build
//! pipeline, and a container based "bootc" image, without writing the
//! customization logic twice.
//!
//! # Pipeline
//!
//! 1. [`blueprint`] parses the TOML document, rejecting unknown keys.
//! 2. [`compile`] turns each customization category into a named block of
//!    commands, in a fixed order.
//! 3. [`apply`] runs each block as its own script, stopping at the first
//!    failure. Alternatively, the compiled [`Script`] can just be printed for
//!    inspection.

pub mod apply;
pub mod blueprint;
pub mod compile;
pub mod path;

pub use apply::{apply, Applier, ApplyReport, BashRunner, ScriptRunner};
pub use blueprint::{view::BlueprintView, Blueprint};
pub use compile::{compile, NamedCommandBlock, Script};
