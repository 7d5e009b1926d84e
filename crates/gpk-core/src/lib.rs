//! gpk-core: git-native package resolution, verification and flat
//! installation.
//!
//! Every package is sourced from a git repository and authenticated
//! before use: a signed annotated tag, a signed lightweight tag (by
//! commit) or a signed branch tip. Verified revisions live in a
//! content-addressed cache and are copied into deterministic
//! `node_modules` trees with maximal sharing.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]

pub mod cache;
pub mod copy;
pub mod env;
pub mod error;
pub mod filter;
pub mod git;
pub mod install;
pub mod link;
pub mod manifest;
pub mod place;
pub mod rebuild;
pub mod scripts;
pub mod source;
pub mod uninstall;
pub mod version;

pub use cache::{fetch_verified, FetchPlan};
pub use env::Env;
pub use error::{codes, Error, Result};
pub use install::{install, InstallOptions};
pub use manifest::Manifest;
pub use source::{resolve as resolve_source, ResolvedSource};
pub use uninstall::{uninstall, UninstallOptions};
