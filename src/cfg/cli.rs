// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};

/// Locates the server config file named on the command line. Relative
/// paths resolve against the working directory, and the target must be an
/// existing regular file, so a bad invocation fails naming the path rather
/// than surfacing later as a YAML error.
pub fn resolve_config_path(arg: &str) -> Result<PathBuf> {
    ensure!(!arg.is_empty(), "no config file given");

    let candidate = if Path::new(arg).is_absolute() {
        PathBuf::from(arg)
    } else {
        std::env::current_dir()
            .context("cannot get current working dir")?
            .join(arg)
    };

    let resolved = candidate.canonicalize().with_context(|| {
        format!("config file {} does not exist or is unreachable", candidate.display())
    })?;
    ensure!(
        resolved.is_file(),
        "config path {} is not a regular file",
        resolved.display()
    );
    Ok(resolved)
}
