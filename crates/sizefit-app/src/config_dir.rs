// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Configuration file discovery.

use std::path::{Path, PathBuf};

use sizefit_core::config::AppConfig;
use sizefit_core::error::Result;
use tracing::debug;

const CONFIG_FILE: &str = "config.json";

/// Default location of the configuration file.
///
/// `$XDG_CONFIG_HOME/sizefit/config.json`, else `$HOME/.config/sizefit/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    config_base().map(|base| base.join("sizefit").join(CONFIG_FILE))
}

fn config_base() -> Option<PathBuf> {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(xdg));
    }
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config"))
}

/// Load an explicitly named file, or the default file when it exists,
/// or fall back to built-in defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        return AppConfig::load(path);
    }
    match default_config_path() {
        Some(path) if path.is_file() => {
            debug!(path = %path.display(), "Loading configuration");
            AppConfig::load(&path)
        }
        _ => Ok(AppConfig::default()),
    }
}
