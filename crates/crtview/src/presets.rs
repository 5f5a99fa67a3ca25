use std::path::Path;

use anyhow::{Context, Result};
use crtconfig::PresetFile;

use crate::paths;

/// Loads presets from `explicit`, else from the user config directory, else
/// falls back to the built-in set.
pub fn load(explicit: Option<&Path>) -> Result<PresetFile> {
    if let Some(path) = explicit {
        return PresetFile::load(path)
            .with_context(|| format!("failed to load presets from {}", path.display()));
    }
    let path = paths::default_presets_file()?;
    if path.exists() {
        return PresetFile::load(&path)
            .with_context(|| format!("failed to load presets from {}", path.display()));
    }
    tracing::debug!(path = %path.display(), "no preset file found; using built-in presets");
    Ok(PresetFile::builtin())
}

pub fn print(presets: &PresetFile) {
    let default = presets.default_preset();
    println!("Presets:");
    for name in presets.names() {
        let marker = if name == default { " (default)" } else { "" };
        println!("  {name}{marker}");
    }
}
