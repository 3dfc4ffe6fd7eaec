//! Where the assistant keeps its own state (config file).
//!
//! Manuals and figure images stay wherever the user points us. Secrets live in
//! the environment, never here.

use std::path::PathBuf;

/// Returns the directory holding `config.toml`.
/// On Linux: `~/.local/share/mro/`.
/// Creates the directory if it doesn't exist; returns `None` if we can't determine the path.
pub fn app_data_dir() -> Option<PathBuf> {
    let dir = directories::ProjectDirs::from("aero", "MRO", "mro")?
        .data_local_dir()
        .to_path_buf();
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_ends_with_project_name() {
        if let Some(dir) = app_data_dir() {
            assert!(dir.is_dir());
            assert!(dir.to_string_lossy().to_lowercase().contains("mro"));
        }
    }
}
