use std::{env, path::PathBuf};

use directories::ProjectDirs;

const PROJECT_ROOT: &str = env!("CARGO_MANIFEST_DIR");
const ASSET_DIR_ENV: &str = "CONFERENCE_ASSET_DIR";

pub fn asset_dir() -> PathBuf {
    let path = if let Ok(custom_dir) = env::var(ASSET_DIR_ENV) {
        PathBuf::from(custom_dir)
    } else if cfg!(debug_assertions) {
        PathBuf::from(PROJECT_ROOT).join("../../dev_assets")
    } else {
        match ProjectDirs::from("com", "mycompany", "conference-app") {
            Some(dirs) => dirs.data_dir().to_path_buf(),
            None => {
                tracing::warn!("No home directory available, falling back to ./data");
                PathBuf::from("data")
            }
        }
    };

    if !path.exists()
        && let Err(e) = std::fs::create_dir_all(&path)
    {
        tracing::warn!("Failed to create asset directory {}: {}", path.display(), e);
    }

    path
}

/// Default SQLite location inside the asset directory.
pub fn database_path() -> PathBuf {
    asset_dir().join("db.sqlite")
}
