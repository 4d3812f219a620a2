use std::path::PathBuf;

pub(crate) fn default_snapshot_db_path() -> PathBuf {
    default_base_dir().join("snapshot.sqlite3")
}

fn default_base_dir() -> PathBuf {
    if let Some(home) = user_home_dir() {
        return home.join(".linkpulse");
    }

    PathBuf::from(".linkpulse")
}

fn user_home_dir() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        if let Some(value) = std::env::var_os("USERPROFILE") {
            return Some(PathBuf::from(value));
        }
        let drive = std::env::var_os("HOMEDRIVE");
        let path = std::env::var_os("HOMEPATH");
        if let (Some(drive), Some(path)) = (drive, path) {
            let mut full = PathBuf::from(drive);
            full.push(path);
            return Some(full);
        }
    }

    std::env::var_os("HOME").map(PathBuf::from)
}
