use std::path::PathBuf;

/// XDG app name used for config and state directories.
pub const APP_NAME: &str = "nomorize";
/// Overrides the state directory (memories and chat log).
pub const STATE_DIR_ENV: &str = "NOMORIZE_STATE_DIR";

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Where memories and the chat log live.
///
/// Honors [`STATE_DIR_ENV`]; otherwise the XDG state dir, falling back to
/// the local data dir on platforms without one (macOS).
pub fn state_dir() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os(STATE_DIR_ENV).filter(|value| !value.is_empty()) {
        return Some(PathBuf::from(dir));
    }
    project_dirs().map(|dirs| {
        dirs.state_dir()
            .unwrap_or_else(|| dirs.data_local_dir())
            .to_path_buf()
    })
}

/// Last-resort state directory when no home directory can be determined.
pub fn state_dir_fallback() -> PathBuf {
    std::env::temp_dir().join(format!("{APP_NAME}-state"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn state_dir_honors_override() {
        let dir = tempfile::tempdir().unwrap();
        // SAFETY: env mutation is serialized with #[serial].
        unsafe { std::env::set_var(STATE_DIR_ENV, dir.path()) };
        assert_eq!(state_dir(), Some(dir.path().to_path_buf()));
        unsafe { std::env::remove_var(STATE_DIR_ENV) };
    }

    #[test]
    #[serial]
    fn empty_override_is_ignored() {
        unsafe { std::env::set_var(STATE_DIR_ENV, "") };
        let resolved = state_dir();
        unsafe { std::env::remove_var(STATE_DIR_ENV) };
        if let Some(path) = resolved {
            assert!(path.to_string_lossy().contains(APP_NAME));
        }
    }

    #[test]
    fn fallback_is_under_temp() {
        assert!(state_dir_fallback().starts_with(std::env::temp_dir()));
    }
}
