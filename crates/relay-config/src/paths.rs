use std::path::PathBuf;

/// XDG app name used for the config directory.
pub const APP_NAME: &str = "integration-relay";

const CONFIG_FILE_NAME: &str = "config.toml";

fn project_config_dir(app_name: &str) -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", app_name).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Config directory, or `None` when no home directory can be resolved
/// (e.g. minimal containers).
pub fn config_dir() -> Option<PathBuf> {
    project_config_dir(APP_NAME)
}

/// Default location of the config file.
pub fn config_file() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_lives_under_app_dir() {
        if let Some(path) = config_file() {
            assert!(path.ends_with("config.toml"));
            assert!(
                path.components()
                    .any(|component| component.as_os_str() == APP_NAME),
                "unexpected config path: {}",
                path.display()
            );
        }
    }
}
