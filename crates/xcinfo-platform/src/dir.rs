use std::env;
use std::path::PathBuf;

/// Application directory name used under every per-user base directory.
pub const APP_DIR: &str = "xcinfo";

pub fn user_home() -> Option<PathBuf> {
    home::home_dir()
}

pub fn user_config() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        env::var_os("APPDATA").map(PathBuf::from)
    }
    #[cfg(target_os = "macos")]
    {
        user_home().map(|p| p.join("Library/Application Support"))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| user_home().map(|p| p.join(".config")))
    }
}

pub fn user_cache() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        env::var_os("LOCALAPPDATA").map(|p| PathBuf::from(p).join("Cache"))
    }
    #[cfg(target_os = "macos")]
    {
        user_home().map(|p| p.join("Library/Caches"))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        env::var_os("XDG_CACHE_HOME")
            .map(PathBuf::from)
            .or_else(|| user_home().map(|p| p.join(".cache")))
    }
}

/// `<user-cache>/xcinfo`, not created.
pub fn app_cache() -> Option<PathBuf> {
    user_cache().map(|p| p.join(APP_DIR))
}

/// `<user-config>/xcinfo`, not created.
pub fn app_config() -> Option<PathBuf> {
    user_config().map(|p| p.join(APP_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_cache_platform_specific() {
        let cache = user_cache();
        #[cfg(target_os = "windows")]
        {
            assert!(cache.is_none() || cache.unwrap().to_string_lossy().contains("Cache"));
        }
        #[cfg(target_os = "macos")]
        {
            assert!(cache.is_none() || cache.unwrap().to_string_lossy().contains("Caches"));
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            assert!(cache.is_none() || !cache.unwrap().as_os_str().is_empty());
        }
    }

    #[test]
    fn test_app_dirs_end_with_app_name() {
        for dir in [app_cache(), app_config()].into_iter().flatten() {
            assert_eq!(dir.file_name().unwrap(), APP_DIR);
        }
    }

    #[test]
    fn test_user_home_matches_environment() {
        if let Some(home) = user_home() {
            let env_home = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE"));
            if let Some(env_home) = env_home {
                assert_eq!(home, PathBuf::from(env_home));
            }
        }
    }
}
