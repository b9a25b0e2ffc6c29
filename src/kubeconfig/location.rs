// src/kubeconfig/location.rs
use crate::error::{KubiError, Result};
use std::{
    env,
    path::{Path, PathBuf},
};

pub const KUBECONFIG_ENV: &str = "KUBECONFIG";

/// Where the kubeconfig lives: `$KUBECONFIG` when set, else `~/.kube/config`.
pub fn resolve() -> Result<PathBuf> {
    resolve_from(env::var_os(KUBECONFIG_ENV), dirs::home_dir())
}

/// Only the first entry of a path-list `KUBECONFIG` is used, since that is
/// the file kubectl writes to.
pub fn resolve_from(
    kubeconfig: Option<std::ffi::OsString>,
    home: Option<PathBuf>,
) -> Result<PathBuf> {
    if let Some(value) = kubeconfig.filter(|v| !v.is_empty()) {
        if let Some(first) = env::split_paths(&value).find(|p| !p.as_os_str().is_empty()) {
            return Ok(expand(&first));
        }
    }

    home.map(|home| home.join(".kube").join("config"))
        .ok_or_else(|| {
            KubiError::ValidationFailed(format!(
                "cannot determine the home directory, set {} instead",
                KUBECONFIG_ENV
            ))
        })
}

fn expand(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => PathBuf::from(shellexpand::tilde(s).to_string()),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    #[test]
    fn env_value_wins() {
        let path = resolve_from(
            Some(OsString::from("/etc/kubi/config")),
            Some(PathBuf::from("/home/alice")),
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/etc/kubi/config"));
    }

    #[cfg(unix)]
    #[test]
    fn first_entry_of_a_path_list_is_used() {
        let path = resolve_from(
            Some(OsString::from("/a/config:/b/config")),
            Some(PathBuf::from("/home/alice")),
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/a/config"));
    }

    #[test]
    fn empty_env_falls_back_to_home() {
        let path = resolve_from(Some(OsString::new()), Some(PathBuf::from("/home/alice"))).unwrap();
        assert_eq!(path, PathBuf::from("/home/alice/.kube/config"));

        let path = resolve_from(None, Some(PathBuf::from("/home/bob"))).unwrap();
        assert_eq!(path, PathBuf::from("/home/bob/.kube/config"));
    }

    #[test]
    fn no_env_and_no_home_is_a_validation_error() {
        assert!(matches!(
            resolve_from(None, None),
            Err(KubiError::ValidationFailed(_))
        ));
    }
}
