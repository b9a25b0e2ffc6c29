// src/kubeconfig/reconcile.rs
use super::types::{KubeConfig, Named};
use crate::error::{KubiError, Result};
use std::{
    collections::HashMap,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// What [`persist_bundle`] did with the target file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persisted {
    Created,
    Merged,
}

pub fn load(path: &Path) -> Result<KubeConfig> {
    let text = fs::read_to_string(path).map_err(|e| KubiError::file_io("read", path, e))?;
    KubeConfig::from_yaml(&text, &path.display().to_string())
}

/// Like [`load`], but a missing file is `None` rather than an error.
pub fn load_if_exists(path: &Path) -> Result<Option<KubeConfig>> {
    match fs::read_to_string(path) {
        Ok(text) => KubeConfig::from_yaml(&text, &path.display().to_string()).map(Some),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(KubiError::file_io("read", path, e)),
    }
}

/// Creates the file when nothing exists at `path`, merges into it otherwise.
/// The decision looks at existence only, never at the current content.
pub fn persist_bundle(path: &Path, bundle: &KubeConfig) -> Result<Persisted> {
    let exists = path
        .try_exists()
        .map_err(|e| KubiError::file_io("inspect", path, e))?;

    if exists {
        merge(path, bundle)?;
        Ok(Persisted::Merged)
    } else {
        create(path, bundle)?;
        Ok(Persisted::Created)
    }
}

/// Writes `bundle` to a new owner-only file, creating parent directories.
pub fn create(path: &Path, bundle: &KubeConfig) -> Result<()> {
    let dangling = bundle.dangling_contexts();
    if !dangling.is_empty() {
        return Err(inconsistent(&dangling));
    }

    let contents = bundle.to_yaml()?;
    ensure_parent(path)?;
    write_file(path, &contents, false)?;
    info!("Created {}", path.display());
    Ok(())
}

/// Upserts every cluster, context and user of `incoming` into the file at `path`.
pub fn merge(path: &Path, incoming: &KubeConfig) -> Result<()> {
    let mut existing = load(path)?;
    merge_into(&mut existing, incoming)?;
    write_file(path, &existing.to_yaml()?, true)?;
    info!("Merged new credentials into {}", path.display());
    Ok(())
}

/// Same-named entries are replaced by the incoming ones, all others are kept.
/// `current-context` of `existing` is left alone.
pub fn merge_into(existing: &mut KubeConfig, incoming: &KubeConfig) -> Result<()> {
    let mut merged = existing.clone();
    upsert_by_name(&mut merged.clusters, &incoming.clusters);
    upsert_by_name(&mut merged.contexts, &incoming.contexts);
    upsert_by_name(&mut merged.users, &incoming.users);

    let dangling: Vec<String> = incoming
        .contexts
        .iter()
        .filter(|c| {
            merged
                .context(&c.name)
                .map_or(false, |context| !merged.resolves(context))
        })
        .map(|c| c.name.clone())
        .collect();
    if !dangling.is_empty() {
        return Err(inconsistent(&dangling));
    }

    debug!(
        "Merged {} clusters, {} contexts, {} users",
        incoming.clusters.len(),
        incoming.contexts.len(),
        incoming.users.len()
    );
    *existing = merged;
    Ok(())
}

/// Replaces the bearer token of the user referenced by `context`.
pub fn rotate_token(path: &Path, context: &str, token: &str) -> Result<()> {
    let mut config = load_if_exists(path)?.ok_or_else(|| KubiError::ContextNotFound {
        context: context.to_string(),
        detail: format!("no kubeconfig at {}", path.display()),
    })?;

    if rotate_in(&mut config, context, token)? {
        write_file(path, &config.to_yaml()?, true)?;
        info!("Rotated token for context '{}' in {}", context, path.display());
    } else {
        debug!("Token for context '{}' already up to date", context);
    }
    Ok(())
}

/// Returns whether the stored token changed. Never creates entries.
pub fn rotate_in(config: &mut KubeConfig, context: &str, token: &str) -> Result<bool> {
    let user = config
        .context(context)
        .map(|c| c.user.clone())
        .ok_or_else(|| KubiError::ContextNotFound {
            context: context.to_string(),
            detail: "no such context in kubeconfig".to_string(),
        })?;

    let auth = config
        .user_mut(&user)
        .ok_or_else(|| KubiError::ContextNotFound {
            context: context.to_string(),
            detail: format!("user '{}' referenced by the context does not exist", user),
        })?;

    if auth.token.as_deref() == Some(token) {
        return Ok(false);
    }
    auth.token = Some(token.to_string());
    Ok(true)
}

fn upsert_by_name<T: Named + Clone>(existing: &mut Vec<T>, incoming: &[T]) {
    let mut index: HashMap<String, usize> = existing
        .iter()
        .enumerate()
        .map(|(i, entry)| (entry.name().to_string(), i))
        .collect();

    for entry in incoming {
        match index.get(entry.name()) {
            Some(&i) => existing[i] = entry.clone(),
            None => {
                index.insert(entry.name().to_string(), existing.len());
                existing.push(entry.clone());
            }
        }
    }
}

fn inconsistent(contexts: &[String]) -> KubiError {
    KubiError::ValidationFailed(format!(
        "received config has contexts with unknown cluster or user: {}",
        contexts.join(", ")
    ))
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    let dir = parent_dir(path);

    #[cfg(unix)]
    let created = {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
    };
    #[cfg(not(unix))]
    let created = fs::create_dir_all(dir);

    created.map_err(|e| KubiError::file_io("create directory", dir, e))
}

/// Follows a symlinked kubeconfig to the file it points at, so the link survives
/// the rename.
fn write_target(path: &Path) -> Result<PathBuf> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => {
            let target =
                fs::canonicalize(path).map_err(|e| KubiError::file_io("resolve link", path, e))?;
            debug!("{} links to {}", path.display(), target.display());
            Ok(target)
        }
        _ => Ok(path.to_path_buf()),
    }
}

/// Writes through a temporary file in the target directory and renames it into
/// place, so readers see either the old or the new document.
fn write_file(path: &Path, contents: &str, overwrite: bool) -> Result<()> {
    let target = write_target(path)?;
    let path = target.as_path();
    let dir = parent_dir(path);
    let mut tmp = NamedTempFile::new_in(dir)
        .map_err(|e| KubiError::file_io("create a temporary file in", dir, e))?;

    // Set proper permissions
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o600))
            .map_err(|e| KubiError::file_io("restrict permissions of", tmp.path(), e))?;
    }

    tmp.write_all(contents.as_bytes())
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| KubiError::file_io("write", tmp.path(), e))?;

    let persisted = if overwrite {
        tmp.persist(path)
    } else {
        tmp.persist_noclobber(path)
    };
    persisted.map_err(|e| {
        let action = if overwrite { "replace" } else { "create" };
        KubiError::file_io(action, path, e.error)
    })?;
    Ok(())
}
