//! Cache path utilities - mining databases live under ~/.cache/repominer/<repo-hash>/

use std::path::{Path, PathBuf};
use xxhash_rust::xxh3::xxh3_64;

/// Get the cache directory for a repository.
pub fn get_cache_dir(repo_path: &Path) -> PathBuf {
    let base = dirs::cache_dir().unwrap_or_else(|| {
        dirs::home_dir()
            .map(|h| h.join(".cache"))
            .unwrap_or_else(|| PathBuf::from("."))
    });

    base.join("repominer").join(hash_path(repo_path))
}

/// Default location of the mining database for a repository.
pub fn get_mining_db_path(repo_path: &Path) -> PathBuf {
    get_cache_dir(repo_path).join("mining.redb")
}

/// Deterministic directory name: sanitized repo name plus a hash of the canonical path.
fn hash_path(path: &Path) -> String {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let hash = xxh3_64(canonical.to_string_lossy().as_bytes());

    let repo_name = canonical
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("repo")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .take(20)
        .collect::<String>();

    format!("{}-{:012x}", repo_name, hash & 0xffff_ffff_ffff)
}

/// Ensure the parent directory of `file` exists.
pub fn ensure_parent_dir(file: &Path) -> std::io::Result<()> {
    if let Some(parent) = file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_path_deterministic() {
        let path = Path::new("/tmp/test-repo");
        assert_eq!(hash_path(path), hash_path(path));
    }

    #[test]
    fn test_mining_db_path_format() {
        let db = get_mining_db_path(Path::new("/home/user/my-project"));
        let s = db.to_string_lossy();
        assert!(s.contains("repominer"));
        assert!(s.contains("my-project"));
        assert!(s.ends_with("mining.redb"));
    }
}
