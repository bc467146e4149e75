use crate::unit::is_access_log;
use anyhow::anyhow;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Recursively searches `root` for compressed access log files and returns
/// their paths in sorted order.
///
/// Symbolic links are followed, so linked log files and directories are
/// included.
pub fn discover_log_files(root: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(anyhow!("`{}` not found or not a directory", root.display()));
    }

    info!(path = %root.display(), "Searching for access log files");

    let mut paths = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(error) => {
                warn!(%error, "Skipping unreadable directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.file_name().to_str().is_some_and(is_access_log))
        .map(|entry| entry.into_path())
        .collect::<Vec<_>>();

    paths.sort();

    info!(num_files = paths.len(), "Found access log files");
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;
    use std::fs;

    #[test]
    fn test_discover_log_files() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let root = dir.path();

        let files = [
            "releases-mirror/mirror-b/releases.ubuntu.com-access.log-20190311.gz",
            "releases-mirror/mirror-a/releases.ubuntu.com-access.log-20190310.gz",
            "releases-mirror/mirror-a/releases.ubuntu.com-access.log-20190310",
            "releases-mirror/mirror-a/releases.ubuntu.com-error.log-20190310.gz",
            "cdimage-mirror/mirror-a/cdimage.ubuntu.com-access.log-20190310.anonymised.gz",
            "README.md",
        ];

        for file in files {
            let path = root.join(file);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, b"")?;
        }

        let paths = discover_log_files(root)?
            .into_iter()
            .map(|path| path.strip_prefix(root).map(|path| path.display().to_string()))
            .collect::<Result<Vec<_>, _>>()?;

        assert_snapshot!(paths.join("\n"), @r"
        cdimage-mirror/mirror-a/cdimage.ubuntu.com-access.log-20190310.anonymised.gz
        releases-mirror/mirror-a/releases.ubuntu.com-access.log-20190310.gz
        releases-mirror/mirror-b/releases.ubuntu.com-access.log-20190311.gz
        ");

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_discover_symlinked_log_files() -> anyhow::Result<()> {
        use std::os::unix::fs::symlink;

        let storage = tempfile::tempdir()?;
        let target = storage.path().join("releases.ubuntu.com-access.log-20190310.gz");
        fs::write(&target, b"")?;

        let dir = tempfile::tempdir()?;
        let root = dir.path();

        let mirror_a = root.join("releases-mirror/mirror-a");
        fs::create_dir_all(&mirror_a)?;
        symlink(&target, mirror_a.join("releases.ubuntu.com-access.log-20190310.gz"))?;

        // a linked mirror directory
        let mirror_b = storage.path().join("mirror-b");
        fs::create_dir_all(&mirror_b)?;
        fs::write(mirror_b.join("releases.ubuntu.com-access.log-20190311.gz"), b"")?;
        symlink(&mirror_b, root.join("releases-mirror/mirror-b"))?;

        let paths = discover_log_files(root)?
            .into_iter()
            .map(|path| path.strip_prefix(root).map(|path| path.display().to_string()))
            .collect::<Result<Vec<_>, _>>()?;

        assert_snapshot!(paths.join("\n"), @r"
        releases-mirror/mirror-a/releases.ubuntu.com-access.log-20190310.gz
        releases-mirror/mirror-b/releases.ubuntu.com-access.log-20190311.gz
        ");

        Ok(())
    }

    #[test]
    fn test_missing_root() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;

        let error = discover_log_files(&dir.path().join("missing")).unwrap_err();
        assert!(error.to_string().ends_with("not found or not a directory"));

        Ok(())
    }
}
