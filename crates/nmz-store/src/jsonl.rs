use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

/// One record per line. Corrupt lines are skipped on read; whole-file
/// rewrites go through a temp file and a rename.
#[derive(Debug, Clone)]
pub(crate) struct JsonlFile {
    dir: PathBuf,
    path: PathBuf,
}

impl JsonlFile {
    pub(crate) fn new(dir: &Path, file_name: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            path: dir.join(file_name),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn load<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = OpenOptions::new()
            .read(true)
            .open(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let reader = BufReader::new(file);

        let mut records = Vec::new();
        for (idx, line_result) in reader.lines().enumerate() {
            let line = line_result.with_context(|| {
                format!(
                    "failed to read line {} from {}",
                    idx + 1,
                    self.path.display()
                )
            })?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<T>(&line) {
                Ok(record) => records.push(record),
                Err(error) => {
                    warn!(
                        path = %self.path.display(),
                        line_number = idx + 1,
                        %error,
                        "skipping corrupt jsonl line"
                    );
                }
            }
        }
        Ok(records)
    }

    pub(crate) fn append<T: Serialize>(&self, record: &T) -> Result<()> {
        ensure_dir(&self.dir)?;

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        set_file_mode_600(&self.path)?;

        let line = serde_json::to_string(record).context("failed to serialize record")?;
        writeln!(file, "{line}").context("failed to append record")?;
        file.flush().context("failed to flush append")?;
        Ok(())
    }

    pub(crate) fn rewrite<T: Serialize>(&self, records: &[T]) -> Result<()> {
        ensure_dir(&self.dir)?;

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)
            .with_context(|| format!("failed to open temp file: {}", tmp_path.display()))?;
        set_file_mode_600(&tmp_path)?;

        let mut writer = BufWriter::new(file);
        for record in records {
            let line = serde_json::to_string(record).context("failed to serialize record")?;
            writeln!(writer, "{line}").context("failed to write record")?;
        }
        writer.flush().context("failed to flush rewritten file")?;

        fs::rename(&tmp_path, &self.path).with_context(|| {
            format!("failed to atomically replace {}", self.path.display())
        })?;
        Ok(())
    }
}

pub(crate) fn ensure_dir(dir: &Path) -> Result<()> {
    let dir_exists = dir.exists();
    fs::create_dir_all(dir).with_context(|| format!("failed to create dir: {}", dir.display()))?;
    if !dir_exists {
        set_dir_mode_700(dir)?;
    }
    Ok(())
}

#[cfg(unix)]
fn set_dir_mode_700(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700))
        .with_context(|| format!("failed to chmod 700: {}", path.display()))
}

#[cfg(not(unix))]
fn set_dir_mode_700(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
pub(crate) fn set_file_mode_600(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("failed to chmod 600: {}", path.display()))
}

#[cfg(not(unix))]
pub(crate) fn set_file_mode_600(_path: &Path) -> Result<()> {
    Ok(())
}
