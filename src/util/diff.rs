//! Unified diffs of BUILD file contents via the system `diff`.

use std::io::Write;

use anyhow::{bail, Context, Result};
use tempfile::NamedTempFile;

use super::process::ProcessBuilder;

/// Produce a unified diff between two versions of `label`.
///
/// Returns an empty string when the contents are equal.
pub fn unified_diff(label: &str, old: &str, new: &str) -> Result<String> {
    if old == new {
        return Ok(String::new());
    }

    let old_file = write_temp(old)?;
    let new_file = write_temp(new)?;

    let cmd = ProcessBuilder::new("diff")
        .args(["-u", "--label"])
        .arg(format!("a/{}", label))
        .arg("--label")
        .arg(format!("b/{}", label))
        .arg(old_file.path())
        .arg(new_file.path());
    let output = cmd.exec()?;

    // diff exits 1 when the inputs differ.
    match output.status.code() {
        Some(0) | Some(1) => Ok(String::from_utf8_lossy(&output.stdout).into_owned()),
        code => bail!(
            "`{}` failed with exit code {:?}\n{}",
            cmd.display_command(),
            code,
            String::from_utf8_lossy(&output.stderr)
        ),
    }
}

fn write_temp(contents: &str) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new().context("failed to create temporary file")?;
    file.write_all(contents.as_bytes())
        .context("failed to write temporary file")?;
    file.flush().context("failed to write temporary file")?;
    Ok(file)
}
