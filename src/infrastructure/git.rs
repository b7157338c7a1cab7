//! Git helpers for commit SHA detection.
//!
//! Deploy records a commit SHA per release; when the user does not pass one
//! explicitly we ask the working tree.

use anyhow::{Context, Result};
use std::process::Command;

/// Full commit SHA of HEAD.
pub fn get_full_sha() -> Result<String> {
    rev_parse(&["rev-parse", "HEAD"])
}

/// Short (7 character) commit SHA of HEAD.
pub fn get_short_sha() -> Result<String> {
    rev_parse(&["rev-parse", "--short=7", "HEAD"])
}

fn rev_parse(args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .output()
        .context("Failed to execute git rev-parse")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("Git command failed: {}", stderr);
    }

    let sha = String::from_utf8(output.stdout)
        .context("Git output is not valid UTF-8")?
        .trim()
        .to_string();

    Ok(sha)
}
