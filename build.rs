// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    // Re-run build script if git HEAD changes
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");

    // Check if version is already set (e.g., in packaging builds)
    let version = if let Ok(v) = std::env::var("SURVEY_CAMERA_VERSION") {
        v
    } else {
        get_git_version()
    };

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

fn get_git_version() -> String {
    // "v0.1.0" if HEAD is exactly at a tag, "v0.1.0-5-gabcdef1" otherwise
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--match", "v*"])
        .output();

    let version = match output {
        Ok(output) if output.status.success() => {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        }
        _ => return env!("CARGO_PKG_VERSION").to_string(),
    };

    version.strip_prefix('v').unwrap_or(&version).to_string()
}
