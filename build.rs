// SPDX-License-Identifier: MPL-2.0

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");
    println!("cargo::rerun-if-env-changed=SAZON_VERSION");

    // Packaged builds pin the version explicitly
    let version = match std::env::var("SAZON_VERSION") {
        Ok(v) => v,
        Err(_) => describe_version(),
    };

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// Version string derived from git, falling back to the crate version
///
/// - exact tag `v0.1.0` becomes `0.1.0-abcdef1`
/// - `v0.1.0-5-gabcdef1` becomes `0.1.0-dirty-abcdef1`
/// - no git metadata yields `CARGO_PKG_VERSION`
fn describe_version() -> String {
    let pkg_version = std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".to_string());

    let Some(described) = git(&["describe", "--tags", "--always", "--match", "v*"]) else {
        return pkg_version;
    };
    let described = described.strip_prefix('v').unwrap_or(&described).to_string();

    if described.contains('-') {
        let parts: Vec<&str> = described.rsplitn(3, '-').collect();
        if parts.len() >= 3 {
            let hash = parts[0].strip_prefix('g').unwrap_or(parts[0]);
            return format!("{}-dirty-{}", parts[2], hash);
        }
        return described;
    }

    match git(&["rev-parse", "--short", "HEAD"]) {
        Some(hash) if hash != described => format!("{}-{}", described, hash),
        // `describe --always` returned a bare hash: no tags yet
        Some(hash) => format!("{}-{}", pkg_version, hash),
        None => described,
    }
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
