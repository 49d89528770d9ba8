//! Build script embedding version metadata
//!
//! Exposes `GIT_COMMIT_HASH` and `BUILD_TIMESTAMP` to the binary for
//! `pilot --version`.

fn main() {
    // 1. Get the current Git commit hash
    let commit_hash = std::process::Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=GIT_COMMIT_HASH={}", commit_hash);

    // 2. Get the current Build Timestamp (ISO 8601)
    let build_time = chrono::Utc::now().to_rfc3339();
    println!("cargo:rustc-env=BUILD_TIMESTAMP={}", build_time);

    println!("cargo:rerun-if-changed=build.rs");
}
