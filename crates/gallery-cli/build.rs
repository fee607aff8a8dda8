use chrono::Utc;
use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn main() {
    let build_hash = match git(&["describe", "--always", "--dirty=-dirty"]) {
        // Dirty builds get a build time so two of them can be told apart.
        Some(hash) if hash.ends_with("-dirty") => {
            format!("{hash}-{}", Utc::now().format("%Y%m%dT%H%MZ"))
        }
        Some(hash) => hash,
        None => "unknown".to_string(),
    };

    println!("cargo:rustc-env=BUILD_HASH={build_hash}");
    println!("cargo:rerun-if-changed=../../.git/HEAD");
    println!("cargo:rerun-if-changed=../../.git/index");
}
