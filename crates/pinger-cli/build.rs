use std::process::Command;

fn main() {
    // Container builds usually have no .git; let them pass the hash in.
    let hash = std::env::var("PINGER_GIT_HASH")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .or_else(git_short_hash)
        .unwrap_or_default();

    println!("cargo:rustc-env=GIT_HASH={}", hash.trim());
    println!("cargo:rerun-if-env-changed=PINGER_GIT_HASH");
    println!("cargo:rerun-if-changed=../../.git/HEAD");
}

fn git_short_hash() -> Option<String> {
    Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
}
