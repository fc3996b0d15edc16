use std::process::Command;

// Exposes `PINGDOM_MAINT_GIT` as " (<describe>)" or "" for the `--version` string.
fn main() {
    let describe = Command::new("git")
        .args(["describe", "--always", "--dirty", "--exclude", "*"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let suffix = describe.map(|d| format!(" ({d})")).unwrap_or_default();
    println!("cargo:rustc-env=PINGDOM_MAINT_GIT={suffix}");
    println!("cargo:rerun-if-changed=../../.git/HEAD");
    println!("cargo:rerun-if-changed=../../.git/index");
}
