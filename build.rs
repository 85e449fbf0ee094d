use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};

fn main() {
    // askama reads templates at compile time
    println!("cargo:rerun-if-changed=templates");
    if let Ok(entries) = fs::read_dir("templates") {
        for path in entries.flatten().map(|e| e.path()) {
            println!("cargo:rerun-if-changed={}", path.display());
        }
    }

    let build_id = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "dev".to_string());
    println!("cargo:rustc-env=ROSTER_BUILD_ID={}", build_id);
}
