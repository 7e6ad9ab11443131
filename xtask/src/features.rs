use std::process::Command;

use anyhow::{Context, Result};

/// `ratewarden-common` feature tiers; each must build on its own.
const COMMON_FEATURES: &[&[&str]] = &[
    &["foundation"],
    &["observability"],
    &["runtime"],
    &["test-utils"],
    &["runtime", "observability"],
];

/// Check that every `ratewarden-common` tier compiles without the others,
/// then check the core crate against them.
pub fn test_feature_matrix() -> Result<()> {
    println!("Testing {} ratewarden-common feature combinations...", COMMON_FEATURES.len());

    for (index, features) in COMMON_FEATURES.iter().enumerate() {
        let joined = features.join(",");
        println!(
            "\n[{}/{}] cargo check -p ratewarden-common --no-default-features --features {joined}",
            index + 1,
            COMMON_FEATURES.len()
        );

        let status = Command::new("cargo")
            .args(["check", "-p", "ratewarden-common", "--no-default-features", "--features"])
            .arg(&joined)
            .status()
            .with_context(|| format!("Failed to run cargo check for '{joined}'"))?;

        if !status.success() {
            anyhow::bail!("Feature combination '{joined}' failed to compile");
        }

        println!("✅ Features '{joined}' compiled successfully");
    }

    println!("\n[core] cargo check -p ratewarden-core --all-targets");
    let status = Command::new("cargo")
        .args(["check", "-p", "ratewarden-core", "--all-targets"])
        .status()
        .context("Failed to run cargo check for ratewarden-core")?;
    if !status.success() {
        anyhow::bail!("ratewarden-core failed to compile against common feature set");
    }

    println!("\n✅ All feature combinations compile successfully!");
    Ok(())
}
