use std::process::Command;

use anyhow::{Context, Result};

/// `zeda-common` tiers that downstream crates opt into on their own;
/// `zeda-domain` builds against `foundation` alone.
const FEATURE_COMBINATIONS: &[&[&str]] = &[
    &[], // default (runtime)
    &["foundation"],
    &["observability"],
    &["runtime"],
];

/// Check that each feature tier compiles without the default set.
pub fn test_feature_matrix() -> Result<()> {
    println!("Testing {} zeda-common feature combinations...", FEATURE_COMBINATIONS.len());

    for (index, features) in FEATURE_COMBINATIONS.iter().enumerate() {
        let is_default = features.is_empty();
        let display_label = if is_default { "default".to_string() } else { features.join(",") };

        let mut command = Command::new("cargo");
        command.args(["check", "-p", "zeda-common"]);
        if !is_default {
            command.args(["--no-default-features", "--features", display_label.as_str()]);
        }

        println!(
            "\n[{}/{}] cargo check -p zeda-common ({display_label})",
            index + 1,
            FEATURE_COMBINATIONS.len()
        );

        let status = command
            .status()
            .with_context(|| format!("Failed to run cargo check for '{display_label}'"))?;

        if !status.success() {
            anyhow::bail!("Feature combination '{display_label}' failed to compile");
        }

        println!("✅ Features '{display_label}' compiled successfully");
    }

    println!("\n✅ All {} feature combinations compile successfully!", FEATURE_COMBINATIONS.len());

    Ok(())
}
