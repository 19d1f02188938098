//! macOS LaunchAgent management for scheduled runs.
//!
//! `hdigest service install` writes a launchd property list that runs
//! `hdigest --config <path> run` once a day and loads it with `launchctl`.
//! `hdigest service remove` unloads and deletes it.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::{expand_home, ServiceConfig};

/// `~/Library/LaunchAgents/<label>.plist`.
pub fn plist_path(service: &ServiceConfig) -> Result<PathBuf> {
    let Some(home) = dirs::home_dir() else {
        bail!("Cannot determine home directory for LaunchAgents");
    };
    Ok(home
        .join("Library/LaunchAgents")
        .join(format!("{}.plist", service.label)))
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Render the LaunchAgent property list.
pub fn generate_plist(service: &ServiceConfig, program: &Path, config_path: &Path) -> String {
    let log_dir = expand_home(&service.log_dir);
    let arguments = [
        program.to_string_lossy().to_string(),
        "--config".to_string(),
        config_path.to_string_lossy().to_string(),
        "run".to_string(),
    ]
    .iter()
    .map(|a| format!("        <string>{}</string>\n", xml_escape(a)))
    .collect::<String>();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>{label}</string>

    <key>ProgramArguments</key>
    <array>
{arguments}    </array>

    <key>StartCalendarInterval</key>
    <dict>
        <key>Hour</key><integer>{hour}</integer>
        <key>Minute</key><integer>{minute}</integer>
    </dict>

    <key>StandardOutPath</key>
    <string>{stdout}</string>

    <key>StandardErrorPath</key>
    <string>{stderr}</string>

    <key>RunAtLoad</key>
    <true/>
</dict>
</plist>
"#,
        label = xml_escape(&service.label),
        arguments = arguments,
        hour = service.hour,
        minute = service.minute,
        stdout = xml_escape(&log_dir.join("hdigest.out").to_string_lossy()),
        stderr = xml_escape(&log_dir.join("hdigest.err").to_string_lossy()),
    )
}

/// Unload quietly; a job that was never loaded is not an error.
fn launchctl_unload(path: &Path) {
    let _ = Command::new("launchctl")
        .arg("unload")
        .arg(path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}

/// Write the plist for the running executable and (re)load it.
pub fn install(service: &ServiceConfig, config_path: &Path) -> Result<()> {
    let program = std::env::current_exe().context("Failed to locate the hdigest executable")?;
    let config_path = std::fs::canonicalize(config_path)
        .with_context(|| format!("Config file not found: {}", config_path.display()))?;
    let path = plist_path(service)?;

    println!("Using executable: {}", program.display());
    println!("Using config: {}", config_path.display());
    println!("Writing plist: {}", path.display());

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(&path, generate_plist(service, &program, &config_path))
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Reloading LaunchAgent...");
    launchctl_unload(&path);
    let output = Command::new("launchctl")
        .arg("load")
        .arg(&path)
        .output()
        .with_context(|| "Failed to execute 'launchctl load'")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("launchctl load failed: {}", stderr.trim());
    }

    let log_dir = expand_home(&service.log_dir);
    println!(
        "Scheduled daily at {:02}:{:02} ({})",
        service.hour, service.minute, service.label
    );
    println!(
        "Logs: {} {}",
        log_dir.join("hdigest.out").display(),
        log_dir.join("hdigest.err").display()
    );
    Ok(())
}

/// Unload and delete the plist. Succeeds if it was never installed.
pub fn remove(service: &ServiceConfig) -> Result<()> {
    let path = plist_path(service)?;
    println!("Removing LaunchAgent: {}", path.display());

    launchctl_unload(&path);
    if path.exists() {
        std::fs::remove_file(&path)
            .with_context(|| format!("Failed to remove {}", path.display()))?;
    }

    println!("LaunchAgent removed.");
    Ok(())
}
