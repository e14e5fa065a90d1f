use crate::error::MonitorError;
use crate::scrapers::traits::Notifier;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// Desktop notifications through the platform's notification tool
pub struct DesktopNotifier {
    app_name: String,
    timeout_ms: u32,
}

impl DesktopNotifier {
    pub fn new(app_name: &str) -> Self {
        Self {
            app_name: app_name.to_string(),
            timeout_ms: 10_000,
        }
    }

    fn command(&self, title: &str, message: &str) -> Result<Command> {
        if cfg!(target_os = "macos") {
            let script = format!(
                "display notification \"{}\" with title \"{}\"",
                applescript_escape(message),
                applescript_escape(title)
            );
            let mut cmd = Command::new("osascript");
            cmd.arg("-e").arg(script);
            Ok(cmd)
        } else if cfg!(unix) {
            let mut cmd = Command::new("notify-send");
            cmd.arg("--app-name")
                .arg(&self.app_name)
                .arg("--expire-time")
                .arg(self.timeout_ms.to_string())
                .arg(title)
                .arg(message);
            Ok(cmd)
        } else {
            Err(MonitorError::Notify("no notification tool for this platform".to_string()).into())
        }
    }
}

#[async_trait]
impl Notifier for DesktopNotifier {
    async fn notify(&self, title: &str, message: &str) -> Result<()> {
        let status = self
            .command(title, message)?
            .status()
            .await
            .context("Failed to run notification tool")?;

        if !status.success() {
            return Err(MonitorError::Notify(format!("notification tool exited with {}", status)).into());
        }

        debug!("Displayed notification '{}'", title);
        Ok(())
    }
}

fn applescript_escape(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_applescript_escape_quotes() {
        assert_eq!(applescript_escape(r#"Room "A" \ B"#), r#"Room \"A\" \\ B"#);
    }
}
