//! Browser launching for interactive sign-in.

use async_trait::async_trait;

/// Opens an external URL in the user's browser.
///
/// Editor hosts adapt their own opener; [`SystemBrowser`] covers plain
/// desktop environments.
#[async_trait]
pub trait BrowserOpener: Send + Sync {
    async fn open(&self, url: &str) -> std::io::Result<()>;
}

/// Platform launcher: `open` on macOS, `cmd /C start` on Windows,
/// `xdg-open` elsewhere.
#[derive(Debug, Default)]
pub struct SystemBrowser;

#[async_trait]
impl BrowserOpener for SystemBrowser {
    async fn open(&self, url: &str) -> std::io::Result<()> {
        let status = launcher_command(url).status().await?;
        if status.success() {
            Ok(())
        } else {
            Err(std::io::Error::other(format!(
                "browser launcher exited with {status}"
            )))
        }
    }
}

#[cfg(target_os = "macos")]
fn launcher_command(url: &str) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new("open");
    cmd.arg(url);
    cmd
}

#[cfg(target_os = "windows")]
fn launcher_command(url: &str) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new("cmd");
    cmd.args(["/C", "start", "", url]);
    cmd
}

#[cfg(all(unix, not(target_os = "macos")))]
fn launcher_command(url: &str) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new("xdg-open");
    cmd.arg(url);
    cmd
}
