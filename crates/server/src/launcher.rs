//! Opening the share in a local web browser.
//!
//! Chrome or Chromium is preferred when installed; otherwise the platform's
//! default URL opener is used. The browser is started detached and reaped on
//! a background thread. A failed launch is logged and otherwise ignored.

use std::io;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

/// Chrome binaries searched for on `PATH`, in order.
const CHROME_CANDIDATES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
];

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl LaunchCommand {
    fn new(program: impl Into<PathBuf>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn with_url(mut self, url: &str) -> Self {
        self.args.push(url.to_string());
        self
    }

    /// Start the program without waiting for it. The returned thread waits
    /// on the child so it does not linger as a zombie.
    fn spawn_detached(&self) -> io::Result<JoinHandle<io::Result<ExitStatus>>> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        Ok(thread::spawn(move || child.wait()))
    }
}

/// Open `url` in a browser.
pub fn open_in_browser(url: &str) {
    if let Some(chrome) = find_chrome() {
        let command = chrome.with_url(url);
        match command.spawn_detached() {
            Ok(_) => {
                info!(browser = %command.program.display(), "Opened {} in browser", url);
                return;
            }
            Err(e) => {
                debug!(browser = %command.program.display(), error = %e, "Chrome launch failed, using default opener");
            }
        }
    }

    let command = default_opener(url);
    match command.spawn_detached() {
        Ok(_) => info!("Opened {} in default browser", url),
        Err(e) => warn!(opener = %command.program.display(), error = %e, "Failed to launch browser"),
    }
}

/// Locate an installed Chrome.
pub fn find_chrome() -> Option<LaunchCommand> {
    if cfg!(target_os = "macos") {
        let app = PathBuf::from("/Applications/Google Chrome.app");
        return app
            .exists()
            .then(|| LaunchCommand::new("open", &["-a", "Google Chrome"]));
    }

    if cfg!(windows) {
        return ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"]
            .iter()
            .filter_map(std::env::var_os)
            .map(|base| {
                PathBuf::from(base)
                    .join("Google")
                    .join("Chrome")
                    .join("Application")
                    .join("chrome.exe")
            })
            .find(|candidate| candidate.exists())
            .map(|chrome| LaunchCommand::new(chrome, &[]));
    }

    CHROME_CANDIDATES
        .iter()
        .find_map(|name| which::which(name).ok())
        .map(|chrome| LaunchCommand::new(chrome, &[]))
}

/// The platform's default URL opener, invoked on `url`.
pub fn default_opener(url: &str) -> LaunchCommand {
    let command = if cfg!(windows) {
        LaunchCommand::new("cmd", &["/c", "start", ""])
    } else if cfg!(target_os = "macos") {
        LaunchCommand::new("open", &[])
    } else {
        LaunchCommand::new("xdg-open", &[])
    };
    command.with_url(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_opener_ends_with_url() {
        let command = default_opener("http://127.0.0.1:3000");
        assert_eq!(command.args.last().unwrap(), "http://127.0.0.1:3000");
        assert!(!command.program.as_os_str().is_empty());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_default_opener_linux() {
        assert_eq!(
            default_opener("http://x"),
            LaunchCommand::new("xdg-open", &["http://x"])
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_find_chrome_resolves_to_existing_binary() {
        if let Some(chrome) = find_chrome() {
            assert!(chrome.program.exists());
            assert!(chrome.args.is_empty());
        }
    }

    #[test]
    fn test_with_url_appends() {
        let command = LaunchCommand::new("open", &["-a", "Google Chrome"]).with_url("http://x");
        assert_eq!(command.args, vec!["-a", "Google Chrome", "http://x"]);
    }

    #[test]
    fn test_spawn_missing_program_fails() {
        let command = LaunchCommand::new("dirshare-no-such-browser-binary", &[]);
        assert!(command.spawn_detached().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_spawn_detached_reaps_child() {
        let command = LaunchCommand::new("true", &[]);
        let status = command.spawn_detached().unwrap().join().unwrap().unwrap();
        assert!(status.success());
    }
}
