//! Screenshot capture at flow decision points
//!
//! Artifacts land at `{dir}/{flowName}_{Cause}_{timestamp}.png`. The
//! timestamp has millisecond precision and a numeric suffix is appended when
//! the path already exists, so repeated captures for the same run and cause
//! never overwrite each other.

use chrono::{DateTime, Utc};
use flowcheck_core::config::DiagnosticsSettings;
use flowcheck_core::{ArtifactRef, CaptureCause, FlowError, Result, RunRecorder};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};

use crate::driver::BrowserDriver;

/// Screenshot capture options
#[derive(Debug, Clone)]
pub struct ScreenshotOptions {
    pub directory: PathBuf,
    /// Capture beyond the viewport
    pub full_page: bool,
    pub enabled: bool,
}

impl Default for ScreenshotOptions {
    fn default() -> Self {
        Self::from(&DiagnosticsSettings::default())
    }
}

impl From<&DiagnosticsSettings> for ScreenshotOptions {
    fn from(settings: &DiagnosticsSettings) -> Self {
        Self {
            directory: settings.directory.clone(),
            full_page: settings.full_page,
            enabled: settings.enabled,
        }
    }
}

/// Writes diagnostic artifacts for flow runs
#[derive(Debug, Clone, Default)]
pub struct DiagnosticsRecorder {
    options: ScreenshotOptions,
}

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_-]+").expect("valid regex"))
}

/// Flow name reduced to filesystem-safe characters
pub fn sanitize_label(label: &str) -> String {
    let cleaned = unsafe_chars().replace_all(label.trim(), "_");
    let cleaned = cleaned.trim_matches('_');
    if cleaned.is_empty() {
        "flow".to_string()
    } else {
        cleaned.to_string()
    }
}

impl DiagnosticsRecorder {
    pub fn new(options: ScreenshotOptions) -> Self {
        Self { options }
    }

    pub fn disabled() -> Self {
        Self::new(ScreenshotOptions {
            enabled: false,
            ..ScreenshotOptions::default()
        })
    }

    pub fn directory(&self) -> &Path {
        &self.options.directory
    }

    /// First free path for this label, cause and instant
    pub async fn artifact_path(
        &self,
        label: &str,
        cause: CaptureCause,
        at: DateTime<Utc>,
    ) -> Result<PathBuf> {
        let stem = format!(
            "{}_{}_{}",
            sanitize_label(label),
            cause,
            at.format("%Y%m%d_%H%M%S_%3f")
        );
        let mut path = self.options.directory.join(format!("{}.png", stem));
        let mut n = 1;
        while tokio::fs::try_exists(&path).await? {
            path = self.options.directory.join(format!("{}_{}.png", stem, n));
            n += 1;
        }
        Ok(path)
    }

    /// Capture one screenshot
    pub async fn capture(
        &self,
        driver: &dyn BrowserDriver,
        label: &str,
        cause: CaptureCause,
    ) -> Result<ArtifactRef> {
        if !self.options.enabled {
            return Err(FlowError::Capture("diagnostics disabled".to_string()));
        }

        tokio::fs::create_dir_all(&self.options.directory)
            .await
            .map_err(|e| {
                FlowError::Capture(format!(
                    "Cannot create {}: {}",
                    self.options.directory.display(),
                    e
                ))
            })?;

        let captured_at = Utc::now();
        let path = self
            .artifact_path(label, cause, captured_at)
            .await
            .map_err(|e| FlowError::Capture(e.to_string()))?;
        debug!("Capturing {} screenshot to {}", cause, path.display());

        driver
            .screenshot(&path, self.options.full_page)
            .await
            .map_err(|e| FlowError::Capture(e.to_string()))?;

        info!("Screenshot stored: {}", path.display());
        Ok(ArtifactRef {
            path,
            label: label.to_string(),
            cause,
            captured_at,
        })
    }

    /// Capture and attach to the run; a failure only adds a warning to the run log
    pub async fn capture_for_run(
        &self,
        driver: &dyn BrowserDriver,
        run: &mut RunRecorder,
        cause: CaptureCause,
    ) -> Option<ArtifactRef> {
        if !self.options.enabled {
            return None;
        }
        let label = run.name().to_string();
        match self.capture(driver, &label, cause).await {
            Ok(artifact) => {
                run.info(format!("{} screenshot saved: {}", cause, artifact.path.display()));
                run.attach_screenshot(artifact.clone());
                Some(artifact)
            }
            Err(e) => {
                run.warn(format!("Failed to capture {} screenshot: {}", cause, e));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::ScriptedDriver;
    use chrono::TimeZone;
    use flowcheck_core::FlowKind;

    fn recorder_in(dir: &Path) -> DiagnosticsRecorder {
        DiagnosticsRecorder::new(ScreenshotOptions {
            directory: dir.to_path_buf(),
            full_page: false,
            enabled: true,
        })
    }

    #[test]
    fn test_sanitize_label() {
        assert_eq!(sanitize_label("Account Login / EU"), "Account_Login_EU");
        assert_eq!(sanitize_label("login-flow_2"), "login-flow_2");
        assert_eq!(sanitize_label("///"), "flow");
    }

    #[tokio::test]
    async fn test_artifact_path_format() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = recorder_in(dir.path());
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();

        let path = recorder
            .artifact_path("Login", CaptureCause::Timeout, at)
            .await
            .unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "Login_Timeout_20240309_140507_000.png"
        );
        assert_eq!(path.parent().unwrap(), dir.path());
    }

    #[tokio::test]
    async fn test_artifact_path_skips_taken_names() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = recorder_in(dir.path());
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        std::fs::write(dir.path().join("Login_Error_20240309_140507_000.png"), b"x").unwrap();
        std::fs::write(dir.path().join("Login_Error_20240309_140507_000_1.png"), b"x").unwrap();

        let path = recorder
            .artifact_path("Login", CaptureCause::Error, at)
            .await
            .unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "Login_Error_20240309_140507_000_2.png"
        );
    }

    #[tokio::test]
    async fn test_repeated_captures_never_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = recorder_in(dir.path());
        let driver = ScriptedDriver::new("https://shop.test/");

        let mut paths = Vec::new();
        for _ in 0..3 {
            let artifact = recorder.capture(&driver, "Login", CaptureCause::Error).await.unwrap();
            assert!(artifact.path.exists());
            paths.push(artifact.path);
        }
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 3);
    }

    #[tokio::test]
    async fn test_capture_failure_only_warns() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = recorder_in(dir.path());
        let driver = ScriptedDriver::new("https://shop.test/");
        driver.fail_screenshots("disk full");

        let mut run = RunRecorder::start("Login", FlowKind::Login);
        let artifact = recorder
            .capture_for_run(&driver, &mut run, CaptureCause::Exception)
            .await;

        assert!(artifact.is_none());
        assert_eq!(run.log_count(), 1);
        assert!(run.logs()[0].message.contains("Failed to capture Exception screenshot"));
        assert!(run.logs()[0].message.contains("disk full"));
    }

    #[tokio::test]
    async fn test_disabled_recorder_is_silent() {
        let driver = ScriptedDriver::new("https://shop.test/");
        let mut run = RunRecorder::start("Login", FlowKind::Login);
        let artifact = DiagnosticsRecorder::disabled()
            .capture_for_run(&driver, &mut run, CaptureCause::Success)
            .await;

        assert!(artifact.is_none());
        assert_eq!(run.log_count(), 0);
        assert!(driver.screenshots().is_empty());
    }
}
