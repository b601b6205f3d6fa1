//! Headless browser sessions
//!
//! A [`BrowserSession`] owns one Chrome process, its CDP event handler task
//! and a throwaway profile directory. Dropping the session tears all three
//! down, so a session abandoned by a timeout or an error is still cleaned up.
//! [`SessionPool`] bounds how many sessions exist at once and runs each one
//! on its own task.

use crate::config::RenderingConfig;
use crate::fetcher::FetchError;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Browser binary names searched on `PATH`
const BROWSER_NAMES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
];

/// Locates a Chrome or Chromium binary
///
/// Checked in order: the configured path, the `CHROMIUM_PATH` environment
/// variable, well-known install locations, then `PATH`.
pub fn find_chrome_executable(configured: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = configured.map(PathBuf::from) {
        if path.exists() {
            return Some(path);
        }
        tracing::warn!("Configured chrome-executable {} does not exist", path.display());
    }

    if let Ok(path) = std::env::var("CHROMIUM_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let known: &[&str] = if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/opt/homebrew/bin/chromium",
        ]
    } else if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ]
    } else {
        &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
        ]
    };

    if let Some(path) = known.iter().map(PathBuf::from).find(|p| p.exists()) {
        return Some(path);
    }

    let search_path = std::env::var_os("PATH")?;
    std::env::split_paths(&search_path)
        .flat_map(|dir| BROWSER_NAMES.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}

/// How to launch one browser session
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub executable: PathBuf,
    pub headless: bool,
    pub window: (u32, u32),
    pub user_agent: Option<String>,
    /// Launch with the automation-detection evasion flags
    pub stealth: bool,
    pub request_timeout: Duration,
}

/// One disposable Chrome process
pub struct BrowserSession {
    // Field order is drop order: the process goes before its profile directory.
    browser: Browser,
    handler: JoinHandle<()>,
    _profile_dir: TempDir,
}

impl BrowserSession {
    /// Launches Chrome with a fresh profile directory
    pub async fn launch(options: &LaunchOptions) -> Result<Self, FetchError> {
        let profile_dir = tempfile::Builder::new()
            .prefix("quillscout-chrome-")
            .tempdir()
            .map_err(|e| {
                FetchError::RenderingEnvironment(format!("failed to create profile dir: {}", e))
            })?;

        let (width, height) = options.window;
        let mut builder = BrowserConfig::builder()
            .chrome_executable(&options.executable)
            .user_data_dir(profile_dir.path())
            .window_size(width, height)
            .request_timeout(options.request_timeout)
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-notifications")
            .arg("--mute-audio");

        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(user_agent) = &options.user_agent {
            builder = builder.arg(format!("--user-agent={}", user_agent));
        }
        if options.stealth {
            builder = builder
                .arg("--disable-blink-features=AutomationControlled")
                .arg("--disable-infobars")
                .arg("--disable-extensions");
        }

        let config = builder.build().map_err(FetchError::RenderingEnvironment)?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            FetchError::RenderingEnvironment(format!("failed to launch browser: {}", e))
        })?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::trace!("Browser handler error: {:?}", e);
                }
            }
        });

        tracing::debug!("Browser session started ({}x{})", width, height);

        Ok(Self {
            browser,
            handler,
            _profile_dir: profile_dir,
        })
    }

    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    /// Closes Chrome and waits for the process to exit
    ///
    /// Dropping the session without calling this still kills the process.
    pub async fn close(&mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::debug!("Browser close failed: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            tracing::debug!("Waiting for browser exit failed: {}", e);
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
        tracing::trace!("Browser session released");
    }
}

/// Bounded pool of browser session slots
///
/// Cloning shares the same slots, so the rendering and advanced rendering
/// fetchers compete for one budget.
#[derive(Debug, Clone)]
pub struct SessionPool {
    permits: Arc<Semaphore>,
}

impl SessionPool {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_sessions.max(1))),
        }
    }

    pub fn from_config(config: &RenderingConfig) -> Self {
        Self::new(config.max_sessions)
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Runs one browser session on its own task
    ///
    /// `deadline` covers the wait for a free slot as well as `work` itself,
    /// so a caller bounding this call with a longer timeout always sees the
    /// session deadline fire first. The slot is released and everything
    /// `work` owns is dropped before this returns, including on timeout.
    /// Dropping the returned future aborts the session task. A panic inside
    /// `work` is resumed on the caller.
    pub async fn run<F, Fut, T>(&self, deadline: Duration, work: F) -> Result<T, FetchError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
        T: Send + 'static,
    {
        let expires = tokio::time::Instant::now() + deadline;

        let permit = match tokio::time::timeout_at(expires, self.permits.clone().acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                return Err(FetchError::RenderingEnvironment(
                    "session pool closed".to_string(),
                ))
            }
            Err(_) => {
                tracing::debug!("No browser session slot within {:?}", deadline);
                return Err(FetchError::Timeout(deadline));
            }
        };

        let mut task = AbortOnDrop(tokio::spawn(async move {
            let _permit = permit;
            match tokio::time::timeout_at(expires, work()).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout(deadline)),
            }
        }));

        match (&mut task.0).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(FetchError::RenderingEnvironment(format!(
                "browser task cancelled: {}",
                e
            ))),
        }
    }
}

/// Aborts the wrapped task when dropped
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_pool_returns_work_result_and_releases_slot() {
        let pool = SessionPool::new(2);
        let value = pool.run(Duration::from_secs(1), || async { Ok(7) }).await;
        assert_eq!(value.unwrap(), 7);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn test_pool_timeout_drops_session_state() {
        let pool = SessionPool::new(1);
        let dropped = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(dropped.clone());

        let result: Result<(), FetchError> = pool
            .run(Duration::from_millis(50), move || async move {
                let _session = flag;
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(FetchError::Timeout(_))));
        assert!(dropped.load(Ordering::SeqCst));
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn test_pool_bounds_concurrent_sessions() {
        let pool = SessionPool::new(1);
        let held = pool.clone();

        let slow = tokio::spawn(async move {
            held.run(Duration::from_secs(5), || async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            })
            .await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(pool.available(), 0);

        slow.await.unwrap().unwrap();
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn test_slot_wait_counts_against_deadline() {
        let pool = SessionPool::new(1);
        let held = pool.clone();
        let holder = tokio::spawn(async move {
            held.run(Duration::from_secs(5), || async {
                tokio::time::sleep(Duration::from_millis(300)).await;
                Ok(())
            })
            .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let ran = Arc::new(AtomicBool::new(false));
        let ran_flag = ran.clone();
        let result: Result<(), FetchError> = pool
            .run(Duration::from_millis(100), move || async move {
                ran_flag.store(true, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(FetchError::Timeout(_))));
        assert!(!ran.load(Ordering::SeqCst));

        holder.await.unwrap().unwrap();
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn test_abandoned_run_tears_down_session() {
        let pool = SessionPool::new(1);
        let dropped = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(dropped.clone());

        let outer = tokio::time::timeout(
            Duration::from_millis(50),
            pool.run(Duration::from_secs(10), move || async move {
                let _session = flag;
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<(), FetchError>(())
            }),
        )
        .await;
        assert!(outer.is_err());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(dropped.load(Ordering::SeqCst));
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    #[should_panic(expected = "session defect")]
    async fn test_pool_propagates_panics() {
        let pool = SessionPool::new(1);
        let _: Result<(), FetchError> = pool
            .run(Duration::from_secs(1), || async {
                if pool_defect() {
                    panic!("session defect");
                }
                Ok(())
            })
            .await;
    }

    fn pool_defect() -> bool {
        true
    }

    #[test]
    fn test_missing_configured_executable_is_ignored() {
        let found = find_chrome_executable(Some("/nonexistent/chrome-binary"));
        if let Some(path) = found {
            assert_ne!(path, PathBuf::from("/nonexistent/chrome-binary"));
        }
    }
}
