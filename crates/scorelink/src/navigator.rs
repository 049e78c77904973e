//! External navigation hook.
//!
//! Where "redirect the user" actually leads depends on the host: a browser
//! page change, opening a URL, or just a log line in a headless run.

/// Sends the user to another page.
///
/// # Example
///
/// ```rust
/// use std::sync::Mutex;
/// use scorelink::Navigator;
///
/// #[derive(Default)]
/// struct Recorder(Mutex<Vec<String>>);
///
/// impl Navigator for Recorder {
///     fn navigate(&self, url: &str) {
///         self.0.lock().unwrap().push(url.to_owned());
///     }
/// }
/// ```
pub trait Navigator: Send + Sync + 'static {
    /// Navigates to `url`. Called at most once per redirect.
    fn navigate(&self, url: &str);
}

/// A [`Navigator`] that only logs the target URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, url: &str) {
        tracing::info!(url, "redirecting");
    }
}
