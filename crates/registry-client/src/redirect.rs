//! Sending the user to the sign-in screen when recovery is exhausted
//!
//! The client never shows UI itself. When no token can be obtained it asks a
//! [`Navigator`] to move to the login location, unless it is already there.
//! Embedders and tests can supply a [`RedirectHook`] instead; it is called in
//! place of the navigator. Failures while navigating are logged and dropped.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

/// Replacement for the default navigation, called with the login path.
pub type RedirectHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Something that has a current location and can move to another one.
pub trait Navigator: Send + Sync {
    /// Current location path, if known.
    fn current_path(&self) -> Option<String>;

    /// Move to `path`.
    fn navigate(&self, path: &str) -> std::result::Result<(), String>;
}

/// Default navigator for headless use: remembers the location and prompts
/// the operator to sign in.
#[derive(Debug, Default)]
pub struct PromptNavigator {
    location: Mutex<Option<String>>,
}

impl PromptNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Navigator that starts at `path`.
    pub fn at(path: impl Into<String>) -> Self {
        Self {
            location: Mutex::new(Some(path.into())),
        }
    }
}

impl Navigator for PromptNavigator {
    fn current_path(&self) -> Option<String> {
        self.location
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn navigate(&self, path: &str) -> std::result::Result<(), String> {
        warn!(login = path, "session expired, sign in again (pet-registry login)");
        *self
            .location
            .lock()
            .map_err(|_| String::from("navigator state poisoned"))? = Some(path.to_string());
        Ok(())
    }
}

/// Redirect-to-login policy.
#[derive(Clone)]
pub struct LoginRedirect {
    login_path: String,
    hook: Option<RedirectHook>,
    navigator: Arc<dyn Navigator>,
}

impl std::fmt::Debug for LoginRedirect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRedirect")
            .field("login_path", &self.login_path)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

impl LoginRedirect {
    pub fn new(login_path: impl Into<String>) -> Self {
        Self {
            login_path: login_path.into(),
            hook: None,
            navigator: Arc::new(PromptNavigator::new()),
        }
    }

    pub fn with_hook(mut self, hook: RedirectHook) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Whether the navigator is already on the login screen.
    pub fn on_login_screen(&self) -> bool {
        self.navigator
            .current_path()
            .is_some_and(|current| current.starts_with(&self.login_path))
    }

    /// Redirect to the login screen. Returns whether a redirect was issued.
    pub fn to_login(&self) -> bool {
        if self.on_login_screen() {
            debug!("already on login screen, not redirecting");
            return false;
        }

        let path = self.login_path.as_str();
        let outcome = match &self.hook {
            Some(hook) => catch_unwind(AssertUnwindSafe(|| hook(path)))
                .map_err(|_| String::from("redirect hook panicked")),
            None => catch_unwind(AssertUnwindSafe(|| self.navigator.navigate(path)))
                .map_err(|_| String::from("navigator panicked"))
                .and_then(|result| result),
        };

        if let Err(e) = outcome {
            debug!(error = %e, "redirect to login failed, ignoring");
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingNavigator;

    impl Navigator for FailingNavigator {
        fn current_path(&self) -> Option<String> {
            Some("/pets".into())
        }

        fn navigate(&self, _path: &str) -> std::result::Result<(), String> {
            Err("navigation blocked".into())
        }
    }

    #[test]
    fn prompt_navigator_moves_to_login_once() {
        let navigator = Arc::new(PromptNavigator::at("/pets"));
        let redirect = LoginRedirect::new("/login").with_navigator(navigator.clone());

        assert!(redirect.to_login());
        assert_eq!(navigator.current_path().as_deref(), Some("/login"));

        // Already there: second failure does not navigate again
        assert!(!redirect.to_login());
    }

    #[test]
    fn hook_replaces_navigation() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let seen = calls.clone();
        let navigator = Arc::new(PromptNavigator::at("/tutors/7"));
        let redirect = LoginRedirect::new("/login")
            .with_navigator(navigator.clone())
            .with_hook(Arc::new(move |path: &str| {
                seen.lock().unwrap().push(path.to_string());
            }));

        assert!(redirect.to_login());
        assert_eq!(*calls.lock().unwrap(), vec!["/login".to_string()]);
        // Navigator untouched
        assert_eq!(navigator.current_path().as_deref(), Some("/tutors/7"));
    }

    #[test]
    fn no_redirect_from_login_screen_even_with_hook() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let redirect = LoginRedirect::new("/login")
            .with_navigator(Arc::new(PromptNavigator::at("/login?next=/pets")))
            .with_hook(Arc::new(move |_: &str| {
                counter.fetch_add(1, Ordering::SeqCst);
            }));

        assert!(!redirect.to_login());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn navigation_errors_are_swallowed() {
        let redirect = LoginRedirect::new("/login").with_navigator(Arc::new(FailingNavigator));
        assert!(redirect.to_login());
    }

    #[test]
    fn panicking_hook_is_swallowed() {
        let redirect = LoginRedirect::new("/login")
            .with_hook(Arc::new(|_: &str| panic!("no window in this environment")));
        assert!(redirect.to_login());
    }

    #[test]
    fn debug_shows_hook_presence_only() {
        let redirect = LoginRedirect::new("/login").with_hook(Arc::new(|_: &str| {}));
        let debug = format!("{redirect:?}");
        assert!(debug.contains("/login"));
        assert!(debug.contains("hook: true"));
    }
}
