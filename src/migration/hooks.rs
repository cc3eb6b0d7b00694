//! Caller-supplied callbacks run after a successful top-level command

use std::fmt;
use std::path::Path;

type Callback = Box<dyn Fn() + Send + Sync>;
type NewCallback = Box<dyn Fn(&Path, &str) + Send + Sync>;

/// Optional lifecycle hooks
///
/// Each hook runs at most once per command, after the whole batch succeeded;
/// never between individual migrations.
#[derive(Default)]
pub struct MigrationHooks {
    after_up: Option<Callback>,
    after_down: Option<Callback>,
    after_new: Option<NewCallback>,
}

impl fmt::Debug for MigrationHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationHooks")
            .field("after_up", &self.after_up.is_some())
            .field("after_down", &self.after_down.is_some())
            .field("after_new", &self.after_new.is_some())
            .finish()
    }
}

impl MigrationHooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn after_up(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.after_up = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn after_down(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.after_down = Some(Box::new(f));
        self
    }

    /// Called with the created file and the migration name
    #[must_use]
    pub fn after_new(mut self, f: impl Fn(&Path, &str) + Send + Sync + 'static) -> Self {
        self.after_new = Some(Box::new(f));
        self
    }

    pub fn run_after_up(&self) {
        if let Some(f) = &self.after_up {
            log::debug!("Running after_up hook");
            f();
        }
    }

    pub fn run_after_down(&self) {
        if let Some(f) = &self.after_down {
            log::debug!("Running after_down hook");
            f();
        }
    }

    pub fn run_after_new(&self, path: &Path, name: &str) {
        if let Some(f) = &self.after_new {
            log::debug!("Running after_new hook for {}", path.display());
            f(path, name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_hooks_fire_only_when_set() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let hooks = MigrationHooks::new().after_up(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        hooks.run_after_up();
        hooks.run_after_down();
        hooks.run_after_new(Path::new("m.rs"), "m");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_after_new_receives_path_and_name() {
        let seen = Arc::new(std::sync::Mutex::new(None));
        let sink = Arc::clone(&seen);
        let hooks = MigrationHooks::new().after_new(move |path, name| {
            *sink.lock().unwrap() = Some((path.to_path_buf(), name.to_string()));
        });
        hooks.run_after_new(Path::new("/m/001_add_users.rs"), "add_users");
        let (path, name) = seen.lock().unwrap().clone().unwrap();
        assert_eq!(path, Path::new("/m/001_add_users.rs"));
        assert_eq!(name, "add_users");
    }
}
