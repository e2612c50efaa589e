//! Build hooks: callbacks run around each build.
//!
//! Hooks are plain closures registered in order under a fixed hook name and
//! invoked in that order. A hook that returns an error aborts the build.
//!
//! | Hook | Runs | Receives |
//! |------|------|----------|
//! | `before_build` | after routes are collected, before anything is staged | the routes about to be built |
//! | `after_build` | after the manifest and metrics are persisted | the [`BuildResult`] |

use crate::builder::BuildResult;
use crate::route::Route;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("{hook} hook #{index} failed: {message}")]
pub struct HookError {
    pub hook: &'static str,
    pub index: usize,
    pub message: String,
}

type BeforeBuild = Box<dyn Fn(&[Arc<Route>]) -> Result<(), String> + Send + Sync>;
type AfterBuild = Box<dyn Fn(&BuildResult) -> Result<(), String> + Send + Sync>;

#[derive(Default)]
pub struct Hooks {
    before_build: Vec<BeforeBuild>,
    after_build: Vec<AfterBuild>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("before_build", &self.before_build.len())
            .field("after_build", &self.after_build.len())
            .finish()
    }
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_before_build<F>(&mut self, hook: F)
    where
        F: Fn(&[Arc<Route>]) -> Result<(), String> + Send + Sync + 'static,
    {
        self.before_build.push(Box::new(hook));
    }

    pub fn on_after_build<F>(&mut self, hook: F)
    where
        F: Fn(&BuildResult) -> Result<(), String> + Send + Sync + 'static,
    {
        self.after_build.push(Box::new(hook));
    }

    pub fn run_before_build(&self, routes: &[Arc<Route>]) -> Result<(), HookError> {
        for (index, hook) in self.before_build.iter().enumerate() {
            hook(routes).map_err(|message| HookError {
                hook: "before_build",
                index,
                message,
            })?;
        }
        Ok(())
    }

    pub fn run_after_build(&self, result: &BuildResult) -> Result<(), HookError> {
        for (index, hook) in self.after_build.iter().enumerate() {
            hook(result).map_err(|message| HookError {
                hook: "after_build",
                index,
                message,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trie::Params;
    use std::sync::Mutex;

    fn route(path: &str) -> Arc<Route> {
        Arc::new(Route::custom(path, |_: &Route, _: &Params| Ok(String::new())))
    }

    #[test]
    fn hooks_run_in_registration_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = Hooks::new();
        for name in ["first", "second", "third"] {
            let calls = Arc::clone(&calls);
            hooks.on_before_build(move |_| {
                calls.lock().unwrap().push(name);
                Ok(())
            });
        }

        hooks.run_before_build(&[route("/")]).unwrap();

        assert_eq!(*calls.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn hook_receives_routes() {
        let mut hooks = Hooks::new();
        hooks.on_before_build(|routes| {
            if routes.len() == 2 {
                Ok(())
            } else {
                Err(format!("expected 2 routes, got {}", routes.len()))
            }
        });
        hooks.run_before_build(&[route("/a/"), route("/b/")]).unwrap();
    }

    #[test]
    fn failing_hook_stops_the_chain() {
        let ran_after = Arc::new(Mutex::new(false));
        let mut hooks = Hooks::new();
        hooks.on_before_build(|_| Err("nope".into()));
        let flag = Arc::clone(&ran_after);
        hooks.on_before_build(move |_| {
            *flag.lock().unwrap() = true;
            Ok(())
        });

        let err = hooks.run_before_build(&[]).unwrap_err();

        assert_eq!(err.to_string(), "before_build hook #0 failed: nope");
        assert!(!*ran_after.lock().unwrap());
    }

    #[test]
    fn empty_hooks_are_noops() {
        assert!(Hooks::new().run_before_build(&[]).is_ok());
    }
}
