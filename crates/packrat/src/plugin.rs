//! Plugins and build lifecycle signals
//!
//! A plugin registers callbacks on [`Hooks`] once, before the first build. The compiler
//! fires each [`Lifecycle`] signal at a fixed point of the build and hands every callback
//! tapped on it an immutable [`BuildEvent`]. Callbacks observe the build; a callback error
//! aborts it.

use std::{fmt, path::Path};

use anyhow::{Context, Result, bail};
use log::{info, trace};
use rustc_hash::FxHashMap;

use crate::module_id::ModuleId;

/// Points of a build at which plugins are notified, in firing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Lifecycle {
    /// Fired once before the entry module is read
    BeforeBuild,
    /// Fired once after the bundle has been written
    AfterEmit,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeforeBuild => f.write_str("before-build"),
            Self::AfterEmit => f.write_str("after-emit"),
        }
    }
}

/// Payload passed to lifecycle callbacks
#[derive(Debug, Clone, Copy)]
pub enum BuildEvent<'a> {
    BeforeBuild {
        root: &'a Path,
        entry: &'a Path,
    },
    AfterEmit {
        entry: &'a ModuleId,
        module_count: usize,
        output_file: &'a Path,
    },
}

impl BuildEvent<'_> {
    pub fn lifecycle(&self) -> Lifecycle {
        match self {
            Self::BeforeBuild { .. } => Lifecycle::BeforeBuild,
            Self::AfterEmit { .. } => Lifecycle::AfterEmit,
        }
    }
}

type Callback = Box<dyn Fn(&BuildEvent<'_>) -> Result<()> + Send + Sync>;

struct Tap {
    name: String,
    callback: Callback,
}

/// Callback registry keyed by lifecycle signal
#[derive(Default)]
pub struct Hooks {
    taps: FxHashMap<Lifecycle, Vec<Tap>>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lifecycles: Vec<_> = self.taps.keys().copied().collect();
        lifecycles.sort_unstable();
        let mut map = f.debug_map();
        for lifecycle in lifecycles {
            let names: Vec<&str> = self.taps[&lifecycle]
                .iter()
                .map(|tap| tap.name.as_str())
                .collect();
            map.entry(&lifecycle, &names);
        }
        map.finish()
    }
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` under `name`; callbacks of one signal run in registration order
    pub fn tap<F>(&mut self, lifecycle: Lifecycle, name: impl Into<String>, callback: F)
    where
        F: Fn(&BuildEvent<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.taps.entry(lifecycle).or_default().push(Tap {
            name: name.into(),
            callback: Box::new(callback),
        });
    }

    /// Number of callbacks tapped on `lifecycle`
    pub fn tap_count(&self, lifecycle: Lifecycle) -> usize {
        self.taps.get(&lifecycle).map_or(0, Vec::len)
    }

    /// Run every callback tapped on the event's signal, stopping at the first failure
    pub fn call(&self, event: &BuildEvent<'_>) -> Result<()> {
        let lifecycle = event.lifecycle();
        let Some(taps) = self.taps.get(&lifecycle) else {
            return Ok(());
        };
        for tap in taps {
            trace!("Calling {lifecycle} hook '{}'", tap.name);
            (tap.callback)(event)
                .with_context(|| format!("Plugin hook '{}' failed on {lifecycle}", tap.name))?;
        }
        Ok(())
    }
}

/// Extension that subscribes to lifecycle signals
pub trait Plugin: fmt::Debug {
    fn name(&self) -> &str;

    fn apply(&self, hooks: &mut Hooks);
}

/// Logs the build inputs and the emitted bundle at info level
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildLogPlugin;

impl BuildLogPlugin {
    pub const NAME: &'static str = "build-log";
}

impl Plugin for BuildLogPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn apply(&self, hooks: &mut Hooks) {
        hooks.tap(Lifecycle::BeforeBuild, Self::NAME, |event| {
            if let BuildEvent::BeforeBuild { root, entry } = event {
                info!(
                    "Bundling {} (project root {})",
                    entry.display(),
                    root.display()
                );
            }
            Ok(())
        });
        hooks.tap(Lifecycle::AfterEmit, Self::NAME, |event| {
            if let BuildEvent::AfterEmit {
                entry,
                module_count,
                output_file,
            } = event
            {
                info!(
                    "Bundled {module_count} modules from {entry} into {}",
                    output_file.display()
                );
            }
            Ok(())
        });
    }
}

/// Look up a plugin shipped with packrat by its configuration name
pub fn builtin_plugin(name: &str) -> Result<Box<dyn Plugin>> {
    match name {
        BuildLogPlugin::NAME => Ok(Box::new(BuildLogPlugin)),
        _ => bail!(
            "Unknown plugin '{name}' (available: {})",
            BuildLogPlugin::NAME
        ),
    }
}
