//! The unit of composition driven by the orchestrator.
//!
//! A [`CompositeRoot`] owns a slice of a scene: it binds services during
//! install and walks them through the asynchronous lifecycle phases. Roots
//! receive a [`SceneContext`](crate::resources::scenecontext::SceneContext)
//! clone when the host builds them and use it for every lookup and binding.
//!
//! # Lifecycle
//!
//! ```text
//! Uninstalled -> Installed -> PreInitialized -> Initialized -> Running -> Destroyed
//! ```
//!
//! Every root finishes a phase before any root starts the next one, so a
//! root's `run` may rely on every other root having completed `initialize`.
//!
//! # Example
//!
//! ```ignore
//! struct Hud {
//!     context: SceneContext,
//! }
//!
//! impl CompositeRoot for Hud {
//!     fn install_bindings(&mut self) -> Result<()> {
//!         let score = self.context.get_local::<dyn ScoreBoard>()?;
//!         self.context.bind_local(Rc::new(HudView::new(score)))?;
//!         Ok(())
//!     }
//!
//!     fn initialize(&mut self) -> PhaseFuture<'_> {
//!         Box::pin(self.load_layout())
//!     }
//! }
//!
//! impl Hud {
//!     async fn load_layout(&self) -> Result<()> {
//!         let layout = fetch_layout().await?;
//!         self.context.get_local::<HudView>()?.apply(layout);
//!         Ok(())
//!     }
//! }
//! ```

use std::any::type_name;
use std::fmt;

use futures::future::{self, FutureExt, LocalBoxFuture};

use crate::components::manifest::RootManifest;
use crate::components::tickable::{FixedTickable, LateTickable, Tickable};
use crate::error::Result;

/// Future returned by the suspendable lifecycle phases.
pub type PhaseFuture<'a> = LocalBoxFuture<'a, Result<()>>;

/// An already-completed successful phase.
pub fn phase_done<'a>() -> PhaseFuture<'a> {
    future::ready(Ok(())).boxed_local()
}

/// Lifecycle position of one root within the current scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize)]
pub enum RootState {
    #[default]
    Uninstalled,
    Installed,
    PreInitialized,
    Initialized,
    Running,
    Destroyed,
}

impl fmt::Display for RootState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

pub trait CompositeRoot {
    /// Display name used in logs and reports.
    fn name(&self) -> &str {
        type_name::<Self>()
    }

    /// Register services. Runs once, synchronously, in list order.
    fn install_bindings(&mut self) -> Result<()> {
        Ok(())
    }

    fn pre_initialize(&mut self) -> PhaseFuture<'_> {
        phase_done()
    }

    fn initialize(&mut self) -> PhaseFuture<'_> {
        phase_done()
    }

    fn run(&mut self) -> PhaseFuture<'_> {
        phase_done()
    }

    /// Called once at teardown, before the local tier is cleared.
    fn on_before_destroyed(&mut self) {}

    fn as_tickable(&mut self) -> Option<&mut dyn Tickable> {
        None
    }

    fn as_fixed_tickable(&mut self) -> Option<&mut dyn FixedTickable> {
        None
    }

    fn as_late_tickable(&mut self) -> Option<&mut dyn LateTickable> {
        None
    }

    /// What this root binds and requires, for the dependency report.
    fn manifest(&self) -> RootManifest {
        RootManifest::default()
    }
}

/// Tick capabilities declared by a root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct Capabilities {
    pub tick: bool,
    pub fixed_tick: bool,
    pub late_tick: bool,
}

impl Capabilities {
    pub fn of(root: &mut dyn CompositeRoot) -> Self {
        Capabilities {
            tick: root.as_tickable().is_some(),
            fixed_tick: root.as_fixed_tickable().is_some(),
            late_tick: root.as_late_tickable().is_some(),
        }
    }
}
