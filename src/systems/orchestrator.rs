//! Scene orchestration: phase pipeline and shared update loop.
//!
//! The [`RootOrchestrator`] owns the ordered list of composite roots of one
//! scene and drives them through:
//!
//! 1. **Installing** – fresh local tier and command bus, then every root's
//!    `install_bindings`, synchronously, in list order
//! 2. **Injection sweep** – member injection into host objects, then
//!    subscription of host listeners not yet on the bus
//! 3. **PreInitializing / Initializing / Running** – every root's phase
//!    future is awaited, one root at a time, in list order; a phase finishes
//!    for all roots before the next phase starts for any root
//! 4. **Tick registration** – roots are partitioned by tick capability,
//!    keeping list order
//!
//! After that the orchestrator only reacts: the host delivers frame,
//! fixed-step and late signals and, eventually, teardown.
//!
//! Any failure aborts startup where it happened. Nothing is rolled back and
//! the orchestrator stays in the phase that failed; the host may still call
//! [`RootOrchestrator::teardown`].
//!
//! # Example
//!
//! ```ignore
//! let context = SceneContext::new();
//! let mut orchestrator = RootOrchestrator::new(context.clone())
//!     .with_root(BootRoot::new(context.clone()))
//!     .with_root(ArenaRoot::new(context.clone()));
//!
//! futures::executor::block_on(orchestrator.start())?;
//! orchestrator.fixed_tick(0.02);
//! orchestrator.tick(1.0 / 60.0);
//! orchestrator.late_tick(1.0 / 60.0);
//! orchestrator.teardown();
//! ```

use std::fmt;
use std::rc::Rc;

use log::{debug, error, info, warn};
use smallvec::SmallVec;

use crate::components::compositeroot::{CompositeRoot, RootState};
use crate::error::{CompositionError, Result};
use crate::resources::commandbus::ListenerTarget;
use crate::resources::scenecontext::SceneContext;
use crate::systems::injector::Injectable;
use crate::systems::report::DependencyReport;

/// Where the orchestrator is in its pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OrchestratorState {
    #[default]
    Idle,
    Installing,
    PreInitializing,
    Initializing,
    /// Startup finished; the update loop is live.
    Running,
    TearingDown,
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The three suspendable lifecycle phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LifecyclePhase {
    PreInitialize,
    Initialize,
    Run,
}

impl LifecyclePhase {
    const ALL: [LifecyclePhase; 3] = [
        LifecyclePhase::PreInitialize,
        LifecyclePhase::Initialize,
        LifecyclePhase::Run,
    ];

    fn orchestrator_state(self) -> OrchestratorState {
        match self {
            LifecyclePhase::PreInitialize => OrchestratorState::PreInitializing,
            LifecyclePhase::Initialize => OrchestratorState::Initializing,
            LifecyclePhase::Run => OrchestratorState::Running,
        }
    }

    fn completed(self) -> RootState {
        match self {
            LifecyclePhase::PreInitialize => RootState::PreInitialized,
            LifecyclePhase::Initialize => RootState::Initialized,
            LifecyclePhase::Run => RootState::Running,
        }
    }
}

/// Host objects discovered in the scene, handed over before startup.
#[derive(Default)]
pub struct SceneObjects {
    /// Objects with injection methods.
    pub injectables: Vec<Rc<dyn Injectable>>,
    /// Objects listening to scene commands.
    pub listeners: Vec<ListenerTarget>,
}

impl fmt::Debug for SceneObjects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneObjects")
            .field(
                "injectables",
                &self.injectables.iter().map(|i| i.name()).collect::<Vec<_>>(),
            )
            .field("listeners", &self.listeners)
            .finish()
    }
}

/// Indices into the root list, in list order.
type TickList = SmallVec<[usize; 8]>;

pub struct RootOrchestrator {
    context: SceneContext,
    roots: Vec<Box<dyn CompositeRoot>>,
    root_states: Vec<RootState>,
    objects: SceneObjects,
    state: OrchestratorState,
    started: bool,
    tickables: TickList,
    fixed_tickables: TickList,
    late_tickables: TickList,
}

impl RootOrchestrator {
    /// Idle orchestrator with no roots, working on `context`.
    pub fn new(context: SceneContext) -> Self {
        RootOrchestrator {
            context,
            roots: Vec::new(),
            root_states: Vec::new(),
            objects: SceneObjects::default(),
            state: OrchestratorState::Idle,
            started: false,
            tickables: TickList::new(),
            fixed_tickables: TickList::new(),
            late_tickables: TickList::new(),
        }
    }

    /// Append a root to the end of the list (builder pattern).
    pub fn with_root(mut self, root: impl CompositeRoot + 'static) -> Self {
        self.push_root(Box::new(root));
        self
    }

    /// Append already boxed roots, keeping their order (builder pattern).
    pub fn with_roots(mut self, roots: impl IntoIterator<Item = Box<dyn CompositeRoot>>) -> Self {
        for root in roots {
            self.push_root(root);
        }
        self
    }

    /// Host objects for the injection sweep (builder pattern).
    pub fn with_scene_objects(mut self, objects: SceneObjects) -> Self {
        self.objects = objects;
        self
    }

    /// Append a root. Only allowed while idle.
    pub fn add_root(&mut self, root: Box<dyn CompositeRoot>) -> Result<()> {
        self.expect_idle("add a composite root")?;
        self.push_root(root);
        Ok(())
    }

    /// Replace the host objects used by the injection sweep. Only allowed while idle.
    pub fn set_scene_objects(&mut self, objects: SceneObjects) -> Result<()> {
        self.expect_idle("replace scene objects")?;
        self.objects = objects;
        Ok(())
    }

    fn push_root(&mut self, root: Box<dyn CompositeRoot>) {
        self.roots.push(root);
        self.root_states.push(RootState::Uninstalled);
    }

    fn expect_idle(&self, action: &'static str) -> Result<()> {
        if self.state == OrchestratorState::Idle {
            return Ok(());
        }
        let state = if self.state == OrchestratorState::Running && !self.started {
            format!("{} (startup aborted)", self.state)
        } else {
            self.state.to_string()
        };
        Err(CompositionError::InvalidTransition { action, state })
    }

    // ---------------- startup ----------------

    /// Run install, the injection sweep and the three lifecycle phases, then
    /// register tickable roots.
    pub async fn start(&mut self) -> Result<()> {
        self.expect_idle("start")?;
        match self.start_pipeline().await {
            Ok(()) => {
                info!(
                    "Scene running with {} root(s): {} tickable, {} fixed, {} late",
                    self.roots.len(),
                    self.tickables.len(),
                    self.fixed_tickables.len(),
                    self.late_tickables.len()
                );
                Ok(())
            }
            Err(err) => {
                error!("Scene startup aborted while {}: {}", self.state, err);
                Err(err)
            }
        }
    }

    async fn start_pipeline(&mut self) -> Result<()> {
        self.install()?;
        self.inject_scene_objects()?;
        for phase in LifecyclePhase::ALL {
            self.run_phase(phase).await?;
        }
        self.register_tickables();
        self.started = true;
        Ok(())
    }

    fn install(&mut self) -> Result<()> {
        self.state = OrchestratorState::Installing;
        self.started = false;
        info!("Installing {} composite root(s)", self.roots.len());

        self.context.recreate_local();
        self.context.commands().recreate();
        self.clear_tick_lists();
        self.root_states.fill(RootState::Uninstalled);

        for (index, root) in self.roots.iter_mut().enumerate() {
            debug!("Installing bindings of {}", root.name());
            root.install_bindings()?;
            self.root_states[index] = RootState::Installed;
        }
        Ok(())
    }

    fn inject_scene_objects(&mut self) -> Result<()> {
        for target in &self.objects.injectables {
            self.context.inject_members(target.as_ref())?;
        }

        let commands = self.context.commands();
        for listener in &self.objects.listeners {
            if listener.is_subscribed(commands) {
                debug!("{} is already listening, skipped", listener.name());
                continue;
            }
            listener.subscribe(commands);
        }
        debug!(
            "Injection sweep done: {} injectable(s), {} listener(s)",
            self.objects.injectables.len(),
            self.objects.listeners.len()
        );
        Ok(())
    }

    async fn run_phase(&mut self, phase: LifecyclePhase) -> Result<()> {
        self.state = phase.orchestrator_state();
        info!("{:?} phase started", phase);

        for index in 0..self.roots.len() {
            let root = &mut self.roots[index];
            debug!("{:?}: {}", phase, root.name());
            let pending = match phase {
                LifecyclePhase::PreInitialize => root.pre_initialize(),
                LifecyclePhase::Initialize => root.initialize(),
                LifecyclePhase::Run => root.run(),
            };
            pending.await?;
            self.root_states[index] = phase.completed();
        }
        Ok(())
    }

    fn register_tickables(&mut self) {
        self.clear_tick_lists();
        for (index, root) in self.roots.iter_mut().enumerate() {
            if root.as_tickable().is_some() {
                self.tickables.push(index);
            }
            if root.as_fixed_tickable().is_some() {
                self.fixed_tickables.push(index);
            }
            if root.as_late_tickable().is_some() {
                self.late_tickables.push(index);
            }
        }
    }

    fn clear_tick_lists(&mut self) {
        self.tickables.clear();
        self.fixed_tickables.clear();
        self.late_tickables.clear();
    }

    // ---------------- update loop ----------------

    fn accepts_ticks(&self, signal: &str) -> bool {
        if !self.started {
            debug!("Ignoring {} signal while {}", signal, self.state);
        }
        self.started
    }

    /// Forward a frame signal to every tickable root.
    pub fn tick(&mut self, delta: f32) {
        if !self.accepts_ticks("tick") {
            return;
        }
        for &index in &self.tickables {
            if let Some(tickable) = self.roots[index].as_tickable() {
                tickable.tick(delta);
            }
        }
    }

    /// Forward a fixed-step signal to every fixed-tickable root.
    pub fn fixed_tick(&mut self, delta: f32) {
        if !self.accepts_ticks("fixed tick") {
            return;
        }
        for &index in &self.fixed_tickables {
            if let Some(tickable) = self.roots[index].as_fixed_tickable() {
                tickable.fixed_tick(delta);
            }
        }
    }

    /// Forward a late-frame signal to every late-tickable root.
    pub fn late_tick(&mut self, delta: f32) {
        if !self.accepts_ticks("late tick") {
            return;
        }
        for &index in &self.late_tickables {
            if let Some(tickable) = self.roots[index].as_late_tickable() {
                tickable.late_tick(delta);
            }
        }
    }

    // ---------------- teardown ----------------

    /// Notify every root, then empty the command bus and the local tier.
    /// The global tier is left untouched.
    pub fn teardown(&mut self) {
        if self.state == OrchestratorState::Idle {
            warn!("Teardown requested on an idle scene, ignored");
            return;
        }
        self.state = OrchestratorState::TearingDown;
        self.started = false;
        info!("Tearing down {} composite root(s)", self.roots.len());

        for (index, root) in self.roots.iter_mut().enumerate() {
            debug!("Destroying {}", root.name());
            root.on_before_destroyed();
            self.root_states[index] = RootState::Destroyed;
        }
        self.clear_tick_lists();
        self.context.commands().clean_up();
        self.context.clear_local();

        self.state = OrchestratorState::Idle;
    }

    // ---------------- inspection ----------------

    /// Current pipeline state. A failed startup leaves the phase it failed
    /// in, so `Running` alone does not mean the update loop is live; see
    /// [`RootOrchestrator::is_started`].
    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    /// Whether the last `start` ran to completion and no teardown followed.
    /// Tick signals are only forwarded while this holds.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// The context shared with the roots.
    pub fn context(&self) -> &SceneContext {
        &self.context
    }

    /// Number of roots in the list.
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Per-root progress, in list order.
    pub fn root_states(&self) -> &[RootState] {
        &self.root_states
    }

    /// Root names in list order.
    pub fn root_names(&self) -> Vec<&str> {
        self.roots.iter().map(|root| root.name()).collect()
    }

    fn names_of(&self, list: &TickList) -> Vec<&str> {
        list.iter().map(|&index| self.roots[index].name()).collect()
    }

    /// Names of the roots receiving [`RootOrchestrator::tick`], in delivery order.
    pub fn tickable_names(&self) -> Vec<&str> {
        self.names_of(&self.tickables)
    }

    /// Names of the roots receiving [`RootOrchestrator::fixed_tick`].
    pub fn fixed_tickable_names(&self) -> Vec<&str> {
        self.names_of(&self.fixed_tickables)
    }

    /// Names of the roots receiving [`RootOrchestrator::late_tick`].
    pub fn late_tickable_names(&self) -> Vec<&str> {
        self.names_of(&self.late_tickables)
    }

    /// Static analysis of the current root list against the global tier.
    pub fn dependency_report(&mut self) -> DependencyReport {
        let global = self.context.global();
        DependencyReport::analyze(&mut self.roots, &self.root_states, &global)
    }
}

impl fmt::Debug for RootOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootOrchestrator")
            .field("state", &self.state)
            .field("roots", &self.root_names())
            .field("root_states", &self.root_states)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::tickable::Tickable;
    use futures::executor::block_on;
    use std::cell::RefCell;

    type Journal = Rc<RefCell<Vec<String>>>;

    struct Scripted {
        name: &'static str,
        journal: Journal,
        ticks: bool,
        fails_run: bool,
    }

    impl Scripted {
        fn new(name: &'static str, journal: &Journal) -> Self {
            Scripted {
                name,
                journal: journal.clone(),
                ticks: false,
                fails_run: false,
            }
        }

        fn failing_run(mut self) -> Self {
            self.fails_run = true;
            self
        }

        fn ticking(mut self) -> Self {
            self.ticks = true;
            self
        }

        fn note(&self, event: &str) {
            self.journal.borrow_mut().push(format!("{}:{}", self.name, event));
        }
    }

    impl Tickable for Scripted {
        fn tick(&mut self, _delta: f32) {
            self.note("tick");
        }
    }

    impl CompositeRoot for Scripted {
        fn name(&self) -> &str {
            self.name
        }
        fn install_bindings(&mut self) -> Result<()> {
            self.note("install");
            Ok(())
        }
        fn pre_initialize(&mut self) -> crate::components::compositeroot::PhaseFuture<'_> {
            self.note("pre");
            crate::components::compositeroot::phase_done()
        }
        fn run(&mut self) -> crate::components::compositeroot::PhaseFuture<'_> {
            let outcome = if self.fails_run {
                Err(CompositionError::phase_failed(self.name, "run", "refused"))
            } else {
                Ok(())
            };
            Box::pin(futures::future::ready(outcome))
        }
        fn on_before_destroyed(&mut self) {
            self.note("destroyed");
        }
        fn as_tickable(&mut self) -> Option<&mut dyn Tickable> {
            if self.ticks { Some(self) } else { None }
        }
    }

    fn entries(journal: &Journal) -> Vec<String> {
        journal.borrow().clone()
    }

    // ==================== STATE MACHINE ====================

    #[test]
    fn test_new_orchestrator_is_idle() {
        let orchestrator = RootOrchestrator::new(SceneContext::new());
        assert_eq!(orchestrator.state(), OrchestratorState::Idle);
        assert!(orchestrator.is_empty());
    }

    #[test]
    fn test_start_reaches_running_with_all_roots_running() {
        let journal = Journal::default();
        let mut orchestrator = RootOrchestrator::new(SceneContext::new())
            .with_root(Scripted::new("a", &journal))
            .with_root(Scripted::new("b", &journal));

        block_on(orchestrator.start()).unwrap();
        assert_eq!(orchestrator.state(), OrchestratorState::Running);
        assert!(orchestrator.is_started());
        assert_eq!(orchestrator.root_states(), &[RootState::Running; 2]);
        assert_eq!(
            entries(&journal),
            vec!["a:install", "b:install", "a:pre", "b:pre"]
        );
    }

    #[test]
    fn test_start_twice_is_invalid() {
        let mut orchestrator = RootOrchestrator::new(SceneContext::new());
        block_on(orchestrator.start()).unwrap();
        let err = block_on(orchestrator.start()).unwrap_err();
        assert!(matches!(
            err,
            CompositionError::InvalidTransition { action: "start", .. }
        ));
    }

    #[test]
    fn test_add_root_only_while_idle() {
        let journal = Journal::default();
        let mut orchestrator = RootOrchestrator::new(SceneContext::new());
        orchestrator
            .add_root(Box::new(Scripted::new("a", &journal)))
            .unwrap();
        block_on(orchestrator.start()).unwrap();

        assert!(orchestrator
            .add_root(Box::new(Scripted::new("late", &journal)))
            .is_err());
        assert_eq!(orchestrator.root_names(), vec!["a"]);
    }

    #[test]
    fn test_run_phase_failure_is_not_a_started_scene() {
        let journal = Journal::default();
        let mut orchestrator = RootOrchestrator::new(SceneContext::new())
            .with_root(Scripted::new("a", &journal).ticking())
            .with_root(Scripted::new("b", &journal).failing_run());

        let err = block_on(orchestrator.start()).unwrap_err();
        assert!(matches!(err, CompositionError::PhaseFailed { phase: "run", .. }));
        assert_eq!(orchestrator.state(), OrchestratorState::Running);
        assert!(!orchestrator.is_started());
        assert_eq!(
            orchestrator.root_states(),
            &[RootState::Running, RootState::Initialized]
        );

        orchestrator.tick(0.1);
        assert!(!entries(&journal).contains(&"a:tick".to_string()));

        match block_on(orchestrator.start()).unwrap_err() {
            CompositionError::InvalidTransition { action, state } => {
                assert_eq!(action, "start");
                assert_eq!(state, "Running (startup aborted)");
            }
            other => panic!("unexpected error: {other}"),
        }

        orchestrator.teardown();
        assert_eq!(orchestrator.state(), OrchestratorState::Idle);
    }

    // ==================== UPDATE LOOP ====================

    #[test]
    fn test_ticks_ignored_until_running() {
        let journal = Journal::default();
        let mut orchestrator = RootOrchestrator::new(SceneContext::new())
            .with_root(Scripted::new("a", &journal).ticking());

        orchestrator.tick(0.1);
        assert!(!entries(&journal).contains(&"a:tick".to_string()));

        block_on(orchestrator.start()).unwrap();
        orchestrator.tick(0.1);
        assert_eq!(entries(&journal).last().unwrap(), "a:tick");
    }

    #[test]
    fn test_tick_lists_keep_list_order_and_skip_non_tickables() {
        let journal = Journal::default();
        let mut orchestrator = RootOrchestrator::new(SceneContext::new())
            .with_root(Scripted::new("a", &journal).ticking())
            .with_root(Scripted::new("b", &journal))
            .with_root(Scripted::new("c", &journal).ticking());
        block_on(orchestrator.start()).unwrap();

        assert_eq!(orchestrator.tickable_names(), vec!["a", "c"]);
        assert!(orchestrator.fixed_tickable_names().is_empty());
        journal.borrow_mut().clear();
        orchestrator.tick(0.1);
        assert_eq!(entries(&journal), vec!["a:tick", "c:tick"]);
    }

    // ==================== TEARDOWN ====================

    #[test]
    fn test_teardown_destroys_every_root_and_returns_to_idle() {
        let journal = Journal::default();
        let context = SceneContext::new();
        let mut orchestrator = RootOrchestrator::new(context.clone())
            .with_root(Scripted::new("a", &journal).ticking())
            .with_root(Scripted::new("b", &journal));
        block_on(orchestrator.start()).unwrap();
        context.bind_local(Rc::new(5u8)).unwrap();

        orchestrator.teardown();
        assert_eq!(orchestrator.state(), OrchestratorState::Idle);
        assert_eq!(orchestrator.root_states(), &[RootState::Destroyed; 2]);
        assert!(context.local().is_empty());
        assert!(orchestrator.tickable_names().is_empty());

        let log = entries(&journal);
        assert_eq!(&log[log.len() - 2..], &["a:destroyed", "b:destroyed"]);
    }

    #[test]
    fn test_teardown_while_idle_is_ignored() {
        let journal = Journal::default();
        let mut orchestrator =
            RootOrchestrator::new(SceneContext::new()).with_root(Scripted::new("a", &journal));
        orchestrator.teardown();
        assert!(entries(&journal).is_empty());
        assert_eq!(orchestrator.root_states(), &[RootState::Uninstalled]);
    }

    #[test]
    fn test_restart_after_teardown() {
        let journal = Journal::default();
        let mut orchestrator =
            RootOrchestrator::new(SceneContext::new()).with_root(Scripted::new("a", &journal));
        block_on(orchestrator.start()).unwrap();
        orchestrator.teardown();
        block_on(orchestrator.start()).unwrap();
        assert_eq!(orchestrator.state(), OrchestratorState::Running);
        assert_eq!(orchestrator.root_states(), &[RootState::Running]);
    }

    #[test]
    fn test_start_replaces_leftover_local_tier() {
        let journal = Journal::default();
        let context = SceneContext::new();
        let mut orchestrator =
            RootOrchestrator::new(context.clone()).with_root(Scripted::new("a", &journal));
        context.bind_local(Rc::new(5u8)).unwrap();
        context.bind_global(Rc::new(7u16)).unwrap();

        block_on(orchestrator.start()).unwrap();
        assert!(context.get_local::<u8>().is_err());
        assert!(context.local().is_empty());
        assert_eq!(*context.get_global::<u16>().unwrap(), 7);
    }
}
