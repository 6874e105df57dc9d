//! Sample scene: a small wave-survival arena.
//!
//! Three composite roots, in list order:
//!
//! - [`BootRoot`] binds the process-wide services ([`SettingsStore`],
//!   [`SessionStats`]) on the first scene and waits in `pre_initialize` for
//!   settings coming from an asynchronous loader.
//! - [`ArenaRoot`] creates the scene services through the injector: a
//!   [`ScoreBoard`] listening to [`AwardPoints`] and a [`WaveSpawner`]. It
//!   reads the loaded settings in `initialize`, which is only safe because
//!   every root finishes `pre_initialize` first. It advances the spawner on
//!   fixed ticks and announces cleared waves on the command bus.
//! - [`HudRoot`] builds a [`HudView`] listening to [`WaveCleared`] and
//!   redraws it on late ticks.
//!
//! Host-side objects live outside the roots: a [`ScoreLabel`] receiving its
//! dependencies through member injection and an [`AudioCue`] that listens to
//! the bus once the orchestrator subscribes it.
//!
//! Factories are registered once per process with [`register_factories`];
//! the injector is shared by every scene.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use futures::future;
use futures::task::{LocalSpawn, LocalSpawnExt, SpawnError};
use log::{debug, info};

use crate::components::compositeroot::{CompositeRoot, PhaseFuture, phase_done};
use crate::components::manifest::RootManifest;
use crate::components::tickable::{FixedTickable, LateTickable, Tickable};
use crate::error::{CompositionError, Result};
use crate::events::command::{Command, CommandListener, ListenerCapabilities};
use crate::resources::commandbus::{CommandBus, ListenerTarget};
use crate::resources::scenecontext::SceneContext;
use crate::systems::injector::{Inject, Injectable, MemberInjection};
use crate::systems::orchestrator::SceneObjects;

// ---------------- commands ----------------

/// Signal: the spawner finished a wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveCleared;
impl Command for WaveCleared {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AwardPoints {
    pub points: u32,
}
impl Command for AwardPoints {}

// ---------------- global services ----------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    pub difficulty: u32,
    /// Seconds between waves.
    pub wave_interval: f32,
    pub points_per_wave: u32,
}

impl Settings {
    pub fn for_difficulty(difficulty: u32) -> Self {
        let difficulty = difficulty.max(1);
        Settings {
            difficulty,
            wave_interval: 2.0 / difficulty as f32,
            points_per_wave: 100 * difficulty,
        }
    }
}

/// Holds the settings once the loader delivers them.
#[derive(Debug, Default)]
pub struct SettingsStore {
    settings: Cell<Option<Settings>>,
}

impl SettingsStore {
    pub fn fill(&self, settings: Settings) {
        self.settings.set(Some(settings));
    }

    pub fn current(&self) -> Option<Settings> {
        self.settings.get()
    }
}

/// Statistics that outlive a single scene.
#[derive(Debug, Default)]
pub struct SessionStats {
    pub scenes_played: Cell<u32>,
    pub best_score: Cell<u32>,
}

impl SessionStats {
    pub fn record_score(&self, score: u32) {
        if score > self.best_score.get() {
            self.best_score.set(score);
        }
    }
}

// ---------------- scene services ----------------

pub trait ScoreBoard {
    fn add(&self, points: u32);
    fn total(&self) -> u32;
}

#[derive(Debug, Default)]
pub struct TallyBoard {
    total: Cell<u32>,
}

impl ScoreBoard for TallyBoard {
    fn add(&self, points: u32) {
        self.total.set(self.total.get() + points);
    }

    fn total(&self) -> u32 {
        self.total.get()
    }
}

impl CommandListener<AwardPoints> for TallyBoard {
    fn react_command(&self, command: AwardPoints) {
        self.add(command.points);
    }
}

impl ListenerCapabilities for TallyBoard {
    fn subscribe(listener: &Rc<Self>, bus: &CommandBus) {
        bus.listen::<AwardPoints>(listener.clone());
    }
}

/// Releases a wave every `wave_interval` seconds of fixed time.
pub struct WaveSpawner {
    settings: Rc<SettingsStore>,
    interval: Cell<f32>,
    until_next: Cell<f32>,
    waves: Cell<u32>,
}

impl Inject for WaveSpawner {
    type Dependencies = (Rc<SettingsStore>,);

    fn construct((settings,): Self::Dependencies) -> Self {
        WaveSpawner {
            settings,
            interval: Cell::new(f32::INFINITY),
            until_next: Cell::new(f32::INFINITY),
            waves: Cell::new(0),
        }
    }
}

impl WaveSpawner {
    /// Pick up the loaded settings. Fails until the loader has delivered.
    pub fn configure(&self) -> Option<Settings> {
        let settings = self.settings.current()?;
        self.interval.set(settings.wave_interval);
        self.until_next.set(settings.wave_interval);
        Some(settings)
    }

    /// Advance by `step` seconds. Returns the number of waves released.
    pub fn advance(&self, step: f32) -> u32 {
        let mut released = 0;
        let mut remaining = self.until_next.get() - step;
        while remaining <= 0.0 {
            released += 1;
            remaining += self.interval.get();
        }
        self.until_next.set(remaining);
        self.waves.set(self.waves.get() + released);
        released
    }

    pub fn waves(&self) -> u32 {
        self.waves.get()
    }
}

/// On-screen summary, redrawn on late ticks when something changed.
pub struct HudView {
    board: Rc<dyn ScoreBoard>,
    waves: Cell<u32>,
    dirty: Cell<bool>,
    redraws: Cell<u32>,
}

impl Inject for HudView {
    type Dependencies = (Rc<dyn ScoreBoard>,);

    fn construct((board,): Self::Dependencies) -> Self {
        HudView {
            board,
            waves: Cell::new(0),
            dirty: Cell::new(true),
            redraws: Cell::new(0),
        }
    }
}

impl HudView {
    /// Redraw when dirty. Returns whether a redraw happened.
    pub fn redraw(&self) -> bool {
        if !self.dirty.replace(false) {
            return false;
        }
        self.redraws.set(self.redraws.get() + 1);
        debug!(
            "HUD: score {} after {} wave(s)",
            self.board.total(),
            self.waves.get()
        );
        true
    }

    pub fn waves(&self) -> u32 {
        self.waves.get()
    }

    pub fn redraws(&self) -> u32 {
        self.redraws.get()
    }

    pub fn score(&self) -> u32 {
        self.board.total()
    }
}

impl CommandListener<WaveCleared> for HudView {
    fn react_command(&self, _command: WaveCleared) {
        self.waves.set(self.waves.get() + 1);
        self.dirty.set(true);
    }
}

impl ListenerCapabilities for HudView {
    fn subscribe(listener: &Rc<Self>, bus: &CommandBus) {
        bus.listen::<WaveCleared>(listener.clone());
    }
}

/// Register every injectable type of the sample scene.
pub fn register_factories(context: &SceneContext) {
    context.register_constructor::<WaveSpawner>();
    context.register_constructor::<HudView>();
    context.register_factory::<TallyBoard, _>(Vec::new(), |_| Ok(TallyBoard::default()));
}

// ---------------- host objects ----------------

/// Text widget owned by the host, wired through member injection.
#[derive(Default)]
pub struct ScoreLabel {
    board: RefCell<Option<Rc<dyn ScoreBoard>>>,
    stats: RefCell<Option<Rc<SessionStats>>>,
}

impl Injectable for ScoreLabel {
    fn name(&self) -> &str {
        "ScoreLabel"
    }

    fn inject(&self, injection: &mut MemberInjection<'_>) -> Result<()> {
        injection.method(
            "attach",
            |(board, stats): (Rc<dyn ScoreBoard>, Rc<SessionStats>)| {
                *self.board.borrow_mut() = Some(board);
                *self.stats.borrow_mut() = Some(stats);
            },
        )
    }
}

impl ScoreLabel {
    pub fn text(&self) -> String {
        let score = self.board.borrow().as_ref().map_or(0, |board| board.total());
        let best = self
            .stats
            .borrow()
            .as_ref()
            .map_or(0, |stats| stats.best_score.get());
        format!("SCORE {score:06}  BEST {best:06}")
    }

    pub fn is_attached(&self) -> bool {
        self.board.borrow().is_some()
    }
}

/// Sound cue played on every cleared wave.
#[derive(Debug, Default)]
pub struct AudioCue {
    plays: Cell<u32>,
}

impl AudioCue {
    pub fn plays(&self) -> u32 {
        self.plays.get()
    }
}

impl CommandListener<WaveCleared> for AudioCue {
    fn react_command(&self, _command: WaveCleared) {
        self.plays.set(self.plays.get() + 1);
    }
}

impl ListenerCapabilities for AudioCue {
    fn subscribe(listener: &Rc<Self>, bus: &CommandBus) {
        bus.listen::<WaveCleared>(listener.clone());
    }
}

/// Host objects of one scene, kept alive by the host.
pub struct ArenaObjects {
    pub label: Rc<ScoreLabel>,
    pub cue: Rc<AudioCue>,
}

impl ArenaObjects {
    pub fn new() -> Self {
        ArenaObjects {
            label: Rc::new(ScoreLabel::default()),
            cue: Rc::new(AudioCue::default()),
        }
    }

    pub fn scene_objects(&self) -> SceneObjects {
        SceneObjects {
            injectables: vec![self.label.clone()],
            listeners: vec![ListenerTarget::new(&self.cue)],
        }
    }
}

impl Default for ArenaObjects {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------- settings loader ----------------

/// Simulated remote settings source with random latency.
pub struct SettingsLoader {
    rng: fastrand::Rng,
}

impl SettingsLoader {
    pub fn with_seed(seed: u64) -> Self {
        SettingsLoader {
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    /// Spawn a load on `spawner`; the receiver resolves once it completes.
    pub fn request(
        &mut self,
        spawner: &impl LocalSpawn,
    ) -> std::result::Result<oneshot::Receiver<Settings>, SpawnError> {
        let (sender, receiver) = oneshot::channel();
        let latency = self.rng.u32(1..=4);
        let settings = Settings::for_difficulty(self.rng.u32(1..=3));
        spawner.spawn_local(async move {
            for _ in 0..latency {
                YieldNow::default().await;
            }
            debug!("Settings arrived after {} poll(s)", latency);
            let _ = sender.send(settings);
        })?;
        Ok(receiver)
    }
}

/// Returns `Pending` once, waking itself.
#[derive(Default)]
struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

// ---------------- composite roots ----------------

pub struct BootRoot {
    context: SceneContext,
    pending: Option<oneshot::Receiver<Settings>>,
}

impl BootRoot {
    /// `pending` is `None` when settings were loaded by an earlier scene.
    pub fn new(context: SceneContext, pending: Option<oneshot::Receiver<Settings>>) -> Self {
        BootRoot { context, pending }
    }

    async fn await_settings(&self, pending: oneshot::Receiver<Settings>) -> Result<()> {
        let settings = pending.await.map_err(|_| {
            CompositionError::phase_failed("Boot", "pre_initialize", "settings loader dropped")
        })?;
        self.context.get_global::<SettingsStore>()?.fill(settings);
        info!("Settings loaded: difficulty {}", settings.difficulty);
        Ok(())
    }

    fn count_scene(&self) -> Result<()> {
        let stats = self.context.get_global::<SessionStats>()?;
        stats.scenes_played.set(stats.scenes_played.get() + 1);
        Ok(())
    }
}

impl CompositeRoot for BootRoot {
    fn name(&self) -> &str {
        "Boot"
    }

    fn install_bindings(&mut self) -> Result<()> {
        // later scenes get the instances bound by the first one
        self.context.bind_global(Rc::new(SettingsStore::default()))?;
        self.context.bind_global(Rc::new(SessionStats::default()))?;
        Ok(())
    }

    fn pre_initialize(&mut self) -> PhaseFuture<'_> {
        match self.pending.take() {
            Some(pending) => Box::pin(self.await_settings(pending)),
            None => phase_done(),
        }
    }

    fn initialize(&mut self) -> PhaseFuture<'_> {
        Box::pin(future::ready(self.count_scene()))
    }

    fn manifest(&self) -> RootManifest {
        RootManifest::new()
            .binds::<SettingsStore>()
            .binds::<SessionStats>()
    }
}

pub struct ArenaRoot {
    context: SceneContext,
    spawner: Option<Rc<WaveSpawner>>,
    points_per_wave: u32,
    frames: u32,
}

impl ArenaRoot {
    pub fn new(context: SceneContext) -> Self {
        ArenaRoot {
            context,
            spawner: None,
            points_per_wave: 0,
            frames: 0,
        }
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }

    fn configure_spawner(&mut self) -> Result<()> {
        let spawner = self.context.get_local::<WaveSpawner>()?;
        let settings = spawner.configure().ok_or_else(|| {
            CompositionError::phase_failed("Arena", "initialize", "settings not loaded")
        })?;
        self.points_per_wave = settings.points_per_wave;
        Ok(())
    }
}

impl CompositeRoot for ArenaRoot {
    fn name(&self) -> &str {
        "Arena"
    }

    fn install_bindings(&mut self) -> Result<()> {
        self.context.get_global::<SettingsStore>()?;

        let board = Rc::new(self.context.create_with_injection::<TallyBoard>()?);
        self.context.commands().add_listener(&board);
        self.context.bind_local(board as Rc<dyn ScoreBoard>)?;

        self.spawner = Some(self.context.create_and_bind_local::<WaveSpawner>()?);
        Ok(())
    }

    fn initialize(&mut self) -> PhaseFuture<'_> {
        Box::pin(future::ready(self.configure_spawner()))
    }

    fn run(&mut self) -> PhaseFuture<'_> {
        info!("Arena open, {} point(s) per wave", self.points_per_wave);
        phase_done()
    }

    fn on_before_destroyed(&mut self) {
        if let Some(spawner) = self.spawner.take() {
            info!(
                "Arena closed after {} frame(s), {} wave(s)",
                self.frames,
                spawner.waves()
            );
        }
    }

    fn as_tickable(&mut self) -> Option<&mut dyn Tickable> {
        Some(self)
    }

    fn as_fixed_tickable(&mut self) -> Option<&mut dyn FixedTickable> {
        Some(self)
    }

    fn manifest(&self) -> RootManifest {
        RootManifest::new()
            .requires::<SettingsStore>()
            .binds::<dyn ScoreBoard>()
            .binds::<WaveSpawner>()
    }
}

impl FixedTickable for ArenaRoot {
    fn fixed_tick(&mut self, delta: f32) {
        let Some(spawner) = &self.spawner else {
            return;
        };
        let commands = self.context.commands();
        for _ in 0..spawner.advance(delta) {
            commands.send(AwardPoints {
                points: self.points_per_wave,
            });
            commands.send(WaveCleared);
        }
    }
}

impl Tickable for ArenaRoot {
    fn tick(&mut self, _delta: f32) {
        self.frames += 1;
    }
}

pub struct HudRoot {
    context: SceneContext,
    view: Option<Rc<HudView>>,
}

impl HudRoot {
    pub fn new(context: SceneContext) -> Self {
        HudRoot {
            context,
            view: None,
        }
    }
}

impl CompositeRoot for HudRoot {
    fn name(&self) -> &str {
        "Hud"
    }

    fn install_bindings(&mut self) -> Result<()> {
        self.view = Some(self.context.create_and_bind_local_listening::<HudView>()?);
        Ok(())
    }

    fn on_before_destroyed(&mut self) {
        let Some(view) = self.view.take() else {
            return;
        };
        if let Ok(stats) = self.context.get_global::<SessionStats>() {
            stats.record_score(view.score());
        }
        info!(
            "Final score {} ({} wave(s), {} redraw(s))",
            view.score(),
            view.waves(),
            view.redraws()
        );
    }

    fn as_late_tickable(&mut self) -> Option<&mut dyn LateTickable> {
        Some(self)
    }

    fn manifest(&self) -> RootManifest {
        let injector = self.context.injector();
        RootManifest::new()
            .requires_all(injector.dependencies_of::<HudView>().unwrap_or(&[]))
            .binds::<HudView>()
    }
}

impl LateTickable for HudRoot {
    fn late_tick(&mut self, _delta: f32) {
        if let Some(view) = &self.view {
            view.redraw();
        }
    }
}

/// The roots of one arena scene, in orchestration order.
pub fn arena_roots(
    context: &SceneContext,
    pending: Option<oneshot::Receiver<Settings>>,
) -> Vec<Box<dyn CompositeRoot>> {
    vec![
        Box::new(BootRoot::new(context.clone(), pending)),
        Box::new(ArenaRoot::new(context.clone())),
        Box::new(HudRoot::new(context.clone())),
    ]
}
