//! Top-level owner of every scene and the subsystem context.

mod clock;

pub use clock::FrameClock;

use glam::Vec3;
use slotmap::{SecondaryMap, SlotMap};

use crate::{
    audio::AudioSink,
    config::EngineConfig,
    graphics::RenderBackend,
    input::{InputController, PointerEvent},
    scene::{ObjectId, SceneId, UScene},
    service::RaycastHit,
    system::{SystemInterface, Systems},
    EngineError, Result,
};

#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    scenes: SlotMap<SceneId, UScene>,
    inputs: SecondaryMap<SceneId, InputController>,
    systems: Systems,
    clock: FrameClock,
    running: bool,
}

impl Engine {
    /// Validates `config` and initialises every subsystem with the headless
    /// collaborators.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let systems = Systems::new(&config);
        Self::start(config, systems)
    }

    pub fn with_backends(
        config: EngineConfig,
        render: Box<dyn RenderBackend>,
        sink: Box<dyn AudioSink>,
    ) -> Result<Self> {
        config.validate()?;
        let systems = Systems::with_backends(&config, render, sink);
        Self::start(config, systems)
    }

    fn start(config: EngineConfig, mut systems: Systems) -> Result<Self> {
        systems.init()?;
        tracing::info!("engine started");
        Ok(Self {
            config,
            scenes: SlotMap::with_key(),
            inputs: SecondaryMap::new(),
            systems,
            clock: FrameClock::default(),
            running: true,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn systems(&self) -> &Systems {
        &self.systems
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Creates a scene along with its audio, physics and graphics scenes.
    pub fn create_scene(&mut self, name: impl Into<String>) -> SceneId {
        let name = name.into();
        let id = self
            .scenes
            .insert_with_key(|id| UScene::new(id, name.as_str()));
        self.systems.audio.create_system_scene(id);
        self.systems.physics.create_system_scene(id);
        self.systems.graphics.create_system_scene(id);
        self.inputs.insert(id, InputController::new());
        tracing::info!(?id, name = name.as_str(), "scene created");
        id
    }

    pub fn scene(&self, id: SceneId) -> Option<&UScene> {
        self.scenes.get(id)
    }

    pub fn scene_ids(&self) -> impl Iterator<Item = SceneId> + '_ {
        self.scenes.keys()
    }

    pub fn input(&self, id: SceneId) -> Option<&InputController> {
        self.inputs.get(id)
    }

    /// Borrows a scene together with the context its mutations publish into.
    pub fn split_mut(&mut self, id: SceneId) -> Result<(&mut UScene, &mut Systems)> {
        let scene = self
            .scenes
            .get_mut(id)
            .ok_or(EngineError::UnknownScene(id))?;
        Ok((scene, &mut self.systems))
    }

    /// Removes every object through the normal lifecycle, then the system
    /// scenes bound to the scene.
    pub fn remove_scene(&mut self, id: SceneId) -> Result<()> {
        let mut scene = self
            .scenes
            .remove(id)
            .ok_or(EngineError::UnknownScene(id))?;
        for root in scene.roots().to_vec() {
            scene.remove_object(&mut self.systems, root)?;
        }
        self.systems.remove_scene(&mut scene);
        self.inputs.remove(id);
        tracing::info!(?id, "scene removed");
        Ok(())
    }

    pub fn handle_input(&mut self, id: SceneId, event: PointerEvent) -> Result<Option<RaycastHit>> {
        let scene = self
            .scenes
            .get_mut(id)
            .ok_or(EngineError::UnknownScene(id))?;
        let input = self
            .inputs
            .get_mut(id)
            .ok_or(EngineError::UnknownScene(id))?;
        input.handle(scene, &mut self.systems, event)
    }

    /// Runs one frame: clamps `dt`, integrates object velocities and then
    /// executes physics, audio and graphics in that order.
    pub fn tick(&mut self, dt: f32) -> Result<()> {
        if !self.running {
            return Err(EngineError::msg("engine has been shut down"));
        }
        let dt = self.clock.advance(dt, self.config.max_frame_delta);

        if dt > 0.0 {
            for scene in self.scenes.values_mut() {
                let moving: Vec<(ObjectId, Vec3)> = scene
                    .objects()
                    .filter(|object| object.velocity() != Vec3::ZERO)
                    .map(|object| (object.id(), object.velocity()))
                    .collect();
                for (id, velocity) in moving {
                    scene.translate(&mut self.systems, id, velocity * dt)?;
                }
            }
        }

        self.systems.execute(dt)?;
        tracing::trace!(frame = self.clock.frame, dt, "frame complete");
        Ok(())
    }

    /// Detaches every shadow from the live scenes and deinitialises every
    /// subsystem. Later calls are no-ops.
    pub fn shutdown(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        for scene in self.scenes.values_mut() {
            self.systems.remove_scene(scene);
        }
        self.systems.deinit();
        tracing::info!(frames = self.clock.frame, "engine shut down");
    }
}
