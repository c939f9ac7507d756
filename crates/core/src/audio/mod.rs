//! Audio subsystem: shadows that track world position/velocity and the
//! doppler scalars of the links between them.
//!
//! Mixing itself happens outside the core. Each frame the system hands an
//! [`AudioFrame`] snapshot to an [`AudioSink`] and never hears back.

mod object;

pub use object::{AudioLink, AudioObject};

use glam::Vec3;
use slotmap::SlotMap;

use crate::{
    config::AudioConfig,
    event::EventType,
    scene::{ObjectId, SceneId, UScene},
    system::{
        subscribe_shadow, ShadowBase, ShadowKey, SystemInterface, SystemKind,
        SystemObjectInterface, SystemSceneInterface, Systems,
    },
    EngineError, Result,
};

/// Relative radial velocity from `own` towards `other`, as stored on an
/// outgoing link: `dot(normalize(other.p - own.p), own.v - other.v)`.
/// Positive when the two ends are closing in on each other.
pub fn doppler_outgoing(own: (Vec3, Vec3), other: (Vec3, Vec3)) -> f32 {
    let direction = (other.0 - own.0).normalize_or_zero();
    direction.dot(own.1 - other.1)
}

/// Mirror of [`doppler_outgoing`] seen from the receiving end:
/// `dot(normalize(own.p - other.p), other.v - own.v)`.
pub fn doppler_incoming(own: (Vec3, Vec3), other: (Vec3, Vec3)) -> f32 {
    let direction = (own.0 - other.0).normalize_or_zero();
    direction.dot(other.1 - own.1)
}

/// Per-source state handed to the mixer.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSource {
    pub owner: ObjectId,
    pub position: Vec3,
    pub velocity: Vec3,
    pub forward: Vec3,
}

/// A link as seen by the mixer, with its doppler input.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioRoute {
    pub source: ObjectId,
    pub dest: ObjectId,
    pub doppler: f32,
}

/// Snapshot of one audio scene for a single frame.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    pub uscene: SceneId,
    pub dt: f32,
    pub sources: Vec<AudioSource>,
    pub routes: Vec<AudioRoute>,
}

/// Mixing backend collaborator. Submission is one-way.
pub trait AudioSink: std::fmt::Debug {
    fn init(&mut self, _config: &AudioConfig) -> Result<()> {
        Ok(())
    }

    fn mix(&mut self, frame: &AudioFrame);
}

/// Sink that discards every frame.
#[derive(Debug, Default)]
pub struct SilentSink {
    frames: u64,
}

impl AudioSink for SilentSink {
    fn mix(&mut self, frame: &AudioFrame) {
        self.frames += 1;
        tracing::trace!(
            scene = ?frame.uscene,
            sources = frame.sources.len(),
            routes = frame.routes.len(),
            frames = self.frames,
            "discarding audio frame"
        );
    }
}

/// Audio shadows of one [`UScene`].
#[derive(Debug)]
pub struct AudioScene {
    uscene: SceneId,
    objects: SlotMap<ShadowKey, AudioObject>,
}

impl AudioScene {
    pub fn new(uscene: SceneId) -> Self {
        Self {
            uscene,
            objects: SlotMap::with_key(),
        }
    }

    /// Audio shadow of `owner`, resolved through the `UScene`.
    pub fn object_for(&self, uscene: &UScene, owner: ObjectId) -> Option<&AudioObject> {
        let key = uscene.object(owner)?.shadow(SystemKind::Audio)?;
        self.objects.get(key)
    }

    /// Routes the output of `source` into the input of `dest`. Linking an
    /// already linked pair does nothing.
    pub fn connect(&mut self, uscene: &UScene, source: ObjectId, dest: ObjectId) -> Result<()> {
        let source_key = self.shadow_key(uscene, source)?;
        let dest_key = self.shadow_key(uscene, dest)?;
        if source_key == dest_key {
            return Err(EngineError::msg("an audio object cannot be linked to itself"));
        }

        let already_linked = self
            .objects
            .get(source_key)
            .is_some_and(|object| object.outputs.iter().any(|link| link.peer == dest_key));
        if already_linked {
            return Ok(());
        }

        if let Some(object) = self.objects.get_mut(source_key) {
            object.outputs.push(AudioLink::new(dest_key));
        }
        if let Some(object) = self.objects.get_mut(dest_key) {
            object.inputs.push(AudioLink::new(source_key));
        }
        self.refresh_link(source_key, dest_key);

        tracing::debug!(scene = ?self.uscene, ?source, ?dest, "audio link created");
        Ok(())
    }

    /// Removes the link from `source` to `dest`. Returns whether one existed.
    pub fn disconnect(&mut self, uscene: &UScene, source: ObjectId, dest: ObjectId) -> bool {
        let (Ok(source_key), Ok(dest_key)) =
            (self.shadow_key(uscene, source), self.shadow_key(uscene, dest))
        else {
            return false;
        };

        let mut removed = false;
        if let Some(object) = self.objects.get_mut(source_key) {
            let before = object.outputs.len();
            object.outputs.retain(|link| link.peer != dest_key);
            removed = object.outputs.len() != before;
        }
        if let Some(object) = self.objects.get_mut(dest_key) {
            object.inputs.retain(|link| link.peer != source_key);
        }
        removed
    }

    /// Doppler scalar on `source`'s output link towards `dest`.
    pub fn output_doppler(&self, uscene: &UScene, source: ObjectId, dest: ObjectId) -> Option<f32> {
        let dest_key = uscene.object(dest)?.shadow(SystemKind::Audio)?;
        self.object_for(uscene, source)?
            .outputs()
            .iter()
            .find(|link| link.peer == dest_key)
            .map(|link| link.doppler)
    }

    /// Doppler scalar on `dest`'s input link from `source`.
    pub fn input_doppler(&self, uscene: &UScene, dest: ObjectId, source: ObjectId) -> Option<f32> {
        let source_key = uscene.object(source)?.shadow(SystemKind::Audio)?;
        self.object_for(uscene, dest)?
            .inputs()
            .iter()
            .find(|link| link.peer == source_key)
            .map(|link| link.doppler)
    }

    /// Builds the mixer snapshot for this frame.
    pub fn frame(&self, dt: f32) -> AudioFrame {
        let sources = self
            .objects
            .values()
            .map(|object| AudioSource {
                owner: object.uobject(),
                position: object.position(),
                velocity: object.velocity(),
                forward: object.forward(),
            })
            .collect();

        let routes = self
            .objects
            .values()
            .flat_map(|object| {
                object.outputs.iter().filter_map(|link| {
                    let dest = self.objects.get(link.peer)?;
                    Some(AudioRoute {
                        source: object.uobject(),
                        dest: dest.uobject(),
                        doppler: link.doppler,
                    })
                })
            })
            .collect();

        AudioFrame {
            uscene: self.uscene,
            dt,
            sources,
            routes,
        }
    }

    fn shadow_key(&self, uscene: &UScene, owner: ObjectId) -> Result<ShadowKey> {
        let object = uscene
            .object(owner)
            .ok_or(EngineError::UnknownObject(owner))?;
        object
            .shadow(SystemKind::Audio)
            .filter(|key| self.objects.contains_key(*key))
            .ok_or(EngineError::NotAttached {
                object: owner,
                kind: SystemKind::Audio,
            })
    }

    fn position_updated(&mut self, key: ShadowKey, owner: ObjectId, position: Vec3) {
        if let Some(object) = self.shadow_mut(key, owner) {
            object.position = position;
            self.refresh_links(key);
        }
    }

    fn rotation_updated(&mut self, key: ShadowKey, owner: ObjectId, rotation: Vec3) {
        if let Some(object) = self.shadow_mut(key, owner) {
            object.rotation = rotation;
        }
    }

    fn velocity_updated(&mut self, key: ShadowKey, owner: ObjectId, velocity: Vec3) {
        if let Some(object) = self.shadow_mut(key, owner) {
            object.velocity = velocity;
            self.refresh_links(key);
        }
    }

    /// Recomputes both ends of every link touching `key`.
    fn refresh_links(&mut self, key: ShadowKey) {
        let Some(object) = self.objects.get(key) else {
            return;
        };
        let outputs: Vec<ShadowKey> = object.outputs.iter().map(|link| link.peer).collect();
        let inputs: Vec<ShadowKey> = object.inputs.iter().map(|link| link.peer).collect();

        for dest in outputs {
            self.refresh_link(key, dest);
        }
        for source in inputs {
            self.refresh_link(source, key);
        }
    }

    fn refresh_link(&mut self, source: ShadowKey, dest: ShadowKey) {
        let (Some(from), Some(to)) = (self.objects.get(source), self.objects.get(dest)) else {
            return;
        };
        let from_state = (from.position, from.velocity);
        let to_state = (to.position, to.velocity);

        let outgoing = doppler_outgoing(from_state, to_state);
        let incoming = doppler_incoming(to_state, from_state);

        if let Some(link) = self
            .objects
            .get_mut(source)
            .and_then(|object| object.outputs.iter_mut().find(|link| link.peer == dest))
        {
            link.doppler = outgoing;
        }
        if let Some(link) = self
            .objects
            .get_mut(dest)
            .and_then(|object| object.inputs.iter_mut().find(|link| link.peer == source))
        {
            link.doppler = incoming;
        }
    }
}

impl SystemSceneInterface for AudioScene {
    const KIND: SystemKind = SystemKind::Audio;
    type Object = AudioObject;

    fn uscene(&self) -> SceneId {
        self.uscene
    }

    fn objects(&self) -> &SlotMap<ShadowKey, AudioObject> {
        &self.objects
    }

    fn objects_mut(&mut self) -> &mut SlotMap<ShadowKey, AudioObject> {
        &mut self.objects
    }

    fn add_system_object(&mut self, uscene: &mut UScene, owner: ObjectId) -> Result<ShadowKey> {
        if uscene.id() != self.uscene {
            return Err(EngineError::SceneMismatch {
                expected: self.uscene,
                found: uscene.id(),
            });
        }
        if !uscene.contains(owner) {
            return Err(EngineError::UnknownObject(owner));
        }
        if let Some(existing) = self.existing_shadow(uscene, owner) {
            return Ok(existing);
        }

        let object = uscene
            .object(owner)
            .ok_or(EngineError::UnknownObject(owner))?;
        let world = *object.world();
        let velocity = object.world_velocity();
        let base = ShadowBase::new(owner, self.uscene);
        let key = self
            .objects
            .insert(AudioObject::new(base, world.position, world.rotation, velocity));

        let sid = self.uscene;
        let subscribed = subscribe_shadow(uscene, owner, SystemKind::Audio, key, |uscene, tokens| {
            tokens.push(uscene.observe_vec3(owner, EventType::PositionUpdated, move |systems: &mut Systems, position| {
                if let Some(scene) = systems.audio.find_system_scene_mut(sid) {
                    scene.position_updated(key, owner, position);
                }
            })?);
            tokens.push(uscene.observe_vec3(owner, EventType::RotationUpdated, move |systems: &mut Systems, rotation| {
                if let Some(scene) = systems.audio.find_system_scene_mut(sid) {
                    scene.rotation_updated(key, owner, rotation);
                }
            })?);
            tokens.push(uscene.observe_vec3(owner, EventType::VelocityUpdated, move |systems: &mut Systems, velocity| {
                if let Some(scene) = systems.audio.find_system_scene_mut(sid) {
                    scene.velocity_updated(key, owner, velocity);
                }
            })?);
            Ok(())
        });
        let tokens = match subscribed {
            Ok(tokens) => tokens,
            Err(err) => {
                self.objects.remove(key);
                return Err(err);
            }
        };
        if let Some(object) = self.objects.get_mut(key) {
            object.base.set_tokens(tokens);
        }

        tracing::debug!(scene = ?self.uscene, ?owner, "audio object attached");
        Ok(key)
    }

    fn system_object_removed(&mut self, key: ShadowKey, object: AudioObject) {
        for link in object.outputs {
            if let Some(peer) = self.objects.get_mut(link.peer) {
                peer.inputs.retain(|input| input.peer != key);
            }
        }
        for link in object.inputs {
            if let Some(peer) = self.objects.get_mut(link.peer) {
                peer.outputs.retain(|output| output.peer != key);
            }
        }
    }
}

/// Owns every [`AudioScene`] and the mixer collaborator.
#[derive(Debug)]
pub struct AudioSystem {
    config: AudioConfig,
    scenes: Vec<AudioScene>,
    sink: Box<dyn AudioSink>,
    frames_mixed: u64,
}

impl AudioSystem {
    pub fn new(config: AudioConfig) -> Self {
        Self::with_sink(config, Box::new(SilentSink::default()))
    }

    pub fn with_sink(config: AudioConfig, sink: Box<dyn AudioSink>) -> Self {
        Self {
            config,
            scenes: Vec::new(),
            sink,
            frames_mixed: 0,
        }
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    /// Number of frames handed to the sink so far.
    pub fn frames_mixed(&self) -> u64 {
        self.frames_mixed
    }
}

impl SystemInterface for AudioSystem {
    const KIND: SystemKind = SystemKind::Audio;
    type Scene = AudioScene;

    fn init(&mut self) -> Result<()> {
        self.config.validate()?;
        self.sink.init(&self.config)?;
        tracing::info!(
            sample_rate = self.config.sample_rate,
            block_size = self.config.block_size,
            "audio system initialised"
        );
        Ok(())
    }

    fn deinit(&mut self) {
        self.scenes.clear();
    }

    fn execute(&mut self, dt: f32) -> Result<()> {
        for scene in &self.scenes {
            self.sink.mix(&scene.frame(dt));
            self.frames_mixed += 1;
        }
        Ok(())
    }

    fn scenes(&self) -> &[AudioScene] {
        &self.scenes
    }

    fn scenes_mut(&mut self) -> &mut Vec<AudioScene> {
        &mut self.scenes
    }

    fn new_scene(&self, uscene: SceneId) -> AudioScene {
        AudioScene::new(uscene)
    }
}
