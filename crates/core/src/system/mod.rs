//! Ownership ladder shared by every subsystem.
//!
//! A [`SystemInterface`] owns one [`SystemSceneInterface`] per [`UScene`] it
//! has been asked about, and each system scene owns the
//! [`SystemObjectInterface`] shadows it created for that scene's objects.
//! Shadows refer back to their `UObject` by id only and stay in sync through
//! the scene's event bus.

use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};

use crate::{
    audio::{AudioSink, AudioSystem},
    config::EngineConfig,
    event::ObserverToken,
    graphics::{GraphicsSystem, RenderBackend},
    physics::PhysicsSystem,
    scene::{ObjectId, SceneId, UScene},
    service::ServiceManager,
    Result,
};

new_key_type! {
    /// Identity of a shadow object inside one system scene.
    pub struct ShadowKey;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemKind {
    Audio,
    Graphics,
    Physics,
}

impl SystemKind {
    pub const COUNT: usize = 3;
    pub const ALL: [SystemKind; Self::COUNT] =
        [SystemKind::Audio, SystemKind::Graphics, SystemKind::Physics];

    pub const fn index(self) -> usize {
        match self {
            SystemKind::Audio => 0,
            SystemKind::Graphics => 1,
            SystemKind::Physics => 2,
        }
    }
}

/// Back-references and subscriptions every shadow object carries.
#[derive(Debug, Clone)]
pub struct ShadowBase {
    uobject: ObjectId,
    uscene: SceneId,
    tokens: Vec<ObserverToken>,
}

impl ShadowBase {
    pub fn new(uobject: ObjectId, uscene: SceneId) -> Self {
        Self {
            uobject,
            uscene,
            tokens: Vec::new(),
        }
    }

    pub(crate) fn set_tokens(&mut self, tokens: Vec<ObserverToken>) {
        self.tokens = tokens;
    }
}

/// A subsystem's private representation of one `UObject`.
pub trait SystemObjectInterface {
    fn base(&self) -> &ShadowBase;

    /// The `UObject` this shadow mirrors.
    fn uobject(&self) -> ObjectId {
        self.base().uobject
    }

    fn uscene(&self) -> SceneId {
        self.base().uscene
    }

    /// Observer registrations to drop when the shadow is destroyed.
    fn tokens(&self) -> &[ObserverToken] {
        &self.base().tokens
    }
}

/// All shadows of one subsystem within one [`UScene`].
pub trait SystemSceneInterface {
    const KIND: SystemKind;
    type Object: SystemObjectInterface;

    fn uscene(&self) -> SceneId;

    fn objects(&self) -> &SlotMap<ShadowKey, Self::Object>;

    fn objects_mut(&mut self) -> &mut SlotMap<ShadowKey, Self::Object>;

    /// Creates the shadow for `owner` and subscribes it to the owner's
    /// events. Attaching twice returns the existing shadow.
    fn add_system_object(&mut self, uscene: &mut UScene, owner: ObjectId) -> Result<ShadowKey>;

    /// Called after a shadow has been unsubscribed and taken out of the scene.
    fn system_object_removed(&mut self, _key: ShadowKey, _object: Self::Object) {}

    /// Unsubscribes and destroys the shadow of `owner`. Owners without a
    /// shadow here are ignored.
    fn delete_system_object(&mut self, uscene: &mut UScene, owner: ObjectId) -> bool {
        if uscene.id() != self.uscene() {
            return false;
        }

        let key = uscene
            .object(owner)
            .and_then(|object| object.shadow(Self::KIND))
            .filter(|key| self.owns(*key, owner))
            .or_else(|| self.find_system_object(owner).map(|(key, _)| key));
        let Some(key) = key else {
            uscene.detach_shadow(owner, Self::KIND);
            return false;
        };
        let Some(object) = self.objects_mut().remove(key) else {
            uscene.detach_shadow(owner, Self::KIND);
            return false;
        };

        for token in object.tokens() {
            uscene.bus_mut().unregister(*token);
        }
        uscene.detach_shadow(owner, Self::KIND);
        tracing::debug!(kind = ?Self::KIND, scene = ?uscene.id(), ?owner, "shadow deleted");

        self.system_object_removed(key, object);
        true
    }

    fn system_object(&self, key: ShadowKey) -> Option<&Self::Object> {
        self.objects().get(key)
    }

    /// Whether `key` is a live shadow of `owner` in this scene.
    fn owns(&self, key: ShadowKey, owner: ObjectId) -> bool {
        self.objects()
            .get(key)
            .is_some_and(|object| object.uobject() == owner)
    }

    /// Shadow behind `key`, provided it still mirrors `owner`. Observer
    /// callbacks resolve through this so a reused key never reaches another
    /// object's state.
    fn shadow_mut(&mut self, key: ShadowKey, owner: ObjectId) -> Option<&mut Self::Object> {
        self.objects_mut()
            .get_mut(key)
            .filter(|object| object.uobject() == owner)
    }

    /// Live shadow key `uscene` records for `owner`, if any. A recorded key
    /// that no longer resolves here is cleared from the `UObject`.
    fn existing_shadow(&self, uscene: &mut UScene, owner: ObjectId) -> Option<ShadowKey> {
        let recorded = uscene.object(owner)?.shadow(Self::KIND)?;
        if self.owns(recorded, owner) {
            return Some(recorded);
        }
        tracing::warn!(kind = ?Self::KIND, ?owner, ?recorded, "dropping stale shadow key");
        uscene.detach_shadow(owner, Self::KIND);
        None
    }

    /// Looks a shadow up by its owning `UObject`.
    fn find_system_object(&self, owner: ObjectId) -> Option<(ShadowKey, &Self::Object)> {
        self.objects()
            .iter()
            .find(|(_, object)| object.uobject() == owner)
    }

    fn len(&self) -> usize {
        self.objects().len()
    }

    fn is_empty(&self) -> bool {
        self.objects().is_empty()
    }
}

/// Entry point of one subsystem across every [`UScene`].
pub trait SystemInterface {
    const KIND: SystemKind;
    type Scene: SystemSceneInterface;

    fn init(&mut self) -> Result<()>;

    /// Releases every scene.
    fn deinit(&mut self);

    /// Advances all scenes by one frame.
    fn execute(&mut self, dt: f32) -> Result<()>;

    fn scenes(&self) -> &[Self::Scene];

    fn scenes_mut(&mut self) -> &mut Vec<Self::Scene>;

    fn new_scene(&self, uscene: SceneId) -> Self::Scene;

    /// Returns the scene for `uscene`, creating it on first use.
    fn create_system_scene(&mut self, uscene: SceneId) -> &mut Self::Scene {
        let index = match self.scenes().iter().position(|scene| scene.uscene() == uscene) {
            Some(index) => index,
            None => {
                let scene = self.new_scene(uscene);
                self.scenes_mut().push(scene);
                tracing::debug!(kind = ?Self::KIND, ?uscene, "system scene created");
                self.scenes().len() - 1
            }
        };
        &mut self.scenes_mut()[index]
    }

    fn find_system_scene(&self, uscene: SceneId) -> Option<&Self::Scene> {
        self.scenes().iter().find(|scene| scene.uscene() == uscene)
    }

    fn find_system_scene_mut(&mut self, uscene: SceneId) -> Option<&mut Self::Scene> {
        self.scenes_mut()
            .iter_mut()
            .find(|scene| scene.uscene() == uscene)
    }

    /// Called with a scene after every shadow in it has been deleted and it
    /// has been taken out of the system.
    fn system_scene_removed(&mut self, _scene: &mut Self::Scene) {}

    /// Deletes every shadow of the scene bound to `uscene` through
    /// [`SystemSceneInterface::delete_system_object`], then drops the scene.
    fn remove_system_scene(&mut self, uscene: &mut UScene) -> Option<Self::Scene> {
        let index = self
            .scenes()
            .iter()
            .position(|scene| scene.uscene() == uscene.id())?;
        let mut scene = self.scenes_mut().remove(index);

        let owners: Vec<ObjectId> = scene
            .objects()
            .values()
            .map(SystemObjectInterface::uobject)
            .collect();
        for owner in owners {
            scene.delete_system_object(uscene, owner);
        }

        self.system_scene_removed(&mut scene);
        tracing::debug!(kind = ?Self::KIND, uscene = ?uscene.id(), "system scene removed");
        Some(scene)
    }
}

/// Registers a new shadow's observers through `register` and records the
/// shadow on its `UObject`. If any step fails, every token registered so far
/// is unregistered before the error is returned.
pub(crate) fn subscribe_shadow<F>(
    uscene: &mut UScene,
    owner: ObjectId,
    kind: SystemKind,
    key: ShadowKey,
    register: F,
) -> Result<Vec<ObserverToken>>
where
    F: FnOnce(&mut UScene, &mut Vec<ObserverToken>) -> Result<()>,
{
    let mut tokens = Vec::new();
    let outcome = register(uscene, &mut tokens).and_then(|()| uscene.attach_shadow(owner, kind, key));
    match outcome {
        Ok(()) => Ok(tokens),
        Err(err) => {
            for token in tokens {
                uscene.unobserve(token);
            }
            Err(err)
        }
    }
}

/// Explicit context holding one instance of every subsystem. It is the
/// dispatch context of every scene's event bus.
#[derive(Debug)]
pub struct Systems {
    pub audio: AudioSystem,
    pub physics: PhysicsSystem,
    pub graphics: GraphicsSystem,
}

impl Default for Systems {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl Systems {
    /// Builds every subsystem with the headless collaborators.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            audio: AudioSystem::new(config.audio.clone()),
            physics: PhysicsSystem::new(config.physics.clone()),
            graphics: GraphicsSystem::new(config.graphics.clone()),
        }
    }

    pub fn with_backends(
        config: &EngineConfig,
        render: Box<dyn RenderBackend>,
        sink: Box<dyn AudioSink>,
    ) -> Self {
        Self {
            audio: AudioSystem::with_sink(config.audio.clone(), sink),
            physics: PhysicsSystem::new(config.physics.clone()),
            graphics: GraphicsSystem::with_backend(config.graphics.clone(), render),
        }
    }

    pub fn init(&mut self) -> Result<()> {
        self.physics.init()?;
        self.audio.init()?;
        self.graphics.init()
    }

    /// Shadows still attached when this runs leave their keys on the
    /// `UObject`s; call [`Systems::remove_scene`] for every live scene first.
    pub fn deinit(&mut self) {
        self.graphics.deinit();
        self.audio.deinit();
        self.physics.deinit();
    }

    /// Runs one frame: physics, then audio, then graphics submission.
    pub fn execute(&mut self, dt: f32) -> Result<()> {
        self.physics.execute(dt)?;
        self.audio.execute(dt)?;
        self.graphics.execute(dt)
    }

    /// Destroys the shadow `owner` has in subsystem `kind`, if any.
    pub fn detach(&mut self, kind: SystemKind, uscene: &mut UScene, owner: ObjectId) -> bool {
        let id = uscene.id();
        match kind {
            SystemKind::Audio => self
                .audio
                .find_system_scene_mut(id)
                .is_some_and(|scene| scene.delete_system_object(uscene, owner)),
            SystemKind::Graphics => self
                .graphics
                .find_system_scene_mut(id)
                .is_some_and(|scene| scene.delete_system_object(uscene, owner)),
            SystemKind::Physics => self
                .physics
                .find_system_scene_mut(id)
                .is_some_and(|scene| scene.delete_system_object(uscene, owner)),
        }
    }

    pub fn detach_all(&mut self, uscene: &mut UScene, owner: ObjectId) {
        for kind in SystemKind::ALL {
            self.detach(kind, uscene, owner);
        }
    }

    /// Deletes every shadow of `uscene` and drops the system scenes bound
    /// to it. The `UScene` itself and its objects are left intact.
    pub fn remove_scene(&mut self, uscene: &mut UScene) {
        self.audio.remove_system_scene(uscene);
        self.physics.remove_system_scene(uscene);
        self.graphics.remove_system_scene(uscene);
    }

    /// Cross-subsystem request router over this context.
    pub fn services(&self) -> ServiceManager<'_> {
        ServiceManager::new().with_raycaster(&self.physics)
    }
}
