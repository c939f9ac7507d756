//! Graphics subsystem: mesh, camera and UI shadows plus the per-frame
//! handoff to a [`RenderBackend`].
//!
//! Model handles are never allocated or released inside the event path.
//! Shadows queue the work and [`GraphicsSystem::execute`] flushes it against
//! the backend before building the frame.

mod object;

pub use object::{CameraShadow, GraphicsKind, GraphicsObject, MeshShadow, ModelHandle, UiShadow};

use std::collections::HashSet;

use glam::{Mat4, Vec3};
use slotmap::SlotMap;

use crate::{
    config::GraphicsConfig,
    event::EventType,
    scene::{ObjectId, SceneId, Transform, UScene},
    system::{
        subscribe_shadow, ShadowBase, ShadowKey, SystemInterface, SystemKind,
        SystemObjectInterface, SystemSceneInterface, Systems,
    },
    EngineError, Result,
};

const CAMERA_NEAR: f32 = 0.1;
const CAMERA_FAR: f32 = 100.0;

#[derive(Debug, Clone, PartialEq)]
pub struct CameraView {
    pub owner: ObjectId,
    pub position: Vec3,
    pub forward: Vec3,
    pub fov_y_radians: f32,
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshDraw {
    pub owner: ObjectId,
    pub model: ModelHandle,
    pub mesh: String,
    pub material: Option<String>,
    pub transform: Mat4,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UiDraw {
    pub owner: ObjectId,
    pub draw_order: i32,
    pub transform: Mat4,
}

/// Everything the backend needs to draw one scene for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderFrame {
    pub uscene: SceneId,
    pub camera: Option<CameraView>,
    /// Sorted by material, then mesh; objects without a material come last.
    pub meshes: Vec<MeshDraw>,
    /// Back to front.
    pub ui: Vec<UiDraw>,
}

/// Rendering backend collaborator.
pub trait RenderBackend: std::fmt::Debug {
    fn init(&mut self, _config: &GraphicsConfig) -> Result<()> {
        Ok(())
    }

    fn create_model(&mut self, mesh: &str, material: Option<&str>) -> Result<ModelHandle>;

    fn release_model(&mut self, model: ModelHandle);

    /// One-way submission; the backend synchronises with the device itself.
    fn submit(&mut self, frame: &RenderFrame);

    fn deinit(&mut self) {}
}

/// Backend that only tracks model handles. Used when no device is present.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    next_model: u64,
    live: HashSet<ModelHandle>,
    frames: u64,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_models(&self) -> usize {
        self.live.len()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl RenderBackend for HeadlessRenderer {
    fn create_model(&mut self, mesh: &str, material: Option<&str>) -> Result<ModelHandle> {
        self.next_model += 1;
        let model = ModelHandle(self.next_model);
        self.live.insert(model);
        tracing::trace!(mesh, material, ?model, "headless model created");
        Ok(model)
    }

    fn release_model(&mut self, model: ModelHandle) {
        if !self.live.remove(&model) {
            tracing::warn!(?model, "released unknown model");
        }
    }

    fn submit(&mut self, frame: &RenderFrame) {
        self.frames += 1;
        tracing::trace!(
            scene = ?frame.uscene,
            meshes = frame.meshes.len(),
            ui = frame.ui.len(),
            "headless frame"
        );
    }

    fn deinit(&mut self) {
        self.live.clear();
    }
}

/// Graphics shadows of one [`UScene`].
#[derive(Debug)]
pub struct GraphicsScene {
    uscene: SceneId,
    objects: SlotMap<ShadowKey, GraphicsObject>,
    ui_order: Vec<ShadowKey>,
    active_camera: Option<ShadowKey>,
    pending_release: Vec<ModelHandle>,
    fov_y_radians: f32,
    aspect_ratio: f32,
}

impl GraphicsScene {
    pub fn new(uscene: SceneId, config: &GraphicsConfig) -> Self {
        Self {
            uscene,
            objects: SlotMap::with_key(),
            ui_order: Vec::new(),
            active_camera: None,
            pending_release: Vec::new(),
            fov_y_radians: config.field_of_view_degrees.to_radians(),
            aspect_ratio: config.aspect_ratio(),
        }
    }

    pub fn object_for(&self, uscene: &UScene, owner: ObjectId) -> Option<&GraphicsObject> {
        let key = uscene.object(owner)?.shadow(SystemKind::Graphics)?;
        self.objects.get(key)
    }

    /// Turns the shadow of `owner` into a mesh, attaching it first if needed.
    /// A different mesh or material releases the previous model.
    pub fn set_mesh(
        &mut self,
        uscene: &mut UScene,
        owner: ObjectId,
        mesh: impl Into<String>,
        material: Option<String>,
    ) -> Result<ShadowKey> {
        let key = self.add_system_object(uscene, owner)?;
        let mesh = mesh.into();

        let unchanged = matches!(
            self.objects.get(key).map(GraphicsObject::kind),
            Some(GraphicsKind::Mesh(current))
                if current.mesh.as_deref() == Some(mesh.as_str()) && current.material == material
        );
        if !unchanged {
            self.set_kind(
                key,
                GraphicsKind::Mesh(MeshShadow {
                    mesh: Some(mesh),
                    material,
                    model: None,
                }),
            );
        }
        Ok(key)
    }

    /// Turns the shadow of `owner` into a camera. The first camera of the
    /// scene becomes the active one.
    pub fn add_camera(&mut self, uscene: &mut UScene, owner: ObjectId) -> Result<ShadowKey> {
        let key = self.add_system_object(uscene, owner)?;
        let camera = CameraShadow {
            fov_y_radians: self.fov_y_radians,
            near: CAMERA_NEAR,
            far: CAMERA_FAR,
        };
        if !self.objects.get(key).is_some_and(|object| object.kind.is_camera()) {
            self.set_kind(key, GraphicsKind::Camera(camera));
        }
        Ok(key)
    }

    pub fn set_active_camera(&mut self, uscene: &UScene, owner: ObjectId) -> Result<()> {
        let key = uscene
            .object(owner)
            .and_then(|object| object.shadow(SystemKind::Graphics))
            .filter(|key| self.objects.get(*key).is_some_and(|object| object.kind.is_camera()))
            .ok_or(EngineError::NotAttached {
                object: owner,
                kind: SystemKind::Graphics,
            })?;
        self.active_camera = Some(key);
        Ok(())
    }

    pub fn active_camera(&self) -> Option<ObjectId> {
        self.active_camera
            .and_then(|key| self.objects.get(key))
            .map(SystemObjectInterface::uobject)
    }

    /// Turns the shadow of `owner` into a UI element, using the owner's
    /// current draw order.
    pub fn add_ui(&mut self, uscene: &mut UScene, owner: ObjectId) -> Result<ShadowKey> {
        let key = self.add_system_object(uscene, owner)?;
        let draw_order = uscene
            .object(owner)
            .map(|object| object.draw_order())
            .unwrap_or_default();
        if !self.objects.get(key).is_some_and(|object| object.kind.is_ui()) {
            self.set_kind(key, GraphicsKind::Ui(UiShadow { draw_order }));
        }
        Ok(key)
    }

    /// Owners of the UI shadows, back to front.
    pub fn ui_draw_list(&self) -> Vec<ObjectId> {
        self.ui_order
            .iter()
            .filter_map(|key| self.objects.get(*key))
            .map(SystemObjectInterface::uobject)
            .collect()
    }

    /// Builds the draw data for this frame. Meshes whose model has not been
    /// allocated yet are skipped.
    pub fn frame(&self) -> RenderFrame {
        let camera = self
            .active_camera
            .and_then(|key| self.objects.get(key))
            .and_then(|object| match object.kind {
                GraphicsKind::Camera(camera) => Some(CameraView {
                    owner: object.uobject(),
                    position: object.transform.position,
                    forward: object.transform.forward(),
                    fov_y_radians: camera.fov_y_radians,
                    aspect_ratio: self.aspect_ratio,
                    near: camera.near,
                    far: camera.far,
                }),
                _ => None,
            });

        let mut meshes: Vec<MeshDraw> = self
            .objects
            .values()
            .filter_map(|object| match &object.kind {
                GraphicsKind::Mesh(MeshShadow {
                    mesh: Some(mesh),
                    material,
                    model: Some(model),
                }) => Some(MeshDraw {
                    owner: object.uobject(),
                    model: *model,
                    mesh: mesh.clone(),
                    material: material.clone(),
                    transform: object.transform.matrix(),
                    selected: object.selected,
                }),
                _ => None,
            })
            .collect();
        meshes.sort_by(|a, b| {
            (a.material.is_none(), &a.material, &a.mesh).cmp(&(
                b.material.is_none(),
                &b.material,
                &b.mesh,
            ))
        });

        let ui = self
            .ui_order
            .iter()
            .filter_map(|key| self.objects.get(*key))
            .filter_map(|object| {
                Some(UiDraw {
                    owner: object.uobject(),
                    draw_order: object.draw_order()?,
                    transform: object.transform.matrix(),
                })
            })
            .collect();

        RenderFrame {
            uscene: self.uscene,
            camera,
            meshes,
            ui,
        }
    }

    /// Releases queued models and allocates models for meshes that lack one.
    fn flush(&mut self, backend: &mut dyn RenderBackend) {
        for model in self.pending_release.drain(..) {
            backend.release_model(model);
        }

        for object in self.objects.values_mut() {
            let GraphicsKind::Mesh(shadow) = &mut object.kind else {
                continue;
            };
            let (Some(mesh), None) = (&shadow.mesh, shadow.model) else {
                continue;
            };
            match backend.create_model(mesh, shadow.material.as_deref()) {
                Ok(model) => shadow.model = Some(model),
                Err(err) => {
                    tracing::warn!(mesh = mesh.as_str(), %err, "model allocation failed, retrying next frame")
                }
            }
        }
    }

    /// Releases every model this scene still holds.
    fn release_all(&mut self, backend: &mut dyn RenderBackend) {
        for object in self.objects.values_mut() {
            if let GraphicsKind::Mesh(shadow) = &mut object.kind {
                if let Some(model) = shadow.model.take() {
                    self.pending_release.push(model);
                }
            }
        }
        for model in self.pending_release.drain(..) {
            backend.release_model(model);
        }
    }

    fn set_kind(&mut self, key: ShadowKey, kind: GraphicsKind) {
        let Some(object) = self.objects.get_mut(key) else {
            return;
        };
        let previous = std::mem::replace(&mut object.kind, kind);
        let becomes_camera = object.kind.is_camera();
        let becomes_ui = object.kind.is_ui();

        match previous {
            GraphicsKind::Mesh(MeshShadow {
                model: Some(model), ..
            }) => self.pending_release.push(model),
            GraphicsKind::Ui(_) => self.ui_order.retain(|entry| *entry != key),
            _ => {}
        }

        if becomes_camera {
            if self.active_camera.is_none() {
                self.active_camera = Some(key);
            }
        } else if self.active_camera == Some(key) {
            self.active_camera = None;
        }

        if becomes_ui {
            self.ui_order.push(key);
            self.sort_ui();
        }
    }

    /// Stable sort by draw order; equal orders keep their relative position.
    fn sort_ui(&mut self) {
        let objects = &self.objects;
        self.ui_order.sort_by_key(|key| {
            objects
                .get(*key)
                .and_then(GraphicsObject::draw_order)
                .unwrap_or(i32::MAX)
        });
    }

    fn transform_updated(
        &mut self,
        key: ShadowKey,
        owner: ObjectId,
        update: impl FnOnce(&mut Transform),
    ) {
        if let Some(object) = self.shadow_mut(key, owner) {
            update(&mut object.transform);
        }
    }

    fn selection_updated(&mut self, key: ShadowKey, owner: ObjectId, selected: bool) {
        if let Some(object) = self.shadow_mut(key, owner) {
            object.selected = selected;
        }
    }

    fn draw_order_updated(&mut self, key: ShadowKey, owner: ObjectId, order: i32) {
        let Some(object) = self.shadow_mut(key, owner) else {
            return;
        };
        if let GraphicsKind::Ui(ui) = &mut object.kind {
            ui.draw_order = order;
            self.sort_ui();
        }
    }
}

impl SystemSceneInterface for GraphicsScene {
    const KIND: SystemKind = SystemKind::Graphics;
    type Object = GraphicsObject;

    fn uscene(&self) -> SceneId {
        self.uscene
    }

    fn objects(&self) -> &SlotMap<ShadowKey, GraphicsObject> {
        &self.objects
    }

    fn objects_mut(&mut self) -> &mut SlotMap<ShadowKey, GraphicsObject> {
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

        let (world, selected) = uscene
            .object(owner)
            .map(|object| (*object.world(), object.is_selected()))
            .ok_or(EngineError::UnknownObject(owner))?;
        let base = ShadowBase::new(owner, self.uscene);
        let key = self.objects.insert(GraphicsObject::new(base, world, selected));

        let sid = self.uscene;
        let subscribed = subscribe_shadow(uscene, owner, SystemKind::Graphics, key, |uscene, tokens| {
            tokens.push(uscene.observe_vec3(owner, EventType::PositionUpdated, move |systems: &mut Systems, position| {
                if let Some(scene) = systems.graphics.find_system_scene_mut(sid) {
                    scene.transform_updated(key, owner, |transform| transform.position = position);
                }
            })?);
            tokens.push(uscene.observe_vec3(owner, EventType::RotationUpdated, move |systems: &mut Systems, rotation| {
                if let Some(scene) = systems.graphics.find_system_scene_mut(sid) {
                    scene.transform_updated(key, owner, |transform| transform.rotation = rotation);
                }
            })?);
            tokens.push(uscene.observe_vec3(owner, EventType::ScaleUpdated, move |systems: &mut Systems, scale| {
                if let Some(scene) = systems.graphics.find_system_scene_mut(sid) {
                    scene.transform_updated(key, owner, |transform| transform.scale = scale);
                }
            })?);
            tokens.push(uscene.observe_flag(owner, EventType::SelectionUpdated, move |systems: &mut Systems, selected| {
                if let Some(scene) = systems.graphics.find_system_scene_mut(sid) {
                    scene.selection_updated(key, owner, selected);
                }
            })?);
            tokens.push(uscene.observe_integer(owner, EventType::UiDrawOrderUpdated, move |systems: &mut Systems, order| {
                if let Some(scene) = systems.graphics.find_system_scene_mut(sid) {
                    scene.draw_order_updated(key, owner, order);
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

        tracing::debug!(scene = ?self.uscene, ?owner, "graphics object attached");
        Ok(key)
    }

    fn system_object_removed(&mut self, key: ShadowKey, object: GraphicsObject) {
        if let GraphicsKind::Mesh(MeshShadow {
            model: Some(model), ..
        }) = object.kind
        {
            self.pending_release.push(model);
        }
        self.ui_order.retain(|entry| *entry != key);
        if self.active_camera == Some(key) {
            self.active_camera = None;
        }
    }
}

/// Owns every [`GraphicsScene`] and the render backend.
#[derive(Debug)]
pub struct GraphicsSystem {
    config: GraphicsConfig,
    scenes: Vec<GraphicsScene>,
    backend: Box<dyn RenderBackend>,
    frames_submitted: u64,
}

impl GraphicsSystem {
    pub fn new(config: GraphicsConfig) -> Self {
        Self::with_backend(config, Box::new(HeadlessRenderer::new()))
    }

    pub fn with_backend(config: GraphicsConfig, backend: Box<dyn RenderBackend>) -> Self {
        Self {
            config,
            scenes: Vec::new(),
            backend,
            frames_submitted: 0,
        }
    }

    pub fn config(&self) -> &GraphicsConfig {
        &self.config
    }

    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }
}

impl SystemInterface for GraphicsSystem {
    const KIND: SystemKind = SystemKind::Graphics;
    type Scene = GraphicsScene;

    fn init(&mut self) -> Result<()> {
        self.config.validate()?;
        self.backend.init(&self.config)?;
        tracing::info!(
            title = self.config.title.as_str(),
            width = self.config.width,
            height = self.config.height,
            "graphics system initialised"
        );
        Ok(())
    }

    fn deinit(&mut self) {
        for scene in &mut self.scenes {
            scene.release_all(self.backend.as_mut());
        }
        self.scenes.clear();
        self.backend.deinit();
    }

    fn execute(&mut self, _dt: f32) -> Result<()> {
        for scene in &mut self.scenes {
            scene.flush(self.backend.as_mut());
            let frame = scene.frame();
            self.backend.submit(&frame);
            self.frames_submitted += 1;
        }
        Ok(())
    }

    fn scenes(&self) -> &[GraphicsScene] {
        &self.scenes
    }

    fn scenes_mut(&mut self) -> &mut Vec<GraphicsScene> {
        &mut self.scenes
    }

    fn new_scene(&self, uscene: SceneId) -> GraphicsScene {
        GraphicsScene::new(uscene, &self.config)
    }

    fn system_scene_removed(&mut self, scene: &mut GraphicsScene) {
        scene.release_all(self.backend.as_mut());
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Create(String),
        Release(ModelHandle),
        Submit(RenderFrame),
    }

    #[derive(Debug, Default)]
    struct RecordingBackend {
        calls: Rc<RefCell<Vec<Call>>>,
        next: u64,
    }

    impl RenderBackend for RecordingBackend {
        fn create_model(&mut self, mesh: &str, _material: Option<&str>) -> Result<ModelHandle> {
            self.next += 1;
            self.calls.borrow_mut().push(Call::Create(mesh.to_string()));
            Ok(ModelHandle(self.next))
        }

        fn release_model(&mut self, model: ModelHandle) {
            self.calls.borrow_mut().push(Call::Release(model));
        }

        fn submit(&mut self, frame: &RenderFrame) {
            self.calls.borrow_mut().push(Call::Submit(frame.clone()));
        }
    }

    fn setup() -> (Systems, UScene, Rc<RefCell<Vec<Call>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let backend = RecordingBackend {
            calls: calls.clone(),
            next: 0,
        };
        let config = crate::EngineConfig::default();
        let mut systems = Systems::with_backends(
            &config,
            Box::new(backend),
            Box::new(crate::audio::SilentSink::default()),
        );
        let mut ids: SlotMap<SceneId, ()> = SlotMap::with_key();
        let uscene = UScene::new(ids.insert(()), "graphics");
        systems.graphics.create_system_scene(uscene.id());
        (systems, uscene, calls)
    }

    fn scene<'a>(systems: &'a mut Systems, uscene: &UScene) -> &'a mut GraphicsScene {
        systems.graphics.find_system_scene_mut(uscene.id()).unwrap()
    }

    fn releases(calls: &Rc<RefCell<Vec<Call>>>) -> Vec<ModelHandle> {
        calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                Call::Release(model) => Some(*model),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn ui_draw_order_is_stable() {
        let (mut systems, mut uscene, _) = setup();
        let mut owners = Vec::new();
        for (name, order) in [("a", 3), ("b", 1), ("c", 2), ("d", 1)] {
            let id = uscene.create_object(name, None).unwrap();
            uscene.set_draw_order(&mut systems, id, order).unwrap();
            owners.push(id);
        }
        for id in &owners {
            scene(&mut systems, &uscene).add_ui(&mut uscene, *id).unwrap();
        }

        // Republishing an order triggers a resort that must not swap the ties.
        uscene.set_draw_order(&mut systems, owners[0], 3).unwrap();

        let expected = vec![owners[1], owners[3], owners[2], owners[0]];
        assert_eq!(scene(&mut systems, &uscene).ui_draw_list(), expected);
        let orders: Vec<i32> = scene(&mut systems, &uscene)
            .frame()
            .ui
            .iter()
            .map(|ui| ui.draw_order)
            .collect();
        assert_eq!(orders, vec![1, 1, 2, 3]);
    }

    #[test]
    fn draw_order_event_moves_element_to_front() {
        let (mut systems, mut uscene, _) = setup();
        let back = uscene.create_object("back", None).unwrap();
        let front = uscene.create_object("front", None).unwrap();
        uscene.set_draw_order(&mut systems, front, 5).unwrap();
        scene(&mut systems, &uscene).add_ui(&mut uscene, back).unwrap();
        scene(&mut systems, &uscene).add_ui(&mut uscene, front).unwrap();

        uscene.set_draw_order(&mut systems, back, 10).unwrap();

        assert_eq!(scene(&mut systems, &uscene).ui_draw_list(), vec![front, back]);
    }

    #[test]
    fn models_are_allocated_in_execute_and_released_once_on_detach() {
        let (mut systems, mut uscene, calls) = setup();
        let owner = uscene.create_object("speaker", None).unwrap();
        scene(&mut systems, &uscene)
            .set_mesh(&mut uscene, owner, "meshes/speaker.obj", Some("metal".to_string()))
            .unwrap();
        assert!(scene(&mut systems, &uscene)
            .object_for(&uscene, owner)
            .unwrap()
            .model()
            .is_none());

        systems.graphics.execute(0.016).unwrap();
        let model = scene(&mut systems, &uscene)
            .object_for(&uscene, owner)
            .unwrap()
            .model()
            .unwrap();

        systems.detach(SystemKind::Graphics, &mut uscene, owner);
        systems.graphics.execute(0.016).unwrap();
        systems.graphics.execute(0.016).unwrap();
        systems.graphics.deinit();

        assert_eq!(releases(&calls), vec![model]);
    }

    #[test]
    fn changing_mesh_releases_the_previous_model() {
        let (mut systems, mut uscene, calls) = setup();
        let owner = uscene.create_object("speaker", None).unwrap();
        scene(&mut systems, &uscene)
            .set_mesh(&mut uscene, owner, "a.obj", None)
            .unwrap();
        systems.graphics.execute(0.016).unwrap();
        let first = scene(&mut systems, &uscene)
            .object_for(&uscene, owner)
            .unwrap()
            .model()
            .unwrap();

        scene(&mut systems, &uscene)
            .set_mesh(&mut uscene, owner, "a.obj", None)
            .unwrap();
        systems.graphics.execute(0.016).unwrap();
        assert!(releases(&calls).is_empty(), "same mesh keeps its model");

        scene(&mut systems, &uscene)
            .set_mesh(&mut uscene, owner, "b.obj", None)
            .unwrap();
        systems.graphics.execute(0.016).unwrap();

        assert_eq!(releases(&calls), vec![first]);
        let second = scene(&mut systems, &uscene)
            .object_for(&uscene, owner)
            .unwrap()
            .model()
            .unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn deinit_releases_live_models() {
        let (mut systems, mut uscene, calls) = setup();
        let owner = uscene.create_object("speaker", None).unwrap();
        scene(&mut systems, &uscene)
            .set_mesh(&mut uscene, owner, "a.obj", None)
            .unwrap();
        systems.graphics.execute(0.016).unwrap();

        systems.graphics.deinit();

        assert_eq!(releases(&calls).len(), 1);
        assert!(systems.graphics.find_system_scene(uscene.id()).is_none());
    }

    #[test]
    fn frame_carries_camera_and_sorted_meshes() {
        let (mut systems, mut uscene, calls) = setup();
        let camera = uscene.create_object("camera", None).unwrap();
        let plain = uscene.create_object("plain", None).unwrap();
        let wood = uscene.create_object("wood", None).unwrap();
        let brass = uscene.create_object("brass", None).unwrap();
        {
            let graphics = scene(&mut systems, &uscene);
            graphics.add_camera(&mut uscene, camera).unwrap();
            graphics.set_mesh(&mut uscene, plain, "box.obj", None).unwrap();
            graphics
                .set_mesh(&mut uscene, wood, "box.obj", Some("wood".to_string()))
                .unwrap();
            graphics
                .set_mesh(&mut uscene, brass, "horn.obj", Some("brass".to_string()))
                .unwrap();
        }
        uscene.set_position(&mut systems, camera, Vec3::new(0.0, 1.0, 5.0)).unwrap();
        uscene.set_selected(&mut systems, wood, true).unwrap();

        systems.graphics.execute(0.016).unwrap();

        let calls = calls.borrow();
        let Some(Call::Submit(frame)) = calls.last() else {
            panic!("expected a submitted frame");
        };
        let view = frame.camera.as_ref().unwrap();
        assert_eq!(view.owner, camera);
        assert_eq!(view.position, Vec3::new(0.0, 1.0, 5.0));
        assert!((view.aspect_ratio - 1280.0 / 720.0).abs() < 1e-6);
        let order: Vec<ObjectId> = frame.meshes.iter().map(|draw| draw.owner).collect();
        assert_eq!(order, vec![brass, wood, plain]);
        assert!(frame.meshes[1].selected);
    }
}
