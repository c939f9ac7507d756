//! Physics subsystem: collision shapes attached to scene objects and ray
//! queries against them.

use std::{
    collections::HashMap,
    rc::{Rc, Weak},
};

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::{
    config::PhysicsConfig,
    event::EventType,
    scene::{ObjectId, SceneId, Transform, UScene},
    service::{RaycastHit, RaycastService},
    system::{
        subscribe_shadow, ShadowBase, ShadowKey, SystemInterface, SystemKind,
        SystemObjectInterface, SystemSceneInterface, Systems,
    },
    EngineError, Result,
};

const PARALLEL_EPSILON: f32 = 1e-8;

/// Collision geometry in mesh-local space, centred on the origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CollisionShape {
    Sphere { radius: f32 },
    Box { half_extents: Vec3 },
}

impl CollisionShape {
    /// Ray parameter of the first intersection at or after the origin.
    fn intersect(&self, origin: Vec3, direction: Vec3) -> Option<f32> {
        match *self {
            CollisionShape::Sphere { radius } => {
                let a = direction.length_squared();
                let b = 2.0 * origin.dot(direction);
                let c = origin.length_squared() - radius * radius;
                let discriminant = b * b - 4.0 * a * c;
                if a <= PARALLEL_EPSILON || discriminant < 0.0 {
                    return None;
                }
                let root = discriminant.sqrt();
                let near = (-b - root) / (2.0 * a);
                let far = (-b + root) / (2.0 * a);
                if near >= 0.0 {
                    Some(near)
                } else if far >= 0.0 {
                    Some(far)
                } else {
                    None
                }
            }
            CollisionShape::Box { half_extents } => {
                let mut t_min = f32::NEG_INFINITY;
                let mut t_max = f32::INFINITY;
                for axis in 0..3 {
                    let (o, d, h) = (origin[axis], direction[axis], half_extents[axis]);
                    if d.abs() <= PARALLEL_EPSILON {
                        if o < -h || o > h {
                            return None;
                        }
                        continue;
                    }
                    let (t1, t2) = ((-h - o) / d, (h - o) / d);
                    t_min = t_min.max(t1.min(t2));
                    t_max = t_max.min(t1.max(t2));
                }
                if t_max < t_min.max(0.0) {
                    None
                } else if t_min >= 0.0 {
                    Some(t_min)
                } else {
                    Some(t_max)
                }
            }
        }
    }
}

/// Collision data loaded from a file, shared between every object that
/// references the same path.
#[derive(Debug, PartialEq)]
pub struct PhysicsMesh {
    filepath: String,
    shape: CollisionShape,
}

impl PhysicsMesh {
    pub fn filepath(&self) -> &str {
        &self.filepath
    }

    pub fn shape(&self) -> CollisionShape {
        self.shape
    }
}

/// Physics shadow of a `UObject`.
#[derive(Debug, Clone)]
pub struct PhysicsObject {
    base: ShadowBase,
    transform: Transform,
    mesh: Option<Rc<PhysicsMesh>>,
}

impl PhysicsObject {
    /// Cached world transform.
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn mesh(&self) -> Option<&PhysicsMesh> {
        self.mesh.as_deref()
    }

    pub fn world_matrix(&self) -> Mat4 {
        self.transform.matrix()
    }

    /// Distance along the normalised world ray to this object's shape.
    /// Degenerate transforms (zero scale) never hit.
    fn ray_distance(&self, origin: Vec3, direction: Vec3) -> Option<f32> {
        let mesh = self.mesh.as_ref()?;
        let world = self.world_matrix();
        if world.determinant().abs() <= PARALLEL_EPSILON {
            return None;
        }
        let inverse = world.inverse();
        let local_origin = inverse.transform_point3(origin);
        let local_direction = inverse.transform_vector3(direction);
        mesh.shape.intersect(local_origin, local_direction)
    }
}

impl SystemObjectInterface for PhysicsObject {
    fn base(&self) -> &ShadowBase {
        &self.base
    }
}

/// Physics shadows of one [`UScene`].
#[derive(Debug)]
pub struct PhysicsScene {
    uscene: SceneId,
    objects: SlotMap<ShadowKey, PhysicsObject>,
    meshes: HashMap<String, Weak<PhysicsMesh>>,
    max_ray_distance: f32,
}

impl PhysicsScene {
    pub fn new(uscene: SceneId, config: &PhysicsConfig) -> Self {
        Self {
            uscene,
            objects: SlotMap::with_key(),
            meshes: HashMap::new(),
            max_ray_distance: config.max_ray_distance,
        }
    }

    pub fn object_for(&self, uscene: &UScene, owner: ObjectId) -> Option<&PhysicsObject> {
        let key = uscene.object(owner)?.shadow(SystemKind::Physics)?;
        self.objects.get(key)
    }

    /// Gives `owner` collision geometry, attaching a physics shadow first if
    /// needed. A path already loaded by a live object reuses that mesh and
    /// its shape.
    pub fn set_physics_mesh(
        &mut self,
        uscene: &mut UScene,
        owner: ObjectId,
        filepath: &str,
        shape: CollisionShape,
    ) -> Result<ShadowKey> {
        let key = self.add_system_object(uscene, owner)?;
        let mesh = self.load_mesh(filepath, shape);
        if let Some(object) = self.objects.get_mut(key) {
            object.mesh = Some(mesh);
        }
        Ok(key)
    }

    /// Number of meshes still referenced by at least one object.
    pub fn live_meshes(&self) -> usize {
        self.meshes
            .values()
            .filter(|mesh| mesh.strong_count() > 0)
            .count()
    }

    /// Nearest hit along `direction` within the configured distance.
    pub fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        ignore: &[ObjectId],
    ) -> Option<RaycastHit> {
        let direction = direction.normalize_or_zero();
        if direction == Vec3::ZERO {
            return None;
        }

        let mut nearest: Option<(ObjectId, f32)> = None;
        for object in self.objects.values() {
            let owner = object.uobject();
            if ignore.contains(&owner) {
                continue;
            }
            let Some(distance) = object.ray_distance(origin, direction) else {
                continue;
            };
            if distance > self.max_ray_distance {
                continue;
            }
            if nearest.map_or(true, |(_, best)| distance < best) {
                nearest = Some((owner, distance));
            }
        }

        nearest.map(|(object, distance)| RaycastHit {
            object,
            point: origin + direction * distance,
            distance,
        })
    }

    fn load_mesh(&mut self, filepath: &str, shape: CollisionShape) -> Rc<PhysicsMesh> {
        if let Some(mesh) = self.meshes.get(filepath).and_then(Weak::upgrade) {
            return mesh;
        }
        self.meshes.retain(|_, mesh| mesh.strong_count() > 0);

        let mesh = Rc::new(PhysicsMesh {
            filepath: filepath.to_string(),
            shape,
        });
        self.meshes
            .insert(filepath.to_string(), Rc::downgrade(&mesh));
        tracing::debug!(scene = ?self.uscene, filepath, ?shape, "physics mesh loaded");
        mesh
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
}

impl SystemSceneInterface for PhysicsScene {
    const KIND: SystemKind = SystemKind::Physics;
    type Object = PhysicsObject;

    fn uscene(&self) -> SceneId {
        self.uscene
    }

    fn objects(&self) -> &SlotMap<ShadowKey, PhysicsObject> {
        &self.objects
    }

    fn objects_mut(&mut self) -> &mut SlotMap<ShadowKey, PhysicsObject> {
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

        let transform = uscene
            .object(owner)
            .map(|object| *object.world())
            .ok_or(EngineError::UnknownObject(owner))?;
        let key = self.objects.insert(PhysicsObject {
            base: ShadowBase::new(owner, self.uscene),
            transform,
            mesh: None,
        });

        let sid = self.uscene;
        let subscribed = subscribe_shadow(uscene, owner, SystemKind::Physics, key, |uscene, tokens| {
            tokens.push(uscene.observe_vec3(owner, EventType::PositionUpdated, move |systems: &mut Systems, position| {
                if let Some(scene) = systems.physics.find_system_scene_mut(sid) {
                    scene.transform_updated(key, owner, |transform| transform.position = position);
                }
            })?);
            tokens.push(uscene.observe_vec3(owner, EventType::RotationUpdated, move |systems: &mut Systems, rotation| {
                if let Some(scene) = systems.physics.find_system_scene_mut(sid) {
                    scene.transform_updated(key, owner, |transform| transform.rotation = rotation);
                }
            })?);
            tokens.push(uscene.observe_vec3(owner, EventType::ScaleUpdated, move |systems: &mut Systems, scale| {
                if let Some(scene) = systems.physics.find_system_scene_mut(sid) {
                    scene.transform_updated(key, owner, |transform| transform.scale = scale);
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

        tracing::debug!(scene = ?self.uscene, ?owner, "physics object attached");
        Ok(key)
    }
}

/// Owns every [`PhysicsScene`].
#[derive(Debug)]
pub struct PhysicsSystem {
    config: PhysicsConfig,
    scenes: Vec<PhysicsScene>,
}

impl PhysicsSystem {
    pub fn new(config: PhysicsConfig) -> Self {
        Self {
            config,
            scenes: Vec::new(),
        }
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }
}

impl SystemInterface for PhysicsSystem {
    const KIND: SystemKind = SystemKind::Physics;
    type Scene = PhysicsScene;

    fn init(&mut self) -> Result<()> {
        self.config.validate()?;
        tracing::info!(
            max_ray_distance = self.config.max_ray_distance,
            "physics system initialised"
        );
        Ok(())
    }

    fn deinit(&mut self) {
        self.scenes.clear();
    }

    // No simulation step: shadows are kept current by the event path.
    fn execute(&mut self, _dt: f32) -> Result<()> {
        Ok(())
    }

    fn scenes(&self) -> &[PhysicsScene] {
        &self.scenes
    }

    fn scenes_mut(&mut self) -> &mut Vec<PhysicsScene> {
        &mut self.scenes
    }

    fn new_scene(&self, uscene: SceneId) -> PhysicsScene {
        PhysicsScene::new(uscene, &self.config)
    }
}

impl RaycastService for PhysicsSystem {
    fn raycast(
        &self,
        uscene: SceneId,
        origin: Vec3,
        direction: Vec3,
        ignore: &[ObjectId],
    ) -> Option<RaycastHit> {
        self.find_system_scene(uscene)?
            .raycast(origin, direction, ignore)
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_4;

    use super::*;

    const EPSILON: f32 = 1e-4;

    fn setup() -> (Systems, UScene) {
        let mut ids: SlotMap<SceneId, ()> = SlotMap::with_key();
        let uscene = UScene::new(ids.insert(()), "physics");
        let mut systems = Systems::default();
        systems.physics.create_system_scene(uscene.id());
        (systems, uscene)
    }

    fn scene<'a>(systems: &'a mut Systems, uscene: &UScene) -> &'a mut PhysicsScene {
        systems.physics.find_system_scene_mut(uscene.id()).unwrap()
    }

    fn spawn(
        systems: &mut Systems,
        uscene: &mut UScene,
        name: &str,
        position: Vec3,
        shape: CollisionShape,
    ) -> ObjectId {
        let id = uscene.create_object(name, None).unwrap();
        uscene.set_position(systems, id, position).unwrap();
        scene(systems, uscene)
            .set_physics_mesh(uscene, id, &format!("{name}.col"), shape)
            .unwrap();
        id
    }

    #[test]
    fn ray_hits_nearest_sphere() {
        let (mut systems, mut uscene) = setup();
        let sphere = CollisionShape::Sphere { radius: 1.0 };
        let near = spawn(&mut systems, &mut uscene, "near", Vec3::new(0.0, 0.0, -5.0), sphere);
        spawn(&mut systems, &mut uscene, "far", Vec3::new(0.0, 0.0, -10.0), sphere);

        let hit = systems
            .physics
            .raycast(uscene.id(), Vec3::ZERO, Vec3::new(0.0, 0.0, -2.0), &[])
            .unwrap();

        assert_eq!(hit.object, near);
        assert!((hit.distance - 4.0).abs() < EPSILON);
        assert!(hit.point.abs_diff_eq(Vec3::new(0.0, 0.0, -4.0), EPSILON));
    }

    #[test]
    fn ignored_objects_are_skipped() {
        let (mut systems, mut uscene) = setup();
        let sphere = CollisionShape::Sphere { radius: 1.0 };
        let near = spawn(&mut systems, &mut uscene, "near", Vec3::new(0.0, 0.0, -5.0), sphere);
        let far = spawn(&mut systems, &mut uscene, "far", Vec3::new(0.0, 0.0, -10.0), sphere);

        let hit = systems
            .physics
            .raycast(uscene.id(), Vec3::ZERO, Vec3::NEG_Z, &[near])
            .unwrap();

        assert_eq!(hit.object, far);
        assert!(systems
            .physics
            .raycast(uscene.id(), Vec3::ZERO, Vec3::NEG_Z, &[near, far])
            .is_none());
    }

    #[test]
    fn shape_follows_scale_and_rotation_events() {
        let (mut systems, mut uscene) = setup();
        let cube = spawn(
            &mut systems,
            &mut uscene,
            "cube",
            Vec3::new(0.0, 0.0, -5.0),
            CollisionShape::Box {
                half_extents: Vec3::ONE,
            },
        );

        let hit = systems
            .physics
            .raycast(uscene.id(), Vec3::ZERO, Vec3::NEG_Z, &[])
            .unwrap();
        assert!((hit.distance - 4.0).abs() < EPSILON);

        uscene.set_scale(&mut systems, cube, Vec3::splat(2.0)).unwrap();
        let hit = systems
            .physics
            .raycast(uscene.id(), Vec3::ZERO, Vec3::NEG_Z, &[])
            .unwrap();
        assert!((hit.distance - 3.0).abs() < EPSILON);

        uscene.set_scale(&mut systems, cube, Vec3::ONE).unwrap();
        uscene
            .set_rotation(&mut systems, cube, Vec3::new(0.0, FRAC_PI_4, 0.0))
            .unwrap();
        let hit = systems
            .physics
            .raycast(uscene.id(), Vec3::ZERO, Vec3::NEG_Z, &[])
            .unwrap();
        assert!((hit.distance - (5.0 - 2.0_f32.sqrt())).abs() < EPSILON);
    }

    #[test]
    fn parent_scale_reaches_child_shadows() {
        let (mut systems, mut uscene) = setup();
        let parent = uscene.create_object("parent", None).unwrap();
        let child = uscene.create_object("child", Some(parent)).unwrap();
        uscene
            .set_position(&mut systems, child, Vec3::new(0.0, 0.0, -5.0))
            .unwrap();
        scene(&mut systems, &uscene)
            .set_physics_mesh(
                &mut uscene,
                child,
                "child.col",
                CollisionShape::Box {
                    half_extents: Vec3::ONE,
                },
            )
            .unwrap();
        systems
            .graphics
            .create_system_scene(uscene.id())
            .add_system_object(&mut uscene, child)
            .unwrap();

        uscene.set_scale(&mut systems, parent, Vec3::splat(2.0)).unwrap();

        let shadow = *scene(&mut systems, &uscene)
            .object_for(&uscene, child)
            .unwrap()
            .transform();
        assert_eq!(shadow.scale, Vec3::splat(2.0));
        assert_eq!(shadow.position, Vec3::new(0.0, 0.0, -10.0));
        let graphics = systems
            .graphics
            .find_system_scene(uscene.id())
            .unwrap()
            .object_for(&uscene, child)
            .unwrap();
        assert_eq!(graphics.transform().scale, Vec3::splat(2.0));

        // The box now spans z in [-12, -8].
        let hit = systems
            .physics
            .raycast(uscene.id(), Vec3::ZERO, Vec3::NEG_Z, &[])
            .unwrap();
        assert_eq!(hit.object, child);
        assert!((hit.distance - 8.0).abs() < EPSILON);
    }

    #[test]
    fn ray_starting_inside_hits_the_far_side() {
        let (mut systems, mut uscene) = setup();
        spawn(
            &mut systems,
            &mut uscene,
            "room",
            Vec3::ZERO,
            CollisionShape::Sphere { radius: 3.0 },
        );

        let hit = systems
            .physics
            .raycast(uscene.id(), Vec3::ZERO, Vec3::X, &[])
            .unwrap();
        assert!((hit.distance - 3.0).abs() < EPSILON);
    }

    #[test]
    fn hits_beyond_max_distance_are_dropped() {
        let (mut systems, mut uscene) = setup();
        spawn(
            &mut systems,
            &mut uscene,
            "distant",
            Vec3::new(0.0, 0.0, -2000.0),
            CollisionShape::Sphere { radius: 1.0 },
        );

        assert!(systems
            .physics
            .raycast(uscene.id(), Vec3::ZERO, Vec3::NEG_Z, &[])
            .is_none());
    }

    #[test]
    fn meshes_are_shared_while_referenced() {
        let (mut systems, mut uscene) = setup();
        let sphere = CollisionShape::Sphere { radius: 1.0 };
        let a = uscene.create_object("a", None).unwrap();
        let b = uscene.create_object("b", None).unwrap();
        {
            let physics = scene(&mut systems, &uscene);
            physics.set_physics_mesh(&mut uscene, a, "rock.col", sphere).unwrap();
            physics.set_physics_mesh(&mut uscene, b, "rock.col", sphere).unwrap();
        }
        assert_eq!(scene(&mut systems, &uscene).live_meshes(), 1);
        {
            let physics = scene(&mut systems, &uscene);
            let first = physics.object_for(&uscene, a).unwrap().mesh.clone().unwrap();
            let second = physics.object_for(&uscene, b).unwrap().mesh.clone().unwrap();
            assert!(Rc::ptr_eq(&first, &second));
        }

        systems.detach(SystemKind::Physics, &mut uscene, a);
        assert_eq!(scene(&mut systems, &uscene).live_meshes(), 1);
        systems.detach(SystemKind::Physics, &mut uscene, b);
        assert_eq!(scene(&mut systems, &uscene).live_meshes(), 0);
    }

    #[test]
    fn raycast_on_unknown_scene_misses() {
        let (systems, _) = setup();
        let mut ids: SlotMap<SceneId, ()> = SlotMap::with_key();
        ids.insert(());
        let other = ids.insert(());

        assert!(systems
            .physics
            .raycast(other, Vec3::ZERO, Vec3::NEG_Z, &[])
            .is_none());
    }
}
