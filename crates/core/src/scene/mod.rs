//! Scene graph: an arena of [`UObject`] nodes addressed by stable ids.
//!
//! Parents exclusively own their children. Every local transform mutation is
//! pushed depth-first through the subtree and published on the scene's
//! [`EventBus`] as world-space values, so subsystem shadows never walk the
//! hierarchy themselves.

mod object;
mod transform;

pub use object::UObject;
pub use transform::Transform;

use glam::Vec3;
use slotmap::{new_key_type, SlotMap};

use crate::{
    event::{EventBus, EventData, EventType, ObserverToken},
    system::{ShadowKey, SystemKind, Systems},
    EngineError, Result,
};

new_key_type! {
    /// Stable identity of a [`UScene`].
    pub struct SceneId;
    /// Stable identity of a [`UObject`] within its scene.
    pub struct ObjectId;
}

/// Which world quantities changed on a node during propagation.
#[derive(Debug, Clone, Copy, Default)]
struct Changes {
    position: bool,
    rotation: bool,
    scale: bool,
    velocity: bool,
}

impl Changes {
    const ALL: Self = Self {
        position: true,
        rotation: true,
        scale: true,
        velocity: true,
    };

    /// A parent's rotation or scale also moves every descendant.
    fn for_children(self) -> Self {
        Self {
            position: self.position || self.rotation || self.scale,
            ..self
        }
    }
}

/// Top-level scene: owns the object arena and the observer bus its
/// subsystem shadows subscribe through.
#[derive(Debug)]
pub struct UScene {
    id: SceneId,
    name: String,
    objects: SlotMap<ObjectId, UObject>,
    roots: Vec<ObjectId>,
    bus: EventBus<Systems>,
}

impl UScene {
    pub fn new(id: SceneId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            objects: SlotMap::with_key(),
            roots: Vec::new(),
            bus: EventBus::new(),
        }
    }

    pub fn id(&self) -> SceneId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(id)
    }

    pub fn object(&self, id: ObjectId) -> Option<&UObject> {
        self.objects.get(id)
    }

    pub fn objects(&self) -> impl Iterator<Item = &UObject> {
        self.objects.values()
    }

    pub fn roots(&self) -> &[ObjectId] {
        &self.roots
    }

    pub fn bus(&self) -> &EventBus<Systems> {
        &self.bus
    }

    pub(crate) fn bus_mut(&mut self) -> &mut EventBus<Systems> {
        &mut self.bus
    }

    /// Adds a node under `parent` (or as a root). Its world transform is
    /// derived from the parent straight away.
    pub fn create_object(
        &mut self,
        name: impl Into<String>,
        parent: Option<ObjectId>,
    ) -> Result<ObjectId> {
        let (parent_world, parent_velocity) = match parent {
            Some(parent) => {
                let parent = self.get(parent)?;
                (parent.world, parent.world_velocity)
            }
            None => (Transform::IDENTITY, Vec3::ZERO),
        };

        let name = name.into();
        let id = self.objects.insert_with_key(|id| {
            let mut object = UObject::new(id, name, parent);
            object.world = parent_world.compose(&object.local);
            object.world_velocity = parent_velocity;
            object
        });

        match parent {
            Some(parent) => self.get_mut(parent)?.children.push(id),
            None => self.roots.push(id),
        }

        tracing::debug!(scene = ?self.id, ?id, ?parent, "object created");
        Ok(id)
    }

    pub fn set_position(&mut self, ctx: &mut Systems, id: ObjectId, position: Vec3) -> Result<()> {
        self.get_mut(id)?.local.position = position;
        self.propagate(
            ctx,
            id,
            Changes {
                position: true,
                ..Changes::default()
            },
        )
    }

    pub fn translate(&mut self, ctx: &mut Systems, id: ObjectId, delta: Vec3) -> Result<()> {
        let position = self.get(id)?.local.position + delta;
        self.set_position(ctx, id, position)
    }

    /// Sets the local Euler rotation (XYZ, radians).
    pub fn set_rotation(&mut self, ctx: &mut Systems, id: ObjectId, rotation: Vec3) -> Result<()> {
        self.get_mut(id)?.local.rotation = rotation;
        self.propagate(
            ctx,
            id,
            Changes {
                rotation: true,
                ..Changes::default()
            },
        )
    }

    pub fn set_scale(&mut self, ctx: &mut Systems, id: ObjectId, scale: Vec3) -> Result<()> {
        self.get_mut(id)?.local.scale = scale;
        self.propagate(
            ctx,
            id,
            Changes {
                scale: true,
                ..Changes::default()
            },
        )
    }

    /// Sets the velocity relative to the parent. Descendants inherit it as a
    /// plain sum; angular motion of the parent is not accounted for.
    pub fn set_velocity(&mut self, ctx: &mut Systems, id: ObjectId, velocity: Vec3) -> Result<()> {
        self.get_mut(id)?.velocity = velocity;
        self.propagate(
            ctx,
            id,
            Changes {
                velocity: true,
                ..Changes::default()
            },
        )
    }

    /// Publishes `UiDrawOrderUpdated` to this node's observers only.
    pub fn set_draw_order(&mut self, ctx: &mut Systems, id: ObjectId, order: i32) -> Result<()> {
        self.get_mut(id)?.draw_order = order;
        self.bus.publish(
            ctx,
            id,
            EventType::UiDrawOrderUpdated,
            EventData::Integer(order),
        )?;
        Ok(())
    }

    /// Publishes `SelectionUpdated` to this node's observers only.
    pub fn set_selected(&mut self, ctx: &mut Systems, id: ObjectId, selected: bool) -> Result<()> {
        self.get_mut(id)?.selected = selected;
        self.bus.publish(
            ctx,
            id,
            EventType::SelectionUpdated,
            EventData::Flag(selected),
        )?;
        Ok(())
    }

    /// Moves `id` under `parent` (or to the root list), keeping its local
    /// transform, and republishes the whole subtree.
    pub fn set_parent(
        &mut self,
        ctx: &mut Systems,
        id: ObjectId,
        parent: Option<ObjectId>,
    ) -> Result<()> {
        let previous = self.get(id)?.parent;

        if let Some(parent) = parent {
            let mut cursor = Some(parent);
            while let Some(ancestor) = cursor {
                if ancestor == id {
                    return Err(EngineError::HierarchyCycle { object: id, parent });
                }
                cursor = self.get(ancestor)?.parent;
            }
        }

        match previous {
            Some(previous) => self.get_mut(previous)?.children.retain(|child| *child != id),
            None => self.roots.retain(|root| *root != id),
        }
        match parent {
            Some(parent) => self.get_mut(parent)?.children.push(id),
            None => self.roots.push(id),
        }
        self.get_mut(id)?.parent = parent;

        tracing::debug!(scene = ?self.id, ?id, ?parent, "object reparented");
        self.propagate(ctx, id, Changes::ALL)
    }

    /// Removes `id` and its subtree. Each node's shadows are destroyed first,
    /// then its children, then the node itself.
    pub fn remove_object(&mut self, systems: &mut Systems, id: ObjectId) -> Result<()> {
        let parent = self.get(id)?.parent;
        match parent {
            Some(parent) => {
                if let Some(parent) = self.objects.get_mut(parent) {
                    parent.children.retain(|child| *child != id);
                }
            }
            None => self.roots.retain(|root| *root != id),
        }
        self.remove_subtree(systems, id);
        Ok(())
    }

    fn remove_subtree(&mut self, systems: &mut Systems, id: ObjectId) {
        systems.detach_all(self, id);

        let children = self
            .objects
            .get(id)
            .map(|object| object.children.clone())
            .unwrap_or_default();
        for child in children {
            self.remove_subtree(systems, child);
        }

        let dropped = self.bus.forget_owner(id);
        self.objects.remove(id);
        tracing::debug!(scene = ?self.id, ?id, dropped_observers = dropped, "object removed");
    }

    pub fn observe_vec3<F>(&mut self, owner: ObjectId, event: EventType, callback: F) -> Result<ObserverToken>
    where
        F: FnMut(&mut Systems, Vec3) + 'static,
    {
        self.get(owner)?;
        self.bus.register_vec3(owner, event, callback)
    }

    pub fn observe_integer<F>(&mut self, owner: ObjectId, event: EventType, callback: F) -> Result<ObserverToken>
    where
        F: FnMut(&mut Systems, i32) + 'static,
    {
        self.get(owner)?;
        self.bus.register_integer(owner, event, callback)
    }

    pub fn observe_flag<F>(&mut self, owner: ObjectId, event: EventType, callback: F) -> Result<ObserverToken>
    where
        F: FnMut(&mut Systems, bool) + 'static,
    {
        self.get(owner)?;
        self.bus.register_flag(owner, event, callback)
    }

    /// Unregisters an observer; unknown or already removed tokens are ignored.
    pub fn unobserve(&mut self, token: ObserverToken) -> bool {
        self.bus.unregister(token)
    }

    pub(crate) fn attach_shadow(&mut self, id: ObjectId, kind: SystemKind, key: ShadowKey) -> Result<()> {
        self.get_mut(id)?.set_shadow(kind, Some(key));
        Ok(())
    }

    pub(crate) fn detach_shadow(&mut self, id: ObjectId, kind: SystemKind) {
        if let Some(object) = self.objects.get_mut(id) {
            object.set_shadow(kind, None);
        }
    }

    fn get(&self, id: ObjectId) -> Result<&UObject> {
        self.objects.get(id).ok_or(EngineError::UnknownObject(id))
    }

    fn get_mut(&mut self, id: ObjectId) -> Result<&mut UObject> {
        self.objects.get_mut(id).ok_or(EngineError::UnknownObject(id))
    }

    /// Recomputes the world state of `id` from its parent, publishes what
    /// changed, then recurses into the children.
    fn propagate(&mut self, ctx: &mut Systems, id: ObjectId, changes: Changes) -> Result<()> {
        let parent = self.get(id)?.parent;
        let (parent_world, parent_velocity) = match parent {
            Some(parent) => {
                let parent = self.get(parent)?;
                (parent.world, parent.world_velocity)
            }
            None => (Transform::IDENTITY, Vec3::ZERO),
        };

        let object = self.get_mut(id)?;
        object.world = parent_world.compose(&object.local);
        object.world_velocity = parent_velocity + object.velocity;
        let world = object.world;
        let velocity = object.world_velocity;
        let children = object.children.clone();

        let published = [
            (changes.position, EventType::PositionUpdated, world.position),
            (changes.rotation, EventType::RotationUpdated, world.rotation),
            (changes.scale, EventType::ScaleUpdated, world.scale),
            (changes.velocity, EventType::VelocityUpdated, velocity),
        ];
        for (changed, event, value) in published {
            if changed {
                self.bus.publish(ctx, id, event, EventData::Vec3(value))?;
            }
        }

        let changes = changes.for_children();
        for child in children {
            self.propagate(ctx, child, changes)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    const EPSILON: f32 = 1e-4;

    fn approx_vec(a: Vec3, b: Vec3) -> bool {
        (a - b).abs().max_element() < EPSILON
    }

    fn scene() -> UScene {
        let mut ids: SlotMap<SceneId, ()> = SlotMap::with_key();
        UScene::new(ids.insert(()), "test")
    }

    fn record_positions(scene: &mut UScene, id: ObjectId) -> Rc<RefCell<Vec<Vec3>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        scene
            .observe_vec3(id, EventType::PositionUpdated, move |_, position| {
                sink.borrow_mut().push(position)
            })
            .unwrap();
        seen
    }

    #[test]
    fn chain_propagates_world_position_to_grandchild() {
        let mut systems = Systems::default();
        let mut scene = scene();
        let a = scene.create_object("a", None).unwrap();
        let b = scene.create_object("b", Some(a)).unwrap();
        let c = scene.create_object("c", Some(b)).unwrap();
        scene.set_position(&mut systems, c, Vec3::new(0.0, 0.0, 1.0)).unwrap();

        let seen = record_positions(&mut scene, c);
        scene.set_position(&mut systems, a, Vec3::new(1.0, 0.0, 0.0)).unwrap();
        scene.set_position(&mut systems, b, Vec3::new(0.0, 2.0, 0.0)).unwrap();

        let expected = Vec3::new(1.0, 2.0, 1.0);
        assert!(approx_vec(*seen.borrow().last().unwrap(), expected));
        assert!(approx_vec(scene.object(c).unwrap().world().position, expected));
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn redundant_updates_are_republished() {
        let mut systems = Systems::default();
        let mut scene = scene();
        let a = scene.create_object("a", None).unwrap();
        let seen = record_positions(&mut scene, a);

        scene.set_position(&mut systems, a, Vec3::X).unwrap();
        scene.set_position(&mut systems, a, Vec3::X).unwrap();

        assert_eq!(*seen.borrow(), vec![Vec3::X, Vec3::X]);
    }

    #[test]
    fn parent_rotation_moves_children() {
        let mut systems = Systems::default();
        let mut scene = scene();
        let parent = scene.create_object("parent", None).unwrap();
        let child = scene.create_object("child", Some(parent)).unwrap();
        scene.set_position(&mut systems, child, Vec3::X).unwrap();

        let seen = record_positions(&mut scene, child);
        scene
            .set_rotation(&mut systems, parent, Vec3::new(0.0, 0.0, std::f32::consts::FRAC_PI_2))
            .unwrap();

        assert_eq!(seen.borrow().len(), 1);
        assert!(approx_vec(seen.borrow()[0], Vec3::Y));
    }

    #[test]
    fn child_velocity_includes_parent_velocity() {
        let mut systems = Systems::default();
        let mut scene = scene();
        let parent = scene.create_object("parent", None).unwrap();
        let child = scene.create_object("child", Some(parent)).unwrap();

        scene.set_velocity(&mut systems, child, Vec3::Y).unwrap();
        scene.set_velocity(&mut systems, parent, Vec3::X).unwrap();

        assert_eq!(scene.object(child).unwrap().world_velocity(), Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn reparenting_rejects_cycles() {
        let mut systems = Systems::default();
        let mut scene = scene();
        let a = scene.create_object("a", None).unwrap();
        let b = scene.create_object("b", Some(a)).unwrap();

        let err = scene.set_parent(&mut systems, a, Some(b)).unwrap_err();
        assert!(matches!(err, EngineError::HierarchyCycle { .. }));
        assert_eq!(scene.roots(), &[a]);
    }

    #[test]
    fn reparenting_republishes_new_world_position() {
        let mut systems = Systems::default();
        let mut scene = scene();
        let a = scene.create_object("a", None).unwrap();
        let b = scene.create_object("b", None).unwrap();
        scene.set_position(&mut systems, a, Vec3::splat(5.0)).unwrap();
        scene.set_position(&mut systems, b, Vec3::X).unwrap();

        let seen = record_positions(&mut scene, b);
        scene.set_parent(&mut systems, b, Some(a)).unwrap();

        assert!(approx_vec(seen.borrow()[0], Vec3::new(6.0, 5.0, 5.0)));
        assert_eq!(scene.roots(), &[a]);
        assert_eq!(scene.object(a).unwrap().children(), &[b]);
    }

    #[test]
    fn removing_a_node_removes_its_subtree_and_observers() {
        let mut systems = Systems::default();
        let mut scene = scene();
        let a = scene.create_object("a", None).unwrap();
        let b = scene.create_object("b", Some(a)).unwrap();
        let c = scene.create_object("c", Some(b)).unwrap();
        record_positions(&mut scene, c);

        scene.remove_object(&mut systems, b).unwrap();

        assert!(scene.contains(a));
        assert!(!scene.contains(b));
        assert!(!scene.contains(c));
        assert!(scene.object(a).unwrap().children().is_empty());
        assert!(scene.bus().is_empty());

        let err = scene.set_position(&mut systems, c, Vec3::ONE).unwrap_err();
        assert!(matches!(err, EngineError::UnknownObject(id) if id == c));
    }
}
