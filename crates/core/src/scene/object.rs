use glam::Vec3;

use crate::{
    scene::{ObjectId, Transform},
    system::{ShadowKey, SystemKind},
};

/// A node of the scene graph.
///
/// The owning [`crate::UScene`] keeps `world` and `world_velocity` current:
/// every local mutation is pushed down the subtree before the setter returns.
#[derive(Debug, Clone)]
pub struct UObject {
    id: ObjectId,
    name: String,
    pub(crate) local: Transform,
    pub(crate) world: Transform,
    pub(crate) velocity: Vec3,
    pub(crate) world_velocity: Vec3,
    pub(crate) draw_order: i32,
    pub(crate) selected: bool,
    pub(crate) parent: Option<ObjectId>,
    pub(crate) children: Vec<ObjectId>,
    shadows: [Option<ShadowKey>; SystemKind::COUNT],
}

impl UObject {
    pub(crate) fn new(id: ObjectId, name: String, parent: Option<ObjectId>) -> Self {
        Self {
            id,
            name,
            local: Transform::IDENTITY,
            world: Transform::IDENTITY,
            velocity: Vec3::ZERO,
            world_velocity: Vec3::ZERO,
            draw_order: 0,
            selected: false,
            parent,
            children: Vec::new(),
            shadows: [None; SystemKind::COUNT],
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local(&self) -> &Transform {
        &self.local
    }

    pub fn world(&self) -> &Transform {
        &self.world
    }

    /// Velocity relative to the parent.
    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn world_velocity(&self) -> Vec3 {
        self.world_velocity
    }

    pub fn draw_order(&self) -> i32 {
        self.draw_order
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    pub fn children(&self) -> &[ObjectId] {
        &self.children
    }

    /// Shadow object this node owns in the given subsystem, if attached.
    pub fn shadow(&self, kind: SystemKind) -> Option<ShadowKey> {
        self.shadows[kind.index()]
    }

    pub fn attached_systems(&self) -> impl Iterator<Item = SystemKind> + '_ {
        SystemKind::ALL
            .into_iter()
            .filter(|kind| self.shadows[kind.index()].is_some())
    }

    pub(crate) fn set_shadow(&mut self, kind: SystemKind, key: Option<ShadowKey>) {
        self.shadows[kind.index()] = key;
    }
}
