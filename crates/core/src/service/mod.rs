//! Cross-subsystem request routing.
//!
//! Callers such as the input layer ask the [`ServiceManager`] instead of
//! reaching into a concrete system. A query is routed to the scene bound to
//! the given [`SceneId`]; a missing service or scene is an empty result.

use glam::Vec3;

use crate::scene::{ObjectId, SceneId};

/// Result of a ray query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    pub object: ObjectId,
    pub point: Vec3,
    pub distance: f32,
}

pub trait RaycastService {
    /// Nearest object hit by the ray in `uscene`, skipping `ignore`.
    fn raycast(
        &self,
        uscene: SceneId,
        origin: Vec3,
        direction: Vec3,
        ignore: &[ObjectId],
    ) -> Option<RaycastHit>;
}

/// Borrowed view over the services of one `Systems` context.
#[derive(Default, Clone, Copy)]
pub struct ServiceManager<'a> {
    raycaster: Option<&'a dyn RaycastService>,
}

impl<'a> ServiceManager<'a> {
    pub fn new() -> Self {
        Self { raycaster: None }
    }

    pub fn with_raycaster(mut self, raycaster: &'a dyn RaycastService) -> Self {
        self.raycaster = Some(raycaster);
        self
    }

    pub fn has_raycaster(&self) -> bool {
        self.raycaster.is_some()
    }

    pub fn raycast(&self, uscene: SceneId, origin: Vec3, direction: Vec3) -> Option<RaycastHit> {
        self.raycast_ignoring(uscene, origin, direction, &[])
    }

    pub fn raycast_ignoring(
        &self,
        uscene: SceneId,
        origin: Vec3,
        direction: Vec3,
        ignore: &[ObjectId],
    ) -> Option<RaycastHit> {
        let hit = self
            .raycaster?
            .raycast(uscene, origin, direction, ignore);
        tracing::trace!(?uscene, ?origin, ?direction, hit = ?hit.map(|hit| hit.object), "raycast routed");
        hit
    }
}

impl std::fmt::Debug for ServiceManager<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceManager")
            .field("raycaster", &self.raycaster.is_some())
            .finish()
    }
}
