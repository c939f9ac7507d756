//! Pointer-driven selection and placement.
//!
//! The controller sits on the caller side of the event path: it queries the
//! [`ServiceManager`](crate::service::ServiceManager) for raycasts and feeds
//! the results back as ordinary `UScene` mutations.

use glam::Vec3;

use crate::{
    scene::{ObjectId, UScene},
    service::RaycastHit,
    system::Systems,
    Result,
};

/// Pointer input already translated into a world-space ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    /// A new object was spawned from the UI and follows the pointer.
    Spawned(ObjectId),
    Moved { origin: Vec3, direction: Vec3 },
    Pressed { origin: Vec3, direction: Vec3 },
}

#[derive(Debug, Default, Clone)]
pub struct InputController {
    selected: Vec<ObjectId>,
    placing: bool,
}

impl InputController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selection(&self) -> &[ObjectId] {
        &self.selected
    }

    pub fn is_placing(&self) -> bool {
        self.placing
    }

    /// Applies one pointer event and returns the raycast hit it produced,
    /// if any.
    pub fn handle(
        &mut self,
        uscene: &mut UScene,
        systems: &mut Systems,
        event: PointerEvent,
    ) -> Result<Option<RaycastHit>> {
        self.selected.retain(|id| uscene.contains(*id));

        match event {
            PointerEvent::Spawned(id) => {
                self.clear_selection(uscene, systems)?;
                if uscene.contains(id) {
                    self.selected.push(id);
                    self.placing = true;
                    tracing::debug!(?id, "placing spawned object");
                }
                Ok(None)
            }
            PointerEvent::Moved { origin, direction } => {
                if !self.placing {
                    return Ok(None);
                }
                let hit = systems.services().raycast_ignoring(
                    uscene.id(),
                    origin,
                    direction,
                    &self.selected,
                );
                if let Some(hit) = hit {
                    for id in self.selected.clone() {
                        let local = Self::to_local(uscene, id, hit.point);
                        uscene.set_position(systems, id, local)?;
                    }
                }
                Ok(hit)
            }
            PointerEvent::Pressed { origin, direction } => {
                if self.placing {
                    self.placing = false;
                    for id in self.selected.clone() {
                        uscene.set_selected(systems, id, true)?;
                    }
                    tracing::debug!(count = self.selected.len(), "placement committed");
                    return Ok(None);
                }

                let hit = systems.services().raycast(uscene.id(), origin, direction);
                self.clear_selection(uscene, systems)?;
                if let Some(hit) = hit {
                    uscene.set_selected(systems, hit.object, true)?;
                    self.selected.push(hit.object);
                    tracing::debug!(id = ?hit.object, "object selected");
                }
                Ok(hit)
            }
        }
    }

    fn clear_selection(&mut self, uscene: &mut UScene, systems: &mut Systems) -> Result<()> {
        for id in self.selected.drain(..) {
            uscene.set_selected(systems, id, false)?;
        }
        Ok(())
    }

    /// World point expressed in the parent space of `id`.
    fn to_local(uscene: &UScene, id: ObjectId, point: Vec3) -> Vec3 {
        uscene
            .object(id)
            .and_then(|object| object.parent())
            .and_then(|parent| uscene.object(parent))
            .map(|parent| parent.world().matrix().inverse().transform_point3(point))
            .unwrap_or(point)
    }
}
