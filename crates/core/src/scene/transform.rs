use glam::{EulerRot, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Position, Euler rotation (XYZ order, radians) and scale of a node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Vec3::ZERO,
        scale: Vec3::ONE,
    };

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    pub fn quat(&self) -> Quat {
        Quat::from_euler(
            EulerRot::XYZ,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        )
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.quat(), self.position)
    }

    /// Facing direction; -Z in local space.
    pub fn forward(&self) -> Vec3 {
        self.quat() * Vec3::NEG_Z
    }

    /// World transform of a node with `local` transform under a parent whose
    /// world transform is `self`.
    ///
    /// The child's offset is scaled by the parent's scale, then rotated by the
    /// parent's rotation.
    pub fn compose(&self, local: &Transform) -> Transform {
        let parent_rotation = self.quat();
        let (x, y, z) = (parent_rotation * local.quat()).to_euler(EulerRot::XYZ);

        Transform {
            position: self.position + parent_rotation * (self.scale * local.position),
            rotation: Vec3::new(x, y, z),
            scale: self.scale * local.scale,
        }
    }
}
