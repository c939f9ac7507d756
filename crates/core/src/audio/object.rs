use glam::Vec3;

use crate::{
    scene::Transform,
    system::{ShadowBase, ShadowKey, SystemObjectInterface},
};

/// One end of a connection between two audio objects of the same scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioLink {
    /// The object at the other end.
    pub peer: ShadowKey,
    /// Relative radial velocity consumed by the DSP layer as doppler input.
    pub doppler: f32,
}

impl AudioLink {
    pub(crate) fn new(peer: ShadowKey) -> Self {
        Self { peer, doppler: 0.0 }
    }
}

/// Audio shadow of a `UObject`: cached world state plus its links.
#[derive(Debug, Clone)]
pub struct AudioObject {
    pub(crate) base: ShadowBase,
    pub(crate) position: Vec3,
    pub(crate) rotation: Vec3,
    pub(crate) velocity: Vec3,
    pub(crate) outputs: Vec<AudioLink>,
    pub(crate) inputs: Vec<AudioLink>,
}

impl AudioObject {
    pub(crate) fn new(base: ShadowBase, position: Vec3, rotation: Vec3, velocity: Vec3) -> Self {
        Self {
            base,
            position,
            rotation,
            velocity,
            outputs: Vec::new(),
            inputs: Vec::new(),
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn rotation(&self) -> Vec3 {
        self.rotation
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn forward(&self) -> Vec3 {
        Transform {
            rotation: self.rotation,
            ..Transform::IDENTITY
        }
        .forward()
    }

    pub fn outputs(&self) -> &[AudioLink] {
        &self.outputs
    }

    pub fn inputs(&self) -> &[AudioLink] {
        &self.inputs
    }
}

impl SystemObjectInterface for AudioObject {
    fn base(&self) -> &ShadowBase {
        &self.base
    }
}
