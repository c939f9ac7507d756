use crate::{
    scene::Transform,
    system::{ShadowBase, SystemObjectInterface},
};

/// Opaque per-model handle allocated by the render backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelHandle(pub u64);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshShadow {
    pub mesh: Option<String>,
    pub material: Option<String>,
    /// Allocated by `GraphicsSystem::execute` once a mesh is set.
    pub model: Option<ModelHandle>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraShadow {
    pub fov_y_radians: f32,
    pub near: f32,
    pub far: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiShadow {
    pub draw_order: i32,
}

/// What a graphics shadow renders as.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphicsKind {
    Mesh(MeshShadow),
    Camera(CameraShadow),
    Ui(UiShadow),
}

impl GraphicsKind {
    pub fn is_mesh(&self) -> bool {
        matches!(self, GraphicsKind::Mesh(_))
    }

    pub fn is_camera(&self) -> bool {
        matches!(self, GraphicsKind::Camera(_))
    }

    pub fn is_ui(&self) -> bool {
        matches!(self, GraphicsKind::Ui(_))
    }
}

/// Graphics shadow of a `UObject`.
#[derive(Debug, Clone)]
pub struct GraphicsObject {
    pub(crate) base: ShadowBase,
    pub(crate) transform: Transform,
    pub(crate) selected: bool,
    pub(crate) kind: GraphicsKind,
}

impl GraphicsObject {
    pub(crate) fn new(base: ShadowBase, transform: Transform, selected: bool) -> Self {
        Self {
            base,
            transform,
            selected,
            kind: GraphicsKind::Mesh(MeshShadow::default()),
        }
    }

    /// Cached world transform.
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn kind(&self) -> &GraphicsKind {
        &self.kind
    }

    pub fn model(&self) -> Option<ModelHandle> {
        match &self.kind {
            GraphicsKind::Mesh(mesh) => mesh.model,
            _ => None,
        }
    }

    pub fn draw_order(&self) -> Option<i32> {
        match self.kind {
            GraphicsKind::Ui(ui) => Some(ui.draw_order),
            _ => None,
        }
    }
}

impl SystemObjectInterface for GraphicsObject {
    fn base(&self) -> &ShadowBase {
        &self.base
    }
}
