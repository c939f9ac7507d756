//! Core library for the Sound Playground engine.
//!
//! A [`UScene`] owns a hierarchy of [`UObject`] nodes. Each subsystem
//! (audio, graphics, physics) keeps its own shadow of the objects it cares
//! about and learns about transform changes through the scene's
//! [`EventBus`], never by polling. The [`Systems`] context holds one instance
//! of every subsystem and is passed explicitly wherever a scene mutation
//! needs to reach the shadows.

pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod graphics;
pub mod input;
pub mod physics;
pub mod scene;
pub mod service;
pub mod system;

pub use audio::{AudioFrame, AudioLink, AudioObject, AudioScene, AudioSink, AudioSystem, SilentSink};
pub use config::{AudioConfig, EngineConfig, GraphicsConfig, PhysicsConfig};
pub use engine::{Engine, FrameClock};
pub use error::{EngineError, Result};
pub use event::{EventBus, EventData, EventType, ObserverToken, PayloadKind};
pub use graphics::{
    GraphicsKind, GraphicsObject, GraphicsScene, GraphicsSystem, HeadlessRenderer, ModelHandle,
    RenderBackend, RenderFrame,
};
pub use input::{InputController, PointerEvent};
pub use physics::{CollisionShape, PhysicsObject, PhysicsScene, PhysicsSystem};
pub use scene::{ObjectId, SceneId, Transform, UObject, UScene};
pub use service::{RaycastHit, RaycastService, ServiceManager};
pub use system::{
    ShadowBase, ShadowKey, SystemInterface, SystemKind, SystemObjectInterface,
    SystemSceneInterface, Systems,
};
