use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use glam::Vec3;
use sound_playground_core::{
    CollisionShape, Engine, EngineConfig, ObjectId, PointerEvent, RaycastHit, SceneId,
    SystemInterface, SystemSceneInterface,
};
use tracing_subscriber::EnvFilter;

fn main() -> sound_playground_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Demo { frames, dt, config } => run_demo(frames, dt, config.as_deref()),
        Commands::Config { output } => write_default_config(&output),
    }
}

fn run_demo(frames: u32, dt: f32, config: Option<&Path>) -> sound_playground_core::Result<()> {
    let config = match config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    tracing::info!(frames, dt, "starting demo");

    let mut engine = Engine::new(config)?;
    let sid = engine.create_scene("playground");
    let stage = build_stage(&mut engine, sid)?;

    for frame in 0..frames {
        engine.tick(dt)?;
        if frame % 30 == 0 {
            log_doppler(&engine, sid, &stage);
        }
    }
    log_line_of_sight(&engine, sid, &stage);

    // Spawn a second speaker from the "UI" and drop it onto the floor.
    let spawned = spawn_speaker(&mut engine, sid, "spawned", Vec3::new(0.0, 2.0, 0.0))?;
    engine.handle_input(sid, PointerEvent::Spawned(spawned))?;
    let pointer = PointerEvent::Moved {
        origin: Vec3::new(1.5, 10.0, -2.0),
        direction: Vec3::NEG_Y,
    };
    if let Some(hit) = engine.handle_input(sid, pointer)? {
        tracing::info!(point = ?hit.point, "spawned speaker placed");
    }
    engine.handle_input(
        sid,
        PointerEvent::Pressed {
            origin: Vec3::ZERO,
            direction: Vec3::NEG_Z,
        },
    )?;
    engine.tick(dt)?;

    tracing::info!(
        frames = engine.clock().frame,
        seconds = engine.clock().time_seconds,
        graphics_frames = engine.systems().graphics.frames_submitted(),
        audio_frames = engine.systems().audio.frames_mixed(),
        "demo finished"
    );

    engine.remove_scene(sid)?;
    engine.shutdown();
    Ok(())
}

/// Objects the demo keeps an eye on.
struct Stage {
    listener: ObjectId,
    speaker: ObjectId,
}

fn build_stage(engine: &mut Engine, sid: SceneId) -> sound_playground_core::Result<Stage> {
    let listener = {
        let (scene, systems) = engine.split_mut(sid)?;

        let floor = scene.create_object("floor", None)?;
        scene.set_position(systems, floor, Vec3::new(0.0, -0.5, 0.0))?;
        systems.physics.create_system_scene(sid).set_physics_mesh(
            scene,
            floor,
            "meshes/floor.col",
            CollisionShape::Box {
                half_extents: Vec3::new(20.0, 0.5, 20.0),
            },
        )?;
        systems.graphics.create_system_scene(sid).set_mesh(
            scene,
            floor,
            "meshes/floor.obj",
            Some("concrete".to_string()),
        )?;

        let listener = scene.create_object("listener", None)?;
        scene.set_position(systems, listener, Vec3::new(0.0, 1.7, 6.0))?;
        systems.graphics.create_system_scene(sid).add_camera(scene, listener)?;
        systems
            .audio
            .create_system_scene(sid)
            .add_system_object(scene, listener)?;

        let panel = scene.create_object("panel", None)?;
        scene.set_draw_order(systems, panel, 1)?;
        systems.graphics.create_system_scene(sid).add_ui(scene, panel)?;

        // Drawn under the panel.
        let legend = scene.create_object("legend", None)?;
        scene.set_draw_order(systems, legend, 0)?;
        systems.graphics.create_system_scene(sid).add_ui(scene, legend)?;
        listener
    };

    let speaker = spawn_speaker(engine, sid, "speaker", Vec3::new(-8.0, 1.0, 0.0))?;

    let (scene, systems) = engine.split_mut(sid)?;
    systems
        .audio
        .create_system_scene(sid)
        .connect(scene, speaker, listener)?;
    scene.set_velocity(systems, speaker, Vec3::new(4.0, 0.0, 0.0))?;

    Ok(Stage { listener, speaker })
}

fn spawn_speaker(
    engine: &mut Engine,
    sid: SceneId,
    name: &str,
    position: Vec3,
) -> sound_playground_core::Result<ObjectId> {
    let (scene, systems) = engine.split_mut(sid)?;
    let speaker = scene.create_object(name, None)?;
    scene.set_position(systems, speaker, position)?;

    // A child cone so the speaker's rotation is visible in the hierarchy.
    let cone = scene.create_object(format!("{name}-cone"), Some(speaker))?;
    scene.set_position(systems, cone, Vec3::new(0.0, 0.0, -0.3))?;

    systems
        .audio
        .create_system_scene(sid)
        .add_system_object(scene, speaker)?;
    systems
        .graphics
        .create_system_scene(sid)
        .set_mesh(scene, speaker, "meshes/speaker.obj", Some("wood".to_string()))?;
    systems
        .graphics
        .create_system_scene(sid)
        .set_mesh(scene, cone, "meshes/cone.obj", Some("paper".to_string()))?;
    systems.physics.create_system_scene(sid).set_physics_mesh(
        scene,
        speaker,
        "meshes/speaker.col",
        CollisionShape::Sphere { radius: 0.5 },
    )?;
    Ok(speaker)
}

fn log_doppler(engine: &Engine, sid: SceneId, stage: &Stage) {
    let (Some(scene), Some(audio)) = (
        engine.scene(sid),
        engine.systems().audio.find_system_scene(sid),
    ) else {
        return;
    };
    let position = scene
        .object(stage.speaker)
        .map(|object| object.world().position);
    tracing::info!(
        time = engine.clock().time_seconds,
        ?position,
        outgoing = ?audio.output_doppler(scene, stage.speaker, stage.listener),
        incoming = ?audio.input_doppler(scene, stage.listener, stage.speaker),
        "speaker passing listener"
    );
}

/// First hit along the ray from the listener towards the speaker.
fn line_of_sight(engine: &Engine, sid: SceneId, stage: &Stage) -> Option<RaycastHit> {
    let scene = engine.scene(sid)?;
    let position = |id: ObjectId| scene.object(id).map(|object| object.world().position);
    let listener = position(stage.listener)?;
    let speaker = position(stage.speaker)?;
    engine
        .systems()
        .services()
        .raycast(sid, listener, speaker - listener)
}

fn log_line_of_sight(engine: &Engine, sid: SceneId, stage: &Stage) {
    match line_of_sight(engine, sid, stage) {
        Some(hit) => tracing::info!(
            object = ?hit.object,
            speaker_hit = hit.object == stage.speaker,
            point = ?hit.point,
            distance = hit.distance,
            "line of sight from listener"
        ),
        None => tracing::info!("listener has no line of sight"),
    }
}

fn write_default_config(output: &Path) -> sound_playground_core::Result<()> {
    tracing::info!(?output, "writing default configuration");
    EngineConfig::default().save(output)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Sound Playground engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a headless scene with a moving speaker passing a listener.
    Demo {
        /// Number of frames to simulate.
        #[arg(short, long, default_value_t = 120)]
        frames: u32,
        /// Seconds per frame.
        #[arg(long, default_value_t = 1.0 / 60.0)]
        dt: f32,
        /// Optional engine configuration file (JSON).
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Write the default engine configuration to a file.
    Config {
        /// Destination path for the JSON configuration.
        output: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_layers_two_panels_by_draw_order() {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        let sid = engine.create_scene("stage");
        build_stage(&mut engine, sid).unwrap();

        let scene = engine.scene(sid).unwrap();
        let names: Vec<&str> = engine
            .systems()
            .graphics
            .find_system_scene(sid)
            .unwrap()
            .ui_draw_list()
            .into_iter()
            .map(|id| scene.object(id).unwrap().name())
            .collect();
        assert_eq!(names, vec!["legend", "panel"]);
    }

    #[test]
    fn listener_sees_the_moving_speaker() {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        let sid = engine.create_scene("stage");
        let stage = build_stage(&mut engine, sid).unwrap();
        for _ in 0..30 {
            engine.tick(1.0 / 60.0).unwrap();
        }

        let hit = line_of_sight(&engine, sid, &stage).unwrap();
        assert_eq!(hit.object, stage.speaker);

        let scene = engine.scene(sid).unwrap();
        let listener = scene.object(stage.listener).unwrap().world().position;
        let speaker = scene.object(stage.speaker).unwrap().world().position;
        assert!((hit.distance - (listener.distance(speaker) - 0.5)).abs() < 1e-3);
    }
}
