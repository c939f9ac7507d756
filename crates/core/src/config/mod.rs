use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{EngineError, Result};

/// Top-level configuration structure for the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub audio: AudioConfig,
    pub graphics: GraphicsConfig,
    pub physics: PhysicsConfig,
    /// Upper bound applied to every `dt` handed to [`crate::Engine::tick`].
    pub max_frame_delta: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            graphics: GraphicsConfig::default(),
            physics: PhysicsConfig::default(),
            max_frame_delta: 0.25,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Rejects values no subsystem can start with.
    pub fn validate(&self) -> Result<()> {
        self.audio.validate()?;
        self.graphics.validate()?;
        self.physics.validate()?;
        if !(self.max_frame_delta > 0.0) {
            return Err(EngineError::InvalidConfig(
                "max_frame_delta must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration specific to the audio subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub block_size: usize,
    pub channels: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            block_size: 1024,
            channels: 2,
        }
    }
}

impl AudioConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 || self.block_size == 0 || self.channels == 0 {
            return Err(EngineError::InvalidConfig(format!(
                "audio needs a non-zero sample rate, block size and channel count (got {}/{}/{})",
                self.sample_rate, self.block_size, self.channels
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
    pub field_of_view_degrees: f32,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            title: "Sound Playground".to_string(),
            width: 1280,
            height: 720,
            vsync: true,
            field_of_view_degrees: 60.0,
        }
    }
}

impl GraphicsConfig {
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(EngineError::InvalidConfig(format!(
                "window must have a non-zero size (got {}x{})",
                self.width, self.height
            )));
        }
        if !(self.field_of_view_degrees > 0.0 && self.field_of_view_degrees < 180.0) {
            return Err(EngineError::InvalidConfig(
                "field_of_view_degrees must lie in (0, 180)".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub max_ray_distance: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            max_ray_distance: 1000.0,
        }
    }
}

impl PhysicsConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.max_ray_distance > 0.0) {
            return Err(EngineError::InvalidConfig(
                "max_ray_distance must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config = EngineConfig::from_json_str(r#"{ "audio": { "sample_rate": 44100 } }"#)
            .expect("partial config should parse");

        assert_eq!(config.audio.sample_rate, 44_100);
        assert_eq!(config.audio.block_size, 1024);
        assert_eq!(config.graphics, GraphicsConfig::default());
    }

    #[test]
    fn rejects_zero_sample_rate() {
        let err = EngineConfig::from_json_str(r#"{ "audio": { "sample_rate": 0 } }"#).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }

    #[test]
    fn save_and_load_preserve_values() {
        let path = std::env::temp_dir().join(format!(
            "sound-playground-config-{}.json",
            std::process::id()
        ));
        let mut config = EngineConfig::default();
        config.graphics.width = 640;
        config.physics.max_ray_distance = 25.0;

        config.save(&path).unwrap();
        let loaded = EngineConfig::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded, config);
    }
}
