/*
 * @file device.rs
 * @brief Camera and sound effect collaborators
 * @author Kevin Thomas
 * @date 2025
 *
 * MIT License
 *
 * Copyright (c) 2025 Kevin Thomas
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */

//! Camera and speaker collaborators.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::audio;
use crate::config::CameraConfig;
use crate::services::{Camera, SoundPlayer};

/// Takes stills with an external capture program (`libcamera-still` by
/// default) into uniquely named files.
pub struct CommandCamera {
    config: CameraConfig,
    output_dir: PathBuf,
}

impl CommandCamera {
    pub fn new(config: &CameraConfig) -> Self {
        Self::with_output_dir(config, std::env::temp_dir())
    }

    pub fn with_output_dir(config: &CameraConfig, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            config: config.clone(),
            output_dir: output_dir.into(),
        }
    }

    fn capture_args(&self, output: &Path) -> Vec<String> {
        let mut args = vec![
            "-n".to_string(),
            "-t".to_string(),
            "1".to_string(),
            "--width".to_string(),
            self.config.width.to_string(),
            "--height".to_string(),
            self.config.height.to_string(),
        ];
        if self.config.vflip {
            args.push("--vflip".to_string());
        }
        if self.config.hflip {
            args.push("--hflip".to_string());
        }
        args.push("-o".to_string());
        args.push(output.display().to_string());
        args
    }
}

#[async_trait]
impl Camera for CommandCamera {
    async fn capture_image(&self) -> Result<PathBuf> {
        let output = self
            .output_dir
            .join(format!("intentbot-{}.jpg", Uuid::new_v4()));
        debug!(path = %output.display(), "capturing picture");
        let result = tokio::process::Command::new(&self.config.program)
            .args(self.capture_args(&output))
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.config.program))?;
        if !result.status.success() {
            bail!(
                "{} exited with {}: {}",
                self.config.program,
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            );
        }
        if !output.exists() {
            bail!("{} produced no picture", self.config.program);
        }
        Ok(output)
    }
}

/// Plays WAV sound effects on the default output device.
#[derive(Debug, Default)]
pub struct WavPlayer;

#[async_trait]
impl SoundPlayer for WavPlayer {
    async fn play(&self, path: &Path) -> Result<()> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || audio::play_wav(&path)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_args_follow_config() {
        let config = CameraConfig {
            vflip: true,
            ..CameraConfig::default()
        };
        let camera = CommandCamera::new(&config);
        assert_eq!(
            camera.capture_args(Path::new("/tmp/pic.jpg")),
            ["-n", "-t", "1", "--width", "960", "--height", "720", "--vflip", "-o", "/tmp/pic.jpg"]
        );
    }

    #[tokio::test]
    async fn missing_picture_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = CameraConfig {
            program: "true".to_string(),
            ..CameraConfig::default()
        };
        let camera = CommandCamera::with_output_dir(&config, dir.path());
        assert!(camera.capture_image().await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn capture_returns_written_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-still");
        std::fs::write(&script, "#!/bin/sh\nfor last; do :; done\necho jpeg > \"$last\"\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        let config = CameraConfig {
            program: script.display().to_string(),
            ..CameraConfig::default()
        };
        let camera = CommandCamera::with_output_dir(&config, dir.path());
        let picture = camera.capture_image().await.unwrap();
        assert!(picture.starts_with(dir.path()));
        assert_eq!(std::fs::read_to_string(picture).unwrap(), "jpeg\n");
    }

    #[tokio::test]
    async fn missing_sound_is_an_error() {
        let result = WavPlayer.play(Path::new("sounds/no-such-effect.wav")).await;
        assert!(result.is_err());
    }
}
