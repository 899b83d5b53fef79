use anyhow::{anyhow, Context, Result};
use image::{codecs::jpeg::JpegEncoder, ImageBuffer, RgbImage};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::capture::PendingItem;
use crate::config::CameraConfig;

/// Camera controller for the Raspberry Pi camera using libcamera
pub struct CameraController {
    width: u32,
    height: u32,
    /// JPEG quality (0-100)
    quality: u8,
    /// Temporary file path for captured stills
    temp_image_path: PathBuf,
    /// Whether rpicam-still or raspistill is available
    is_available: bool,
}

impl CameraController {
    pub fn new(config: &CameraConfig) -> Result<Self> {
        let mut controller = CameraController {
            width: config.width,
            height: config.height,
            quality: config.quality.min(100),
            temp_image_path: std::env::temp_dir().join("smartbin_capture.jpg"),
            is_available: false,
        };

        if config.enabled && cfg!(feature = "camera") {
            controller.initialize()?;
        } else {
            log::info!("Camera disabled, deposits use the file picker only");
        }
        Ok(controller)
    }

    /// Check whether rpicam-still (or legacy raspistill) can be run
    pub fn initialize(&mut self) -> Result<()> {
        log::info!("Initializing camera controller...");

        match Command::new("rpicam-still").arg("--help").output() {
            Ok(_) => {
                self.is_available = true;
                log::info!("Raspberry Pi Camera initialized successfully (using rpicam-still)");
            }
            Err(e) => {
                log::warn!("rpicam-still not found: {}", e);
                match Command::new("raspistill").arg("-?").output() {
                    Ok(_) => {
                        self.is_available = true;
                        log::info!("Raspberry Pi Camera initialized successfully (using legacy raspistill)");
                    }
                    Err(e) => {
                        log::error!("Camera initialization failed - neither rpicam-still nor raspistill found: {}", e);
                        self.is_available = false;
                    }
                }
            }
        }
        // Missing camera is not fatal; the kiosk falls back to file selection.
        Ok(())
    }

    pub fn is_available(&self) -> bool {
        self.is_available
    }

    /// Capture a still of the item and package it for classification.
    pub async fn capture_item(&self) -> Result<PendingItem> {
        let frame = if self.is_available {
            self.capture_still().await?
        } else {
            log::warn!("Camera not available - using test pattern");
            self.test_pattern()
        };

        let bytes = encode_jpeg(&frame, self.quality)?;
        let file_name = format!("capture_{}.jpg", chrono::Local::now().format("%Y%m%d_%H%M%S"));
        log::info!("Captured {} ({}x{}, {} bytes)", file_name, frame.width(), frame.height(), bytes.len());
        Ok(PendingItem::new(bytes, file_name, "image/jpeg"))
    }

    async fn capture_still(&self) -> Result<RgbImage> {
        let path = self.temp_image_path.clone();
        if path.exists() {
            let _ = tokio::fs::remove_file(&path).await;
        }

        let (width, height, quality) = (self.width, self.height, self.quality);
        let capture_path = path.clone();
        let success = tokio::task::spawn_blocking(move || run_capture(&capture_path, width, height, quality))
            .await
            .context("Camera capture task failed")?;

        if !success {
            return Err(anyhow!("Failed to capture image with camera"));
        }

        let frame = image::open(&path)
            .with_context(|| format!("Failed to load captured image: {}", path.display()))?
            .to_rgb8();
        let _ = tokio::fs::remove_file(&path).await;
        Ok(frame)
    }

    fn test_pattern(&self) -> RgbImage {
        ImageBuffer::from_fn(self.width, self.height, |x, y| {
            let r = (x * 255 / self.width) as u8;
            let g = (y * 255 / self.height) as u8;
            let b = ((x + y) * 255 / (self.width + self.height)) as u8;
            image::Rgb([r, g, b])
        })
    }

    /// Get current camera settings
    pub fn get_settings(&self) -> (u32, u32, u8) {
        (self.width, self.height, self.quality)
    }
}

fn run_capture(path: &Path, width: u32, height: u32, quality: u8) -> bool {
    let output = path.to_string_lossy().to_string();
    let (width, height, quality) = (width.to_string(), height.to_string(), quality.to_string());

    let args = [
        "-o", output.as_str(),
        "--width", width.as_str(),
        "--height", height.as_str(),
        "--quality", quality.as_str(),
        "--immediate",
        "--nopreview",
        "--timeout", "1000",
    ];
    log::info!("Capture command: rpicam-still {}", args.join(" "));

    match Command::new("rpicam-still").args(args).output() {
        Ok(result) if result.status.success() => return true,
        Ok(result) => {
            log::warn!("rpicam-still failed with status: {}", result.status);
            log::warn!("stderr: {}", String::from_utf8_lossy(&result.stderr));
        }
        Err(e) => log::warn!("rpicam-still command failed: {}", e),
    }

    log::warn!("Trying raspistill fallback...");
    match Command::new("raspistill")
        .args(["-o", output.as_str(), "-w", width.as_str(), "-h", height.as_str(), "-q", quality.as_str(), "-t", "1000", "-n"])
        .output()
    {
        Ok(result) if result.status.success() => true,
        Ok(result) => {
            log::error!("raspistill also failed: {}", result.status);
            false
        }
        Err(e) => {
            log::error!("raspistill command failed: {}", e);
            false
        }
    }
}

fn encode_jpeg(frame: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality.max(1))
        .encode_image(frame)
        .context("Failed to encode captured frame")?;
    Ok(bytes)
}

impl Drop for CameraController {
    fn drop(&mut self) {
        if self.temp_image_path.exists() {
            let _ = std::fs::remove_file(&self.temp_image_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disabled_camera() -> CameraController {
        CameraController::new(&CameraConfig {
            enabled: false,
            width: 64,
            height: 48,
            quality: 80,
        })
        .unwrap()
    }

    #[test]
    fn test_disabled_camera_is_unavailable() {
        let camera = disabled_camera();
        assert!(!camera.is_available());
        assert_eq!(camera.get_settings(), (64, 48, 80));
    }

    #[tokio::test]
    async fn test_capture_without_camera_yields_jpeg_item() {
        let camera = disabled_camera();
        let item = camera.capture_item().await.unwrap();

        assert_eq!(item.mime_type, "image/jpeg");
        assert!(item.file_name.starts_with("capture_"));
        let decoded = image::load_from_memory(&item.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }
}
