use egui::{Context, TextureOptions};
use image::imageops::FilterType;
use crate::SmartBinApp;

/// Previews larger than this are downscaled before upload.
const MAX_PREVIEW_SIDE: u32 = 1024;

impl SmartBinApp {
    /// Mirror the pending item into the preview texture, dropping it once the
    /// workflow has consumed the selection.
    pub fn sync_preview_texture(&mut self, ctx: &Context) {
        let capture = self.orchestrator.capture();
        let key = capture.pending_key();
        if key == self.preview_source {
            return;
        }

        self.preview_source = key;
        let Some(item) = capture.pending_item() else {
            self.preview_texture = None;
            return;
        };

        let image = match image::load_from_memory(&item.bytes) {
            Ok(image) => image,
            Err(e) => {
                // Undecodable images still get sent; the classifier decides.
                log::warn!("Cannot preview {}: {}", item.file_name, e);
                self.preview_texture = None;
                return;
            }
        };

        let image = if image.width() > MAX_PREVIEW_SIDE || image.height() > MAX_PREVIEW_SIDE {
            image.resize(MAX_PREVIEW_SIDE, MAX_PREVIEW_SIDE, FilterType::Triangle)
        } else {
            image
        };
        let rgb = image.to_rgb8();
        if rgb.width() == 0 || rgb.height() == 0 {
            return;
        }

        let size = [rgb.width() as usize, rgb.height() as usize];
        let pixels = rgb.as_flat_samples();
        let color_image = egui::ColorImage::from_rgb(size, pixels.as_slice());

        match &mut self.preview_texture {
            Some(texture) => texture.set(color_image, TextureOptions::LINEAR),
            None => {
                let texture = ctx.load_texture("item_preview", color_image, TextureOptions::LINEAR);
                self.preview_texture = Some(texture);
            }
        }
    }
}
