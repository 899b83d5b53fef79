use crate::ui::UiMessage;
use crate::SmartBinApp;

impl SmartBinApp {
    pub fn capture_from_camera(&mut self) {
        let Some(camera) = self.camera_controller.clone() else {
            self.set_status("No camera available");
            return;
        };
        if self.is_capturing {
            self.set_status("Camera busy");
            return;
        }

        self.is_capturing = true;
        let tx = self.ui_tx.clone();
        self.runtime.spawn(async move {
            let result = camera.capture_item().await.map_err(|e| e.to_string());
            let _ = tx.send(UiMessage::Captured(result));
        });
    }

    pub fn select_from_file(&mut self) {
        let picked = rfd::FileDialog::new()
            .set_title("Select an image of the item")
            .add_filter("Images", &["jpg", "jpeg", "png", "webp", "bmp", "gif"])
            .add_filter("All files", &["*"])
            .pick_file();

        let Some(path) = picked else {
            return;
        };

        log::info!("Selected file: {}", path.display());
        let capture = self.orchestrator.capture().clone();
        let tx = self.ui_tx.clone();
        self.runtime.spawn(async move {
            let result = capture.select_file(&path).await.map_err(|e| e.to_string());
            let _ = tx.send(UiMessage::FileSelected(result));
        });
    }

    pub fn has_camera(&self) -> bool {
        self.camera_controller
            .as_ref()
            .map(|camera| camera.is_available())
            .unwrap_or(false)
    }
}
