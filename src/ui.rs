use std::sync::Arc;
use std::time::{Duration, Instant};
use eframe::egui;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};

use crate::camera_controller::CameraController;
use crate::capture::PendingItem;
use crate::config::{Config, BIN_OPEN_DURATION};
use crate::profile::{ProfileClient, Registration, UserProfile};
use crate::reward::RewardResult;
use crate::session::{IdentityResolver, Session, SessionClient, SessionStore};
use crate::workflow::{DisposalOrchestrator, InteractionView};

// ============================================================================
// CONSTANTS FOR UI STYLING - Easy to modify
// ============================================================================
const UI_PADDING: f32 = 20.0;
const DEPOSIT_BUTTON_RADIUS: f32 = 90.0;
const SMALL_BUTTON_RADIUS: f32 = 50.0;
const STATUS_MESSAGE_SECS: u64 = 3;

// ============================================================================
// BACKGROUND RESULTS
// ============================================================================

/// Results of async work started from the UI thread.
pub enum UiMessage {
    Captured(Result<PendingItem, String>),
    FileSelected(Result<(), String>),
    LoggedIn(Result<Session, String>),
    Registered(Result<(), String>),
    Profile(Result<UserProfile, String>),
}

// ============================================================================
// MAIN APP STRUCT
// ============================================================================

pub struct SmartBinApp {
    // Workflow
    pub orchestrator: DisposalOrchestrator,
    pub view_rx: watch::Receiver<InteractionView>,
    pub runtime: Handle,
    pub last_rewarded_cycle: u64,

    // Capture
    pub camera_controller: Option<Arc<CameraController>>,
    pub preview_texture: Option<egui::TextureHandle>,
    pub preview_source: Option<String>,
    pub is_capturing: bool,
    pub capture_dir: std::path::PathBuf,

    // Session and profile
    pub session_client: Arc<SessionClient>,
    pub session_store: SessionStore,
    pub profile_client: Arc<ProfileClient>,
    pub user_email: Option<String>,
    pub points: Option<i64>,
    pub login_email: String,
    pub login_password: String,
    pub is_logging_in: bool,
    pub show_registration: bool,
    pub registration: Registration,
    pub is_registering: bool,

    // Bin animation
    pub bin_opened_at: Option<Instant>,

    // Status popup
    pub status_message: Option<String>,
    pub status_message_time: Option<Instant>,

    pub ui_tx: mpsc::UnboundedSender<UiMessage>,
    pub ui_rx: mpsc::UnboundedReceiver<UiMessage>,
}

// ============================================================================
// INITIALIZATION
// ============================================================================

impl SmartBinApp {
    pub fn new(
        orchestrator: DisposalOrchestrator,
        camera_controller: Option<Arc<CameraController>>,
        session_client: Arc<SessionClient>,
        session_store: SessionStore,
        profile_client: Arc<ProfileClient>,
        config: &Config,
        runtime: Handle,
    ) -> Self {
        let (ui_tx, ui_rx) = mpsc::unbounded_channel();
        let view_rx = orchestrator.subscribe();
        let user_email = session_store.resolve();

        let app = Self {
            orchestrator,
            view_rx,
            runtime,
            last_rewarded_cycle: 0,
            camera_controller,
            preview_texture: None,
            preview_source: None,
            is_capturing: false,
            capture_dir: config.paths.capture_dir.clone(),
            session_client,
            session_store,
            profile_client,
            user_email,
            points: None,
            login_email: String::new(),
            login_password: String::new(),
            is_logging_in: false,
            show_registration: false,
            registration: Registration::default(),
            is_registering: false,
            bin_opened_at: None,
            status_message: None,
            status_message_time: None,
            ui_tx,
            ui_rx,
        };
        app.refresh_profile();
        app
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.status_message_time = Some(Instant::now());
    }

    fn busy(&self) -> bool {
        self.orchestrator.is_busy() || self.is_capturing
    }

    pub fn deposit(&mut self) {
        let _guard = self.runtime.enter();
        match self.orchestrator.deposit() {
            Ok(_) => log::info!("Deposit started"),
            Err(e) => self.set_status(e.to_string()),
        }
    }

    pub fn refresh_profile(&self) {
        let Some(email) = self.user_email.clone() else {
            return;
        };
        let client = Arc::clone(&self.profile_client);
        let tx = self.ui_tx.clone();
        self.runtime.spawn(async move {
            let result = client.fetch_profile(&email).await.map_err(|e| e.to_string());
            let _ = tx.send(UiMessage::Profile(result));
        });
    }

    fn login(&mut self) {
        self.is_logging_in = true;
        let client = Arc::clone(&self.session_client);
        let email = self.login_email.clone();
        let password = std::mem::take(&mut self.login_password);
        let tx = self.ui_tx.clone();
        self.runtime.spawn(async move {
            let result = client.login(&email, &password).await.map_err(|e| e.to_string());
            let _ = tx.send(UiMessage::LoggedIn(result));
        });
    }

    fn register(&mut self) {
        self.is_registering = true;
        let client = Arc::clone(&self.profile_client);
        let registration = self.registration.clone();
        let tx = self.ui_tx.clone();
        self.runtime.spawn(async move {
            let result = client.register(&registration).await.map_err(|e| e.to_string());
            let _ = tx.send(UiMessage::Registered(result));
        });
    }

    fn logout(&mut self) {
        if let Err(e) = self.session_client.logout() {
            log::error!("Logout failed: {}", e);
            self.set_status(e.to_string());
            return;
        }
        self.user_email = None;
        self.points = None;
        self.set_status("Logged out");
    }

    fn handle_ui_messages(&mut self, ctx: &egui::Context) {
        while let Ok(message) = self.ui_rx.try_recv() {
            match message {
                UiMessage::Captured(Ok(item)) => {
                    self.is_capturing = false;
                    self.archive_capture(&item);
                    self.orchestrator.capture().select_image(item);
                    self.set_status("Item captured - ready to deposit");
                }
                UiMessage::Captured(Err(e)) => {
                    self.is_capturing = false;
                    self.set_status(format!("Capture failed: {e}"));
                }
                UiMessage::FileSelected(Ok(())) => self.set_status("Image selected - ready to deposit"),
                UiMessage::FileSelected(Err(e)) => self.set_status(e),
                UiMessage::LoggedIn(Ok(session)) => {
                    self.is_logging_in = false;
                    self.set_status(format!("Welcome {}", session.user_email));
                    self.user_email = Some(session.user_email);
                    self.refresh_profile();
                }
                UiMessage::LoggedIn(Err(e)) => {
                    self.is_logging_in = false;
                    self.set_status(e);
                }
                UiMessage::Registered(Ok(())) => {
                    self.is_registering = false;
                    self.show_registration = false;
                    self.login_email = self.registration.email.trim().to_string();
                    self.registration = Registration::default();
                    self.set_status("Registration successful! You can now log in.");
                }
                UiMessage::Registered(Err(e)) => {
                    self.is_registering = false;
                    self.set_status(e);
                }
                UiMessage::Profile(Ok(profile)) => self.points = Some(profile.points),
                UiMessage::Profile(Err(e)) => log::warn!("Profile refresh failed: {}", e),
            }
        }
        self.sync_preview_texture(ctx);
    }

    /// Keep a copy of camera stills next to the kiosk for auditing.
    fn archive_capture(&self, item: &PendingItem) {
        let path = self.capture_dir.join(&item.file_name);
        if let Err(e) = std::fs::write(&path, &item.bytes) {
            log::warn!("Failed to archive capture to {}: {}", path.display(), e);
        }
    }

    fn track_workflow(&mut self) {
        let view = self.view_rx.borrow_and_update().clone();

        match (view.bin_open, self.bin_opened_at) {
            (true, None) => self.bin_opened_at = Some(Instant::now()),
            (false, Some(_)) => self.bin_opened_at = None,
            _ => {}
        }

        if let Some(RewardResult::Granted { .. }) = view.reward() {
            if view.cycle != self.last_rewarded_cycle {
                self.last_rewarded_cycle = view.cycle;
                self.refresh_profile();
            }
        }
    }
}

// ============================================================================
// MAIN UPDATE LOOP
// ============================================================================

impl eframe::App for SmartBinApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ESC key to exit (for maintenance in kiosk mode with keyboard)
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }

        self.handle_ui_messages(ctx);
        self.track_workflow();

        self.render_top_bar(ctx);
        self.render_main(ctx);
        self.render_registration(ctx);
        self.render_bin_overlay(ctx);
        self.render_status_message(ctx);

        // Workflow updates arrive from background tasks
        let interval = if self.busy() {
            Duration::from_millis(50)
        } else {
            Duration::from_millis(250)
        };
        ctx.request_repaint_after(interval);
    }
}

// ============================================================================
// RENDERING
// ============================================================================

impl SmartBinApp {
    fn render_top_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("account").show(ctx, |ui| {
            ui.horizontal(|ui| {
                match self.user_email.clone() {
                    Some(email) => {
                        ui.label(egui::RichText::new(email).strong());
                        if let Some(points) = self.points {
                            ui.label(format!("Points: {points}"));
                        }
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            if ui.button("Logout").clicked() {
                                self.logout();
                            }
                        });
                    }
                    None => {
                        ui.label("Email:");
                        ui.add(egui::TextEdit::singleline(&mut self.login_email).desired_width(220.0));
                        ui.label("Password:");
                        ui.add(
                            egui::TextEdit::singleline(&mut self.login_password)
                                .password(true)
                                .desired_width(160.0),
                        );
                        let can_login = !self.is_logging_in;
                        if ui.add_enabled(can_login, egui::Button::new("Login")).clicked() {
                            self.login();
                        }
                        if ui.button("Register").clicked() {
                            self.show_registration = true;
                        }
                    }
                }
            });
        });
    }

    fn render_registration(&mut self, ctx: &egui::Context) {
        if !self.show_registration || self.user_email.is_some() {
            return;
        }

        let mut open = true;
        egui::Window::new("Register")
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                egui::Grid::new("registration_fields").num_columns(2).show(ui, |ui| {
                    ui.label("Name");
                    ui.text_edit_singleline(&mut self.registration.name);
                    ui.end_row();
                    ui.label("Email");
                    ui.text_edit_singleline(&mut self.registration.email);
                    ui.end_row();
                    ui.label("Password");
                    ui.add(egui::TextEdit::singleline(&mut self.registration.password).password(true));
                    ui.end_row();
                    ui.label("Phone");
                    ui.text_edit_singleline(&mut self.registration.phone_number);
                    ui.end_row();
                });
                ui.add_space(8.0);
                if self.is_registering {
                    ui.spinner();
                } else if ui.button("Register").clicked() {
                    self.register();
                }
            });

        if !open {
            self.show_registration = false;
        }
    }

    fn render_main(&mut self, ctx: &egui::Context) {
        let view = self.view_rx.borrow().clone();
        let busy = self.busy();

        egui::CentralPanel::default().show(ctx, |ui| {
            let full_rect = ui.max_rect();
            ui.vertical_centered(|ui| {
                ui.heading("Dustbin Interaction");
                ui.add_space(8.0);

                let preview_rect = egui::Rect::from_center_size(
                    egui::pos2(full_rect.center().x - SMALL_BUTTON_RADIUS, full_rect.center().y),
                    egui::vec2(full_rect.width() * 0.5, full_rect.height() * 0.5),
                );
                self.render_preview(ui, preview_rect);

                if self.preview_source.is_some() && !busy {
                    ui.allocate_ui_at_rect(
                        egui::Rect::from_min_size(
                            egui::pos2(preview_rect.min.x, preview_rect.max.y + 8.0),
                            egui::vec2(preview_rect.width(), 40.0),
                        ),
                        |ui| {
                            if ui.button("Clear selection").clicked() {
                                self.orchestrator.capture().clear();
                            }
                        },
                    );
                }
            });

            self.render_messages(ui, &view, full_rect);
        });

        self.render_buttons(ctx, ctx.screen_rect(), busy);
    }

    fn render_preview(&self, ui: &mut egui::Ui, rect: egui::Rect) {
        ui.painter().rect_filled(rect, 8.0, egui::Color32::from_rgb(40, 40, 40));

        match &self.preview_texture {
            Some(texture) => {
                let display_size = fit_image_in_rect(texture.size_vec2(), rect.size());
                let centered_rect = center_rect_in_rect(display_size, rect);
                ui.allocate_ui_at_rect(centered_rect, |ui| {
                    ui.add(egui::Image::new(texture).fit_to_exact_size(display_size));
                });
            }
            None => {
                ui.allocate_ui_at_rect(rect, |ui| {
                    ui.centered_and_justified(|ui| {
                        ui.label("Take a picture or select an image of the item");
                    });
                });
            }
        }
    }

    fn render_messages(&self, ui: &mut egui::Ui, view: &InteractionView, rect: egui::Rect) {
        let top = rect.max.y - UI_PADDING * 6.0;
        let area = egui::Rect::from_min_max(egui::pos2(rect.min.x + UI_PADDING, top), rect.max);

        ui.allocate_ui_at_rect(area, |ui| {
            if view.state.is_busy() && !view.state.is_bin_open() {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("Processing...");
                });
            }
            let summary = view.summary();
            if !summary.is_empty() {
                let color = if view.reward_message.is_some() {
                    egui::Color32::from_rgb(80, 200, 80)
                } else {
                    ui.visuals().text_color()
                };
                ui.label(egui::RichText::new(summary).size(22.0).color(color));
            }
            if let Some(message) = &view.error_message {
                ui.label(
                    egui::RichText::new(format!("Error: {message}"))
                        .size(18.0)
                        .color(egui::Color32::from_rgb(220, 70, 70)),
                );
            }
        });
    }

    fn render_buttons(&mut self, ctx: &egui::Context, screen_rect: egui::Rect, busy: bool) {
        const SPACING: f32 = 20.0;

        let deposit_center = egui::pos2(
            screen_rect.max.x - DEPOSIT_BUTTON_RADIUS - SPACING,
            screen_rect.max.y - DEPOSIT_BUTTON_RADIUS - SPACING,
        );
        let upload_center = egui::pos2(
            screen_rect.max.x - SMALL_BUTTON_RADIUS - SPACING,
            deposit_center.y - DEPOSIT_BUTTON_RADIUS - SMALL_BUTTON_RADIUS - SPACING,
        );
        let camera_center = egui::pos2(
            upload_center.x,
            upload_center.y - SMALL_BUTTON_RADIUS * 2.0 - SPACING,
        );

        let deposit_label = if busy { "Processing..." } else { "Deposit Item" };
        let deposit_fill = if busy {
            egui::Color32::from_rgba_unmultiplied(70, 70, 80, 120)
        } else {
            egui::Color32::from_rgb(40, 120, 40)
        };

        egui::Area::new("deposit_btn")
            .fixed_pos(deposit_center - egui::vec2(DEPOSIT_BUTTON_RADIUS, DEPOSIT_BUTTON_RADIUS))
            .order(egui::Order::Foreground)
            .show(ctx, |ui| {
                if self.circular_button_styled(ui, DEPOSIT_BUTTON_RADIUS, deposit_label, deposit_fill) && !busy {
                    self.deposit();
                }
            });

        egui::Area::new("upload_btn")
            .fixed_pos(upload_center - egui::vec2(SMALL_BUTTON_RADIUS, SMALL_BUTTON_RADIUS))
            .order(egui::Order::Foreground)
            .show(ctx, |ui| {
                if self.circular_button(ui, SMALL_BUTTON_RADIUS, "Upload") && !busy {
                    self.select_from_file();
                }
            });

        if self.has_camera() {
            egui::Area::new("camera_btn")
                .fixed_pos(camera_center - egui::vec2(SMALL_BUTTON_RADIUS, SMALL_BUTTON_RADIUS))
                .order(egui::Order::Foreground)
                .show(ctx, |ui| {
                    if self.circular_button(ui, SMALL_BUTTON_RADIUS, "Camera") && !busy {
                        self.capture_from_camera();
                    }
                });
        }
    }

    fn render_bin_overlay(&self, ctx: &egui::Context) {
        let Some(opened_at) = self.bin_opened_at else {
            return;
        };
        let remaining = BIN_OPEN_DURATION.saturating_sub(opened_at.elapsed());
        let progress = remaining.as_secs_f32() / BIN_OPEN_DURATION.as_secs_f32();

        egui::Area::new("bin_open")
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .order(egui::Order::Tooltip)
            .show(ctx, |ui| {
                egui::Frame::none()
                    .fill(egui::Color32::from_rgb(30, 90, 30))
                    .rounding(12.0)
                    .inner_margin(egui::Margin::symmetric(40.0, 30.0))
                    .show(ui, |ui| {
                        ui.vertical_centered(|ui| {
                            ui.label(
                                egui::RichText::new("Bin open - drop your item in")
                                    .color(egui::Color32::WHITE)
                                    .size(28.0),
                            );
                            ui.add_space(12.0);
                            ui.add(
                                egui::ProgressBar::new(progress)
                                    .desired_width(320.0)
                                    .text(format!("{:.1}s", remaining.as_secs_f32())),
                            );
                        });
                    });
            });
    }

    fn render_status_message(&mut self, ctx: &egui::Context) {
        // Auto-hide message after a few seconds
        if let Some(message_time) = self.status_message_time {
            if message_time.elapsed().as_secs() > STATUS_MESSAGE_SECS {
                self.status_message = None;
                self.status_message_time = None;
            }
        }

        if let Some(ref message) = self.status_message {
            egui::Area::new("status_message")
                .anchor(egui::Align2::CENTER_TOP, egui::vec2(0.0, UI_PADDING * 3.0))
                .order(egui::Order::Tooltip)
                .show(ctx, |ui| {
                    egui::Frame::none()
                        .fill(egui::Color32::from_rgb(50, 50, 60))
                        .rounding(8.0)
                        .inner_margin(egui::Margin::symmetric(20.0, 15.0))
                        .show(ui, |ui| {
                            ui.label(
                                egui::RichText::new(message)
                                    .color(egui::Color32::WHITE)
                                    .size(20.0),
                            );
                        });
                });
        }
    }

    // ============================================================================
    // CIRCULAR BUTTON HELPERS
    // ============================================================================

    /// Basic circular button with default styling
    fn circular_button(&self, ui: &mut egui::Ui, radius: f32, text: &str) -> bool {
        self.circular_button_styled(ui, radius, text, egui::Color32::from_rgba_unmultiplied(70, 70, 80, 180))
    }

    /// Circular button with custom fill color
    fn circular_button_styled(&self, ui: &mut egui::Ui, radius: f32, text: &str, base_fill: egui::Color32) -> bool {
        let size = egui::vec2(radius * 2.0, radius * 2.0);
        let (rect, response) = ui.allocate_exact_size(size, egui::Sense::click());

        if ui.is_rect_visible(rect) {
            let painter = ui.painter();
            let center = rect.center();

            let (fill_color, stroke_color) = if response.is_pointer_button_down_on() {
                let r = base_fill.r().saturating_sub(30);
                let g = base_fill.g().saturating_sub(30);
                let b = base_fill.b().saturating_sub(30);
                (egui::Color32::from_rgb(r, g, b), egui::Color32::from_rgb(120, 120, 130))
            } else if response.hovered() {
                let r = base_fill.r().saturating_add(20);
                let g = base_fill.g().saturating_add(20);
                let b = base_fill.b().saturating_add(20);
                (egui::Color32::from_rgb(r, g, b), egui::Color32::from_rgb(150, 150, 160))
            } else {
                (base_fill, egui::Color32::from_rgb(100, 100, 110))
            };

            // Shadow for depth
            painter.circle(
                center + egui::vec2(3.0, 3.0),
                radius,
                egui::Color32::from_black_alpha(80),
                egui::Stroke::NONE,
            );
            painter.circle(center, radius, fill_color, egui::Stroke::new(3.0, stroke_color));

            let font_id = egui::FontId::proportional(radius / 4.0);
            let galley = painter.layout_no_wrap(text.to_string(), font_id, egui::Color32::WHITE);
            let text_pos = center - galley.size() / 2.0;
            painter.galley(text_pos, galley);

            if response.hovered() {
                ui.ctx().set_cursor_icon(egui::CursorIcon::PointingHand);
            }
        }

        response.clicked()
    }
}

// Helper functions for image centering
fn fit_image_in_rect(image_size: egui::Vec2, container_size: egui::Vec2) -> egui::Vec2 {
    let scale = (container_size.x / image_size.x).min(container_size.y / image_size.y);
    image_size * scale
}

fn center_rect_in_rect(content_size: egui::Vec2, container: egui::Rect) -> egui::Rect {
    let offset = (container.size() - content_size) * 0.5;
    egui::Rect::from_min_size(container.min + offset, content_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_image_keeps_aspect_ratio() {
        let fitted = fit_image_in_rect(egui::vec2(800.0, 600.0), egui::vec2(400.0, 400.0));
        assert_eq!(fitted, egui::vec2(400.0, 300.0));
    }

    #[test]
    fn test_center_rect() {
        let container = egui::Rect::from_min_size(egui::pos2(0.0, 0.0), egui::vec2(400.0, 400.0));
        let centered = center_rect_in_rect(egui::vec2(400.0, 300.0), container);
        assert_eq!(centered.min, egui::pos2(0.0, 50.0));
    }
}
