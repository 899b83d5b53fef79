use anyhow::{Context, Result};
use eframe::egui;
use log::info;
use std::sync::Arc;

mod bin_actuator;
mod camera;
mod camera_controller;
mod capture;
mod classifier;
mod config;
mod error;
mod profile;
mod reward;
mod session;
mod texture;
mod ui;
mod workflow;

use crate::bin_actuator::create_actuator;
use crate::camera_controller::CameraController;
use crate::capture::CaptureStage;
use crate::classifier::HttpClassifier;
use crate::config::Config;
use crate::profile::ProfileClient;
use crate::reward::HttpRewardService;
use crate::session::{SessionClient, SessionStore};
use crate::ui::SmartBinApp;
use crate::workflow::{Collaborators, DisposalOrchestrator};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    info!("Starting SmartBin kiosk");

    // Load configuration
    let config = Config::load()?;
    config.create_directories()?;
    info!("Configuration loaded: {}x{} display", config.display.width, config.display.height);

    let client = reqwest::Client::builder()
        .build()
        .context("Failed to build HTTP client")?;

    let session_store = SessionStore::new(&config.paths.session_file);
    let session_client = Arc::new(SessionClient::new(
        client.clone(),
        &config.services.login_url,
        session_store.clone(),
    ));
    let profile_client = Arc::new(ProfileClient::new(client.clone(), &config.services.users_url));

    let orchestrator = DisposalOrchestrator::new(
        CaptureStage::new(),
        Collaborators {
            classifier: Arc::new(HttpClassifier::new(client.clone(), &config.services.classify_url)),
            rewards: Arc::new(HttpRewardService::new(client, &config.services.reward_url)),
            identity: Arc::new(session_store.clone()),
            actuator: Arc::from(create_actuator(&config.gpio)),
        },
    );

    // Initialize camera; the file picker still works without one
    let camera_controller = match CameraController::new(&config.camera) {
        Ok(camera) => {
            info!("Camera controller ready (available: {})", camera.is_available());
            Some(Arc::new(camera))
        }
        Err(e) => {
            log::warn!("Camera initialization failed: {}. Using file selection only.", e);
            None
        }
    };

    let (width, height) = (config.display.width as f32, config.display.height as f32);
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([width, height])
            .with_min_inner_size([width, height])
            .with_decorations(!config.display.fullscreen)
            .with_fullscreen(config.display.fullscreen),
        ..Default::default()
    };

    info!("Launching GUI application...");

    let runtime = tokio::runtime::Handle::current();
    eframe::run_native(
        "SmartBin Kiosk",
        options,
        Box::new(move |cc| {
            // Setup egui style for touch interface
            setup_touch_style(&cc.egui_ctx);

            Box::new(SmartBinApp::new(
                orchestrator,
                camera_controller,
                session_client,
                session_store,
                profile_client,
                &config,
                runtime,
            ))
        }),
    )
    .map_err(|e| anyhow::anyhow!("Failed to run application: {}", e))?;

    info!("Application shut down gracefully");
    Ok(())
}

fn setup_touch_style(ctx: &egui::Context) {
    let mut style = (*ctx.style()).clone();

    // Larger UI elements for touch interaction
    style.spacing.button_padding = egui::vec2(16.0, 12.0);
    style.spacing.item_spacing = egui::vec2(12.0, 8.0);
    style.spacing.window_margin = egui::Margin::same(16.0);

    style.text_styles.insert(
        egui::TextStyle::Button,
        egui::FontId::new(18.0, egui::FontFamily::Proportional),
    );
    style.text_styles.insert(
        egui::TextStyle::Body,
        egui::FontId::new(16.0, egui::FontFamily::Proportional),
    );
    style.text_styles.insert(
        egui::TextStyle::Heading,
        egui::FontId::new(28.0, egui::FontFamily::Proportional),
    );

    ctx.set_style(style);
}
