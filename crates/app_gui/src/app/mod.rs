//! Application controller: owns the session, spawns workers, and applies
//! their messages on the UI thread.

mod results;
mod settings;

use eframe::{App, CreationContext, Frame, egui};
use rfd::FileDialog;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;
use thief_core::{
    DeepFaceClient, DetectionError, DetectionEvent, DetectionReport, EmbeddingOutcome,
    FaceService, Gallery, MatchDriver, MatchSettings, Progress, ReferenceImage, Session,
    Settings, scan_candidates,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Panel {
    Detect,
    Settings,
}

/// Sent from worker threads; applied by [`UiApp::poll_worker`].
enum WorkerMessage {
    Detection {
        generation: u64,
        event: DetectionEvent,
    },
    Finished {
        generation: u64,
        result: Result<(DetectionReport, Gallery), DetectionError>,
    },
}

pub struct UiApp {
    session: Session,
    settings: Settings,
    pending_settings: Settings,
    service: Option<Arc<dyn FaceService>>,
    panel: Panel,
    tx: Sender<WorkerMessage>,
    rx: Receiver<WorkerMessage>,
    /// Bumped on reset so late messages from an abandoned run are dropped.
    generation: u64,
    /// Generation of a reset run whose worker has not exited yet.
    draining: Option<u64>,
    live_matches: usize,
    live_errors: usize,
    thumbs: HashMap<PathBuf, egui::TextureHandle>,
    app_version: &'static str,
}

impl UiApp {
    pub fn new(_cc: &CreationContext<'_>) -> Self {
        let settings = Settings::load();
        let (tx, rx) = channel();
        let mut app = Self {
            session: Session::default(),
            pending_settings: settings.clone(),
            settings,
            service: None,
            panel: Panel::Detect,
            tx,
            rx,
            generation: 0,
            draining: None,
            live_matches: 0,
            live_errors: 0,
            thumbs: HashMap::new(),
            app_version: env!("THIEF_FINDER_VERSION"),
        };
        app.connect_service();
        app
    }

    /// (Re)build the face service client from the current settings.
    fn connect_service(&mut self) {
        match DeepFaceClient::new(&self.settings) {
            Ok(client) => {
                tracing::info!(url = %self.settings.service_url, "face service configured");
                self.service = Some(Arc::new(client));
            }
            Err(e) => {
                tracing::error!("cannot configure face service: {e}");
                self.service = None;
                self.session.status = format!("Face service unavailable: {e}");
            }
        }
    }

    fn select_reference(&mut self, ctx: &egui::Context) {
        let Some(path) = FileDialog::new()
            .add_filter("Images", &["png", "jpg", "jpeg"])
            .pick_file()
        else {
            return;
        };
        let Some(service) = self.service.clone() else {
            self.session.status = "Face service unavailable; check settings.".to_string();
            return;
        };
        let repaint = ctx.clone();
        self.session.reference =
            ReferenceImage::select_with(path, service, move || repaint.request_repaint());
    }

    fn select_folder(&mut self) {
        let Some(dir) = FileDialog::new().pick_folder() else {
            return;
        };
        match scan_candidates(&dir) {
            Ok(set) => self.session.candidates = Some(set),
            Err(e) => {
                self.session.candidates = None;
                self.session.status = format!("Cannot read folder: {e}");
            }
        }
    }

    /// No run of ours, current or abandoned, is still on a worker.
    fn can_detect(&self) -> bool {
        !self.session.is_running() && self.draining.is_none()
    }

    fn start_detection(&mut self, ctx: &egui::Context) {
        if !self.can_detect() {
            return;
        }
        let Some(service) = self.service.clone() else {
            self.session.status = "Face service unavailable; check settings.".to_string();
            return;
        };

        let (job, cancel) = self.session.begin_run();
        self.thumbs.clear();
        self.live_matches = 0;
        self.live_errors = 0;
        self.session.status = "Detecting...".to_string();

        let driver = MatchDriver::new(service, MatchSettings::from(&self.settings));
        let thumb_size = self.settings.thumbnail_size;
        let generation = self.generation;
        let tx = self.tx.clone();
        let ctx = ctx.clone();
        thread::spawn(move || {
            let result = driver
                .run(&job, &cancel, |event| {
                    let _ = tx.send(WorkerMessage::Detection { generation, event });
                    ctx.request_repaint();
                })
                .map(|report| {
                    let gallery = Gallery::from_matches(&report.matches, thumb_size);
                    (report, gallery)
                });
            let _ = tx.send(WorkerMessage::Finished { generation, result });
            ctx.request_repaint();
        });
    }

    fn stop(&mut self) {
        self.session.cancel_run();
        self.session.status = "Stopping...".to_string();
    }

    fn reset(&mut self) {
        if self.session.is_running() {
            self.draining = Some(self.generation);
        }
        self.session.reset();
        self.generation += 1;
        self.thumbs.clear();
        self.live_matches = 0;
        self.live_errors = 0;
    }

    /// Drain worker messages. Only this thread touches display state.
    fn poll_worker(&mut self) {
        while let Ok(message) = self.rx.try_recv() {
            match message {
                WorkerMessage::Detection { generation, event } if generation == self.generation => {
                    self.apply_event(event);
                }
                WorkerMessage::Finished { generation, result } if generation == self.generation => {
                    match result {
                        Ok((report, gallery)) => {
                            self.session.finish_run(report, gallery);
                            self.thumbs.clear();
                        }
                        Err(e) => {
                            self.session.progress = Progress::default();
                            self.session.abort_run(e.to_string());
                        }
                    }
                }
                WorkerMessage::Finished { generation, .. } if Some(generation) == self.draining => {
                    tracing::debug!(generation, "abandoned run exited");
                    self.draining = None;
                }
                _ => tracing::debug!("dropping message from an abandoned run"),
            }
        }
    }

    fn apply_event(&mut self, event: DetectionEvent) {
        match event {
            DetectionEvent::Started { total } => self.session.progress = Progress::start(total),
            DetectionEvent::Progress { done, total } => self.session.progress.update(done, total),
            DetectionEvent::Matched(_) => self.live_matches += 1,
            DetectionEvent::CandidateFailed(_) => self.live_errors += 1,
        }
        if self.session.is_running() && !self.session.is_cancelling() {
            self.session.status = running_status(self.live_matches, self.live_errors);
        }
    }

    fn render_detect_panel(&mut self, ui: &mut egui::Ui) {
        let running = self.session.is_running();
        let ctx = ui.ctx().clone();

        ui.horizontal(|ui| {
            if ui
                .add_enabled(!running, egui::Button::new("Select Thief Image"))
                .clicked()
            {
                self.select_reference(&ctx);
            }
            ui.label(reference_label(self.session.reference.as_ref()));
        });
        if let Some(reference) = &self.session.reference {
            let uri = format!("file://{}", reference.path.display());
            ui.add(egui::Image::new(uri).max_size(egui::vec2(160.0, 160.0)));
        }

        ui.horizontal(|ui| {
            if ui
                .add_enabled(!running, egui::Button::new("Select Image Folder"))
                .clicked()
            {
                self.select_folder();
            }
            ui.label(match &self.session.candidates {
                Some(set) => format!("Folder: {} ({} images)", set.folder.display(), set.len()),
                None => "Folder: Not selected".to_string(),
            });
        });

        ui.add_space(6.0);
        ui.horizontal(|ui| {
            if ui
                .add_enabled(self.can_detect(), egui::Button::new("Detect Thief"))
                .on_disabled_hover_text("Waiting for the previous run to stop")
                .clicked()
            {
                self.start_detection(&ctx);
            }
            if ui.add_enabled(running, egui::Button::new("Stop")).clicked() {
                self.stop();
            }
            if ui.button("Reset").clicked() {
                self.reset();
            }
        });

        ui.add_space(6.0);
        let progress = self.session.progress;
        ui.add(
            egui::ProgressBar::new(progress.fraction())
                .text(progress.label())
                .animate(running),
        );
        if !self.session.status.is_empty() {
            ui.label(&self.session.status);
        }

        ui.separator();
        self.render_results(ui);
    }
}

fn reference_label(reference: Option<&ReferenceImage>) -> String {
    let Some(reference) = reference else {
        return "Thief Image: Not selected".to_string();
    };
    let state = match reference.embedding.try_get() {
        None => "extracting face...".to_string(),
        Some(EmbeddingOutcome::Ready(_)) => "face ready".to_string(),
        Some(EmbeddingOutcome::NoFace) => "no face found".to_string(),
        Some(EmbeddingOutcome::Failed(reason)) => format!("face service error: {reason}"),
    };
    format!("Thief Image: {} ({state})", reference.path.display())
}

fn running_status(matches: usize, errors: usize) -> String {
    match errors {
        0 => format!("Detecting... {matches} found so far"),
        n => format!("Detecting... {matches} found so far, {n} skipped"),
    }
}

impl App for UiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        self.poll_worker();

        egui::TopBottomPanel::top("top").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.selectable_value(&mut self.panel, Panel::Detect, "Detect");
                ui.selectable_value(&mut self.panel, Panel::Settings, "Settings");
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| match self.panel {
            Panel::Detect => self.render_detect_panel(ui),
            Panel::Settings => self.render_settings_panel(ui),
        });
    }
}
