//! Settings panel rendering for the face service and match threshold.

use super::{Panel, UiApp};
use eframe::egui;
use thief_core::{RecognitionModel, Settings, config::DEFAULT_DISTANCE_THRESHOLD};

const DETECTOR_BACKENDS: [&str; 10] = [
    "opencv",
    "ssd",
    "dlib",
    "mtcnn",
    "retinaface",
    "mediapipe",
    "yolov8",
    "yunet",
    "centerface",
    "skip",
];

impl UiApp {
    /// Renders the settings screen: service endpoint, model and thresholds.
    pub(super) fn render_settings_panel(&mut self, ui: &mut egui::Ui) {
        let running = self.session.is_running();
        ui.heading("Settings");
        ui.add_space(8.0);

        ui.horizontal(|ui| {
            ui.label("Face service URL");
            ui.text_edit_singleline(&mut self.pending_settings.service_url);
        });
        ui.add_space(6.0);
        ui.horizontal(|ui| {
            ui.label("Recognition model");
            let selected = &mut self.pending_settings.model;
            egui::ComboBox::from_id_salt("model-select")
                .selected_text(selected.as_str())
                .show_ui(ui, |ui| {
                    for model in RecognitionModel::ALL {
                        ui.selectable_value(selected, model, model.as_str());
                    }
                });
        });
        ui.add_space(6.0);
        ui.horizontal(|ui| {
            ui.label("Face detector");
            let selected = &mut self.pending_settings.detector_backend;
            egui::ComboBox::from_id_salt("detector-select")
                .selected_text(selected.as_str())
                .show_ui(ui, |ui| {
                    for backend in DETECTOR_BACKENDS {
                        ui.selectable_value(selected, backend.to_string(), backend);
                    }
                });
        });

        ui.add_space(12.0);
        ui.horizontal(|ui| {
            ui.label("Match distance threshold");
            ui.add(
                egui::DragValue::new(&mut self.pending_settings.distance_threshold)
                    .range(0.0..=2.0)
                    .speed(0.001)
                    .max_decimals(4),
            );
            if ui.button("Default").clicked() {
                self.pending_settings.distance_threshold = DEFAULT_DISTANCE_THRESHOLD;
            }
        });
        ui.label(
            "A candidate matches only when its verification distance is at or below this value.",
        );
        ui.add_space(6.0);
        ui.horizontal(|ui| {
            ui.label("Request timeout (s, 0 = none)");
            ui.add(
                egui::DragValue::new(&mut self.pending_settings.request_timeout_secs)
                    .range(0..=3600)
                    .speed(1),
            );
        });
        ui.horizontal(|ui| {
            ui.label("Thumbnail size (px)");
            ui.add(
                egui::DragValue::new(&mut self.pending_settings.thumbnail_size)
                    .range(40..=400)
                    .speed(1),
            );
        });

        ui.add_space(12.0);
        ui.horizontal(|ui| {
            if ui.add_enabled(!running, egui::Button::new("Apply")).clicked() {
                self.apply_settings(false);
            }
            if ui
                .add_enabled(!running, egui::Button::new("Apply and save"))
                .clicked()
            {
                self.apply_settings(true);
            }
            if ui.button("Discard changes").clicked() {
                self.pending_settings = self.settings.clone();
            }
        });
        if running {
            ui.label("Settings can be applied once the current run has finished.");
        }
        if !self.session.status.is_empty() {
            ui.label(&self.session.status);
        }

        ui.add_space(16.0);
        ui.separator();
        ui.add_space(6.0);
        ui.heading("Version");
        ui.label(format!("App version: {}", self.app_version));
    }

    fn apply_settings(&mut self, save: bool) {
        let changed_service = service_changed(&self.settings, &self.pending_settings);
        self.settings = self.pending_settings.clone();
        if changed_service {
            self.connect_service();
        }
        self.session.status = if save {
            match self.settings.save() {
                Ok(path) => format!("Settings saved to {}", path.display()),
                Err(e) => {
                    tracing::warn!("saving settings failed: {e}");
                    format!("Settings applied but not saved: {e}")
                }
            }
        } else {
            "Settings applied.".to_string()
        };
        self.panel = Panel::Detect;
    }
}

/// Whether the face client must be rebuilt for `next`.
fn service_changed(current: &Settings, next: &Settings) -> bool {
    current.service_url != next.service_url
        || current.model != next.model
        || current.detector_backend != next.detector_backend
        || current.request_timeout_secs != next.request_timeout_secs
}
