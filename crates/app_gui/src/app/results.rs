//! Matched-image thumbnails and the zip download.

use super::UiApp;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use eframe::egui;
use rfd::FileDialog;
use std::path::Path;
use thief_core::{ArchiveOutcome, export_archive};

impl UiApp {
    fn thumb_texture(
        &mut self,
        ctx: &egui::Context,
        path: &Path,
        thumb: &image::RgbaImage,
    ) -> egui::TextureId {
        if let Some(tex) = self.thumbs.get(path) {
            return tex.id();
        }
        let (w, h) = thumb.dimensions();
        let color =
            egui::ColorImage::from_rgba_unmultiplied([w as usize, h as usize], thumb.as_raw());
        let name = format!("thumb:{}", path.display());
        let tex = ctx.load_texture(name, color, egui::TextureOptions::LINEAR);
        let id = tex.id();
        self.thumbs.insert(path.to_path_buf(), tex);
        id
    }

    pub(super) fn render_results(&mut self, ui: &mut egui::Ui) {
        let running = self.session.is_running();
        ui.horizontal(|ui| {
            ui.heading(format!("Matches: {}", self.session.gallery.len()));
            if ui
                .add_enabled(!running, egui::Button::new("Download Matches"))
                .clicked()
            {
                self.download();
            }
        });
        if self.session.gallery.is_empty() {
            return;
        }

        ui.add_space(6.0);
        let ctx = ui.ctx().clone();
        let side = self.settings.thumbnail_size as f32;
        let gallery = std::mem::take(&mut self.session.gallery);
        egui::ScrollArea::vertical()
            .auto_shrink([false; 2])
            .show(ui, |ui| {
                ui.horizontal_wrapped(|ui| {
                    for entry in gallery.entries() {
                        let (resp, painter) =
                            ui.allocate_painter(egui::vec2(side, side), egui::Sense::click());
                        let r = resp.rect;
                        match &entry.thumbnail {
                            Some(thumb) => {
                                let id = self.thumb_texture(&ctx, &entry.path, thumb);
                                let (w, h) = thumb.dimensions();
                                let uv = egui::Rect::from_min_max(
                                    egui::pos2(0.0, 0.0),
                                    egui::pos2(1.0, 1.0),
                                );
                                painter.image(id, fit_rect(r, w, h), uv, egui::Color32::WHITE);
                            }
                            None => {
                                painter.rect_filled(r, 4.0, egui::Color32::from_gray(40));
                                painter.rect_stroke(
                                    r,
                                    4.0,
                                    egui::Stroke::new(1.0, egui::Color32::DARK_GRAY),
                                    egui::StrokeKind::Inside,
                                );
                            }
                        }
                        let resp = resp.on_hover_text(format!(
                            "{}\ndistance {:.4}",
                            entry.path.display(),
                            entry.distance
                        ));
                        resp.context_menu(|ui| {
                            if ui.button("Copy path").clicked() {
                                self.copy_path(&entry.path);
                                ui.close();
                            }
                        });
                    }
                });
            });
        self.session.gallery = gallery;
    }

    fn copy_path(&mut self, path: &Path) {
        match copy_to_clipboard(&path.display().to_string()) {
            Ok(()) => self.session.status = format!("Copied {}", path.display()),
            Err(e) => {
                tracing::warn!("{e:#}");
                self.session.status = format!("Cannot copy path: {e:#}");
            }
        }
    }

    fn download(&mut self) {
        let matches = self.session.match_paths();
        if matches.is_empty() {
            self.session.status = ArchiveOutcome::NothingToDownload.message();
            return;
        }
        let Some(dest) = FileDialog::new()
            .add_filter("Zip", &["zip"])
            .set_file_name(default_archive_name(Local::now()))
            .save_file()
        else {
            return;
        };
        self.session.status = match export_archive(&matches, &dest) {
            Ok(outcome) => outcome.message(),
            Err(e) => {
                tracing::error!("download failed: {e:#}");
                format!("Download failed: {e:#}")
            }
        };
    }
}

fn copy_to_clipboard(text: &str) -> Result<()> {
    let mut clipboard = arboard::Clipboard::new().context("clipboard unavailable")?;
    clipboard
        .set_text(text.to_string())
        .context("clipboard rejected text")?;
    Ok(())
}

fn default_archive_name(now: DateTime<Local>) -> String {
    now.format("thief_matches_%Y%m%d_%H%M%S.zip").to_string()
}

/// Largest rect with the image's aspect ratio centred inside `outer`.
fn fit_rect(outer: egui::Rect, w: u32, h: u32) -> egui::Rect {
    if w == 0 || h == 0 {
        return outer;
    }
    let scale = (outer.width() / w as f32).min(outer.height() / h as f32);
    let size = egui::vec2(w as f32 * scale, h as f32 * scale);
    egui::Rect::from_center_size(outer.center(), size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[test]
    fn archive_name_carries_timestamp() {
        let now = Local.with_ymd_and_hms(2026, 3, 7, 14, 5, 9).unwrap();
        assert_eq!(default_archive_name(now), "thief_matches_20260307_140509.zip");
    }

    #[rstest]
    #[case(200, 100, egui::vec2(100.0, 50.0))]
    #[case(50, 100, egui::vec2(50.0, 100.0))]
    #[case(10, 10, egui::vec2(100.0, 100.0))]
    fn fit_rect_keeps_aspect(#[case] w: u32, #[case] h: u32, #[case] expected: egui::Vec2) {
        let outer = egui::Rect::from_min_size(egui::pos2(0.0, 0.0), egui::vec2(100.0, 100.0));
        let fitted = fit_rect(outer, w, h);
        assert_eq!(fitted.size(), expected);
        assert_eq!(fitted.center(), outer.center());
    }

    #[test]
    fn fit_rect_handles_empty_image() {
        let outer = egui::Rect::from_min_size(egui::pos2(5.0, 5.0), egui::vec2(40.0, 40.0));
        assert_eq!(fit_rect(outer, 0, 10), outer);
    }
}
