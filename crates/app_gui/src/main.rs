mod app;

use app::UiApp;
use eframe::{NativeOptions, egui};

fn main() {
    tracing_subscriber::fmt::init();
    let options = NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Thief Detection Application")
            .with_inner_size([760.0, 640.0]),
        ..Default::default()
    };
    if let Err(e) = eframe::run_native(
        "Thief Detection Application",
        options,
        Box::new(|cc| {
            egui_extras::install_image_loaders(&cc.egui_ctx);
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>(Box::new(UiApp::new(cc)))
        }),
    ) {
        eprintln!("Application stopped with error: {e}");
    }
}
