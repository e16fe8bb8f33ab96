use std::process::ExitCode;

use eframe::egui;

use maskpaint::app::MaskPaintApp;
use maskpaint::{cli, log_err, logger};

fn main() -> ExitCode {
    // -- CLI / headless mode ---------------------------------------------
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        let args = cli::CliArgs::parse();
        return cli::run(args);
    }

    // -- GUI mode ----------------------------------------------------------

    // Initialize session log (overwrites previous session log)
    logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 800.0])
            .with_title("MaskPaint"),
        ..Default::default()
    };

    match eframe::run_native(
        "MaskPaint",
        options,
        Box::new(|cc| Box::new(MaskPaintApp::new(cc))),
    ) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log_err!("window creation failed: {}", e);
            eprintln!("error: could not create the application window: {}", e);
            ExitCode::FAILURE
        }
    }
}
