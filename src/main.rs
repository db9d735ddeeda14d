// GUI-subsystem binary on Windows: no console window is allocated.
// CLI mode (--output/-o present) attaches to the launching terminal so
// println!/eprintln! reach it.
#![cfg_attr(not(test), windows_subsystem = "windows")]

mod app;
mod components;

use app::PfpComposerApp;
use eframe::egui;
use pfp_composer::cli::{self, CliArgs};
use pfp_composer::logger;
use pfp_composer::settings::AppSettings;

fn main() -> Result<(), eframe::Error> {
    // -- CLI / headless mode ---------------------------------------------
    if CliArgs::is_cli_mode() {
        #[cfg(target_os = "windows")]
        attach_parent_console();

        use clap::Parser;
        let args = CliArgs::parse();
        let code = cli::run(args);
        std::process::exit(if code == std::process::ExitCode::SUCCESS {
            0
        } else {
            1
        });
    }

    // -- GUI mode -----------------------------------------------------

    // Initialize session log (overwrites previous session log)
    logger::init();

    let settings = AppSettings::load();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1180.0, 760.0])
            .with_min_inner_size([720.0, 480.0])
            .with_title("PFP Composer"),
        ..Default::default()
    };

    eframe::run_native(
        "PFP Composer",
        options,
        Box::new(move |cc| Box::new(PfpComposerApp::new(cc, settings))),
    )
}

#[cfg(target_os = "windows")]
fn attach_parent_console() {
    unsafe extern "system" {
        fn AttachConsole(dwProcessId: u32) -> i32;
    }
    const ATTACH_PARENT_PROCESS: u32 = 0xFFFF_FFFF;
    unsafe {
        AttachConsole(ATTACH_PARENT_PROCESS);
    }
}
