//! Angler CLI
//!
//! With the `desktop` feature this runs the automation against the primary
//! display, driven by the configured hotkey. Without it, it prints the loaded
//! parameters and catch history.

use std::path::Path;
use std::sync::Arc;

use angler::config::Settings;
use angler::game::records::{RecordStore, Scope};

const PARAMETER_FILE: &str = "parameters.json";
const RECORD_FILE: &str = "fish_records.txt";
#[cfg_attr(not(feature = "desktop"), allow(dead_code))]
const TEMPLATE_DIR: &str = "resources";

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = match Settings::load_or_default(Path::new(PARAMETER_FILE)) {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("Failed to load {}: {}", PARAMETER_FILE, e);
            log::warn!("Using default parameters");
            Settings::default()
        }
    };

    let records = Arc::new(RecordStore::open(RECORD_FILE));
    if let Err(e) = records.load() {
        log::warn!("Could not read {}: {}", RECORD_FILE, e);
    }

    print_summary(&settings, &records);

    #[cfg(feature = "desktop")]
    if let Err(e) = desktop::run(settings, records) {
        log::error!("Automation failed: {}", e);
        std::process::exit(1);
    }

    #[cfg(not(feature = "desktop"))]
    {
        println!();
        println!("Built without the `desktop` feature: no screen capture or input.");
        println!("Rebuild with `--features desktop` to run the automation.");
    }
}

fn print_summary(settings: &Settings, records: &RecordStore) {
    println!("Angler - fishing automation");
    println!("===========================");
    println!();
    println!("Current Configuration:");
    println!("  - Loop interval: {:.2}s", settings.loop_interval);
    println!("  - Cast: {:.2}s", settings.cast_duration);
    println!(
        "  - Reel: {:.2}s down / {:.2}s up, at most {} presses",
        settings.reel_down, settings.reel_up, settings.max_reel_attempts
    );
    println!("  - Resolution: {:?}", settings.resolution);
    println!("  - Jitter: {}%", settings.jitter_percent);
    println!("  - Hotkey: {}", settings.hotkey);
    println!("  - Overtime: {:?}", settings.overtime);
    println!(
        "  - Recording: {}, rare screenshots: {}",
        settings.record_enabled, settings.screenshot_on_rare
    );
    println!();

    let counts = records.count_by_quality(Scope::All);
    println!("Catch history: {} fish", counts.total());
    for (quality, share) in counts.percentages() {
        println!(
            "  - {}: {} ({:.1}%)",
            quality.label(),
            counts.get(quality),
            share
        );
    }
}

#[cfg(feature = "desktop")]
mod desktop {
    use std::error::Error;
    use std::io::BufRead;
    use std::path::Path;
    use std::sync::{mpsc, Arc};
    use std::thread;

    use angler::automation::run_coordinator;
    use angler::config::Settings;
    use angler::game::records::RecordStore;
    use angler::input::{spawn_listener, Actuator, EnigoInput, InputEvent};
    use angler::vision::capture::MonitorCapture;
    use angler::vision::{OcrAdapter, TemplateCache, TesseractOcr};
    use angler::{Angler, Providers};

    use super::{PARAMETER_FILE, TEMPLATE_DIR};

    pub fn run(settings: Settings, records: Arc<RecordStore>) -> Result<(), Box<dyn Error>> {
        let providers = Providers {
            capture: Arc::new(MonitorCapture::new()),
            actuator: Arc::new(Actuator::new(EnigoInput::new()?)),
            templates: Arc::new(TemplateCache::from_dir(TEMPLATE_DIR)),
            ocr: OcrAdapter::new(TesseractOcr::new()),
            records,
        };
        let hotkey = settings.hotkey.clone();
        let angler = Angler::new(settings, providers)?;

        let workers = angler.spawn_workers()?;
        let (events, inbox) = mpsc::channel();
        spawn_listener(angler.hotkey(), events.clone())?;

        // Typing `q` on stdin exits cleanly
        thread::Builder::new().name("stdin".into()).spawn(move || {
            let quit = std::io::stdin()
                .lock()
                .lines()
                .map_while(Result::ok)
                .any(|line| line.trim().eq_ignore_ascii_case("q"));
            if quit && events.send(InputEvent::Shutdown).is_err() {
                log::debug!("Coordinator already exited");
            }
        })?;

        log::info!("Press {} to start or stop fishing, type q to quit", hotkey);
        run_coordinator(&angler.run_control(), inbox);

        angler.shutdown();
        workers.join();

        if let Err(e) = angler.settings().save(Path::new(PARAMETER_FILE)) {
            log::warn!("Failed to save parameters: {}", e);
        }
        Ok(())
    }
}
