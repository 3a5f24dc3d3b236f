mod shared;
mod tui;
mod audio_api;
mod audio;
mod error;
mod hotkey;
mod loader;
mod middle;
mod pipeline;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use crossterm::event::{KeyboardEnhancementFlags, PushKeyboardEnhancementFlags};
use crossterm::terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing_subscriber::EnvFilter;

use audio::device::{default_candidate, valid_virtual_cable_candidates};
use audio::{CpalBackend, CpalRouter, PlaybackQueue};
use audio_api::{AudioDevice, DeviceSelection, RoutingWarning};
use loader::ClipLoader;
use middle::Middle;
use pipeline::ClipLibrary;
use shared::UiAction;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    // soundboard [root] [files to import...]
    let mut args = std::env::args().skip(1);
    let root: PathBuf = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
    let imports: Vec<PathBuf> = args.map(PathBuf::from).collect();
    std::fs::create_dir_all(&root)
        .with_context(|| format!("cannot create {}", root.display()))?;
    init_logging(&root)?;

    let mut library = ClipLibrary::open(&root).context("cannot load clip library")?;
    for path in &imports {
        if let Err(e) = library.import(path) {
            tracing::warn!(file = %path.display(), error = %e, "import failed");
        }
    }
    if let Err(e) = library.prune_missing() {
        tracing::warn!(error = %e, "could not save pruned library");
    }

    let queue = PlaybackQueue::new();
    let loader = ClipLoader::spawn(queue.clone()).context("cannot start clip loader")?;
    let mut middle = Middle::new(library, queue.clone(), loader);

    let mut router = CpalRouter::new(CpalBackend::new(), queue);
    let mut selection = DeviceSelection::default();
    if let Some(first) = default_candidate(&cable_candidates(&router)) {
        tracing::info!(device = %first.name, "first virtual cable candidate (Tab to select)");
    }
    let mut candidate_idx: Option<usize> = None;
    match router.start(&selection) {
        Ok(warnings) => show_warnings(&mut middle, &warnings),
        Err(e) => {
            tracing::error!(error = %e, "audio routing failed to start");
            middle.set_status(format!("audio routing failed: {e}"));
        }
    }

    terminal::enable_raw_mode()?;
    let _guard = RawModeGuard; // auto drops when out of scope
    // real press/release events where the terminal supports them; chords
    // depend on knowing when keys come up
    let enhanced = terminal::supports_keyboard_enhancement().unwrap_or(false);
    if enhanced {
        let _ = crossterm::execute!(
            std::io::stdout(),
            PushKeyboardEnhancementFlags(
                KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                    | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
                    | KeyboardEnhancementFlags::REPORT_ALL_KEYS_AS_ESCAPE_CODES
            )
        );
    } else {
        tracing::info!("terminal has no key release events, chords are per keystroke");
    }

    let backend = CrosstermBackend::new(std::io::stdout());
    let mut term = Terminal::new(backend)?;
    term.clear()?;

    let tick_rate = std::time::Duration::from_millis(16); // ~60fps
    let mut tui_state = tui::mode::TuiState {
        enhanced,
        ..Default::default()
    };

    'main: loop {
        let mut ds = middle.display_state();
        ds.router_state = format!("{:?}", router.state());
        ds.virtual_cable = router.devices().map(|d| d.virtual_cable.clone());

        term.draw(|frame| {
            tui::view::render(frame, frame.area(), &ds);
        })?;

        let keys = tui::input::poll_input(tick_rate)?;
        for action in middle.handle_keys(keys, &mut tui_state) {
            match action {
                UiAction::Quit => break 'main,
                UiAction::CycleVirtualCable => {
                    // the device list may have changed since the last look
                    let candidates = cable_candidates(&router);
                    if candidates.is_empty() {
                        middle.set_status("no virtual cables detected");
                        continue;
                    }
                    let next = candidate_idx.map_or(0, |i| (i + 1) % candidates.len());
                    candidate_idx = Some(next);
                    selection.virtual_cable = Some(candidates[next].name.clone());
                    match router.reconfigure(&selection) {
                        Ok(warnings) => {
                            middle.set_status(format!("virtual cable: {}", candidates[next].name));
                            show_warnings(&mut middle, &warnings);
                        }
                        Err(e) => middle.set_status(format!("routing stopped: {e}")),
                    }
                }
                _ => {}
            }
        }

        for err in router.report_write_errors() {
            middle.set_status(err.to_string());
        }
    }

    router.stop();
    drop(term);
    Ok(())
}

fn cable_candidates(router: &CpalRouter) -> Vec<AudioDevice> {
    match router.backend().registry().enumerate() {
        Ok(devices) => valid_virtual_cable_candidates(&devices),
        Err(e) => {
            tracing::warn!(error = %e, "cannot list audio devices");
            Vec::new()
        }
    }
}

fn show_warnings(middle: &mut Middle, warnings: &[RoutingWarning]) {
    if let Some(last) = warnings.last() {
        middle.set_status(last.to_string());
    }
}

// logs go to a file; the terminal belongs to the tui
fn init_logging(root: &Path) -> anyhow::Result<()> {
    let path = root.join(shared::LOG_FILE);
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("cannot open log file {}", path.display()))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

struct RawModeGuard;
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = crossterm::execute!(
            std::io::stdout(),
            crossterm::event::PopKeyboardEnhancementFlags
        );
        let _ = terminal::disable_raw_mode();
    }
}
