//! smartcam - terminal front end for the live detection viewer
//!
//! The main thread plays the UI thread:
//! 1. Applies line commands read from stdin (see `h`)
//! 2. Pumps capture worker events into the status line
//! 3. Optionally writes the latest annotated frame to a PNG snapshot

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::{BufRead, IsTerminal};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use smartcam::shell::{self, Command, Flow};
use smartcam::{
    AppConfig, AppController, Frame, FrameRenderer, ModelLoader, Notifier, Source,
};

#[path = "../ui.rs"]
mod ui;

const PUMP_INTERVAL: Duration = Duration::from_millis(30);
const STATUS_INTERVAL: Duration = Duration::from_secs(1);
const SNAPSHOT_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Parser, Debug)]
#[command(name = "smartcam", version, about = "Live object detection viewer")]
struct Args {
    /// Config file (TOML or JSON)
    #[arg(long, value_name = "PATH", env = "SMARTCAM_CONFIG")]
    config: Option<PathBuf>,

    /// Source to select at startup: file path, device index or stream URL
    #[arg(long, value_name = "SOURCE", conflicts_with_all = ["webcam", "stream"])]
    source: Option<String>,

    /// Use a webcam at startup (index defaults to the configured one)
    #[arg(long, value_name = "INDEX", num_args = 0..=1, conflicts_with = "stream")]
    webcam: Option<Option<u32>>,

    /// Use a network stream at startup (URL defaults to the configured one)
    #[arg(long, value_name = "URL", num_args = 0..=1)]
    stream: Option<Option<String>>,

    /// Detector profile label
    #[arg(long)]
    profile: Option<String>,

    /// Confidence slider position (5-90)
    #[arg(long, value_parser = clap::value_parser!(u32).range(5..=90))]
    confidence: Option<u32>,

    /// Write the latest annotated frame here
    #[arg(long, value_name = "PNG")]
    snapshot: Option<PathBuf>,

    /// Start a session right away
    #[arg(long)]
    autostart: bool,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

enum Input {
    Line(String),
    Eof,
    Interrupt,
}

struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn warning(&self, title: &str, message: &str) {
        log::warn!("{}: {}", title, message);
        eprintln!("[warning] {}\n{}", title, message);
    }

    fn error(&self, title: &str, message: &str) {
        log::error!("{}: {}", title, message);
        eprintln!("[error] {}\n{}", title, message);
    }
}

struct TerminalRenderer {
    snapshot: Option<PathBuf>,
    frames: u64,
    last_write: Option<Instant>,
}

impl TerminalRenderer {
    fn new(snapshot: Option<PathBuf>) -> Self {
        Self {
            snapshot,
            frames: 0,
            last_write: None,
        }
    }

    fn write_snapshot(&self, frame: &Frame) -> Result<()> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };
        frame
            .to_rgb_image()?
            .save(path)
            .with_context(|| format!("failed to write snapshot {}", path.display()))
    }
}

impl FrameRenderer for TerminalRenderer {
    fn render(&mut self, frame: &Frame) {
        self.frames += 1;
        // Still images produce one frame; always keep the first.
        let due = self
            .last_write
            .map_or(true, |at| at.elapsed() >= SNAPSHOT_INTERVAL);
        if self.snapshot.is_some() && due {
            if let Err(err) = self.write_snapshot(frame) {
                log::warn!("{:#}", err);
            }
            self.last_write = Some(Instant::now());
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let config = {
        let _stage = ui.stage("Load config");
        AppConfig::load_from(args.config.as_deref())?
    };
    // The terminal front end has no window to theme; report what resolved.
    if let Some(css) = config.load_stylesheet() {
        log::info!("stylesheet loaded ({} bytes)", css.len());
    }
    if let Some(icon) = config.icon_path() {
        log::info!("icon {}", icon.display());
    }
    let loader = ui::StagedLoader::new(ui.clone(), ModelLoader::default());
    let mut controller =
        AppController::from_config(&config, Box::new(loader), Box::new(TerminalNotifier))?;

    if let Some(profile) = &args.profile {
        controller.select_detector_profile(profile)?;
    }
    if let Some(position) = args.confidence {
        controller.set_confidence(position);
    }
    if let Some(source) = &args.source {
        controller.select_source(Source::parse(source));
    } else if let Some(index) = args.webcam {
        controller.use_webcam(index.unwrap_or(config.webcam_index));
    } else if let Some(url) = args.stream.clone() {
        controller.use_stream(url.unwrap_or_else(|| config.stream_url.clone()));
    }

    let (tx, rx) = mpsc::channel();
    {
        let tx = tx.clone();
        ctrlc::set_handler(move || {
            let _ = tx.send(Input::Interrupt);
        })
        .map_err(|e| anyhow!("failed to install Ctrl-C handler: {}", e))?;
    }
    thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(Input::Line(line)).is_err() {
                            return;
                        }
                    }
                    Err(err) => {
                        log::warn!("stdin read failed: {}", err);
                        break;
                    }
                }
            }
            let _ = tx.send(Input::Eof);
        })
        .context("failed to spawn stdin reader")?;

    println!("{}", controller.preview_text());
    println!("{}", controller.source_label());
    if args.autostart {
        let _ = controller.start_session();
    } else {
        println!("type h for commands");
    }

    let mut renderer = TerminalRenderer::new(args.snapshot.clone());
    let mut last_state = controller.status().state.clone();
    let mut last_status = Instant::now();
    let mut stdin_closed = false;

    loop {
        controller.pump_events(PUMP_INTERVAL, &mut renderer);

        let mut flow = Flow::Continue;
        while let Ok(input) = rx.try_recv() {
            match input {
                Input::Line(line) => match Command::parse(&line) {
                    Ok(command) => flow = shell::execute(&mut controller, &config, command),
                    Err(err) => eprintln!("{}", err),
                },
                Input::Eof => stdin_closed = true,
                Input::Interrupt => {
                    log::info!("interrupt received, stopping");
                    flow = Flow::Quit;
                }
            }
            if flow == Flow::Quit {
                break;
            }
        }
        if flow == Flow::Quit {
            break;
        }

        let status = controller.status();
        let state_changed = status.state != last_state;
        if state_changed || (controller.is_running() && last_status.elapsed() >= STATUS_INTERVAL)
        {
            println!("{}", status.line());
            last_state.clone_from(&status.state);
            last_status = Instant::now();
        }

        // Without a command stream, leave once the session has ended.
        if stdin_closed && !controller.is_running() && controller.live_session().is_none() {
            break;
        }
    }

    controller.stop_session();
    log::info!("smartcam exiting after {} frames", renderer.frames);
    Ok(())
}
