//! Line commands for the terminal front end.
//!
//! Each command maps one-to-one onto a UI action of the viewer: the keyboard
//! shortcuts (space, O, W) become an empty line, `o` and `w`.

use std::path::PathBuf;

use anyhow::{anyhow, Result};

use crate::config::AppConfig;
use crate::controller::AppController;

pub const HELP: &str = "\
commands:
  o <path>      open an image or video file
  w [index]     use webcam (default from config)
  n [url]       use network stream (default from config)
  p <profile>   select detector profile by label or number
  l             list detector profiles
  c <5..90>     set confidence slider position
  s             start
  x             stop
  <empty>       toggle start/stop
  i             print status
  h             help
  q             quit";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    OpenFile(PathBuf),
    Webcam(Option<u32>),
    Stream(Option<String>),
    Profile(String),
    ListProfiles,
    Confidence(u32),
    Start,
    Stop,
    Toggle,
    Status,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (verb, arg) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        let arg = (!arg.is_empty()).then_some(arg);

        let command = match (verb, arg) {
            ("", _) => Command::Toggle,
            ("o", Some(path)) => Command::OpenFile(PathBuf::from(path)),
            ("o", None) => return Err(anyhow!("usage: o <path>")),
            ("w", None) => Command::Webcam(None),
            ("w", Some(index)) => Command::Webcam(Some(
                index
                    .parse()
                    .map_err(|_| anyhow!("webcam index must be a number, got '{}'", index))?,
            )),
            ("n", url) => Command::Stream(url.map(str::to_string)),
            ("p", Some(profile)) => Command::Profile(profile.to_string()),
            ("p", None) => return Err(anyhow!("usage: p <profile>")),
            ("l", None) => Command::ListProfiles,
            ("c", Some(position)) => Command::Confidence(
                position
                    .parse()
                    .map_err(|_| anyhow!("confidence must be 5..90, got '{}'", position))?,
            ),
            ("c", None) => return Err(anyhow!("usage: c <5..90>")),
            ("s", None) => Command::Start,
            ("x", None) => Command::Stop,
            ("i", None) => Command::Status,
            ("h" | "?", None) => Command::Help,
            ("q", None) => Command::Quit,
            _ => return Err(anyhow!("unknown command '{}', try h", line)),
        };
        Ok(command)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Apply one command. Session failures are already reported by the
/// controller's notifier, so they do not end the shell.
pub fn execute(controller: &mut AppController, config: &AppConfig, command: Command) -> Flow {
    match command {
        Command::OpenFile(path) => {
            controller.open_file(path);
            println!("{}", controller.source_label());
        }
        Command::Webcam(index) => {
            controller.use_webcam(index.unwrap_or(config.webcam_index));
            println!("{}", controller.source_label());
        }
        Command::Stream(url) => {
            controller.use_stream(url.unwrap_or_else(|| config.stream_url.clone()));
            println!("{}", controller.source_label());
        }
        Command::Profile(profile) => {
            if let Err(err) = select_profile(controller, &profile) {
                eprintln!("{}", err);
            }
        }
        Command::ListProfiles => {
            let selected = controller.selected_profile().map(|p| p.label.clone());
            for (index, label) in controller.profile_labels().into_iter().enumerate() {
                let marker = if selected.as_deref() == Some(label) { '*' } else { ' ' };
                println!("{} {}: {}", marker, index + 1, label);
            }
        }
        Command::Confidence(position) => {
            controller.set_confidence(position);
            println!("Confidence: {}", controller.confidence_label());
        }
        Command::Start => {
            let _ = controller.start_session();
        }
        Command::Stop => {
            controller.stop_session();
            println!("{}", controller.preview_text());
        }
        Command::Toggle => {
            let was_running = controller.is_running();
            let _ = controller.toggle_session();
            if was_running {
                println!("{}", controller.preview_text());
            }
        }
        Command::Status => println!("{}", controller.status().line()),
        Command::Help => println!("{}", HELP),
        Command::Quit => return Flow::Quit,
    }
    Flow::Continue
}

/// Profiles can be chosen by label or by their 1-based menu number.
fn select_profile(controller: &mut AppController, profile: &str) -> Result<()> {
    let label = match profile.parse::<usize>() {
        Ok(number) => controller
            .profile_labels()
            .get(number.wrapping_sub(1))
            .map(|label| label.to_string())
            .ok_or_else(|| anyhow!("no detector profile #{}", number))?,
        Err(_) => profile.to_string(),
    };
    controller.select_detector_profile(&label)?;
    println!("Model: {}", label);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::LogNotifier;
    use crate::detect::{DetectorProfile, ModelLoader, ProfileCatalog};

    #[test]
    fn parses_shortcuts() -> Result<()> {
        assert_eq!(Command::parse("")?, Command::Toggle);
        assert_eq!(Command::parse("   ")?, Command::Toggle);
        assert_eq!(Command::parse("w")?, Command::Webcam(None));
        assert_eq!(Command::parse("w 2")?, Command::Webcam(Some(2)));
        assert_eq!(
            Command::parse("o  clips/table.mp4 ")?,
            Command::OpenFile(PathBuf::from("clips/table.mp4"))
        );
        assert_eq!(
            Command::parse("n rtsp://10.0.0.2/live")?,
            Command::Stream(Some("rtsp://10.0.0.2/live".to_string()))
        );
        assert_eq!(Command::parse("c 40")?, Command::Confidence(40));
        assert_eq!(
            Command::parse("p Playing cards (52 classes)")?,
            Command::Profile("Playing cards (52 classes)".to_string())
        );
        assert_eq!(Command::parse("q")?, Command::Quit);
        Ok(())
    }

    #[test]
    fn rejects_malformed_commands() {
        assert!(Command::parse("o").is_err());
        assert!(Command::parse("w front").is_err());
        assert!(Command::parse("c high").is_err());
        assert!(Command::parse("s now").is_err());
        assert!(Command::parse("zoom").is_err());
    }

    #[test]
    fn profile_by_number_and_label() -> Result<()> {
        let catalog = ProfileCatalog::from_profiles([
            DetectorProfile::new("Suits", "stub://suits"),
            DetectorProfile::new("Cards", "stub://cards"),
        ])?;
        let mut controller =
            AppController::new(catalog, Box::new(ModelLoader::default()), Box::new(LogNotifier))?;

        select_profile(&mut controller, "2")?;
        assert_eq!(controller.selected_profile().map(|p| p.label.as_str()), Some("Cards"));
        select_profile(&mut controller, "Suits")?;
        assert_eq!(controller.selected_profile().map(|p| p.label.as_str()), Some("Suits"));
        assert!(select_profile(&mut controller, "0").is_err());
        assert!(select_profile(&mut controller, "3").is_err());
        Ok(())
    }

    #[test]
    fn webcam_command_uses_configured_default() -> Result<()> {
        let config = AppConfig {
            webcam_index: 3,
            profiles: vec![DetectorProfile::new("Suits", "stub://suits")],
            ..AppConfig::default()
        };
        let mut controller = AppController::from_config(
            &config,
            Box::new(ModelLoader::default()),
            Box::new(LogNotifier),
        )?;
        assert_eq!(
            execute(&mut controller, &config, Command::Webcam(None)),
            Flow::Continue
        );
        assert_eq!(controller.source_label(), "Source: Webcam 3");
        assert_eq!(execute(&mut controller, &config, Command::Quit), Flow::Quit);
        Ok(())
    }
}
