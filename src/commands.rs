//! Line commands for the interactive front end

use crate::config::Voice;
use crate::document::UploadedFile;
use crate::error::SessionError;
use crate::session::SpeechSession;
use crate::tts::{format_time, PlaybackPhase};
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

pub const HELP: &str = "\
Commands:
  text <words>      replace the text
  append <words>    add a line to the text
  load <path>       import .txt .md .json .html .csv or .pdf (max 5 MB)
  clear             clear the text
  speak             synthesize the text and start playing
  play | pause      toggle playback
  stop              stop and rewind
  seek <seconds>    jump to a position
  save [path]       save the audio as speech.wav
  voice [id]        show or set the voice
  voices            list voices
  speed <0.5-2.0>   set speaking speed
  server <url>      set the Kokoro server URL
  status            show the current state
  help              show this help
  quit              exit";

#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
    #[error("Unknown command: {0}. Type `help` for a list")]
    Unknown(String),
    #[error("Missing argument for `{0}`")]
    MissingArgument(&'static str),
    #[error("Invalid argument for `{command}`: {value}")]
    InvalidArgument { command: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Text(String),
    Append(String),
    Load(PathBuf),
    Clear,
    Speak,
    TogglePlayPause,
    Stop,
    Seek(f64),
    Save(Option<PathBuf>),
    Voice(Option<Voice>),
    Voices,
    Speed(f32),
    Server(String),
    Status,
    Help,
    Quit,
}

/// What the front end should do after a command
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Message(String),
    Quiet,
    Quit,
}

fn required<'a>(command: &'static str, rest: &'a str) -> Result<&'a str, CommandError> {
    if rest.is_empty() {
        Err(CommandError::MissingArgument(command))
    } else {
        Ok(rest)
    }
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match word.to_lowercase().as_str() {
            "text" => Ok(Command::Text(required("text", rest)?.to_string())),
            "append" => Ok(Command::Append(required("append", rest)?.to_string())),
            "load" | "open" => Ok(Command::Load(PathBuf::from(required("load", rest)?))),
            "clear" => Ok(Command::Clear),
            "speak" | "generate" => Ok(Command::Speak),
            "play" | "pause" | "p" => Ok(Command::TogglePlayPause),
            "stop" => Ok(Command::Stop),
            "seek" => {
                let value = required("seek", rest)?;
                parse_seconds(value)
                    .map(Command::Seek)
                    .ok_or_else(|| CommandError::InvalidArgument {
                        command: "seek",
                        value: value.to_string(),
                    })
            }
            "save" | "download" => Ok(Command::Save((!rest.is_empty()).then(|| PathBuf::from(rest)))),
            "voice" => {
                if rest.is_empty() {
                    return Ok(Command::Voice(None));
                }
                rest.parse::<Voice>()
                    .map(|v| Command::Voice(Some(v)))
                    .map_err(|_| CommandError::InvalidArgument {
                        command: "voice",
                        value: rest.to_string(),
                    })
            }
            "voices" => Ok(Command::Voices),
            "speed" => {
                let value = required("speed", rest)?;
                value
                    .trim_end_matches('x')
                    .parse::<f32>()
                    .map(Command::Speed)
                    .map_err(|_| CommandError::InvalidArgument {
                        command: "speed",
                        value: value.to_string(),
                    })
            }
            "server" => Ok(Command::Server(required("server", rest)?.to_string())),
            "status" => Ok(Command::Status),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            _ => Err(CommandError::Unknown(word.to_string())),
        }
    }
}

/// Accepts plain seconds (`75`, `12.5`) or `m:ss`
fn parse_seconds(value: &str) -> Option<f64> {
    let seconds = match value.split_once(':') {
        Some((mins, secs)) => mins.parse::<u64>().ok()? as f64 * 60.0 + secs.parse::<f64>().ok()?,
        None => value.parse::<f64>().ok()?,
    };
    (seconds.is_finite() && seconds >= 0.0).then_some(seconds)
}

/// Run one command against the session
pub async fn execute(session: &mut SpeechSession, command: Command) -> Result<Reply, SessionError> {
    let reply = match command {
        Command::Text(text) => {
            session.set_text(text);
            Reply::Message(format!("{} characters", session.document().char_count()))
        }
        Command::Append(text) => {
            if !session.document().text().is_empty() {
                session.append_text("\n");
            }
            session.append_text(&text);
            Reply::Message(format!("{} characters", session.document().char_count()))
        }
        Command::Load(path) => {
            let file = UploadedFile::from_path(&path)?;
            session.load_file(file).await?;
            Reply::Message(format!(
                "Loaded {} ({} characters)",
                session.document().source_file_name().unwrap_or_default(),
                session.document().char_count()
            ))
        }
        Command::Clear => {
            session.clear_document();
            Reply::Message("Cleared".to_string())
        }
        Command::Speak => {
            session.generate_speech().await?;
            Reply::Message("Playing".to_string())
        }
        Command::TogglePlayPause => {
            if !session.has_audio() {
                return Ok(Reply::Message("Nothing to play. Use `speak` first".to_string()));
            }
            session.toggle_play_pause()?;
            Reply::Quiet
        }
        Command::Stop => {
            session.stop();
            Reply::Quiet
        }
        Command::Seek(seconds) => {
            session.seek(seconds)?;
            Reply::Message(progress(session))
        }
        Command::Save(path) => match session.download(path.as_deref())? {
            Some(path) => Reply::Message(format!("Saved {}", path.display())),
            None => Reply::Message("No audio to save".to_string()),
        },
        Command::Voice(Some(voice)) => {
            session.set_voice(voice);
            Reply::Message(format!("Voice: {}", voice.label()))
        }
        Command::Voice(None) => Reply::Message(format!("Voice: {}", session.config().voice().label())),
        Command::Voices => Reply::Message(voice_list(session.config().voice())),
        Command::Speed(speed) => {
            session.set_speed(speed)?;
            Reply::Message(format!("Speed: {:.1}x", session.config().speed()))
        }
        Command::Server(url) => {
            session.set_server_url(&url)?;
            Reply::Message(format!("Server: {}", session.config().server_url()))
        }
        Command::Status => Reply::Message(status_line(session)),
        Command::Help => Reply::Message(HELP.to_string()),
        Command::Quit => Reply::Quit,
    };
    Ok(reply)
}

/// `elapsed / total`
pub fn progress(session: &SpeechSession) -> String {
    let playback = session.playback();
    format!(
        "{} / {}",
        format_time(playback.current_time),
        format_time(playback.duration)
    )
}

pub fn status_line(session: &SpeechSession) -> String {
    let playback = session.playback();
    let phase = match playback.phase {
        PlaybackPhase::Idle => "idle",
        PlaybackPhase::Loading => "generating",
        PlaybackPhase::Playing => "playing",
        PlaybackPhase::Paused => "paused",
        PlaybackPhase::Stopped => "stopped",
        PlaybackPhase::Errored => "error",
    };

    let document = session.document();
    let source = document
        .source_file_name()
        .map(|name| format!(" from {}", name))
        .unwrap_or_default();
    let config = session.config();

    let mut line = format!(
        "[{}] {}  voice {}  speed {:.1}x  {} characters{}  server {}",
        phase,
        progress(session),
        config.voice(),
        config.speed(),
        document.char_count(),
        source,
        config.server_url()
    );
    if let Some(error) = &session.request().error {
        line.push_str(&format!("\nerror: {}", error));
    }
    line
}

pub fn voice_list(current: Voice) -> String {
    Voice::ALL
        .iter()
        .map(|v| {
            let marker = if *v == current { "*" } else { " " };
            format!("{} {:<11} {}", marker, v.id(), v.label())
        })
        .collect::<Vec<_>>()
        .join("\n")
}
