use anyhow::Context;
use clap::Parser;
use kokoro_speak_lib::commands::{self, Command, Reply};
use kokoro_speak_lib::config::DEFAULT_SERVER_URL;
use kokoro_speak_lib::document::UploadedFile;
use kokoro_speak_lib::tts::PlayerEventKind;
use kokoro_speak_lib::{SpeechSession, SynthesisConfig, Voice};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Speak text through a local Kokoro TTS server
#[derive(Parser, Debug)]
#[command(name = "kokoro-speak", version, about)]
struct Args {
    /// Base URL of the Kokoro server
    #[arg(long, env = "KOKORO_SERVER_URL", default_value = DEFAULT_SERVER_URL)]
    server_url: String,

    /// Voice identifier
    #[arg(long, env = "KOKORO_VOICE", default_value = "af_sky")]
    voice: Voice,

    /// Speaking speed, 0.5 - 2.0
    #[arg(long, env = "KOKORO_SPEED", default_value_t = 1.0)]
    speed: f32,

    /// Speak this text once and exit
    #[arg(long, conflicts_with = "file")]
    text: Option<String>,

    /// Speak the contents of this file once and exit
    #[arg(long)]
    file: Option<PathBuf>,

    /// Also save the audio here (file or directory)
    #[arg(long, short)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    match dotenv {
        Ok(path) => log::debug!("Loaded .env from {:?}", path),
        Err(e) => log::debug!("No .env loaded: {}", e),
    }

    let args = Args::parse();
    let config = SynthesisConfig::new(args.server_url.clone(), args.voice, args.speed)
        .context("invalid settings")?;
    let mut session = SpeechSession::new(config).context("failed to start session")?;

    if args.text.is_some() || args.file.is_some() {
        speak_once(&mut session, &args).await
    } else {
        interactive(&mut session).await
    }
}

async fn speak_once(session: &mut SpeechSession, args: &Args) -> anyhow::Result<()> {
    if let Some(text) = &args.text {
        session.set_text(text.clone());
    }
    if let Some(path) = &args.file {
        let file = UploadedFile::from_path(path)?;
        session.load_file(file).await?;
    }

    session.generate_speech().await?;
    if let Some(output) = &args.output {
        if let Some(path) = session.download(Some(output.as_path()))? {
            println!("Saved {}", path.display());
        }
    }

    loop {
        tokio::time::sleep(Duration::from_millis(100)).await;
        for event in session.pump_events() {
            match event {
                PlayerEventKind::Ended => return Ok(()),
                PlayerEventKind::Error(message) => anyhow::bail!("Error playing audio: {}", message),
                _ => {}
            }
        }
    }
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

async fn interactive(session: &mut SpeechSession) -> anyhow::Result<()> {
    println!("Kokoro Speak - server {}. Type `help` for commands.", session.config().server_url());
    prompt();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(Duration::from_millis(200));

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.trim().is_empty() {
                    prompt();
                    continue;
                }

                session.pump_events();
                match line.parse::<Command>() {
                    Ok(command) => match commands::execute(session, command).await {
                        Ok(Reply::Message(message)) => println!("{}", message),
                        Ok(Reply::Quiet) => {}
                        Ok(Reply::Quit) => break,
                        Err(e) => println!("error: {}", e),
                    },
                    Err(e) => println!("{}", e),
                }
                prompt();
            }
            _ = ticker.tick() => {
                for event in session.pump_events() {
                    match event {
                        PlayerEventKind::Ended => {
                            println!("\nFinished ({})", commands::progress(session));
                            prompt();
                        }
                        PlayerEventKind::Error(message) => {
                            println!("\nError playing audio: {}", message);
                            prompt();
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    Ok(())
}
