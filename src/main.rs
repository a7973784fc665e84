use sightread::{
    CpalSink, Exercise, PlaybackConfig, PlaybackMode, SessionCommand, SessionUpdate, spawn_session,
};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: sightread <exercise.ron> [config.ron] [--no-metronome] \
    [--mode click-only|click-and-score|pitch-only] [--instrument <id>]";

struct Args {
    exercise: PathBuf,
    config: Option<PathBuf>,
    metronome: bool,
    mode: Option<PlaybackMode>,
    instrument: Option<u32>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args, String> {
    let mut paths = Vec::new();
    let mut metronome = true;
    let mut mode = None;
    let mut instrument = None;
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--no-metronome" => metronome = false,
            "--mode" => {
                let value = args.next().ok_or_else(|| USAGE.to_string())?;
                mode = Some(value.parse::<PlaybackMode>().map_err(|e| format!("{e}\n{USAGE}"))?);
            }
            "--instrument" => {
                let value = args.next().ok_or_else(|| USAGE.to_string())?;
                let id = value
                    .parse::<u32>()
                    .map_err(|_| format!("instrument must be a preset number, got {value}"))?;
                instrument = Some(id);
            }
            "-h" | "--help" => return Err(USAGE.to_string()),
            flag if flag.starts_with("--") => return Err(format!("unknown flag {flag}\n{USAGE}")),
            _ => paths.push(PathBuf::from(arg)),
        }
    }

    let mut paths = paths.into_iter();
    let exercise = paths.next().ok_or_else(|| USAGE.to_string())?;
    let config = paths.next();
    if paths.next().is_some() {
        return Err(USAGE.to_string());
    }
    Ok(Args {
        exercise,
        config,
        metronome,
        mode,
        instrument,
    })
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let args = parse_args(std::env::args().skip(1))?;

    let mut config = match &args.config {
        Some(path) => PlaybackConfig::load(path)?,
        None => PlaybackConfig::default(),
    };
    if args.instrument.is_some() {
        config.instrument = args.instrument;
    }
    let exercise = Exercise::load(&args.exercise)?;
    let release = config.envelope.stop_padding;

    let (sink, _stream) = CpalSink::open()?;
    let session = spawn_session(Arc::new(sink), config)?;

    session
        .command_tx
        .send(SessionCommand::SetMetronome(args.metronome))?;
    session.command_tx.send(SessionCommand::Load(exercise))?;
    if let Some(mode) = args.mode {
        session.command_tx.send(SessionCommand::SetMode(mode))?;
    }
    session.command_tx.send(SessionCommand::Play)?;

    for update in session.update_rx.iter() {
        match update {
            SessionUpdate::ExerciseLoaded { title, notes } => info!(%title, notes, "ready"),
            SessionUpdate::NoteStarted { index, pitch } => info!(index, %pitch, "sing"),
            SessionUpdate::Beat { beat, downbeat } => debug!(beat, downbeat, "beat"),
            SessionUpdate::Progress(progress) => debug!(percent = progress.percent, "progress"),
            SessionUpdate::PlaybackState { playing } => debug!(playing, "playback state"),
            SessionUpdate::Error { message } => warn!(%message, "session error"),
            SessionUpdate::Finished => {
                info!("exercise complete");
                break;
            }
        }
    }

    // Let the final release ring out before the stream closes
    thread::sleep(Duration::from_secs_f64(release + 0.25));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args, String> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn exercise_path_is_required() {
        assert!(args(&[]).is_err());
        assert!(args(&["--no-metronome"]).is_err());
    }

    #[test]
    fn optional_config_and_flag() {
        let parsed = args(&["scale.ron", "--no-metronome", "quiet.ron"]).unwrap();
        assert_eq!(parsed.exercise, PathBuf::from("scale.ron"));
        assert_eq!(parsed.config, Some(PathBuf::from("quiet.ron")));
        assert!(!parsed.metronome);

        let parsed = args(&["scale.ron"]).unwrap();
        assert!(parsed.config.is_none());
        assert!(parsed.metronome);
    }

    #[test]
    fn mode_and_instrument_take_a_value() {
        let parsed = args(&["a.ron", "--mode", "pitch-only", "--instrument", "4"]).unwrap();
        assert_eq!(parsed.mode, Some(PlaybackMode::PitchOnly));
        assert_eq!(parsed.instrument, Some(4));

        assert!(args(&["a.ron", "--mode"]).is_err());
        assert!(args(&["a.ron", "--mode", "loud"]).is_err());
        assert!(args(&["a.ron", "--instrument", "organ"]).is_err());
    }

    #[test]
    fn rejects_extra_arguments_and_unknown_flags() {
        assert!(args(&["a.ron", "b.ron", "c.ron"]).is_err());
        assert!(args(&["a.ron", "--loud"]).is_err());
    }
}
