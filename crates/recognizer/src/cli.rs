use std::ffi::OsString;
use std::path::PathBuf;

use clap::error::ErrorKind as ClapErrorKind;
use clap::Parser;
use tracing::warn;

use emotion_domain::{EmotionReport, RecognizerError, ReportFormat, Response};

use crate::config::ConfigArgs;
use crate::pipeline::{ensure_audio_exists, EmotionRecognizer};

#[derive(Parser, Debug)]
#[command(
    name = "predict-emotion",
    author,
    version,
    about = "Predict the emotion expressed in a speech recording",
    long_about = None
)]
pub struct Cli {
    /// Path to the audio file to classify
    pub input: Option<PathBuf>,
    #[command(flatten)]
    pub config: ConfigArgs,
    /// Print the JSON object on a single line
    #[arg(long)]
    pub compact: bool,
}

impl Cli {
    pub fn format(&self) -> ReportFormat {
        if self.compact {
            ReportFormat::Compact
        } else {
            ReportFormat::Pretty
        }
    }
}

/// Runs the whole pipeline for the parsed command line.
///
/// The audio path is checked before any model artifact is touched.
pub fn run(cli: &Cli) -> Result<EmotionReport, RecognizerError> {
    let input = cli.input.as_deref().ok_or(RecognizerError::MissingAudioPath)?;
    ensure_audio_exists(input)?;
    let config = cli.config.resolve()?;
    let recognizer = EmotionRecognizer::from_config(&config)?;
    recognizer.recognize(input)
}

/// Parses `args` and produces the single response to print.
///
/// `--help` and `--version` print and exit as usual; every other parse
/// failure becomes a configuration error response.
pub fn execute<I, T>(args: I) -> (Response, ReportFormat)
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Cli::try_parse_from(args) {
        Ok(cli) => (Response::from(run(&cli)), cli.format()),
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => err.exit(),
            _ => {
                warn!(error = %err, "invalid command line");
                let message = err.render().to_string();
                let error = RecognizerError::configuration(message.trim().to_string());
                (Response::from(Err(error)), ReportFormat::Pretty)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emotion_domain::ErrorKind;

    fn failure(response: Response) -> (String, ErrorKind) {
        match response {
            Response::Failure(report) => (report.error, report.kind),
            Response::Success(_) => panic!("expected a failure response"),
        }
    }

    #[test]
    fn no_arguments_is_missing_audio_path() {
        let (response, _) = execute(["predict-emotion"]);
        let (message, kind) = failure(response);
        assert_eq!(kind, ErrorKind::MissingAudioPath);
        assert_eq!(message, "Audio file path not provided.");
    }

    #[test]
    fn nonexistent_audio_is_not_found() {
        let (response, _) = execute(["predict-emotion", "/no/such/clip.wav"]);
        let (message, kind) = failure(response);
        assert_eq!(kind, ErrorKind::AudioNotFound);
        assert!(message.contains("not found"));
    }

    #[test]
    fn unknown_flag_is_a_configuration_error() {
        let (response, _) = execute(["predict-emotion", "--bogus"]);
        let (_, kind) = failure(response);
        assert_eq!(kind, ErrorKind::Configuration);
    }

    #[test]
    fn compact_flag_selects_compact_output() {
        let cli = Cli::try_parse_from(["predict-emotion", "--compact", "clip.wav"]).unwrap();
        assert_eq!(cli.format(), ReportFormat::Compact);
        assert_eq!(cli.input, Some(PathBuf::from("clip.wav")));
    }
}
