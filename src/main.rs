use async_trait::async_trait;
use clap::Parser;
use console::style;
use curio::config::Settings;
use curio::llm_client::OpenAiClient;
use curio::session::{SessionController, SessionOutput, SessionState};
use curio::tokens::TokenEstimator;
use curio::transcript::TranscriptWriter;
use dotenvy::dotenv;
use indicatif::ProgressBar;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "curio", about = "Interactive curiosity-driven Q&A for your terminal")]
struct Cli {
    /// Backend model id (must be in the supported model table)
    #[arg(long)]
    model: Option<String>,

    /// Surface outbound prompts and unparsable responses
    #[arg(short, long)]
    verbose: bool,

    /// Do not write a session transcript
    #[arg(long)]
    no_transcript: bool,
}

#[derive(Default)]
struct CliOutput {
    spinner: Mutex<Option<ProgressBar>>,
}

#[async_trait]
impl SessionOutput for CliOutput {
    async fn answer(&self, text: &str) {
        println!("\n{}", style(text).green());
    }

    async fn follow_ups(&self, options: &[String]) {
        println!();
        for (i, option) in options.iter().enumerate() {
            println!("{}", style(format!("{}. {}", i + 1, option)).cyan());
        }
    }

    async fn failure(&self, text: &str) {
        println!("\n{text}\n");
    }

    async fn notice(&self, text: &str) {
        println!("{}", style(text).yellow());
    }

    async fn thinking_started(&self) {
        let pb = ProgressBar::new_spinner();
        pb.set_message(style("Thinking...").magenta().to_string());
        pb.enable_steady_tick(Duration::from_millis(120));
        if let Ok(mut guard) = self.spinner.lock() {
            *guard = Some(pb);
        }
    }

    async fn thinking_finished(&self) {
        if let Ok(mut guard) = self.spinner.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenv();
    let cli = Cli::parse();

    let mut settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    if let Some(model) = cli.model {
        settings.model = model;
    }
    if cli.verbose {
        settings.debug = true;
    }
    if cli.no_transcript {
        settings.transcript_dir = None;
    }

    let _log_guard = curio::logging::init(settings.debug)?;

    // Fail closed on unknown model ids before the session starts.
    let estimator = match TokenEstimator::new(&settings.model) {
        Ok(estimator) => estimator,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let transcript = settings.transcript_dir.as_ref().and_then(|dir| {
        match TranscriptWriter::create(dir) {
            Ok(writer) => {
                tracing::info!("writing transcript to {}", writer.path().display());
                Some(writer)
            }
            Err(e) => {
                tracing::warn!("transcript disabled, could not create file: {e}");
                None
            }
        }
    });

    let client = Arc::new(OpenAiClient::new(
        settings.api_key.clone(),
        settings.model.clone(),
        settings.max_reply_tokens,
        settings.temperature,
    ));
    let output = Arc::new(CliOutput::default());
    let mut controller = SessionController::new(
        client,
        estimator,
        output,
        transcript,
        settings.max_history_tokens,
        settings.debug,
    );

    let mut rl = DefaultEditor::new()?;
    loop {
        if controller.state() == &SessionState::Exiting {
            break;
        }
        match rl.readline(&controller.prompt_text()) {
            Ok(line) => {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(&line);
                controller.handle_input(&line).await;
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                controller.request_exit();
            }
            Err(err) => {
                eprintln!("Error: {err:?}");
                controller.request_exit();
            }
        }
    }

    println!("\n\nBye-bye!");
    Ok(())
}
