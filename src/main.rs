use anyhow::{Context, Result};
use bytes::Bytes;
use clap::Parser;
use futures_util::StreamExt;
use owo_colors::OwoColorize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use streambridge::agent::{ConversationalAgent, MockBackend};
use streambridge::cli::{Cli, Commands};
use streambridge::config::Config;
use streambridge::LogReporter;
use streambridge::synth::{AudioChunk, AudioDecodePipeline, WavChunkDecoder};
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose)?;

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Decode {
            files,
            output,
            sampling_rate,
            encoding,
        } => {
            let mut config = config;
            if let Some(rate) = sampling_rate {
                config.synthesizer.sampling_rate = rate;
            }
            if let Some(encoding) = encoding {
                config.synthesizer.audio_encoding = encoding;
            }
            config.validate()?;
            run_decode(&config, &files, output.as_deref(), cli.quiet).await?;
        }
        Commands::Prompt { input } => {
            config.validate()?;
            let agent = ConversationalAgent::new(&config.agent, MockBackend::new("mock"))?;
            println!("{}", agent.render_prompt(&input));
            agent.shutdown()?;
        }
        Commands::Chat {
            reply,
            token_delay_ms,
            sentences,
        } => {
            config.validate()?;
            run_chat(&config, &reply, token_delay_ms, sentences).await?;
        }
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn init_logging(quiet: bool, verbose: u8) -> Result<()> {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("streambridge={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        // Load from custom path
        Config::load(path)?
    } else if let Some(default_path) = Config::default_path() {
        // Try default path, fall back to defaults
        Config::load_or_default(&default_path)?
    } else {
        Config::default()
    };

    // Apply environment variable overrides
    Ok(config.with_env_overrides()?)
}

/// Feed each file as one chunk of a single stream and collect the output.
async fn run_decode(
    config: &Config,
    files: &[PathBuf],
    output: Option<&Path>,
    quiet: bool,
) -> Result<()> {
    let mut chunks = Vec::with_capacity(files.len());
    for path in files {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        chunks.push(Bytes::from(data));
    }

    let mut pipeline = AudioDecodePipeline::spawn(
        &config.synthesizer,
        WavChunkDecoder::new(),
        config.bridge.capacity(),
        Arc::new(LogReporter),
    )?;

    let input = pipeline.input();
    let last = chunks.len().saturating_sub(1);
    let feeder = tokio::spawn(async move {
        for (i, bytes) in chunks.into_iter().enumerate() {
            input.send_async(AudioChunk::data(bytes, i == last)).await?;
        }
        anyhow::Ok(())
    });

    let decoded = pipeline.collect_stream().await?;
    feeder.await??;
    pipeline.shutdown().await?;

    let mut stream = Vec::new();
    for (i, chunk) in decoded.iter().enumerate() {
        match &chunk.bytes {
            Some(bytes) => {
                if !quiet {
                    eprintln!(
                        "{} chunk {}: {} bytes{}",
                        "✓".green(),
                        i,
                        bytes.len(),
                        if chunk.is_last { " (last)" } else { "" }
                    );
                }
                stream.extend_from_slice(bytes);
            }
            None if i < files.len() => {
                eprintln!(
                    "{} stream ended early at chunk {} ({})",
                    "✗".red(),
                    i,
                    files[i].display()
                );
            }
            None => {}
        }
    }

    if let Some(path) = output {
        std::fs::write(path, &stream)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if !quiet {
            eprintln!(
                "Wrote {} bytes of {} at {} Hz to {}",
                stream.len(),
                config.synthesizer.audio_encoding,
                config.synthesizer.sampling_rate,
                path.display()
            );
        }
    } else if !quiet {
        let samples = stream.len() / config.synthesizer.audio_encoding.bytes_per_sample();
        println!("{} samples", samples);
    }

    Ok(())
}

/// Interactive loop: one line of stdin per human turn.
async fn run_chat(config: &Config, reply: &str, token_delay_ms: u64, sentences: bool) -> Result<()> {
    let mut backend = MockBackend::new("mock").with_response(reply);
    if token_delay_ms > 0 {
        backend = backend.with_token_delay(Duration::from_millis(token_delay_ms));
    }
    let agent =
        ConversationalAgent::with_capacity(&config.agent, backend, config.bridge.capacity())?;

    let conversation_id = format!("cli-{}", std::process::id());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    eprint!("{} ", ">".cyan());
    std::io::stderr().flush()?;
    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.is_empty() {
            eprint!("{} ", ">".cyan());
            std::io::stderr().flush()?;
            continue;
        }

        let tokens = agent.generate_response(input, &conversation_id, false)?;
        let result = if sentences {
            print_stream(tokens.sentences(), "\n").await
        } else {
            print_stream(tokens, "").await
        };
        if let Err(e) = result {
            eprintln!("{} {}", "Error:".red(), e);
        }
        println!();
        eprint!("{} ", ">".cyan());
        std::io::stderr().flush()?;
    }

    agent.shutdown()?;
    Ok(())
}

async fn print_stream<S>(mut stream: S, separator: &str) -> streambridge::Result<()>
where
    S: futures_util::Stream<Item = streambridge::Result<String>> + Unpin,
{
    let mut stdout = std::io::stdout();
    while let Some(item) = stream.next().await {
        print!("{}{}", item?, separator);
        stdout.flush()?;
    }
    Ok(())
}
