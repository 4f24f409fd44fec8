// src/main.rs
use anyhow::{bail, Context, Result};
use clap::Parser;
use colorful::Colorful;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, trace, LevelFilter};
use std::time::Instant;

use spectrum_weaver::cli::{
    format_column, format_json_event, format_json_summary, format_metadata, format_summary,
    print_presets, AnalyzeArgs, Cli, Command, PeakHistogram, RunSummary, ToneArgs,
};
use spectrum_weaver::core::visualization::{ExportConfig, SpectrogramImage};
use spectrum_weaver::testgen::{chirp, interleave, sine, write_wav};
use spectrum_weaver::{AnalysisSession, SessionEvent, SessionState};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    match cli.command {
        Command::Analyze(args) => {
            let state = analyze(&args, cli.verbose > 0)?;
            if state != SessionState::Completed {
                std::process::exit(1);
            }
        }
        Command::Tone(args) => tone(&args)?,
        Command::Presets => print_presets(),
    }

    Ok(())
}

fn analyze(args: &AnalyzeArgs, verbose: bool) -> Result<SessionState> {
    let config = args.to_config().context("Invalid analysis configuration")?;
    debug!("Configuration: {:?}", config);

    if !args.json {
        println!("Analyzing: {}", args.file.display().to_string().cyan());
    }

    let started = Instant::now();
    let mut session = AnalysisSession::new();
    session
        .start(&args.file, config.clone())
        .with_context(|| format!("Failed to start analysis of {}", args.file.display()))?;

    let progress = if args.json {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(1000);
        bar.set_style(
            ProgressStyle::with_template("  {bar:40.cyan/blue} {percent:>3}% {elapsed_precise} {msg}")?
                .progress_chars("=> "),
        );
        bar
    };

    let mut image: Option<SpectrogramImage> = None;
    let mut peaks = PeakHistogram::default();
    let mut frequencies: Vec<f32> = Vec::new();
    let mut columns = 0u64;
    let mut json_error: Option<serde_json::Error> = None;

    let state = session.run_batched(|batch| {
        trace!("Batch of {} events", batch.len());
        for event in batch {
            if args.json {
                match format_json_event(&event) {
                    Ok(line) => println!("{}", line),
                    Err(e) => {
                        json_error.get_or_insert(e);
                    }
                }
            }

            match event {
                SessionEvent::Metadata(meta) => {
                    if !args.json {
                        progress.println(format_metadata(&meta).trim_end());
                    }
                    if args.png.is_some() {
                        let export = ExportConfig {
                            height: args.height,
                            mel_scale: args.mel,
                            ..Default::default()
                        };
                        image = Some(SpectrogramImage::new(export, meta.audio.sample_rate));
                    }
                    frequencies = meta.frequencies;
                }
                SessionEvent::Column(column) => {
                    columns += 1;
                    peaks.record(&column);
                    if let Some(image) = image.as_mut() {
                        image.push(&column);
                    }
                    if verbose && !args.json {
                        progress.println(format_column(&column, &frequencies));
                    }
                }
                SessionEvent::Progress { fraction } => {
                    progress.set_position((fraction * 1000.0) as u64);
                }
                SessionEvent::Completed => progress.finish_with_message("done"),
                SessionEvent::Cancelled => progress.abandon_with_message("cancelled"),
                SessionEvent::Failed { kind, .. } => progress.abandon_with_message(kind.name()),
            }
        }
    });

    if let Some(e) = json_error {
        return Err(e).context("Failed to serialize event");
    }

    let status = session.status();
    let receiver = session.columns();
    let summary = RunSummary {
        file: args.file.display().to_string(),
        state,
        columns,
        lanes: status.metadata.as_ref().map(|m| m.lanes).unwrap_or(0),
        expected_columns: status.metadata.as_ref().and_then(|m| m.expected_columns),
        dropped: receiver.map(|r| r.dropped()).unwrap_or(0),
        high_water_mark: receiver.map(|r| r.high_water_mark()).unwrap_or(0),
        capacity: config.channel_capacity,
        elapsed_secs: started.elapsed().as_secs_f64(),
        dominant_hz: peaks
            .dominant_bin()
            .and_then(|bin| frequencies.get(bin).copied()),
        failure: status.failure.clone(),
    };

    if args.json {
        println!("{}", format_json_summary(&summary)?);
    } else {
        print!("{}", format_summary(&summary));
    }

    if let (Some(path), Some(image)) = (&args.png, &image) {
        if state == SessionState::Completed {
            image
                .save(path)
                .with_context(|| format!("Failed to write spectrogram to {}", path.display()))?;
            if !args.json {
                println!("  Spectrogram saved to: {}", path.display());
            }
        }
    }

    Ok(state)
}

fn tone(args: &ToneArgs) -> Result<()> {
    if args.duration <= 0.0 || args.sample_rate == 0 {
        bail!("Duration and sample rate must be positive");
    }
    if args.channels == 0 {
        bail!("At least one channel is required");
    }

    let frames = (args.duration * args.sample_rate as f32) as usize;
    let mono = match args.sweep_to {
        Some(end) => chirp(args.freq, end, args.sample_rate, frames, 0.5),
        None => sine(args.freq, args.sample_rate, frames, 0.5),
    };
    let planar = vec![mono; args.channels as usize];

    write_wav(
        &args.output,
        &interleave(&planar),
        args.sample_rate,
        args.channels,
        args.encoding,
    )?;
    println!(
        "Wrote {:.2}s {} Hz tone to {}",
        args.duration,
        args.freq,
        args.output.display().to_string().green()
    );
    Ok(())
}
