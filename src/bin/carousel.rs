use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

use biocarousel::{
    logging, worker, CancelToken, Carousel, CarouselConfig, NotificationBus, Recording,
    RecordingResolver, SimulatedResolver, StreamResolver, WriterSink,
};

#[derive(Parser)]
#[command(
    name = "carousel",
    about = "Play the seven-clip carousel against a biosignal stream and report the most relaxing clip"
)]
struct Args {
    /// JSON configuration (missing fields take defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the stream name to discover
    #[arg(long)]
    stream_name: Option<String>,

    /// Score a synthetic stream instead of a real one
    #[arg(long, conflicts_with = "recording")]
    simulate: bool,

    /// Replay a recording (.safetensors with `data` [C, T] and `sfreq`)
    #[arg(long)]
    recording: Option<PathBuf>,

    /// Append marker tokens to this file (default: markers are only logged)
    #[arg(long)]
    marker_file: Option<PathBuf>,

    /// Opaque session identifier attached to log lines
    #[arg(long, default_value = "")]
    session_id: String,

    /// Seed of the synthetic stream
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log: String,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    logging::init_tracing(&args.log)?;

    let mut cfg = match &args.config {
        Some(path) => CarouselConfig::from_json_file(path)?,
        None => CarouselConfig::default(),
    };
    if let Some(name) = &args.stream_name {
        cfg.stream_name = name.clone();
    }
    cfg.validate()?;

    let resolver: Box<dyn StreamResolver> = if let Some(path) = &args.recording {
        let recording = Recording::load(path)?;
        info!(
            channels = recording.n_channels(),
            samples = recording.n_samples(),
            sfreq = recording.sfreq,
            "loaded {}",
            path.display()
        );
        Box::new(RecordingResolver { name: cfg.stream_name.clone(), recording })
    } else if args.simulate {
        Box::new(SimulatedResolver { n_channels: cfg.num_channels, sfreq: cfg.sfreq, seed: args.seed })
    } else {
        bail!("no stream backend selected: pass --simulate or --recording <file>");
    };

    let (bus, events) = NotificationBus::channel();
    let cancel = CancelToken::new();
    let cancel_for_ctrlc = cancel.clone();
    ctrlc::set_handler(move || cancel_for_ctrlc.cancel())
        .context("installing Ctrl-C handler")?;

    let mut carousel = Carousel::new(cfg, resolver, bus, cancel).with_session_id(args.session_id);
    if let Some(path) = &args.marker_file {
        let sink = WriterSink::append_to(path)
            .with_context(|| format!("opening marker file {}", path.display()))?;
        carousel = carousel.with_marker_sink(sink);
    }

    let run = worker::spawn(carousel).context("spawning carousel worker")?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for event in events.iter() {
        writeln!(out, "{}", serde_json::to_string(&event)?)?;
        if event.is_terminal() {
            break;
        }
    }
    drop(out);

    let outcome = run.join()?;
    Ok(match outcome.winner {
        Some(_) => ExitCode::SUCCESS,
        None => ExitCode::from(2),
    })
}
