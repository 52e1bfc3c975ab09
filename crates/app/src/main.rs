use std::{
    cell::{Cell, RefCell},
    path::PathBuf,
    rc::Rc,
};

use clap::{Parser, Subcommand};
use tempo_transport_core::{
    AppConfig, EmbedOptions, EngineError, OfflineHost, TickSignal, Transport, TransportEvent,
};
use tracing_subscriber::EnvFilter;

fn main() -> tempo_transport_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            config,
            seconds,
            bars,
        } => run_play(config.as_ref(), seconds, bars),
        Commands::Convert {
            bpm,
            to_bpm,
            ramp,
            ppq,
            ticks,
            seconds,
        } => run_convert(bpm, to_bpm.zip(ramp), ppq, ticks, seconds),
        Commands::Config => {
            println!("{}", AppConfig::default().to_json_pretty()?);
            Ok(())
        }
    }
}

fn run_play(config: Option<&PathBuf>, seconds: Option<f64>, bars: u32) -> tempo_transport_core::Result<()> {
    let config = match config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    tracing::info!(bpm = config.transport.bpm, ppq = config.transport.ppq, "starting offline playback");

    let mut host = OfflineHost::from_config(&config.host);
    let mut transport = Transport::from_config(host.context().clone(), &config.transport)?;
    let signature = transport.time_signature();
    let beat = signature.ticks_per_beat(transport.ppq()) as u64;
    let bar = signature.ticks_per_bar(transport.ppq()) as u64;

    let clicks = Rc::new(Cell::new(0u32));
    let counter = Rc::clone(&clicks);
    transport.schedule_repeat(beat, 0, None, move |transport, info| {
        counter.set(counter.get() + 1);
        tracing::info!(seconds = info.seconds, position = %transport.position(), "click");
    })?;

    // A one-bar pattern reused at two places on the main timeline.
    let notes = Rc::new(Cell::new(0u32));
    let pattern = Rc::new(RefCell::new(Transport::from_config(
        host.context().clone(),
        &config.transport,
    )?));
    for (index, step) in [0, 1, 2, 3].into_iter().enumerate() {
        let played = Rc::clone(&notes);
        let note = TransportEvent::new(step * beat, beat / 2)
            .with_row(index as i32)
            .on_start(move |_, info| {
                played.set(played.get() + 1);
                tracing::info!(row = info.event.row, seconds = info.seconds, "note on");
            })
            .on_mid_start(|_, info| {
                tracing::info!(row = info.event.row, late_by = info.seconds_offset, "note on (late)");
            })
            .on_end(|_, info| tracing::info!(row = info.event.row, seconds = info.seconds, "note off"));
        pattern.borrow_mut().schedule(note)?;
    }
    for at in [bar, 3 * bar] {
        Transport::embed_in(
            &pattern,
            &mut transport,
            EmbedOptions {
                time: at,
                duration: bar,
                row: 0,
            },
        )?;
    }

    transport.on_did_before_start(|boundary| tracing::debug!(ticks = boundary.ticks, "before start"));
    transport.on_did_before_end(|boundary| tracing::debug!(ticks = boundary.ticks, "before end"));

    let duration = match seconds {
        Some(seconds) => seconds,
        None => transport.ticks_to_seconds(f64::from(bars) * bar as f64),
    };
    if !duration.is_finite() {
        return Err(EngineError::msg("tempo never reaches the requested length"));
    }

    transport.start(0.0)?;
    let blocks = host.drive(&mut transport, duration)?;
    transport.stop(None)?;
    transport.process();

    println!(
        "rendered {blocks} blocks ({duration:.3}s): {} clicks, {} pattern notes",
        clicks.get(),
        notes.get()
    );
    Ok(())
}

fn run_convert(
    bpm: f64,
    ramp: Option<(f64, f64)>,
    ppq: u32,
    ticks: Option<f64>,
    seconds: Option<f64>,
) -> tempo_transport_core::Result<()> {
    let mut tempo = TickSignal::bpm(bpm, ppq)?;
    if let Some((to_bpm, ramp_time)) = ramp {
        tempo.linear_ramp_to_value_at_time(to_bpm, ramp_time)?;
    }

    match (ticks, seconds) {
        (Some(ticks), _) => {
            let time = tempo.get_time_of_tick(ticks);
            if time.is_finite() {
                println!("{ticks} ticks = {time:.6} s");
            } else {
                println!("{ticks} ticks are never reached");
            }
        }
        (None, Some(seconds)) => {
            let ticks = tempo.get_ticks_at_time(seconds);
            println!("{seconds} s = {ticks:.3} ticks");
        }
        (None, None) => return Err(EngineError::msg("pass --ticks or --seconds")),
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Tempo transport engine driver", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a metronome and an embedded pattern offline.
    Play {
        /// Optional JSON configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Seconds to render; overrides `--bars`.
        #[arg(short, long)]
        seconds: Option<f64>,
        /// Bars to render at the configured tempo.
        #[arg(short, long, default_value_t = 4)]
        bars: u32,
    },
    /// Convert between ticks and seconds under a constant or ramped tempo.
    Convert {
        /// Tempo at time zero.
        #[arg(long)]
        bpm: f64,
        /// Tempo reached at the end of the ramp.
        #[arg(long, requires = "ramp")]
        to_bpm: Option<f64>,
        /// Seconds at which the ramp ends.
        #[arg(long, requires = "to_bpm")]
        ramp: Option<f64>,
        /// Pulses per quarter note.
        #[arg(long, default_value_t = 192)]
        ppq: u32,
        /// Tick position to convert to seconds.
        #[arg(long, conflicts_with = "seconds", required_unless_present = "seconds")]
        ticks: Option<f64>,
        /// Time in seconds to convert to ticks.
        #[arg(long)]
        seconds: Option<f64>,
    },
    /// Print the default configuration as JSON.
    Config,
}
