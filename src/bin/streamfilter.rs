use std::io::Read;
use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use color_eyre::eyre::WrapErr;

use streamreduce::codec::parse_time;
use streamreduce::config::parse_seconds;
use streamreduce::filters::{ascii, trim, Ascii, Log, RenderType, Strip, Trim};
use streamreduce::reduce::extent;
use streamreduce::wire::{self, Formatter, Reader};
use streamreduce::{logging, ExtentReducer, SchemaId, Sink};

#[derive(Parser)]
#[command(
    name = "streamfilter",
    version,
    about = "Reformats, annotates or trims a packet stream"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Args)]
struct Io {
    /// Input stream, standard input if omitted or `-`
    input: Option<PathBuf>,
    /// Output stream, standard output if omitted or `-`
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Reduce waveform bursts to min/max extents
    Extent {
        /// Wanted spacing of the output in seconds, or a duration such as `1 ms`
        #[arg(long, value_parser = parse_seconds)]
        cadence: f64,
        #[command(flatten)]
        io: Io,
    },
    /// Re-encode every field as fixed width text
    Ascii {
        /// Write times as calendar strings
        #[arg(long)]
        time_as_text: bool,
        #[command(flatten)]
        io: Io,
    },
    /// Drop packets outside a time range, both ends included
    Trim {
        /// For example 2014-01-01T00:00
        #[arg(long, value_parser = parse_time)]
        start: f64,
        #[arg(long, value_parser = parse_time)]
        end: f64,
        #[command(flatten)]
        io: Io,
    },
    /// Remove all properties, report packet counts per id
    Strip {
        #[command(flatten)]
        io: Io,
    },
    /// Tag schemas with how they should be plotted
    RenderType {
        /// For example `series` or `spectrogram`
        render_type: String,
        /// Only tag this packet id
        #[arg(long, value_parser = parse_id)]
        id: Option<SchemaId>,
        #[command(flatten)]
        io: Io,
    },
    /// Log every event, pass the stream on unchanged
    Log {
        #[command(flatten)]
        io: Io,
    },
}

impl Command {
    fn io(&self) -> &Io {
        match self {
            Command::Extent { io, .. }
            | Command::Ascii { io, .. }
            | Command::Trim { io, .. }
            | Command::Strip { io }
            | Command::RenderType { io, .. }
            | Command::Log { io } => io,
        }
    }
}

fn parse_id(text: &str) -> Result<SchemaId, String> {
    text.parse::<u8>()
        .ok()
        .and_then(SchemaId::new)
        .ok_or_else(|| format!("packet ids lie in 1..=99, got: {text}"))
}

fn drive(input: Box<dyn Read>, pipeline: &mut impl Sink) -> color_eyre::Result<()> {
    Reader::new(input)
        .drive(pipeline)
        .wrap_err("Filtering failed")
}

fn main() -> color_eyre::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose)?;

    let Io { input, output } = cli.command.io();
    let input = wire::open_input(input.as_deref()).wrap_err("Could not open input")?;
    let output = wire::create_output(output.as_deref()).wrap_err("Could not open output")?;
    let output = Formatter::new(output);

    match cli.command {
        Command::Extent { cadence, .. } => {
            let config = extent::Config {
                target_cadence: cadence,
            };
            drive(input, &mut ExtentReducer::new(config, output)?)
        }
        Command::Ascii { time_as_text, .. } => {
            let config = ascii::Config { time_as_text };
            drive(input, &mut Ascii::new(config, output))
        }
        Command::Trim { start, end, .. } => {
            drive(input, &mut Trim::new(trim::Config::new(start, end), output)?)
        }
        Command::Strip { .. } => drive(input, &mut Strip::new(output)),
        Command::RenderType {
            render_type, id, ..
        } => drive(input, &mut RenderType::new(render_type, id, output)),
        Command::Log { .. } => drive(input, &mut Log::new(output)),
    }
}
