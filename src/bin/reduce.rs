use std::path::PathBuf;

use clap::{ArgAction, Parser};
use color_eyre::eyre::WrapErr;

use streamreduce::config::parse_seconds;
use streamreduce::reduce::mean;
use streamreduce::wire::{self, Formatter, Reader};
use streamreduce::{logging, MeanReducer};

#[derive(Parser)]
#[command(
    name = "reduce",
    version,
    about = "Averages a packet stream over fixed length time windows",
    long_about = "Averages every time series in a packet stream over windows of the given \
                  length, emitting one packet per window. Packet types that are not time \
                  series pass through untouched."
)]
struct Cli {
    /// Window length in seconds, or a duration such as `10 min`
    #[arg(value_parser = parse_seconds)]
    window: f64,

    /// Input stream, standard input if omitted or `-`
    input: Option<PathBuf>,

    /// Output stream, standard output if omitted or `-`
    output: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> color_eyre::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose)?;

    let input = wire::open_input(cli.input.as_deref()).wrap_err("Could not open input")?;
    let output = wire::create_output(cli.output.as_deref()).wrap_err("Could not open output")?;

    let mut reducer = MeanReducer::new(mean::Config::new(cli.window), Formatter::new(output))?;
    Reader::new(input)
        .drive(&mut reducer)
        .wrap_err("Reduction failed")?;
    Ok(())
}
