use clap::{Parser, Subcommand};

use self::{inspect::InspectArg, record::RecordArg, simulate::SimulateArg};

mod inspect;
mod record;
mod simulate;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// What mode to run the program in
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Record demonstration sessions from a scripted operator
    Record(#[clap(flatten)] RecordArg),
    /// Evolve a population on the steering course with imitation learning
    Simulate(#[clap(flatten)] SimulateArg),
    /// List stored demonstration sessions
    Inspect(#[clap(flatten)] InspectArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    match args.mode {
        Mode::Record(arg) => record::run(&arg)?,
        Mode::Simulate(arg) => simulate::run(&arg)?,
        Mode::Inspect(arg) => inspect::run(&arg)?,
    }
    Ok(())
}
