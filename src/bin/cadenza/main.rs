use clap::Parser;
use miette::Result;

mod common;
mod daemon;

#[derive(Parser)]
#[clap(name = "Cadenza")]
#[clap(bin_name = "cadenza")]
#[clap(author, version, about, long_about = None)]
enum Cadenza {
    /// Run the world-mode server until interrupted.
    Daemon(daemon::Args),
}

fn main() -> Result<()> {
    let args = Cadenza::parse();

    match args {
        Cadenza::Daemon(x) => daemon::run(&x)?,
    };

    Ok(())
}
