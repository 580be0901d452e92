//! Command line arguments

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "axilla", version, about = "Render Pixlet applets over HTTP")]
pub struct Args {
    /// Configuration file, with or without extension
    #[arg(short, long, env = "AXILLA_CONFIG", default_value = "config")]
    pub config: String,

    /// Run the startup self-check and exit
    #[arg(long)]
    pub diagnose: bool,
}
