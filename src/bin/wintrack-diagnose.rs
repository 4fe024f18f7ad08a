use clap::Parser;
use wintrack::diagnose::Diagnostics;
use wintrack::Result;

#[derive(Parser)]
#[command(name = "wintrack-diagnose")]
#[command(about = "Print environment hints for window-geometry tracking as JSON")]
struct Cli {
    #[arg(long, help = "Compact output instead of pretty-printed JSON")]
    compact: bool,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let report = Diagnostics::collect();

    let json = if cli.compact {
        serde_json::to_string(&report)?
    } else {
        serde_json::to_string_pretty(&report)?
    };
    println!("{}", json);

    Ok(())
}
