use anyhow::Result;
use clap::Parser;
use moltbook::{args::Args, runner, FileStore};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(err) = try_main() {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let args = Args::parse();
    let store = FileStore::default_location()?;

    println!("{}", runner::run(args, &store)?);
    Ok(())
}
