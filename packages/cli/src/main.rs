mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{
    format, init, pages, resolve, FormatArgs, InitArgs, PagesArgs, ResolveArgs,
};
use tracing_subscriber::EnvFilter;

/// Trellis CLI - inspect and maintain Trellis design projects
#[derive(Parser, Debug)]
#[command(name = "trellis")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize a new Trellis project
    Init(InitArgs),

    /// List the pages of project files
    Pages(PagesArgs),

    /// Print the resolved layout attributes of a page
    Resolve(ResolveArgs),

    /// Rewrite project files in canonical form
    Format(FormatArgs),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = std::env::current_dir()
        .map_err(anyhow::Error::from)
        .and_then(|cwd| {
            let cwd = cwd.display().to_string();
            match cli.command {
                Command::Init(args) => init(args, &cwd),
                Command::Pages(args) => pages(args, &cwd),
                Command::Resolve(args) => resolve(args, &cwd),
                Command::Format(args) => format(args, &cwd),
            }
        });

    if let Err(err) = result {
        eprintln!();
        eprintln!("{} {}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
