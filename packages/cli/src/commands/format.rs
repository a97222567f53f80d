use super::project_files::{display_path, open_project, resolve_inputs};
use crate::config::Config;
use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};
use trellis_common::{FileAccess, Problem, ProblemReport, RealFileAccess};

#[derive(Debug, Args)]
pub struct FormatArgs {
    /// Project file or directory (defaults to the source directory)
    pub input: Option<PathBuf>,

    /// Fail instead of rewriting files that are not canonical
    #[arg(long)]
    pub check: bool,
}

#[derive(Debug, PartialEq)]
enum Outcome {
    Unchanged,
    Formatted,
    NeedsFormatting,
}

pub fn format(args: FormatArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let files = RealFileAccess::new(cwd);
    let paths = resolve_inputs(&files, &config, cwd, args.input.as_deref())?;

    println!("{}", "🧹 Formatting Trellis projects...".bright_blue().bold());

    let mut report = ProblemReport::new();
    let mut unformatted = Vec::new();
    for path in &paths {
        let shown = display_path(path, cwd);
        match format_file(&files, &config, path, args.check) {
            Ok(Outcome::Unchanged) => println!("  {} {}", "✓".green(), shown),
            Ok(Outcome::Formatted) => println!("  {} {} (formatted)", "✓".green(), shown),
            Ok(Outcome::NeedsFormatting) => {
                println!("  {} {} needs formatting", "✗".yellow(), shown);
                unformatted.push(shown);
            }
            Err(err) => {
                eprintln!("  {} {} - {}", "✗".red(), shown, err.to_string().red());
                report.push(Problem::new(path, err));
            }
        }
    }

    report.into_result()?;
    if !unformatted.is_empty() {
        return Err(anyhow!("{} file(s) need formatting", unformatted.len()));
    }
    Ok(())
}

/// Load `path` and write it back in canonical form
fn format_file(files: &dyn FileAccess, config: &Config, path: &Path, check: bool) -> Result<Outcome> {
    let original = files.read_file(path)?;
    let project = open_project(files, config, path)?;
    let canonical = project.to_bytes()?;

    if canonical == original {
        Ok(Outcome::Unchanged)
    } else if check {
        Ok(Outcome::NeedsFormatting)
    } else {
        files.write_file(path, &canonical)?;
        Ok(Outcome::Formatted)
    }
}
