use crate::commands::project_files::CLI_CLIENT_ID;
use crate::config::{Config, DEFAULT_CONFIG_NAME, PROJECT_EXTENSION};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use trellis_common::RealFileAccess;
use trellis_editor::{EditSession, Project};

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Source directory
    #[arg(short, long, default_value = "src")]
    pub src_dir: String,

    /// Name of the first project file, without extension
    #[arg(short, long, default_value = "main")]
    pub name: String,

    /// Force overwrite existing config
    #[arg(short, long)]
    pub force: bool,
}

pub fn init(args: InitArgs, cwd: &str) -> Result<()> {
    let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

    if config_path.exists() && !args.force {
        println!(
            "{} {} already exists",
            "⚠️".yellow(),
            DEFAULT_CONFIG_NAME.bright_white()
        );
        println!("Use --force to overwrite");
        return Ok(());
    }

    println!("{}", "📝 Initializing Trellis project...".bright_blue().bold());

    let config = Config {
        src_dir: args.src_dir.clone(),
        ..Config::default()
    };

    let files = RealFileAccess::new(config.get_src_dir(cwd));
    let file_name = format!("{}.{}", args.name, PROJECT_EXTENSION);
    if !files.root().join(&file_name).exists() {
        let mut session = EditSession::new("init", Project::with_client_id(CLI_CLIENT_ID, config.editor.clone()));
        session.setup_init_content()?;
        session.project().save(&files, Path::new(&file_name))?;
        println!("  {} Created {}/{}", "✓".green(), args.src_dir, file_name);
    }

    fs::write(&config_path, serde_json::to_string_pretty(&config)?)?;
    println!("  {} Created {}", "✓".green(), DEFAULT_CONFIG_NAME);
    println!();
    println!("{}", "✅ Project initialized!".green().bold());
    println!();
    println!("Next steps:");
    println!("  1. Run: trellis pages");
    println!("  2. Run: trellis resolve --page \"Page 1\"");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_config_and_project() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = dir.path().display().to_string();
        let args = InitArgs {
            src_dir: "designs".to_string(),
            name: "app".to_string(),
            force: false,
        };
        init(args, &cwd).unwrap();

        let config = Config::load(&cwd).unwrap();
        assert_eq!(config.src_dir, "designs");

        let files = RealFileAccess::new(config.get_src_dir(&cwd));
        let project = crate::commands::project_files::open_project(
            &files,
            &config,
            Path::new("app.trellis"),
        )
        .unwrap();
        let pages = project.pages().unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].name.as_deref(), Some("Page 1"));
    }
}
