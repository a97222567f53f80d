use super::project_files::{display_path, open_projects, resolve_inputs};
use crate::config::Config;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use trellis_common::RealFileAccess;
use trellis_editor::Project;

#[derive(Debug, Args)]
pub struct PagesArgs {
    /// Project file or directory (defaults to the source directory)
    pub input: Option<PathBuf>,

    /// Also list components
    #[arg(short, long)]
    pub components: bool,
}

pub fn pages(args: PagesArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let files = RealFileAccess::new(cwd);
    let paths = resolve_inputs(&files, &config, cwd, args.input.as_deref())?;

    let (projects, report) = open_projects(&files, &config, &paths);
    for (path, project) in &projects {
        println!("{}", display_path(path, cwd).bright_white().bold());
        for line in outline(project, args.components)? {
            println!("{}", line);
        }
        println!();
    }

    report.into_result()?;
    Ok(())
}

/// Pages grouped by folder, then components
fn outline(project: &Project, components: bool) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    let mut folder: Option<String> = None;

    for page in project.pages()? {
        let name = page.name.unwrap_or_else(|| page.id.clone());
        let (page_folder, title) = match name.rsplit_once('/') {
            Some((page_folder, title)) => (Some(page_folder.to_string()), title.to_string()),
            None => (None, name.clone()),
        };
        if page_folder != folder {
            if let Some(page_folder) = &page_folder {
                lines.push(format!("  📁 {}", page_folder.cyan()));
            }
            folder = page_folder;
        }
        let indent = if folder.is_some() { "    " } else { "  " };
        lines.push(format!("{}📄 {} {}", indent, title, format!("#{}", page.id).dimmed()));
    }

    if components {
        for component in project.components()? {
            let name = component.name.unwrap_or_else(|| component.id.clone());
            lines.push(format!("  🧩 {} {}", name.magenta(), format!("#{}", component.id).dimmed()));
        }
    }
    Ok(lines)
}
