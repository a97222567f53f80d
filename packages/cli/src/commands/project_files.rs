use crate::config::{Config, PROJECT_EXTENSION};
use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use tracing::debug;
use trellis_common::{FileAccess, Problem, ProblemReport};
use trellis_editor::Project;

/// Project files below `dir`, sorted
pub fn find_project_files(files: &dyn FileAccess, dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = dir.join(format!("**/*.{}", PROJECT_EXTENSION));
    let mut found = files.glob(&pattern.to_string_lossy())?;
    found.sort();
    debug!(count = found.len(), dir = %dir.display(), "found project files");
    Ok(found)
}

/// `input` itself when it is a file, otherwise every project file in it.
/// Defaults to the configured source directory.
pub fn resolve_inputs(
    files: &dyn FileAccess,
    config: &Config,
    cwd: &str,
    input: Option<&Path>,
) -> Result<Vec<PathBuf>> {
    let input = match input {
        Some(path) => PathBuf::from(cwd).join(path),
        None => config.get_src_dir(cwd),
    };
    match files.stat(&input) {
        Some(stats) if stats.kind == trellis_common::FileKind::File => Ok(vec![input]),
        Some(_) => find_project_files(files, &input),
        None => Err(anyhow!("Input path does not exist: {}", input.display())),
    }
}

/// Replica id of every project the CLI opens. Ids generated for a new
/// default page then match between runs.
pub const CLI_CLIENT_ID: u64 = 1;

pub fn open_project(files: &dyn FileAccess, config: &Config, path: &Path) -> Result<Project> {
    let mut project = Project::with_client_id(CLI_CLIENT_ID, config.editor.clone());
    project.load(files, path)?;
    Ok(project)
}

/// Load every file, collecting failures instead of stopping at the first
pub fn open_projects(
    files: &dyn FileAccess,
    config: &Config,
    paths: &[PathBuf],
) -> (Vec<(PathBuf, Project)>, ProblemReport) {
    let mut projects = Vec::new();
    let mut report = ProblemReport::new();
    for path in paths {
        match open_project(files, config, path) {
            Ok(project) => projects.push((path.clone(), project)),
            Err(err) => report.push(Problem::new(path, err)),
        }
    }
    (projects, report)
}

/// Path relative to `cwd` for display
pub fn display_path(path: &Path, cwd: &str) -> String {
    path.strip_prefix(cwd).unwrap_or(path).display().to_string()
}
