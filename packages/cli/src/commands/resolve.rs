use super::project_files::{display_path, open_project};
use crate::config::Config;
use anyhow::{anyhow, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use tracing::info;
use trellis_common::{FileAccess, RealFileAccess};
use trellis_editor::{ConcreteAttributes, NodeType, Project, Selectable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Args)]
pub struct ResolveArgs {
    /// Project file
    pub input: PathBuf,

    /// Page name or id (defaults to every page)
    #[arg(short, long)]
    pub page: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Print again whenever the file changes
    #[arg(short, long)]
    pub watch: bool,
}

/// One element of the resolved tree
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResolvedElement {
    path: String,
    #[serde(rename = "type")]
    node_type: NodeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    attributes: ConcreteAttributes,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<ResolvedElement>,
}

impl ResolvedElement {
    fn from_selectable(selectable: &Selectable) -> Self {
        Self {
            path: selectable.path().key(),
            node_type: selectable.node_type(),
            name: selectable.node().name.clone(),
            attributes: selectable.resolve(),
            children: selectable
                .children()
                .iter()
                .map(ResolvedElement::from_selectable)
                .collect(),
        }
    }

    fn write_text(&self, depth: usize, out: &mut Vec<String>) {
        let indent = "  ".repeat(depth);
        let label = self.name.as_deref().unwrap_or("");
        out.push(format!(
            "{}{} {} {}",
            indent,
            self.node_type.to_string().cyan(),
            label.bright_white(),
            format!("#{}", self.path).dimmed()
        ));
        for (property, value) in self.attributes.to_css() {
            out.push(format!("{}  {}: {};", indent, property.dimmed(), value));
        }
        for child in &self.children {
            child.write_text(depth + 1, out);
        }
    }
}

pub fn resolve(args: ResolveArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let files = RealFileAccess::new(cwd);
    let path = PathBuf::from(cwd).join(&args.input);

    print_resolved(&files, &config, &path, &args)?;
    if !args.watch {
        return Ok(());
    }

    println!("\n{}", "👀 Watching for changes...".bright_blue());
    let (sender, receiver) = mpsc::channel();
    let pattern = display_path(&path, cwd);
    let _handle = files.watch(
        &pattern,
        Arc::new(move || {
            let _ = sender.send(());
        }),
    )?;

    while receiver.recv().is_ok() {
        // Editors often write a file several times in a row
        while receiver.try_recv().is_ok() {}
        info!(path = %path.display(), "file changed");
        if let Err(err) = print_resolved(&files, &config, &path, &args) {
            eprintln!("{} {}", "Error:".red().bold(), err);
        }
    }
    Ok(())
}

fn print_resolved(
    files: &dyn FileAccess,
    config: &Config,
    path: &Path,
    args: &ResolveArgs,
) -> Result<()> {
    let project = open_project(files, config, path)?;
    let elements = resolve_pages(&project, args.page.as_deref())?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&elements)?),
        OutputFormat::Text => {
            let mut lines = Vec::new();
            for element in &elements {
                element.write_text(0, &mut lines);
            }
            println!("{}", lines.join("\n"));
        }
    }
    Ok(())
}

fn resolve_pages(project: &Project, page: Option<&str>) -> Result<Vec<ResolvedElement>> {
    let snapshot = project.store().snapshot()?;
    let pages: Vec<_> = project
        .pages()?
        .into_iter()
        .filter(|candidate| {
            page.map_or(true, |wanted| {
                candidate.id == wanted || candidate.name.as_deref() == Some(wanted)
            })
        })
        .collect();
    if let (Some(wanted), true) = (page, pages.is_empty()) {
        return Err(anyhow!("No page named `{}`", wanted));
    }

    Ok(pages
        .iter()
        .filter_map(|page| Selectable::root(std::rc::Rc::clone(&snapshot), &page.id))
        .map(|selectable| ResolvedElement::from_selectable(&selectable))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_editor::{EditorConfig, IdPath, Layout, PartialStyle, SizeConstraint, StackDirection};

    fn project() -> (Project, String) {
        let mut project = Project::with_client_id(2, EditorConfig::default());
        let page = project.create_page("Home").unwrap();
        let frame = project
            .store_mut()
            .transact(|tx| {
                let frame = tx.create(NodeType::Frame)?;
                let text = tx.create(NodeType::Text)?;
                tx.append(&page, &[frame.clone()])?;
                tx.append(&frame, &[text.clone()])?;
                tx.set_style(
                    &IdPath::single(&frame),
                    &PartialStyle {
                        layout: Some(Layout::Stack),
                        stack_direction: Some(StackDirection::Y),
                        ..Default::default()
                    },
                )?;
                tx.set_style(
                    &IdPath::single(&text),
                    &PartialStyle {
                        width: Some(SizeConstraint::Fill),
                        ..Default::default()
                    },
                )?;
                Ok(frame)
            })
            .unwrap();
        (project, frame)
    }

    #[test]
    fn test_resolves_page_tree() {
        let (project, frame) = project();
        let elements = resolve_pages(&project, Some("Home")).unwrap();
        assert_eq!(elements.len(), 1);

        let frame_element = &elements[0].children[0];
        assert_eq!(frame_element.path, frame);
        let text = &frame_element.children[0];
        assert_eq!(text.node_type, NodeType::Text);
        let json = serde_json::to_value(&text.attributes).unwrap();
        assert_eq!(json["alignSelf"], "stretch");
    }

    #[test]
    fn test_unknown_page() {
        let (project, _) = project();
        assert!(resolve_pages(&project, Some("Missing")).is_err());
        assert_eq!(resolve_pages(&project, None).unwrap().len(), 1);
    }

    #[test]
    fn test_text_output_lists_declarations() {
        colored::control::set_override(false);
        let (project, _) = project();
        let elements = resolve_pages(&project, None).unwrap();
        let mut lines = Vec::new();
        elements[0].write_text(0, &mut lines);
        assert!(lines[0].starts_with("page Home #"));
        assert!(lines.iter().any(|line| line.trim() == "flex-direction: column;"));
    }
}
