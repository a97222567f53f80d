//! # Edit Session Management
//!
//! One user's view of a [`Project`]: the open page, the selection, the
//! collapsed layer-tree rows and clipboard operations.
//!
//! Sessions hold paths, never selectables. Selectables are rebuilt from
//! the current snapshot on each read, so a selection survives remote
//! edits and silently drops paths that stop resolving.

use crate::clipboard::{self, ClipboardPayload, PasteReport};
use crate::document::{NodeRecord, NodeType};
use crate::errors::{EditorError, EditorResult};
use crate::id::IdPath;
use crate::images::ImageFetcher;
use crate::project::Project;
use crate::selectable::{Selectable, SelectionSet};
use crate::serializer::ProjectJson;
use std::collections::BTreeSet;
use tracing::{debug, instrument};

/// Single edit session over a project
pub struct EditSession {
    /// Unique session identifier
    pub id: String,

    project: Project,

    /// Page shown in the canvas
    page_id: Option<String>,

    selection: SelectionSet,

    /// Layer rows folded in the outline
    collapsed_paths: BTreeSet<IdPath>,
}

impl EditSession {
    pub fn new(id: impl Into<String>, project: Project) -> Self {
        Self {
            id: id.into(),
            project,
            page_id: None,
            selection: SelectionSet::new(),
            collapsed_paths: BTreeSet::new(),
        }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn project_mut(&mut self) -> &mut Project {
        &mut self.project
    }

    /// Give an empty project its first page and the configured component
    /// libraries. Not undoable.
    pub fn setup_init_content(&mut self) -> EditorResult<()> {
        if self.project.pages()?.is_empty() {
            let name = self.project.config().default_page_name.clone();
            self.project.create_page(&name)?;
        }
        let defaults = self.project.config().default_component_urls.clone();
        if self.project.component_urls()?.is_empty() && !defaults.is_empty() {
            self.project.set_component_urls(defaults)?;
        }
        self.project.store_mut().clear_history();
        self.ensure_page()
    }

    /// Replace the document. The open page stays open if it still exists.
    pub fn load_json(&mut self, json: &ProjectJson) -> EditorResult<()> {
        self.project.load_json(json)?;
        self.refresh()
    }

    // ---- pages ----

    pub fn open_page(&mut self, page_id: &str) -> EditorResult<()> {
        let snapshot = self.project.store().snapshot()?;
        match snapshot.node(page_id) {
            Some(node) if node.node_type == NodeType::Page => {}
            _ => return Err(EditorError::invalid(format!("`{}` is not a page", page_id))),
        }
        if self.page_id.as_deref() != Some(page_id) {
            self.page_id = Some(page_id.to_string());
            self.selection.clear();
            debug!(session = %self.id, page = %page_id, "opened page");
        }
        Ok(())
    }

    pub fn page(&self) -> EditorResult<Option<NodeRecord>> {
        let snapshot = self.project.store().snapshot()?;
        Ok(self
            .page_id
            .as_deref()
            .and_then(|id| snapshot.node(id))
            .filter(|node| node.node_type == NodeType::Page)
            .cloned())
    }

    pub fn page_id(&self) -> Option<&str> {
        self.page_id.as_deref()
    }

    /// Create a page with a unique name and open it
    pub fn create_page(&mut self, name: &str) -> EditorResult<String> {
        let id = self.project.create_page(name)?;
        self.open_page(&id)?;
        Ok(id)
    }

    /// Delete a page or folder; opens the first remaining page if the
    /// current one was removed
    pub fn delete_page_or_folder(&mut self, path: &str) -> EditorResult<Vec<String>> {
        let removed = self.project.delete_page_or_folder(path)?;
        self.refresh()?;
        Ok(removed)
    }

    pub fn rename_page_or_folder(&mut self, path: &str, new_path: &str) -> EditorResult<()> {
        self.project.rename_page_or_folder(path, new_path)
    }

    // ---- selection ----

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    /// Select `path`; without `extend` the previous selection is replaced
    pub fn select(&mut self, path: IdPath, extend: bool) -> EditorResult<()> {
        if self.project.selectable(&path)?.is_none() {
            return Err(EditorError::invalid(format!("`{}` does not resolve", path)));
        }
        if !extend {
            self.selection.clear();
        }
        self.selection.insert(path);
        Ok(())
    }

    pub fn deselect(&mut self, path: &IdPath) -> bool {
        self.selection.remove(path)
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Selected elements on the open page in document order. A selected
    /// element hides any selection below it; other pages are ignored.
    pub fn selected_selectables(&self) -> EditorResult<Vec<Selectable>> {
        let snapshot = self.project.store().snapshot()?;
        let page = self
            .page_id
            .as_deref()
            .and_then(|id| Selectable::root(snapshot, id));
        Ok(page
            .map(|page| {
                page.children()
                    .iter()
                    .flat_map(|child| child.selected_descendants(&self.selection))
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Selected document nodes; elements inside instances are skipped
    pub fn selected_nodes(&self) -> EditorResult<Vec<NodeRecord>> {
        Ok(self
            .selected_selectables()?
            .into_iter()
            .filter(|selectable| selectable.path().len() == 1)
            .map(|selectable| selectable.node().clone())
            .collect())
    }

    // ---- outline ----

    pub fn is_collapsed(&self, path: &IdPath) -> bool {
        self.collapsed_paths.contains(path)
    }

    pub fn set_collapsed(&mut self, path: IdPath, collapsed: bool) {
        if collapsed {
            self.collapsed_paths.insert(path);
        } else {
            self.collapsed_paths.remove(&path);
        }
    }

    pub fn collapsed_paths(&self) -> &BTreeSet<IdPath> {
        &self.collapsed_paths
    }

    // ---- clipboard ----

    pub fn copy(&self) -> EditorResult<ClipboardPayload> {
        let snapshot = self.project.store().snapshot()?;
        let selected = self.selected_selectables()?;
        Ok(clipboard::extract(
            &snapshot,
            &selected,
            &self.project.config().clipboard_version,
        ))
    }

    /// Paste into the open page and select the pasted elements
    #[instrument(skip_all, fields(session = %self.id))]
    pub async fn paste(
        &mut self,
        payload: &ClipboardPayload,
        fetcher: &dyn ImageFetcher,
    ) -> EditorResult<PasteReport> {
        let page_id = self
            .page_id
            .clone()
            .ok_or_else(|| EditorError::invalid("no page is open"))?;
        let last_selected = self
            .selected_selectables()?
            .last()
            .map(|selectable| selectable.path().clone());

        let report = clipboard::paste(
            self.project.store_mut(),
            &page_id,
            last_selected.as_ref(),
            payload,
            fetcher,
        )
        .await?;

        self.selection = report.inserted.iter().cloned().collect();
        Ok(report)
    }

    // ---- history ----

    pub fn undo(&mut self) -> EditorResult<bool> {
        let undone = self.project.store_mut().undo()?;
        self.refresh()?;
        Ok(undone)
    }

    pub fn redo(&mut self) -> EditorResult<bool> {
        let redone = self.project.store_mut().redo()?;
        self.refresh()?;
        Ok(redone)
    }

    /// Re-anchor session state after the document changed underneath it
    fn refresh(&mut self) -> EditorResult<()> {
        self.ensure_page()?;
        let snapshot = self.project.store().snapshot()?;
        self.selection.retain_valid(&snapshot);
        Ok(())
    }

    fn ensure_page(&mut self) -> EditorResult<()> {
        if self.page()?.is_none() {
            let first = self.project.pages()?.into_iter().next().map(|page| page.id);
            if first != self.page_id {
                self.selection.clear();
            }
            self.page_id = first;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::images::DataUrlFetcher;

    fn session() -> EditSession {
        let config = EditorConfig {
            default_component_urls: vec!["https://example.com/ui.trellis".to_string()],
            ..Default::default()
        };
        let mut session = EditSession::new("client-1", Project::with_client_id(21, config));
        session.setup_init_content().unwrap();
        session
    }

    #[test]
    fn test_init_content() {
        let session = session();
        let page = session.page().unwrap().unwrap();
        assert_eq!(page.name.as_deref(), Some("Page 1"));
        assert_eq!(
            session.project().component_urls().unwrap(),
            ["https://example.com/ui.trellis"]
        );
        assert!(!session.project().store().can_undo());
    }

    #[test]
    fn test_deleting_open_page_moves_to_first() {
        let mut session = session();
        let first = session.page_id().unwrap().to_string();
        let second = session.create_page("Page 1").unwrap();
        assert_eq!(session.page_id(), Some(second.as_str()));

        session.delete_page_or_folder("Page 2").unwrap();
        assert_eq!(session.page_id(), Some(first.as_str()));
    }

    #[test]
    fn test_selection_drops_removed_nodes() {
        let mut session = session();
        let page = session.page_id().unwrap().to_string();
        let frame = session
            .project_mut()
            .store_mut()
            .transact(|tx| {
                let frame = tx.create(NodeType::Frame)?;
                tx.append(&page, &[frame.clone()])?;
                Ok(frame)
            })
            .unwrap();

        session.select(IdPath::single(&frame), false).unwrap();
        assert_eq!(session.selected_nodes().unwrap().len(), 1);
        assert!(session.select(IdPath::single("missing"), true).is_err());

        session.undo().unwrap();
        assert!(session.selection().is_empty());
    }

    #[tokio::test]
    async fn test_copy_paste_selects_copies() {
        let mut session = session();
        let page = session.page_id().unwrap().to_string();
        let frame = session
            .project_mut()
            .store_mut()
            .transact(|tx| {
                let frame = tx.create(NodeType::Frame)?;
                tx.append(&page, &[frame.clone()])?;
                tx.set_name(&frame, Some("Card".to_string()))?;
                Ok(frame)
            })
            .unwrap();
        session.select(IdPath::single(&frame), false).unwrap();

        let payload = session.copy().unwrap();
        let report = session.paste(&payload, &DataUrlFetcher).await.unwrap();
        assert_eq!(report.inserted.len(), 1);

        let selected = session.selected_nodes().unwrap();
        assert_eq!(selected.len(), 1);
        assert_ne!(selected[0].id, frame);
        assert_eq!(selected[0].name.as_deref(), Some("Card"));

        let snapshot = session.project().store().snapshot().unwrap();
        assert_eq!(snapshot.child_ids(&page).len(), 2);
    }
}
