//! # Project
//!
//! Owns a [`DocumentStore`] plus the editor configuration and exposes the
//! document-level operations: pages, components, component library URLs,
//! images and canonical JSON load/save.
//!
//! Page names may contain `/` to group pages into folders:
//! `"Marketing/Home"` and `"Marketing/About"` both live in the
//! `Marketing` folder.

use crate::config::EditorConfig;
use crate::crdt::DocumentStore;
use crate::document::{NodeRecord, NodeType};
use crate::errors::EditorResult;
use crate::id::IdPath;
use crate::images::ImageStore;
use crate::selectable::Selectable;
use crate::serializer::{self, ProjectJson};
use std::path::Path;
use tracing::{debug, info, instrument};
use trellis_common::FileAccess;

pub struct Project {
    store: DocumentStore,
    config: EditorConfig,
}

impl Project {
    pub fn new(config: EditorConfig) -> Self {
        Self {
            store: DocumentStore::new(&config),
            config,
        }
    }

    /// Project whose replica uses a fixed client id (tests, replay)
    pub fn with_client_id(client_id: u64, config: EditorConfig) -> Self {
        Self {
            store: DocumentStore::with_client_id(client_id, &config),
            config,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut DocumentStore {
        &mut self.store
    }

    pub fn pages(&self) -> EditorResult<Vec<NodeRecord>> {
        Ok(self.store.snapshot()?.pages().cloned().collect())
    }

    pub fn components(&self) -> EditorResult<Vec<NodeRecord>> {
        Ok(self.store.snapshot()?.components().cloned().collect())
    }

    pub fn component_urls(&self) -> EditorResult<Vec<String>> {
        Ok(self.store.snapshot()?.component_urls().to_vec())
    }

    pub fn set_component_urls(&mut self, urls: Vec<String>) -> EditorResult<()> {
        self.store.transact(|tx| tx.set_component_urls(urls))
    }

    pub fn images(&self) -> EditorResult<ImageStore> {
        Ok(ImageStore::new(self.store.snapshot()?))
    }

    /// Element at `path` in the current state
    pub fn selectable(&self, path: &IdPath) -> EditorResult<Option<Selectable>> {
        Ok(Selectable::from_path(self.store.snapshot()?, path.clone()))
    }

    // ---- serialization ----

    pub fn to_json(&self) -> EditorResult<ProjectJson> {
        let snapshot = self.store.snapshot()?;
        Ok(serializer::to_json(&snapshot))
    }

    pub fn load_json(&mut self, json: &ProjectJson) -> EditorResult<()> {
        serializer::load_json(&mut self.store, json, &self.config.default_page_name)
    }

    pub fn to_bytes(&self) -> EditorResult<Vec<u8>> {
        Ok(self.to_json()?.to_bytes()?)
    }

    pub fn load_bytes(&mut self, bytes: &[u8]) -> EditorResult<()> {
        let json = ProjectJson::from_bytes(bytes)?;
        self.load_json(&json)
    }

    #[instrument(skip(self, files), fields(path = %path.display()))]
    pub fn load(&mut self, files: &dyn FileAccess, path: &Path) -> EditorResult<()> {
        let bytes = files.read_file(path)?;
        self.load_bytes(&bytes)
    }

    #[instrument(skip(self, files), fields(path = %path.display()))]
    pub fn save(&self, files: &dyn FileAccess, path: &Path) -> EditorResult<()> {
        let bytes = self.to_bytes()?;
        files.write_file(path, &bytes)?;
        info!(bytes = bytes.len(), "saved project");
        Ok(())
    }

    // ---- pages ----

    /// Append a page named `name`, or `name 2`, `name 3`, ... when taken
    pub fn create_page(&mut self, name: &str) -> EditorResult<String> {
        let existing: Vec<String> = self.pages()?.into_iter().filter_map(|page| page.name).collect();
        let name = incremental_unique_name(&existing, name);

        let id = self.store.transact(|tx| {
            let page = tx.create(NodeType::Page)?;
            tx.set_name(&page, Some(name.clone()))?;
            tx.reparent(&page, None, None)?;
            Ok(page)
        })?;
        debug!(page = %id, name = %name, "created page");
        Ok(id)
    }

    /// Pages named `path` or living in the folder `path`
    pub fn affected_pages(&self, path: &str) -> EditorResult<Vec<NodeRecord>> {
        Ok(self
            .pages()?
            .into_iter()
            .filter(|page| page.name.as_deref().is_some_and(|name| is_in_path(name, path)))
            .collect())
    }

    /// Delete the page named `path`, or every page in the folder `path`.
    /// Returns the ids of the removed pages.
    pub fn delete_page_or_folder(&mut self, path: &str) -> EditorResult<Vec<String>> {
        let ids: Vec<String> = self.affected_pages(path)?.into_iter().map(|page| page.id).collect();
        if !ids.is_empty() {
            self.store.remove(&ids)?;
        }
        Ok(ids)
    }

    /// Rename the page `path`, or move every page of the folder `path`
    /// under `new_path`
    pub fn rename_page_or_folder(&mut self, path: &str, new_path: &str) -> EditorResult<()> {
        let renames: Vec<(String, String)> = self
            .affected_pages(path)?
            .into_iter()
            .filter_map(|page| {
                let name = page.name?;
                let renamed = format!("{}{}", new_path, &name[path.len()..]);
                Some((page.id, renamed))
            })
            .collect();
        if renames.is_empty() {
            return Ok(());
        }
        self.store.transact(|tx| {
            for (id, name) in renames {
                tx.set_name(&id, Some(name))?;
            }
            Ok(())
        })
    }
}

fn is_in_path(name: &str, path: &str) -> bool {
    name == path
        || name
            .strip_prefix(path)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// `name` if unused, otherwise the next free `"<base> <n>"`, where a
/// trailing number on `name` is taken as the starting point
pub fn incremental_unique_name(existing: &[String], name: &str) -> String {
    if !existing.iter().any(|taken| taken == name) {
        return name.to_string();
    }

    let (base, start) = match name.rsplit_once(' ') {
        Some((base, number)) => match number.parse::<u64>() {
            Ok(n) => (base, n + 1),
            Err(_) => (name, 2),
        },
        None => (name, 2),
    };
    (start..)
        .map(|n| format!("{} {}", base, n))
        .find(|candidate| !existing.iter().any(|taken| taken == candidate))
        .unwrap_or_else(|| name.to_string())
}
