//! File-based recipe catalog

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use larder_core::{Recipe, RecipeId};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Result, StoreError};

/// Catalog metadata stored in `manifest.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogManifest {
    /// Schema version for forward compatibility
    pub version: u32,

    pub id: Uuid,

    pub name: String,

    /// Number of recipes as of the last flush
    #[serde(default)]
    pub recipe_count: usize,

    pub created_at: DateTime<Utc>,

    pub modified_at: DateTime<Utc>,
}

impl CatalogManifest {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            version: Self::CURRENT_VERSION,
            id: Uuid::new_v4(),
            name: name.into(),
            recipe_count: 0,
            created_at: now,
            modified_at: now,
        }
    }
}

/// A recipe catalog backed by the filesystem
///
/// Directory structure:
/// ```text
/// recipes.larder/
/// ├── manifest.json       # Catalog metadata
/// └── recipes/
///     ├── {recipe-id}.json
///     └── ...
/// ```
pub struct RecipeStore {
    pub path: PathBuf,

    manifest: CatalogManifest,

    /// Recipes loaded or written this session
    recipes: HashMap<RecipeId, Recipe>,

    /// Recipes that need saving
    dirty: HashSet<RecipeId>,
}

impl RecipeStore {
    const RECIPES_DIR: &'static str = "recipes";
    const MANIFEST_FILE: &'static str = "manifest.json";

    /// Create a new catalog at the given path
    pub async fn create(path: impl AsRef<Path>, name: impl Into<String>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let name = name.into();

        if path.join(Self::MANIFEST_FILE).exists() {
            return Err(StoreError::CatalogExists(path.display().to_string()));
        }

        fs::create_dir_all(path.join(Self::RECIPES_DIR)).await?;

        let manifest = CatalogManifest::new(&name);
        fs::write(path.join(Self::MANIFEST_FILE), serde_json::to_string_pretty(&manifest)?).await?;

        info!("Created recipe catalog '{}' at {:?}", name, path);
        Ok(Self {
            path,
            manifest,
            recipes: HashMap::new(),
            dirty: HashSet::new(),
        })
    }

    /// Open an existing catalog
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let manifest_path = path.join(Self::MANIFEST_FILE);
        if !manifest_path.exists() {
            return Err(StoreError::InvalidPath(format!(
                "No manifest found at {}",
                manifest_path.display()
            )));
        }

        let manifest: CatalogManifest = serde_json::from_str(&fs::read_to_string(&manifest_path).await?)?;

        info!("Opened recipe catalog '{}' from {:?}", manifest.name, path);
        Ok(Self {
            path,
            manifest,
            recipes: HashMap::new(),
            dirty: HashSet::new(),
        })
    }

    pub fn manifest(&self) -> &CatalogManifest {
        &self.manifest
    }

    /// Get a recipe by ID (loads from disk if not cached)
    pub async fn get_recipe(&mut self, id: RecipeId) -> Result<&Recipe> {
        if !self.recipes.contains_key(&id) {
            let recipe = self.load_recipe(id).await?;
            self.recipes.insert(id, recipe);
        }
        self.recipes.get(&id).ok_or(StoreError::RecipeNotFound(id))
    }

    /// Add or replace a recipe; written on the next `flush`
    pub fn put_recipe(&mut self, recipe: Recipe) -> Result<RecipeId> {
        if recipe.title.trim().is_empty() {
            return Err(StoreError::InvalidRecipe(format!("recipe {} has no title", recipe.id)));
        }
        let id = recipe.id;
        self.recipes.insert(id, recipe);
        self.dirty.insert(id);
        debug!("Staged recipe {}", id);
        Ok(id)
    }

    /// Delete a recipe from disk and cache
    pub async fn remove_recipe(&mut self, id: RecipeId) -> Result<()> {
        let recipe_path = self.recipe_path(id);
        let on_disk = recipe_path.exists();
        if !on_disk && !self.recipes.contains_key(&id) {
            return Err(StoreError::RecipeNotFound(id));
        }
        if on_disk {
            fs::remove_file(&recipe_path).await?;
        }

        self.recipes.remove(&id);
        self.dirty.remove(&id);

        debug!("Removed recipe {} from catalog", id);
        Ok(())
    }

    /// Parse recipe JSON (one object or an array) and stage every recipe
    pub fn import_json(&mut self, json: &str) -> Result<Vec<RecipeId>> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let recipes: Vec<Recipe> = match value {
            serde_json::Value::Array(_) => serde_json::from_value(value)?,
            serde_json::Value::Object(_) => vec![serde_json::from_value(value)?],
            _ => {
                return Err(StoreError::InvalidRecipe(
                    "expected a recipe object or an array of recipes".into(),
                ))
            }
        };

        recipes.into_iter().map(|r| self.put_recipe(r)).collect()
    }

    /// Write staged recipes and the manifest to disk
    pub async fn flush(&mut self) -> Result<()> {
        let dirty: Vec<RecipeId> = self.dirty.iter().copied().collect();
        for id in dirty {
            if let Some(recipe) = self.recipes.get(&id) {
                self.save_recipe_to_disk(recipe).await?;
            }
        }
        self.dirty.clear();

        self.manifest.recipe_count = self.list_recipe_ids().await?.len();
        self.manifest.modified_at = Utc::now();
        fs::write(
            self.path.join(Self::MANIFEST_FILE),
            serde_json::to_string_pretty(&self.manifest)?,
        )
        .await?;

        debug!("Flushed catalog {} to disk", self.manifest.id);
        Ok(())
    }

    /// IDs of all recipes on disk, sorted
    pub async fn list_recipe_ids(&self) -> Result<Vec<RecipeId>> {
        let mut entries = fs::read_dir(self.path.join(Self::RECIPES_DIR)).await?;
        let mut ids = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json") {
                if let Some(stem) = path.file_stem() {
                    if let Ok(id) = RecipeId::parse(&stem.to_string_lossy()) {
                        ids.push(id);
                    }
                }
            }
        }

        ids.sort();
        Ok(ids)
    }

    /// Every recipe in the catalog, in id order
    pub async fn load_all(&mut self) -> Result<Vec<Recipe>> {
        let mut ids = self.list_recipe_ids().await?;
        ids.extend(self.dirty.iter().copied());
        ids.sort();
        ids.dedup();

        let mut recipes = Vec::with_capacity(ids.len());
        for id in ids {
            recipes.push(self.get_recipe(id).await?.clone());
        }
        info!("Loaded {} recipes from catalog '{}'", recipes.len(), self.manifest.name);
        Ok(recipes)
    }

    // Private helpers

    fn recipe_path(&self, id: RecipeId) -> PathBuf {
        self.path.join(Self::RECIPES_DIR).join(format!("{}.json", id))
    }

    async fn load_recipe(&self, id: RecipeId) -> Result<Recipe> {
        let recipe_path = self.recipe_path(id);
        if !recipe_path.exists() {
            return Err(StoreError::RecipeNotFound(id));
        }

        let recipe: Recipe = serde_json::from_str(&fs::read_to_string(&recipe_path).await?)?;
        if recipe.id != id {
            return Err(StoreError::InvalidRecipe(format!(
                "{} holds recipe {}",
                recipe_path.display(),
                recipe.id
            )));
        }
        Ok(recipe)
    }

    async fn save_recipe_to_disk(&self, recipe: &Recipe) -> Result<()> {
        fs::write(self.recipe_path(recipe.id), serde_json::to_string_pretty(recipe)?).await?;
        debug!("Saved recipe {} to disk", recipe.id);
        Ok(())
    }
}
