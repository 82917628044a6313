//! Profile store: definition sources, inheritance walking, resolved cache.

use crate::error::{ConformanceError, Result};
use crate::profile::{ConformanceProfile, ProfileDefinition};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const BUILTIN_DEFINITIONS: &[(&str, &str)] = &[
    ("baseline.json", include_str!("../profiles/baseline.json")),
    ("enterprise.json", include_str!("../profiles/enterprise.json")),
    ("gitlab-kagent.json", include_str!("../profiles/gitlab-kagent.json")),
];

/// A place raw profile definitions come from.
pub trait ProfileSource: Send + Sync {
    /// Look up the raw definition for `id`.
    fn definition(&self, id: &str) -> Option<ProfileDefinition>;

    /// Every id this source can serve.
    fn ids(&self) -> Vec<String>;
}

/// Definitions held in memory, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct StaticProfiles {
    definitions: BTreeMap<String, ProfileDefinition>,
}

impl StaticProfiles {
    pub fn new(definitions: impl IntoIterator<Item = ProfileDefinition>) -> Self {
        Self {
            definitions: definitions
                .into_iter()
                .map(|d| (d.id.clone(), d))
                .collect(),
        }
    }

    pub fn insert(&mut self, definition: ProfileDefinition) {
        self.definitions.insert(definition.id.clone(), definition);
    }
}

impl ProfileSource for StaticProfiles {
    fn definition(&self, id: &str) -> Option<ProfileDefinition> {
        self.definitions.get(id).cloned()
    }

    fn ids(&self) -> Vec<String> {
        self.definitions.keys().cloned().collect()
    }
}

/// The profiles shipped with the engine (`baseline`, `enterprise`,
/// `gitlab-kagent`).
pub struct BuiltinProfiles;

impl BuiltinProfiles {
    /// Parse the embedded definitions.
    pub fn load() -> Result<StaticProfiles> {
        let mut profiles = StaticProfiles::default();
        for (name, text) in BUILTIN_DEFINITIONS {
            profiles.insert(ProfileDefinition::from_json(name, text)?);
        }
        Ok(profiles)
    }
}

/// Definitions read from `*.json`, `*.yaml` and `*.yml` files in a directory.
#[derive(Debug, Clone)]
pub struct DirectoryProfiles {
    root: PathBuf,
    profiles: StaticProfiles,
}

impl DirectoryProfiles {
    pub fn load(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let mut profiles = StaticProfiles::default();

        let mut paths: Vec<PathBuf> = std::fs::read_dir(&root)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        paths.sort();

        for path in paths {
            let extension = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default()
                .to_ascii_lowercase();
            let source_name = path.display().to_string();
            let definition = match extension.as_str() {
                "json" => {
                    let text = std::fs::read_to_string(&path)?;
                    ProfileDefinition::from_json(&source_name, &text)?
                }
                "yaml" | "yml" => {
                    let text = std::fs::read_to_string(&path)?;
                    ProfileDefinition::from_yaml(&source_name, &text)?
                }
                _ => continue,
            };
            tracing::debug!(
                profile = %definition.id,
                file = %source_name,
                "loaded profile definition"
            );
            profiles.insert(definition);
        }

        Ok(Self { root, profiles })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ProfileSource for DirectoryProfiles {
    fn definition(&self, id: &str) -> Option<ProfileDefinition> {
        self.profiles.definition(id)
    }

    fn ids(&self) -> Vec<String> {
        self.profiles.ids()
    }
}

/// Stacked sources; the first layer that knows an id wins.
#[derive(Default)]
pub struct LayeredProfiles {
    layers: Vec<Box<dyn ProfileSource>>,
}

impl LayeredProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a layer below the existing ones.
    pub fn with_layer(mut self, source: impl ProfileSource + 'static) -> Self {
        self.layers.push(Box::new(source));
        self
    }
}

impl ProfileSource for LayeredProfiles {
    fn definition(&self, id: &str) -> Option<ProfileDefinition> {
        self.layers.iter().find_map(|layer| layer.definition(id))
    }

    fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.layers.iter().flat_map(|layer| layer.ids()).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// Listing entry for a profile, inheritance not applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub extends: Option<String>,
}

/// Resolves profile ids to cached, immutable [`ConformanceProfile`]s.
///
/// Cached entries never change, so readers share them without locking.
/// Two callers missing the same id at once may both resolve it; the result
/// is identical and the first insert wins.
pub struct ProfileStore {
    source: Box<dyn ProfileSource>,
    cache: DashMap<String, Arc<ConformanceProfile>>,
}

impl ProfileStore {
    pub fn new(source: impl ProfileSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            cache: DashMap::new(),
        }
    }

    /// Store over the embedded profiles.
    pub fn builtin() -> Result<Self> {
        Ok(Self::new(BuiltinProfiles::load()?))
    }

    /// Store over a profile directory layered on top of the builtins.
    pub fn with_directory(root: impl AsRef<Path>) -> Result<Self> {
        let layered = LayeredProfiles::new()
            .with_layer(DirectoryProfiles::load(root)?)
            .with_layer(BuiltinProfiles::load()?);
        Ok(Self::new(layered))
    }

    /// Resolve `id`, walking its `extends` chain.
    pub fn get_profile(&self, id: &str) -> Result<Arc<ConformanceProfile>> {
        if let Some(profile) = self.cache.get(id) {
            tracing::debug!(profile = %id, "profile cache hit");
            return Ok(Arc::clone(profile.value()));
        }

        tracing::debug!(profile = %id, "profile cache miss, resolving");
        let chain = self.load_chain(id)?;
        let ordered: Vec<&ProfileDefinition> = chain.iter().rev().collect();
        let resolved = Arc::new(ConformanceProfile::resolve(&ordered)?);

        let entry = self.cache.entry(id.to_string()).or_insert_with(|| resolved);
        Ok(Arc::clone(entry.value()))
    }

    /// Definitions from `id` up to its root, child first.
    fn load_chain(&self, id: &str) -> Result<Vec<ProfileDefinition>> {
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(id.to_string());

        while let Some(current) = next {
            if !visited.insert(current.clone()) {
                let mut cycle: Vec<String> = chain
                    .iter()
                    .map(|d: &ProfileDefinition| d.id.clone())
                    .collect();
                cycle.push(current);
                return Err(ConformanceError::CircularInheritance { chain: cycle });
            }

            let definition = self
                .source
                .definition(&current)
                .ok_or_else(|| ConformanceError::ProfileNotFound(current.clone()))?;
            next = definition.extends.clone();
            chain.push(definition);
        }

        Ok(chain)
    }

    /// All known profiles, sorted by id.
    pub fn list_profiles(&self) -> Vec<ProfileSummary> {
        self.source
            .ids()
            .into_iter()
            .filter_map(|id| self.source.definition(&id))
            .map(|d| ProfileSummary {
                name: d.name.clone().unwrap_or_else(|| d.id.clone()),
                description: d.description.clone().unwrap_or_default(),
                extends: d.extends.clone(),
                id: d.id,
            })
            .collect()
    }

    pub fn has_profile(&self, id: &str) -> bool {
        self.source.definition(id).is_some()
    }

    /// Drop every resolved profile; the next lookup re-reads the source.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}

lazy_static::lazy_static! {
    static ref GLOBAL_STORE: Option<ProfileStore> = match ProfileStore::builtin() {
        Ok(store) => Some(store),
        Err(e) => {
            tracing::error!(error = %e, "embedded conformance profiles failed to load");
            None
        }
    };
}

/// Process-wide store over the builtin profiles.
pub fn global_store() -> Result<&'static ProfileStore> {
    GLOBAL_STORE
        .as_ref()
        .ok_or_else(|| ConformanceError::InvalidProfile {
            id: "builtin".to_string(),
            reason: "embedded profiles failed to load".to_string(),
        })
}
