use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use schnellru::{ByLength, LruMap};
use tracing::{debug, info};

use crate::{
    CatalogError, ContentConfig, LephonPhase, MapDescriptor, MapId, MapSummary, Step, LEPHON_MAP_ID,
};

/// Bounded cache for parsed map descriptors.
const PARSE_CACHE_CAPACITY: u32 = 128;

pub const LEPHON_PHASE_COUNT: LephonPhase = 4;

#[derive(Default)]
struct CatalogIndex {
    map_paths: HashMap<MapId, PathBuf>,
    summaries: HashMap<MapId, MapSummary>,
    chapters: BTreeMap<u32, Vec<MapId>>,
    chapters_without_repeatable: BTreeMap<u32, Vec<MapId>>,
}

/// Process-wide index over the world-map content directory.
///
/// Initialised once by walking the content folder; descriptors are parsed
/// lazily through a bounded LRU. [`MapCatalog::reinitialise`] is the
/// content hot-reload hook: it drops every index and cached parse and
/// walks again.
pub struct MapCatalog {
    content: ContentConfig,
    index: RwLock<CatalogIndex>,
    parsed: Mutex<LruMap<MapId, Arc<MapDescriptor>>>,
    phases: Mutex<HashMap<LephonPhase, Arc<Vec<Step>>>>,
}

impl MapCatalog {
    pub fn open(content: ContentConfig) -> Result<Self, CatalogError> {
        let catalog = Self {
            content,
            index: RwLock::new(CatalogIndex::default()),
            parsed: Mutex::new(LruMap::new(ByLength::new(PARSE_CACHE_CAPACITY))),
            phases: Mutex::new(HashMap::new()),
        };

        catalog.reinitialise()?;

        Ok(catalog)
    }

    /// Drop all indexes and caches and re-walk the content directory.
    pub fn reinitialise(&self) -> Result<(), CatalogError> {
        let mut index = CatalogIndex::default();

        let mut files = vec![];
        collect_json_files(&self.content.maps_path, &mut files)?;

        for path in files {
            let Some(map_id) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let map_id = map_id.to_owned();

            let descriptor = parse_descriptor(&path, &map_id)?;
            let summary = MapSummary::from(descriptor.as_ref());

            if let Some(chapter) = summary.chapter {
                index
                    .chapters
                    .entry(chapter)
                    .or_default()
                    .push(map_id.clone());

                if !summary.is_repeatable {
                    index
                        .chapters_without_repeatable
                        .entry(chapter)
                        .or_default()
                        .push(map_id.clone());
                }
            }

            index.summaries.insert(map_id.clone(), summary);
            index.map_paths.insert(map_id, path);
        }

        info!(maps = index.map_paths.len(), "world map catalog indexed");

        *self.index.write().expect("catalog index poisoned") = index;
        *self.parsed.lock().expect("parse cache poisoned") =
            LruMap::new(ByLength::new(PARSE_CACHE_CAPACITY));
        self.phases.lock().expect("phase cache poisoned").clear();

        Ok(())
    }

    pub fn contains(&self, map_id: &str) -> bool {
        self.index
            .read()
            .expect("catalog index poisoned")
            .map_paths
            .contains_key(map_id)
    }

    pub fn map_ids(&self) -> Vec<MapId> {
        let mut ids: Vec<_> = self
            .index
            .read()
            .expect("catalog index poisoned")
            .map_paths
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn summary(&self, map_id: &str) -> Option<MapSummary> {
        self.index
            .read()
            .expect("catalog index poisoned")
            .summaries
            .get(map_id)
            .cloned()
    }

    pub fn chapter_maps(&self, chapter: u32) -> Vec<MapId> {
        self.index
            .read()
            .expect("catalog index poisoned")
            .chapters
            .get(&chapter)
            .cloned()
            .unwrap_or_default()
    }

    /// Chapter roster excluding repeatable maps; the denominator of the
    /// salt-skill completion ratio.
    pub fn chapter_maps_without_repeatable(&self, chapter: u32) -> Vec<MapId> {
        self.index
            .read()
            .expect("catalog index poisoned")
            .chapters_without_repeatable
            .get(&chapter)
            .cloned()
            .unwrap_or_default()
    }

    /// Parsed descriptor for a map, via the bounded parse cache.
    pub fn descriptor(&self, map_id: &str) -> Result<Arc<MapDescriptor>, CatalogError> {
        {
            let mut cache = self.parsed.lock().expect("parse cache poisoned");
            if let Some(hit) = cache.get(map_id) {
                return Ok(hit.clone());
            }
        }

        let path = {
            let index = self.index.read().expect("catalog index poisoned");
            index
                .map_paths
                .get(map_id)
                .cloned()
                .ok_or_else(|| CatalogError::UnknownMap(map_id.to_owned()))?
        };

        debug!(map_id, "parsing map descriptor");
        let descriptor = parse_descriptor(&path, map_id)?;

        self.parsed
            .lock()
            .expect("parse cache poisoned")
            .insert(map_id.to_owned(), descriptor.clone());

        Ok(descriptor)
    }

    /// Step list for one lephon phase, parsed once per phase.
    pub fn lephon_phase(&self, phase: LephonPhase) -> Result<Arc<Vec<Step>>, CatalogError> {
        if phase >= LEPHON_PHASE_COUNT {
            return Err(CatalogError::UnknownPhase(phase));
        }

        {
            let cache = self.phases.lock().expect("phase cache poisoned");
            if let Some(hit) = cache.get(&phase) {
                return Ok(hit.clone());
            }
        }

        let path = self.content.lephon_path.join(format!("{}.json", phase + 1));
        let file = std::fs::File::open(&path)?;

        let parsed: PhaseFile = serde_json::from_reader(std::io::BufReader::new(file))
            .map_err(|e| CatalogError::Malformed {
                map_id: LEPHON_MAP_ID.into(),
                reason: format!("phase {phase}: {e}"),
            })?;

        let steps = Arc::new(parsed.steps);

        self.phases
            .lock()
            .expect("phase cache poisoned")
            .insert(phase, steps.clone());

        Ok(steps)
    }
}

#[derive(serde::Deserialize)]
struct PhaseFile {
    steps: Vec<Step>,
}

fn collect_json_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), CatalogError> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            collect_json_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "json") {
            out.push(path);
        }
    }

    Ok(())
}

fn parse_descriptor(path: &Path, map_id: &str) -> Result<Arc<MapDescriptor>, CatalogError> {
    let file = std::fs::File::open(path)?;

    let mut descriptor: MapDescriptor = serde_json::from_reader(std::io::BufReader::new(file))
        .map_err(|e| CatalogError::Malformed {
            map_id: map_id.to_owned(),
            reason: e.to_string(),
        })?;

    descriptor.map_id = map_id.to_owned();
    descriptor.validate()?;

    Ok(Arc::new(descriptor))
}
