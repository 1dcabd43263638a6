use super::catalog::{Catalog, CatalogLock, ItemRecord, commit_catalog, load_catalog};
use super::options::StoreOptions;
use super::types::{Collection, EntityKind, Item, ItemId, StoreError};
use crate::util::write_atomic;
use chrono::Utc;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::fs;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task;
use uuid::Uuid;

/// Durable store of collections and their captured items.
///
/// Mutations inside one process are serialised by an async gate and across
/// processes by an exclusive lock on the catalog file, so the count read and
/// the insert in [`ScreenshotStore::add_item`] cannot interleave with another
/// writer. All file I/O runs on the blocking pool.
pub struct ScreenshotStore {
    options: Arc<StoreOptions>,
    write_gate: Mutex<()>,
}

impl ScreenshotStore {
    /// Open (creating if needed) the store rooted at `options.base_dir`.
    pub fn open(options: StoreOptions) -> Result<Self, StoreError> {
        fs::create_dir_all(options.blob_dir())?;
        info!("Opened screenshot store at {}", options.base_dir.display());
        Ok(Self {
            options: Arc::new(options),
            write_gate: Mutex::new(()),
        })
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Create a collection with a fresh id and `created_at = now`.
    pub async fn create_collection(&self, name: &str) -> Result<Collection, StoreError> {
        let name = name.to_string();
        self.write(move |options, catalog| {
            let collection = Collection {
                id: Uuid::new_v4().to_string(),
                name,
                created_at: Utc::now(),
            };
            catalog
                .collections
                .insert(collection.id.clone(), collection.clone());
            commit_catalog(catalog, options)?;
            info!(
                "Created collection '{}' ({})",
                collection.name, collection.id
            );
            Ok(collection)
        })
        .await
    }

    /// Snapshot of every collection. No ordering is promised.
    pub async fn list_collections(&self) -> Result<Vec<Collection>, StoreError> {
        self.read(|_, catalog| Ok(catalog.collections.values().cloned().collect()))
            .await
    }

    pub async fn get_collection(&self, id: &str) -> Result<Option<Collection>, StoreError> {
        let id = id.to_string();
        self.read(move |_, catalog| Ok(catalog.collections.get(&id).cloned()))
            .await
    }

    /// Return the oldest existing collection, creating one called `name` when
    /// the store has none.
    pub async fn ensure_default_collection(&self, name: &str) -> Result<Collection, StoreError> {
        let name = name.to_string();
        self.write(move |options, catalog| {
            if let Some(existing) = catalog
                .collections
                .values()
                .min_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            {
                return Ok(existing.clone());
            }

            let collection = Collection {
                id: Uuid::new_v4().to_string(),
                name,
                created_at: Utc::now(),
            };
            catalog
                .collections
                .insert(collection.id.clone(), collection.clone());
            commit_catalog(catalog, options)?;
            info!(
                "Created default collection '{}' ({})",
                collection.name, collection.id
            );
            Ok(collection)
        })
        .await
    }

    /// Persist `image` as a new item of `collection_id`.
    ///
    /// `order` is the number of items the collection already holds. Fails with
    /// [`StoreError::NotFound`] when the collection does not exist.
    pub async fn add_item(
        &self,
        collection_id: &str,
        image: Vec<u8>,
    ) -> Result<ItemId, StoreError> {
        let collection_id = collection_id.to_string();
        self.write(move |options, catalog| {
            if !catalog.collections.contains_key(&collection_id) {
                return Err(StoreError::collection_not_found(collection_id));
            }

            let id = catalog.next_item_id;
            let order = catalog.count_in(&collection_id) as u64;
            let blob = StoreOptions::blob_file_name(id);
            let blob_path = options.blob_path(&blob);

            write_atomic(&blob_path, &image)?;

            catalog.next_item_id = id + 1;
            catalog.items.insert(
                id,
                ItemRecord {
                    collection_id: collection_id.clone(),
                    timestamp: Utc::now(),
                    order,
                    blob,
                },
            );

            if let Err(err) = commit_catalog(catalog, options) {
                remove_blob(&blob_path);
                return Err(err.into());
            }

            info!(
                "Stored item {} in collection {} (order {}, {} bytes)",
                id,
                collection_id,
                order,
                image.len()
            );
            Ok(id)
        })
        .await
    }

    /// All items of `collection_id`, in no promised order. A missing
    /// collection yields an empty list.
    pub async fn list_items_by_collection(
        &self,
        collection_id: &str,
    ) -> Result<Vec<Item>, StoreError> {
        let collection_id = collection_id.to_string();
        self.read(move |options, catalog| {
            catalog
                .items_in(&collection_id)
                .map(|(id, record)| {
                    let path = options.blob_path(&record.blob);
                    let image = fs::read(&path).map_err(|err| {
                        StoreError::StorageFailed(format!(
                            "image for item {} unreadable at {}: {}",
                            id,
                            path.display(),
                            err
                        ))
                    })?;
                    Ok(Item {
                        id,
                        collection_id: record.collection_id.clone(),
                        image,
                        timestamp: record.timestamp,
                        order: record.order,
                    })
                })
                .collect()
        })
        .await
    }

    /// Items of `collection_id` sorted for display: newest first.
    ///
    /// Items sharing a timestamp are ordered by descending id, so reversing
    /// the list always yields insertion order.
    pub async fn items_newest_first(&self, collection_id: &str) -> Result<Vec<Item>, StoreError> {
        let mut items = self.list_items_by_collection(collection_id).await?;
        items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(items)
    }

    /// Fetch a single item, failing with [`StoreError::NotFound`] when it is absent.
    pub async fn get_item(&self, item_id: ItemId) -> Result<Item, StoreError> {
        self.read(move |options, catalog| {
            let record = catalog.items.get(&item_id).ok_or(StoreError::NotFound {
                kind: EntityKind::Item,
                id: item_id.to_string(),
            })?;
            let image = fs::read(options.blob_path(&record.blob))?;
            Ok(Item {
                id: item_id,
                collection_id: record.collection_id.clone(),
                image,
                timestamp: record.timestamp,
                order: record.order,
            })
        })
        .await
    }

    pub async fn count_items(&self, collection_id: &str) -> Result<usize, StoreError> {
        let collection_id = collection_id.to_string();
        self.read(move |_, catalog| Ok(catalog.count_in(&collection_id)))
            .await
    }

    /// Remove one item. Returns `false` when it was already absent.
    pub async fn delete_item(&self, item_id: ItemId) -> Result<bool, StoreError> {
        self.write(move |options, catalog| {
            let Some(record) = catalog.items.remove(&item_id) else {
                debug!("Item {} already absent; nothing to delete", item_id);
                return Ok(false);
            };
            commit_catalog(catalog, options)?;
            remove_blob(&options.blob_path(&record.blob));
            info!("Deleted item {}", item_id);
            Ok(true)
        })
        .await
    }

    /// Remove a collection together with every item that belongs to it.
    ///
    /// Both disappear in a single catalog commit; blob files are removed
    /// afterwards. Returns `false` when the collection was already absent.
    pub async fn delete_collection(&self, collection_id: &str) -> Result<bool, StoreError> {
        let collection_id = collection_id.to_string();
        self.write(move |options, catalog| {
            let removed_collection = catalog.collections.remove(&collection_id);
            let doomed: Vec<ItemId> = catalog
                .items_in(&collection_id)
                .map(|(id, _)| id)
                .collect();

            if removed_collection.is_none() && doomed.is_empty() {
                debug!(
                    "Collection {} already absent; nothing to delete",
                    collection_id
                );
                return Ok(false);
            }

            let blobs: Vec<String> = doomed
                .iter()
                .filter_map(|id| catalog.items.remove(id))
                .map(|record| record.blob)
                .collect();

            commit_catalog(catalog, options)?;

            for blob in &blobs {
                remove_blob(&options.blob_path(blob));
            }
            info!(
                "Deleted collection {} and {} item(s)",
                collection_id,
                blobs.len()
            );
            Ok(true)
        })
        .await
    }

    /// Remove blob files no catalog entry refers to. Returns how many were removed.
    pub async fn vacuum(&self) -> Result<usize, StoreError> {
        self.write(|options, catalog| {
            let referenced: HashSet<&str> = catalog
                .items
                .values()
                .map(|record| record.blob.as_str())
                .collect();

            let mut removed = 0;
            for entry in fs::read_dir(options.blob_dir())? {
                let path = entry?.path();
                if !path.is_file() {
                    continue;
                }
                let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if !referenced.contains(name) {
                    fs::remove_file(&path)?;
                    removed += 1;
                }
            }
            if removed > 0 {
                info!("Vacuum removed {} unreferenced blob(s)", removed);
            }
            Ok(removed)
        })
        .await
    }

    /// Run `op` against a freshly loaded catalog under the write gate and an
    /// exclusive file lock.
    async fn write<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&StoreOptions, &mut Catalog) -> Result<T, StoreError> + Send + 'static,
    {
        let _gate = self.write_gate.lock().await;
        let options = Arc::clone(&self.options);
        task::spawn_blocking(move || {
            let _lock = CatalogLock::exclusive(&options)?;
            let mut catalog = load_catalog(&options)?;
            op(&options, &mut catalog)
        })
        .await
        .map_err(|e| StoreError::StorageFailed(format!("store task failed: {e}")))?
    }

    async fn read<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&StoreOptions, &Catalog) -> Result<T, StoreError> + Send + 'static,
    {
        let options = Arc::clone(&self.options);
        task::spawn_blocking(move || {
            let _lock = CatalogLock::shared(&options)?;
            let catalog = load_catalog(&options)?;
            op(&options, &catalog)
        })
        .await
        .map_err(|e| StoreError::StorageFailed(format!("store task failed: {e}")))?
    }
}

fn remove_blob(path: &std::path::Path) {
    if let Err(err) = fs::remove_file(path)
        && err.kind() != std::io::ErrorKind::NotFound
    {
        warn!("failed to remove image blob {}: {}", path.display(), err);
    }
}

impl std::fmt::Debug for ScreenshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScreenshotStore")
            .field("base_dir", &self.options.base_dir)
            .finish()
    }
}
