//! Typed operations per entity kind, built on the store, codec, and
//! conflict-retry executor.
//!
//! Specialized queries are a full collection list followed by an
//! in-memory filter. Collections here are small (one user's tasks), so
//! that is the documented scalability ceiling, not a bug.

use crate::engine::{Engine, MemoryEngine};
use crate::error::{Result, StoreError};
use crate::maintenance::Compactor;
use crate::records::{
    self, Entity, KvEntry, Matter, NotificationRecord, NotificationStatus, RepeatTask,
    RepeatTaskStatus, Tag, Todo,
};
use crate::replication::Replicator;
use crate::replication::SyncOptions;
use crate::retry::with_conflict_retry;
use crate::store::{DocStore, StoreConfig};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;

/// The domain façade over one document store.
///
/// Constructed explicitly and passed to callers; there is no process-wide
/// singleton. All configuration is fixed at construction time.
pub struct Daybook {
    store: DocStore,
    compactor: Compactor,
    sync_options: SyncOptions,
}

impl Daybook {
    /// Build a façade over an existing engine.
    ///
    /// The maintenance timer is not started here; call
    /// `maintenance().start()` to get the initial pass and the periodic
    /// schedule.
    pub fn new(engine: Arc<dyn Engine>, config: StoreConfig) -> Self {
        let store = DocStore::new(Arc::clone(&engine), config.retry);
        let compactor = Compactor::new(engine, config.maintenance);
        Self {
            store,
            compactor,
            sync_options: config.sync,
        }
    }

    /// Transient store with default configuration.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryEngine::new()), StoreConfig::default())
    }

    /// Persistent store at `path`.
    pub fn open(path: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(MemoryEngine::open(path)?), config))
    }

    pub fn store(&self) -> &DocStore {
        &self.store
    }

    /// History compaction and size monitoring for this store. The
    /// periodic timer runs only after [`Compactor::start`] is called.
    pub fn maintenance(&self) -> &Compactor {
        &self.compactor
    }

    /// Build a replicator against a remote replica, using this store's
    /// configured sync options.
    pub fn replicate_with(&self, remote: Arc<dyn Engine>) -> Replicator {
        Replicator::new(self.store.engine(), remote, self.sync_options.clone())
    }

    // --- Generic plumbing ---

    fn create<E: Entity>(&self, entity: &E) -> Result<()> {
        with_conflict_retry(self.store.retry(), || {
            self.store.put(records::encode(entity)?).map(|_| ())
        })
    }

    fn fetch<E: Entity>(&self, id: &str) -> Result<Option<E>> {
        match self.store.get(E::COLLECTION, id)? {
            Some(doc) => Ok(Some(records::decode(&doc)?)),
            None => Ok(None),
        }
    }

    fn fetch_all<E: Entity>(&self) -> Result<Vec<E>> {
        self.store
            .list(E::COLLECTION)?
            .iter()
            .map(records::decode)
            .collect()
    }

    /// Conflict-retried read-modify-write. The record must already
    /// exist; the current revision is fetched on every attempt so a
    /// retried write lands on top of the latest state.
    fn save_existing<E: Entity>(&self, entity: &E) -> Result<()> {
        with_conflict_retry(self.store.retry(), || {
            let current = self
                .store
                .get(E::COLLECTION, entity.id())?
                .ok_or_else(|| StoreError::NotFound(E::COLLECTION.key(entity.id())))?;
            let rev = current
                .rev
                .ok_or_else(|| StoreError::InvalidRevision(current.key.clone()))?;
            self.store
                .put(records::encode_with_rev(entity, rev)?)
                .map(|_| ())
        })
    }

    fn remove<E: Entity>(&self, id: &str) -> Result<()> {
        with_conflict_retry(self.store.retry(), || {
            self.store.delete_current(E::COLLECTION, id)
        })
    }

    // --- Matters ---

    pub fn create_matter(&self, matter: &Matter) -> Result<()> {
        self.create(matter)
    }

    pub fn get_matter(&self, id: &str) -> Result<Option<Matter>> {
        self.fetch(id)
    }

    /// All matters, ordered by start time.
    pub fn list_matters(&self) -> Result<Vec<Matter>> {
        let mut matters: Vec<Matter> = self.fetch_all()?;
        matters.sort_by_key(|m| m.start_time);
        Ok(matters)
    }

    /// Update an existing matter; fails with `NotFound` if it was never
    /// created or has been deleted.
    pub fn update_matter(&self, matter: &Matter) -> Result<()> {
        self.save_existing(matter)
    }

    pub fn delete_matter(&self, id: &str) -> Result<()> {
        self.remove::<Matter>(id)
    }

    /// Matters overlapping `[start, end]` (inclusive), ordered by start
    /// time.
    pub fn matters_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Matter>> {
        let mut matters: Vec<Matter> = self
            .fetch_all::<Matter>()?
            .into_iter()
            .filter(|m| {
                (m.start_time >= start && m.start_time <= end)
                    || (m.end_time >= start && m.end_time <= end)
                    || (m.start_time <= start && m.end_time >= end)
            })
            .collect();
        matters.sort_by_key(|m| m.start_time);
        Ok(matters)
    }

    /// Matters whose tag list mentions `tag`.
    pub fn matters_with_tag(&self, tag: &str) -> Result<Vec<Matter>> {
        let mut matters: Vec<Matter> = self
            .fetch_all::<Matter>()?
            .into_iter()
            .filter(|m| m.tags.as_deref().is_some_and(|t| t.contains(tag)))
            .collect();
        matters.sort_by_key(|m| m.start_time);
        Ok(matters)
    }

    /// Matters whose title contains `fragment`.
    pub fn search_matters_by_title(&self, fragment: &str) -> Result<Vec<Matter>> {
        let mut matters: Vec<Matter> = self
            .fetch_all::<Matter>()?
            .into_iter()
            .filter(|m| m.title.contains(fragment))
            .collect();
        matters.sort_by_key(|m| m.start_time);
        Ok(matters)
    }

    // --- Todos ---

    pub fn create_todo(&self, todo: &Todo) -> Result<()> {
        self.create(todo)
    }

    pub fn get_todo(&self, id: &str) -> Result<Option<Todo>> {
        self.fetch(id)
    }

    /// All todos, newest first.
    pub fn list_todos(&self) -> Result<Vec<Todo>> {
        let mut todos: Vec<Todo> = self.fetch_all()?;
        todos.sort_by_key(|t| std::cmp::Reverse(t.created_at));
        Ok(todos)
    }

    pub fn update_todo(&self, todo: &Todo) -> Result<()> {
        self.save_existing(todo)
    }

    pub fn delete_todo(&self, id: &str) -> Result<()> {
        self.remove::<Todo>(id)
    }

    // --- Tags ---

    /// Create a tag. Already-existing tags are left untouched.
    pub fn create_tag(&self, name: &str) -> Result<()> {
        if self.fetch::<Tag>(name)?.is_some() {
            return Ok(());
        }
        match self.create(&Tag::new(name)) {
            // Lost a race with another creator; the tag exists, done.
            Err(e) if e.is_conflict() => Ok(()),
            other => other,
        }
    }

    /// All tags, by name.
    pub fn list_tags(&self) -> Result<Vec<Tag>> {
        self.fetch_all()
    }

    /// Bump a tag's last-used timestamp.
    pub fn touch_tag(&self, name: &str) -> Result<()> {
        let mut tag: Tag = self
            .fetch(name)?
            .ok_or_else(|| StoreError::NotFound(Tag::COLLECTION.key(name)))?;
        tag.last_used_at = Utc::now();
        self.save_existing(&tag)
    }

    pub fn delete_tag(&self, name: &str) -> Result<()> {
        self.remove::<Tag>(name)
    }

    // --- Repeat tasks ---

    pub fn create_repeat_task(&self, task: &RepeatTask) -> Result<()> {
        self.create(task)
    }

    pub fn get_repeat_task(&self, id: &str) -> Result<Option<RepeatTask>> {
        self.fetch(id)
    }

    /// All repeat tasks, newest first.
    pub fn list_repeat_tasks(&self) -> Result<Vec<RepeatTask>> {
        let mut tasks: Vec<RepeatTask> = self.fetch_all()?;
        tasks.sort_by_key(|t| std::cmp::Reverse(t.created_at));
        Ok(tasks)
    }

    pub fn update_repeat_task(&self, task: &RepeatTask) -> Result<()> {
        self.save_existing(task)
    }

    pub fn delete_repeat_task(&self, id: &str) -> Result<()> {
        self.remove::<RepeatTask>(id)
    }

    /// Active repeat tasks, newest first.
    pub fn active_repeat_tasks(&self) -> Result<Vec<RepeatTask>> {
        let mut tasks: Vec<RepeatTask> = self
            .fetch_all::<RepeatTask>()?
            .into_iter()
            .filter(|t| t.status == RepeatTaskStatus::Active)
            .collect();
        tasks.sort_by_key(|t| std::cmp::Reverse(t.created_at));
        Ok(tasks)
    }

    pub fn set_repeat_task_status(&self, id: &str, status: RepeatTaskStatus) -> Result<()> {
        let mut task: RepeatTask = self
            .fetch(id)?
            .ok_or_else(|| StoreError::NotFound(RepeatTask::COLLECTION.key(id)))?;
        task.status = status;
        task.updated_at = Utc::now();
        self.save_existing(&task)
    }

    // --- Notifications ---

    pub fn create_notification(&self, notification: &NotificationRecord) -> Result<()> {
        self.create(notification)
    }

    pub fn get_notification(&self, id: &str) -> Result<Option<NotificationRecord>> {
        self.fetch(id)
    }

    pub fn list_notifications(&self) -> Result<Vec<NotificationRecord>> {
        self.fetch_all()
    }

    pub fn update_notification(&self, notification: &NotificationRecord) -> Result<()> {
        self.save_existing(notification)
    }

    pub fn delete_notification(&self, id: &str) -> Result<()> {
        self.remove::<NotificationRecord>(id)
    }

    /// Unread notifications, newest first.
    pub fn unread_notifications(&self) -> Result<Vec<NotificationRecord>> {
        let mut unread: Vec<NotificationRecord> = self
            .fetch_all::<NotificationRecord>()?
            .into_iter()
            .filter(|n| n.status == NotificationStatus::Unread)
            .collect();
        unread.sort_by_key(|n| std::cmp::Reverse(n.created_at));
        Ok(unread)
    }

    pub fn mark_notification_read(&self, id: &str) -> Result<()> {
        let mut notification: NotificationRecord = self
            .fetch(id)?
            .ok_or_else(|| StoreError::NotFound(NotificationRecord::COLLECTION.key(id)))?;
        self.mark_read(&mut notification)
    }

    /// Mark every unread notification of one kind as read. Returns how
    /// many were marked.
    pub fn mark_notifications_read_by_kind(&self, kind: i32) -> Result<usize> {
        let mut marked = 0;
        for mut notification in self.fetch_all::<NotificationRecord>()? {
            if notification.kind == kind && notification.status == NotificationStatus::Unread {
                self.mark_read(&mut notification)?;
                marked += 1;
            }
        }
        Ok(marked)
    }

    /// Mark every unread notification as read. Returns how many were
    /// marked.
    pub fn mark_all_notifications_read(&self) -> Result<usize> {
        let mut marked = 0;
        for mut notification in self.fetch_all::<NotificationRecord>()? {
            if notification.status == NotificationStatus::Unread {
                self.mark_read(&mut notification)?;
                marked += 1;
            }
        }
        Ok(marked)
    }

    fn mark_read(&self, notification: &mut NotificationRecord) -> Result<()> {
        notification.status = NotificationStatus::Read;
        notification.read_at = Some(Utc::now());
        self.save_existing(notification)
    }

    // --- Key/value settings ---

    /// Upsert a setting: create-if-absent folded into the set operation.
    pub fn set_kv(&self, key: &str, value: &str) -> Result<()> {
        with_conflict_retry(self.store.retry(), || {
            match self.store.get(KvEntry::COLLECTION, key)? {
                Some(doc) => {
                    let mut entry: KvEntry = records::decode(&doc)?;
                    entry.value = value.to_string();
                    entry.updated_at = Utc::now();
                    let rev = doc
                        .rev
                        .clone()
                        .ok_or_else(|| StoreError::InvalidRevision(doc.key.clone()))?;
                    self.store.put(records::encode_with_rev(&entry, rev)?)?;
                }
                None => {
                    self.store
                        .put(records::encode(&KvEntry::new(key, value))?)?;
                }
            }
            Ok(())
        })
    }

    pub fn kv(&self, key: &str) -> Result<Option<String>> {
        Ok(self.fetch::<KvEntry>(key)?.map(|e| e.value))
    }

    /// Read a setting, falling back to `default` when absent.
    pub fn kv_or(&self, key: &str, default: &str) -> Result<String> {
        Ok(self.kv(key)?.unwrap_or_else(|| default.to_string()))
    }

    pub fn delete_kv(&self, key: &str) -> Result<()> {
        self.remove::<KvEntry>(key)
    }
}
