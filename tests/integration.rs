//! Integration tests for the daybook store.

use chrono::{Duration as ChronoDuration, Utc};
use daybook::{
    Daybook, Engine, Matter, MemoryEngine, NotificationRecord, RepeatTask, RepeatTaskStatus,
    StoreConfig, StoreError, Todo, TodoStatus,
};
use std::sync::Arc;
use tempfile::TempDir;

// --- Realistic Workflow Tests ---

#[test]
fn test_todo_lifecycle() {
    let book = Daybook::in_memory();

    book.create_todo(&Todo::new("t1", "water the plants")).unwrap();
    let mut todo = book.get_todo("t1").unwrap().expect("just created");
    assert_eq!(todo.title, "water the plants");
    assert_eq!(todo.status, TodoStatus::Todo);

    todo.status = TodoStatus::Completed;
    todo.updated_at = Utc::now();
    book.update_todo(&todo).unwrap();
    assert_eq!(
        book.get_todo("t1").unwrap().unwrap().status,
        TodoStatus::Completed
    );

    book.delete_todo("t1").unwrap();
    assert!(book.get_todo("t1").unwrap().is_none());
    // Deleting again stays silent.
    book.delete_todo("t1").unwrap();
}

#[test]
fn test_matter_range_and_tag_queries() {
    let book = Daybook::in_memory();
    let base = Utc::now();

    let mut standup = Matter::new(
        "m1",
        "standup",
        base,
        base + ChronoDuration::minutes(15),
    );
    standup.tags = Some("work".to_string());
    book.create_matter(&standup).unwrap();

    let mut review = Matter::new(
        "m2",
        "design review",
        base + ChronoDuration::hours(2),
        base + ChronoDuration::hours(3),
    );
    review.tags = Some("work,design".to_string());
    book.create_matter(&review).unwrap();

    let groceries = Matter::new(
        "m3",
        "groceries",
        base + ChronoDuration::days(2),
        base + ChronoDuration::days(2) + ChronoDuration::hours(1),
    );
    book.create_matter(&groceries).unwrap();

    // Range covering today only.
    let today = book
        .matters_in_range(base - ChronoDuration::hours(1), base + ChronoDuration::hours(4))
        .unwrap();
    assert_eq!(today.len(), 2);
    assert_eq!(today[0].id, "m1");
    assert_eq!(today[1].id, "m2");

    // A range that starts inside a matter still matches it.
    let overlap = book
        .matters_in_range(base + ChronoDuration::minutes(5), base + ChronoDuration::minutes(10))
        .unwrap();
    assert_eq!(overlap.len(), 1);
    assert_eq!(overlap[0].id, "m1");

    let work = book.matters_with_tag("work").unwrap();
    assert_eq!(work.len(), 2);

    let found = book.search_matters_by_title("review").unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, "m2");
}

#[test]
fn test_repeat_task_status_flow() {
    let book = Daybook::in_memory();

    book.create_repeat_task(&RepeatTask::new("r1", "weekly report", "0 9 * * MON"))
        .unwrap();
    book.create_repeat_task(&RepeatTask::new("r2", "daily standup", "0 9 * * *"))
        .unwrap();

    assert_eq!(book.active_repeat_tasks().unwrap().len(), 2);

    book.set_repeat_task_status("r1", RepeatTaskStatus::Stopped)
        .unwrap();
    let active = book.active_repeat_tasks().unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, "r2");

    let stopped = book.get_repeat_task("r1").unwrap().unwrap();
    assert_eq!(stopped.status, RepeatTaskStatus::Stopped);

    let missing = book.set_repeat_task_status("nope", RepeatTaskStatus::Archived);
    assert!(matches!(missing, Err(StoreError::NotFound(_))));
}

#[test]
fn test_notification_read_tracking() {
    let book = Daybook::in_memory();

    book.create_notification(&NotificationRecord::new("n1", "reminder", "standup in 5", 1))
        .unwrap();
    book.create_notification(&NotificationRecord::new("n2", "reminder", "review in 5", 1))
        .unwrap();
    book.create_notification(&NotificationRecord::new("n3", "system", "backup done", 2))
        .unwrap();

    assert_eq!(book.unread_notifications().unwrap().len(), 3);

    book.mark_notification_read("n1").unwrap();
    let n1 = book.get_notification("n1").unwrap().unwrap();
    assert!(n1.read_at.is_some());
    assert_eq!(book.unread_notifications().unwrap().len(), 2);

    // Kind 1 has one unread left.
    assert_eq!(book.mark_notifications_read_by_kind(1).unwrap(), 1);
    assert_eq!(book.unread_notifications().unwrap().len(), 1);

    assert_eq!(book.mark_all_notifications_read().unwrap(), 1);
    assert!(book.unread_notifications().unwrap().is_empty());
}

#[test]
fn test_tags_are_shared_names() {
    let book = Daybook::in_memory();

    book.create_tag("work").unwrap();
    book.create_tag("home").unwrap();
    book.create_tag("work").unwrap();

    let tags = book.list_tags().unwrap();
    assert_eq!(tags.len(), 2);
    // Key order: listing is by name.
    assert_eq!(tags[0].name, "home");
    assert_eq!(tags[1].name, "work");

    let before = book.list_tags().unwrap()[1].last_used_at;
    std::thread::sleep(std::time::Duration::from_millis(5));
    book.touch_tag("work").unwrap();
    assert!(book.list_tags().unwrap()[1].last_used_at > before);

    book.delete_tag("home").unwrap();
    assert_eq!(book.list_tags().unwrap().len(), 1);
}

#[test]
fn test_collections_do_not_leak_into_each_other() {
    let book = Daybook::in_memory();

    // Same identifier everywhere.
    book.create_todo(&Todo::new("shared", "a todo")).unwrap();
    book.set_kv("shared", "a setting").unwrap();
    book.create_tag("shared").unwrap();

    assert_eq!(book.list_todos().unwrap().len(), 1);
    assert_eq!(book.list_tags().unwrap().len(), 1);
    assert_eq!(book.kv("shared").unwrap().as_deref(), Some("a setting"));

    book.delete_todo("shared").unwrap();
    // The others are untouched.
    assert_eq!(book.list_tags().unwrap().len(), 1);
    assert_eq!(book.kv("shared").unwrap().as_deref(), Some("a setting"));
}

// --- Persistence ---

#[test]
fn test_reopen_preserves_documents() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("daybook");

    {
        let book = Daybook::open(&path, StoreConfig::default()).unwrap();
        book.create_todo(&Todo::new("t1", "persists")).unwrap();
        book.set_kv("theme", "dark").unwrap();
    }

    let book = Daybook::open(&path, StoreConfig::default()).unwrap();
    assert_eq!(book.get_todo("t1").unwrap().unwrap().title, "persists");
    assert_eq!(book.kv("theme").unwrap().as_deref(), Some("dark"));
}

#[test]
fn test_second_open_of_live_store_is_locked() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("daybook");

    let _book = Daybook::open(&path, StoreConfig::default()).unwrap();
    let second = Daybook::open(&path, StoreConfig::default());
    assert!(matches!(second, Err(StoreError::Locked)));
}

#[test]
fn test_reopen_preserves_revision_history() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("daybook");

    {
        let book = Daybook::open(&path, StoreConfig::default()).unwrap();
        book.create_todo(&Todo::new("t1", "v1")).unwrap();
        let mut todo = book.get_todo("t1").unwrap().unwrap();
        todo.title = "v2".to_string();
        book.update_todo(&todo).unwrap();
    }

    let engine = Arc::new(MemoryEngine::open(&path).unwrap());
    let revs = engine.revisions("todo_t1").unwrap();
    assert_eq!(revs.len(), 2);
    assert_eq!(revs[0].generation, 2);
}
