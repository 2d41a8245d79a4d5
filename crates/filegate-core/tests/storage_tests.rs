use filegate_core::hasher::Fingerprint;
use filegate_core::storage::{Database, MovePhase, OrphanStatus, SCHEMA_VERSION};
use filegate_core::Error;
use tempfile::TempDir;

#[test]
fn test_size_index_idempotent() {
    let db = Database::open_in_memory().unwrap();
    assert!(!db.size_seen(4096).unwrap());

    db.size_insert(4096).unwrap();
    assert!(db.size_seen(4096).unwrap());

    // Re-inserting the same size is a no-op.
    db.size_insert(4096).unwrap();
    assert_eq!(db.stats().unwrap().unique_sizes, 1);
}

#[test]
fn test_fringe_index_keyed_by_hash_and_size() {
    let db = Database::open_in_memory().unwrap();
    let fp = Fingerprint::from_narrow(0xDEAD_BEEF);

    db.fringe_insert(&fp, 100, "/vault/aa/one.txt").unwrap();
    assert_eq!(
        db.fringe_lookup(&fp, 100).unwrap().as_deref(),
        Some("/vault/aa/one.txt")
    );
    // Same fingerprint under another size is a different key.
    assert_eq!(db.fringe_lookup(&fp, 101).unwrap(), None);

    // First writer wins on conflict.
    db.fringe_insert(&fp, 100, "/vault/bb/two.txt").unwrap();
    assert_eq!(
        db.fringe_lookup(&fp, 100).unwrap().as_deref(),
        Some("/vault/aa/one.txt")
    );
}

#[test]
fn test_full_index_lookup() {
    let db = Database::open_in_memory().unwrap();
    let fp = Fingerprint::from_wide(0x0123_4567_89AB_CDEF_0123_4567_89AB_CDEF);

    assert_eq!(db.full_lookup(&fp).unwrap(), None);
    db.full_insert(&fp, "/vault/01/payload.bin").unwrap();
    assert_eq!(
        db.full_lookup(&fp).unwrap().as_deref(),
        Some("/vault/01/payload.bin")
    );
}

#[test]
fn test_journal_lifecycle() {
    let db = Database::open_in_memory().unwrap();
    let id = db.journal_plan("/in/a.txt", "/vault/aa/x.txt", 42).unwrap();
    assert!(id > 0);

    let rows = db.journal_unterminated().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].phase, MovePhase::Planned);
    assert_eq!(rows[0].source_path, "/in/a.txt");

    db.journal_set_phase(id, MovePhase::Moving).unwrap();
    let rows = db.journal_unterminated().unwrap();
    assert_eq!(rows[0].phase, MovePhase::Moving);

    db.journal_set_phase(id, MovePhase::Completed).unwrap();
    assert!(db.journal_unterminated().unwrap().is_empty());
}

#[test]
fn test_journal_failed_is_terminal() {
    let db = Database::open_in_memory().unwrap();
    let id = db.journal_plan("/in/b.txt", "/vault/bb/y.txt", 7).unwrap();
    db.journal_set_phase(id, MovePhase::Failed).unwrap();
    assert!(db.journal_unterminated().unwrap().is_empty());
    assert_eq!(db.stats().unwrap().unterminated_journal, 0);
}

#[test]
fn test_orphan_add_idempotent_on_path() {
    let db = Database::open_in_memory().unwrap();
    let first = db.orphan_add("/in/a.txt", "/vault/aa/a.txt", 10).unwrap();
    let second = db.orphan_add("/in/other.txt", "/vault/aa/a.txt", 10).unwrap();
    assert_eq!(first, second);

    let pending = db.orphan_list_pending().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].original_path, "/in/a.txt");
}

#[test]
fn test_orphan_mark_clears_pending() {
    let db = Database::open_in_memory().unwrap();
    let id = db.orphan_add("/in/a.txt", "/vault/aa/a.txt", 10).unwrap();

    db.orphan_mark(id, OrphanStatus::Recovered).unwrap();
    assert!(db.orphan_list_pending().unwrap().is_empty());

    let (status, recovered_at): (String, Option<String>) = db
        .connection()
        .query_row(
            "SELECT status, recovered_at FROM orphan_registry WHERE id = ?1",
            rusqlite::params![id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(status, "recovered");
    assert!(recovered_at.is_some());
}

#[test]
fn test_fringe_mode_roundtrip() {
    let db = Database::open_in_memory().unwrap();
    assert_eq!(db.fringe_mode().unwrap(), None);
    db.set_fringe_mode("edge").unwrap();
    assert_eq!(db.fringe_mode().unwrap().as_deref(), Some("edge"));
}

#[test]
fn test_schema_version_stamped_on_create() {
    let db = Database::open_in_memory().unwrap();
    assert_eq!(db.schema_version().unwrap(), SCHEMA_VERSION);
}

#[test]
fn test_schema_mismatch_refuses_to_open() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("gate.db");

    {
        let db = Database::open(&db_path).unwrap();
        db.connection()
            .execute(
                "INSERT INTO schema_version (version, applied_at) VALUES (99, 'now')",
                [],
            )
            .unwrap();
    }

    match Database::open(&db_path) {
        Err(Error::SchemaMismatch { found, expected }) => {
            assert_eq!(found, 99);
            assert_eq!(expected, SCHEMA_VERSION);
        }
        other => panic!("expected SchemaMismatch, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_legacy_database_rejected() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("legacy.db");

    {
        let conn = rusqlite::Connection::open(&db_path).unwrap();
        conn.execute("CREATE TABLE old_stuff (id INTEGER PRIMARY KEY)", [])
            .unwrap();
    }

    match Database::open(&db_path) {
        Err(Error::SchemaMismatch { found, .. }) => assert_eq!(found, 0),
        other => panic!("expected SchemaMismatch, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_stats_counts() {
    let db = Database::open_in_memory().unwrap();
    db.size_insert(1).unwrap();
    db.size_insert(2).unwrap();
    db.fringe_insert(&Fingerprint::from_narrow(1), 1, "/v/a").unwrap();
    db.full_insert(&Fingerprint::from_wide(2), "/v/b").unwrap();
    db.journal_plan("/in/a", "/v/a", 1).unwrap();
    db.orphan_add("/in/b", "/v/b2", 2).unwrap();

    let stats = db.stats().unwrap();
    assert_eq!(stats.unique_sizes, 2);
    assert_eq!(stats.fringe_entries, 1);
    assert_eq!(stats.full_entries, 1);
    assert_eq!(stats.unterminated_journal, 1);
    assert_eq!(stats.pending_orphans, 1);
    assert_eq!(stats.schema_version, SCHEMA_VERSION);
}
