use std::sync::Arc;

use tempfile::TempDir;

use lyra_cache::{CacheConfig, MediaCache};
use lyra_core::{KeyRegistry, LyraError, Media, MediaKey, MediaKind, Value, ValueType};

const YEAR: MediaKey = MediaKey(100);
const COVER: MediaKey = MediaKey(101);

fn registry() -> Arc<KeyRegistry> {
    let mut registry = KeyRegistry::with_defaults();
    registry
        .register(YEAR, "year", ValueType::Int)
        .expect("register year");
    registry
        .register(COVER, "cover", ValueType::Blob)
        .expect("register cover");
    Arc::new(registry)
}

fn setup() -> (TempDir, CacheConfig, Arc<KeyRegistry>) {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = CacheConfig::new(dir.path().join("cache.sqlite"));
    (dir, config, registry())
}

fn track(registry: &Arc<KeyRegistry>, id: &str, artist: &str, year: i64) -> Media {
    let mut media = Media::new(MediaKind::Audio, registry.clone());
    media.set_id(id);
    media.set_source("library");
    media.set_title(&format!("track {id}"));
    media.add_artist(artist);
    media.set(YEAR, Value::from(year));
    media
}

#[test]
fn insert_then_get_roundtrips_the_record() {
    let (_dir, config, registry) = setup();
    let mut cache = MediaCache::new(&config, registry.clone(), &[MediaKey::ARTIST]).expect("cache");

    let mut folder = Media::new(MediaKind::Container, registry.clone());
    folder.set_id("folder-1");
    folder.set_source("library");
    cache.insert(&folder, None).expect("insert folder");

    let media = track(&registry, "track-1", "Nina", 1959);
    cache.insert(&media, Some("folder-1")).expect("insert");

    let cached = cache.get("track-1").expect("get");
    assert_eq!(cached.media, media);
    assert_eq!(cached.parent.as_deref(), Some("folder-1"));
}

#[test]
fn reinserting_the_same_id_replaces_the_row() {
    let (_dir, config, registry) = setup();
    let mut cache = MediaCache::new(&config, registry.clone(), &[]).expect("cache");

    cache
        .insert(&track(&registry, "t", "Old Artist", 1990), None)
        .expect("first insert");
    let first_updated = cache.get("t").expect("get").updated;

    std::thread::sleep(std::time::Duration::from_millis(5));
    cache
        .insert(&track(&registry, "t", "New Artist", 1991), None)
        .expect("second insert");

    let all = cache.search(None).expect("search");
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].get_string(MediaKey::ARTIST), Some("New Artist"));

    let cached = cache.get("t").expect("get");
    assert!(cached.updated > first_updated);
}

#[test]
fn pending_writes_are_visible_to_the_next_read() {
    let (_dir, config, registry) = setup();
    let mut cache = MediaCache::new(&config, registry.clone(), &[]).expect("cache");

    cache
        .insert(&track(&registry, "a", "x", 2000), None)
        .expect("insert a");
    cache
        .insert(&track(&registry, "b", "y", 2001), None)
        .expect("insert b");

    let all = cache.search(None).expect("search");
    assert_eq!(all.len(), 2);
}

#[test]
fn record_without_id_is_rejected() {
    let (_dir, config, registry) = setup();
    let mut cache = MediaCache::new(&config, registry.clone(), &[]).expect("cache");

    let mut media = Media::new(MediaKind::Audio, registry);
    media.set_source("library");
    let err = cache.insert(&media, None).expect_err("must fail");
    assert!(matches!(err, LyraError::Validation { .. }));
}

#[test]
fn missing_record_is_not_found() {
    let (_dir, config, registry) = setup();
    let mut cache = MediaCache::new(&config, registry, &[]).expect("cache");
    let err = cache.get("nope").expect_err("must fail");
    assert!(matches!(err, LyraError::NotFound { .. }));
}

#[test]
fn search_filters_on_declared_columns() {
    let (_dir, config, registry) = setup();
    let mut cache =
        MediaCache::new(&config, registry.clone(), &[MediaKey::ARTIST, YEAR]).expect("cache");

    cache
        .insert(&track(&registry, "t1", "Nina", 1959), None)
        .expect("insert");
    cache
        .insert(&track(&registry, "t2", "Miles", 1959), None)
        .expect("insert");
    cache
        .insert(&track(&registry, "t3", "Nina", 1965), None)
        .expect("insert");

    let hits = cache
        .search(Some("artist = 'Nina' AND year < 1960"))
        .expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id(), Some("t1"));
}

#[test]
fn bad_search_condition_is_a_storage_error() {
    let (_dir, config, registry) = setup();
    let mut cache = MediaCache::new(&config, registry, &[]).expect("cache");
    let err = cache
        .search(Some("no_such_column = 1"))
        .expect_err("must fail");
    assert!(matches!(err, LyraError::Storage { .. }));
}

#[test]
fn remove_deletes_matching_rows() {
    let (_dir, config, registry) = setup();
    let mut cache = MediaCache::new(&config, registry.clone(), &[YEAR]).expect("cache");

    cache
        .insert(&track(&registry, "t1", "a", 1999), None)
        .expect("insert");
    cache
        .insert(&track(&registry, "t2", "b", 2005), None)
        .expect("insert");

    cache.remove(Some("year = 1999")).expect("remove");
    let all = cache.search(None).expect("search");
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id(), Some("t2"));

    cache.remove(None).expect("remove all");
    assert!(cache.search(None).expect("search").is_empty());
}

#[test]
fn blob_keys_are_not_searchable_columns() {
    let (_dir, config, registry) = setup();
    let cache = MediaCache::new(&config, registry, &[MediaKey::ARTIST, COVER]).expect("cache");
    assert_eq!(cache.searchable_keys(), &[MediaKey::ARTIST]);
}

#[test]
fn persistent_cache_survives_reopening() {
    let (_dir, config, registry) = setup();
    {
        let mut cache =
            MediaCache::new_persistent(&config, registry.clone(), "catalog", &[MediaKey::ARTIST, YEAR])
                .expect("create");
        cache
            .insert(&track(&registry, "t1", "Nina", 1999), None)
            .expect("insert");
        cache
            .insert(&track(&registry, "t2", "Miles", 2001), None)
            .expect("insert");
    }

    let mut reloaded =
        MediaCache::load_persistent(&config, registry.clone(), "catalog").expect("load");
    assert_eq!(reloaded.searchable_keys(), &[MediaKey::ARTIST, YEAR]);

    let hits = reloaded.search(Some("year = 1999")).expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id(), Some("t1"));
    assert_eq!(hits[0].get_int(YEAR), Some(1999));

    let err = reloaded.get("absent").expect_err("must fail");
    assert!(matches!(err, LyraError::NotFound { .. }));

    reloaded.destroy().expect("destroy");
    let err = MediaCache::load_persistent(&config, registry, "catalog").expect_err("must fail");
    assert!(matches!(err, LyraError::NotFound { .. }));
}

#[test]
fn loading_an_unknown_persistent_cache_is_not_found() {
    let (_dir, config, registry) = setup();
    let err = MediaCache::load_persistent(&config, registry, "missing").expect_err("must fail");
    assert!(matches!(err, LyraError::NotFound { .. }));
}

#[test]
fn ephemeral_tables_do_not_reach_the_database_file() {
    let (_dir, config, registry) = setup();
    let cache_id = {
        let mut cache = MediaCache::new(&config, registry.clone(), &[]).expect("cache");
        cache
            .insert(&track(&registry, "t1", "a", 2000), None)
            .expect("insert");
        // Force the pending transaction to commit.
        let _ = cache.search(None).expect("search");
        cache.cache_id().to_string()
    };

    let conn = rusqlite::Connection::open(&config.db_path).expect("open raw");
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            rusqlite::params![cache_id],
            |row| row.get(0),
        )
        .expect("query");
    assert_eq!(count, 0);
}

#[test]
fn invalid_persistent_cache_ids_are_rejected() {
    let (_dir, config, registry) = setup();
    for bad in ["", "1abc", "drop table", "name;--"] {
        let err = MediaCache::new_persistent(&config, registry.clone(), bad, &[])
            .expect_err("must fail");
        assert!(matches!(err, LyraError::Validation { .. }), "id: {bad:?}");
    }
}

#[test]
fn destroy_drops_an_ephemeral_cache() {
    let (_dir, config, registry) = setup();
    let mut cache = MediaCache::new(&config, registry.clone(), &[]).expect("cache");
    cache
        .insert(&track(&registry, "t1", "a", 2000), None)
        .expect("insert");
    cache.destroy().expect("destroy");
}
