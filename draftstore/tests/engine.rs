mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use common::{init_tracing, js};
use draftstore::{
    CloneOptions, DraftEngine, DraftKey, EngineConfig, KVStore, MemKV, SaveOptions, Starters,
    MARKUP_SLOT, STYLE_SLOT,
};

fn engine() -> DraftEngine<MemKV, MemKV> {
    init_tracing();
    DraftEngine::new(MemKV::new(), MemKV::new())
}

fn key(version: &str) -> DraftKey {
    DraftKey::new("draft:ex-1", version)
}

async fn code(engine: &DraftEngine<MemKV, MemKV>, key: &DraftKey, slot: &str) -> Option<String> {
    engine.slot_state(key, slot).await.map(|state| state.code)
}

#[tokio::test]
async fn test_init_new_bundle_shows_starter() {
    let engine = engine();

    let outcome = engine.init_bundle(&key("v1"), &js("a")).await;
    assert_eq!(outcome.visible("js"), Some("a"));
    assert!(!outcome.restored);
    assert_eq!(outcome.last_lang.as_deref(), Some("js"));

    let state = engine.slot_state(&key("v1"), "js").await.unwrap();
    assert_eq!(state.baseline, "a");
    assert_eq!(state.code, "");
    assert!(!state.dirty);
}

#[tokio::test]
async fn test_baseline_is_written_once() {
    let engine = engine();
    let k = key("v1");

    engine.init_bundle(&k, &js("a")).await;
    let first = engine.bundle(&k).await.unwrap();

    for _ in 0..3 {
        engine.init_bundle(&k, &js("a")).await;
    }
    // Even different starters under the same version do not re-seed
    engine.init_bundle(&k, &js("something else")).await;

    let last = engine.bundle(&k).await.unwrap();
    assert_eq!(last.slots["js"].baseline.as_deref(), Some("a"));
    assert_eq!(first, last);
}

#[tokio::test]
async fn test_save_then_init_restores() {
    let engine = engine();
    let k = key("v1");

    engine.init_bundle(&k, &js("a")).await;
    engine.save_field(&k, "js", "b", SaveOptions::default()).await;
    assert_eq!(code(&engine, &k, "js").await.as_deref(), Some("b"));

    let outcome = engine.init_bundle(&k, &js("a")).await;
    assert_eq!(outcome.visible("js"), Some("b"));
    assert!(outcome.restored);
    assert!(outcome.slots["js"].restored);
}

#[tokio::test]
async fn test_whitespace_only_difference_is_not_restored() {
    let engine = engine();
    let k = key("v1");

    engine.init_bundle(&k, &js("let x;\n")).await;
    engine.save_field(&k, "js", "  let x;", SaveOptions::default()).await;

    let outcome = engine.init_bundle(&k, &js("let x;\n")).await;
    assert_eq!(outcome.visible("js"), Some("  let x;"));
    assert!(!outcome.restored);
    assert!(!engine.slot_state(&k, "js").await.unwrap().dirty);
}

#[tokio::test]
async fn test_empty_value_does_not_wipe_code() {
    let engine = engine();
    let k = key("v1");

    engine.init_bundle(&k, &js("a")).await;
    engine.save_field(&k, "js", "b", SaveOptions::default()).await;

    engine.save_field(&k, "js", "", SaveOptions::default()).await;
    assert_eq!(code(&engine, &k, "js").await.as_deref(), Some("b"));

    engine.save_field(&k, "js", " \n ", SaveOptions::default()).await;
    assert_eq!(code(&engine, &k, "js").await.as_deref(), Some("b"));

    engine.save_field(&k, "js", "", SaveOptions::forced()).await;
    assert_eq!(code(&engine, &k, "js").await.as_deref(), Some(""));
}

#[tokio::test]
async fn test_empty_value_does_not_wipe_whitespace_code() {
    let engine = engine();
    let k = key("v1");

    engine.init_bundle(&k, &js("a")).await;
    engine.save_field(&k, "js", "\n\n", SaveOptions::default()).await;
    engine.save_field(&k, "js", "", SaveOptions::default()).await;

    assert_eq!(code(&engine, &k, "js").await.as_deref(), Some("\n\n"));
}

#[tokio::test]
async fn test_baseline_does_not_mask_edit() {
    let engine = engine();
    let k = key("v1");

    engine.init_bundle(&k, &js("a")).await;
    engine.save_field(&k, "js", "b", SaveOptions::default()).await;

    engine.save_field(&k, "js", "a", SaveOptions::default()).await;
    let state = engine.slot_state(&k, "js").await.unwrap();
    assert_eq!(state.code, "b");
    assert!(state.dirty);

    engine.save_field(&k, "js", "a", SaveOptions::forced()).await;
    let state = engine.slot_state(&k, "js").await.unwrap();
    assert_eq!(state.code, "a");
    assert!(!state.dirty);
}

#[tokio::test]
async fn test_guards_do_not_apply_before_first_edit() {
    let engine = engine();
    let k = key("v1");

    engine.init_bundle(&k, &js("a")).await;
    engine.save_field(&k, "js", "a", SaveOptions::default()).await;
    assert_eq!(code(&engine, &k, "js").await.as_deref(), Some("a"));
}

#[tokio::test]
async fn test_save_bumps_timestamps() {
    let engine = engine();
    let k = key("v1");

    engine.init_bundle(&k, &js("a")).await;
    let before = engine.bundle(&k).await.unwrap().updated_at;
    engine.save_field(&k, "js", "b", SaveOptions::default()).await;

    let bundle = engine.bundle(&k).await.unwrap();
    assert!(bundle.updated_at >= before);
    assert_eq!(bundle.slots["js"].updated_at, Some(bundle.updated_at));
}

#[tokio::test]
async fn test_save_without_init_creates_bundle() {
    let engine = engine();
    let k = key("v1");

    engine.save_field(&k, "js", "typed", SaveOptions::default()).await;
    let state = engine.slot_state(&k, "js").await.unwrap();
    assert_eq!(state.code, "typed");
    assert_eq!(state.baseline, "");

    // A later init seeds the baseline but keeps the code
    let outcome = engine.init_bundle(&k, &js("a")).await;
    assert_eq!(outcome.visible("js"), Some("typed"));
    assert_eq!(engine.slot_state(&k, "js").await.unwrap().baseline, "a");
}

#[tokio::test]
async fn test_reset_then_init_is_clean() {
    let engine = engine();
    let k = key("v1");
    let starters = Starters::SingleLanguage(vec![
        ("js".to_string(), "a".to_string()),
        ("ts".to_string(), "a: number".to_string()),
    ]);

    engine.init_bundle(&k, &starters).await;
    engine.save_field(&k, "js", "b", SaveOptions::default()).await;
    engine.save_field(&k, "ts", "b: string", SaveOptions::default()).await;

    engine.reset_bundle(&k, &starters).await;
    let outcome = engine.init_bundle(&k, &starters).await;
    assert!(!outcome.restored);

    for (slot, starter) in [("js", "a"), ("ts", "a: number")] {
        let state = engine.slot_state(&k, slot).await.unwrap();
        assert_eq!(state.code, starter);
        assert_eq!(state.baseline, starter);
        assert!(!state.dirty);
        assert_eq!(outcome.visible(slot), Some(starter));
    }
}

#[tokio::test]
async fn test_reset_is_the_only_way_to_replace_baseline() {
    let engine = engine();
    let k = key("v1");

    engine.init_bundle(&k, &js("a")).await;
    engine.save_field(&k, "js", "b", SaveOptions::forced()).await;
    assert_eq!(engine.slot_state(&k, "js").await.unwrap().baseline, "a");

    engine.reset_bundle(&k, &js("solution")).await;
    let state = engine.slot_state(&k, "js").await.unwrap();
    assert_eq!(state.baseline, "solution");
    assert_eq!(state.code, "solution");
}

#[tokio::test]
async fn test_clone_bundle() {
    let engine = engine();
    let (from, to) = (key("v1"), key("v2"));

    // Absent source
    assert!(!engine.clone_bundle(&from, &to, CloneOptions::default()).await);
    assert!(engine.bundle(&to).await.is_none());

    engine.init_bundle(&from, &js("a")).await;
    engine.save_field(&from, "js", "b", SaveOptions::default()).await;

    assert!(engine.clone_bundle(&from, &to, CloneOptions::default()).await);
    assert_eq!(engine.bundle(&to).await, engine.bundle(&from).await);

    // Destination exists now
    engine.save_field(&from, "js", "c", SaveOptions::default()).await;
    assert!(!engine.clone_bundle(&from, &to, CloneOptions::default()).await);
    assert_eq!(code(&engine, &to, "js").await.as_deref(), Some("b"));

    let overwrite = CloneOptions { overwrite: true };
    assert!(engine.clone_bundle(&from, &to, overwrite).await);
    assert_eq!(code(&engine, &to, "js").await.as_deref(), Some("c"));

    // The copy is independent of its source
    engine.save_field(&to, "js", "d", SaveOptions::default()).await;
    assert_eq!(code(&engine, &from, "js").await.as_deref(), Some("c"));

    let index = engine.load_index("draft:ex-1").await;
    assert!(index.get("v2").is_some());
    assert_eq!(index.latest_version, "v1");
}

#[tokio::test]
async fn test_clear_bundle() {
    let engine = engine();
    let k = key("v1");

    engine.init_bundle(&k, &js("a")).await;
    engine.save_field(&k, "js", "b", SaveOptions::default()).await;
    engine.clear_bundle(&k).await;

    assert!(engine.bundle(&k).await.is_none());
    assert_eq!(engine.cached_bundles(), 0);

    let outcome = engine.init_bundle(&k, &js("a")).await;
    assert_eq!(outcome.visible("js"), Some("a"));
    assert!(!outcome.restored);
}

#[tokio::test]
async fn test_clear_removes_from_both_backends() {
    init_tracing();
    let primary = Arc::new(MemKV::new());
    let fallback = Arc::new(MemKV::new());
    let engine = DraftEngine::new(Arc::clone(&primary), Arc::clone(&fallback));
    let k = key("v1");

    fallback.set(&k.storage_key(), b"stale").await.unwrap();
    engine.init_bundle(&k, &js("a")).await;
    engine.clear_bundle(&k).await;

    assert_eq!(primary.get(&k.storage_key()).await.unwrap(), None);
    assert_eq!(fallback.get(&k.storage_key()).await.unwrap(), None);
}

#[tokio::test]
async fn test_versions_are_independent() {
    let engine = engine();

    engine.init_bundle(&key("v1"), &js("a")).await;
    engine.save_field(&key("v1"), "js", "b", SaveOptions::default()).await;

    let outcome = engine.init_bundle(&key("v2"), &js("aa")).await;
    assert_eq!(outcome.visible("js"), Some("aa"));
    assert!(!outcome.restored);
    assert_eq!(code(&engine, &key("v1"), "js").await.as_deref(), Some("b"));
}

#[tokio::test]
async fn test_dual_file_bundle() {
    let engine = engine();
    let k = key("v1");
    let starters = Starters::DualFile {
        markup: "<h1>Hi</h1>".to_string(),
        style: "h1 {}".to_string(),
    };

    let outcome = engine.init_bundle(&k, &starters).await;
    assert_eq!(outcome.visible(MARKUP_SLOT), Some("<h1>Hi</h1>"));
    assert_eq!(outcome.visible(STYLE_SLOT), Some("h1 {}"));
    assert_eq!(outcome.last_lang, None);

    engine.save_field(&k, STYLE_SLOT, "h1 { color: red }", SaveOptions::default()).await;
    let outcome = engine.init_bundle(&k, &starters).await;
    assert!(outcome.restored);
    assert!(!outcome.slots[MARKUP_SLOT].restored);
    assert!(outcome.slots[STYLE_SLOT].restored);
}

#[tokio::test]
async fn test_project_bundle() {
    let engine = engine();
    let k = key("v1");
    let files: BTreeMap<String, String> = [("index.js", "main()"), ("util.js", "")]
        .into_iter()
        .map(|(path, content)| (path.to_string(), content.to_string()))
        .collect();
    let starters = Starters::Project {
        files,
        entry_file: "index.js".to_string(),
    };

    let outcome = engine.init_bundle(&k, &starters).await;
    assert_eq!(outcome.entry_file.as_deref(), Some("index.js"));
    assert_eq!(outcome.visible("util.js"), Some(""));

    // Files the user adds live next to the starter files
    engine.save_field(&k, "extra/notes.js", "// todo", SaveOptions::default()).await;
    let outcome = engine.init_bundle(&k, &starters).await;
    assert_eq!(outcome.visible("extra/notes.js"), Some("// todo"));
    assert!(outcome.restored);

    engine.reset_bundle(&k, &starters).await;
    let bundle = engine.bundle(&k).await.unwrap();
    assert_eq!(bundle.slots.len(), 2);
    assert!(!bundle.slots.contains_key("extra/notes.js"));
}

#[tokio::test]
async fn test_set_last_lang() {
    let engine = engine();
    let k = key("v1");
    let starters = Starters::SingleLanguage(vec![
        ("js".to_string(), "a".to_string()),
        ("ts".to_string(), "b".to_string()),
    ]);

    engine.set_last_lang(&k, "ts").await;
    assert!(engine.bundle(&k).await.is_none());

    engine.init_bundle(&k, &starters).await;
    engine.set_last_lang(&k, "ts").await;
    let outcome = engine.init_bundle(&k, &starters).await;
    assert_eq!(outcome.last_lang.as_deref(), Some("ts"));
}

#[tokio::test]
async fn test_malformed_record_is_absent() {
    init_tracing();
    let primary = Arc::new(MemKV::new());
    let engine = DraftEngine::new(Arc::clone(&primary), MemKV::new());
    let k = key("v1");

    primary.set(&k.storage_key(), b"{not json").await.unwrap();
    assert!(engine.bundle(&k).await.is_none());

    let outcome = engine.init_bundle(&k, &js("a")).await;
    assert_eq!(outcome.visible("js"), Some("a"));
    assert!(engine.bundle(&k).await.is_some());
}

#[tokio::test]
async fn test_reads_are_served_from_cache() {
    init_tracing();
    let primary = Arc::new(MemKV::new());
    let engine = DraftEngine::new(Arc::clone(&primary), MemKV::new());
    let k = key("v1");

    engine.init_bundle(&k, &js("a")).await;
    // Changes behind the engine's back are not seen while the entry is hot
    primary.set(&k.storage_key(), b"garbage").await.unwrap();
    assert!(engine.bundle(&k).await.is_some());
}

#[tokio::test]
async fn test_cache_is_bounded() {
    init_tracing();
    let config = EngineConfig {
        cache_capacity: 2,
        ..EngineConfig::default()
    };
    let engine = DraftEngine::with_config(MemKV::new(), MemKV::new(), config);

    for version in ["v1", "v2", "v3"] {
        engine.init_bundle(&key(version), &js("a")).await;
    }
    assert_eq!(engine.cached_bundles(), 2);

    // Evicted bundles are still read from storage
    assert!(engine.bundle(&key("v1")).await.is_some());
}
