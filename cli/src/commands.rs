use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use draftstore::{
    DraftEngine, DraftError, DraftKey, ExerciseContent, InitOutcome, KVStore, SaveOptions,
};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::args::Commands;

/// Read exercise content from a JSON file
pub fn load_exercise(path: &Path) -> Result<ExerciseContent, DraftError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

fn outcome_json(key: &DraftKey, outcome: &InitOutcome) -> Value {
    let slots: Map<String, Value> = outcome
        .slots
        .iter()
        .map(|(name, view)| {
            let slot = json!({ "visible": view.visible, "restored": view.restored });
            (name.clone(), slot)
        })
        .collect();
    json!({
        "key": key.to_string(),
        "restored": outcome.restored,
        "lastLang": outcome.last_lang,
        "entryFile": outcome.entry_file,
        "slots": slots,
    })
}

/// Execute one command against the draft of `exercise`
pub async fn run<P, F>(
    engine: &DraftEngine<P, F>,
    exercise: &ExerciseContent,
    command: Commands,
) -> Result<Value, DraftError>
where
    P: KVStore + 'static,
    F: KVStore + 'static,
{
    let key = exercise.draft_key();
    let starters = exercise.starters();
    debug!(key = %key, ?command, "running command");

    let output = match command {
        Commands::Init => outcome_json(&key, &engine.init_bundle(&key, &starters).await),
        Commands::Show { version } => {
            let key = version.map_or_else(|| key.clone(), |version| key.with_version(version));
            match engine.open_older_draft(&key, &starters).await {
                Some(outcome) => outcome_json(&key, &outcome),
                None => json!({ "key": key.to_string(), "slots": null }),
            }
        }
        Commands::Save { slot, file, force } => {
            let value = std::fs::read_to_string(&file)?;
            engine.save_field(&key, &slot, &value, SaveOptions { force }).await;
            let state = engine.slot_state(&key, &slot).await;
            json!({
                "key": key.to_string(),
                "slot": slot,
                "code": state.as_ref().map(|state| state.code.as_str()),
                "dirty": state.as_ref().is_some_and(|state| state.dirty),
            })
        }
        Commands::Reset => {
            engine.reset_bundle(&key, &starters).await;
            let bundle = engine.bundle(&key).await;
            json!({ "key": key.to_string(), "draft": serde_json::to_value(bundle)? })
        }
        Commands::Clear => {
            engine.clear_bundle(&key).await;
            let cleared = engine.bundle(&key).await.is_none();
            json!({ "key": key.to_string(), "cleared": cleared })
        }
        Commands::Versions => {
            let index = engine.load_index(key.base()).await;
            let banner = engine.banner_state(key.base(), key.version(), None).await;
            json!({
                "base": key.base(),
                "current": key.version(),
                "latestVersion": index.latest_version,
                "showUpdated": banner.show_updated,
                "olderVersions": serde_json::to_value(&banner.older_versions)?,
            })
        }
        Commands::Dismiss => {
            engine.dismiss(key.base(), key.version()).await;
            let dismissed = engine.is_dismissed(key.base(), key.version()).await;
            json!({ "key": key.to_string(), "dismissed": dismissed })
        }
        Commands::Migrate => {
            let migrated = engine.migrate_legacy(key.base()).await;
            json!({ "base": key.base(), "migrated": migrated })
        }
    };
    Ok(output)
}
