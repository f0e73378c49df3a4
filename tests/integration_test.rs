use ragvault::{Config, RagEngine, Result};
use serde_json::json;
use std::fs;
use tempfile::TempDir;

fn config_in(temp_dir: &TempDir) -> Result<Config> {
    let config = Config::new(Some(temp_dir.path().join("test_ragvault")))?;
    config.init()?;
    Ok(config)
}

#[test]
fn test_state_survives_restart() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let config = config_in(&temp_dir)?;

    let (source, before) = {
        let engine = RagEngine::open(&config)?;
        let source = engine.ingest(b"name,price\nApples,2.99\nBread,3.49", "prices.csv")?;
        let before = engine.query("bread", 5)?;
        (source, before)
    };

    assert!(config.vector_store_path.exists());
    assert!(config.sources_path.exists());

    let engine = RagEngine::open(&config)?;
    assert_eq!(engine.size(), 2);
    assert_eq!(engine.list_sources(), vec![source]);
    assert_eq!(engine.query("bread", 5)?, before);

    Ok(())
}

#[test]
fn test_delete_survives_restart() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let config = config_in(&temp_dir)?;

    {
        let engine = RagEngine::open(&config)?;
        engine.ingest(b"Opening hours are nine to five.", "hours.txt")?;
        let prices = engine.ingest(b"name,price\nApples,2.99\nBread,3.49", "prices.csv")?;
        assert!(engine.delete(&prices.id));
    }

    let engine = RagEngine::open(&config)?;
    assert_eq!(engine.size(), 1);
    assert_eq!(engine.count_orphans(), 0);
    let hits = engine.query("apples bread", 10)?;
    assert!(hits.iter().all(|h| h.attributes["source"] == json!("hours.txt")));

    Ok(())
}

#[test]
fn test_persisted_document_formats() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let config = config_in(&temp_dir)?;

    let engine = RagEngine::open(&config)?;
    let source = engine.ingest_path(&write_file(&temp_dir, "menu.csv", "name,price\nTea,2.00"))?;

    let store: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&config.vector_store_path)?)?;
    assert_eq!(store["documents"], json!(["name: Tea, price: 2.00"]));
    assert_eq!(store["embeddings"][0].as_array().map(|v| v.len()), Some(4096));
    assert_eq!(store["metadata"][0]["source"], json!("menu.csv"));
    assert_eq!(store["metadata"][0]["type"], json!("csv"));

    let sources: serde_json::Value = serde_json::from_str(&fs::read_to_string(&config.sources_path)?)?;
    assert_eq!(sources[0]["id"], json!(source.id));
    assert_eq!(sources[0]["name"], json!("menu.csv"));
    assert_eq!(sources[0]["chunks"], json!(1));
    assert!(sources[0]["uploadedAt"].is_string());
    assert!(sources[0]["contentHash"].is_string());

    Ok(())
}

#[test]
fn test_legacy_orphans_are_pruned() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let config = config_in(&temp_dir)?;

    // Snapshot left behind by a delete that never removed its vectors
    fs::write(
        &config.vector_store_path,
        json!({
            "documents": ["kept paragraph", "orphan paragraph"],
            "embeddings": [[1.0, 0.0], [0.0, 1.0]],
            "metadata": [
                {"source": "kept.txt", "type": "text"},
                {"source": "deleted.txt", "type": "text"}
            ]
        })
        .to_string(),
    )?;
    fs::write(
        &config.sources_path,
        json!([{"id": "1", "name": "kept.txt", "chunks": 1, "uploadedAt": "2024-01-01T00:00:00.000Z"}])
            .to_string(),
    )?;

    let engine = RagEngine::open(&config)?;
    assert_eq!(engine.size(), 2);
    assert_eq!(engine.count_orphans(), 1);

    assert_eq!(engine.prune_orphans(), 1);
    assert_eq!(engine.size(), 1);

    let reopened = RagEngine::open(&config)?;
    assert_eq!(reopened.size(), 1);
    assert_eq!(reopened.count_orphans(), 0);

    Ok(())
}

#[test]
fn test_corrupt_snapshot_starts_empty() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let config = config_in(&temp_dir)?;
    fs::write(&config.vector_store_path, "{\"documents\": [")?;

    let engine = RagEngine::open(&config)?;
    assert_eq!(engine.size(), 0);

    engine.ingest(b"A paragraph that is long enough.", "notes.txt")?;
    assert_eq!(RagEngine::open(&config)?.size(), 1);

    Ok(())
}

#[test]
fn test_failed_save_keeps_in_memory_result() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let config = config_in(&temp_dir)?;
    let engine = RagEngine::open(&config)?;

    // A directory in the way makes the final rename fail
    fs::create_dir_all(config.vector_store_path.join("blocker"))?;

    let source = engine.ingest(b"name,price\nApples,2.99", "prices.csv")?;
    assert_eq!(source.chunk_count, 1);
    assert_eq!(engine.size(), 1);
    assert_eq!(engine.list_sources(), vec![source.clone()]);
    assert_eq!(engine.query("apples", 1)?[0].text, "name: Apples, price: 2.99");

    assert!(engine.delete(&source.id));
    assert_eq!(engine.size(), 0);

    Ok(())
}

#[test]
fn test_ingest_directory_skips_unchanged() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let config = config_in(&temp_dir)?;
    let data_dir = temp_dir.path().join("data");
    fs::create_dir_all(data_dir.join("books"))?;

    fs::write(data_dir.join("prices.csv"), "name,price\nApples,2.99\nBread,3.49")?;
    fs::write(data_dir.join("books").join("catalog.json"), r#"[{"title": "Dune"}, {"title": "Emma"}]"#)?;
    fs::write(data_dir.join("empty.txt"), "short")?;
    fs::write(data_dir.join("logo.png"), "ignored")?;

    let engine = RagEngine::open(&config)?;
    let report = engine.ingest_directory(&data_dir, false)?;
    assert_eq!(report.ingested.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "empty.txt");
    assert_eq!(engine.size(), 4);

    let names: Vec<String> = engine.list_sources().into_iter().map(|s| s.name).collect();
    assert!(names.contains(&"prices.csv".to_string()));
    assert!(names.contains(&"books/catalog.json".to_string()));

    let report = engine.ingest_directory(&data_dir, false)?;
    assert!(report.ingested.is_empty());
    assert_eq!(report.skipped, 2);

    let report = engine.ingest_directory(&data_dir, true)?;
    assert_eq!(report.ingested.len(), 2);
    assert_eq!(engine.size(), 4);
    assert_eq!(engine.list_sources().len(), 2);

    Ok(())
}

#[test]
fn test_ingest_path_size_limit() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let mut config = config_in(&temp_dir)?;
    config.retrieval.max_file_size = 16;

    let engine = RagEngine::open(&config)?;
    let path = write_file(&temp_dir, "big.txt", "This file is longer than sixteen bytes.");
    assert!(matches!(
        engine.ingest_path(&path),
        Err(ragvault::Error::FileTooLarge { .. })
    ));
    assert_eq!(engine.size(), 0);

    Ok(())
}

fn write_file(temp_dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = temp_dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}
