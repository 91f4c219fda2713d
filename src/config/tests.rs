use super::*;
use tempfile::TempDir;

#[test]
fn defaults_when_file_missing() {
    let temp_dir = TempDir::new().expect("can create temp dir");

    let config = Config::load(temp_dir.path()).expect("load should succeed");

    assert_eq!(config.server.port, 8000);
    assert_eq!(config.chunking.chunk_size, 1000);
    assert_eq!(config.chunking.overlap, 200);
    assert_eq!(config.embedding.backend, EmbeddingBackendKind::Hashing);
    assert_eq!(config.data_dir, temp_dir.path());
}

#[test]
fn save_and_reload_round_trip() {
    let temp_dir = TempDir::new().expect("can create temp dir");

    let mut config = Config {
        data_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    config.server.port = 9001;
    config.chunking.chunk_size = 512;
    config.chunking.overlap = 64;
    config.embedding.model = "all-minilm:latest".to_string();

    config.save().expect("save should succeed");

    let reloaded = Config::load(temp_dir.path()).expect("reload should succeed");
    assert_eq!(reloaded, config);
}

#[test]
fn storage_paths_derive_from_data_dir() {
    let config = Config {
        data_dir: PathBuf::from("/tmp/ragserve-test"),
        ..Config::default()
    };

    assert_eq!(
        config.documents_dir(),
        PathBuf::from("/tmp/ragserve-test/documents")
    );
    assert_eq!(
        config.vectors_dir(),
        PathBuf::from("/tmp/ragserve-test/vectors")
    );
}

#[test]
fn rejects_zero_chunk_size() {
    let mut config = Config::default();
    config.chunking.chunk_size = 0;

    let err = config.validate().expect_err("validation should fail");
    assert!(matches!(err, ConfigError::InvalidChunkSize(0)));
}

#[test]
fn rejects_overlap_not_smaller_than_chunk_size() {
    let mut config = Config::default();
    config.chunking.chunk_size = 100;
    config.chunking.overlap = 100;

    let err = config.validate().expect_err("validation should fail");
    assert!(matches!(err, ConfigError::InvalidOverlap(100, 100)));

    config.chunking.overlap = 150;
    let err = config.validate().expect_err("validation should fail");
    assert!(matches!(err, ConfigError::InvalidOverlap(150, 100)));
}

#[test]
fn rejects_invalid_embedding_settings() {
    let mut config = Config::default();
    config.embedding.protocol = "ftp".to_string();
    assert!(matches!(
        config.validate().expect_err("validation should fail"),
        ConfigError::InvalidProtocol(_)
    ));

    let mut config = Config::default();
    config.embedding.batch_size = 0;
    assert!(matches!(
        config.validate().expect_err("validation should fail"),
        ConfigError::InvalidBatchSize(0)
    ));

    let mut config = Config::default();
    config.embedding.dimension = 16;
    assert!(matches!(
        config.validate().expect_err("validation should fail"),
        ConfigError::InvalidEmbeddingDimension(16)
    ));

    let mut config = Config::default();
    config.embedding.timeout_seconds = 0;
    assert!(matches!(
        config.validate().expect_err("validation should fail"),
        ConfigError::InvalidTimeout(0)
    ));
}

#[test]
fn config_error_maps_to_invalid_config() {
    let err: crate::RagError = ConfigError::InvalidChunkSize(0).into();
    assert!(matches!(err, crate::RagError::InvalidConfig(_)));
}

#[test]
fn backend_url_built_from_parts() {
    let embedding = EmbeddingConfig {
        protocol: "https".to_string(),
        host: "embeddings.internal".to_string(),
        port: 8443,
        ..EmbeddingConfig::default()
    };

    let url = embedding.backend_url().expect("url should parse");
    assert_eq!(url.as_str(), "https://embeddings.internal:8443/");
}
