use std::io::Write;

use diligence::config::Settings;

#[test]
fn loads_settings_from_env_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"# regional deployment
AZURE_OPENAI_API_KEY=file-key
AZURE_OPENAI_API_ENDPOINT="https://eastus.example.azure.com/"
AZURE_OPENAI_MODEL_1_DEPLOYMENT_NAME=gpt-4o-file
SCRAPINGBEE_NB_RESULTS=7
UPSTREAM_TIMEOUT_SECS=15"#
    )
    .unwrap();

    let settings = Settings::load(Some(file.path())).unwrap();
    assert_eq!(settings.openai.deployment, "gpt-4o-file");
    assert_eq!(settings.openai.endpoint, "https://eastus.example.azure.com/");
    assert_eq!(settings.search.nb_results, Some(7));
    assert_eq!(settings.upstream.timeout.as_secs(), 15);
}

#[test]
fn explicit_env_file_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    let err = Settings::load(Some(&dir.path().join("missing.env"))).unwrap_err();
    assert_eq!(err.kind(), "config");
    assert!(err.to_string().contains("missing.env"));
}
