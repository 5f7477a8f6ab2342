use std::io::Write;
use std::sync::{Mutex, MutexGuard};

use utils::app_config::*;

// The configuration builder is process global; tests take turns with it.
static CONFIG_LOCK: Mutex<()> = Mutex::new(());

pub fn initialize() -> MutexGuard<'static, ()> {
    let guard = CONFIG_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let config_contents = include_str!("resources/test_config.toml");
    AppConfig::init(Some(config_contents)).unwrap();
    guard
}

#[test]
fn fetch_config() {
    let _guard = initialize();

    let config = AppConfig::fetch().unwrap();

    assert_eq!(config.log.max_size, 100);
    assert_eq!(config.log.max_backups, 10);

    assert!(config.remediate.clean_acl);
    assert_eq!(config.remediate.replacement_principal, "S-1-5-32-544");
    assert_eq!(config.remediate.queue_capacity, 64);
    assert_eq!(config.remediate.preserve_prefixes, vec!["S-1-15-".to_string()]);

    assert_eq!(config.traversal.max_depth, 3);
    assert!(!config.traversal.follow_links);
    assert!(config.traversal.skip_denied_subtrees);

    assert!(!config.report.enabled);
    assert_eq!(config.report.directory, "reports");

    assert_eq!(config.purge.patterns, vec!["thumbs.db".to_string(), "~*.tmp".to_string()]);
}

#[test]
fn verify_get() {
    let _guard = initialize();

    assert_eq!(AppConfig::get::<u64>("log.max_size").unwrap(), 100);
    assert_eq!(AppConfig::get::<u8>("log.max_backups").unwrap(), 10);
    assert_eq!(AppConfig::get::<usize>("remediate.queue_capacity").unwrap(), 64);
    assert_eq!(
        AppConfig::get::<String>("report.file_prefix").unwrap(),
        "owner_fix"
    );
    assert!(!AppConfig::get::<bool>("traversal.follow_links").unwrap());
}

#[test]
fn verify_set() {
    let _guard = initialize();

    AppConfig::set("remediate.replace_owner", "true").unwrap();
    AppConfig::set("remediate.workers", "16").unwrap();

    let config = AppConfig::fetch().unwrap();

    assert!(config.remediate.replace_owner);
    assert_eq!(config.remediate.workers, 16);
}

#[test]
fn test_nested_configuration_access() {
    let _guard = initialize();

    let log_config = AppConfig::get::<LogConfig>("log").unwrap();
    assert_eq!(log_config.max_size, 100);

    let traversal = AppConfig::get::<TraversalConfig>("traversal").unwrap();
    assert_eq!(traversal.max_depth, 3);

    let purge = AppConfig::get::<PurgeConfig>("purge").unwrap();
    assert_eq!(purge.patterns.len(), 2);
    assert_eq!(purge.file_prefix, "temp_purge");
}

#[test]
fn merge_config_overrides_embedded_defaults() {
    let _guard = initialize();

    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "[report]\ndirectory = \"merged-reports\"").unwrap();

    AppConfig::merge_config(Some(file.path())).unwrap();

    assert_eq!(
        AppConfig::get::<String>("report.directory").unwrap(),
        "merged-reports"
    );
    // Keys absent from the merged file keep their embedded values.
    assert_eq!(
        AppConfig::get::<String>("report.file_prefix").unwrap(),
        "owner_fix"
    );
}
