use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use app::consumer::config::ConsumerConfig;
use app::consumer::{ConsumerManager, CsvConsumer, LogConsumer, ReportSender};
use app::remediate::{RemediationEngine, RemediationOptions, RemediationRun};
use app::walk::TraversalPolicy;
use security::{Ace, Acl, Fault, MemorySecurityService, SecurityDescriptor, Sid};
use utils::error::Result;

const ADMINS: &str = "S-1-5-32-544";
const ADMINISTRATOR: &str = "S-1-5-21-10-20-30-500";
const DELETED_USER: &str = "S-1-5-21-10-20-30-1104";

fn sid(s: &str) -> Sid {
    s.parse().unwrap()
}

struct Fixture {
    _dir: tempfile::TempDir,
    root: PathBuf,
    service: Arc<MemorySecurityService>,
}

/// root/{a.txt, sub/b.txt, locked/x.txt}；a.txt 与 b.txt 含孤立条目，locked 读取被拒绝
fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    fs::create_dir_all(root.join("sub")).unwrap();
    fs::create_dir_all(root.join("locked")).unwrap();
    for file in ["a.txt", "sub/b.txt", "locked/x.txt"] {
        fs::write(root.join(file), file).unwrap();
    }

    let service = Arc::new(MemorySecurityService::new());
    service
        .add_account(sid(ADMINS), "BUILTIN\\Administrators")
        .add_account(sid(ADMINISTRATOR), "Administrator");

    let clean = || {
        SecurityDescriptor::new(
            Some(sid(ADMINS)),
            Some(Acl::new(2, vec![Ace::allow(0x1F01FF, sid(ADMINS))])),
        )
    };
    let orphaned = || {
        SecurityDescriptor::new(
            Some(sid(DELETED_USER)),
            Some(Acl::new(
                2,
                vec![
                    Ace::allow(0x1F01FF, sid(ADMINS)),
                    Ace::allow(0x1200A9, sid(DELETED_USER)),
                ],
            )),
        )
    };
    service
        .set_descriptor(&root, clean())
        .set_descriptor(root.join("sub"), clean())
        .set_descriptor(root.join("locked"), clean())
        .set_descriptor(root.join("locked/x.txt"), clean())
        .set_descriptor(root.join("a.txt"), orphaned())
        .set_descriptor(root.join("sub/b.txt"), orphaned())
        .fail_read(root.join("locked"), Fault::AccessDenied);

    Fixture {
        _dir: dir,
        root,
        service,
    }
}

fn run(service: &Arc<MemorySecurityService>, workers: usize) -> RemediationRun {
    let engine =
        RemediationEngine::new(service.clone(), RemediationOptions::default(), "Administrator")
            .unwrap();
    RemediationRun::new(engine, TraversalPolicy::default(), workers, 4)
}

#[tokio::test]
async fn test_run_reconciles_summary() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let fixture = fixture();

    let summary = run(&fixture.service, 4)
        .run(&fixture.root, ReportSender::disconnected())
        .await?;

    // locked/x.txt 是否被处理取决于子树剪枝发生的时机
    assert!(summary.processed == 6 || summary.processed == 5);
    assert!(summary.is_reconciled());
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.updated, 2);
    assert_eq!(summary.acl_updated, 2);
    assert_eq!(summary.owners_changed, 2);
    assert_eq!(summary.acl_entries_removed, 2);

    let a = fixture.service.descriptor(&fixture.root.join("a.txt")).unwrap();
    assert_eq!(a.owner, Some(sid(ADMINISTRATOR)));
    assert_eq!(a.dacl.unwrap().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_second_run_changes_nothing() -> Result<()> {
    let fixture = fixture();
    let first = run(&fixture.service, 2)
        .run(&fixture.root, ReportSender::disconnected())
        .await?;
    let writes = fixture.service.write_count();

    let second = run(&fixture.service, 2)
        .run(&fixture.root, ReportSender::disconnected())
        .await?;

    assert_eq!(first.updated, 2);
    assert_eq!(second.updated, 0);
    assert_eq!(fixture.service.write_count(), writes);
    Ok(())
}

#[tokio::test]
async fn test_missing_root_is_a_single_error() -> Result<()> {
    let fixture = fixture();
    let summary = run(&fixture.service, 2)
        .run(&fixture.root.join("missing"), ReportSender::disconnected())
        .await?;
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.errors, 1);
    Ok(())
}

#[tokio::test]
async fn test_csv_report_rows() -> Result<()> {
    let fixture = fixture();
    let report_dir = tempfile::tempdir().unwrap();
    let report = report_dir.path().join("acl_cleanup_test.csv");

    let mut consumer_manager = ConsumerManager::new(8);
    consumer_manager.add_consumer(Box::new(LogConsumer));
    consumer_manager.add_consumer(Box::new(CsvConsumer::at(&report)));
    consumer_manager.start_consumers().await?;
    assert_eq!(consumer_manager.get_consumer_count(), 2);

    let summary = run(&fixture.service, 3)
        .run(&fixture.root, consumer_manager.sender())
        .await?;
    consumer_manager.shutdown().await?;

    let rows = read_rows(&report);
    let count = |action: &str| rows.iter().filter(|r| r[0] == action).count();
    assert_eq!(count("ACL_UPDATED"), 2);
    assert_eq!(count("OWNER_CHANGED"), 2);
    assert_eq!(count("ERROR"), 1);
    assert_eq!(count("UNCHANGED"), summary.unchanged);
    // 每个被删除的条目和被替换的所有者各有一条 INFO
    assert_eq!(count("INFO"), 4);

    let last = rows.last().unwrap();
    assert_eq!(last[0], "SUMMARY");
    assert_eq!(last[1], fixture.root.display().to_string());
    assert!(last[2].starts_with(&format!("Processed: {}", summary.processed)));
    Ok(())
}

#[tokio::test]
async fn test_consumer_manager_creation() -> Result<()> {
    let manager = ConsumerManager::with_config(&ConsumerConfig::default());
    assert_eq!(manager.get_consumer_count(), 0);

    let config = ConsumerConfig {
        enable_console: true,
        enable_log: true,
        csv: None,
        channel_capacity: 16,
    };
    let mut manager = ConsumerManager::with_config(&config);
    assert_eq!(manager.get_consumer_count(), 2);

    manager.start_consumers().await?;
    assert_eq!(manager.sender().len(), 2);
    manager.shutdown().await?;
    Ok(())
}

fn read_rows(path: &Path) -> Vec<Vec<String>> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader
        .records()
        .map(|r| r.unwrap().iter().map(String::from).collect())
        .collect()
}
