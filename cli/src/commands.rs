use std::path::{Path, PathBuf};

use app::count::count_files;
use app::purge::{purge, PurgeParams};
use app::remediate::{clean, CleanParams};
use app::walk::{CancelFlag, TraversalPolicy};
use utils::app_config::AppConfig;
use utils::error::{Error, Result};

use crate::prompt::ask;

fn ensure_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(Error::new(format!("Path {} does not exist", path.display())));
    }
    Ok(())
}

fn prompt_path(path: PathBuf) -> Result<PathBuf> {
    let default = path.display().to_string();
    Ok(PathBuf::from(ask("Enter root path", &default)?))
}

pub async fn clean_cmd(
    path: PathBuf, acl_only: bool, owner_only: bool, new_owner: Option<String>,
    workers: Option<usize>, interactive: bool,
) -> Result<()> {
    let config = AppConfig::fetch()?;
    let (path, new_owner) = if interactive {
        let path = prompt_path(path)?;
        let default_owner = new_owner
            .clone()
            .unwrap_or_else(|| config.remediate.replacement_principal.clone());
        let owner = if acl_only {
            new_owner
        } else {
            Some(ask("Enter new owner", &default_owner)?)
        };
        (path, owner)
    } else {
        (path, new_owner)
    };
    ensure_exists(&path)?;

    let service = security::platform_service().ok_or_else(|| {
        Error::new("Security descriptor remediation is only supported on Windows")
    })?;

    let cancel = CancelFlag::new();
    let interrupt = cancel.cancel_on_ctrl_c();
    let params = CleanParams {
        path,
        acl_only,
        owner_only,
        new_owner,
        workers,
        cancel,
    };

    let result = clean(params, service).await;
    interrupt.abort();
    let summary = result?;
    log::info!("Clean finished: {}", summary);
    Ok(())
}

pub async fn purge_cmd(path: PathBuf, interactive: bool) -> Result<()> {
    let path = if interactive { prompt_path(path)? } else { path };
    ensure_exists(&path)?;

    let cancel = CancelFlag::new();
    let interrupt = cancel.cancel_on_ctrl_c();
    let result = purge(PurgeParams { path, cancel }).await;
    interrupt.abort();
    let summary = result?;
    log::info!("Purge finished: {}", summary);
    Ok(())
}

pub async fn count_cmd(path: PathBuf) -> Result<()> {
    ensure_exists(&path)?;
    let config = AppConfig::fetch()?;

    println!("Scanning directory: {}", path.display());
    let cancel = CancelFlag::new();
    let interrupt = cancel.cancel_on_ctrl_c();
    let result = count_files(
        &path,
        TraversalPolicy::from(&config.traversal),
        cancel,
        config.remediate.queue_capacity,
    )
    .await;
    interrupt.abort();

    println!("{}", result?);
    Ok(())
}
