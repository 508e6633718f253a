//! locsync CLI
//!
//! Runs placement reconciliation against objects loaded from a JSON fixture.

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use locsync_common::{Config, ObjectKey, ResourceType, TenantName};
use locsync_placement::{LocationKeys, MergePatch, compute_placement};
use locsync_reconciler::{
    Controller, Fixture, MemoryStore, NamespaceLister, PatchClient, ReconcileOutcome, Reconciler,
    ResourceInformers,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "locsync")]
#[command(about = "Align object placement with namespace placement")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "locsync.toml")]
    config: PathBuf,

    /// Log level (overrides the configuration file)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the merge patch one object needs
    Diff {
        /// Fixture file
        fixture: PathBuf,
        /// Resource type as group/version/resource (version/resource for core)
        #[arg(long)]
        resource: ResourceType,
        /// Tenant of the object
        #[arg(long)]
        tenant: String,
        /// Namespace of the object
        #[arg(long)]
        namespace: String,
        /// Object name
        #[arg(long)]
        name: String,
    },
    /// Reconcile every object once and print the applied patches
    Reconcile {
        /// Fixture file
        fixture: PathBuf,
    },
    /// Run the controller until the queue drains and print the result
    Converge {
        /// Fixture file
        fixture: PathBuf,
        /// Worker count (overrides the configuration file)
        #[arg(long)]
        workers: Option<usize>,
        /// Give up after this many seconds
        #[arg(long, default_value = "30")]
        timeout_secs: u64,
    },
}

/// Load the configuration file; a missing file yields defaults
fn load_config(path: &Path) -> Result<Config> {
    let config: Config = if path.exists() {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&config_str)
            .with_context(|| format!("failed to parse config file {}", path.display()))?
    } else {
        Config::default()
    };
    config.validate()?;
    Ok(config)
}

fn load_fixture(path: &Path) -> Result<Fixture> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read fixture {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("failed to parse fixture {}", path.display()))
}

fn patch_json(patch: &MergePatch) -> Result<String> {
    if patch.is_empty() {
        return Ok("{}".to_string());
    }
    let body = patch.to_vec()?;
    Ok(String::from_utf8(body)?)
}

/// Merge patch for a single object, without applying it
async fn diff(
    config: &Config,
    store: &MemoryStore,
    resource: &ResourceType,
    key: &ObjectKey,
) -> Result<MergePatch> {
    let object = store
        .object(resource, key)
        .ok_or_else(|| anyhow!("object {key} of {resource} not found in fixture"))?;
    let namespace = NamespaceLister::get(store, &key.tenant, &key.namespace)
        .await
        .with_context(|| format!("failed to look up namespace of {key}"))?;

    let keys = LocationKeys::from(&config.placement);
    Ok(compute_placement(&keys, &namespace.metadata, &object.metadata).to_merge_patch())
}

/// One reconciliation pass over every object; returns the patches applied
async fn reconcile_all(
    config: &Config,
    store: &Arc<MemoryStore>,
) -> Result<Vec<(ResourceType, ObjectKey, MergePatch)>> {
    let reconciler = Reconciler::new(
        &config.placement,
        Arc::clone(store) as Arc<dyn NamespaceLister>,
        Arc::clone(store) as Arc<dyn PatchClient>,
    );
    let cancel = CancellationToken::new();
    let mut applied = Vec::new();

    for (resource, lister) in store.listers().synced {
        for object in lister.list()? {
            let outcome = reconciler
                .reconcile(&cancel, &object.tenant, &object, &resource)
                .await
                .with_context(|| format!("failed to reconcile {} of {resource}", object.key()))?;
            if let ReconcileOutcome::Patched(patch) = outcome {
                applied.push((resource.clone(), object.key(), patch.to_merge_patch()));
            }
        }
    }

    let stats = reconciler.stats().snapshot();
    info!(
        reconciled = stats.reconciled,
        patched = stats.patched,
        unchanged = stats.unchanged,
        skipped = stats.skipped,
        "Reconciliation pass complete"
    );
    Ok(applied)
}

/// Run the controller until every queued item is processed
async fn converge(
    config: &Config,
    store: &Arc<MemoryStore>,
    workers: usize,
    timeout: Duration,
) -> Result<()> {
    let controller = Arc::new(Controller::new(
        config,
        Arc::clone(store) as Arc<dyn NamespaceLister>,
        Arc::clone(store) as Arc<dyn ResourceInformers>,
        Arc::clone(store) as Arc<dyn PatchClient>,
    ));
    let cancel = CancellationToken::new();
    let running = tokio::spawn(Arc::clone(&controller).run(workers, cancel.clone()));

    controller.enqueue_all_types();
    let drained = tokio::time::timeout(timeout, async {
        while !controller.queue().is_idle() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    cancel.cancel();
    running.await.context("controller task failed")?;

    if drained.is_err() {
        bail!("queue did not drain within {}s", timeout.as_secs());
    }
    let stats = controller.reconciler().stats().snapshot();
    if stats.failed > 0 {
        warn!(failed = stats.failed, "Some reconcile attempts failed before converging");
    }
    info!(patched = stats.patched, "Converged");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args.config)?;

    let log_level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match args.command {
        Commands::Diff {
            fixture,
            resource,
            tenant,
            namespace,
            name,
        } => {
            let store = MemoryStore::from_fixture(&load_fixture(&fixture)?);
            let key = ObjectKey::new(TenantName::from(tenant), namespace, name);
            let patch = diff(&config, &store, &resource, &key).await?;
            println!("{}", patch_json(&patch)?);
        }
        Commands::Reconcile { fixture } => {
            let store = Arc::new(MemoryStore::from_fixture(&load_fixture(&fixture)?));
            for (resource, key, patch) in reconcile_all(&config, &store).await? {
                println!("{resource} {key} {}", patch_json(&patch)?);
            }
        }
        Commands::Converge {
            fixture,
            workers,
            timeout_secs,
        } => {
            let store = Arc::new(MemoryStore::from_fixture(&load_fixture(&fixture)?));
            let workers = workers.unwrap_or(config.controller.workers);
            if workers == 0 {
                bail!("--workers must be at least 1");
            }
            converge(&config, &store, workers, Duration::from_secs(timeout_secs)).await?;
            println!("{}", serde_json::to_string_pretty(&store.to_fixture())?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use locsync_common::ResourceObject;
    use std::io::Write;

    const FIXTURE: &str = r#"{
        "namespaces": [
            {"tenant": "acme", "name": "default", "labels": {"state.workload.locsync.io/east": "Sync"}}
        ],
        "resources": [{
            "group": "apps", "version": "v1", "resource": "deployments",
            "objects": [
                {"tenant": "acme", "namespace": "default", "name": "web",
                 "labels": {"state.workload.locsync.io/west": "Sync"}},
                {"tenant": "acme", "namespace": "default", "name": "api",
                 "labels": {"state.workload.locsync.io/east": "Sync"}}
            ]
        }]
    }"#;

    fn deployments() -> ResourceType {
        ResourceType::new("apps", "v1", "deployments")
    }

    fn store() -> Arc<MemoryStore> {
        let fixture: Fixture = serde_json::from_str(FIXTURE).unwrap();
        Arc::new(MemoryStore::from_fixture(&fixture))
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "locsync",
            "diff",
            "fixture.json",
            "--resource",
            "apps/v1/deployments",
            "--tenant",
            "acme",
            "--namespace",
            "default",
            "--name",
            "web",
        ])
        .unwrap();
        assert_eq!(args.config, PathBuf::from("locsync.toml"));
        match args.command {
            Commands::Diff { resource, .. } => assert_eq!(resource, deployments()),
            other => panic!("unexpected command {other:?}"),
        }

        assert!(Args::try_parse_from(["locsync", "diff", "f.json", "--resource", "a/b/c/d"]).is_err());
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.controller.workers, 2);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_file_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[placement]\nsync_state = \"Ready\"\n\n[controller]\nworkers = 8\n"
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.placement.sync_state, "Ready");
        assert_eq!(config.controller.workers, 8);
        assert_eq!(
            config.placement.state_label_prefix,
            locsync_common::config::DEFAULT_STATE_LABEL_PREFIX
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[controller]\nworkers = 0").unwrap();
        assert!(load_config(file.path()).is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[controller\nworkers = ").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("failed to parse config file"));
    }

    #[tokio::test]
    async fn test_diff_does_not_apply() {
        let store = store();
        let key = ObjectKey::new("acme", "default", "web");
        let patch = diff(&Config::default(), &store, &deployments(), &key).await.unwrap();

        assert_eq!(
            patch_json(&patch).unwrap(),
            r#"{"metadata":{"labels":{"state.workload.locsync.io/east":"Sync","state.workload.locsync.io/west":null}}}"#
        );
        assert!(store.applied_patches().is_empty());

        let key = ObjectKey::new("acme", "default", "api");
        let patch = diff(&Config::default(), &store, &deployments(), &key).await.unwrap();
        assert_eq!(patch_json(&patch).unwrap(), "{}");

        let key = ObjectKey::new("acme", "default", "missing");
        assert!(diff(&Config::default(), &store, &deployments(), &key).await.is_err());
    }

    #[tokio::test]
    async fn test_diff_requires_namespace_of_same_tenant() {
        let store = store();
        store.insert_object(&deployments(), ResourceObject::namespaced("other", "default", "web"));

        let key = ObjectKey::new("other", "default", "web");
        let err = diff(&Config::default(), &store, &deployments(), &key)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to look up namespace"));
        assert!(store.applied_patches().is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_pass_applies_once() {
        let store = store();
        let applied = reconcile_all(&Config::default(), &store).await.unwrap();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].1, ObjectKey::new("acme", "default", "web"));

        let applied = reconcile_all(&Config::default(), &store).await.unwrap();
        assert!(applied.is_empty());
    }

    #[tokio::test]
    async fn test_converge_drains() {
        let store = store();
        converge(&Config::default(), &store, 2, Duration::from_secs(10))
            .await
            .unwrap();

        for object in store.objects(&deployments()) {
            assert_eq!(
                object.metadata.label("state.workload.locsync.io/east"),
                Some("Sync")
            );
            assert_eq!(object.metadata.label("state.workload.locsync.io/west"), None);
        }
    }
}
