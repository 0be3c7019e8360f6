use anyhow::{bail, Context};
use chrono::{TimeZone, Utc};
use colored::Colorize;
use docattr_core::{Pipeline, VersionDelta};
use docattr_doc::AttributeMap;
use docattr_server::{DocattrServer, ServerConfig, StoreBackend};
use docattr_store::{DocId, Timestamp};
use serde::Serialize;
use tracing::debug;

use crate::cli::{Cli, Command, DocArgs, OutputFormat, ServeArgs};

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let mut config = load_config(&cli)?;
    match cli.command {
        Command::Serve(args) => {
            apply_overrides(&mut config, &args);
            cmd_serve(config)
        }
        Command::Config => cmd_config(&config),
        Command::Attributions(args) => cmd_attributions(&config, args, cli.format),
        Command::Versions(args) => cmd_versions(&config, args, cli.format),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<ServerConfig> {
    match &cli.config {
        Some(path) => {
            let config = ServerConfig::load(path)
                .with_context(|| format!("loading config from {}", path.display()))?;
            debug!(path = %path.display(), "loaded config");
            Ok(config)
        }
        None => {
            debug!("no config file given, using defaults");
            Ok(ServerConfig::default())
        }
    }
}

fn apply_overrides(config: &mut ServerConfig, args: &ServeArgs) {
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(workers) = args.workers {
        config.pipeline.workers = workers;
    }
    if let Some(dir) = &args.data_dir {
        config.store.root = dir.clone();
    }
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("starting tokio runtime")
}

fn cmd_serve(config: ServerConfig) -> anyhow::Result<()> {
    if config.pipeline.workers == 0 {
        bail!("at least one compaction worker is required");
    }
    println!(
        "{} docattr on {} ({} workers, store: {})",
        "▶".green().bold(),
        config.bind_addr.to_string().bold(),
        config.pipeline.workers,
        describe_store(&config).cyan()
    );
    runtime()?.block_on(async {
        let server = DocattrServer::new(config).await?;
        server.serve().await
    })?;
    println!("{} stopped", "✓".green());
    Ok(())
}

fn cmd_config(config: &ServerConfig) -> anyhow::Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}

fn describe_store(config: &ServerConfig) -> String {
    match config.store.backend {
        StoreBackend::Memory => "memory".to_string(),
        StoreBackend::Fs => format!(
            "{}/{}",
            config.store.root.display(),
            config.store.bucket
        ),
    }
}

/// Pipeline over the configured store, for offline reads. No workers run.
async fn open_pipeline(config: &ServerConfig) -> anyhow::Result<Pipeline> {
    if config.store.backend == StoreBackend::Memory {
        bail!("the memory store holds nothing between runs; configure the fs backend to inspect data");
    }
    let store = config.store.open().await?;
    let scheme = config.store.key_scheme()?;
    Ok(Pipeline::new(store, scheme, config.pipeline.clone()))
}

#[derive(Serialize)]
struct RangeView {
    client: u64,
    start: u64,
    len: u64,
    items: Vec<(String, String)>,
}

fn range_views(map: &AttributeMap) -> Vec<RangeView> {
    map.iter()
        .map(|a| RangeView {
            client: a.range.client,
            start: a.range.start,
            len: a.range.len,
            items: a
                .items
                .iter()
                .map(|i| (i.name.clone(), i.value.clone()))
                .collect(),
        })
        .collect()
}

fn cmd_attributions(
    config: &ServerConfig,
    args: DocArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let docid = DocId::new(args.docid)?;
    let map = runtime()?.block_on(async {
        let pipeline = open_pipeline(config).await?;
        anyhow::Ok(pipeline.attributions.get_attributions(&docid).await?)
    })?;
    let views = range_views(&map);
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&views)?),
        OutputFormat::Text => {
            if views.is_empty() {
                println!("No attributions for {}.", docid.to_string().yellow());
            }
            for view in views {
                let tags: Vec<String> = view
                    .items
                    .iter()
                    .map(|(name, value)| format!("{}={}", name.cyan(), value))
                    .collect();
                println!(
                    "{} {}..{}  {}",
                    format!("client {}", view.client).bold(),
                    view.start,
                    view.start + view.len,
                    tags.join(" ")
                );
            }
        }
    }
    Ok(())
}

fn format_timestamp(ts: Timestamp) -> String {
    i64::try_from(ts)
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .map(|t| t.format("%Y-%m-%d %H:%M:%S%.3f UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn cmd_versions(config: &ServerConfig, args: DocArgs, format: OutputFormat) -> anyhow::Result<()> {
    let docid = DocId::new(args.docid)?;
    let deltas: Vec<VersionDelta> = runtime()?.block_on(async {
        let pipeline = open_pipeline(config).await?;
        anyhow::Ok(pipeline.versions.get_all_version_deltas(&docid).await?)
    })?;
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({ "deltas": deltas }))?
            )
        }
        OutputFormat::Text => {
            if deltas.is_empty() {
                println!("No versions for {}.", docid.to_string().yellow());
            }
            for d in &deltas {
                println!(
                    "{}  {}  {} {}",
                    d.timestamp.to_string().yellow(),
                    format_timestamp(d.timestamp).dimmed(),
                    format!("+{}", d.delta.inserted_len()).green(),
                    format!("-{}", d.delta.deleted_len()).red()
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn overrides_apply_only_when_set() {
        let mut config = ServerConfig::default();
        apply_overrides(&mut config, &ServeArgs::default());
        assert_eq!(config, ServerConfig::default());

        apply_overrides(
            &mut config,
            &ServeArgs {
                bind: Some("0.0.0.0:1".parse().unwrap()),
                workers: Some(7),
                data_dir: Some(PathBuf::from("/tmp/x")),
            },
        );
        assert_eq!(config.bind_addr.port(), 1);
        assert_eq!(config.pipeline.workers, 7);
        assert_eq!(config.store.root, PathBuf::from("/tmp/x"));
    }

    #[test]
    fn config_file_is_loaded_and_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docattr.toml");
        let mut expected = ServerConfig::default();
        expected.pipeline.workers = 5;
        std::fs::write(&path, expected.to_toml().unwrap()).unwrap();

        let cli = Cli::parse_from(["docattr", "-c", path.to_str().unwrap(), "config"]);
        assert_eq!(load_config(&cli).unwrap(), expected);

        let missing = dir.path().join("absent.toml");
        let cli = Cli::parse_from(["docattr", "-c", missing.to_str().unwrap(), "config"]);
        let err = load_config(&cli).unwrap_err();
        assert!(err.to_string().contains("loading config from"));
    }

    #[test]
    fn timestamps_render_as_utc() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00.000 UTC");
        assert_eq!(format_timestamp(u64::MAX), u64::MAX.to_string());
    }

    #[test]
    fn inspect_fs_store_offline() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::default();
        config.store.root = dir.path().to_path_buf();

        let rt = runtime().unwrap();
        rt.block_on(async {
            let pipeline = open_pipeline(&config).await.unwrap();
            let mut d = docattr_doc::Document::new(1);
            d.insert(0, "hi").unwrap();
            pipeline
                .versions
                .store_version(&DocId::new("doc").unwrap(), d.encode_state().unwrap())
                .await
                .unwrap();
        });

        let args = DocArgs {
            docid: "doc".into(),
        };
        cmd_versions(&config, args, OutputFormat::Json).unwrap();
        let args = DocArgs {
            docid: "doc".into(),
        };
        cmd_attributions(&config, args, OutputFormat::Text).unwrap();
    }

    #[test]
    fn memory_store_cannot_be_inspected() {
        let mut config = ServerConfig::default();
        config.store.backend = StoreBackend::Memory;
        let args = DocArgs {
            docid: "doc".into(),
        };
        assert!(cmd_attributions(&config, args, OutputFormat::Text).is_err());
    }
}
