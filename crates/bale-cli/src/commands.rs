//! Command implementations: assemble [`BuildOptions`] from config file and
//! flags (flags win), then drive the bundler or the dev session.

use std::net::SocketAddr;

use anyhow::{bail, Context};
use tracing::info;

use bale_bundler::Bundler;
use bale_core::BuildOptions;
use bale_dev::DevSession;

use crate::args::{BuildArgs, DevArgs};

/// Merge `bale.config.json` (when present) with command-line flags.
pub fn resolve_options(args: &BuildArgs) -> anyhow::Result<BuildOptions> {
    let config_path = match &args.config {
        Some(path) => Some(path.clone()),
        None => {
            let default = args.root.join("bale.config.json");
            default.is_file().then_some(default)
        }
    };

    let mut options = match config_path {
        Some(path) => BuildOptions::from_file(&path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => BuildOptions::default(),
    };

    options.root = args
        .root
        .canonicalize()
        .with_context(|| format!("project root {}", args.root.display()))?;
    if !args.entry.is_empty() {
        options.entry = args.entry.clone();
    }
    if let Some(outdir) = &args.outdir {
        options.outdir = outdir.clone();
    } else if options.outdir.is_relative() {
        options.outdir = options.root.join(&options.outdir);
    }
    if let Some(target) = args.target {
        options.target = target.into();
    }
    if let Some(format) = args.format {
        options.format = format.into();
    }
    if args.no_splitting {
        options.splitting = false;
    }
    if args.no_treeshake {
        options.treeshake = false;
    }
    if args.minify {
        options.minify = true;
    }
    if let Some(sourcemap) = args.sourcemap {
        options.sourcemap = sourcemap.into();
    }
    options.external.extend(args.external.iter().cloned());
    for (key, value) in &args.alias {
        options.alias.insert(key.clone(), value.clone());
    }
    for (key, value) in &args.define {
        options.define.insert(key.clone(), value.clone());
    }
    if args.hashed_names {
        options.hashed_names = true;
    }
    if let Some(cache_dir) = &args.cache_dir {
        options.cache_dir = Some(cache_dir.clone());
    }
    Ok(options)
}

/// `bale build`: one-shot production build, all-or-nothing output.
pub async fn build(args: BuildArgs) -> anyhow::Result<()> {
    let options = resolve_options(&args)?;
    let bundler = Bundler::new(options)?;
    let output = match bundler.build().await {
        Ok(output) => output,
        Err(diagnostics) => bail!("{diagnostics}"),
    };
    bundler.write_output(&output)?;
    info!(
        chunks = output.stats.total_chunks,
        modules = output.stats.total_modules,
        bytes = output.stats.total_bytes,
        "wrote {}",
        bundler.options().outdir.display()
    );
    Ok(())
}

/// `bale dev`: watch, rebuild, serve, patch.
pub async fn dev(args: DevArgs) -> anyhow::Result<()> {
    let options = resolve_options(&args.build)?;
    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("invalid address {}:{}", args.host, args.port))?;
    let bundler = Bundler::new(options)?;
    let session = DevSession::new(bundler);
    info!("dev server starting on http://{addr}");
    session.run(addr).await?;
    Ok(())
}
