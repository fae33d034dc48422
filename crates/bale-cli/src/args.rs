//! Command-line definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use bale_core::{OutputFormat, SourceMapMode, Target};

/// bale - a JavaScript/TypeScript bundler
#[derive(Parser, Debug)]
#[command(name = "bale", version, about = "A JavaScript/TypeScript bundler")]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Bundle entries into the output directory
    Build(BuildArgs),
    /// Watch, rebuild and serve with hot reload
    Dev(DevArgs),
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Entry files, resolved relative to the project root; may also come
    /// from the config file
    pub entry: Vec<PathBuf>,

    /// Config file (defaults to bale.config.json when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Project root
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Output directory
    #[arg(long)]
    pub outdir: Option<PathBuf>,

    /// Execution environment of the output
    #[arg(long, value_enum)]
    pub target: Option<TargetArg>,

    /// Emission shape
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,

    /// Place every module into a single chunk
    #[arg(long)]
    pub no_splitting: bool,

    /// Keep every reachable module
    #[arg(long)]
    pub no_treeshake: bool,

    /// Minify emitted chunks
    #[arg(long)]
    pub minify: bool,

    /// Source map emission
    #[arg(long, value_enum)]
    pub sourcemap: Option<SourcemapArg>,

    /// External specifiers (literal names or prefix* patterns)
    #[arg(long)]
    pub external: Vec<String>,

    /// Specifier aliases, key=value
    #[arg(long, value_parser = parse_key_value)]
    pub alias: Vec<(String, String)>,

    /// Compile-time substitutions, path=literal
    #[arg(long, value_parser = parse_key_value)]
    pub define: Vec<(String, String)>,

    /// Include content hashes in chunk file names
    #[arg(long)]
    pub hashed_names: bool,

    /// Persistent transform cache directory
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DevArgs {
    #[command(flatten)]
    pub build: BuildArgs,

    /// Address to bind the dev server on
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind the dev server on
    #[arg(long, default_value_t = 8787)]
    pub port: u16,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum TargetArg {
    Browser,
    Server,
}

impl From<TargetArg> for Target {
    fn from(value: TargetArg) -> Self {
        match value {
            TargetArg::Browser => Target::Browser,
            TargetArg::Server => Target::Server,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum FormatArg {
    Iife,
    Cjs,
    Esm,
}

impl From<FormatArg> for OutputFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Iife => OutputFormat::Iife,
            FormatArg::Cjs => OutputFormat::Cjs,
            FormatArg::Esm => OutputFormat::Esm,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum SourcemapArg {
    None,
    Inline,
    External,
}

impl From<SourcemapArg> for SourceMapMode {
    fn from(value: SourcemapArg) -> Self {
        match value {
            SourcemapArg::None => SourceMapMode::None,
            SourcemapArg::Inline => SourceMapMode::Inline,
            SourcemapArg::External => SourceMapMode::External,
        }
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() && !value.is_empty() => {
            Ok((key.to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parses_build_with_flags() {
        let cli = Cli::parse_from([
            "bale",
            "build",
            "src/main.ts",
            "--target",
            "server",
            "--format",
            "cjs",
            "--no-splitting",
            "--define",
            "process.env.NODE_ENV=\"production\"",
        ]);
        match cli.command {
            Command::Build(args) => {
                assert_eq!(args.entry, vec![PathBuf::from("src/main.ts")]);
                assert!(matches!(args.target, Some(TargetArg::Server)));
                assert!(args.no_splitting);
                assert_eq!(args.define[0].0, "process.env.NODE_ENV");
            }
            _ => panic!("expected build"),
        }
    }

    #[test]
    fn dev_defaults() {
        let cli = Cli::parse_from(["bale", "dev", "src/main.ts"]);
        match cli.command {
            Command::Dev(args) => {
                assert_eq!(args.port, 8787);
                assert_eq!(args.host, "127.0.0.1");
            }
            _ => panic!("expected dev"),
        }
    }

    #[test]
    fn key_value_parsing() {
        assert!(parse_key_value("a=b").is_ok());
        assert!(parse_key_value("broken").is_err());
        assert!(parse_key_value("=v").is_err());
    }
}
