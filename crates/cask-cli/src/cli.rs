use std::path::PathBuf;

use cask_store::{EngineKind, StoreConfig};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "cask",
    about = "Content-addressed local object store",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Store directory (overrides the configuration file)
    #[arg(short, long, global = true)]
    pub path: Option<PathBuf>,

    /// Backing engine (overrides the configuration file)
    #[arg(long, global = true)]
    pub engine: Option<EngineArg>,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum EngineArg {
    Memory,
    Log,
}

impl From<EngineArg> for EngineKind {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Memory => EngineKind::Memory,
            EngineArg::Log => EngineKind::Log,
        }
    }
}

impl Cli {
    /// Resolve the store configuration: file first, then flag overrides.
    pub fn store_config(&self) -> cask_store::Result<StoreConfig> {
        let mut config = match &self.config {
            Some(file) => StoreConfig::load(file)?,
            None => StoreConfig::default(),
        };
        if let Some(path) = &self.path {
            config.path = path.clone();
        }
        if let Some(engine) = self.engine {
            config.engine = engine.into();
        }
        Ok(config)
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Store a file as a blob and print its id
    PutBlob(PutBlobArgs),
    /// Write a blob's content to stdout
    CatBlob(HashArgs),
    /// Print the recorded SHA-1 of a blob's content
    BlobSha1(HashArgs),
    /// Build a tree from `ls-tree` formatted lines and print its id
    MkTree(MkTreeArgs),
    /// List the entries of a tree
    LsTree(HashArgs),
    /// Print the raw value stored under a hex key
    Get(GetArgs),
}

#[derive(Args)]
pub struct PutBlobArgs {
    pub file: PathBuf,
}

#[derive(Args)]
pub struct HashArgs {
    pub hash: String,
}

#[derive(Args)]
pub struct MkTreeArgs {
    /// Input file; reads stdin when omitted
    pub file: Option<PathBuf>,
}

#[derive(Args)]
pub struct GetArgs {
    pub key: String,
}
