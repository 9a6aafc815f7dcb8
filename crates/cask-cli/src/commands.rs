use std::io::{self, Read, Write};

use anyhow::{bail, Context};
use cask_store::{Blob, DecodedKey, EntryMode, LocalStore, Tree, TreeEntry};
use cask_types::Hash;
use colored::Colorize;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = cli.store_config()?;
    tracing::debug!(?config, "resolved store configuration");
    let store = LocalStore::open(&config)?;
    let mut out = io::stdout().lock();

    match cli.command {
        Command::PutBlob(args) => {
            let content = std::fs::read(&args.file)
                .with_context(|| format!("cannot read {}", args.file.display()))?;
            cmd_put_blob(&store, content, &mut out)?
        }
        Command::CatBlob(args) => cmd_cat_blob(&store, &args.hash, &mut out)?,
        Command::BlobSha1(args) => cmd_blob_sha1(&store, &args.hash, &mut out)?,
        Command::MkTree(args) => {
            let input = match &args.file {
                Some(file) => std::fs::read_to_string(file)
                    .with_context(|| format!("cannot read {}", file.display()))?,
                None => {
                    let mut input = String::new();
                    io::stdin().read_to_string(&mut input)?;
                    input
                }
            };
            cmd_mk_tree(&store, &input, &mut out)?
        }
        Command::LsTree(args) => cmd_ls_tree(&store, &args.hash, &mut out)?,
        Command::Get(args) => cmd_get(&store, &args.key, &mut out)?,
    }

    store.close()?;
    Ok(())
}

fn parse_hash(text: &str) -> anyhow::Result<Hash> {
    text.trim()
        .parse()
        .with_context(|| format!("invalid object id {text:?}"))
}

fn cmd_put_blob(store: &LocalStore, content: Vec<u8>, out: &mut impl Write) -> anyhow::Result<()> {
    let unhashed = Blob::new(Hash::ZERO, content);
    let id = unhashed.git_object_id();
    store.put_blob(&id, &Blob::new(id, unhashed.contents()))?;
    Ok(writeln!(out, "{id}")?)
}

fn cmd_cat_blob(store: &LocalStore, hash: &str, out: &mut impl Write) -> anyhow::Result<()> {
    let hash = parse_hash(hash)?;
    let Some(blob) = store.get_blob(&hash)? else {
        bail!("blob {} not found", hash.short_hex());
    };
    for chunk in blob.chunks() {
        out.write_all(chunk)?;
    }
    Ok(())
}

fn cmd_blob_sha1(store: &LocalStore, hash: &str, out: &mut impl Write) -> anyhow::Result<()> {
    let hash = parse_hash(hash)?;
    match store.get_sha1_for_blob(&hash)? {
        Some(sha1) => writeln!(out, "{sha1}")?,
        None => bail!("no sha1 recorded for {}", hash.short_hex()),
    }
    Ok(())
}

/// Object type column shown by `ls-tree` for an entry mode.
fn kind_name(mode: EntryMode) -> &'static str {
    match mode {
        EntryMode::Directory => "tree",
        EntryMode::Gitlink => "commit",
        EntryMode::Regular | EntryMode::Executable | EntryMode::Symlink => "blob",
    }
}

/// Parse one `<mode> <type> <hash>\t<name>` line.
fn parse_tree_line(line: &str) -> anyhow::Result<TreeEntry> {
    let (meta, name) = line
        .split_once('\t')
        .with_context(|| format!("missing tab in {line:?}"))?;
    let fields: Vec<&str> = meta.split_whitespace().collect();
    let [mode, kind, hash] = fields.as_slice() else {
        bail!("expected `<mode> <type> <hash>` in {line:?}");
    };
    let bits = u32::from_str_radix(mode, 8).with_context(|| format!("invalid mode {mode:?}"))?;
    let mode = EntryMode::from_mode_bits(bits).with_context(|| format!("unknown mode {bits:o}"))?;
    if *kind != kind_name(mode) {
        bail!("mode {mode} does not name a {kind}");
    }
    Ok(TreeEntry::new(mode, name, parse_hash(hash)?))
}

fn cmd_mk_tree(store: &LocalStore, input: &str, out: &mut impl Write) -> anyhow::Result<()> {
    let entries = input
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_tree_line)
        .collect::<anyhow::Result<Vec<_>>>()?;
    let id = store.put_tree(&Tree::unhashed(entries))?;
    Ok(writeln!(out, "{id}")?)
}

fn cmd_ls_tree(store: &LocalStore, hash: &str, out: &mut impl Write) -> anyhow::Result<()> {
    let hash = parse_hash(hash)?;
    let Some(tree) = store.get_tree(&hash)? else {
        bail!("tree {} not found", hash.short_hex());
    };
    for entry in &tree.entries {
        writeln!(
            out,
            "{} {} {}\t{}",
            entry.mode,
            kind_name(entry.mode),
            entry.hash,
            entry.name
        )?;
    }
    Ok(())
}

fn cmd_get(store: &LocalStore, key: &str, out: &mut impl Write) -> anyhow::Result<()> {
    let raw = hex::decode(key.trim()).with_context(|| format!("invalid hex key {key:?}"))?;
    let what = match DecodedKey::parse(&raw) {
        Some(DecodedKey::Primary(hash)) => format!("object {}", hash.short_hex()),
        Some(DecodedKey::Attribute(hash, tag)) => format!("{tag} of {}", hash.short_hex()),
        None => "unrecognized key".to_string(),
    };

    match store.get_raw(&raw)?.bytes() {
        Some(value) => {
            writeln!(out, "{} {} ({} bytes)", "✓".green().bold(), what, value.len())?;
            writeln!(out, "{}", hex::encode(value))?;
        }
        None => writeln!(out, "{} {} is absent", "✗".red().bold(), what.dimmed())?,
    }
    Ok(())
}
