// crates/kpx-cli/src/main.rs

#![forbid(unsafe_code)]
#![deny(
    rust_2018_idioms,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo
)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use kpx_core::header::DEFAULT_KEY_ROUNDS;
use kpx_core::io::{
    is_locked, lock, lock_path, read_any, read_db, read_plain_db, read_root_auto, unlock,
    write_db, write_plain_db, write_root_auto,
};
use kpx_core::Header;
use kpx_util::{checksum, checksum_one, to_hex};
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "kpx-cli",
    about = "KPX command-line tools",
    long_about = "KPX command-line tools.\n\nRender group trees, compute SHA-256 checksums, pack/unpack KDB files, and inspect KDB headers.",
    version = env!("CARGO_PKG_VERSION"),
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Print the group tree of a database (JSON/CBOR/KDB)
    Tree {
        /// Input database path
        #[arg(long)]
        db: PathBuf,

        /// Master password (KDB input is read as plaintext when omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// SHA-256 of each file, or one digest over all of them
    Checksum {
        /// Files to hash, in order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Feed every file into a single digest instead of one per file
        #[arg(long)]
        combined: bool,
    },

    /// Write a tree (JSON/CBOR) as a KDB file
    Pack {
        /// Input tree path (JSON/CBOR)
        #[arg(long)]
        db: PathBuf,

        /// Output KDB path (an existing file is kept as `<out>.bak`)
        #[arg(long, default_value = "out.kdb")]
        out: PathBuf,

        /// Master password used to encrypt the body
        #[arg(long, required_unless_present = "plain", conflicts_with = "plain")]
        password: Option<String>,

        /// Write an unencrypted `header || body` file instead
        #[arg(long)]
        plain: bool,

        /// Key transform rounds (>0)
        #[arg(long, default_value_t = DEFAULT_KEY_ROUNDS, value_parser = clap::value_parser!(u32).range(1..))]
        rounds: u32,
    },

    /// Verify a KDB file and convert it to JSON/CBOR
    Unpack {
        /// Input KDB path
        #[arg(long)]
        input: PathBuf,

        /// Output tree path (JSON/CBOR)
        #[arg(long, default_value = "tree.json")]
        out: PathBuf,

        /// Master password (the body is read as plaintext when omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// Print the decoded KDB header as JSON
    Header {
        /// Input KDB path
        #[arg(long)]
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Tree { db, password } => tree(db, password.as_deref()),
        Cmd::Checksum { files, combined } => checksum_files(&files, combined),
        Cmd::Pack {
            db,
            out,
            password,
            plain: _,
            rounds,
        } => pack(db, out, password.as_deref(), rounds),
        Cmd::Unpack {
            input,
            out,
            password,
        } => unpack(input, out, password.as_deref()),
        Cmd::Header { input } => show_header(input),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

fn tree(db: PathBuf, password: Option<&str>) -> Result<()> {
    info!(db=%db.display(), "rendering tree");
    let root = read_any(&db, password).with_context(|| format!("reading {}", db.display()))?;
    if root.is_empty() {
        bail!("{} has no groups", db.display());
    }
    root.print_tree().context("writing tree to stdout")?;
    Ok(())
}

fn checksum_files(files: &[PathBuf], combined: bool) -> Result<()> {
    let mut contents = Vec::with_capacity(files.len());
    for f in files {
        let data = fs::read(f).with_context(|| format!("read {}", f.display()))?;
        contents.push(data);
    }

    if combined {
        info!(files = files.len(), "combined checksum");
        println!("{}", to_hex(&checksum(&contents)));
    } else {
        for (f, data) in files.iter().zip(&contents) {
            println!("{}  {}", to_hex(&checksum_one(data)), f.display());
        }
    }
    Ok(())
}

fn pack(db: PathBuf, out: PathBuf, password: Option<&str>, rounds: u32) -> Result<()> {
    info!(db=%db.display(), out=%out.display(), encrypted = password.is_some(), "packing");
    let root = read_root_auto(&db).with_context(|| format!("reading tree {}", db.display()))?;

    if is_locked(&out) {
        bail!("{} is locked ({} exists)", out.display(), lock_path(&out).display());
    }
    lock(&out)?;

    let mut header = Header::new();
    header.key_transf_rounds = rounds;
    let written = match password {
        Some(pw) => write_db(&out, &root, &mut header, pw),
        None => write_plain_db(&out, &root, &mut header),
    };
    unlock(&out)?;
    written.with_context(|| format!("writing database {}", out.display()))?;

    println!(
        "Packed {} groups, {} entries → {} (sha256 {})",
        header.num_groups,
        header.num_entries,
        out.display(),
        to_hex(&header.contents_hash)
    );
    Ok(())
}

fn unpack(input: PathBuf, out: PathBuf, password: Option<&str>) -> Result<()> {
    info!(input=%input.display(), out=%out.display(), "unpacking");
    let (header, root) = match password {
        Some(pw) => read_db(&input, pw),
        None => read_plain_db(&input),
    }
    .with_context(|| format!("reading database {}", input.display()))?;

    write_root_auto(&out, &root).with_context(|| format!("writing tree {}", out.display()))?;

    println!(
        "Unpacked {} groups, {} entries ({:?}, {} key rounds) → {}",
        header.num_groups,
        header.num_entries,
        header.cipher()?,
        header.key_transf_rounds,
        out.display()
    );
    Ok(())
}

fn show_header(input: PathBuf) -> Result<()> {
    info!(input=%input.display(), "reading header");
    let data = fs::read(&input).with_context(|| format!("read {}", input.display()))?;
    let header = Header::decode(&data).with_context(|| format!("header of {}", input.display()))?;
    let json = serde_json::to_string_pretty(&header).context("serialize header to JSON")?;
    println!("{json}");
    Ok(())
}
