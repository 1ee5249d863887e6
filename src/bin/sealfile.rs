//! Sealfile CLI - in-place authenticated file encryption
//!
//! Command-line interface for encrypting and decrypting files in place with a
//! key stored in a key file.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::error::Error as StdError;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

use sealfile::batch::{self, BatchOptions, BatchReport, FileOutcome, Operation};
use sealfile::password::PasswordSource;
use sealfile::{
    EncryptionEngine, Error, ErrorCategory, ErrorKind, Result, detect, hash, kdf, keystore,
};

#[derive(Parser)]
#[command(name = "sealfile")]
#[command(version)]
#[command(about = "In-place authenticated file encryption.", long_about = None)]
struct Cli {
    /// Path to the key file; created on first use
    #[arg(
        long,
        global = true,
        env = "SEALFILE_KEY_FILE",
        default_value = "key.txt",
        value_name = "FILE"
    )]
    key_file: PathBuf,

    /// Log more detail to stderr (repeat for more)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new key file
    Keygen {
        /// Replace an existing key file. Files encrypted with the old key
        /// become unrecoverable.
        #[arg(long)]
        force: bool,
    },

    /// Encrypt files in place, skipping files that are already encrypted
    #[command(alias = "e")]
    Encrypt(TransformArgs),

    /// Decrypt files in place, skipping files that are not encrypted
    #[command(alias = "d")]
    Decrypt(TransformArgs),

    /// Report whether files look encrypted (no key needed)
    Status {
        /// Files or directories to inspect
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<PathBuf>,

        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,
    },

    /// Print SHA-256 digests of files
    Hash {
        #[arg(required = true, value_name = "FILE")]
        paths: Vec<PathBuf>,
    },

    /// Derive a key from a password
    DeriveKey {
        /// Hex encoded salt from an earlier derivation; a new one is generated if omitted
        #[arg(long, value_name = "HEX")]
        salt: Option<String>,

        /// Write the derived key to this key file instead of printing it
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Read the password from stdin instead of prompting on the terminal
        #[arg(long)]
        password_stdin: bool,
    },
}

#[derive(Args)]
struct TransformArgs {
    /// Files or directories to process
    #[arg(required = true, value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Descend into subdirectories
    #[arg(short, long)]
    recursive: bool,

    /// Process files even if they already appear to be in the target state
    #[arg(long)]
    force: bool,

    /// Copy each file into this directory before transforming it
    #[arg(long, value_name = "DIR")]
    backup_dir: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Keygen { force } => keygen(&cli.key_file, force),
        Commands::Encrypt(args) => transform(&cli.key_file, Operation::Encrypt, args),
        Commands::Decrypt(args) => transform(&cli.key_file, Operation::Decrypt, args),
        Commands::Status { paths, recursive } => status(&paths, recursive),
        Commands::Hash { paths } => hash_files(&paths),
        Commands::DeriveKey {
            salt,
            output,
            password_stdin,
        } => {
            let source = if password_stdin {
                PasswordSource::Stdin
            } else {
                PasswordSource::Terminal
            };
            derive_key(salt.as_deref(), output.as_deref(), source)
        }
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", render(&e));
            process::exit(1);
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "error",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn keygen(key_file: &Path, force: bool) -> Result<bool> {
    keystore::create(key_file, force)?;
    println!("generated new key at {}", key_file.display());
    Ok(true)
}

fn transform(key_file: &Path, op: Operation, args: TransformArgs) -> Result<bool> {
    if op == Operation::Decrypt && !key_file.exists() {
        return Err(Error::with_kind(
            ErrorCategory::User,
            ErrorKind::NotFound,
            format!(
                "key file {} does not exist; nothing can be decrypted without it",
                key_file.display()
            ),
        ));
    }
    let engine = EncryptionEngine::open(key_file)?;
    let files = expand_paths(&args.paths, args.recursive)?;
    let options = BatchOptions {
        force: args.force,
        backup_dir: args.backup_dir,
    };

    let report = batch::run(&engine, op, &files, &options);
    print_report(op, &report);
    Ok(report.failed() == 0)
}

fn status(paths: &[PathBuf], recursive: bool) -> Result<bool> {
    for path in expand_paths(paths, recursive)? {
        let state = if detect::is_encrypted(&path) {
            "encrypted"
        } else {
            "plaintext"
        };
        println!("{}\t{}", state, path.display());
    }
    Ok(true)
}

fn hash_files(paths: &[PathBuf]) -> Result<bool> {
    let mut ok = true;
    for path in paths {
        match hash::hash_file(path) {
            Ok(digest) => println!("{}  {}", digest, path.display()),
            Err(e) => {
                eprintln!("failed {}: {}", path.display(), render(&e));
                ok = false;
            }
        }
    }
    Ok(ok)
}

fn derive_key(salt: Option<&str>, output: Option<&Path>, source: PasswordSource) -> Result<bool> {
    let salt = salt.map(kdf::parse_salt).transpose()?;
    let password = source.read()?;
    let (key, salt) = kdf::derive_key_from_password(&password, salt)?;

    println!("salt: {}", hex::encode(salt));
    match output {
        Some(path) => {
            key.write_to(path)?;
            println!("wrote key to {}", path.display());
        }
        None => println!("key: {}", hex::encode(key.as_bytes())),
    }
    Ok(true)
}

/// Replace directories in `paths` with the files they contain.
fn expand_paths(paths: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(batch::list_files(path, recursive)?);
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

fn print_report(op: Operation, report: &BatchReport) {
    for outcome in &report.processed {
        match outcome {
            FileOutcome::Encrypted(o) => println!(
                "encrypted {} ({} -> {} bytes, sha256 {} -> {})",
                o.path.display(),
                o.file_size,
                o.encrypted_size,
                o.original_hash,
                o.encrypted_hash
            ),
            FileOutcome::Decrypted(o) => println!(
                "decrypted {} ({} bytes, sha256 {})",
                o.path.display(),
                o.file_size,
                o.decrypted_hash
            ),
        }
    }
    let state = match op {
        Operation::Encrypt => "already encrypted",
        Operation::Decrypt => "not encrypted",
    };
    for path in &report.skipped {
        println!("skipped {} ({})", path.display(), state);
    }
    for (path, e) in &report.failures {
        eprintln!("failed {}: {}", path.display(), render(e));
        if e.is_write_failure() {
            eprintln!(
                "warning: {} could not be replaced; its previous contents are still in place",
                path.display()
            );
        }
    }
    println!(
        "{} processed, {} skipped, {} failed",
        report.succeeded(),
        report.skipped(),
        report.failed()
    );
}

/// Render an error with its chain of causes.
fn render(err: &Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
