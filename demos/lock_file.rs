//! Minimal example: lock a file, then unlock it.
//!
//! Run with: `cargo run --example lock_file -- <path> <passphrase>`
//! Set `RUST_LOG=marklock=debug` to watch each replace step.

use std::env;

use marklock::audit::FileAuditSink;
use marklock::{ErrorKind, LockConfig, Locker};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = env::args().skip(1);
    let (Some(path), Some(passphrase)) = (args.next(), args.next()) else {
        eprintln!("usage: lock_file <path> <passphrase>");
        std::process::exit(2);
    };

    let mut locker = Locker::new(LockConfig::default())?;

    // Optional: persist the audit trail as JSON lines.
    let audit_path = env::temp_dir().join("marklock_audit.jsonl");
    locker.add_audit_sink(Box::new(FileAuditSink::new(&audit_path)?));

    let locked = locker.lock(&path, &passphrase)?;
    println!("locked   -> {}", locked.display());

    match locker.unlock(&locked, &passphrase) {
        Ok(unlocked) => println!("unlocked -> {}", unlocked.display()),
        Err(e) if e.kind() == ErrorKind::WrongPassphraseOrCorrupted => {
            eprintln!("wrong passphrase, try again");
        }
        Err(e) if e.kind() == ErrorKind::WriteFailedAndRestoreFailed => {
            eprintln!("fatal: {e}");
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    }

    println!("audit trail: {}", audit_path.display());
    Ok(())
}
