//! `aegis keygen`: Generate a signing key.

use anyhow::Context;
use clap::Args;
use std::io::Write;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

use aegis_crypto::{identity_of, KeyPair};

#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Where to write the hex-encoded secret seed.
    #[arg(short, long, default_value = super::DEFAULT_KEY_FILE)]
    pub out: PathBuf,

    /// Overwrite an existing key file.
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: &KeygenArgs) -> anyhow::Result<()> {
    if args.out.exists() && !args.force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            args.out.display()
        );
    }

    let keypair = KeyPair::generate();
    write_key_file(&args.out, &keypair)?;

    println!("Key generated!");
    println!("  File:        {}", args.out.display());
    println!("  Public key:  {}", keypair.public_key().to_hex());
    println!("  Identity:    {}", identity_of(&keypair.public_key()));

    Ok(())
}

fn write_key_file(path: &Path, keypair: &KeyPair) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let secret = Zeroizing::new(keypair.secret_hex());
    let mut file = options
        .open(path)
        .with_context(|| format!("creating key file {}", path.display()))?;
    file.write_all(secret.as_bytes())?;
    file.write_all(b"\n")?;
    Ok(())
}
