//! # PAASCTL CLI
//!
//! Command-line interface for the PaaS crypt gateway key material.
//!
//! Works directly on key files, without a running gateway: generates keypairs,
//! encrypts secrets for a tenant and checks that a secret bundle decrypts.
//!
//! ## Usage
//!
//! ```bash
//! # Generate a new keypair
//! paasctl generate --private-key ./privateKey --public-key ./publicKey
//!
//! # Encrypt a private key for a tenant (secret read from stdin)
//! paasctl encrypt --tenant my-paas --private-key ./privateKey --public-key ./publicKey < id_rsa
//!
//! # Check that every secret of a bundle decrypts
//! paasctl check --bundle my-paas.json --private-key ./privateKey --public-key ./publicKey
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use paas_crypt_gateway::constants::DEFAULT_KEY_BITS;
use paas_crypt_gateway::crypt::{generate_key_pair, is_private_key, CryptHandle, KeyPaths, RsaCrypt};
use paas_crypt_gateway::validation::{validate_bundle, SecretBundle};
use std::io::Read;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

/// PaaS crypt gateway CLI
#[derive(Parser)]
#[command(name = "paasctl")]
#[command(about = "PaaS crypt gateway key and secret tooling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new RSA keypair
    Generate {
        /// Where to write the private key (PKCS#1 PEM)
        #[arg(long)]
        private_key: PathBuf,

        /// Where to write the public key (SPKI PEM)
        #[arg(long)]
        public_key: PathBuf,

        /// RSA modulus size in bits
        #[arg(long, default_value_t = DEFAULT_KEY_BITS)]
        bits: usize,
    },
    /// Encrypt a secret read from stdin for a tenant
    Encrypt {
        /// Tenant the secret belongs to
        #[arg(short, long)]
        tenant: String,

        /// Accept secrets that are not private keys
        #[arg(long)]
        allow_any: bool,

        #[command(flatten)]
        keys: KeyArgs,
    },
    /// Check that every secret of a bundle file decrypts
    Check {
        /// Bundle file (JSON)
        #[arg(short, long)]
        bundle: PathBuf,

        /// Tenant to check for (defaults to the bundle's metadata.name)
        #[arg(short, long)]
        tenant: Option<String>,

        #[command(flatten)]
        keys: KeyArgs,
    },
}

#[derive(Args)]
struct KeyArgs {
    /// Private key file, may be given multiple times
    #[arg(long = "private-key", required = true)]
    private_keys: Vec<PathBuf>,

    /// Public key file
    #[arg(long)]
    public_key: PathBuf,
}

impl KeyArgs {
    fn key_paths(self) -> KeyPaths {
        KeyPaths::new(self.private_keys, self.public_key)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "paasctl=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            private_key,
            public_key,
            bits,
        } => generate_command(private_key, public_key, bits),
        Commands::Encrypt {
            tenant,
            allow_any,
            keys,
        } => encrypt_command(&tenant, allow_any, &keys.key_paths()),
        Commands::Check {
            bundle,
            tenant,
            keys,
        } => check_command(&bundle, tenant, &keys.key_paths()),
    }
}

fn generate_command(private_key: PathBuf, public_key: PathBuf, bits: usize) -> Result<()> {
    eprintln!("Generating {bits} bit RSA keypair...");
    generate_key_pair(&private_key, &public_key, bits)?;
    eprintln!("✅ Keypair generated");
    eprintln!("   Private key: {}", private_key.display());
    eprintln!("   Public key: {}", public_key.display());
    Ok(())
}

fn encrypt_command(tenant: &str, allow_any: bool, keys: &KeyPaths) -> Result<()> {
    let mut secret = Zeroizing::new(String::new());
    std::io::stdin()
        .read_to_string(&mut secret)
        .context("Failed to read secret from stdin")?;

    if !allow_any && !is_private_key(&secret) {
        anyhow::bail!("Secret is not a private key (use --allow-any to encrypt it anyway)");
    }

    let crypt = RsaCrypt::from_files(keys, tenant)?;
    let encrypted = crypt.encrypt(secret.as_bytes())?;
    println!("{encrypted}");
    Ok(())
}

fn check_command(bundle_path: &Path, tenant: Option<String>, keys: &KeyPaths) -> Result<()> {
    let content = std::fs::read_to_string(bundle_path)
        .with_context(|| format!("Failed to read bundle {}", bundle_path.display()))?;
    let bundle: SecretBundle = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse bundle {}", bundle_path.display()))?;

    let tenant = tenant.unwrap_or_else(|| bundle.tenant().to_string());
    println!("Checking {} secrets for tenant '{}'...", bundle.secret_count(), tenant);

    let crypt = RsaCrypt::from_files(keys, &tenant)?;
    validate_bundle(&crypt, &bundle)
        .with_context(|| format!("Bundle does not decrypt for tenant '{tenant}'"))?;

    println!("✅ All secrets decrypt");
    Ok(())
}
