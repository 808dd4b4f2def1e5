//! Client-side helper for the encrypted exchange.
//!
//! Generates a client keyset, encrypts six raw features into a request body
//! for `POST /assessment-encrypted`, and later decrypts the server's response.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin encrypt_request -- --features 20,100,5,5,5,20 --secret-out client.key [--force] > request.json
//! curl -s -H 'content-type: application/json' --data @request.json localhost:8000/assessment-encrypted > response.json
//! cargo run --bin encrypt_request -- --decrypt response.json --secret client.key
//! ```
//!
//! # Security
//!
//! - The secret key file is written with 0600 permissions (Unix only)
//! - Secret key bytes are zeroized from memory after use
//! - Only non-secret material is printed

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use zeroize::Zeroizing;

use cipherscore::adapters::tfhe::TfheClient;
use cipherscore::domain::{EncryptedAssessmentResponse, FEATURE_COUNT};
use cipherscore::{RiskModel, SchemeParameters};

const USAGE: &str = "Usage:
  encrypt_request --features a,b,c,d,e,f --secret-out <path> [--force]
  encrypt_request --decrypt <response.json> --secret <path>";

enum Command {
    Encrypt {
        features: Vec<f64>,
        secret_out: PathBuf,
        force: bool,
    },
    Decrypt {
        response: PathBuf,
        secret: PathBuf,
    },
}

fn usage_exit(message: &str) -> ! {
    eprintln!("{message}\n{USAGE}");
    std::process::exit(2);
}

fn parse_features(list: &str) -> Result<Vec<f64>> {
    let features = list
        .split(',')
        .map(|v| {
            v.trim()
                .parse::<f64>()
                .with_context(|| format!("invalid feature value {v:?}"))
        })
        .collect::<Result<Vec<_>>>()?;
    if features.len() != FEATURE_COUNT {
        bail!("expected {FEATURE_COUNT} features, got {}", features.len());
    }
    Ok(features)
}

fn parse_args() -> Result<Command> {
    let mut args = std::env::args().skip(1);
    let mut features: Option<String> = None;
    let mut secret_out: Option<PathBuf> = None;
    let mut decrypt: Option<PathBuf> = None;
    let mut secret: Option<PathBuf> = None;
    let mut force = false;

    while let Some(arg) = args.next() {
        let mut value = || {
            args.next()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| usage_exit(&format!("Missing value for {arg}")))
        };
        match arg.as_str() {
            "--features" => features = Some(value()),
            "--secret-out" => secret_out = Some(value().into()),
            "--decrypt" => decrypt = Some(value().into()),
            "--secret" => secret = Some(value().into()),
            "--force" => force = true,
            "-h" | "--help" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            _ => usage_exit(&format!("Unknown arg: {arg}")),
        }
    }

    match (features, secret_out, decrypt, secret) {
        (Some(features), Some(secret_out), None, None) => Ok(Command::Encrypt {
            features: parse_features(&features)?,
            secret_out,
            force,
        }),
        (None, None, Some(response), Some(secret)) => Ok(Command::Decrypt { response, secret }),
        _ => usage_exit("Choose either --features/--secret-out or --decrypt/--secret"),
    }
}

fn write_secret(path: &Path, bytes: &[u8], force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("Refusing to overwrite existing file {path:?}. Use --force.");
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {parent:?}"))?;
    }

    let mut opts = std::fs::OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        opts.mode(0o600);
    }

    let mut file = opts
        .open(path)
        .with_context(|| format!("Failed to open {path:?}"))?;
    file.write_all(bytes)
        .with_context(|| format!("Failed to write {path:?}"))?;
    Ok(())
}

fn encrypt(features: &[f64], secret_out: &Path, force: bool) -> Result<()> {
    // Fail before the slow key generation if the file is in the way.
    if secret_out.exists() && !force {
        bail!("Refusing to overwrite existing file {secret_out:?}. Use --force.");
    }

    let model = RiskModel::standard();
    let client = TfheClient::generate(SchemeParameters::standard())?;
    let request = client.encrypt_request(&model, features)?;

    let secret = client.export_secret_key()?;
    write_secret(secret_out, &secret, force)?;
    eprintln!(
        "Wrote secret key for keyset {} to {:?}",
        client.keyset(),
        secret_out
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer(&mut out, &request)?;
    writeln!(out)?;
    Ok(())
}

fn decrypt(response: &Path, secret: &Path) -> Result<()> {
    let body = std::fs::read(response).with_context(|| format!("Failed to read {response:?}"))?;
    let response: EncryptedAssessmentResponse =
        serde_json::from_slice(&body).context("response is not an encrypted assessment")?;

    let secret_bytes = Zeroizing::new(
        std::fs::read(secret).with_context(|| format!("Failed to read {secret:?}"))?,
    );
    let client = TfheClient::restore(SchemeParameters::standard(), &secret_bytes)?;

    let model = RiskModel::standard();
    let score = client.decrypt_score(&model, &response)?;
    println!(
        "{}",
        serde_json::json!({ "risk_score": score.score, "raw_score": score.raw })
    );
    Ok(())
}

fn main() -> Result<()> {
    match parse_args()? {
        Command::Encrypt {
            features,
            secret_out,
            force,
        } => encrypt(&features, &secret_out, force),
        Command::Decrypt { response, secret } => decrypt(&response, &secret),
    }
}
