//! Minimal CLI verifier
//!
//! Loads the persisted policy and registry snapshots, reads a payload file
//! (`{"envelope": {...}, "meter_only": bool}` or a bare envelope object),
//! runs the gateway, and prints the Report as JSON on stdout.
//!
//! Exit status: 0 when the proof verified (or a meter-only request
//! succeeded), 1 when the gateway returned a failure Report, 2 on
//! operational errors (unreadable files, malformed snapshots).
//!
//! Usage:
//!   verifier --policy policy.json --registry registry.json \
//!            [--signers signers.json] [--meter-only] payload.json

#![forbid(unsafe_code)]

use std::{env, fs, process::ExitCode};

use proofgate::dispatch::Payload;
use proofgate::{Gateway, Policy, RegistrySnapshot, TrustedSigners};

fn parse_flag(args: &[String], key: &str) -> Option<String> {
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == key {
            return it.next().cloned();
        }
    }
    None
}

fn run() -> anyhow::Result<ExitCode> {
    let args: Vec<String> = env::args().collect();

    let policy_path = parse_flag(&args, "--policy")
        .ok_or_else(|| anyhow::anyhow!("--policy <file> is required"))?;
    let registry_path = parse_flag(&args, "--registry")
        .ok_or_else(|| anyhow::anyhow!("--registry <file> is required"))?;
    let mut meter_only = false;
    let mut payload_path = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--policy" | "--registry" | "--signers" => i += 2,
            "--meter-only" => {
                meter_only = true;
                i += 1;
            }
            other if other.starts_with("--") => anyhow::bail!("unknown flag {other}"),
            other => {
                payload_path = Some(other.to_string());
                i += 1;
            }
        }
    }
    let payload_path =
        payload_path.ok_or_else(|| anyhow::anyhow!("payload file argument is required"))?;

    let policy_bytes = fs::read(&policy_path)
        .map_err(|e| anyhow::anyhow!("read policy {policy_path}: {e}"))?;
    let policy = Policy::from_json_bytes(&policy_bytes)
        .map_err(|e| anyhow::anyhow!("parse policy {policy_path}: {e}"))?;

    let signers = match parse_flag(&args, "--signers") {
        Some(path) => {
            let bytes =
                fs::read(&path).map_err(|e| anyhow::anyhow!("read signers {path}: {e}"))?;
            let signers = TrustedSigners::from_json_bytes(&bytes)
                .map_err(|e| anyhow::anyhow!("parse signers {path}: {e}"))?;
            eprintln!("Loaded trusted signer keys from {path}");
            Some(signers)
        }
        None => None,
    };

    let registry_bytes = fs::read(&registry_path)
        .map_err(|e| anyhow::anyhow!("read registry {registry_path}: {e}"))?;
    let registry = RegistrySnapshot::from_json_bytes(&registry_bytes, signers.as_ref())
        .map_err(|e| anyhow::anyhow!("load registry {registry_path}: {e}"))?;
    eprintln!("Loaded {} registry record(s), all hash-checked", registry.len());

    let payload_bytes = fs::read(&payload_path)
        .map_err(|e| anyhow::anyhow!("read payload {payload_path}: {e}"))?;
    // Accept either a full payload or a bare envelope for convenience.
    let mut payload: Payload = match serde_json::from_slice(&payload_bytes) {
        Ok(p) => p,
        Err(_) => {
            let envelope = serde_json::from_slice(&payload_bytes)
                .map_err(|e| anyhow::anyhow!("parse payload {payload_path}: {e}"))?;
            Payload { envelope, meter_only: false, policy: None }
        }
    };
    if meter_only {
        payload.meter_only = true;
    }

    let mut gateway = Gateway::new(registry, policy);
    if let Some(signers) = signers {
        gateway = gateway.with_signers(signers);
    }

    let report = gateway.verify(&payload);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(if report.ok { ExitCode::SUCCESS } else { ExitCode::from(1) })
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}
