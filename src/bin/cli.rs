// Copyright (c) 2026 VNS Project
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]

//! vns-cli
//!
//! Client CLI for a running VNS node. Signs registrations with the local
//! owner key, grinds the proof-of-work client-side, and talks to the node's
//! HTTP API.
//!
//! Usage:
//!   vns-cli register <name> [--record kind=value]... [--no-pow]
//!   vns-cli resolve  <name>
//!   vns-cli transfer <name> <new-owner>
//!   vns-cli query    <owner>
//!
//! Exit codes: 0 success; 1 validation/protocol error; 2 transport/IO error.

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use serde_json::Value;

use vns::core::config::{LEASE_MS, POW_DIFFICULTY};
use vns::core::naming;
use vns::core::security::keystore::{AuditAction, Keystore};
use vns::core::security::pow::mine_pow;
use vns::core::types::{
    canonical_sign_bytes, now_ms, transfer_auth_bytes, Record, RecordKind, Registration,
};

#[derive(Parser, Debug)]
#[command(name = "vns-cli", version, about = "VNS client - register and resolve .vfs names")]
struct Args {
    /// Node API base URL.
    #[arg(long, global = true, default_value = "http://127.0.0.1:8460")]
    api: String,

    /// Directory holding the owner key (owner.key).
    #[arg(long, global = true, default_value = "./data")]
    data_dir: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register (or re-register) a name with typed records.
    Register {
        /// Name to register (the .vfs suffix is appended when missing).
        name: String,
        /// Records as kind=value (kinds: addr4, addr6, text, content_id,
        /// sync_endpoint). Repeatable.
        #[arg(long = "record")]
        records: Vec<String>,
        /// Skip the proof-of-work search (the node will reject unless its
        /// difficulty is zero; useful against test deployments).
        #[arg(long)]
        no_pow: bool,
    },

    /// Resolve a name from the node's local namespace.
    Resolve {
        /// Name to resolve.
        name: String,
    },

    /// Transfer a name to a new owner.
    Transfer {
        /// Name to transfer.
        name: String,
        /// New owner fingerprint.
        new_owner: String,
    },

    /// List names owned by an owner fingerprint.
    Query {
        /// Owner fingerprint.
        owner: String,
    },
}

fn fail(code: i32, msg: &str) -> ! {
    eprintln!("\x1b[31merror: {msg}\x1b[0m");
    std::process::exit(code);
}

fn parse_record(raw: &str) -> anyhow::Result<Record> {
    let (kind, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("record must be kind=value, got '{raw}'"))?;
    let kind = RecordKind::parse(kind)
        .ok_or_else(|| anyhow!("unknown record kind '{kind}'"))?;
    Ok(Record {
        kind,
        value: value.to_string(),
        ttl_seconds: 3600,
    })
}

async fn check_response(resp: reqwest::Response) -> anyhow::Result<Value> {
    let status = resp.status();
    let body: Value = resp
        .json()
        .await
        .unwrap_or_else(|_| serde_json::json!({}));
    if status.is_success() {
        return Ok(body);
    }
    let kind = body["kind"].as_str().unwrap_or("Unknown");
    let detail = body["detail"].as_str().unwrap_or("");
    Err(anyhow!("{status}: {kind} {detail}"))
}

async fn run(args: Args) -> anyhow::Result<()> {
    let client = reqwest::Client::new();

    match args.command {
        Command::Register {
            name,
            records,
            no_pow,
        } => {
            let name = naming::normalize(&name);
            naming::validate(&name).map_err(|e| anyhow!("invalid name: {e}"))?;

            let ks = Keystore::open(&args.data_dir).context("open keystore")?;
            let owner = ks.owner_fingerprint();

            let records = records
                .iter()
                .map(|r| parse_record(r))
                .collect::<anyhow::Result<Vec<_>>>()?;

            let now = now_ms();
            let nonce = if no_pow {
                "0".to_string()
            } else {
                mine_pow(&name, &owner, POW_DIFFICULTY, u64::MAX)
                    .ok_or_else(|| anyhow!("proof-of-work search exhausted"))?
            };

            let mut reg = Registration {
                name: name.clone(),
                owner,
                records,
                timestamp_ms: now,
                expires_ms: now + LEASE_MS,
                nonce,
                signature: String::new(),
                public_key: hex::encode(ks.public_key()),
            };
            let msg = canonical_sign_bytes(&reg).map_err(|e| anyhow!("canonical encode: {e}"))?;
            let sig = ks
                .sign(AuditAction::Register { name: &name }, &msg)
                .context("sign registration")?;
            reg.signature = hex::encode(sig.0);

            let resp = client
                .post(format!("{}/register", args.api))
                .json(&reg)
                .send()
                .await
                .context("connect to node")?;
            let body = check_response(resp).await?;
            println!(
                "registered {name} (content_id {}, version {}{})",
                body["content_id"].as_str().unwrap_or("?"),
                body["version"].as_u64().unwrap_or(0),
                if body["queued_for_propagation"].as_bool().unwrap_or(false) {
                    ", queued for propagation"
                } else {
                    ""
                }
            );
        }

        Command::Resolve { name } => {
            let name = naming::normalize(&name);
            let resp = client
                .get(format!("{}/resolve/{name}", args.api))
                .send()
                .await
                .context("connect to node")?;
            let body = check_response(resp).await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }

        Command::Transfer { name, new_owner } => {
            let name = naming::normalize(&name);
            let ks = Keystore::open(&args.data_dir).context("open keystore")?;
            let current_owner = ks.owner_fingerprint();

            let now = now_ms();
            let msg = transfer_auth_bytes(&name, &new_owner, now);
            let sig = ks
                .sign(
                    AuditAction::Transfer {
                        name: &name,
                        new_owner: &new_owner,
                    },
                    &msg,
                )
                .context("sign transfer")?;

            let resp = client
                .post(format!("{}/transfer/{name}", args.api))
                .json(&serde_json::json!({
                    "new_owner": new_owner,
                    "signature": hex::encode(sig.0),
                    "current_owner": current_owner,
                    "timestamp": now,
                }))
                .send()
                .await
                .context("connect to node")?;
            let body = check_response(resp).await?;
            println!(
                "transferred {name} to {new_owner} (version {})",
                body["version"].as_u64().unwrap_or(0)
            );
        }

        Command::Query { owner } => {
            let resp = client
                .get(format!("{}/query", args.api))
                .query(&[("owner", owner.as_str())])
                .send()
                .await
                .context("connect to node")?;
            let body = check_response(resp).await?;
            let names = body["names"].as_array().cloned().unwrap_or_default();
            for n in names {
                if let Some(n) = n.as_str() {
                    println!("{n}");
                }
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = run(args).await {
        // Transport and filesystem problems exit 2; protocol rejections 1.
        let msg = format!("{e:#}");
        let transportish = e.downcast_ref::<reqwest::Error>().is_some()
            || msg.contains("connect to node");
        fail(if transportish { 2 } else { 1 }, &msg);
    }
}
