//! CLI front-end for the ledger client library: register an identity,
//! build and post a transfer, confirm a pending one, or check a balance.
//! Identities are persisted locally as JSON so repeat invocations of this
//! binary can act as the same user.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use clap::{Parser, Subcommand};
use ledger_api::client::remote::RemoteClient;
use ledger_api::client::{self, ClientIdentity};
use ledger_api::crypto::ckks::{self, Params};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "ledger-client", version, about = "Confidential ledger CLI client")]
struct Cli {
    #[arg(long, default_value = "http://127.0.0.1:3000")]
    server: String,

    #[arg(long, default_value = "./.ledger-client")]
    identity_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a fresh key pair, register it, and save it locally under `name`.
    Register { name: String },
    /// Post a sender-PK transfer of `amount` from `from` to `to_user`.
    Transfer {
        from: String,
        to_user: Uuid,
        amount: f64,
    },
    /// Sign and post the accept step for a pending unconfirmed transaction.
    Confirm { identity: String, uuid: Uuid },
    /// Fetch and decrypt `identity`'s own balance.
    Balance { identity: String },
}

#[derive(Serialize, Deserialize)]
struct StoredIdentity {
    user_id: Uuid,
    ckks_pk: String,
    ckks_sk: String,
    ecdsa_sk: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let remote = RemoteClient::new(cli.server.clone());
    let params = Params::preset();

    match cli.command {
        Command::Register { name } => {
            let user_id = Uuid::new_v4();
            let mut rng = OsRng;
            let identity = ClientIdentity::generate(&params, user_id, &mut rng);

            let ckks_pk_bytes = ckks::encode_public_key(&identity.ckks_pk)?;
            let ecdsa_pk_bytes = ledger_api::crypto::ecdsa::encode_public_key(&identity.ecdsa_pk())
                .context("encoding ecdsa public key")?;

            remote
                .register_user(user_id, &name, &ckks_pk_bytes, &ecdsa_pk_bytes)
                .await?;

            save_identity(&cli.identity_dir, &name, &identity)?;
            println!("registered {name} as {user_id}");
        }

        Command::Transfer { from, to_user, amount } => {
            let identity = load_identity(&cli.identity_dir, &from)?;
            let mut rng = OsRng;
            let record = client::build_sender_pk_transfer(&params, &identity, to_user, amount, &mut rng)?;
            let tx_json = ledger_api::models::TransactionJson::from(&record);
            let confirmed = remote.create_by_sender_pk(&tx_json).await?;
            println!(
                "transfer {} is now {}",
                confirmed.uuid, confirmed.confirming_phase
            );
        }

        Command::Confirm { identity, uuid } => {
            let identity = load_identity(&cli.identity_dir, &identity)?;
            let tx = remote.get_transaction(uuid).await?;
            let sig = client::build_accept(&identity, &tx.ct_sender);
            let confirmed = remote.confirm(uuid, &sig).await?;
            println!(
                "transfer {} is now {}",
                confirmed.uuid, confirmed.confirming_phase
            );
        }

        Command::Balance { identity } => {
            let identity = load_identity(&cli.identity_dir, &identity)?;
            let ct_bytes = remote.get_balance(identity.user_id).await?;
            let ct = ckks::decode_ct(&ct_bytes)?;
            let amount = ckks::decrypt(&params, &identity.ckks_sk, &ct);
            println!("{amount:.2}");
        }
    }

    Ok(())
}

fn identity_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.json"))
}

fn save_identity(dir: &Path, name: &str, identity: &ClientIdentity) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let stored = StoredIdentity {
        user_id: identity.user_id,
        ckks_pk: BASE64.encode(ckks::encode_public_key(&identity.ckks_pk)?),
        ckks_sk: BASE64.encode(ckks::encode_secret_key(&identity.ckks_sk)?),
        ecdsa_sk: BASE64.encode(identity.ecdsa_sk.to_bytes()),
    };
    let json = serde_json::to_vec_pretty(&stored)?;
    std::fs::write(identity_path(dir, name), json)?;
    Ok(())
}

fn load_identity(dir: &Path, name: &str) -> Result<ClientIdentity> {
    let path = identity_path(dir, name);
    let bytes = std::fs::read(&path).with_context(|| format!("reading identity file {}", path.display()))?;
    let stored: StoredIdentity = serde_json::from_slice(&bytes)?;

    let ckks_pk = ckks::decode_public_key(&BASE64.decode(stored.ckks_pk)?)?;
    let ckks_sk = ckks::decode_secret_key(&BASE64.decode(stored.ckks_sk)?)?;
    let ecdsa_sk_bytes = BASE64.decode(stored.ecdsa_sk)?;
    let ecdsa_sk = ledger_api::crypto::ecdsa::SigningKey::from_slice(&ecdsa_sk_bytes)
        .map_err(|e| anyhow::anyhow!("invalid stored ecdsa key: {e}"))?;

    Ok(ClientIdentity {
        user_id: stored.user_id,
        ckks_pk,
        ckks_sk,
        ecdsa_sk,
    })
}
