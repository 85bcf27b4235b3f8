//! `aegis did`: Register, inspect, update, and list DIDs.

use clap::{Args, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use aegis_core::{Did, DidKey, EventRecord, Identity, RegistryCall};
use aegis_crypto::{identity_of, KeyPair, SignedCall};
use aegis_registry::{ContentRef, EventIndex, IndexEntry};

use super::content::{download, upload_bytes, upload_file};
use super::{get_json, load_keypair, post_json, DEFAULT_ENDPOINT, DEFAULT_KEY_FILE};

#[derive(Args, Debug)]
pub struct DidArgs {
    #[command(subcommand)]
    pub command: DidCommand,

    /// API endpoint of the node.
    #[arg(short, long, global = true, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

/// Where a new document reference comes from.
#[derive(Args, Debug)]
#[group(required = false, multiple = false)]
pub struct DocumentSource {
    /// Use this reference verbatim.
    #[arg(long)]
    pub document_ref: Option<String>,

    /// Upload this file to the content store and use its reference.
    #[arg(long)]
    pub document: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum DidCommand {
    /// Mint and register a new DID owned by the key holder.
    Create {
        /// Register this DID instead of minting a fresh one.
        #[arg(long)]
        did: Option<String>,

        /// Public-key material to record (defaults to the signer's key).
        #[arg(long)]
        public_key: Option<String>,

        /// Human-readable name stored in the DID's profile document.
        #[arg(long, conflicts_with_all = ["document_ref", "document"])]
        nickname: Option<String>,

        #[command(flatten)]
        document: DocumentSource,

        /// Signing key file.
        #[arg(short, long, default_value = DEFAULT_KEY_FILE)]
        key: PathBuf,
    },
    /// Show the record of a DID (URI or hex key).
    Show {
        did: String,
    },
    /// Replace a DID's public-key material.
    UpdateKey {
        did: String,

        /// New public-key material.
        #[arg(long)]
        public_key: String,

        /// Signing key file of the owner.
        #[arg(short, long, default_value = DEFAULT_KEY_FILE)]
        key: PathBuf,
    },
    /// Replace a DID's document reference.
    UpdateDoc {
        did: String,

        #[command(flatten)]
        document: DocumentSource,

        /// Signing key file of the owner.
        #[arg(short, long, default_value = DEFAULT_KEY_FILE)]
        key: PathBuf,
    },
    /// List registered DIDs by replaying the node's event log.
    List {
        /// Only DIDs owned by this identity.
        #[arg(long)]
        owner: Option<String>,

        /// Only DIDs owned by the holder of this key file.
        #[arg(long, conflicts_with = "owner")]
        mine: Option<PathBuf>,
    },
}

#[derive(Deserialize)]
struct ApplyResponse {
    caller: Identity,
    record: EventRecord,
}

#[derive(Deserialize)]
struct RecordResponse {
    key: DidKey,
    owner: Identity,
    public_key: String,
    document_ref: String,
    revision: u64,
}

/// Profile document stored in the content store when `did create` is not
/// given a document of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct DidProfile {
    did: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nickname: Option<String>,
}

impl DidProfile {
    fn new(did: &Did, nickname: Option<String>) -> Self {
        Self {
            did: did.uri().to_string(),
            nickname,
        }
    }

    /// Decode a profile, accepting it only if it names the DID stored
    /// under `key`.
    fn decode(bytes: &[u8], key: &DidKey) -> Option<Self> {
        let profile: Self = serde_json::from_slice(bytes).ok()?;
        let did = Did::new(profile.did.as_str()).ok()?;
        (did.key() == *key).then_some(profile)
    }
}

#[derive(Deserialize)]
struct EventsResponse {
    events: Vec<EventRecord>,
}

pub async fn run(args: &DidArgs) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let endpoint = args.endpoint.as_str();

    match &args.command {
        DidCommand::Create {
            did,
            public_key,
            nickname,
            document,
            key,
        } => {
            let keypair = load_keypair(key)?;
            let did = match did {
                Some(uri) => Did::new(uri.as_str())?,
                None => Did::generate(),
            };
            let public_key = public_key
                .clone()
                .unwrap_or_else(|| keypair.public_key().to_hex());
            let document_ref = match resolve_document(&client, endpoint, document).await? {
                Some(document_ref) => document_ref,
                None => {
                    let profile = DidProfile::new(&did, nickname.clone());
                    let stored =
                        upload_bytes(&client, endpoint, &serde_json::to_vec(&profile)?).await?;
                    stored.content_ref.to_string()
                }
            };

            let call = RegistryCall::Register {
                key: did.key(),
                public_key,
                document_ref,
            };
            let resp = submit(
                &client,
                endpoint,
                "/api/v1/registry/register",
                call,
                0,
                &keypair,
            )
            .await?;

            println!("DID registered!");
            println!("  DID:       {}", did);
            if let Some(nickname) = nickname {
                println!("  Nickname:  {}", nickname);
            }
            println!("  Key:       {}", did.key());
            println!("  Owner:     {}", resp.caller);
            println!("  Sequence:  {}", resp.record.sequence);
        }
        DidCommand::Show { did } => {
            let key = DidKey::parse_reference(did)?;
            let record = fetch_record(&client, endpoint, &key).await?;
            let profile = fetch_profile(&client, endpoint, &key, &record.document_ref).await;

            println!("DID Record:");
            if let Some(profile) = &profile {
                println!("  DID:           {}", profile.did);
                if let Some(nickname) = &profile.nickname {
                    println!("  Nickname:      {}", nickname);
                }
            }
            println!("  Key:           {}", record.key);
            println!("  Owner:         {}", record.owner);
            println!("  Public key:    {}", record.public_key);
            println!("  Document ref:  {}", record.document_ref);
            println!("  Revision:      {}", record.revision);
        }
        DidCommand::UpdateKey {
            did,
            public_key,
            key,
        } => {
            let keypair = load_keypair(key)?;
            let did_key = DidKey::parse_reference(did)?;
            let record = fetch_record(&client, endpoint, &did_key).await?;
            let call = RegistryCall::UpdatePublicKey {
                key: did_key,
                public_key: public_key.clone(),
            };
            let resp = submit(
                &client,
                endpoint,
                "/api/v1/registry/public-key",
                call,
                record.revision,
                &keypair,
            )
            .await?;

            println!("Public key updated!");
            println!("  Key:       {}", resp.record.event.key());
            println!("  Sequence:  {}", resp.record.sequence);
        }
        DidCommand::UpdateDoc { did, document, key } => {
            let keypair = load_keypair(key)?;
            let document_ref = resolve_document(&client, endpoint, document)
                .await?
                .ok_or_else(|| anyhow::anyhow!("pass --document-ref or --document"))?;
            let did_key = DidKey::parse_reference(did)?;
            let record = fetch_record(&client, endpoint, &did_key).await?;
            let call = RegistryCall::UpdateDocumentRef {
                key: did_key,
                document_ref,
            };
            let resp = submit(
                &client,
                endpoint,
                "/api/v1/registry/document-ref",
                call,
                record.revision,
                &keypair,
            )
            .await?;

            println!("Document reference updated!");
            println!("  Key:       {}", resp.record.event.key());
            println!("  Sequence:  {}", resp.record.sequence);
        }
        DidCommand::List { owner, mine } => {
            let owner = match (owner, mine) {
                (Some(id), _) => Some(Identity::parse(id)?),
                (None, Some(path)) => Some(identity_of(&load_keypair(path)?.public_key())),
                (None, None) => None,
            };

            let index = fetch_index(&client, endpoint).await?;
            let entries = select_entries(&index, owner.as_ref());

            println!("Registered DIDs ({}):", entries.len());
            if entries.is_empty() {
                println!("  (none)");
            }
            for entry in entries {
                let profile =
                    fetch_profile(&client, endpoint, &entry.key, &entry.document_ref).await;
                println!("  {}", display_name(entry, profile.as_ref()));
                println!(
                    "      key={}  owner={}  registered_at={}  updates={}",
                    entry.key, entry.owner, entry.registered_at, entry.updates
                );
            }
        }
    }

    Ok(())
}

/// Sign `call` against `revision` of its record and post it to `path`.
async fn submit(
    client: &reqwest::Client,
    endpoint: &str,
    path: &str,
    call: RegistryCall,
    revision: u64,
    keypair: &KeyPair,
) -> anyhow::Result<ApplyResponse> {
    let op = call.op();
    let signed = SignedCall::sign(call, revision, keypair)?;
    post_json(client, endpoint, path, &signed, op).await
}

async fn fetch_record(
    client: &reqwest::Client,
    endpoint: &str,
    key: &DidKey,
) -> anyhow::Result<RecordResponse> {
    get_json(
        client,
        endpoint,
        &format!("/api/v1/registry/did/{}", key.to_hex()),
        "lookup",
    )
    .await
}

/// Resolve a record's document reference to its profile, if it points at
/// one. Any other reference yields `None`.
async fn fetch_profile(
    client: &reqwest::Client,
    endpoint: &str,
    key: &DidKey,
    document_ref: &str,
) -> Option<DidProfile> {
    let content_ref: ContentRef = document_ref.parse().ok()?;
    match download(client, endpoint, &content_ref).await {
        Ok(bytes) => DidProfile::decode(&bytes, key),
        Err(e) => {
            tracing::debug!(%key, %content_ref, error = %e, "no profile document");
            None
        }
    }
}

/// DID URI and nickname when the profile is known, else the bare key.
fn display_name(entry: &IndexEntry, profile: Option<&DidProfile>) -> String {
    match profile {
        Some(DidProfile {
            did,
            nickname: Some(nickname),
        }) => format!("{} ({})", did, nickname),
        Some(DidProfile { did, nickname: None }) => did.clone(),
        None => entry.key.to_string(),
    }
}

async fn resolve_document(
    client: &reqwest::Client,
    endpoint: &str,
    source: &DocumentSource,
) -> anyhow::Result<Option<String>> {
    if let Some(document_ref) = &source.document_ref {
        return Ok(Some(document_ref.clone()));
    }
    match &source.document {
        Some(file) => {
            let stored = upload_file(client, endpoint, file).await?;
            Ok(Some(stored.content_ref.to_string()))
        }
        None => Ok(None),
    }
}

/// Page through the node's event log until caught up.
async fn fetch_index(client: &reqwest::Client, endpoint: &str) -> anyhow::Result<EventIndex> {
    let mut index = EventIndex::new();
    loop {
        let page: EventsResponse = get_json(
            client,
            endpoint,
            &format!("/api/v1/registry/events?since={}", index.next_sequence()),
            "event fetch",
        )
        .await?;
        if page.events.is_empty() {
            break;
        }
        index.ingest_all(&page.events)?;
    }
    Ok(index)
}

fn select_entries<'a>(index: &'a EventIndex, owner: Option<&Identity>) -> Vec<&'a IndexEntry> {
    match owner {
        Some(owner) => index.owned_by(owner),
        None => index.entries(),
    }
}
