pub mod content;
pub mod did;
pub mod keygen;
pub mod status;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;
use zeroize::Zeroizing;

use aegis_crypto::KeyPair;

/// Default API endpoint of a local node.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:9101";

/// Default location of the signing key written by `aegis keygen`.
pub const DEFAULT_KEY_FILE: &str = "aegis.key";

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Decode a successful JSON response, or turn the node's error body into
/// an `anyhow` error naming the failed action.
pub async fn read_json<T: DeserializeOwned>(
    resp: reqwest::Response,
    action: &str,
) -> anyhow::Result<T> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json().await?);
    }
    match resp.json::<ErrorResponse>().await {
        Ok(err) => anyhow::bail!("{} failed (HTTP {}): {}", action, status, err.error),
        Err(_) => anyhow::bail!("{} failed (HTTP {})", action, status),
    }
}

/// GET `url` and decode the JSON body.
pub async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    endpoint: &str,
    path: &str,
    action: &str,
) -> anyhow::Result<T> {
    let resp = client
        .get(format!("{}{}", endpoint, path))
        .send()
        .await
        .with_context(|| format!("could not reach node at {}", endpoint))?;
    read_json(resp, action).await
}

/// POST a JSON body to `url` and decode the JSON reply.
pub async fn post_json<B: serde::Serialize, T: DeserializeOwned>(
    client: &reqwest::Client,
    endpoint: &str,
    path: &str,
    body: &B,
    action: &str,
) -> anyhow::Result<T> {
    let resp = client
        .post(format!("{}{}", endpoint, path))
        .json(body)
        .send()
        .await
        .with_context(|| format!("could not reach node at {}", endpoint))?;
    read_json(resp, action).await
}

/// Load a hex-encoded Ed25519 seed written by `aegis keygen`.
pub fn load_keypair(path: &Path) -> anyhow::Result<KeyPair> {
    let contents = Zeroizing::new(
        std::fs::read_to_string(path)
            .with_context(|| format!("reading key file {}", path.display()))?,
    );
    let keypair = KeyPair::from_hex(&contents)
        .with_context(|| format!("decoding key file {}", path.display()))?;
    Ok(keypair)
}
