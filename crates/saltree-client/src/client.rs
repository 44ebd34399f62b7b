//! Retrieval client implementation

use std::fmt;
use std::str::FromStr;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use saltree_core::ot::{Receiver, RecordDisclosure, SenderResponse};
use saltree_core::pir::{QueryResponse, Verifier};
use saltree_core::Commitment;

use crate::error::{ClientError, Result};

/// Request to the insert endpoint
#[derive(Serialize)]
struct InsertRequest<'a> {
    #[serde(with = "saltree_core::encoding::hex_bytes")]
    record: &'a [u8],
}

/// Response from the insert endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct InsertResponse {
    pub index: u64,
    pub commitment: Commitment,
}

/// Response from the tombstone endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TombstoneResponse {
    pub index: u64,
    pub commitment: Commitment,
}

/// Which exchange to retrieve a record with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetrievalMode {
    #[default]
    Pir,
    Ot,
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalMode::Pir => write!(f, "pir"),
            RetrievalMode::Ot => write!(f, "ot"),
        }
    }
}

impl FromStr for RetrievalMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pir" => Ok(RetrievalMode::Pir),
            "ot" => Ok(RetrievalMode::Ot),
            other => Err(format!("unknown retrieval mode: {}", other)),
        }
    }
}

/// Client that only hands out records verified against a pinned root
pub struct RetrievalClient {
    http: Client,
    server_url: String,
    max_attempts: u32,
    pinned: Option<Commitment>,
}

impl RetrievalClient {
    pub fn new(server_url: String) -> Self {
        Self {
            http: Client::new(),
            server_url: server_url.trim_end_matches('/').to_string(),
            max_attempts: 1,
            pinned: None,
        }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Currently pinned commitment
    pub fn commitment(&self) -> Option<&Commitment> {
        self.pinned.as_ref()
    }

    /// Trust `commitment` obtained out of band
    pub fn pin(&mut self, commitment: Commitment) {
        self.pinned = Some(commitment);
    }

    /// Fetch the published commitment and pin it
    pub async fn fetch_commitment(&mut self) -> Result<Commitment> {
        let commitment: Commitment = self.get_json("/root").await?;
        tracing::debug!(
            root = %commitment.root,
            leaves = commitment.leaf_count,
            epoch = commitment.epoch,
            algorithm = %commitment.algorithm,
            "Pinned commitment"
        );
        self.pinned = Some(commitment);
        Ok(commitment)
    }

    pub async fn retrieve(&mut self, index: u64, mode: RetrievalMode) -> Result<Vec<u8>> {
        match mode {
            RetrievalMode::Pir => self.retrieve_pir(index).await,
            RetrievalMode::Ot => self.retrieve_ot(index).await,
        }
    }

    /// Query `index` and return the record only if it verifies
    pub async fn retrieve_pir(&mut self, index: u64) -> Result<Vec<u8>> {
        for attempt in 1..=self.max_attempts {
            let pinned = self.pinned_for_attempt(attempt).await?;
            let verifier = Verifier::from_commitment(&pinned);

            let response: QueryResponse = self.get_json(&format!("/pir/{}", index)).await?;
            if let Some(record) = verifier.verify(index, &response) {
                return Ok(record);
            }
            tracing::warn!(index, attempt, root = %pinned.root, "Query response failed verification");
        }

        Err(ClientError::VerificationFailed {
            index,
            attempts: self.max_attempts,
        })
    }

    /// Run the sender/receiver exchange for `index`
    ///
    /// The record is fetched only after the sender's proof verifies.
    pub async fn retrieve_ot(&mut self, index: u64) -> Result<Vec<u8>> {
        for attempt in 1..=self.max_attempts {
            let pinned = self.pinned_for_attempt(attempt).await?;
            let receiver = Receiver::from_commitment(&pinned);

            let response: SenderResponse = self.get_json(&format!("/ot/{}", index)).await?;
            if !receiver.verify_response(index, &response) {
                tracing::warn!(index, attempt, root = %pinned.root, "Sender response failed verification");
                continue;
            }

            let disclosure: RecordDisclosure =
                self.get_json(&format!("/ot/{}/record", index)).await?;
            if disclosure.index == index {
                if let Some(record) = receiver.accept(index, &response, &disclosure.record) {
                    return Ok(record);
                }
            }
            tracing::warn!(index, attempt, "Disclosed record does not match committed leaf");
        }

        Err(ClientError::VerificationFailed {
            index,
            attempts: self.max_attempts,
        })
    }

    /// Append a record. The returned commitment is not pinned.
    pub async fn insert(&self, record: &[u8]) -> Result<InsertResponse> {
        let url = format!("{}/records", self.server_url);
        let resp = self
            .http
            .post(&url)
            .json(&InsertRequest { record })
            .send()
            .await?;
        let inserted: InsertResponse = decode(resp).await?;
        tracing::info!(index = inserted.index, root = %inserted.commitment.root, "Record inserted");
        Ok(inserted)
    }

    /// Tombstone a record. The returned commitment is not pinned.
    pub async fn tombstone(&self, index: u64) -> Result<TombstoneResponse> {
        let url = format!("{}/records/{}", self.server_url, index);
        let resp = self.http.delete(&url).send().await?;
        let removed: TombstoneResponse = decode(resp).await?;
        tracing::info!(index, root = %removed.commitment.root, "Record tombstoned");
        Ok(removed)
    }

    /// First attempt uses the pinned root; later ones re-fetch it
    async fn pinned_for_attempt(&mut self, attempt: u32) -> Result<Commitment> {
        if attempt > 1 {
            return self.fetch_commitment().await;
        }
        self.pinned.ok_or(ClientError::NotInitialized)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.server_url, path);
        let resp = self.http.get(&url).send().await?;
        decode(resp).await
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    if !resp.status().is_success() {
        return Err(ClientError::Server {
            status: resp.status().as_u16(),
            message: resp.text().await.unwrap_or_default(),
        });
    }
    let bytes = resp.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Builder for RetrievalClient
pub struct ClientBuilder {
    server_url: String,
    max_attempts: u32,
    commitment: Option<Commitment>,
}

impl ClientBuilder {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            max_attempts: 1,
            commitment: None,
        }
    }

    /// Total attempts per retrieval, at least one
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Start with a commitment obtained out of band
    pub fn commitment(mut self, commitment: Commitment) -> Self {
        self.commitment = Some(commitment);
        self
    }

    pub fn build(self) -> RetrievalClient {
        let mut client = RetrievalClient::new(self.server_url);
        client.max_attempts = self.max_attempts;
        client.pinned = self.commitment;
        client
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_url_trimmed() {
        let client = ClientBuilder::new("http://localhost:3000/").build();
        assert_eq!(client.server_url(), "http://localhost:3000");
        assert!(client.commitment().is_none());
    }

    #[test]
    fn test_max_attempts_floor() {
        let client = ClientBuilder::new("http://localhost:3000")
            .max_attempts(0)
            .build();
        assert_eq!(client.max_attempts, 1);
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("PIR".parse::<RetrievalMode>().unwrap(), RetrievalMode::Pir);
        assert_eq!("ot".parse::<RetrievalMode>().unwrap(), RetrievalMode::Ot);
        assert!("plain".parse::<RetrievalMode>().is_err());
        assert_eq!(RetrievalMode::Ot.to_string(), "ot");
    }

    #[tokio::test]
    async fn test_retrieve_requires_commitment() {
        let mut client = ClientBuilder::new("http://127.0.0.1:9").build();
        assert!(matches!(
            client.retrieve_pir(0).await,
            Err(ClientError::NotInitialized)
        ));
    }

    #[test]
    fn test_insert_request_hex() {
        let json = serde_json::to_string(&InsertRequest { record: &[0xab, 0xcd] }).unwrap();
        assert_eq!(json, r#"{"record":"abcd"}"#);
    }
}
