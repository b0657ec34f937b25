//! # Timestamp Authority Adapter
//!
//! RFC 3161 backend. The external reference is the base64 encoded timestamp
//! token (a CMS `ContentInfo`).
//!
//! The imprint sent to the authority is SHA-256 over the UTF-8 bytes of the
//! commitment, since authorities do not accept 512-bit SHA3 digests.
//! Verification is local: the token is decoded down to its `TSTInfo` and the
//! imprint and generation time are compared. The CMS signature chain is not
//! validated.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::NaiveDateTime;
use reqwest::Client;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::der::{self, oid, tag, DerError, DerReader};
use crate::config::TsaConfig;
use crate::domain::{
    BackendKind, VerificationOutcome, WitnessError, WitnessNetwork, WitnessReceipt,
};
use crate::ports::WitnessBackend;

/// Content type of a timestamp request.
const TIMESTAMP_QUERY: &str = "application/timestamp-query";

/// Fields read out of a timestamp token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampInfo {
    /// `messageImprint.hashedMessage`
    pub hashed_message: Vec<u8>,
    /// `genTime` in unix seconds.
    pub gen_time: i64,
}

/// RFC 3161 witness backend.
pub struct TsaWitness {
    client: Client,
    config: TsaConfig,
}

impl TsaWitness {
    /// Create a backend from configuration.
    pub fn new(config: TsaConfig) -> Result<Self, WitnessError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| WitnessError::Rpc(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl WitnessBackend for TsaWitness {
    fn kind(&self) -> BackendKind {
        BackendKind::TimestampAuthority
    }

    async fn witness(
        &self,
        _network: WitnessNetwork,
        event_hash: &str,
    ) -> Result<WitnessReceipt, WitnessError> {
        let request = build_timestamp_request(&imprint(event_hash), rand::random());

        let response = self
            .client
            .post(&self.config.url)
            .header(reqwest::header::CONTENT_TYPE, TIMESTAMP_QUERY)
            .body(request)
            .send()
            .await?
            .error_for_status()?;
        let body = response.bytes().await?;

        let token = parse_timestamp_response(&body)?;
        let info = parse_timestamp_token(token)?;
        info!(url = %self.config.url, gen_time = info.gen_time, "[aqua] Timestamp token issued");

        Ok(WitnessReceipt {
            reference: STANDARD.encode(token),
            account: Some(self.config.url.clone()),
            timestamp: Some(info.gen_time),
        })
    }

    async fn verify(
        &self,
        _network: WitnessNetwork,
        reference: &str,
        expected_commitment: &str,
        expected_timestamp: Option<i64>,
    ) -> Result<VerificationOutcome, WitnessError> {
        let token = STANDARD
            .decode(reference.trim())
            .map_err(|e| WitnessError::Protocol(format!("Token is not base64: {e}")))?;
        let info = parse_timestamp_token(&token)?;

        if info.hashed_message != imprint(expected_commitment) {
            debug!("[aqua] Timestamp imprint differs from commitment");
            return Ok(VerificationOutcome::Mismatch);
        }
        if let Some(expected) = expected_timestamp {
            if expected != info.gen_time {
                debug!(expected, actual = info.gen_time, "[aqua] Timestamp genTime differs");
                return Ok(VerificationOutcome::Mismatch);
            }
        }
        Ok(VerificationOutcome::Match)
    }
}

/// SHA-256 over the commitment's UTF-8 bytes.
pub fn imprint(commitment: &str) -> Vec<u8> {
    Sha256::digest(commitment.as_bytes()).to_vec()
}

/// DER `TimeStampReq` for a SHA-256 imprint, requesting the signer certificate.
pub fn build_timestamp_request(imprint: &[u8], nonce: u64) -> Vec<u8> {
    der::sequence(&[
        der::integer_u64(1),
        message_imprint(imprint),
        der::integer_u64(nonce),
        der::boolean(true),
    ])
}

fn message_imprint(imprint: &[u8]) -> Vec<u8> {
    der::sequence(&[
        der::sequence(&[der::object_identifier(oid::SHA256), der::null()]),
        der::octet_string(imprint),
    ])
}

/// Extract the token from a `TimeStampResp`, requiring a granted status.
pub fn parse_timestamp_response(body: &[u8]) -> Result<&[u8], WitnessError> {
    let mut resp = DerReader::new(body).enter(tag::SEQUENCE)?;
    let mut status_info = resp.enter(tag::SEQUENCE)?;
    let status = der::decode_u64(status_info.expect(tag::INTEGER)?.value)?;
    // 0 = granted, 1 = grantedWithMods
    if status > 1 {
        return Err(WitnessError::Rpc(format!("Timestamp request rejected with status {status}")));
    }
    if resp.peek_tag() != Some(tag::SEQUENCE) {
        return Err(WitnessError::Protocol("Granted response carries no token".into()));
    }
    Ok(resp.expect(tag::SEQUENCE)?.raw)
}

/// Walk `ContentInfo → SignedData → encapContentInfo → TSTInfo`.
pub fn parse_timestamp_token(token: &[u8]) -> Result<TimestampInfo, DerError> {
    let mut content_info = DerReader::new(token).enter(tag::SEQUENCE)?;
    if content_info.expect(tag::OID)?.value != oid::SIGNED_DATA {
        return Err(DerError::InvalidValue("token is not SignedData".into()));
    }

    let mut explicit = content_info.enter(tag::CONTEXT_0)?;
    let mut signed_data = explicit.enter(tag::SEQUENCE)?;
    signed_data.expect(tag::INTEGER)?;
    signed_data.expect(tag::SET)?;

    let mut encap = signed_data.enter(tag::SEQUENCE)?;
    if encap.expect(tag::OID)?.value != oid::TST_INFO {
        return Err(DerError::InvalidValue("content is not TSTInfo".into()));
    }
    let mut e_content = encap.enter(tag::CONTEXT_0)?;
    let tst_info_der = e_content.expect(tag::OCTET_STRING)?.value;

    let mut tst_info = DerReader::new(tst_info_der).enter(tag::SEQUENCE)?;
    tst_info.expect(tag::INTEGER)?;
    tst_info.expect(tag::OID)?;

    let mut imprint = tst_info.enter(tag::SEQUENCE)?;
    imprint.expect(tag::SEQUENCE)?;
    let hashed_message = imprint.expect(tag::OCTET_STRING)?.value.to_vec();

    // serialNumber precedes genTime
    let gen_time = parse_generalized_time(tst_info.find(tag::GENERALIZED_TIME)?.value)?;

    Ok(TimestampInfo {
        hashed_message,
        gen_time,
    })
}

/// Parse `YYYYMMDDHHMMSS[.fff]Z` into unix seconds.
pub fn parse_generalized_time(value: &[u8]) -> Result<i64, DerError> {
    let text = std::str::from_utf8(value)
        .map_err(|_| DerError::InvalidValue("genTime is not ASCII".into()))?;
    let text = text.strip_suffix('Z').unwrap_or(text);
    let whole = text.split('.').next().unwrap_or(text);
    NaiveDateTime::parse_from_str(whole, "%Y%m%d%H%M%S")
        .map(|t| t.and_utc().timestamp())
        .map_err(|e| DerError::InvalidValue(format!("genTime {text}: {e}")))
}

#[cfg(test)]
pub mod test_helpers {
    use super::*;

    /// A structurally valid, unsigned timestamp token.
    pub fn fake_token(commitment: &str, gen_time: &str) -> Vec<u8> {
        let tst_info = der::sequence(&[
            der::integer_u64(1),
            der::object_identifier(&[0x2B, 0x06, 0x01, 0x04, 0x01]),
            message_imprint(&imprint(commitment)),
            der::integer_u64(42),
            der::encode(tag::GENERALIZED_TIME, gen_time.as_bytes()),
        ]);
        let encap = der::sequence(&[
            der::object_identifier(oid::TST_INFO),
            der::constructed(tag::CONTEXT_0, &[der::octet_string(&tst_info)]),
        ]);
        let signed_data = der::sequence(&[
            der::integer_u64(3),
            der::constructed(tag::SET, &[]),
            encap,
            der::constructed(tag::SET, &[]),
        ]);
        der::sequence(&[
            der::object_identifier(oid::SIGNED_DATA),
            der::constructed(tag::CONTEXT_0, &[signed_data]),
        ])
    }
}
