//! Replace protocol client: swap a set of unspent wallet outputs for a set
//! of freshly derived ones through the mint, leaving the wallet no worse off
//! on any failure.
//!
//! The call runs `IDLE → VALIDATED → SUBMITTED` and terminates in
//! `NETWORK_ERR`, `HTTP_ERR`, or `COMMITTED`; only the committed path
//! mutates the ledger.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use thiserror::Error;

use crate::store::StoredInput;
use crate::types::{Amount, SecretWebcash};
use crate::utils::config::MintApi;

/// Status and body of one mint round trip.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Request/response transport to the mint, narrow enough to mock in tests.
pub trait MintTransport: Send + Sync {
    fn request(
        &self,
        method: &str,
        path: &str,
        body: &str,
        content_type: &str,
    ) -> Result<HttpResponse>;
}

/// Production transport: blocking HTTPS against a configured base URL.
pub struct MintClient {
    server: String,
    http: reqwest::blocking::Client,
}

impl MintClient {
    /// `server` is the mint base URL, e.g. `https://webcash.org`.
    pub fn new(server: impl Into<String>) -> Result<MintClient> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(MintApi::TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(MintApi::TIMEOUT_SECS))
            .build()
            .context("build mint http client")?;
        let mut server = server.into();
        while server.ends_with('/') {
            server.pop();
        }
        Ok(MintClient { server, http })
    }
}

impl MintTransport for MintClient {
    fn request(
        &self,
        method: &str,
        path: &str,
        body: &str,
        content_type: &str,
    ) -> Result<HttpResponse> {
        let method =
            reqwest::Method::from_bytes(method.as_bytes()).context("invalid http method")?;
        let url = format!("{}{}", self.server, path);
        let response = self
            .http
            .request(method, &url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body.to_owned())
            .send()
            .with_context(|| format!("POST {url}"))?;
        let status = response.status().as_u16();
        let body = response.text().context("read mint response body")?;
        Ok(HttpResponse { status, body })
    }
}

/// JSON body of `POST /api/v1/replace`. Sending it asserts the user has
/// accepted the terms of service.
#[derive(Debug, Serialize)]
pub struct ReplaceRequest {
    pub webcashes: Vec<String>,
    pub new_webcashes: Vec<String>,
    pub legalese: Legalese,
}

#[derive(Debug, Serialize)]
pub struct Legalese {
    pub terms: bool,
}

impl ReplaceRequest {
    pub fn new(inputs: &[SecretWebcash], outputs: &[SecretWebcash]) -> ReplaceRequest {
        ReplaceRequest {
            webcashes: inputs.iter().map(|w| w.to_string()).collect(),
            new_webcashes: outputs.iter().map(|w| w.to_string()).collect(),
            legalese: Legalese { terms: true },
        }
    }
}

/// A replacement output the wallet now controls, paired with the ledger row
/// that tracks it.
#[derive(Clone, Debug)]
pub struct ReplacedOutput {
    pub secret: SecretWebcash,
    pub output_id: i64,
}

/// Why a replace call stopped without committing (or failed to load).
#[derive(Debug, Error)]
pub enum ReplaceError {
    #[error("replace requires at least one input")]
    EmptyInputs,
    #[error("replace requires at least one output")]
    EmptyOutputs,
    #[error("wallet has no output with id {0}")]
    UnknownInput(i64),
    #[error("wallet holds no secret for output {0}")]
    MissingSecret(i64),
    #[error("output {0} is already spent")]
    AlreadySpent(i64),
    #[error("input {0} has an amount below the one-unit minimum")]
    InputBelowMinimum(i64),
    #[error("requested output {0} has an amount below the one-unit minimum")]
    OutputBelowMinimum(String),
    #[error("inputs total {inputs} but outputs total {outputs}; replacement must conserve value")]
    NotConserved { inputs: Amount, outputs: Amount },
    #[error("amount overflow while totalling webcash")]
    Overflow,
    #[error("unable to encode replace request: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("mint transport failed: {0:#}")]
    Transport(#[source] anyhow::Error),
    #[error("mint rejected replacement with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("wallet database error: {0:#}")]
    Database(#[source] anyhow::Error),
}

/// Check every precondition and collect the input claim codes.
///
/// Inputs must be known, unspent, preimage-held, and at least one unit;
/// outputs must be at least one unit; totals must match exactly. No side
/// effects on failure.
pub fn validate(
    inputs: &[StoredInput],
    outputs: &[SecretWebcash],
) -> Result<Vec<SecretWebcash>, ReplaceError> {
    if inputs.is_empty() {
        return Err(ReplaceError::EmptyInputs);
    }
    if outputs.is_empty() {
        return Err(ReplaceError::EmptyOutputs);
    }

    let mut input_webcash = Vec::with_capacity(inputs.len());
    let mut input_total = Amount::ZERO;
    for input in inputs {
        let Some(sk) = &input.secret else {
            return Err(ReplaceError::MissingSecret(input.output_id));
        };
        if !input.amount.is_positive() {
            return Err(ReplaceError::InputBelowMinimum(input.output_id));
        }
        if input.spent {
            return Err(ReplaceError::AlreadySpent(input.output_id));
        }
        input_total = input_total
            .checked_add(input.amount)
            .ok_or(ReplaceError::Overflow)?;
        input_webcash.push(SecretWebcash {
            sk: sk.clone(),
            amount: input.amount,
        });
    }

    let mut output_total = Amount::ZERO;
    for output in outputs {
        if !output.amount.is_positive() {
            return Err(ReplaceError::OutputBelowMinimum(output.to_string()));
        }
        output_total = output_total
            .checked_add(output.amount)
            .ok_or(ReplaceError::Overflow)?;
    }

    if input_total != output_total {
        return Err(ReplaceError::NotConserved {
            inputs: input_total,
            outputs: output_total,
        });
    }
    Ok(input_webcash)
}

/// Submit a validated request. Transport failures and non-200 statuses are
/// terminal without side effects; a 200 means the mint has committed and the
/// caller must now record the exchange locally.
pub fn submit(transport: &dyn MintTransport, request: &ReplaceRequest) -> Result<(), ReplaceError> {
    let body = serde_json::to_string(request).map_err(ReplaceError::Encode)?;
    let response = transport
        .request("POST", MintApi::REPLACE_PATH, &body, MintApi::CONTENT_TYPE_JSON)
        .map_err(ReplaceError::Transport)?;
    if response.status != 200 {
        return Err(ReplaceError::Rejected {
            status: response.status,
            body: response.body,
        });
    }
    Ok(())
}
