// src/services/api_server.rs
//! API Server for ethr DID tokens
//!
//! REST interface over the token codec and the registry client.
//!
//! The API is built using Axum and includes endpoints for:
//! - identifier normalization and owner lookup
//! - token issuance (with the server's key) and verification
//! - registry writes: owner changes, delegates and attributes
//!
//! Write and issuance endpoints need the server to be configured with a
//! private key; without one they answer `503 Service Unavailable`.

use crate::blockchain::rpc::JsonRpc;
use crate::contracts::did_registry::EthrDidRegistry;
use crate::error::Error;
use crate::jwt::token::{create_token, verify};
use crate::models::delegate::{DelegateOptions, DelegateType, DEFAULT_VALIDITY_SECS};
use crate::models::did::normalize_did;
use crate::models::token::{Algorithm, Payload};
use crate::services::resolver::RegistryResolver;
use crate::wallet::key_management::KeyManager;
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use ethers::types::{Address, H256};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

// API request and response structures

/// Response for identifier normalization
#[derive(Serialize, Deserialize)]
struct NormalizeResponse {
    did: String,
}

/// Response for owner lookup
#[derive(Serialize, Deserialize)]
struct OwnerResponse {
    identity: String,
    owner: String,
}

/// Request payload for issuing a token signed by the server's key
#[derive(Serialize, Deserialize)]
struct IssueTokenRequest {
    #[serde(default)]
    claims: Payload,
    #[serde(default = "default_algorithm")]
    alg: Algorithm,
    /// Seconds until `exp`; no `exp` claim when absent
    expires_in: Option<u64>,
}

fn default_algorithm() -> Algorithm {
    Algorithm::ES256KR
}

/// Response containing an issued token
#[derive(Serialize, Deserialize)]
struct IssueTokenResponse {
    token: String,
}

/// Request payload for verifying a token
#[derive(Serialize, Deserialize)]
struct VerifyTokenRequest {
    token: String,
}

/// Response for token verification
#[derive(Serialize, Deserialize)]
struct VerifyTokenResponse {
    is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<Payload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct ChangeOwnerRequest {
    identity: String,
    new_owner: String,
}

#[derive(Serialize, Deserialize)]
struct AddDelegateRequest {
    identity: String,
    delegate: String,
    delegate_type: Option<String>,
    expires_in: Option<u64>,
}

#[derive(Serialize, Deserialize)]
struct RevokeDelegateRequest {
    identity: String,
    delegate: String,
    delegate_type: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct SetAttributeRequest {
    identity: String,
    key: String,
    value: String,
    expires_in: Option<u64>,
}

/// Response for any registry write
#[derive(Serialize, Deserialize)]
struct TransactionResponse {
    tx_hash: String,
}

/// Error body shared by every endpoint
#[derive(Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// API server state containing all service dependencies
pub struct ApiServer<R> {
    /// Registry client used for lookups and writes
    registry: Arc<EthrDidRegistry<R>>,

    /// Signer authorization used by token verification
    resolver: Arc<RegistryResolver<R>>,

    /// Server key for issuing tokens; `None` makes the server read-only
    key_manager: Option<Arc<KeyManager>>,
}

impl<R> Clone for ApiServer<R> {
    fn clone(&self) -> Self {
        ApiServer {
            registry: self.registry.clone(),
            resolver: self.resolver.clone(),
            key_manager: self.key_manager.clone(),
        }
    }
}

impl<R: JsonRpc + 'static> ApiServer<R> {
    /// Creates a new instance of the API server
    ///
    /// # Arguments
    /// * `registry` - registry client; attach a signer to it to enable writes
    /// * `key_manager` - key used by `/issue-token`
    pub fn new(registry: Arc<EthrDidRegistry<R>>, key_manager: Option<KeyManager>) -> Self {
        ApiServer {
            resolver: Arc::new(RegistryResolver::new(registry.clone())),
            registry,
            key_manager: key_manager.map(Arc::new),
        }
    }

    /// Replaces the default owner-only resolver.
    pub fn with_resolver(mut self, resolver: RegistryResolver<R>) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// All API routes with the server as shared state.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/normalize/:id", get(Self::normalize_handler))
            .route("/owner/:identity", get(Self::owner_handler))
            .route("/issue-token", post(Self::issue_token_handler))
            .route("/verify-token", post(Self::verify_token_handler))
            .route("/change-owner", post(Self::change_owner_handler))
            .route("/add-delegate", post(Self::add_delegate_handler))
            .route("/revoke-delegate", post(Self::revoke_delegate_handler))
            .route("/set-attribute", post(Self::set_attribute_handler))
            .with_state(Arc::new(self.clone()))
    }

    /// Starts the API server and begins listening for requests
    ///
    /// # Arguments
    /// * `addr` - Socket address to bind to (e.g., "127.0.0.1:3000")
    pub async fn run(&self, addr: SocketAddr) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("API server listening on http://{addr}");
        axum::serve(listener, self.router()).await
    }

    // =====================
    // Identity Handlers
    // =====================

    /// Normalizes an identifier to its DID form
    ///
    /// # Endpoint
    /// GET /normalize/:id
    async fn normalize_handler(Path(id): Path<String>) -> impl IntoResponse {
        (
            StatusCode::OK,
            Json(NormalizeResponse {
                did: normalize_did(&id),
            }),
        )
    }

    /// Looks up the current owner of an identity
    ///
    /// # Endpoint
    /// GET /owner/:identity
    ///
    /// # Responses
    /// - 200 OK: normalized identity and owner address
    /// - 400 Bad Request: not an ethr identity
    /// - 502 Bad Gateway: registry read failed
    async fn owner_handler(
        Path(identity): Path<String>,
        State(state): State<Arc<ApiServer<R>>>,
    ) -> Response {
        let identity = normalize_did(&identity);
        match state.registry.lookup_owner(&identity).await {
            Ok(owner) => (
                StatusCode::OK,
                Json(OwnerResponse {
                    identity,
                    owner: format!("0x{:x}", owner),
                }),
            )
                .into_response(),
            Err(e) => error_response(e),
        }
    }

    // =====================
    // Token Handlers
    // =====================

    /// Issues a token for the server's own identity
    ///
    /// # Endpoint
    /// POST /issue-token
    ///
    /// # Responses
    /// - 200 OK: the encoded token
    /// - 503 Service Unavailable: no server key configured
    async fn issue_token_handler(
        State(state): State<Arc<ApiServer<R>>>,
        Json(payload): Json<IssueTokenRequest>,
    ) -> Response {
        let Some(key_manager) = &state.key_manager else {
            return error_response(Error::Signing("no server key configured".into()));
        };

        match create_token(
            payload.claims,
            &key_manager.did(),
            key_manager.as_ref(),
            payload.alg,
            payload.expires_in,
            Utc::now(),
        ) {
            Ok(token) => (StatusCode::OK, Json(IssueTokenResponse { token })).into_response(),
            Err(e) => error_response(e),
        }
    }

    /// Verifies a token against the registry
    ///
    /// # Endpoint
    /// POST /verify-token
    ///
    /// # Responses
    /// - 200 OK: `is_valid` with the payload, or `false` with the reason
    /// - 502 Bad Gateway: registry read failed
    async fn verify_token_handler(
        State(state): State<Arc<ApiServer<R>>>,
        Json(payload): Json<VerifyTokenRequest>,
    ) -> Response {
        match verify(&payload.token, state.resolver.as_ref()).await {
            Ok(claims) => (
                StatusCode::OK,
                Json(VerifyTokenResponse {
                    is_valid: true,
                    payload: Some(claims),
                    error: None,
                }),
            )
                .into_response(),
            Err(e @ Error::RegistryCall { .. }) => error_response(e),
            Err(e) => {
                info!("token rejected: {e}");
                (
                    StatusCode::OK,
                    Json(VerifyTokenResponse {
                        is_valid: false,
                        payload: None,
                        error: Some(e.to_string()),
                    }),
                )
                    .into_response()
            }
        }
    }

    // =====================
    // Registry Write Handlers
    // =====================

    /// # Endpoint
    /// POST /change-owner
    async fn change_owner_handler(
        State(state): State<Arc<ApiServer<R>>>,
        Json(payload): Json<ChangeOwnerRequest>,
    ) -> Response {
        let new_owner = match parse_address(&payload.new_owner) {
            Ok(address) => address,
            Err(response) => return response,
        };
        transaction_response(
            state
                .registry
                .change_owner(&payload.identity, new_owner)
                .await,
        )
    }

    /// # Endpoint
    /// POST /add-delegate
    async fn add_delegate_handler(
        State(state): State<Arc<ApiServer<R>>>,
        Json(payload): Json<AddDelegateRequest>,
    ) -> Response {
        let delegate = match parse_address(&payload.delegate) {
            Ok(address) => address,
            Err(response) => return response,
        };
        let defaults = DelegateOptions::default();
        let options = DelegateOptions {
            delegate_type: payload
                .delegate_type
                .as_deref()
                .map(DelegateType::from)
                .unwrap_or(defaults.delegate_type),
            expires_in: payload.expires_in.unwrap_or(defaults.expires_in),
        };
        transaction_response(
            state
                .registry
                .add_delegate(&payload.identity, delegate, &options)
                .await,
        )
    }

    /// # Endpoint
    /// POST /revoke-delegate
    async fn revoke_delegate_handler(
        State(state): State<Arc<ApiServer<R>>>,
        Json(payload): Json<RevokeDelegateRequest>,
    ) -> Response {
        let delegate = match parse_address(&payload.delegate) {
            Ok(address) => address,
            Err(response) => return response,
        };
        let delegate_type = payload
            .delegate_type
            .as_deref()
            .map(DelegateType::from)
            .unwrap_or_default();
        transaction_response(
            state
                .registry
                .revoke_delegate(&payload.identity, delegate, &delegate_type)
                .await,
        )
    }

    /// # Endpoint
    /// POST /set-attribute
    async fn set_attribute_handler(
        State(state): State<Arc<ApiServer<R>>>,
        Json(payload): Json<SetAttributeRequest>,
    ) -> Response {
        transaction_response(
            state
                .registry
                .set_attribute(
                    &payload.identity,
                    &payload.key,
                    &payload.value,
                    payload.expires_in.unwrap_or(DEFAULT_VALIDITY_SECS),
                )
                .await,
        )
    }
}

fn parse_address(value: &str) -> Result<Address, Response> {
    value.parse::<Address>().map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("invalid address {value}: {e}"),
            }),
        )
            .into_response()
    })
}

fn transaction_response(result: crate::error::Result<H256>) -> Response {
    match result {
        Ok(tx_hash) => (
            StatusCode::OK,
            Json(TransactionResponse {
                tx_hash: format!("0x{:x}", tx_hash),
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::MalformedToken(_)
        | Error::MalformedSignature { .. }
        | Error::InvalidIdentity(_)
        | Error::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
        Error::InvalidSignature(_) | Error::UnauthorizedSigner { .. } | Error::ExpiredToken { .. } => {
            StatusCode::UNAUTHORIZED
        }
        Error::RegistryCall { .. } => StatusCode::BAD_GATEWAY,
        Error::Signing(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: Error) -> Response {
    let status = status_for(&error);
    if status.is_server_error() {
        warn!("request failed: {error}");
    }
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}
