// # netcup CCP DNS Provider
//
// This crate implements `DnsProvider` for the netcup customer control panel
// (CCP) JSON API.
//
// ## Protocol
//
// Every call is a POST of a JSON envelope to a single endpoint:
//
// ```json
// { "action": "infoDnsZone", "param": { "apikey": "...", "apisessionid": "...", ... } }
// ```
//
// The answer carries a `status`; anything other than `"success"` is turned
// into `Error::Provider` with the short and long messages verbatim. The
// payload of a successful call is in `responsedata`.
//
// | Action             | Extra parameters |
// |--------------------|------------------|
// | `login`            | apikey, apipassword, customernumber |
// | `infoDnsZone`      | session + domainname |
// | `infoDnsRecords`   | session + domainname |
// | `updateDnsZone`    | session + domainname + dnszone |
// | `updateDnsRecords` | session + domainname + dnsrecordset |
//
// ## Session
//
// `authenticate` stores the API session id inside the provider. Calls made
// before that fail with `Error::NotAuthenticated` without any request.
//
// ## Security
//
// API key, password and session id never appear in logs or `Debug` output.

use async_trait::async_trait;
use dyndns_core::config::Credentials;
use dyndns_core::traits::{DnsProvider, RecordSet, Zone};
use dyndns_core::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// netcup CCP JSON endpoint
pub const NETCUP_ENDPOINT: &str = "https://ccp.netcup.net/run/webservice/servers/endpoint.php?JSON";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER_NAME: &str = "netcup";

/// Request envelope
#[derive(Debug, Serialize)]
struct Request<'a, P> {
    action: &'a str,
    param: P,
}

#[derive(Serialize)]
struct LoginParams<'a> {
    apikey: &'a str,
    apipassword: &'a str,
    customernumber: String,
}

/// Parameters shared by every call that needs a session
#[derive(Clone, Serialize)]
struct SessionParams {
    apikey: String,
    apisessionid: String,
    customernumber: String,
    domainname: String,
}

#[derive(Serialize)]
struct UpdateZoneParams<'a> {
    #[serde(flatten)]
    session: SessionParams,
    dnszone: &'a Zone,
}

#[derive(Serialize)]
struct UpdateRecordsParams<'a> {
    #[serde(flatten)]
    session: SessionParams,
    dnsrecordset: &'a RecordSet,
}

/// Response envelope
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Response {
    serverrequestid: String,
    clientrequestid: String,
    action: String,
    status: String,
    statuscode: i64,
    shortmessage: String,
    longmessage: String,
    responsedata: serde_json::Value,
}

impl Response {
    fn is_success(&self) -> bool {
        self.status == "success"
    }

    /// Turn a non-success status into an error
    fn into_result(self) -> Result<Self> {
        if !self.is_success() {
            return Err(Error::provider(
                PROVIDER_NAME,
                self.shortmessage,
                self.longmessage,
            ));
        }

        debug!("{}: [{}] {}", PROVIDER_NAME, self.status, self.longmessage);
        Ok(self)
    }

    /// Decode `responsedata`
    fn data<T: DeserializeOwned>(self) -> Result<T> {
        Ok(serde_json::from_value(self.responsedata)?)
    }
}

#[derive(Deserialize)]
struct LoginData {
    #[serde(default)]
    apisessionid: String,
}

struct Session {
    customer_number: u64,
    api_key: String,
    api_session_id: String,
}

/// netcup CCP DNS provider
pub struct NetcupProvider {
    endpoint: String,
    client: reqwest::Client,
    session: RwLock<Option<Session>>,
}

// Custom Debug implementation that hides the session
impl std::fmt::Debug for NetcupProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetcupProvider")
            .field("endpoint", &self.endpoint)
            .field("session", &"<REDACTED>")
            .finish()
    }
}

impl NetcupProvider {
    /// Create a provider talking to the public netcup endpoint
    pub fn new() -> Result<Self> {
        Self::with_endpoint(NETCUP_ENDPOINT)
    }

    /// Create a provider talking to `endpoint`
    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into(),
            client,
            session: RwLock::new(None),
        })
    }

    /// Whether `authenticate` succeeded
    pub async fn is_authenticated(&self) -> bool {
        self.session.read().await.is_some()
    }

    async fn session_params(&self, domain: &str) -> Result<SessionParams> {
        let session = self.session.read().await;
        let session = session
            .as_ref()
            .ok_or_else(|| Error::not_authenticated(PROVIDER_NAME))?;

        Ok(SessionParams {
            apikey: session.api_key.clone(),
            apisessionid: session.api_session_id.clone(),
            customernumber: session.customer_number.to_string(),
            domainname: domain.to_string(),
        })
    }

    /// Send one request and check its status
    async fn call<P: Serialize>(&self, action: &str, param: P) -> Result<Response> {
        let request = Request { action, param };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::http(format!("{} request failed: {}", action, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read {} response: {}", action, e)))?;

        if !status.is_success() {
            return Err(Error::http(format!(
                "{} request returned {}: {}",
                action, status, body
            )));
        }

        let response: Response = serde_json::from_str(&body)?;
        debug!(
            "{} answered {} (request {}/{}, status code {})",
            response.action,
            response.status,
            response.serverrequestid,
            response.clientrequestid,
            response.statuscode
        );
        response.into_result()
    }
}

#[async_trait]
impl DnsProvider for NetcupProvider {
    async fn authenticate(&self, credentials: &Credentials) -> Result<()> {
        let params = LoginParams {
            apikey: &credentials.api_key,
            apipassword: &credentials.api_password,
            customernumber: credentials.customer_number.to_string(),
        };

        let login: LoginData = self.call("login", params).await?.data()?;
        if login.apisessionid.is_empty() {
            return Err(Error::provider(
                PROVIDER_NAME,
                "Login failed.",
                "empty session id supplied",
            ));
        }

        *self.session.write().await = Some(Session {
            customer_number: credentials.customer_number,
            api_key: credentials.api_key.clone(),
            api_session_id: login.apisessionid,
        });
        Ok(())
    }

    async fn get_zone(&self, domain: &str) -> Result<Zone> {
        let params = self.session_params(domain).await?;
        self.call("infoDnsZone", params).await?.data()
    }

    async fn update_zone(&self, domain: &str, zone: &Zone) -> Result<()> {
        let params = UpdateZoneParams {
            session: self.session_params(domain).await?,
            dnszone: zone,
        };
        self.call("updateDnsZone", params).await?;
        Ok(())
    }

    async fn get_records(&self, domain: &str) -> Result<RecordSet> {
        let params = self.session_params(domain).await?;
        self.call("infoDnsRecords", params).await?.data()
    }

    async fn update_records(&self, domain: &str, records: &RecordSet) -> Result<()> {
        let params = UpdateRecordsParams {
            session: self.session_params(domain).await?,
            dnsrecordset: records,
        };
        self.call("updateDnsRecords", params).await?;
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}
