//! KuCoin REST collaborator: WebSocket session tokens and the instrument list

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use types::{decimal_places, Instrument};

use crate::config::RestConfig;
use crate::{AdapterError, Result};

/// Success code carried in every KuCoin response envelope
pub const SUCCESS_CODE: &str = "200000";

/// One WebSocket server offered with a session token
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceServer {
    pub endpoint: String,
    #[serde(default)]
    pub encrypt: bool,
    #[serde(default)]
    pub protocol: String,
    /// Milliseconds between client pings
    pub ping_interval: u64,
    /// Milliseconds to wait for a pong
    pub ping_timeout: u64,
}

impl InstanceServer {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout)
    }
}

/// Session token for the public WebSocket feed
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicToken {
    pub token: String,
    pub instance_servers: Vec<InstanceServer>,
}

impl PublicToken {
    /// First offered server
    pub fn server(&self) -> Result<&InstanceServer> {
        self.instance_servers
            .first()
            .ok_or_else(|| AdapterError::MissingField {
                field: "instanceServers".to_string(),
            })
    }
}

/// Raw `/api/v1/symbols` record
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolRecord {
    symbol: String,
    base_currency: String,
    quote_currency: String,
    base_increment: String,
    price_increment: String,
    enable_trading: bool,
}

impl SymbolRecord {
    fn into_instrument(self) -> Result<Instrument> {
        let invalid = |value: &str| AdapterError::InvalidNumeric {
            value: value.to_string(),
        };
        let base_precision =
            decimal_places(&self.base_increment).map_err(|_| invalid(&self.base_increment))?;
        let quote_precision =
            decimal_places(&self.price_increment).map_err(|_| invalid(&self.price_increment))?;

        Ok(Instrument {
            symbol: self.symbol,
            base: self.base_currency,
            quote: self.quote_currency,
            base_precision,
            quote_precision,
            enable_trading: self.enable_trading,
        })
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: String,
    data: Option<T>,
    msg: Option<String>,
}

impl<T> Envelope<T> {
    fn into_data(self) -> Result<T> {
        if self.code != SUCCESS_CODE {
            return Err(AdapterError::Api {
                code: self.code,
                message: self.msg.unwrap_or_default(),
            });
        }
        self.data.ok_or_else(|| AdapterError::MissingField {
            field: "data".to_string(),
        })
    }
}

/// Exchange HTTP endpoints the watcher depends on
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    /// Obtain a fresh public WebSocket session token
    async fn public_token(&self) -> Result<PublicToken>;

    /// Fetch the full instrument list
    async fn symbols(&self) -> Result<Vec<Instrument>>;
}

/// `reqwest`-backed KuCoin REST client
#[derive(Debug, Clone)]
pub struct KucoinRestClient {
    client: reqwest::Client,
    base_url: String,
}

impl KucoinRestClient {
    pub fn new(config: &RestConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|e| {
            if status.is_success() {
                AdapterError::JsonParse(e)
            } else {
                AdapterError::Api {
                    code: status.as_u16().to_string(),
                    message: body.chars().take(200).collect(),
                }
            }
        })?;
        envelope.into_data()
    }
}

#[async_trait]
impl ExchangeApi for KucoinRestClient {
    async fn public_token(&self) -> Result<PublicToken> {
        let response = self
            .client
            .post(self.url("/api/v1/bullet-public"))
            .send()
            .await?;
        let token: PublicToken = Self::decode(response).await?;
        debug!(servers = token.instance_servers.len(), "Obtained public token");
        Ok(token)
    }

    async fn symbols(&self) -> Result<Vec<Instrument>> {
        let response = self.client.get(self.url("/api/v1/symbols")).send().await?;
        let records: Vec<SymbolRecord> = Self::decode(response).await?;

        let total = records.len();
        let instruments: Vec<Instrument> = records
            .into_iter()
            .filter_map(|record| {
                let symbol = record.symbol.clone();
                match record.into_instrument() {
                    Ok(instrument) => Some(instrument),
                    Err(e) => {
                        warn!(symbol = %symbol, error = %e, "Skipping symbol with invalid increments");
                        None
                    }
                }
            })
            .collect();

        debug!(total, usable = instruments.len(), "Fetched symbol list");
        Ok(instruments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYMBOLS_BODY: &str = r#"{
        "code": "200000",
        "data": [
            {
                "symbol": "BTC-USDT",
                "name": "BTC-USDT",
                "baseCurrency": "BTC",
                "quoteCurrency": "USDT",
                "baseIncrement": "0.00000001",
                "priceIncrement": "0.1",
                "enableTrading": true
            },
            {
                "symbol": "ETH-BTC",
                "name": "ETH-BTC",
                "baseCurrency": "ETH",
                "quoteCurrency": "BTC",
                "baseIncrement": "0.0000001",
                "priceIncrement": "0.000001",
                "enableTrading": false
            },
            {
                "symbol": "BAD-USDT",
                "name": "BAD-USDT",
                "baseCurrency": "BAD",
                "quoteCurrency": "USDT",
                "baseIncrement": "zero",
                "priceIncrement": "0.1",
                "enableTrading": true
            }
        ]
    }"#;

    fn client(url: String) -> KucoinRestClient {
        KucoinRestClient::new(&RestConfig {
            base_url: url,
            ..RestConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_symbols_parsed_with_precision() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/symbols")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(SYMBOLS_BODY)
            .create_async()
            .await;

        let instruments = client(server.url()).symbols().await.unwrap();
        mock.assert_async().await;

        assert_eq!(instruments.len(), 2);
        assert_eq!(instruments[0].symbol, "BTC-USDT");
        assert_eq!(instruments[0].base_precision, 8);
        assert_eq!(instruments[0].quote_precision, 1);
        assert!(instruments[0].enable_trading);
        assert_eq!(instruments[1].base, "ETH");
        assert_eq!(instruments[1].quote_precision, 6);
        assert!(!instruments[1].enable_trading);
    }

    #[tokio::test]
    async fn test_public_token() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/bullet-public")
            .with_status(200)
            .with_body(
                r#"{"code":"200000","data":{"token":"abc","instanceServers":[
                    {"endpoint":"wss://ws-api-spot.kucoin.com/","encrypt":true,
                     "protocol":"websocket","pingInterval":18000,"pingTimeout":10000}]}}"#,
            )
            .create_async()
            .await;

        let token = client(server.url()).public_token().await.unwrap();
        assert_eq!(token.token, "abc");
        let instance = token.server().unwrap();
        assert_eq!(instance.ping_interval(), Duration::from_secs(18));
        assert_eq!(instance.ping_timeout(), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_non_success_code_is_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/symbols")
            .with_status(200)
            .with_body(r#"{"code":"429000","msg":"Too many requests"}"#)
            .create_async()
            .await;

        let err = client(server.url()).symbols().await.unwrap_err();
        assert!(
            matches!(err, AdapterError::Api { ref code, .. } if code == "429000"),
            "unexpected error: {err}"
        );
    }

    #[tokio::test]
    async fn test_http_error_without_envelope() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/bullet-public")
            .with_status(503)
            .with_body("Service Unavailable")
            .create_async()
            .await;

        let err = client(server.url()).public_token().await.unwrap_err();
        assert!(matches!(err, AdapterError::Api { ref code, .. } if code == "503"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_empty_server_list() {
        let token = PublicToken {
            token: "t".into(),
            instance_servers: vec![],
        };
        assert!(matches!(
            token.server(),
            Err(AdapterError::MissingField { .. })
        ));
    }
}
