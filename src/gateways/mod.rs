/*!
 * # Payment Gateway Clients
 *
 * Thin verification clients for the regional payment gateways (eSewa and
 * Khalti). Checkout never talks to a gateway directly; the confirmation
 * handlers call [`PaymentGateway::verify`] before touching the database.
 */

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{instrument, warn};

use crate::config::AppConfig;
use crate::errors::ServiceError;

/// Outcome of a gateway verification call
#[derive(Debug, Clone)]
pub struct GatewayVerification {
    /// Whether the gateway recognized the transaction as successful
    pub verified: bool,
    /// Amount the gateway settled, when it reports one
    pub amount: Option<Decimal>,
    /// Gateway-side transaction reference
    pub reference: String,
}

/// Verification client for an external payment gateway
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Verify a transaction reference against the gateway.
    ///
    /// Network or gateway-side failures map to `ExternalServiceError`; a
    /// well-formed negative answer comes back as `verified = false`.
    async fn verify(
        &self,
        reference: &str,
        amount: Decimal,
    ) -> Result<GatewayVerification, ServiceError>;
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, ServiceError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ServiceError::InternalError(format!("Failed to build HTTP client: {}", e)))
}

/// eSewa transaction verification client.
///
/// eSewa's legacy `transrec` endpoint takes form-encoded fields and answers
/// with a small XML body containing `<response_code>Success</response_code>`
/// when the transaction settled.
#[derive(Clone)]
pub struct EsewaGateway {
    client: reqwest::Client,
    verify_url: String,
    merchant_code: String,
}

impl EsewaGateway {
    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_client(Duration::from_secs(config.gateway_timeout_secs))?,
            verify_url: config.esewa_verify_url.clone(),
            merchant_code: config.esewa_merchant_code.clone(),
        })
    }
}

#[async_trait]
impl PaymentGateway for EsewaGateway {
    #[instrument(skip(self))]
    async fn verify(
        &self,
        reference: &str,
        amount: Decimal,
    ) -> Result<GatewayVerification, ServiceError> {
        let params = [
            ("amt", amount.to_string()),
            ("scd", self.merchant_code.clone()),
            ("rid", reference.to_string()),
        ];

        let response = self
            .client
            .post(&self.verify_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                warn!("eSewa verification request failed: {}", e);
                ServiceError::ExternalServiceError("eSewa verification unavailable".to_string())
            })?;

        if !response.status().is_success() {
            return Err(ServiceError::ExternalServiceError(format!(
                "eSewa verification returned HTTP {}",
                response.status()
            )));
        }

        let body = response.text().await.map_err(|e| {
            warn!("eSewa verification body unreadable: {}", e);
            ServiceError::ExternalServiceError("eSewa verification unavailable".to_string())
        })?;

        let verified = body.to_lowercase().contains("success");

        Ok(GatewayVerification {
            verified,
            // The transrec endpoint echoes no amount; the caller pins the
            // callback-supplied amount against the order total instead.
            amount: None,
            reference: reference.to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
struct KhaltiVerifyRequest<'a> {
    token: &'a str,
    amount: i64,
}

#[derive(Debug, Deserialize)]
struct KhaltiVerifyResponse {
    idx: Option<String>,
    amount: Option<i64>,
}

/// Khalti transaction verification client.
///
/// Khalti verifies a checkout token via JSON POST with a `Key` authorization
/// header. Amounts cross the wire in paisa (1 NPR = 100 paisa).
#[derive(Clone)]
pub struct KhaltiGateway {
    client: reqwest::Client,
    verify_url: String,
    secret_key: String,
}

impl KhaltiGateway {
    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_client(Duration::from_secs(config.gateway_timeout_secs))?,
            verify_url: config.khalti_verify_url.clone(),
            secret_key: config.khalti_secret_key.clone().unwrap_or_default(),
        })
    }

    fn to_paisa(amount: Decimal) -> i64 {
        use rust_decimal::prelude::ToPrimitive;
        (amount * Decimal::from(100)).round().to_i64().unwrap_or(0)
    }

    fn from_paisa(paisa: i64) -> Decimal {
        Decimal::from(paisa) / Decimal::from(100)
    }
}

#[async_trait]
impl PaymentGateway for KhaltiGateway {
    #[instrument(skip(self))]
    async fn verify(
        &self,
        reference: &str,
        amount: Decimal,
    ) -> Result<GatewayVerification, ServiceError> {
        let request = KhaltiVerifyRequest {
            token: reference,
            amount: Self::to_paisa(amount),
        };

        let response = self
            .client
            .post(&self.verify_url)
            .header("Authorization", format!("Key {}", self.secret_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!("Khalti verification request failed: {}", e);
                ServiceError::ExternalServiceError("Khalti verification unavailable".to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            // 4xx from Khalti means the token was rejected, not that the
            // gateway is down.
            if status.is_client_error() {
                return Ok(GatewayVerification {
                    verified: false,
                    amount: None,
                    reference: reference.to_string(),
                });
            }
            return Err(ServiceError::ExternalServiceError(format!(
                "Khalti verification returned HTTP {}",
                status
            )));
        }

        let body: KhaltiVerifyResponse = response.json().await.map_err(|e| {
            warn!("Khalti verification body unreadable: {}", e);
            ServiceError::ExternalServiceError("Khalti verification unavailable".to_string())
        })?;

        Ok(GatewayVerification {
            verified: true,
            amount: body.amount.map(Self::from_paisa),
            reference: body.idx.unwrap_or_else(|| reference.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn khalti_paisa_conversion_round_trips() {
        assert_eq!(KhaltiGateway::to_paisa(dec!(20.00)), 2000);
        assert_eq!(KhaltiGateway::from_paisa(2000), dec!(20));
        assert_eq!(KhaltiGateway::to_paisa(dec!(0.50)), 50);
    }
}
