use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Certificate, Client};

use crate::config::GatewayConfig;
use crate::gateway::{GatewayError, GatewayReply, GatewayRequest, PaymentGateway};

/// Posts payment requests to the hosted gateway over TLS.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    url: String,
}

impl HttpGateway {
    /// Builds the client. With a certificate bundle configured, only the
    /// certificates in that bundle are trusted.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let mut builder = Client::builder().timeout(config.timeout);

        if let Some(path) = &config.cert_bundle {
            let pem = std::fs::read(path).map_err(|e| {
                GatewayError::Certificate(format!("{}: {}", path.display(), e))
            })?;
            let certificates = Certificate::from_pem_bundle(&pem)
                .map_err(|e| GatewayError::Certificate(format!("{}: {}", path.display(), e)))?;
            if certificates.is_empty() {
                return Err(GatewayError::Certificate(format!(
                    "{}: no certificates found",
                    path.display()
                )));
            }

            builder = builder.tls_built_in_root_certs(false);
            for certificate in certificates {
                builder = builder.add_root_certificate(certificate);
            }
            tracing::info!(
                bundle = %path.display(),
                "Payment gateway pinned to certificate bundle"
            );
        }

        Ok(Self {
            client: builder.build()?,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn submit(&self, request: &GatewayRequest) -> Result<GatewayReply, GatewayError> {
        let response = self
            .client
            .post(&self.url)
            .form(request.fields())
            .send()
            .await?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        if status >= 400 {
            tracing::warn!(status, "Payment gateway answered with an error status");
        }

        Ok(GatewayReply {
            status,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn config(cert_bundle: Option<PathBuf>) -> GatewayConfig {
        GatewayConfig {
            url: "https://pay.example.edu/checkout".to_string(),
            merchant_id: "LM-42".to_string(),
            title: String::new(),
            description: String::new(),
            contact_info: String::new(),
            speedtype: String::new(),
            account_number: String::new(),
            cert_bundle,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_client_without_bundle() {
        assert!(HttpGateway::from_config(&config(None)).is_ok());
    }

    #[test]
    fn test_missing_bundle_is_an_error() {
        let err = HttpGateway::from_config(&config(Some(PathBuf::from(
            "/nonexistent/gateway-bundle.pem",
        ))))
        .unwrap_err();
        assert!(matches!(err, GatewayError::Certificate(_)));
    }
}
