/// Outbound mail for sheets
///
/// Delivery goes through an EmailJS-compatible REST endpoint: one JSON POST
/// per message, the attachment travelling base64-encoded inside the template
/// parameters. Success means the endpoint acknowledged the request, nothing more.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info};

use super::document::NamedFile;
use crate::config::MailConfig;
use crate::state::data::ValveRecord;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("correo no configurado")]
    NotConfigured,
    #[error("sin conexión: {0}")]
    Network(String),
    #[error("el servidor de correo respondió {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachment: Option<NamedFile>,
    /// Extra template parameters (the sheet's fields)
    pub params: Value,
}

impl OutgoingMail {
    /// Mail for one sheet with its PDF attached
    pub fn for_record(to: &str, record: &ValveRecord, pdf: Option<NamedFile>) -> Self {
        let mut params = serde_json::to_value(record).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut params {
            // Photos already go inside the PDF
            map.remove("foto");
            map.remove("fotoPlaca");
        }

        Self {
            to: to.to_string(),
            subject: format!("Hoja de vida válvula {}", record.serial_number),
            body: format!(
                "Cliente: {}\nSerie: {}\nTAG: {}\nUbicación: {}\nFecha: {}",
                record.client, record.serial_number, record.tag, record.location, record.date
            ),
            attachment: pdf,
            params,
        }
    }
}

/// Something that can deliver an `OutgoingMail`
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), TransportError>;

    /// Host used by the connectivity probe, if any
    fn probe_host(&self) -> Option<String> {
        None
    }
}

/// Used when no mail settings are present. Every send fails, so sheets stay queued.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredTransport;

#[async_trait]
impl MailTransport for UnconfiguredTransport {
    async fn send(&self, _mail: &OutgoingMail) -> Result<(), TransportError> {
        Err(TransportError::NotConfigured)
    }
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    template_params: Value,
}

/// EmailJS-style HTTP transport
#[derive(Debug, Clone)]
pub struct HttpMailTransport {
    client: reqwest::Client,
    config: MailConfig,
}

impl HttpMailTransport {
    pub fn new(config: MailConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    #[cfg(test)]
    fn with_client(config: MailConfig, client: reqwest::Client) -> Self {
        Self { client, config }
    }

    fn template_params(mail: &OutgoingMail) -> Value {
        let mut params = json!({
            "to_email": mail.to,
            "subject": mail.subject,
            "message": mail.body,
        });
        if let (Value::Object(target), Value::Object(extra)) = (&mut params, &mail.params) {
            for (key, value) in extra {
                target.entry(key.clone()).or_insert_with(|| value.clone());
            }
            if let Some(file) = &mail.attachment {
                target.insert("attachment".to_string(), Value::String(BASE64.encode(&file.bytes)));
                target.insert("attachment_name".to_string(), Value::String(file.name.clone()));
            }
        }
        params
    }
}

#[async_trait]
impl MailTransport for HttpMailTransport {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), TransportError> {
        let request = SendRequest {
            service_id: &self.config.service_id,
            template_id: &self.config.template_id,
            user_id: &self.config.public_key,
            template_params: Self::template_params(mail),
        };

        debug!("✉️  Posting mail '{}' to {}", mail.subject, self.config.endpoint);

        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!("✅ Mail '{}' accepted", mail.subject);
        Ok(())
    }

    fn probe_host(&self) -> Option<String> {
        let url = reqwest::Url::parse(&self.config.endpoint).ok()?;
        let host = url.host_str()?;
        let port = url.port_or_known_default()?;
        Some(format!("{}:{}", host, port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::sample_record;

    fn config() -> MailConfig {
        MailConfig {
            endpoint: "https://api.emailjs.com/api/v1.0/email/send".to_string(),
            service_id: "svc".to_string(),
            template_id: "tpl".to_string(),
            public_key: "key".to_string(),
            to: "taller@example.com".to_string(),
        }
    }

    #[test]
    fn test_mail_for_record() {
        let mut record = sample_record("SN-100");
        record.photo_valve = Some(crate::photo::test_photo(4, 4));
        let pdf = NamedFile {
            name: "Valvula_SN-100.pdf".to_string(),
            mime: "application/pdf",
            bytes: b"%PDF".to_vec(),
        };

        let mail = OutgoingMail::for_record("taller@example.com", &record, Some(pdf));

        assert_eq!(mail.subject, "Hoja de vida válvula SN-100");
        assert!(mail.body.contains("Cliente: Acme"));
        assert_eq!(mail.params["serie"], "SN-100");
        assert!(mail.params.get("foto").is_none());
    }

    #[test]
    fn test_template_params_carry_base64_attachment() {
        let record = sample_record("SN-1");
        let pdf = NamedFile {
            name: "Valvula_SN-1.pdf".to_string(),
            mime: "application/pdf",
            bytes: b"%PDF".to_vec(),
        };
        let mail = OutgoingMail::for_record("taller@example.com", &record, Some(pdf));

        let params = HttpMailTransport::template_params(&mail);

        assert_eq!(params["to_email"], "taller@example.com");
        assert_eq!(params["attachment"], "JVBERg==");
        assert_eq!(params["attachment_name"], "Valvula_SN-1.pdf");
        assert_eq!(params["cliente"], "Acme");
    }

    #[test]
    fn test_probe_host_from_endpoint() {
        let transport = HttpMailTransport::new(config());
        assert_eq!(
            transport.probe_host().as_deref(),
            Some("api.emailjs.com:443")
        );
    }

    #[tokio::test]
    async fn test_unconfigured_transport_fails() {
        let mail = OutgoingMail::for_record("x@example.com", &sample_record("SN-1"), None);
        assert_eq!(
            UnconfiguredTransport.send(&mail).await,
            Err(TransportError::NotConfigured)
        );
    }

    /// Answers one HTTP request with `status_line` and returns the request body
    async fn serve_once(status_line: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/api/v1.0/email/send", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|l| {
                            l.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
            }

            let body = "quota exceeded";
            let response = format!(
                "{}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();

            let text = String::from_utf8_lossy(&request).to_string();
            text.split("\r\n\r\n").nth(1).unwrap_or_default().to_string()
        });

        (endpoint, server)
    }

    fn transport(endpoint: String) -> HttpMailTransport {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        HttpMailTransport::with_client(MailConfig { endpoint, ..config() }, client)
    }

    #[tokio::test]
    async fn test_server_error_is_rejected() {
        let (endpoint, server) = serve_once("HTTP/1.1 500 Internal Server Error").await;
        let mail = OutgoingMail::for_record("taller@example.com", &sample_record("SN-1"), None);

        let result = transport(endpoint).send(&mail).await;

        assert_eq!(
            result,
            Err(TransportError::Rejected {
                status: 500,
                body: "quota exceeded".to_string(),
            })
        );
        let body: Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(body["service_id"], "svc");
        assert_eq!(body["template_params"]["serie"], "SN-1");
    }

    #[tokio::test]
    async fn test_accepted_request() {
        let (endpoint, server) = serve_once("HTTP/1.1 200 OK").await;
        let mail = OutgoingMail::for_record("taller@example.com", &sample_record("SN-1"), None);

        assert_eq!(transport(endpoint).send(&mail).await, Ok(()));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/send", listener.local_addr().unwrap());
        drop(listener);
        let mail = OutgoingMail::for_record("taller@example.com", &sample_record("SN-1"), None);

        let result = transport(endpoint).send(&mail).await;

        assert!(matches!(result, Err(TransportError::Network(_))));
    }
}
