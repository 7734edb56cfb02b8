//! SMTP delivery of rendered quotation documents.
//!
//! Delivery is best-effort: the caller spawns it after a successful
//! create, and every failure ends in a log line, never in an error
//! returned to the API client.

use cotizador_core::config::SmtpConfig;
use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("smtp configuration error: {0}")]
    Configuration(String),
    #[error("invalid address `{address}`: {detail}")]
    InvalidAddress { address: String, detail: String },
    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("failed to send email: {0}")]
    Send(#[from] lettre::transport::smtp::Error),
}

pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl Mailer {
    /// Returns `None` when SMTP is disabled in config.
    pub fn from_config(config: &SmtpConfig) -> Result<Option<Self>, MailerError> {
        if !config.enabled {
            return Ok(None);
        }

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| MailerError::Configuration(format!("smtp relay: {e}")))?
            .port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                password.expose_secret().to_string(),
            ));
        }

        Ok(Some(Self { transport: builder.build(), from_address: config.from_address.clone() }))
    }

    /// Send the rendered quotation to the client. `pdf` carries the
    /// converted bytes when wkhtmltopdf was available; the HTML body is
    /// always included.
    pub async fn send_quotation(
        &self,
        to: &str,
        number: &str,
        html: &str,
        pdf: Option<Vec<u8>>,
    ) -> Result<(), MailerError> {
        let from: Mailbox = self.from_address.parse().map_err(|e| MailerError::InvalidAddress {
            address: self.from_address.clone(),
            detail: format!("{e}"),
        })?;
        let to_mailbox: Mailbox = to.parse().map_err(|e| MailerError::InvalidAddress {
            address: to.to_string(),
            detail: format!("{e}"),
        })?;

        let builder = Message::builder()
            .from(from)
            .to(to_mailbox)
            .subject(format!("Cotización {number}"));

        let html_part =
            SinglePart::builder().header(ContentType::TEXT_HTML).body(html.to_string());

        let message = match pdf {
            Some(bytes) => {
                let attachment = Attachment::new(format!("{number}.pdf"))
                    .body(bytes, "application/pdf".parse().map_err(|_| {
                        MailerError::Configuration("invalid attachment content type".to_string())
                    })?);
                builder.multipart(MultiPart::mixed().singlepart(html_part).singlepart(attachment))?
            }
            None => builder.multipart(MultiPart::mixed().singlepart(html_part))?,
        };

        self.transport.send(message).await?;

        info!(
            event_name = "mail.quotation_sent",
            to = %to,
            quotation_number = %number,
            "quotation email sent"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use cotizador_core::config::SmtpConfig;

    use super::Mailer;

    #[test]
    fn disabled_config_builds_no_mailer() {
        let config = SmtpConfig {
            enabled: false,
            host: "localhost".to_string(),
            port: 587,
            username: None,
            password: None,
            from_address: "cotizaciones@localhost".to_string(),
        };

        let mailer = Mailer::from_config(&config).expect("disabled config should not error");
        assert!(mailer.is_none());
    }

    #[test]
    fn enabled_config_builds_a_transport() {
        let config = SmtpConfig {
            enabled: true,
            host: "mail.example.com".to_string(),
            port: 587,
            username: Some("cotizador".to_string()),
            password: Some("secret".to_string().into()),
            from_address: "cotizaciones@example.com".to_string(),
        };

        let mailer = Mailer::from_config(&config).expect("enabled config should build");
        assert!(mailer.is_some());
    }
}
