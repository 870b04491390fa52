use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::SmtpConfig;

/// Outbound mail channel. Callers treat a send failure as a signal to roll
/// back whatever state the message was meant to deliver (see the
/// forgot-password flow).
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// SMTPS relay transport (implicit TLS on port 465).
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)
            .context("smtp relay config")?
            .credentials(Credentials::new(cfg.username.clone(), cfg.password.clone()))
            .build();
        let from: Mailbox = cfg.from.parse().context("parse sender address")?;
        Ok(Self { transport, from })
    }
}

fn build_message(from: &Mailbox, to: &str, subject: &str, body: &str) -> anyhow::Result<Message> {
    let to: Mailbox = to.parse().context("parse recipient address")?;
    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())
        .context("build email")
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        let message = build_message(&self.from, to, subject, body)?;
        self.transport.send(message).await.context("smtp send")?;
        tracing::info!(%to, "email sent");
        Ok(())
    }
}
