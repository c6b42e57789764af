//! Service wiring: chooses store and email implementations once, at startup.

use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use notas_auth::{
    AccountService, AuthService, ConsoleEmailSender, CredentialStore, EmailSender,
    IdentityResolver, InMemoryCredentialStore, PasswordHasher, RetryingEmailSender, TokenCodec,
};
use notas_infra::{
    AppConfig, EmailProvider, PostgresCredentialStore, PostgresNoteStore, ResendEmailSender,
};
use notas_notes::{InMemoryNoteStore, NoteService, NoteStore};

#[derive(Clone)]
pub struct AppServices {
    pub auth: AuthService,
    pub accounts: AccountService,
    pub notes: NoteService,
    pub resolver: IdentityResolver,
}

impl AppServices {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        note_store: Arc<dyn NoteStore>,
        codec: Arc<TokenCodec>,
        hasher: Arc<PasswordHasher>,
        email: Arc<dyn EmailSender>,
    ) -> Self {
        let notes = NoteService::new(note_store);
        let accounts = AccountService::new(credentials.clone(), hasher.clone())
            .with_cleanup(Arc::new(notes.clone()));

        Self {
            auth: AuthService::new(credentials.clone(), hasher, codec.clone(), email),
            accounts,
            notes,
            resolver: IdentityResolver::new(codec, credentials),
        }
    }

    /// Process-local stores; state is lost on restart.
    pub fn in_memory(codec: TokenCodec, hasher: PasswordHasher, email: Arc<dyn EmailSender>) -> Self {
        Self::new(
            Arc::new(InMemoryCredentialStore::new()),
            Arc::new(InMemoryNoteStore::new()),
            Arc::new(codec),
            Arc::new(hasher),
            email,
        )
    }

    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let codec = Arc::new(config.token_codec()?);
        let hasher = Arc::new(config.password_hasher()?);

        let email: Arc<dyn EmailSender> = match config.email_provider {
            EmailProvider::Console => {
                tracing::warn!("using console email sender; links are logged, not mailed");
                Arc::new(ConsoleEmailSender::new(config.base_url.clone()))
            }
            EmailProvider::Resend => {
                let sender = ResendEmailSender::new(
                    config.resend_api_key.clone().unwrap_or_default(),
                    config.email_from.as_deref().unwrap_or_default(),
                    &config.email_from_name,
                    config.base_url.clone(),
                );
                Arc::new(RetryingEmailSender::new(sender, config.retry_policy()))
            }
        };

        let (credentials, note_store): (Arc<dyn CredentialStore>, Arc<dyn NoteStore>) =
            match &config.database_url {
                Some(url) => {
                    let pool = PgPoolOptions::new()
                        .max_connections(10)
                        .connect(url)
                        .await
                        .context("failed to connect to database")?;
                    tracing::info!("using postgres stores");
                    (
                        Arc::new(PostgresCredentialStore::new(pool.clone())),
                        Arc::new(PostgresNoteStore::new(pool)),
                    )
                }
                None => {
                    tracing::warn!("NOTAS_DATABASE_URL not set; using in-memory stores");
                    (
                        Arc::new(InMemoryCredentialStore::new()),
                        Arc::new(InMemoryNoteStore::new()),
                    )
                }
            };

        Ok(Self::new(credentials, note_store, codec, hasher, email))
    }

    /// Provision the configured administrator if it does not exist yet.
    pub async fn bootstrap_admin(&self, config: &AppConfig) -> anyhow::Result<()> {
        let Some((email, password)) = config.admin_credentials() else {
            return Ok(());
        };
        if self
            .accounts
            .ensure_admin(email, password)
            .await
            .context("failed to provision bootstrap administrator")?
        {
            tracing::info!(email = %email, "bootstrap administrator created");
        }
        Ok(())
    }
}
