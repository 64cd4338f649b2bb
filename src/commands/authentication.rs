use crate::codes::LoginOutcome;
use crate::constants::MAX_FIELD_LEN;
use crate::error::{DHStreamError, Result};
use crate::session::Session;
use async_trait::async_trait;
use tracing::{debug, info};

/// Login parameters. Every string must fit the SDK's fixed-size fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub address: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(
        address: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            port,
            username: username.into(),
            password: password.into(),
        }
    }

    /// Reject values the SDK would otherwise truncate or cut at a NUL.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("address", &self.address),
            ("username", &self.username),
            ("password", &self.password),
        ] {
            if value.len() > MAX_FIELD_LEN {
                return Err(DHStreamError::FieldTooLong {
                    field,
                    max: MAX_FIELD_LEN,
                });
            }
            if value.contains('\0') {
                return Err(DHStreamError::InvalidField(format!(
                    "{field} contains a NUL byte"
                )));
            }
        }
        if self.address.is_empty() {
            return Err(DHStreamError::InvalidField("address is empty".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
pub trait Authentication: Send {
    /// Log in to the device. One attempt, no retry.
    async fn login(&mut self, credentials: &Credentials) -> Result<()>;

    /// Stop any running stream, then log out. The session stays usable.
    fn logout(&mut self);

    fn is_authenticated(&self) -> bool;
}

#[async_trait]
impl Authentication for Session {
    async fn login(&mut self, credentials: &Credentials) -> Result<()> {
        self.ensure_active()?;
        if self.login_handle.is_some() {
            return Err(DHStreamError::AlreadyAuthenticated);
        }
        credentials.validate()?;

        let transport = self.transport.clone();
        let request = credentials.clone();
        // The last error is thread local in the SDK, query it on the login thread.
        let (handle, outcome) = tokio::task::spawn_blocking(move || {
            let reply = transport.login(&request);
            match reply.handle {
                Some(handle) => (Some(handle), LoginOutcome::success()),
                None => (
                    None,
                    LoginOutcome::from_reply(reply.error_code, || transport.last_error()),
                ),
            }
        })
        .await?;

        let Some(handle) = handle else {
            debug!(
                address = %credentials.address,
                port = credentials.port,
                code = outcome.error_code,
                last_error = ?outcome.last_error,
                "login rejected"
            );
            return Err(DHStreamError::Login(outcome));
        };

        info!(
            address = %credentials.address,
            port = credentials.port,
            handle = %handle,
            "logged in"
        );
        self.login_handle = Some(handle);
        Ok(())
    }

    fn logout(&mut self) {
        self.release_login();
    }

    fn is_authenticated(&self) -> bool {
        self.login_handle.is_some()
    }
}
