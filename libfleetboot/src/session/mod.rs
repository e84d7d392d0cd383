//! The remote session capability consumed by the batch runner. A
//! [`SessionProvider`] opens one [`RemoteSession`] per host; the runner never
//! looks past these traits, so transports can be swapped (or scripted in
//! tests) without touching the batch logic.

use std::time::Duration;

use async_trait::async_trait;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod ssh;

pub type Port = u16;

pub fn default_ssh_port() -> Port {
    22
}

/// A boxed transport-level failure, so providers can surface whatever error
/// type their library uses.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The single administrative credential used against every host in a batch.
#[derive(Getters, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    username: String,
    #[serde(skip_serializing, default)]
    password: String,
}

impl Credentials {
    pub fn new<U: Into<String>, P: Into<String>>(username: U, password: P) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// What a remote command left behind. `text` is standard output and is what
/// outcome classification looks at.
#[derive(Getters, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    text: String,
    stderr: String,
    exit_status: Option<u32>,
}

impl CommandOutput {
    pub fn new<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_stderr<S: Into<String>>(mut self, stderr: S) -> Self {
        self.stderr = stderr.into();
        self
    }

    pub fn with_exit_status(mut self, exit_status: u32) -> Self {
        self.exit_status = Some(exit_status);
        self
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("could not connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: Port,
        #[source]
        source: BoxedError,
    },
    #[error("connecting to {host}:{port} timed out after {after:?}")]
    Timeout {
        host: String,
        port: Port,
        after: Duration,
    },
    #[error("{host} rejected credentials for user `{username}`")]
    AuthenticationRejected { host: String, username: String },
    #[error("executing command on {host} failed: {source}")]
    Execute {
        host: String,
        #[source]
        source: BoxedError,
    },
    #[error("session to {host} is already closed")]
    Closed { host: String },
}

/// Opens sessions to single hosts. Any host-key trust prompt the transport
/// may have is answered with "trust" by the provider itself.
#[async_trait]
pub trait SessionProvider: std::fmt::Debug + Send + Sync {
    type Session: RemoteSession;

    async fn open(
        &self,
        host: &str,
        port: Port,
        credentials: &Credentials,
    ) -> Result<Self::Session, SessionError>;
}

/// One live session to one host. Dropping a session releases it; `close` is
/// the explicit, idempotent way to do the same and report failures.
#[async_trait]
pub trait RemoteSession: std::fmt::Debug + Send {
    /// Whether the session can run commands right now.
    fn is_ready(&self) -> bool;

    async fn execute(&mut self, command: &str) -> Result<CommandOutput, SessionError>;

    async fn close(&mut self) -> Result<(), SessionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_that_credentials_debug_hides_the_password() {
        let credentials = Credentials::new("ubnt", "hunter2");
        let debug = format!("{:?}", credentials);
        assert!(debug.contains("ubnt"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_that_session_errors_name_the_host() {
        let err = SessionError::Connect {
            host: "10.0.0.1".into(),
            port: 22,
            source: Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )),
        };
        assert_eq!(
            "could not connect to 10.0.0.1:22: connection refused",
            err.to_string()
        );
    }
}
