//! SSH sessions on top of thrussh, authenticated with a password.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{
    BoxedError, CommandOutput, Credentials, Port, RemoteSession, SessionError, SessionProvider,
};
use crate::log::*;

type SshHandle = thrussh::client::Handle<TrustingClient>;

/// Opens password-authenticated SSH sessions. Server host keys are always
/// trusted.
#[derive(Clone)]
pub struct SshSessionProvider {
    config: Arc<thrussh::client::Config>,
    connect_timeout: Option<Duration>,
}

impl SshSessionProvider {
    pub fn new() -> Self {
        Self {
            config: Arc::new(thrussh::client::Config::default()),
            connect_timeout: None,
        }
    }

    /// Bound the connect + handshake step. Without this the transport's own
    /// behaviour applies.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }
}

impl Default for SshSessionProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SshSessionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshSessionProvider")
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

fn transport(err: impl std::fmt::Display) -> BoxedError {
    err.to_string().into()
}

#[async_trait]
impl SessionProvider for SshSessionProvider {
    type Session = SshSession;

    #[tracing::instrument(skip(self, credentials))]
    async fn open(
        &self,
        host: &str,
        port: Port,
        credentials: &Credentials,
    ) -> Result<SshSession, SessionError> {
        debug!("connecting to {}:{}", host, port);
        let connect = thrussh::client::connect(self.config.clone(), (host, port), TrustingClient);
        let connected = match self.connect_timeout {
            Some(after) => tokio::time::timeout(after, connect).await.map_err(|_| {
                SessionError::Timeout {
                    host: host.to_string(),
                    port,
                    after,
                }
            })?,
            None => connect.await,
        };
        let mut handle = connected.map_err(|err| SessionError::Connect {
            host: host.to_string(),
            port,
            source: transport(err),
        })?;

        let authenticated = handle
            .authenticate_password(credentials.username().as_str(), credentials.password().as_str())
            .await
            .map_err(|err| SessionError::Connect {
                host: host.to_string(),
                port,
                source: transport(err),
            })?;
        if !authenticated {
            return Err(SessionError::AuthenticationRejected {
                host: host.to_string(),
                username: credentials.username().clone(),
            });
        }
        debug!("authenticated to {} as {}", host, credentials.username());

        Ok(SshSession {
            host: host.to_string(),
            handle: Some(handle),
        })
    }
}

/// A live, authenticated SSH connection. Each command gets its own channel.
pub struct SshSession {
    host: String,
    handle: Option<SshHandle>,
}

impl SshSession {
    pub fn host(&self) -> &str {
        &self.host
    }

    fn execute_error(&self, err: impl std::fmt::Display) -> SessionError {
        SessionError::Execute {
            host: self.host.clone(),
            source: transport(err),
        }
    }
}

impl std::fmt::Debug for SshSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshSession")
            .field("host", &self.host)
            .field("open", &self.handle.is_some())
            .finish()
    }
}

#[async_trait]
impl RemoteSession for SshSession {
    /// thrussh only hands out a handle once the handshake and authentication
    /// have both succeeded, so a freshly opened session is always ready. It
    /// stops being ready once closed, or once the transport drops out from
    /// under a command.
    fn is_ready(&self) -> bool {
        self.handle.is_some()
    }

    #[tracing::instrument(skip(self), fields(host = %self.host))]
    async fn execute(&mut self, command: &str) -> Result<CommandOutput, SessionError> {
        let host = self.host.clone();
        let handle = self
            .handle
            .as_mut()
            .ok_or(SessionError::Closed { host: host.clone() })?;

        debug!("awaiting channel session open...");
        let mut channel = match handle.channel_open_session().await {
            Ok(channel) => channel,
            Err(err) => {
                if matches!(err, thrussh::Error::Disconnect | thrussh::Error::SendError) {
                    self.handle = None;
                }
                return Err(self.execute_error(err));
            }
        };
        channel
            .exec(true, command)
            .await
            .map_err(|err| self.execute_error(err))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_status = None;
        while let Some(frame) = channel.wait().await {
            match frame {
                thrussh::ChannelMsg::Data { data } => stdout.extend_from_slice(&data[..]),
                thrussh::ChannelMsg::ExtendedData { data, ext: _ } => {
                    stderr.extend_from_slice(&data[..])
                }
                thrussh::ChannelMsg::ExitStatus { exit_status: status } => {
                    exit_status = Some(status)
                }
                thrussh::ChannelMsg::Close => break,
                _ => {}
            }
        }
        debug!("command '{}' on {} finished: {:?}", command, host, exit_status);

        let output = CommandOutput::new(String::from_utf8_lossy(&stdout))
            .with_stderr(String::from_utf8_lossy(&stderr));
        Ok(match exit_status {
            Some(status) => output.with_exit_status(status),
            None => output,
        })
    }

    #[tracing::instrument(skip(self), fields(host = %self.host))]
    async fn close(&mut self) -> Result<(), SessionError> {
        let Some(mut handle) = self.handle.take() else {
            return Ok(());
        };
        handle
            .disconnect(thrussh::Disconnect::ByApplication, "", "English")
            .await
            .map_err(|err| self.execute_error(err))
    }
}

/// Client handler that accepts every server key it is shown.
struct TrustingClient;

impl thrussh::client::Handler for TrustingClient {
    type Error = thrussh::Error;
    type FutureUnit = futures::future::Ready<Result<(Self, thrussh::client::Session), Self::Error>>;
    type FutureBool = futures::future::Ready<Result<(Self, bool), Self::Error>>;

    fn finished_bool(self, b: bool) -> Self::FutureBool {
        futures::future::ready(Ok((self, b)))
    }

    fn finished(self, session: thrussh::client::Session) -> Self::FutureUnit {
        futures::future::ready(Ok((self, session)))
    }

    fn check_server_key(self, server_public_key: &thrussh_keys::key::PublicKey) -> Self::FutureBool {
        debug!("trusting server key {}", server_public_key.fingerprint());
        self.finished_bool(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_that_connect_timeout_is_opt_in() {
        let provider = SshSessionProvider::new();
        assert_eq!(None, provider.connect_timeout());
        let provider = provider.with_connect_timeout(Duration::from_secs(5));
        assert_eq!(Some(Duration::from_secs(5)), provider.connect_timeout());
    }

    #[tokio::test]
    async fn test_that_a_closed_session_is_not_ready() {
        let mut session = SshSession {
            host: "ap-lobby".into(),
            handle: None,
        };
        assert!(!session.is_ready());
        assert!(matches!(
            session.execute("reboot").await,
            Err(SessionError::Closed { host }) if host == "ap-lobby"
        ));
        assert!(session.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_that_unreachable_hosts_fail_to_open() {
        // Port 1 on localhost is reserved and almost never listening.
        let provider = SshSessionProvider::new().with_connect_timeout(Duration::from_secs(5));
        let credentials = Credentials::new("ubnt", "ubnt");
        let result = provider.open("127.0.0.1", 1, &credentials).await;
        assert!(matches!(
            result,
            Err(SessionError::Connect { .. }) | Err(SessionError::Timeout { .. })
        ));
    }
}
