use std::sync::Arc;

use tokio::time::Duration;
use util::Conn;

use crate::auth::AuthHandler;
use crate::error::*;
use crate::relay::RelayAddressGenerator;

/// `ConnConfig` describes a single listener the server reads packets from.
/// For UDP sockets one listener handles every client; a server accepting
/// TURN-over-TCP control connections instead adds one `ConnConfig` per
/// accepted `TcpConn` as connections arrive.
pub struct ConnConfig {
    /// Socket this listener reads incoming TURN traffic from.
    pub conn: Arc<dyn Conn + Send + Sync>,

    /// Used to allocate a relayed transport address whenever a client on
    /// this listener successfully Allocates.
    pub relay_addr_generator: Box<dyn RelayAddressGenerator + Send + Sync>,
}

impl ConnConfig {
    pub fn validate(&self) -> Result<()> {
        self.relay_addr_generator.validate()
    }
}

/// `ServerConfig` is a bag of config parameters for [`super::Server`].
pub struct ServerConfig {
    /// Every listener the server reads packets from.
    pub conn_configs: Vec<ConnConfig>,

    /// Realm advertised to clients in 401/438 challenges and used to
    /// compute the long-term credential key.
    pub realm: String,

    /// Validates a client's long-term credentials and returns its key.
    pub auth_handler: Arc<dyn AuthHandler + Send + Sync>,

    /// Lifetime of a channel binding. Defaults to 10 minutes per RFC 5766
    /// Section 11 if left at `Duration::ZERO`.
    pub channel_bind_timeout: Duration,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.conn_configs.is_empty() {
            return Err(Error::ErrNoAvailableConns);
        }

        for cc in &self.conn_configs {
            cc.validate()?;
        }
        Ok(())
    }
}
