use std::net::{Ipv4Addr, SocketAddr};

use stun::attributes::{ATTR_NONCE, ATTR_REALM, ATTR_USERNAME};

use super::*;
use crate::error::Result;

struct DummyRelayConnObserver {
    turn_server_addr: String,
    username: Username,
    realm: Realm,
}

#[async_trait::async_trait]
impl RelayConnObserver for DummyRelayConnObserver {
    fn turn_server_addr(&self) -> String {
        self.turn_server_addr.clone()
    }

    fn username(&self) -> Username {
        self.username.clone()
    }

    fn realm(&self) -> Realm {
        self.realm.clone()
    }

    async fn write_to(&self, _data: &[u8], _to: &str) -> std::result::Result<usize, util::Error> {
        Ok(0)
    }

    async fn perform_transaction(
        &mut self,
        _msg: &Message,
        _to: &str,
        _ignore_result: bool,
    ) -> Result<crate::client::transaction::TransactionResult> {
        Err(Error::ErrFakeErr)
    }
}

#[tokio::test]
async fn test_connect_propagates_transaction_failure() -> Result<()> {
    let mgr = ConnectionManager::new(
        "127.0.0.1:3478".to_owned(),
        Username::new(ATTR_USERNAME, "alice".to_owned()),
        Realm::new(ATTR_REALM, "test".to_owned()),
        MessageIntegrity::new_short_term_integrity("s3cret".to_owned()),
        Nonce::new(ATTR_NONCE, "abc".to_owned()),
    );

    let mut obs = DummyRelayConnObserver {
        turn_server_addr: "127.0.0.1:3478".to_owned(),
        username: Username::new(ATTR_USERNAME, "alice".to_owned()),
        realm: Realm::new(ATTR_REALM, "test".to_owned()),
    };

    let peer = SocketAddr::new(Ipv4Addr::new(198, 51, 100, 2).into(), 4000);
    let err = mgr.connect(&mut obs, peer).await.unwrap_err();
    assert_eq!(err, Error::ErrFakeErr);

    Ok(())
}

#[tokio::test]
async fn test_contains_tracks_bound_peers() {
    let mgr = ConnectionManager::new(
        "127.0.0.1:3478".to_owned(),
        Username::new(ATTR_USERNAME, "alice".to_owned()),
        Realm::new(ATTR_REALM, "test".to_owned()),
        MessageIntegrity::new_short_term_integrity("s3cret".to_owned()),
        Nonce::new(ATTR_NONCE, "abc".to_owned()),
    );

    let peer = SocketAddr::new(Ipv4Addr::new(198, 51, 100, 2).into(), 4000);
    assert!(!mgr.contains(&peer).await);
}
