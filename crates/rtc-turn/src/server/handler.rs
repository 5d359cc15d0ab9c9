use std::net::SocketAddr;
use std::sync::Arc;

use stun::attributes::*;
use stun::error_code::*;
use stun::fingerprint::*;
use stun::message::*;
use stun::uattrs::*;
use stun::xoraddr::*;

use super::util::*;
use super::Request;
use crate::allocation::channel_bind::ChannelBind;
use crate::allocation::five_tuple::*;
use crate::allocation::permission::Permission;
use crate::error::*;
use crate::proto::chandata::ChannelData;
use crate::proto::channum::ChannelNumber;
use crate::proto::connid::ConnectionId;
use crate::proto::data::Data;
use crate::proto::evenport::EvenPort;
use crate::proto::lifetime::*;
use crate::proto::peeraddr::PeerAddress;
use crate::proto::relayaddr::RelayedAddress;
use crate::proto::reqtrans::RequestedTransport;
use crate::proto::rsrvtoken::ReservationToken;
use crate::proto::{PROTO_TCP, PROTO_UDP};

impl Request {
    pub(crate) async fn handle_binding_request(&mut self, m: &Message) -> Result<()> {
        log::debug!("received BindingRequest from {}", self.src_addr);

        let (ip, port) = (self.src_addr.ip(), self.src_addr.port());

        let attrs = build_msg(
            m.transaction_id,
            MessageType::new(METHOD_BINDING, CLASS_SUCCESS_RESPONSE),
            vec![Box::new(XorMappedAddress { ip, port }), Box::new(FINGERPRINT)],
        );

        build_and_send(&self.conn, self.src_addr, &attrs).await
    }

    // https://tools.ietf.org/html/rfc5766#section-6.2
    pub(crate) async fn handle_allocate_request(&mut self, m: &Message) -> Result<()> {
        log::debug!("received AllocateRequest from {}", self.src_addr);

        let message_integrity = self.authenticate_request(m, METHOD_ALLOCATE).await?;
        let username = match &message_integrity {
            Some((_, username)) => username.clone(),
            None => return Ok(()), // challenge/error already sent
        };

        let five_tuple = FiveTuple {
            src_addr: self.src_addr,
            dst_addr: self.conn.local_addr().await?,
            protocol: PROTO_UDP,
        };
        let mut requested_port = 0;
        let mut reservation_token = String::new();

        let bad_request_msg = build_msg(
            m.transaction_id,
            MessageType::new(METHOD_ALLOCATE, CLASS_ERROR_RESPONSE),
            vec![Box::new(ErrorCodeAttribute {
                code: CODE_BAD_REQUEST,
                reason: vec![],
            })],
        );
        let insufficient_capacity_msg = build_msg(
            m.transaction_id,
            MessageType::new(METHOD_ALLOCATE, CLASS_ERROR_RESPONSE),
            vec![Box::new(ErrorCodeAttribute {
                code: CODE_INSUFFICIENT_CAPACITY,
                reason: vec![],
            })],
        );

        // 2. reject if the 5-tuple is already allocated.
        if self
            .allocation_manager
            .get_allocation(&five_tuple)
            .await
            .is_some()
        {
            let msg = build_msg(
                m.transaction_id,
                MessageType::new(METHOD_ALLOCATE, CLASS_ERROR_RESPONSE),
                vec![Box::new(ErrorCodeAttribute {
                    code: CODE_ALLOC_MISMATCH,
                    reason: vec![],
                })],
            );
            return build_and_send_err(&self.conn, self.src_addr, Error::ErrAllocationMismatch, &msg)
                .await;
        }

        // 3. REQUESTED-TRANSPORT must be present and UDP or (RFC 6062) TCP.
        let mut requested_transport = RequestedTransport::default();
        if let Err(err) = requested_transport.get_from(m) {
            return build_and_send_err(&self.conn, self.src_addr, err.into(), &bad_request_msg).await;
        }
        if requested_transport.is_supported().is_err() {
            let msg = build_msg(
                m.transaction_id,
                MessageType::new(METHOD_ALLOCATE, CLASS_ERROR_RESPONSE),
                vec![Box::new(ErrorCodeAttribute {
                    code: CODE_UNSUPPORTED_TRANS_PROTO,
                    reason: vec![],
                })],
            );
            return build_and_send_err(
                &self.conn,
                self.src_addr,
                Error::ErrUnsupportedTransportProtocol,
                &msg,
            )
            .await;
        }

        if requested_transport.protocol == PROTO_TCP {
            return self
                .handle_allocate_tcp_request(m, five_tuple, username, &bad_request_msg)
                .await;
        }

        // 4. DONT-FRAGMENT is not supported.
        if m.contains(ATTR_DONT_FRAGMENT) {
            let msg = build_msg(
                m.transaction_id,
                MessageType::new(METHOD_ALLOCATE, CLASS_ERROR_RESPONSE),
                vec![
                    Box::new(ErrorCodeAttribute {
                        code: CODE_UNKNOWN_ATTRIBUTE,
                        reason: vec![],
                    }),
                    Box::new(UnknownAttributes(vec![ATTR_DONT_FRAGMENT])),
                ],
            );
            return build_and_send_err(
                &self.conn,
                self.src_addr,
                Error::ErrNoDontFragmentSupport,
                &msg,
            )
            .await;
        }

        // 5. RESERVATION-TOKEN and EVEN-PORT are mutually exclusive.
        let mut reservation_token_attr = ReservationToken::default();
        if reservation_token_attr.get_from(m).is_ok() {
            let mut even_port = EvenPort::default();
            if even_port.get_from(m).is_ok() {
                return build_and_send_err(
                    &self.conn,
                    self.src_addr,
                    Error::ErrRequestWithReservationTokenAndEvenPort,
                    &bad_request_msg,
                )
                .await;
            }
        }

        // 6. EVEN-PORT: reserve the next port up for a later allocation.
        let mut even_port = EvenPort::default();
        if even_port.get_from(m).is_ok() {
            let mut random_port = 1;
            while random_port % 2 != 0 {
                random_port = match self.allocation_manager.get_random_even_port().await {
                    Ok(port) => port,
                    Err(err) => {
                        return build_and_send_err(
                            &self.conn,
                            self.src_addr,
                            err,
                            &insufficient_capacity_msg,
                        )
                        .await
                    }
                };
            }
            requested_port = random_port;
            reservation_token = rand_seq(8);
        }

        let lifetime_duration = allocation_lifetime(m);
        let a = match self
            .allocation_manager
            .create_allocation(
                five_tuple,
                Arc::clone(&self.conn),
                requested_port,
                lifetime_duration,
                username,
                self.src_addr.is_ipv4(),
            )
            .await
        {
            Ok(a) => a,
            Err(err) => {
                return build_and_send_err(
                    &self.conn,
                    self.src_addr,
                    err,
                    &insufficient_capacity_msg,
                )
                .await
            }
        };

        let (src_ip, src_port) = (self.src_addr.ip(), self.src_addr.port());
        let (relay_ip, relay_port) = (a.relay_addr.ip(), a.relay_addr.port());

        let mut response_attrs: Vec<Box<dyn Setter>> = vec![
            Box::new(RelayedAddress {
                ip: relay_ip,
                port: relay_port,
            }),
            Box::new(Lifetime(lifetime_duration)),
            Box::new(XorMappedAddress {
                ip: src_ip,
                port: src_port,
            }),
        ];

        if !reservation_token.is_empty() {
            self.allocation_manager
                .create_reservation(reservation_token.clone(), relay_port)
                .await;
            response_attrs.push(Box::new(ReservationToken(reservation_token.into_bytes())));
        }

        response_attrs.push(Box::new(message_integrity.1_as_setter()));
        let msg = build_msg(
            m.transaction_id,
            MessageType::new(METHOD_ALLOCATE, CLASS_SUCCESS_RESPONSE),
            response_attrs,
        );

        build_and_send(&self.conn, self.src_addr, &msg).await
    }

    /// RFC 6062 Allocate handling for `REQUESTED-TRANSPORT=TCP`: binds a
    /// relay `TcpListener` instead of a UDP socket. Peers connect to it
    /// directly; the server pairs each with a client-initiated
    /// `ConnectionBind` (see [`Self::handle_connect_request`] and
    /// [`super::Server::spawn_tcp_connection_attempt_notifier`]).
    async fn handle_allocate_tcp_request(
        &mut self,
        m: &Message,
        five_tuple: FiveTuple,
        username: stun::textattrs::Username,
        bad_request_msg: &[Box<dyn Setter>],
    ) -> Result<()> {
        if m.contains(ATTR_EVEN_PORT) || m.contains(ATTR_RESERVATION_TOKEN) {
            // Even/odd port pairing only applies to UDP relays.
            return build_and_send_err(
                &self.conn,
                self.src_addr,
                Error::ErrUnsupportedTransportProtocol,
                bad_request_msg,
            )
            .await;
        }

        let lifetime_duration = allocation_lifetime(m);
        let turn_socket = Arc::clone(&self.conn);
        let notifier = self.tcp_connection_attempt_notifier.clone();

        let alloc = match self
            .allocation_manager
            .create_tcp_allocation(
                five_tuple,
                turn_socket,
                0,
                username,
                self.src_addr.is_ipv4(),
                move |alloc, id, peer_addr| {
                    let notifier = notifier.clone();
                    async move { notifier(alloc, id, peer_addr).await }
                },
            )
            .await
        {
            Ok(a) => a,
            Err(err) => {
                let msg = build_msg(
                    m.transaction_id,
                    MessageType::new(METHOD_ALLOCATE, CLASS_ERROR_RESPONSE),
                    vec![Box::new(ErrorCodeAttribute {
                        code: CODE_INSUFFICIENT_CAPACITY,
                        reason: vec![],
                    })],
                );
                return build_and_send_err(&self.conn, self.src_addr, err, &msg).await;
            }
        };

        let (src_ip, src_port) = (self.src_addr.ip(), self.src_addr.port());
        let msg = build_msg(
            m.transaction_id,
            MessageType::new(METHOD_ALLOCATE, CLASS_SUCCESS_RESPONSE),
            vec![
                Box::new(RelayedAddress {
                    ip: alloc.relay_addr.ip(),
                    port: alloc.relay_addr.port(),
                }),
                Box::new(Lifetime(lifetime_duration)),
                Box::new(XorMappedAddress {
                    ip: src_ip,
                    port: src_port,
                }),
            ],
        );

        build_and_send(&self.conn, self.src_addr, &msg).await
    }

    pub(crate) async fn handle_refresh_request(&mut self, m: &Message) -> Result<()> {
        log::debug!("received RefreshRequest from {}", self.src_addr);

        let message_integrity = self.authenticate_request(m, METHOD_REFRESH).await?;
        if message_integrity.is_none() {
            return Ok(());
        }

        let lifetime_duration = allocation_lifetime(m);
        let five_tuple = FiveTuple {
            src_addr: self.src_addr,
            dst_addr: self.conn.local_addr().await?,
            protocol: PROTO_UDP,
        };

        if lifetime_duration != Duration::from_secs(0) {
            if let Some(a) = self.allocation_manager.get_allocation(&five_tuple).await {
                a.refresh(lifetime_duration).await;
            } else if let Some(_a) = self.allocation_manager.get_tcp_allocation(&five_tuple).await {
                // TCP allocations have no dedicated expiry timer; refreshing
                // is a no-op beyond acknowledging the request.
            } else {
                return Err(Error::ErrNoAllocationFound);
            }
        } else {
            self.allocation_manager.delete_allocation(&five_tuple).await;
            self.allocation_manager.delete_tcp_allocation(&five_tuple).await;
        }

        build_and_send(
            &self.conn,
            self.src_addr,
            &build_msg(
                m.transaction_id,
                MessageType::new(METHOD_REFRESH, CLASS_SUCCESS_RESPONSE),
                vec![
                    Box::new(Lifetime(lifetime_duration)),
                    Box::new(message_integrity.unwrap().1_as_setter()),
                ],
            ),
        )
        .await
    }

    pub(crate) async fn handle_create_permission_request(&mut self, m: &Message) -> Result<()> {
        log::debug!("received CreatePermission from {}", self.src_addr);

        let five_tuple = FiveTuple {
            src_addr: self.src_addr,
            dst_addr: self.conn.local_addr().await?,
            protocol: PROTO_UDP,
        };

        let udp_alloc = self.allocation_manager.get_allocation(&five_tuple).await;
        let tcp_alloc = self.allocation_manager.get_tcp_allocation(&five_tuple).await;

        if udp_alloc.is_none() && tcp_alloc.is_none() {
            return Err(Error::ErrNoAllocationFound);
        }

        let message_integrity = self
            .authenticate_request(m, METHOD_CREATE_PERMISSION)
            .await?;
        if message_integrity.is_none() {
            return Ok(());
        }

        let mut add_count = 0;
        for attr in &m.attributes.0 {
            if attr.typ != ATTR_XOR_PEER_ADDRESS {
                continue;
            }

            let mut peer_address = PeerAddress::default();
            if peer_address.get_from(m).is_err() {
                add_count = 0;
                break;
            }

            let addr = SocketAddr::new(peer_address.ip, peer_address.port);
            log::debug!("adding permission for {addr}");

            if let Some(a) = &udp_alloc {
                a.add_permission(Permission::new(addr)).await;
            }
            if let Some(a) = &tcp_alloc {
                a.add_permission(addr).await;
            }
            add_count += 1;
        }

        let resp_class = if add_count == 0 {
            CLASS_ERROR_RESPONSE
        } else {
            CLASS_SUCCESS_RESPONSE
        };

        build_and_send(
            &self.conn,
            self.src_addr,
            &build_msg(
                m.transaction_id,
                MessageType::new(METHOD_CREATE_PERMISSION, resp_class),
                vec![Box::new(message_integrity.unwrap().1_as_setter())],
            ),
        )
        .await
    }

    pub(crate) async fn handle_send_indication(&mut self, m: &Message) -> Result<()> {
        log::debug!("received SendIndication from {}", self.src_addr);

        let a = self
            .allocation_manager
            .get_allocation(&FiveTuple {
                src_addr: self.src_addr,
                dst_addr: self.conn.local_addr().await?,
                protocol: PROTO_UDP,
            })
            .await
            .ok_or(Error::ErrNoAllocationFound)?;

        let mut data_attr = Data::default();
        data_attr.get_from(m)?;

        let mut peer_address = PeerAddress::default();
        peer_address.get_from(m)?;

        let msg_dst = SocketAddr::new(peer_address.ip, peer_address.port);

        if !a.has_permission(&msg_dst).await {
            return Err(Error::ErrNoPermission);
        }

        let l = a.relay_socket.send_to(&data_attr.0, msg_dst).await?;
        if l != data_attr.0.len() {
            Err(Error::ErrShortWrite)
        } else {
            Ok(())
        }
    }

    pub(crate) async fn handle_channel_bind_request(&mut self, m: &Message) -> Result<()> {
        log::debug!("received ChannelBindRequest from {}", self.src_addr);

        let a = self
            .allocation_manager
            .get_allocation(&FiveTuple {
                src_addr: self.src_addr,
                dst_addr: self.conn.local_addr().await?,
                protocol: PROTO_UDP,
            })
            .await
            .ok_or(Error::ErrNoAllocationFound)?;

        let bad_request_msg = build_msg(
            m.transaction_id,
            MessageType::new(METHOD_CHANNEL_BIND, CLASS_ERROR_RESPONSE),
            vec![Box::new(ErrorCodeAttribute {
                code: CODE_BAD_REQUEST,
                reason: vec![],
            })],
        );

        let message_integrity = self.authenticate_request(m, METHOD_CHANNEL_BIND).await?;
        let message_integrity = match message_integrity {
            Some(mi) => mi,
            None => return Ok(()),
        };

        let mut channel = ChannelNumber::default();
        if let Err(err) = channel.get_from(m) {
            return build_and_send_err(&self.conn, self.src_addr, err.into(), &bad_request_msg).await;
        }
        if channel.is_valid().is_err() {
            return build_and_send_err(
                &self.conn,
                self.src_addr,
                Error::ErrInvalidChannelNumber,
                &bad_request_msg,
            )
            .await;
        }

        let mut peer_addr = PeerAddress::default();
        if let Err(err) = peer_addr.get_from(m) {
            return build_and_send_err(&self.conn, self.src_addr, err.into(), &bad_request_msg).await;
        }

        log::debug!("binding channel {channel} to {}:{}", peer_addr.ip, peer_addr.port);

        if let Err(err) = a
            .add_channel_bind(
                ChannelBind::new(channel, SocketAddr::new(peer_addr.ip, peer_addr.port)),
                self.channel_bind_timeout,
            )
            .await
        {
            return build_and_send_err(&self.conn, self.src_addr, err, &bad_request_msg).await;
        }

        build_and_send(
            &self.conn,
            self.src_addr,
            &build_msg(
                m.transaction_id,
                MessageType::new(METHOD_CHANNEL_BIND, CLASS_SUCCESS_RESPONSE),
                vec![Box::new(message_integrity.1_as_setter())],
            ),
        )
        .await
    }

    pub(crate) async fn handle_channel_data(&mut self, c: &ChannelData) -> Result<()> {
        log::debug!("received ChannelData from {}", self.src_addr);

        let a = self
            .allocation_manager
            .get_allocation(&FiveTuple {
                src_addr: self.src_addr,
                dst_addr: self.conn.local_addr().await?,
                protocol: PROTO_UDP,
            })
            .await
            .ok_or(Error::ErrNoAllocationFound)?;

        let channel = a.get_channel_addr(&c.number).await;
        if let Some(peer) = channel {
            let l = a.relay_socket.send_to(&c.data, peer).await?;
            if l != c.data.len() {
                Err(Error::ErrShortWrite)
            } else {
                Ok(())
            }
        } else {
            Err(Error::ErrNoSuchChannelBind)
        }
    }

    /// RFC 6062 Section 6.1: a client asks the server to open a TCP
    /// connection to a peer on behalf of an existing TCP allocation.
    pub(crate) async fn handle_connect_request(&mut self, m: &Message) -> Result<()> {
        log::debug!("received ConnectRequest from {}", self.src_addr);

        let five_tuple = FiveTuple {
            src_addr: self.src_addr,
            dst_addr: self.conn.local_addr().await?,
            protocol: PROTO_UDP,
        };

        let alloc = self
            .allocation_manager
            .get_tcp_allocation(&five_tuple)
            .await
            .ok_or(Error::ErrNotRfc6062Allocation)?;

        let message_integrity = self.authenticate_request(m, METHOD_CONNECT).await?;
        if message_integrity.is_none() {
            return Ok(());
        }
        let message_integrity = message_integrity.unwrap();

        let mut peer_address = PeerAddress::default();
        peer_address.get_from(m)?;
        let peer_addr = SocketAddr::new(peer_address.ip, peer_address.port);

        if !alloc.has_permission(&peer_addr).await {
            return Err(Error::ErrNoPermission);
        }

        let error_msg = |code: ErrorCode| {
            build_msg(
                m.transaction_id,
                MessageType::new(METHOD_CONNECT, CLASS_ERROR_RESPONSE),
                vec![Box::new(ErrorCodeAttribute {
                    code,
                    reason: vec![],
                })],
            )
        };

        let stream = match tokio::net::TcpStream::connect(peer_addr).await {
            Ok(s) => s,
            Err(_) => {
                return build_and_send_err(
                    &self.conn,
                    self.src_addr,
                    Error::ErrConnectionTimeoutOrFailure,
                    &error_msg(CODE_CONN_TIMEOUT_OR_FAILURE),
                )
                .await
            }
        };

        let id = alloc.register_pending(stream, peer_addr).await;

        build_and_send(
            &self.conn,
            self.src_addr,
            &build_msg(
                m.transaction_id,
                MessageType::new(METHOD_CONNECT, CLASS_SUCCESS_RESPONSE),
                vec![Box::new(id), Box::new(message_integrity.1_as_setter())],
            ),
        )
        .await
    }
}

impl Setter for ConnectionId {
    fn add_to(&self, m: &mut Message) -> std::result::Result<(), stun::Error> {
        m.add(crate::attr_connection_id(), &self.0.to_be_bytes());
        Ok(())
    }
}
