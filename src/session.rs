//! Blocking peer session on top of the wire codecs.
//!
//! Handshake sequence:
//! 1. send our `version`
//! 2. read until the peer's `version` arrives, answer it with `verack`
//! 3. read until the peer's `verack` arrives
//!
//! After that the session exchanges typed messages. Reads and writes
//! block until the socket timeouts fire; one session must not be driven
//! from more than one thread.

use std::io;
use std::net::TcpStream;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::wire::codec::{read_raw, write_message};
use crate::wire::error::WireError;
use crate::wire::message::{Message, Payload, Ping, Services, Verack, VersionMessage};
use crate::wire::transport::SocketTransport;

pub struct Session {
    transport: SocketTransport,
}

impl Session {
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        Ok(Self {
            transport: SocketTransport::new(stream)?,
        })
    }

    /// Performs the version/verack exchange and returns the peer's
    /// version message.
    ///
    /// Messages other than `version`/`verack` arriving mid-handshake are
    /// logged and skipped; some implementations start talking early.
    pub fn handshake(&mut self, services: Services) -> Result<VersionMessage, WireError> {
        write_message(&mut self.transport, &VersionMessage::outbound(services))?;

        let mut peer_version = None;
        let mut got_verack = false;

        loop {
            let raw = read_raw(&mut self.transport)?;
            match Message::try_from(raw)? {
                Message::Version(v) => {
                    info!(
                        version = v.version,
                        user_agent = %v.user_agent,
                        services = ?v.services,
                        "received peer version"
                    );
                    write_message(&mut self.transport, &Verack)?;
                    peer_version = Some(v);
                }
                Message::Verack => {
                    got_verack = true;
                }
                other => debug!(message = ?other, "skipping message during handshake"),
            }

            if got_verack {
                if let Some(v) = peer_version.take() {
                    return Ok(v);
                }
            }
        }
    }

    /// Sends a `ping` and blocks until the matching `pong` comes back.
    pub fn ping(&mut self) -> Result<(), WireError> {
        let ping = Ping {
            nonce: rand::thread_rng().gen(),
        };
        write_message(&mut self.transport, &ping)?;

        loop {
            let raw = read_raw(&mut self.transport)?;
            match Message::try_from(raw)? {
                Message::Pong(pong) if pong.nonce == ping.nonce => return Ok(()),
                Message::Pong(pong) => {
                    warn!(nonce = pong.nonce, "pong with unexpected nonce")
                }
                other => debug!(message = ?other, "skipping message while awaiting pong"),
            }
        }
    }

    pub fn send<P: Payload>(&mut self, message: &P) -> Result<(), WireError> {
        write_message(&mut self.transport, message)
    }

    pub fn recv(&mut self) -> Result<Message, WireError> {
        Message::try_from(read_raw(&mut self.transport)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::codec::read_message;
    use crate::wire::message::Pong;
    use std::net::TcpListener;
    use std::thread;

    /// Creates a connected local TcpStream pair (client, server).
    fn tcp_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    fn peer_version() -> VersionMessage {
        VersionMessage {
            version: 70016,
            services: Services::NODE_NETWORK,
            timestamp: 1700000000,
            nonce: 7,
            user_agent: "/Satoshi:25.0.0/".into(),
            start_height: 820000,
            relay: true,
            ..VersionMessage::default()
        }
    }

    #[test]
    fn handshake_completes_against_scripted_peer() {
        let (client, server) = tcp_pair();

        let peer = thread::spawn(move || {
            let mut t = SocketTransport::new(server).unwrap();
            // read the client's version, then play our side
            let _: VersionMessage = read_message(&mut t).unwrap();
            write_message(&mut t, &peer_version()).unwrap();
            write_message(&mut t, &Verack).unwrap();
            // the client answers our version with a verack
            let _: Verack = read_message(&mut t).unwrap();
        });

        let mut session = Session::new(client).unwrap();
        let version = session.handshake(Services::NONE).unwrap();
        assert_eq!(version.user_agent, "/Satoshi:25.0.0/");
        assert_eq!(version.version, 70016);
        peer.join().unwrap();
    }

    #[test]
    fn handshake_skips_interleaved_messages() {
        let (client, server) = tcp_pair();

        let peer = thread::spawn(move || {
            let mut t = SocketTransport::new(server).unwrap();
            let _: VersionMessage = read_message(&mut t).unwrap();
            write_message(&mut t, &peer_version()).unwrap();
            // a ping arriving before our verack must not derail the handshake
            write_message(&mut t, &Ping { nonce: 3 }).unwrap();
            write_message(&mut t, &Verack).unwrap();
            let _: Verack = read_message(&mut t).unwrap();
        });

        let mut session = Session::new(client).unwrap();
        assert!(session.handshake(Services::NONE).is_ok());
        peer.join().unwrap();
    }

    #[test]
    fn ping_resolves_on_matching_nonce() {
        let (client, server) = tcp_pair();

        let peer = thread::spawn(move || {
            let mut t = SocketTransport::new(server).unwrap();
            let ping: Ping = read_message(&mut t).unwrap();
            write_message(&mut t, &Pong { nonce: ping.nonce }).unwrap();
        });

        let mut session = Session::new(client).unwrap();
        session.ping().unwrap();
        peer.join().unwrap();
    }

    #[test]
    fn recv_surfaces_peer_drop_as_connection_closed() {
        let (client, server) = tcp_pair();
        drop(server);

        let mut session = Session::new(client).unwrap();
        let err = session.recv().unwrap_err();
        assert!(matches!(err, WireError::ConnectionClosed));
    }
}
