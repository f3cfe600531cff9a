//! The channel-shaped interface to the RakNet layer.
//!
//! RakNet itself lives outside this crate; it owns the socket, the
//! reliability layer and ordered delivery on the game channel. What a
//! session sees is one established connection as a pair of channels:
//! commands flowing towards the network and events flowing back.

use std::net::SocketAddr;

use tokio::sync::mpsc;

/// Instructions for the RakNet worker that owns the connection.
#[derive(Debug)]
pub enum RakNetCommand {
    /// Deliver an encapsulated game payload (leading `0xfe` included)
    /// on the ordered game channel.
    Send(Vec<u8>),
    /// Close the connection.
    Disconnect,
}

/// Notifications from the RakNet worker.
#[derive(Debug)]
pub enum RakNetEvent {
    /// An encapsulated game payload arrived.
    Datagram(Vec<u8>),
    /// The connection is gone: closed, timed out or reset.
    Closed,
}

/// One established RakNet connection, as handed to a session.
pub struct RakNetLink {
    /// Address of the remote peer.
    pub addr: SocketAddr,
    /// Commands towards the network.
    pub commands: mpsc::UnboundedSender<RakNetCommand>,
    /// Events from the network.
    pub events: mpsc::UnboundedReceiver<RakNetEvent>,
}

impl RakNetLink {
    /// Builds two cross-wired loopback links.
    ///
    /// Payloads sent on one side arrive as datagrams on the other, in
    /// order, mimicking RakNet's ordered game channel. Used by tests and
    /// in-process embeddings.
    pub fn pair(a_addr: SocketAddr, b_addr: SocketAddr) -> (RakNetLink, RakNetLink) {
        let (a_command_tx, a_command_rx) = mpsc::unbounded_channel();
        let (b_command_tx, b_command_rx) = mpsc::unbounded_channel();
        let (a_event_tx, a_event_rx) = mpsc::unbounded_channel();
        let (b_event_tx, b_event_rx) = mpsc::unbounded_channel();

        tokio::spawn(forward(a_command_rx, b_event_tx));
        tokio::spawn(forward(b_command_rx, a_event_tx));

        (
            RakNetLink { addr: b_addr, commands: a_command_tx, events: a_event_rx },
            RakNetLink { addr: a_addr, commands: b_command_tx, events: b_event_rx },
        )
    }
}

async fn forward(
    mut commands: mpsc::UnboundedReceiver<RakNetCommand>,
    events: mpsc::UnboundedSender<RakNetEvent>,
) {
    while let Some(command) = commands.recv().await {
        match command {
            RakNetCommand::Send(datagram) => {
                if events.send(RakNetEvent::Datagram(datagram)).is_err() {
                    return;
                }
            }
            RakNetCommand::Disconnect => break,
        }
    }

    let _ = events.send(RakNetEvent::Closed);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[tokio::test]
    async fn loopback_delivers_in_order() {
        let (a, mut b) = RakNetLink::pair(addr(19132), addr(19133));

        for index in 0..10u8 {
            a.commands.send(RakNetCommand::Send(vec![0xfe, index])).unwrap();
        }

        for index in 0..10u8 {
            match b.events.recv().await.unwrap() {
                RakNetEvent::Datagram(datagram) => assert_eq!(datagram, vec![0xfe, index]),
                RakNetEvent::Closed => panic!("Link closed early"),
            }
        }
    }

    #[tokio::test]
    async fn disconnect_closes_the_peer() {
        let (a, mut b) = RakNetLink::pair(addr(19132), addr(19133));

        a.commands.send(RakNetCommand::Disconnect).unwrap();
        assert!(matches!(b.events.recv().await, Some(RakNetEvent::Closed)));
    }
}
