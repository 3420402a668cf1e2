//! RCON listener and per-connection session handling.

use std::net::SocketAddr;
use std::sync::Arc;

use stoker_common::SupervisorResult;
use stoker_supervisor::ProcessSupervisor;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::packet::{
    read_packet, write_packet, Packet, SERVERDATA_AUTH, SERVERDATA_AUTH_RESPONSE,
    SERVERDATA_EXECCOMMAND, SERVERDATA_RESPONSE_VALUE,
};

/// Checks passwords presented in RCON auth frames.
pub trait PasswordVerifier: Send + Sync {
    fn verify(&self, password: &str) -> bool;
}

/// Looks up supervisors by instance ID for RCON sessions.
pub trait InstanceDirectory: Send + Sync {
    fn resolve(&self, id: &str) -> Option<Arc<ProcessSupervisor>>;
}

/// RCON server fronting every instance behind one port.
///
/// Clients bind a session to an instance at auth time with a
/// `password#instanceID` credential; plain `password` authenticates
/// without binding (commands are then refused until reconnecting with
/// an instance).
pub struct RconServer {
    listener: TcpListener,
    verifier: Arc<dyn PasswordVerifier>,
    directory: Arc<dyn InstanceDirectory>,
}

impl RconServer {
    pub async fn bind(
        addr: &str,
        verifier: Arc<dyn PasswordVerifier>,
        directory: Arc<dyn InstanceDirectory>,
    ) -> SupervisorResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "rcon server listening");
        Ok(Self {
            listener,
            verifier,
            directory,
        })
    }

    pub fn local_addr(&self) -> SupervisorResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `token` is cancelled. Each connection
    /// gets its own task; a session error never affects the listener.
    pub async fn serve(self, token: CancellationToken) -> SupervisorResult<()> {
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("rcon server shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    debug!(%peer, "rcon connection accepted");
                    let verifier = Arc::clone(&self.verifier);
                    let directory = Arc::clone(&self.directory);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, verifier, directory).await {
                            debug!(%peer, error = %e, "rcon connection closed");
                        }
                    });
                }
            }
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    verifier: Arc<dyn PasswordVerifier>,
    directory: Arc<dyn InstanceDirectory>,
) -> SupervisorResult<()> {
    let mut authenticated = false;
    let mut instance: Option<Arc<ProcessSupervisor>> = None;

    loop {
        let packet = match read_packet(&mut stream).await? {
            Some(packet) => packet,
            None => return Ok(()),
        };

        match packet.kind {
            SERVERDATA_AUTH => {
                let (password, instance_id) = match packet.body.split_once('#') {
                    Some((password, id)) => (password, Some(id)),
                    None => (packet.body.as_str(), None),
                };

                if verifier.verify(password) {
                    authenticated = true;
                    if let Some(id) = instance_id {
                        // An unknown instance ID does not fail auth;
                        // the session just stays unbound.
                        instance = directory.resolve(id);
                    }
                    write_packet(
                        &mut stream,
                        &Packet::new(packet.id, SERVERDATA_AUTH_RESPONSE, ""),
                    )
                    .await?;
                } else {
                    write_packet(&mut stream, &Packet::new(-1, SERVERDATA_AUTH_RESPONSE, ""))
                        .await?;
                    return Ok(());
                }
            }
            SERVERDATA_EXECCOMMAND => {
                if !authenticated {
                    write_packet(
                        &mut stream,
                        &Packet::new(packet.id, SERVERDATA_RESPONSE_VALUE, "Not authenticated"),
                    )
                    .await?;
                    continue;
                }
                let Some(supervisor) = &instance else {
                    write_packet(
                        &mut stream,
                        &Packet::new(
                            packet.id,
                            SERVERDATA_RESPONSE_VALUE,
                            "No instance selected (use password#instanceID)",
                        ),
                    )
                    .await?;
                    continue;
                };

                // Fire and forget: the command goes to the server
                // console, its output reaches clients through the
                // console fan-out rather than this reply.
                let reply = match supervisor.write_command(&packet.body).await {
                    Ok(()) => String::new(),
                    Err(e) => format!("Error: {e}"),
                };
                write_packet(
                    &mut stream,
                    &Packet::new(packet.id, SERVERDATA_RESPONSE_VALUE, reply),
                )
                .await?;
            }
            _ => {
                write_packet(
                    &mut stream,
                    &Packet::new(packet.id, SERVERDATA_RESPONSE_VALUE, "Unknown type"),
                )
                .await?;
            }
        }
    }
}
