use crate::core_network::connection::{
    Connection, DataTransport, PassiveListener, SessionEvent, TransferId, TransportError,
};
use crate::constants::DATA_BUFFER_SIZE;
use crate::core_transfer::passive::PassiveTransfer;
use crate::session::Session;
use log::{debug, error, info, trace};
use rand::Rng;
use std::net::{IpAddr, Ipv4Addr};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

/// Handles the PASV FTP command.
///
/// Any previous transfer of the session is torn down first. A single random
/// port from the configured range is tried; if it cannot be bound the
/// client gets 425 and may simply retry.
pub fn handle_pasv_command(session: &mut Session, _arg: String) {
    if let Some(previous) = session.transfer.take() {
        debug!("Replacing passive transfer {}", previous.id());
    }

    let config = &session.context.config;
    let (min, max) = (config.pasv_port_min, config.pasv_port_max);
    let port = rand::thread_rng().gen_range(min..=max.max(min));
    let address = config.pasv_address.unwrap_or(session.local_ip);

    let id = session.allocate_transfer_id();
    match session.transport.listen(id, port) {
        Ok(listener) => {
            let response = encode_pasv_reply(address, listener.port());
            debug!("PASV listener set up on port {}: {}", listener.port(), response);
            session.transfer = Some(PassiveTransfer::new(id, listener));
            session.reply(&response);
        }
        Err(e) => {
            error!("{}", e);
            session.reply("425 Can't open data connection.");
        }
    }
}

/// Formats the 227 reply, e.g. `227 Entering Passive Mode (192,168,1,20,195,80).`
pub fn encode_pasv_reply(address: Ipv4Addr, port: u16) -> String {
    let [h1, h2, h3, h4] = address.octets();
    format!(
        "227 Entering Passive Mode ({},{},{},{},{},{}).",
        h1,
        h2,
        h3,
        h4,
        port >> 8,
        port & 0xff
    )
}

/// Opens passive listeners on the interface the control connection uses and
/// reports their activity to the owning session.
pub struct TokioTransport {
    bind_address: IpAddr,
    events: mpsc::Sender<SessionEvent>,
}

impl TokioTransport {
    pub fn new(bind_address: IpAddr, events: mpsc::Sender<SessionEvent>) -> Self {
        Self {
            bind_address,
            events,
        }
    }
}

impl DataTransport for TokioTransport {
    fn listen(
        &mut self,
        transfer: TransferId,
        port: u16,
    ) -> Result<Box<dyn PassiveListener>, TransportError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| TransportError::NoRuntime)?;
        let bind = |source| TransportError::Bind { port, source };

        let std_listener = std::net::TcpListener::bind((self.bind_address, port)).map_err(bind)?;
        std_listener.set_nonblocking(true).map_err(bind)?;
        let listener = TcpListener::from_std(std_listener).map_err(bind)?;
        let port = listener.local_addr().map(|addr| addr.port()).unwrap_or(port);

        let events = self.events.clone();
        let task = runtime.spawn(accept_data_connection(listener, transfer, events));
        Ok(Box::new(TokioPassiveListener { port, task }))
    }
}

struct TokioPassiveListener {
    port: u16,
    task: JoinHandle<()>,
}

impl PassiveListener for TokioPassiveListener {
    fn port(&self) -> u16 {
        self.port
    }

    fn close(&mut self) {
        self.task.abort();
    }
}

impl Drop for TokioPassiveListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Waits for the one data connection of a transfer. The listening socket is
/// dropped as soon as it is accepted, so later attempts are refused.
async fn accept_data_connection(
    listener: TcpListener,
    transfer: TransferId,
    events: mpsc::Sender<SessionEvent>,
) {
    match listener.accept().await {
        Ok((stream, addr)) => {
            drop(listener);
            info!("Data connection from {} for transfer {}", addr, transfer);
            tokio::spawn(run_data_connection(stream, transfer, events));
        }
        Err(e) => error!("Failed to accept data connection: {}", e),
    }
}

/// Session side of a data connection. Holds at most one chunk in flight;
/// the next write is only accepted after `DataAcked`.
struct DataConnection {
    sender: Option<mpsc::Sender<Vec<u8>>>,
}

impl Connection for DataConnection {
    fn write(&mut self, data: &[u8]) -> usize {
        let Some(sender) = self.sender.as_ref() else {
            return 0;
        };
        match sender.try_send(data.to_vec()) {
            Ok(()) => data.len(),
            Err(TrySendError::Full(_)) => 0,
            Err(TrySendError::Closed(_)) => {
                self.sender = None;
                0
            }
        }
    }

    fn close(&mut self) {
        self.sender = None;
    }
}

async fn run_data_connection(
    stream: TcpStream,
    transfer: TransferId,
    events: mpsc::Sender<SessionEvent>,
) {
    let (sender, mut outgoing) = mpsc::channel::<Vec<u8>>(1);
    let connection = DataConnection {
        sender: Some(sender),
    };
    if events
        .send(SessionEvent::DataAccepted {
            transfer,
            connection: Box::new(connection),
        })
        .await
        .is_err()
    {
        return;
    }

    let (mut reader, mut writer) = stream.into_split();

    let inbound = async {
        let mut buffer = vec![0u8; DATA_BUFFER_SIZE];
        loop {
            match reader.read(&mut buffer).await {
                Ok(0) => break,
                Ok(n) => {
                    let event = SessionEvent::DataReceived {
                        transfer,
                        data: buffer[..n].to_vec(),
                    };
                    if events.send(event).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!("Data connection read failed: {}", e);
                    break;
                }
            }
        }
    };

    let outbound = async {
        while let Some(chunk) = outgoing.recv().await {
            if let Err(e) = writer.write_all(&chunk).await {
                debug!("Data connection write failed: {}", e);
                return;
            }
            trace!("Sent {} bytes on transfer {}", chunk.len(), transfer);
            let ack = SessionEvent::DataAcked {
                transfer,
                len: chunk.len(),
            };
            if events.send(ack).await.is_err() {
                return;
            }
        }
        if let Err(e) = writer.shutdown().await {
            debug!("Data connection shutdown failed: {}", e);
        }
    };

    tokio::select! {
        _ = inbound => {}
        _ = outbound => {}
    }

    let _ = events.send(SessionEvent::DataClosed { transfer }).await;
}
