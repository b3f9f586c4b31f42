use crate::constants::SESSION_EVENT_QUEUE;
use crate::core_network::connection::{Connection, SessionEvent};
use crate::core_network::pasv::TokioTransport;
use crate::session::{ServerContext, Session, SessionRegistry};
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Binds the control port and serves clients until Ctrl-C.
pub async fn start_server(context: Arc<ServerContext>) -> Result<()> {
    let address = format!(
        "{}:{}",
        context.config.listen_address, context.config.listen_port
    );
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind control port on {}", address))?;
    info!("Server listening on {}", listener.local_addr()?);

    tokio::select! {
        result = serve(listener, context) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C, shutting down");
            Ok(())
        }
    }
}

/// Accept loop: one task per control connection.
pub async fn serve(listener: TcpListener, context: Arc<ServerContext>) -> Result<()> {
    let registry = SessionRegistry::new(context.config.max_sessions);

    loop {
        let (socket, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("Failed to accept control connection: {}", e);
                continue;
            }
        };
        info!("New connection from {}", addr);

        let Some(guard) = registry.try_register(addr) else {
            warn!("Rejecting {}: {} sessions active", addr, registry.active_count());
            tokio::spawn(reject_connection(socket));
            continue;
        };
        debug!("Session {} registered for {}", guard.id(), addr);

        let context = Arc::clone(&context);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, context).await {
                error!("Connection error: {:?}", e);
            }
            drop(guard);
            info!("Connection closed for {}", addr);
        });
    }
}

async fn reject_connection(mut socket: TcpStream) {
    if let Err(e) = socket
        .write_all(b"421 Too many users, try again later.\r\n")
        .await
    {
        debug!("Failed to send rejection: {}", e);
    }
    let _ = socket.shutdown().await;
}

/// Runs one session: control reader and writer tasks feed and drain the
/// session, which handles its events one at a time.
pub async fn handle_connection(socket: TcpStream, context: Arc<ServerContext>) -> Result<()> {
    let local = socket
        .local_addr()
        .context("Control connection has no local address")?
        .ip();
    let local_ip = match local {
        IpAddr::V4(ip) => ip,
        IpAddr::V6(ip) => ip.to_ipv4_mapped().unwrap_or(Ipv4Addr::UNSPECIFIED),
    };

    let (reader, writer) = socket.into_split();
    let (events, mut received) = mpsc::channel(SESSION_EVENT_QUEUE);
    let idle = Duration::from_secs(context.config.idle_timeout_secs);

    let reader_task = tokio::spawn(read_control(reader, events.clone(), idle));
    let control = ControlConnection::spawn(writer);
    let transport = TokioTransport::new(local, events);
    let mut session = Session::new(Box::new(control), context, Box::new(transport), local_ip);

    while let Some(event) = received.recv().await {
        session.handle_event(event);
        if session.is_closed() {
            break;
        }
    }

    reader_task.abort();
    Ok(())
}

async fn read_control(
    mut reader: OwnedReadHalf,
    events: mpsc::Sender<SessionEvent>,
    idle: Duration,
) {
    let mut buffer = vec![0u8; 1024];
    loop {
        let read = reader.read(&mut buffer);
        let result = if idle.is_zero() {
            Ok(read.await)
        } else {
            timeout(idle, read).await
        };

        let event = match result {
            Err(_) => SessionEvent::ControlTimeout,
            Ok(Ok(0)) => SessionEvent::ControlClosed,
            Ok(Ok(n)) => SessionEvent::ControlData(buffer[..n].to_vec()),
            Ok(Err(e)) => {
                debug!("Control connection read failed: {}", e);
                SessionEvent::ControlClosed
            }
        };

        // a timeout may be ignored by a session that is busy transferring
        let last = matches!(event, SessionEvent::ControlClosed);
        if events.send(event).await.is_err() || last {
            break;
        }
    }
}

/// Replies are queued without limit and written in order by a dedicated
/// task, which shuts the socket down once the connection is closed.
struct ControlConnection {
    sender: Option<mpsc::UnboundedSender<Vec<u8>>>,
}

impl ControlConnection {
    fn spawn(mut writer: OwnedWriteHalf) -> Self {
        let (sender, mut outgoing) = mpsc::unbounded_channel::<Vec<u8>>();
        tokio::spawn(async move {
            while let Some(bytes) = outgoing.recv().await {
                if let Err(e) = writer.write_all(&bytes).await {
                    debug!("Failed to send reply: {}", e);
                    return;
                }
            }
            let _ = writer.shutdown().await;
        });
        Self {
            sender: Some(sender),
        }
    }
}

impl Connection for ControlConnection {
    fn write(&mut self, data: &[u8]) -> usize {
        match self.sender.as_ref() {
            Some(sender) if sender.send(data.to_vec()).is_ok() => data.len(),
            _ => 0,
        }
    }

    fn close(&mut self) {
        self.sender = None;
    }
}
