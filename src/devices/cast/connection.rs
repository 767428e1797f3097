//! TLS connection to a Cast device
//!
//! Handles the virtual connection handshake, heartbeats and the
//! request/response exchanges needed to launch a receiver app and load media.

use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_native_tls::TlsConnector;
use tokio_native_tls::native_tls;

use super::proto::{
    Application, CastMessage, Media, NS_CONNECTION, NS_HEARTBEAT, NS_MEDIA, NS_RECEIVER,
    RECEIVER_ID, Request, Response, read_frame, write_frame,
};
use crate::{Error, Result};

/// Build a TLS connector for Cast devices
///
/// Devices present self-signed certificates issued per device, so
/// certificate and hostname verification are disabled.
///
/// # Errors
///
/// Returns error if the TLS backend cannot be initialized
pub fn tls_connector() -> Result<TlsConnector> {
    let connector = native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .build()?;
    Ok(TlsConnector::from(connector))
}

/// An open Cast channel to one device
pub struct CastConnection<S> {
    stream: S,
    next_request_id: u32,
}

impl CastConnection<tokio_native_tls::TlsStream<TcpStream>> {
    /// Open a TLS connection to `address`
    ///
    /// # Errors
    ///
    /// Returns error if the TCP connection or TLS handshake fails
    pub async fn open(address: SocketAddr, tls: &TlsConnector) -> Result<Self> {
        let tcp = TcpStream::connect(address).await?;
        let stream = tls.connect(&address.ip().to_string(), tcp).await?;
        tracing::trace!(%address, "cast TLS session established");
        Ok(Self::new(stream))
    }
}

impl<S> CastConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an established stream
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            next_request_id: 1,
        }
    }

    fn request_id(&mut self) -> u32 {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1).max(1);
        id
    }

    async fn send(&mut self, destination: &str, namespace: &str, request: &Request<'_>) -> Result<()> {
        let message = CastMessage::json(destination, namespace, request)?;
        write_frame(&mut self.stream, &message).await
    }

    /// Read the next payload, answering heartbeats along the way
    async fn recv(&mut self) -> Result<(String, Response)> {
        loop {
            let message = read_frame(&mut self.stream).await?;
            let response = message.response();

            if message.namespace == NS_HEARTBEAT && matches!(response, Response::Ping) {
                self.send(&message.source_id, NS_HEARTBEAT, &Request::Pong).await?;
                continue;
            }

            return Ok((message.source_id, response));
        }
    }

    /// Launch `app_id` (or join it if already running) and return its session
    ///
    /// # Errors
    ///
    /// Returns error if the device refuses the launch or the connection fails
    pub async fn launch(&mut self, app_id: &str) -> Result<Application> {
        self.send(RECEIVER_ID, NS_CONNECTION, &Request::Connect).await?;

        let request_id = self.request_id();
        self.send(RECEIVER_ID, NS_RECEIVER, &Request::Launch { request_id, app_id })
            .await?;

        loop {
            match self.recv().await?.1 {
                Response::ReceiverStatus { status, .. } => {
                    if let Some(app) = status.applications.into_iter().find(|a| a.app_id == app_id) {
                        tracing::trace!(session = %app.session_id, "receiver app running");
                        return Ok(app);
                    }
                }
                Response::LaunchError { request_id: id, reason }
                | Response::InvalidRequest { request_id: id, reason }
                    if id == Some(request_id) =>
                {
                    return Err(Error::Device(format!(
                        "launch of {app_id} refused: {}",
                        reason.unwrap_or_else(|| "no reason given".to_string())
                    )));
                }
                Response::Close => {
                    return Err(Error::Device("device closed the connection".to_string()));
                }
                _ => {}
            }
        }
    }

    /// Load and autoplay `content_id` in a running media receiver
    ///
    /// # Errors
    ///
    /// Returns error if the device rejects the media or the connection fails
    pub async fn load(&mut self, app: &Application, content_id: &str, content_type: &str) -> Result<()> {
        self.send(&app.transport_id, NS_CONNECTION, &Request::Connect).await?;

        let request_id = self.request_id();
        let request = Request::Load {
            request_id,
            session_id: &app.session_id,
            media: Media {
                content_id,
                content_type,
                stream_type: "BUFFERED",
            },
            autoplay: true,
        };
        self.send(&app.transport_id, NS_MEDIA, &request).await?;

        loop {
            let (source, response) = self.recv().await?;
            match response {
                Response::MediaStatus { request_id: id } if id == Some(request_id) => return Ok(()),
                Response::LoadFailed { request_id: id } if id == Some(request_id) => {
                    return Err(Error::Device("media load failed".to_string()));
                }
                Response::LoadCancelled { request_id: id } if id == Some(request_id) => {
                    return Err(Error::Device("media load cancelled".to_string()));
                }
                Response::InvalidRequest { request_id: id, reason } if id == Some(request_id) => {
                    return Err(Error::Device(format!(
                        "media load rejected: {}",
                        reason.unwrap_or_else(|| "no reason given".to_string())
                    )));
                }
                Response::Close if source == app.transport_id => {
                    return Err(Error::Device("receiver app closed the connection".to_string()));
                }
                _ => {}
            }
        }
    }

    /// Close the virtual connection to the platform receiver
    ///
    /// Best effort: the media keeps playing after the sender goes away.
    pub async fn close(&mut self) {
        if let Err(e) = self.send(RECEIVER_ID, NS_CONNECTION, &Request::Close).await {
            tracing::trace!(error = %e, "cast close failed");
        }
    }
}
