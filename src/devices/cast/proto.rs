//! Cast v2 wire format
//!
//! Every frame is a big-endian `u32` length followed by a protobuf
//! `CastMessage`. Control payloads are JSON strings carried in
//! `payload_utf8` and tagged by `"type"`.

use prost::Message as _;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{Error, Result};

/// Devices reject frames larger than 64 KiB
pub const MAX_FRAME_LEN: u32 = 64 * 1024;

/// `CASTV2_1_0`
const PROTOCOL_VERSION: i32 = 0;

/// `PayloadType::STRING`
const PAYLOAD_STRING: i32 = 0;

pub const NS_CONNECTION: &str = "urn:x-cast:com.google.cast.tp.connection";
pub const NS_HEARTBEAT: &str = "urn:x-cast:com.google.cast.tp.heartbeat";
pub const NS_RECEIVER: &str = "urn:x-cast:com.google.cast.receiver";
pub const NS_MEDIA: &str = "urn:x-cast:com.google.cast.media";

/// Sender id used for every outgoing message
pub const SENDER_ID: &str = "sender-0";

/// Platform receiver id
pub const RECEIVER_ID: &str = "receiver-0";

/// `cast_channel.CastMessage`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CastMessage {
    #[prost(int32, required, tag = "1")]
    pub protocol_version: i32,
    #[prost(string, required, tag = "2")]
    pub source_id: String,
    #[prost(string, required, tag = "3")]
    pub destination_id: String,
    #[prost(string, required, tag = "4")]
    pub namespace: String,
    #[prost(int32, required, tag = "5")]
    pub payload_type: i32,
    #[prost(string, optional, tag = "6")]
    pub payload_utf8: Option<String>,
    #[prost(bytes = "vec", optional, tag = "7")]
    pub payload_binary: Option<Vec<u8>>,
}

impl CastMessage {
    /// Build a JSON message from the sender to `destination`
    ///
    /// # Errors
    ///
    /// Returns error if the payload cannot be serialized
    pub fn json<T: Serialize>(destination: &str, namespace: &str, payload: &T) -> Result<Self> {
        Ok(Self {
            protocol_version: PROTOCOL_VERSION,
            source_id: SENDER_ID.to_string(),
            destination_id: destination.to_string(),
            namespace: namespace.to_string(),
            payload_type: PAYLOAD_STRING,
            payload_utf8: Some(serde_json::to_string(payload)?),
            payload_binary: None,
        })
    }

    /// Decode the JSON payload; binary or unknown payloads become [`Response::Other`]
    #[must_use]
    pub fn response(&self) -> Response {
        self.payload_utf8
            .as_deref()
            .and_then(|p| serde_json::from_str(p).ok())
            .unwrap_or(Response::Other)
    }
}

/// Outgoing control payloads
#[derive(Debug, Serialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Request<'a> {
    Connect,
    Close,
    Pong,
    Launch {
        request_id: u32,
        app_id: &'a str,
    },
    Load {
        request_id: u32,
        session_id: &'a str,
        media: Media<'a>,
        autoplay: bool,
    },
}

/// Media descriptor for `LOAD`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Media<'a> {
    pub content_id: &'a str,
    pub content_type: &'a str,
    pub stream_type: &'a str,
}

/// Incoming control payloads the sender cares about
#[derive(Debug, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Response {
    Ping,
    Close,
    ReceiverStatus {
        request_id: Option<u32>,
        status: ReceiverStatus,
    },
    LaunchError {
        request_id: Option<u32>,
        reason: Option<String>,
    },
    MediaStatus {
        request_id: Option<u32>,
    },
    LoadFailed {
        request_id: Option<u32>,
    },
    LoadCancelled {
        request_id: Option<u32>,
    },
    InvalidRequest {
        request_id: Option<u32>,
        reason: Option<String>,
    },
    #[serde(other)]
    Other,
}

/// `RECEIVER_STATUS.status`
#[derive(Debug, Default, Deserialize)]
pub struct ReceiverStatus {
    #[serde(default)]
    pub applications: Vec<Application>,
}

/// A running receiver application
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub app_id: String,
    pub session_id: String,
    pub transport_id: String,
}

/// Write one length-prefixed frame
///
/// # Errors
///
/// Returns error if the frame is too large or the write fails
pub async fn write_frame<W>(writer: &mut W, message: &CastMessage) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let bytes = message.encode_to_vec();
    let len = u32::try_from(bytes.len())
        .ok()
        .filter(|len| *len <= MAX_FRAME_LEN)
        .ok_or_else(|| Error::Device(format!("frame too large: {} bytes", bytes.len())))?;

    writer.write_u32(len).await?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame
///
/// # Errors
///
/// Returns error on IO failure, oversized frames or invalid protobuf
pub async fn read_frame<R>(reader: &mut R) -> Result<CastMessage>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_u32().await?;
    if len > MAX_FRAME_LEN {
        return Err(Error::Device(format!("frame too large: {len} bytes")));
    }

    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).await?;
    Ok(CastMessage::decode(buf.as_slice())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_launch_request() {
        let request = Request::Launch {
            request_id: 7,
            app_id: "CC1AD845",
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "LAUNCH", "requestId": 7, "appId": "CC1AD845"})
        );
    }

    #[test]
    fn serializes_load_request() {
        let request = Request::Load {
            request_id: 2,
            session_id: "abc",
            media: Media {
                content_id: "https://example.com/a.mp3",
                content_type: "audio/mp3",
                stream_type: "BUFFERED",
            },
            autoplay: true,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "LOAD",
                "requestId": 2,
                "sessionId": "abc",
                "media": {
                    "contentId": "https://example.com/a.mp3",
                    "contentType": "audio/mp3",
                    "streamType": "BUFFERED"
                },
                "autoplay": true
            })
        );
    }

    #[test]
    fn serializes_unit_requests() {
        assert_eq!(
            serde_json::to_string(&Request::Connect).unwrap(),
            r#"{"type":"CONNECT"}"#
        );
        assert_eq!(
            serde_json::to_string(&Request::Pong).unwrap(),
            r#"{"type":"PONG"}"#
        );
    }

    #[test]
    fn parses_receiver_status() {
        let message = CastMessage::json(
            SENDER_ID,
            NS_RECEIVER,
            &serde_json::json!({
                "type": "RECEIVER_STATUS",
                "requestId": 1,
                "status": {
                    "applications": [{
                        "appId": "CC1AD845",
                        "displayName": "Default Media Receiver",
                        "sessionId": "s-1",
                        "transportId": "t-1"
                    }],
                    "volume": {"level": 0.5, "muted": false}
                }
            }),
        )
        .unwrap();

        let Response::ReceiverStatus { request_id, status } = message.response() else {
            panic!("expected receiver status");
        };
        assert_eq!(request_id, Some(1));
        assert_eq!(
            status.applications,
            [Application {
                app_id: "CC1AD845".to_string(),
                session_id: "s-1".to_string(),
                transport_id: "t-1".to_string(),
            }]
        );
    }

    #[test]
    fn parses_failures_and_unknown_types() {
        let parse = |json: &str| {
            CastMessage {
                payload_utf8: Some(json.to_string()),
                ..CastMessage::json(SENDER_ID, NS_MEDIA, &()).unwrap()
            }
            .response()
        };

        assert!(matches!(
            parse(r#"{"type":"LOAD_FAILED","requestId":3}"#),
            Response::LoadFailed { request_id: Some(3) }
        ));
        assert!(matches!(
            parse(r#"{"type":"MEDIA_STATUS","requestId":0,"status":[]}"#),
            Response::MediaStatus { request_id: Some(0) }
        ));
        assert!(matches!(parse(r#"{"type":"PING"}"#), Response::Ping));
        assert!(matches!(parse(r#"{"type":"PONG"}"#), Response::Other));
        assert!(matches!(parse(r#"{"type":"DEVICE_UPDATED"}"#), Response::Other));
        assert!(matches!(parse("garbage"), Response::Other));
    }

    #[tokio::test]
    async fn frames_survive_the_wire() {
        let message = CastMessage::json(RECEIVER_ID, NS_CONNECTION, &Request::Connect).unwrap();

        let mut wire = Vec::new();
        write_frame(&mut wire, &message).await.unwrap();

        let len = u32::from_be_bytes([wire[0], wire[1], wire[2], wire[3]]);
        assert_eq!(len as usize, wire.len() - 4);

        let decoded = read_frame(&mut wire.as_slice()).await.unwrap();
        assert_eq!(decoded, message);
    }

    #[tokio::test]
    async fn rejects_oversized_frames() {
        let mut wire = (MAX_FRAME_LEN + 1).to_be_bytes().to_vec();
        wire.extend_from_slice(&[0; 16]);

        let err = read_frame(&mut wire.as_slice()).await.unwrap_err();
        assert!(err.to_string().contains("frame too large"));
    }
}
