//! Socket.IO (protocol v5) over Engine.IO (v4) text-frame codec.
//!
//! Only the websocket transport and text packets are handled. Every
//! websocket text frame carries exactly one Engine.IO packet; a `message`
//! packet carries one Socket.IO packet.
//!
//! ```text
//! 0{"sid":"..","pingInterval":25000,"pingTimeout":20000}   engine open
//! 2 / 3                                                     ping / pong
//! 40                                                        socket connect
//! 42["processing_progress",{"current":1,"total":10}]        event
//! 4217["start_processing",{...}]                            event, ack id 17
//! 4317[{"status":"ok"}]                                     ack for id 17
//! ```

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("empty packet")]
    Empty,
    #[error("unknown {layer} packet type '{kind}'")]
    UnknownType { layer: &'static str, kind: char },
    #[error("invalid packet payload: {0}")]
    Payload(String),
}

// ---------------------------------------------------------------------------
// Engine.IO
// ---------------------------------------------------------------------------

/// Engine.IO `open` payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub ping_interval: u64,
    #[serde(default)]
    pub ping_timeout: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping,
    Pong,
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn decode(frame: &str) -> Result<EnginePacket, CodecError> {
        let mut chars = frame.chars();
        let kind = chars.next().ok_or(CodecError::Empty)?;
        let rest = chars.as_str();
        Ok(match kind {
            '0' => EnginePacket::Open(
                serde_json::from_str(rest).map_err(|e| CodecError::Payload(e.to_string()))?,
            ),
            '1' => EnginePacket::Close,
            '2' => EnginePacket::Ping,
            '3' => EnginePacket::Pong,
            '4' => EnginePacket::Message(rest.to_string()),
            '5' => EnginePacket::Upgrade,
            '6' => EnginePacket::Noop,
            other => return Err(CodecError::UnknownType { layer: "engine.io", kind: other }),
        })
    }

    /// Text frame for packets a client sends.
    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(_) => "0".to_string(),
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping => "2".to_string(),
            EnginePacket::Pong => "3".to_string(),
            EnginePacket::Message(body) => format!("4{body}"),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Socket.IO
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect { nsp: String, data: Option<Value> },
    Disconnect { nsp: String },
    Event { nsp: String, id: Option<u64>, name: String, args: Vec<Value> },
    Ack { nsp: String, id: u64, args: Vec<Value> },
    ConnectError { nsp: String, data: Option<Value> },
}

const DEFAULT_NSP: &str = "/";

impl SocketPacket {
    pub fn connect() -> SocketPacket {
        SocketPacket::Connect { nsp: DEFAULT_NSP.to_string(), data: None }
    }

    pub fn event(name: &str, data: Value, ack_id: Option<u64>) -> SocketPacket {
        SocketPacket::Event {
            nsp: DEFAULT_NSP.to_string(),
            id: ack_id,
            name: name.to_string(),
            args: vec![data],
        }
    }

    pub fn decode(body: &str) -> Result<SocketPacket, CodecError> {
        let mut chars = body.chars();
        let kind = chars.next().ok_or(CodecError::Empty)?;
        let mut rest = chars.as_str();

        if matches!(kind, '5' | '6') {
            return Err(CodecError::Payload("binary packets are not supported".into()));
        }

        let mut nsp = DEFAULT_NSP.to_string();
        if rest.starts_with('/') {
            let end = rest.find(',').unwrap_or(rest.len());
            nsp = rest[..end].to_string();
            rest = rest.get(end + 1..).unwrap_or("");
        }

        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        let id = if digits > 0 {
            Some(rest[..digits].parse::<u64>().map_err(|e| CodecError::Payload(e.to_string()))?)
        } else {
            None
        };
        rest = &rest[digits..];

        let json = if rest.is_empty() {
            None
        } else {
            Some(serde_json::from_str::<Value>(rest).map_err(|e| CodecError::Payload(e.to_string()))?)
        };

        match kind {
            '0' => Ok(SocketPacket::Connect { nsp, data: json }),
            '1' => Ok(SocketPacket::Disconnect { nsp }),
            '2' => {
                let mut args = into_array(json)?;
                if args.is_empty() {
                    return Err(CodecError::Payload("event without a name".into()));
                }
                let name = match args.remove(0) {
                    Value::String(s) => s,
                    other => return Err(CodecError::Payload(format!("event name {other} is not a string"))),
                };
                Ok(SocketPacket::Event { nsp, id, name, args })
            }
            '3' => {
                let id = id.ok_or_else(|| CodecError::Payload("ack without id".into()))?;
                Ok(SocketPacket::Ack { nsp, id, args: into_array(json)? })
            }
            '4' => Ok(SocketPacket::ConnectError { nsp, data: json }),
            other => Err(CodecError::UnknownType { layer: "socket.io", kind: other }),
        }
    }

    pub fn encode(&self) -> String {
        let (kind, nsp, id, json) = match self {
            SocketPacket::Connect { nsp, data } => ('0', nsp, None, data.clone()),
            SocketPacket::Disconnect { nsp } => ('1', nsp, None, None),
            SocketPacket::Event { nsp, id, name, args } => {
                let mut all = Vec::with_capacity(args.len() + 1);
                all.push(Value::String(name.clone()));
                all.extend(args.iter().cloned());
                ('2', nsp, *id, Some(Value::Array(all)))
            }
            SocketPacket::Ack { nsp, id, args } => ('3', nsp, Some(*id), Some(Value::Array(args.clone()))),
            SocketPacket::ConnectError { nsp, data } => ('4', nsp, None, data.clone()),
        };

        let mut out = String::new();
        out.push(kind);
        if nsp != DEFAULT_NSP {
            out.push_str(nsp);
            out.push(',');
        }
        if let Some(id) = id {
            out.push_str(&id.to_string());
        }
        if let Some(json) = json {
            out.push_str(&json.to_string());
        }
        out
    }

    /// Wrap in an Engine.IO message frame.
    pub fn to_frame(&self) -> String {
        EnginePacket::Message(self.encode()).encode()
    }
}

fn into_array(json: Option<Value>) -> Result<Vec<Value>, CodecError> {
    match json {
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(CodecError::Payload(format!("expected array, got {other}"))),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_open_handshake() {
        let p = EnginePacket::decode(r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#)
            .unwrap();
        assert_eq!(
            p,
            EnginePacket::Open(Handshake { sid: "abc".into(), ping_interval: 25000, ping_timeout: 20000 })
        );
    }

    #[test]
    fn test_ping_pong_frames() {
        assert_eq!(EnginePacket::decode("2").unwrap(), EnginePacket::Ping);
        assert_eq!(EnginePacket::Pong.encode(), "3");
    }

    #[test]
    fn test_unknown_engine_type() {
        assert_eq!(
            EnginePacket::decode("9"),
            Err(CodecError::UnknownType { layer: "engine.io", kind: '9' })
        );
        assert_eq!(EnginePacket::decode(""), Err(CodecError::Empty));
    }

    #[test]
    fn test_connect_frame() {
        assert_eq!(SocketPacket::connect().to_frame(), "40");
    }

    #[test]
    fn test_decode_connect_with_sid() {
        let p = SocketPacket::decode(r#"0{"sid":"xyz"}"#).unwrap();
        assert_eq!(p, SocketPacket::Connect { nsp: "/".into(), data: Some(json!({"sid": "xyz"})) });
    }

    #[test]
    fn test_decode_event() {
        let p = SocketPacket::decode(r#"2["processing_progress",{"current":1,"total":10}]"#).unwrap();
        assert_eq!(
            p,
            SocketPacket::Event {
                nsp: "/".into(),
                id: None,
                name: "processing_progress".into(),
                args: vec![json!({"current": 1, "total": 10})],
            }
        );
    }

    #[test]
    fn test_encode_event_with_ack_id() {
        let p = SocketPacket::event("start_processing", json!({"api_model": "gpt-4"}), Some(17));
        assert_eq!(p.to_frame(), r#"4217["start_processing",{"api_model":"gpt-4"}]"#);
    }

    #[test]
    fn test_decode_ack() {
        let p = SocketPacket::decode(r#"317[{"status":"ok"}]"#).unwrap();
        assert_eq!(p, SocketPacket::Ack { nsp: "/".into(), id: 17, args: vec![json!({"status": "ok"})] });
    }

    #[test]
    fn test_decode_custom_namespace() {
        let p = SocketPacket::decode(r#"2/admin,["ping",1]"#).unwrap();
        assert_eq!(
            p,
            SocketPacket::Event { nsp: "/admin".into(), id: None, name: "ping".into(), args: vec![json!(1)] }
        );
        assert_eq!(p.encode(), r#"2/admin,["ping",1]"#);
    }

    #[test]
    fn test_decode_server_disconnect() {
        assert_eq!(SocketPacket::decode("1").unwrap(), SocketPacket::Disconnect { nsp: "/".into() });
    }

    #[test]
    fn test_decode_connect_error() {
        let p = SocketPacket::decode(r#"4{"message":"Not authorized"}"#).unwrap();
        assert_eq!(
            p,
            SocketPacket::ConnectError { nsp: "/".into(), data: Some(json!({"message": "Not authorized"})) }
        );
    }

    #[test]
    fn test_ack_without_id_rejected() {
        assert!(SocketPacket::decode(r#"3[{"status":"ok"}]"#).is_err());
    }

    #[test]
    fn test_binary_rejected() {
        assert!(SocketPacket::decode(r#"51-["x",{"_placeholder":true,"num":0}]"#).is_err());
    }
}
