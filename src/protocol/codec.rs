use super::WireMessage;
use crate::Result;

/// Serializes a message to a single JSON line, including the `\n` terminator.
pub fn encode(message: &WireMessage) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec(message)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Parses one line produced by [encode]. A trailing line terminator is optional.
pub fn decode(bytes: &[u8]) -> Result<WireMessage> {
    let mut line = bytes;
    while let Some((last, rest)) = line.split_last() {
        if *last == b'\n' || *last == b'\r' {
            line = rest;
        } else {
            break;
        }
    }
    Ok(serde_json::from_slice(line)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Body, Region, Route, ViewId};
    use crate::Error;

    fn route(toid: Option<u64>) -> Route {
        Route {
            fromhost: "10.0.0.2".to_string(),
            fromport: 22000,
            fromid: ViewId(7),
            toid: toid.map(ViewId),
        }
    }

    #[test]
    fn decodes_a_start_response() {
        let line = br#"{"type": "startresponse", "accept": 1, "fromid": 2, "fromhost": "H", "fromport": 22000, "toid": 1}"#;
        let message = decode(line).unwrap();
        assert_eq!(message.body, Body::StartResponse { accept: true });
        assert_eq!(message.route.fromid, ViewId(2));
        assert_eq!(message.route.fromhost, "H");
        assert_eq!(message.route.fromport, 22000);
        assert_eq!(message.route.toid, Some(ViewId(1)));
    }

    #[test]
    fn accept_is_written_as_an_integer() {
        let message = WireMessage::new(Body::StartResponse { accept: false }, route(Some(3)));
        let text = String::from_utf8(encode(&message).unwrap()).unwrap();
        assert!(text.contains(r#""accept":0"#));
        assert!(text.contains(r#""type":"startresponse""#));
    }

    #[test]
    fn document_contents_stay_on_one_line() {
        let body = Body::Start {
            fromname: "alice".to_string(),
            contents: "fn main() {\n    println!(\"hi\");\n}\n".to_string(),
        };
        let message = WireMessage::new(body, route(None));
        let bytes = encode(&message).unwrap();
        assert_eq!(bytes.iter().filter(|b| **b == b'\n').count(), 1);
        assert_eq!(*bytes.last().unwrap(), b'\n');

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, message);
        assert_eq!(decoded.route.toid, None);
    }

    #[test]
    fn command_arguments_and_selection_survive() {
        let body = Body::Cmd {
            cmd: "insert".to_string(),
            args: serde_json::json!({ "characters": "x" }),
            sel: vec![Region::new(4, 4), Region::new(10, 12)],
        };
        let message = WireMessage::new(body.clone(), route(Some(1)));
        let decoded = decode(&encode(&message).unwrap()).unwrap();
        assert_eq!(decoded.body, body);
    }

    #[test]
    fn rejects_garbage_and_unknown_types() {
        assert!(matches!(decode(b"{'type': 'start'}"), Err(Error::Codec(_))));
        assert!(matches!(
            decode(br#"{"type": "shutdown", "fromhost": "H", "fromport": 1, "fromid": 1}"#),
            Err(Error::Codec(_))
        ));
        assert!(matches!(
            decode(br#"{"type": "startresponse", "accept": 2, "fromhost": "H", "fromport": 1, "fromid": 1}"#),
            Err(Error::Codec(_))
        ));
    }

    #[test]
    fn routing_fields_are_required() {
        assert!(decode(br#"{"type": "startresponse", "accept": 1}"#).is_err());
    }
}
