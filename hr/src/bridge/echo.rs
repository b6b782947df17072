//! Minimal protocol-conformant engine
//!
//! Answers every request with its own payload and the reload kind with
//! `{reloaded: true}`. Notifications and responses are ignored.

use eyre::{Context, Result};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::protocol::{Direction, Envelope, success_payload};

/// Serve the echo protocol until `reader` hits EOF
pub async fn run_echo_engine<R, W>(reader: R, mut writer: W, reload_kind: &str) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!(%reload_kind, "Echo engine started");
    let mut lines = BufReader::new(reader).lines();
    let mut answered = 0u64;

    while let Some(line) = lines.next_line().await.context("Failed to read request")? {
        let raw: Value = match serde_json::from_str(line.trim()) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Echo engine: undecodable line");
                continue;
            }
        };
        let envelope = match Envelope::from_value(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "Echo engine: malformed message");
                continue;
            }
        };
        if !matches!(envelope.direction, None | Some(Direction::Request)) {
            debug!(kind = %envelope.kind, "Echo engine: ignoring non-request");
            continue;
        }

        let result = if envelope.kind == reload_kind {
            json!({"reloaded": true})
        } else {
            envelope.data
        };
        let response = Envelope::response(envelope.kind, envelope.correlation_id, success_payload(result));
        let mut out = response.to_line().context("Failed to encode response")?;
        out.push('\n');
        writer.write_all(out.as_bytes()).await.context("Failed to write response")?;
        writer.flush().await.context("Failed to flush response")?;
        answered += 1;
    }

    info!(answered, "Echo engine: input closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(input: &str) -> Vec<Value> {
        let mut output = Vec::new();
        run_echo_engine(input.as_bytes(), &mut output, "config/reload").await.unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_echoes_request_payload() {
        let responses = run(
            r#"{"messageType":"ping","messageId":"1","data":{"n":1},"direction":"request"}
"#,
        )
        .await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["messageId"], "1");
        assert_eq!(responses[0]["direction"], "response");
        assert_eq!(responses[0]["data"], json!({"error": false, "data": {"n": 1}}));
    }

    #[tokio::test]
    async fn test_reload_and_skips() {
        let responses = run(concat!(
            "not json\n",
            r#"{"messageType":"configUpdate","messageId":"2","data":null,"direction":"notification"}"#,
            "\n",
            r#"{"messageType":"config/reload","messageId":"3"}"#,
            "\n",
        ))
        .await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["messageId"], "3");
        assert_eq!(responses[0]["data"]["data"], json!({"reloaded": true}));
    }
}
