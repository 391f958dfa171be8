use serde_json::Value;

use crate::error::FetchError;

/// Messages the explorer pairs with `status: "0"` when a list is simply empty.
const EMPTY_LIST_MESSAGES: &[&str] = &["No transactions found", "No records found"];

/// Unwrap an explorer response body into its `result` payload.
///
/// Two envelope styles are accepted:
/// - `status`/`message`/`result`: anything but status `"1"` is an
///   `UpstreamError`, except the empty-list answer, which yields `[]`.
/// - JSON-RPC (`proxy` module): an `error` object is an `UpstreamError`.
pub fn unwrap_envelope(body: Value) -> Result<Value, FetchError> {
    let Value::Object(mut envelope) = body else {
        return Err(FetchError::MalformedResponse(
            "expected a JSON object envelope".to_string(),
        ));
    };

    if let Some(status) = envelope.get("status") {
        let ok = match status {
            Value::String(s) => s == "1",
            Value::Number(n) => n.as_i64() == Some(1),
            _ => false,
        };
        let result = envelope.remove("result");

        if ok {
            return result.ok_or_else(|| {
                FetchError::MalformedResponse("envelope is missing 'result'".to_string())
            });
        }

        let message = envelope
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();

        if let Some(Value::Array(items)) = &result {
            if items.is_empty() && EMPTY_LIST_MESSAGES.iter().any(|m| message.starts_with(m)) {
                return Ok(Value::Array(Vec::new()));
            }
        }

        return Err(match result {
            Some(Value::String(detail)) if !detail.is_empty() && detail != message => {
                FetchError::UpstreamError(format!("{}: {}", message, detail))
            }
            _ => FetchError::UpstreamError(message),
        });
    }

    if let Some(error) = envelope.remove("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(FetchError::UpstreamError(message));
    }

    envelope
        .remove("result")
        .ok_or_else(|| FetchError::MalformedResponse("response has no 'result'".to_string()))
}
