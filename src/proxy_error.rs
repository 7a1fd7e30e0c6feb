use serde::Serialize;
use thiserror::Error;

/// Every pipeline failure is reported to the client with this status code.
pub const ERROR_STATUS: u16 = 500;

#[derive(Debug, Error)]
pub enum ProxyError {
  #[error(
    "Missing required cookies: {}. Please provide authentication cookies via Cookie header or X-ChatGPT-Cookies header.",
    .missing.join(", ")
  )]
  MissingCredentials { missing: Vec<String> },

  #[error("Upstream request failed: {message}")]
  Transport { message: String },
}

impl ProxyError {
  pub fn transport(error: reqwest::Error) -> ProxyError {
    ProxyError::Transport {
      message: error.to_string(),
    }
  }
}

/// JSON body sent to the client whenever the pipeline fails.
#[derive(Serialize, Debug, PartialEq)]
pub struct ErrorEnvelope {
  pub error: bool,
  pub message: String,
  pub code: u16,
}

impl From<&ProxyError> for ErrorEnvelope {
  fn from(source: &ProxyError) -> ErrorEnvelope {
    ErrorEnvelope {
      error: true,
      message: source.to_string(),
      code: ERROR_STATUS,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_credentials_message_lists_names() {
    let error = ProxyError::MissingCredentials {
      missing: vec!["cf_clearance".to_string(), "__cf_bm".to_string()],
    };

    let message = error.to_string();
    assert!(message.starts_with("Missing required cookies: cf_clearance, __cf_bm."));
    assert!(message.contains("X-ChatGPT-Cookies"));
  }

  #[test]
  fn envelope_carries_fixed_code() {
    let error = ProxyError::Transport {
      message: "connect timed out".to_string(),
    };
    let envelope = ErrorEnvelope::from(&error);

    assert!(envelope.error);
    assert_eq!(envelope.code, 500);
    assert_eq!(envelope.message, "Upstream request failed: connect timed out");
  }

  #[test]
  fn envelope_serializes_three_fields() {
    let envelope = ErrorEnvelope {
      error: true,
      message: "boom".to_string(),
      code: 500,
    };

    let json: serde_json::Value =
      serde_json::from_str(&serde_json::to_string_pretty(&envelope).unwrap()).unwrap();

    assert_eq!(json["error"], true);
    assert_eq!(json["message"], "boom");
    assert_eq!(json["code"], 500);
    assert_eq!(json.as_object().unwrap().len(), 3);
  }
}
