use thiserror::Error;
use wasm_bindgen::JsValue;

/// Failures surfaced to the presentation layer.
///
/// Invalid key presses are deliberately absent: a press that matches no pending
/// note (or lands outside the timing window) is ignored, not reported.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("chart has no notes")]
    EmptyChart,

    #[error("unknown lane key '{0}'")]
    UnknownKey(String),

    #[error("failed to parse JSON input")]
    Parse(#[from] serde_json::Error),

    #[error("audio fetch failed with HTTP status {0}")]
    AudioStatus(u16),

    #[error("audio fetch failed: {0}")]
    AudioFetch(String),

    #[error("audio decode failed: {0}")]
    AudioDecode(String),

    #[error("no audio available")]
    AudioUnavailable,

    #[error("sync channel is closed")]
    ChannelClosed,

    #[error("sync transport error: {0}")]
    Transport(String),

    #[error("browser API error: {0}")]
    Js(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap a thrown JS value. Strings are kept verbatim, everything else is debug-printed.
    pub fn js(value: JsValue) -> Self {
        Error::Js(value.as_string().unwrap_or_else(|| format!("{value:?}")))
    }
}

impl From<Error> for JsValue {
    fn from(err: Error) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failure() {
        assert_eq!(Error::UnknownKey("q".into()).to_string(), "unknown lane key 'q'");
        assert_eq!(Error::AudioStatus(404).to_string(), "audio fetch failed with HTTP status 404");
    }

    #[test]
    fn parse_errors_convert() {
        let err: Error = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, Error::Parse(_)));
    }
}
