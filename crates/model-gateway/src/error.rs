use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model API returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("failed to parse model response: {source}\n  body: {body}")]
    Parse {
        body: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("model response contained no choices")]
    EmptyResponse,

    #[error("scripted backend exhausted: no reply queued for call #{0}")]
    ScriptExhausted(usize),
}
