use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read rules file {path}: {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse rules JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Failed to parse rules YAML: {0}")]
    ParseYaml(#[from] serde_yml::Error),
}

#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("Invalid Pub/Sub envelope: {0}")]
    InvalidEnvelope(#[source] serde_json::Error),

    #[error("Message data is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Invalid budget alert body: {0}")]
    InvalidBody(#[source] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Metadata server token request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Project search request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Project search returned {code}: {body}")]
    Status { code: u16, body: String },
}

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Org policy request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Org policy API returned {code}: {body}")]
    Status { code: u16, body: String },
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Publish request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Event serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Pub/Sub API returned {code}: {body}")]
    Status { code: u16, body: String },
}

#[derive(Error, Debug)]
pub enum EmailError {
    #[error("{0}")]
    Config(String),

    #[error("Invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}
