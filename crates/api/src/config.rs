/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development except the
/// webhook secret, which has no safe default: when unset, every signed
/// ingestion request is rejected (the gate fails closed).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Graceful shutdown timeout in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Header carrying the HMAC signature on ingestion requests.
    pub signature_header: String,
    /// Shared secret for webhook signature verification. Empty when unset.
    pub webhook_secret: String,
    /// Number of transform workers competing on the main channel.
    pub worker_count: usize,
    /// Buffer capacity of the main message channel.
    pub main_channel_capacity: usize,
    /// Buffer capacity of the success and dead-letter channels.
    pub output_channel_capacity: usize,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default       |
    /// |--------------------------|---------------|
    /// | `HOST`                   | `0.0.0.0`     |
    /// | `PORT`                   | `3000`        |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`          |
    /// | `SHUTDOWN_TIMEOUT_SECS`  | `30`          |
    /// | `SIGNATURE_HEADER`       | `X-Signature` |
    /// | `WEBHOOK_SECRET`         | (empty)       |
    /// | `WORKER_COUNT`           | `4`           |
    /// | `MAIN_CHANNEL_CAPACITY`  | `1024`        |
    /// | `OUTPUT_CHANNEL_CAPACITY`| `1024`        |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let signature_header = std::env::var("SIGNATURE_HEADER")
            .unwrap_or_else(|_| intake_core::signature::DEFAULT_SIGNATURE_HEADER.into());

        let webhook_secret = std::env::var("WEBHOOK_SECRET").unwrap_or_default();
        if webhook_secret.is_empty() {
            tracing::warn!("WEBHOOK_SECRET is not set; all signed ingestion will be rejected");
        }

        let worker_count: usize = std::env::var("WORKER_COUNT")
            .unwrap_or_else(|_| "4".into())
            .parse()
            .expect("WORKER_COUNT must be a valid usize");

        let main_channel_capacity: usize = std::env::var("MAIN_CHANNEL_CAPACITY")
            .unwrap_or_else(|_| "1024".into())
            .parse()
            .expect("MAIN_CHANNEL_CAPACITY must be a valid usize");

        let output_channel_capacity: usize = std::env::var("OUTPUT_CHANNEL_CAPACITY")
            .unwrap_or_else(|_| "1024".into())
            .parse()
            .expect("OUTPUT_CHANNEL_CAPACITY must be a valid usize");

        Self {
            host,
            port,
            request_timeout_secs,
            shutdown_timeout_secs,
            signature_header,
            webhook_secret,
            worker_count,
            main_channel_capacity,
            output_channel_capacity,
        }
    }
}
