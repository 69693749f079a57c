//! Logging bootstrap shared by both binaries.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Install the global compact `tracing` subscriber.
///
/// Honours `RUST_LOG`; falls back to `default_directive` (e.g. "info").
/// Calling it twice is harmless: the second install is ignored.
pub fn init_logging(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .try_init();
}

/// Hide the `apikey` query value before a URL reaches the logs
pub fn mask_api_key(url: &str) -> String {
    match url.find("apikey=") {
        Some(start) => {
            let value_start = start + "apikey=".len();
            let value_end = url[value_start..]
                .find('&')
                .map(|offset| value_start + offset)
                .unwrap_or(url.len());
            format!("{}***HIDDEN***{}", &url[..value_start], &url[value_end..])
        }
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_api_key_middle() {
        let url = "https://api.etherscan.io/v2/api?module=account&apikey=SECRET&chainid=1";
        assert_eq!(
            mask_api_key(url),
            "https://api.etherscan.io/v2/api?module=account&apikey=***HIDDEN***&chainid=1"
        );
    }

    #[test]
    fn test_mask_api_key_last_and_absent() {
        assert_eq!(mask_api_key("https://x/api?apikey=K"), "https://x/api?apikey=***HIDDEN***");
        assert_eq!(mask_api_key("https://x/api?a=1"), "https://x/api?a=1");
    }
}
