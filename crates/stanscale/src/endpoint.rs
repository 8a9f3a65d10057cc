//! Monitoring endpoint URLs.

const HTTP_PROTOCOL: &str = "http";
const HTTPS_PROTOCOL: &str = "https";

/// Base `channelsz` endpoint of the streaming server, e.g.
/// `http://stan:8222/streaming/channelsz`.
pub fn channels_endpoint(host: &str, use_https: bool) -> String {
    let protocol = if use_https {
        HTTPS_PROTOCOL
    } else {
        HTTP_PROTOCOL
    };
    format!("{protocol}://{host}/streaming/channelsz")
}

/// Channel endpoint including subscriber detail for `subject`.
pub fn channel_endpoint(host: &str, use_https: bool, subject: &str) -> String {
    format!(
        "{}?channel={subject}&subs=1",
        channels_endpoint(host, use_https)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_endpoint_http() {
        assert_eq!(
            channels_endpoint("stan:8222", false),
            "http://stan:8222/streaming/channelsz"
        );
    }

    #[test]
    fn base_endpoint_https() {
        assert_eq!(
            channels_endpoint("stan.example.com", true),
            "https://stan.example.com/streaming/channelsz"
        );
    }

    #[test]
    fn channel_endpoint_requests_subscribers() {
        assert_eq!(
            channel_endpoint("stan:8222", false, "orders"),
            "http://stan:8222/streaming/channelsz?channel=orders&subs=1"
        );
    }
}
