//! Public object URL resolution.

/// Region whose endpoint carries no region label.
pub const LEGACY_REGION: &str = "us-east-1";

/// Build the public URL of `key` in `bucket`.
///
/// Without an endpoint the AWS host for `region` is used. Key segments are
/// percent-encoded; `/` is kept as the separator.
pub fn public_url(
    endpoint: Option<&str>,
    region: &str,
    bucket: &str,
    key: &str,
    path_style: bool,
) -> String {
    let key = encode_key(key);
    let endpoint = endpoint.map(|e| e.trim_end_matches('/'));

    match (endpoint, path_style) {
        (Some(endpoint), true) => format!("{endpoint}/{bucket}/{key}"),
        (Some(endpoint), false) => match endpoint.split_once("://") {
            Some((scheme, host)) => format!("{scheme}://{bucket}.{host}/{key}"),
            None => format!("https://{bucket}.{endpoint}/{key}"),
        },
        (None, true) => format!("https://{}/{bucket}/{key}", aws_host(region)),
        (None, false) => format!("https://{bucket}.{}/{key}", aws_host(region)),
    }
}

fn aws_host(region: &str) -> String {
    if region == LEGACY_REGION {
        "s3.amazonaws.com".to_string()
    } else {
        format!("s3.{region}.amazonaws.com")
    }
}

fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
