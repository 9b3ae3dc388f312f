//! Encode command implementation.
//!
//! The offline twin of the submission form: prints the proxy URL a
//! legacy client should be pointed at, without a running server.

use feedgate_codec::{Codec, ContentOption};
use url::Url;

/// Runs the encode command.
pub fn run(
    target: &Url,
    option: &str,
    key: &str,
    base: Url,
) -> Result<(), Box<dyn std::error::Error>> {
    let option = ContentOption::parse(Some(option));
    let codec = Codec::new(base, key, false);
    println!("{}", codec.encode_inline(target, option));
    Ok(())
}
