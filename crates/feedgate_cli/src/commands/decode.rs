//! Decode command implementation.

use feedgate_codec::Codec;
use url::Url;

/// Runs the decode command.
///
/// Only inline tokens decode offline; indexed tokens resolve through
/// the running server's store.
pub async fn run(proxied: &Url, base: Url) -> Result<(), Box<dyn std::error::Error>> {
    let codec = Codec::new(base, "", false);
    match codec.decode(proxied).await {
        Some(target) => {
            println!("{target}");
            Ok(())
        }
        None => Err("no target in this URL (indexed tokens need the server's store)".into()),
    }
}
