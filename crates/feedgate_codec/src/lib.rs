//! # Feedgate Codec
//!
//! The reversible URL-encoding scheme at the heart of the gateway.
//!
//! Every resource URL a feed mentions is rewritten into an opaque token
//! that routes back through the proxy:
//!
//! ```text
//! {base}/{token}/{sanitized-filename}?key={caller-key}&option={kind}
//! ```
//!
//! Two token encodings exist. The *inline* token is a pure function of the
//! target URL and reverses without any lookup. The *indexed* token
//! (`KV-` + content hash) is the fallback for legacy clients whose inline
//! URL would blow past their length tolerance; it resolves through the
//! encrypted store's reserved cache scope.
//!
//! Before tokenization the target is cleaned: known ad/analytics wrappers
//! are stripped down to the real hosting URL, and the advertised filename
//! is squeezed into something a legacy filesystem accepts.
//!
//! Decoding never fails loudly. A token that does not parse, or an indexed
//! token with no surviving cache entry, decodes to `None` and the caller
//! treats the request as having no target.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod filename;
mod option;
mod strip;

pub use codec::{Codec, KV_PREFIX, PATH_MARKER, URL_LENGTH_BUDGET};
pub use filename::{sanitize_file_name, MAX_FILE_NAME_LEN};
pub use option::ContentOption;
pub use strip::{PathWrapperRule, StripRules};
