//! Feed retrieval and parsing.
//!
//! Every source in the registry goes through the same two steps:
//!
//! 1. **Fetch** ([`fetch`]): download the document with a hard deadline and
//!    convert any failure into an empty result for that source
//! 2. **Parse** ([`parse`]): pull raw entries out of RSS 2.0, RSS 1.0 or Atom
//!    XML without validating the document
//!
//! # Failure containment
//!
//! | Failure | Where it stops | Effect |
//! |---------|----------------|--------|
//! | DNS / connect / TLS error | [`fetch::fetch_source`] | source yields nothing |
//! | Non-2xx status | [`fetch::fetch_source`] | source yields nothing |
//! | Deadline exceeded | [`fetch::fetch_source`] | source yields nothing |
//! | Malformed XML after N entries | [`parse::parse_feed`] | first N entries kept |

pub mod fetch;
pub mod parse;
