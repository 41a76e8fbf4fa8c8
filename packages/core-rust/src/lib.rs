//! `claimgate` core: login scopes, per-request claims context, JWT payload
//! extraction and RS256 repacking.

pub mod claims;
pub mod context;
pub mod error;
pub mod extract;
pub mod repack;
pub mod scope;

pub use claims::{Audience, StandardClaims, Validate};
pub use context::RequestContext;
pub use error::{ClaimsError, ExtractError, SigningError};
pub use extract::{extract_context, outbound_headers, InboundHeaders};
pub use repack::{SigningKeyProvider, StaticKeyProvider, TokenRepacker};
pub use scope::{clearance_level_of, LoginScope};
