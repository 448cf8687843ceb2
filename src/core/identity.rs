/// Caller identity asserted by the upstream gateway.
///
/// The gateway has already validated the caller's token before the request
/// reaches this server. It may forward selected JWT claims as `X-JWT-Claim-*`
/// headers. Nothing here is verified; the values are advisory.

use serde::Serialize;
use std::collections::HashMap;

const CLAIM_SUB: &str = "x-jwt-claim-sub";
const CLAIM_EMAIL: &str = "x-jwt-claim-email";
const CLAIM_PREFERRED_USERNAME: &str = "x-jwt-claim-preferred-username";
const FORWARDED_USER: &str = "x-forwarded-user";
const AUTHORIZATION: &str = "authorization";

/// Header names consulted by [`extract`], lower-cased.
pub const IDENTITY_HEADERS: [&str; 5] = [
    CLAIM_SUB,
    CLAIM_EMAIL,
    CLAIM_PREFERRED_USERNAME,
    FORWARDED_USER,
    AUTHORIZATION,
];

/// Identity claims for a single request.
///
/// The bearer token itself is never kept, only the fact that one was sent.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IdentityContext {
    pub subject: Option<String>,
    pub email: Option<String>,
    pub preferred_username: Option<String>,
    pub forwarded_user: Option<String>,
    pub has_bearer_token: bool,
}

/// Build an identity from request metadata keyed by lower-cased header name.
///
/// Returns `None` when none of the recognized keys are present, so callers can
/// tell "no identity asserted" apart from an identity with empty claims.
pub fn extract(metadata: &HashMap<String, String>) -> Option<IdentityContext> {
    if !IDENTITY_HEADERS.iter().any(|key| metadata.contains_key(*key)) {
        return None;
    }

    let claim = |key: &str| metadata.get(key).cloned();
    Some(IdentityContext {
        subject: claim(CLAIM_SUB),
        email: claim(CLAIM_EMAIL),
        preferred_username: claim(CLAIM_PREFERRED_USERNAME),
        forwarded_user: claim(FORWARDED_USER),
        has_bearer_token: metadata.contains_key(AUTHORIZATION),
    })
}
