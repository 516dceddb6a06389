//! # Gardisto (User Management & Stateless Authentication)
//!
//! `gardisto` guards a small user-management CRUD API with stateless,
//! token-based authentication.
//!
//! ## Tokens
//!
//! Authentication issues a signed, self-contained token (HMAC-SHA256 over a
//! process-wide key) carrying the subject, roles, and a bounded validity
//! window. Nothing is stored server-side: there is no session table, no
//! revocation list, and no refresh flow. Every request must present its token
//! and is authenticated independently, which keeps the filter chain
//! horizontally scalable at the cost of re-checking each request.
//!
//! ## Roles & Access
//!
//! Users carry a single role (`USER` or `ADMIN`). Route access is decided by
//! an ordered, first-match rule list: registration, authentication, and the
//! health endpoint are public; `/admin/**` requires `ADMIN`; `/users/**`
//! requires `USER` or `ADMIN`; everything else requires any authenticated
//! principal. A request's effective roles are re-read from the user store
//! during token validation, so role changes apply on the next request even
//! though tokens embed the roles they were issued with.
//!
//! ## Staleness Window
//!
//! The `authorities` list returned at login reflects the role at issuance and
//! is only used by clients to gate UI. Server-side decisions never trust it.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        // Should be a hex string (full SHA-1 is 40 chars, but could be short)
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
