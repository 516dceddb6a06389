//! Declarative route access rules.
//!
//! An ordered list of (path pattern, requirement) pairs evaluated top-down;
//! the first matching rule wins. The policy holds no mutable state and never
//! creates sessions: every request proves its identity through the bearer
//! token alone.

use super::principal::{Principal, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Public,
    HasAnyRole(&'static [Role]),
    Authenticated,
}

#[derive(Debug, Clone, Copy)]
struct Rule {
    pattern: &'static str,
    requirement: Requirement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Granted,
    Unauthorized,
    Forbidden,
}

#[derive(Debug, Clone)]
pub struct AccessPolicy {
    rules: Vec<Rule>,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            rules: vec![
                // Registration and authentication are reachable without a token.
                Rule {
                    pattern: "/users/register",
                    requirement: Requirement::Public,
                },
                Rule {
                    pattern: "/authenticate",
                    requirement: Requirement::Public,
                },
                // Diagnostic endpoint stays public so probes work unauthenticated.
                Rule {
                    pattern: "/health",
                    requirement: Requirement::Public,
                },
                Rule {
                    pattern: "/admin/**",
                    requirement: Requirement::HasAnyRole(&[Role::Admin]),
                },
                Rule {
                    pattern: "/users/**",
                    requirement: Requirement::HasAnyRole(&[Role::User, Role::Admin]),
                },
                Rule {
                    pattern: "/**",
                    requirement: Requirement::Authenticated,
                },
            ],
        }
    }
}

impl AccessPolicy {
    /// Decide whether `principal` may reach `path`.
    ///
    /// Missing identity on a protected route is `Unauthorized`; present but
    /// insufficient identity is `Forbidden`. The two are never conflated.
    #[must_use]
    pub fn evaluate(&self, path: &str, principal: Option<&Principal>) -> Decision {
        for rule in &self.rules {
            if !pattern_matches(rule.pattern, path) {
                continue;
            }
            return match rule.requirement {
                Requirement::Public => Decision::Granted,
                Requirement::Authenticated => {
                    if principal.is_some() {
                        Decision::Granted
                    } else {
                        Decision::Unauthorized
                    }
                }
                Requirement::HasAnyRole(roles) => match principal {
                    None => Decision::Unauthorized,
                    Some(principal) if roles.iter().any(|role| principal.has_role(*role)) => {
                        Decision::Granted
                    }
                    Some(_) => Decision::Forbidden,
                },
            };
        }

        // The trailing /** rule makes this unreachable; deny if it is removed.
        Decision::Unauthorized
    }
}

/// `/users/**` matches `/users` and everything below it; patterns without a
/// trailing `/**` match exactly.
fn pattern_matches(pattern: &str, path: &str) -> bool {
    if let Some(prefix) = pattern.strip_suffix("/**") {
        if prefix.is_empty() {
            return true;
        }
        path == prefix
            || path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    } else {
        path == pattern
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64) -> Principal {
        Principal {
            user_id: id,
            username: format!("user{id}"),
            roles: vec![Role::User],
        }
    }

    fn admin() -> Principal {
        Principal {
            user_id: 1,
            username: "root".to_string(),
            roles: vec![Role::Admin],
        }
    }

    #[test]
    fn pattern_matching() {
        assert!(pattern_matches("/authenticate", "/authenticate"));
        assert!(!pattern_matches("/authenticate", "/authenticate/extra"));

        assert!(pattern_matches("/users/**", "/users"));
        assert!(pattern_matches("/users/**", "/users/1"));
        assert!(pattern_matches("/users/**", "/users/1/profile"));
        assert!(!pattern_matches("/users/**", "/usersx"));
        assert!(!pattern_matches("/users/**", "/admin/users"));

        assert!(pattern_matches("/**", "/"));
        assert!(pattern_matches("/**", "/anything/at/all"));
    }

    #[test]
    fn public_routes_need_no_principal() {
        let policy = AccessPolicy::default();
        assert_eq!(policy.evaluate("/users/register", None), Decision::Granted);
        assert_eq!(policy.evaluate("/authenticate", None), Decision::Granted);
        assert_eq!(policy.evaluate("/health", None), Decision::Granted);
    }

    #[test]
    fn registration_rule_wins_over_the_users_subtree() {
        // Rule order matters: /users/register must match before /users/**.
        let policy = AccessPolicy::default();
        assert_eq!(policy.evaluate("/users/register", None), Decision::Granted);
        assert_eq!(policy.evaluate("/users/1", None), Decision::Unauthorized);
    }

    #[test]
    fn users_subtree_requires_user_or_admin() {
        let policy = AccessPolicy::default();
        assert_eq!(policy.evaluate("/users/1", None), Decision::Unauthorized);
        assert_eq!(
            policy.evaluate("/users/1", Some(&user(2))),
            Decision::Granted
        );
        assert_eq!(policy.evaluate("/users", Some(&admin())), Decision::Granted);
    }

    #[test]
    fn admin_subtree_requires_admin() {
        let policy = AccessPolicy::default();
        assert_eq!(policy.evaluate("/admin/reports", None), Decision::Unauthorized);
        assert_eq!(
            policy.evaluate("/admin/reports", Some(&user(2))),
            Decision::Forbidden
        );
        assert_eq!(
            policy.evaluate("/admin/reports", Some(&admin())),
            Decision::Granted
        );
    }

    #[test]
    fn everything_else_requires_authentication() {
        let policy = AccessPolicy::default();
        assert_eq!(policy.evaluate("/metrics", None), Decision::Unauthorized);
        assert_eq!(
            policy.evaluate("/metrics", Some(&user(2))),
            Decision::Granted
        );
        assert_eq!(policy.evaluate("/", None), Decision::Unauthorized);
    }
}
