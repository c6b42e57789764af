//! Route-pattern access policy.
//!
//! An ordered rule table, first match wins. Patterns are path templates where
//! `*` matches exactly one segment and `**` matches any number of segments
//! (including none), so `/api/notas/**` covers `/api/notas` as well.

use crate::{AuthenticatedIdentity, Role};

/// A compiled path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<String>,
}

impl PathPattern {
    pub fn new(pattern: &str) -> Self {
        Self {
            raw: pattern.to_string(),
            segments: split(pattern).map(str::to_string).collect(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, path: &str) -> bool {
        let path: Vec<&str> = split(path).collect();
        let pattern: Vec<&str> = self.segments.iter().map(String::as_str).collect();
        match_segments(&pattern, &path)
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn match_segments(pattern: &[&str], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((&"**", rest)) => (0..=path.len()).any(|skip| match_segments(rest, &path[skip..])),
        Some((&seg, rest)) => match path.split_first() {
            Some((&head, tail)) => (seg == "*" || seg == head) && match_segments(rest, tail),
            None => false,
        },
    }
}

/// What a route demands of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Public,
    Authenticated,
    AnyRole(Vec<Role>),
}

/// Outcome of evaluating a request against the policy.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// No (valid) identity on a protected route: 401.
    Unauthenticated,
    /// Identity present but lacking the required role: 403.
    Forbidden,
}

#[derive(Debug, Clone)]
struct AccessRule {
    pattern: PathPattern,
    requirement: Requirement,
}

/// Static access table, built once at startup.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    rules: Vec<AccessRule>,
    fallback: Requirement,
}

impl AccessPolicy {
    /// Empty table with `fallback` applied to unmatched paths.
    pub fn new(fallback: Requirement) -> Self {
        Self { rules: Vec::new(), fallback }
    }

    pub fn rule(mut self, pattern: &str, requirement: Requirement) -> Self {
        self.rules.push(AccessRule {
            pattern: PathPattern::new(pattern),
            requirement,
        });
        self
    }

    /// The application's table: public auth and docs, role-scoped resources,
    /// anything else requires an authenticated caller.
    pub fn standard() -> Self {
        let user_or_admin = Requirement::AnyRole(vec![Role::User, Role::Admin]);
        let admin = Requirement::AnyRole(vec![Role::Admin]);

        Self::new(Requirement::Authenticated)
            .rule("/health", Requirement::Public)
            .rule("/swagger-ui/**", Requirement::Public)
            .rule("/v3/api-docs/**", Requirement::Public)
            .rule("/api/auth/**", Requirement::Public)
            .rule("/api/notas/**", user_or_admin.clone())
            .rule("/api/perfiles/**", user_or_admin)
            .rule("/api/usuarios/**", admin.clone())
            .rule("/api/admin/**", admin)
    }

    pub fn requirement_for(&self, path: &str) -> &Requirement {
        self.rules
            .iter()
            .find(|r| r.pattern.matches(path))
            .map(|r| &r.requirement)
            .unwrap_or(&self.fallback)
    }

    /// Preflight (`OPTIONS`) requests are always allowed.
    pub fn evaluate(
        &self,
        method: &str,
        path: &str,
        identity: Option<&AuthenticatedIdentity>,
    ) -> Decision {
        if method.eq_ignore_ascii_case("OPTIONS") {
            return Decision::Allow;
        }

        match (self.requirement_for(path), identity) {
            (Requirement::Public, _) => Decision::Allow,
            (_, None) => Decision::Unauthenticated,
            (Requirement::Authenticated, Some(_)) => Decision::Allow,
            (Requirement::AnyRole(roles), Some(identity)) => {
                if identity.has_any_role(roles) {
                    Decision::Allow
                } else {
                    Decision::Forbidden
                }
            }
        }
    }
}
