//! Per-section checks and the shared field validators they use

pub use crate::error::ValidationError;

/// A `[section]` of `config.toml`
///
/// The root [`Config`](crate::Config) validates and merges by delegating to
/// each section.
pub trait ConfigSection: Default {
    /// Every problem in the section, or `Ok` when it can be used as is
    fn validate(&self) -> Result<(), Vec<ValidationError>>;

    /// Overlays `other` onto `self`
    fn merge(&mut self, other: Self);

    /// Table name in `config.toml`
    fn section_name(&self) -> &'static str;
}

pub struct Validator;

impl Validator {
    pub fn in_range<T>(value: T, min: T, max: T, field: &str) -> Result<(), ValidationError>
    where
        T: PartialOrd + std::fmt::Display + Copy,
    {
        if (min..=max).contains(&value) {
            Ok(())
        } else {
            Err(ValidationError::with_value(
                field,
                format!("must be between {} and {}", min, max),
                value,
            ))
        }
    }

    pub fn not_empty(value: &str, field: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::new(field, "must not be empty"));
        }
        Ok(())
    }

    /// A broker endpoint: `ws://` or `wss://` followed by a host
    pub fn ws_url(value: &str, field: &str) -> Result<(), ValidationError> {
        Self::not_empty(value, field)?;
        let rest = value
            .strip_prefix("wss://")
            .or_else(|| value.strip_prefix("ws://"))
            .ok_or_else(|| ValidationError::with_value(field, "must use ws:// or wss://", value))?;

        let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
        let host = authority.rsplit('@').next().unwrap_or(authority);
        if host.is_empty() || host.starts_with(':') {
            return Err(ValidationError::with_value(field, "has no host", value));
        }
        if value.chars().any(char::is_whitespace) {
            return Err(ValidationError::with_value(field, "must not contain whitespace", value));
        }
        Ok(())
    }

    /// Absolute broker path the topic queues hang off, without a trailing `/`
    pub fn destination_prefix(value: &str, field: &str) -> Result<(), ValidationError> {
        if !value.starts_with('/') {
            return Err(ValidationError::with_value(field, "must start with '/'", value));
        }
        if value.len() > 1 && value.ends_with('/') {
            return Err(ValidationError::with_value(field, "must not end with '/'", value));
        }
        if value.chars().any(char::is_whitespace) {
            return Err(ValidationError::with_value(field, "must not contain whitespace", value));
        }
        Ok(())
    }

    /// Bearer token, if one is set; never echoed back
    pub fn token(value: Option<&str>, field: &str) -> Result<(), ValidationError> {
        match value {
            None => Ok(()),
            Some(token) if token.trim().is_empty() => {
                Err(ValidationError::new(field, "is set but empty"))
            }
            Some(token) if token.chars().any(|c| c.is_whitespace() || c.is_control()) => {
                Err(ValidationError::new(field, "must not contain whitespace"))
            }
            Some(_) => Ok(()),
        }
    }

    pub fn collect_errors(
        results: Vec<Result<(), ValidationError>>,
    ) -> Result<(), Vec<ValidationError>> {
        let errors: Vec<ValidationError> = results.into_iter().filter_map(Result::err).collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_range_bounds_are_inclusive() {
        assert!(Validator::in_range(1, 1, 300, "server.connect_timeout_secs").is_ok());
        assert!(Validator::in_range(300, 1, 300, "server.connect_timeout_secs").is_ok());

        let err = Validator::in_range(0, 1, 300, "server.connect_timeout_secs").unwrap_err();
        assert_eq!(err.value.as_deref(), Some("0"));
        assert!(Validator::in_range(1.5, 2.0, 10.0, "reconnect.multiplier").is_err());
    }

    #[test]
    fn test_ws_url() {
        for ok in [
            "ws://localhost:6060/ws",
            "wss://books.example.org/ws",
            "wss://reader@books.example.org",
            "ws://[::1]:6060/ws",
        ] {
            assert!(Validator::ws_url(ok, "server.url").is_ok(), "{}", ok);
        }

        let cases = [
            ("", "must not be empty"),
            ("http://localhost/ws", "must use ws:// or wss://"),
            ("localhost:6060", "must use ws:// or wss://"),
            ("ws:///ws", "has no host"),
            ("wss://:443/ws", "has no host"),
            ("ws://books local/ws", "must not contain whitespace"),
        ];
        for (url, message) in cases {
            let err = Validator::ws_url(url, "server.url").unwrap_err();
            assert_eq!(err.message, message, "{}", url);
        }
    }

    #[test]
    fn test_destination_prefix() {
        assert!(Validator::destination_prefix("/user/queue", "p").is_ok());
        assert!(Validator::destination_prefix("/", "p").is_ok());
        assert!(Validator::destination_prefix("user/queue", "p").is_err());
        assert!(Validator::destination_prefix("/user/queue/", "p").is_err());
        assert!(Validator::destination_prefix("/user /queue", "p").is_err());
    }

    #[test]
    fn test_token_is_never_echoed() {
        assert!(Validator::token(None, "server.token").is_ok());
        assert!(Validator::token(Some("eyJhbGciOi.abc.def"), "server.token").is_ok());

        let err = Validator::token(Some("abc def"), "server.token").unwrap_err();
        assert!(err.value.is_none());
        assert!(!err.to_string().contains("abc"));
        assert!(Validator::token(Some("  "), "server.token").is_err());
        assert!(Validator::token(Some("abc\n"), "server.token").is_err());
    }

    #[test]
    fn test_collect_errors_keeps_order() {
        let result = Validator::collect_errors(vec![
            Ok(()),
            Err(ValidationError::new("server.url", "must not be empty")),
            Err(ValidationError::new("server.token", "is set but empty")),
        ]);
        let fields: Vec<String> = result.unwrap_err().into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["server.url", "server.token"]);
    }
}
