/// A CircleCI API token.
///
/// Wrapped in a newtype so the raw value never shows up in `Debug` output
/// or log lines.
#[derive(Clone)]
pub struct Token(String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Token(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_the_token() {
        let token = Token::from("super-secret");
        assert_eq!(format!("{token:?}"), "Token(***)");
    }

    #[test]
    fn as_str_returns_raw_value() {
        let token = Token::from("abc123".to_string());
        assert_eq!(token.as_str(), "abc123");
    }
}
