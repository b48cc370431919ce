//! The canonical command every front-end produces.

use crate::commands::error::CommandError;
use bytes::Bytes;
use std::collections::BTreeMap;

/// A protocol-agnostic request: a verb, ordered positional arguments and
/// named options.
///
/// Positional front-ends (RESP, WebSocket) put everything, options included,
/// into `args` (`SET k v EX 10`). Front-ends with named fields (HTTP JSON)
/// may carry options separately (`ex = 10`). The verb is stored upper-case,
/// option names lower-case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: String,
    args: Vec<Bytes>,
    options: BTreeMap<String, Bytes>,
}

impl Command {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: name.as_ref().to_ascii_uppercase(),
            args: Vec::new(),
            options: BTreeMap::new(),
        }
    }

    /// Builds a command from a token list whose first token is the verb.
    pub fn from_tokens(tokens: Vec<Bytes>) -> Result<Self, CommandError> {
        let mut tokens = tokens.into_iter();
        let verb = tokens
            .next()
            .ok_or_else(|| CommandError::invalid("empty command"))?;
        let name = std::str::from_utf8(&verb)
            .map_err(|_| CommandError::invalid("invalid command name"))?;

        Ok(Self::new(name).with_args(tokens))
    }

    pub fn with_arg(mut self, arg: impl Into<Bytes>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Bytes>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_option(mut self, name: impl AsRef<str>, value: impl Into<Bytes>) -> Self {
        self.options
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[Bytes] {
        &self.args
    }

    pub fn options(&self) -> &BTreeMap<String, Bytes> {
        &self.options
    }

    pub fn option(&self, name: &str) -> Option<&Bytes> {
        self.options.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_normalizes_case() {
        let cmd = Command::new("set")
            .with_arg("k")
            .with_arg("v")
            .with_option("EX", "10");

        assert_eq!(cmd.name(), "SET");
        assert_eq!(cmd.args(), &[Bytes::from("k"), Bytes::from("v")]);
        assert_eq!(cmd.option("ex"), Some(&Bytes::from("10")));
    }

    #[test]
    fn test_from_tokens() {
        let cmd = Command::from_tokens(vec![Bytes::from("hkeys"), Bytes::from("h")]).unwrap();
        assert_eq!(cmd.name(), "HKEYS");
        assert_eq!(cmd.args(), &[Bytes::from("h")]);

        assert!(Command::from_tokens(vec![]).is_err());
        assert!(Command::from_tokens(vec![Bytes::from(&b"\xff"[..])]).is_err());
    }
}
