//! Typed command requests.
//!
//! [`Request::parse`] turns a loosely-typed [`Command`] into one of the
//! variants below, checking arity, integer arguments and option combinations.
//! Once a `Request` exists, the command is known to be well-formed and only
//! keyspace state can make it fail.

use crate::commands::command::Command;
use crate::commands::error::CommandError;
use crate::storage::SetCondition;
use bytes::Bytes;
use std::time::Duration;

/// Largest accepted relative TTL (about one hundred years).
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// A validated command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    // Keys and scalars
    Set {
        key: Bytes,
        value: Bytes,
        ttl: Option<Duration>,
        condition: SetCondition,
    },
    Get { key: Bytes },
    Del { keys: Vec<Bytes> },
    Exists { keys: Vec<Bytes> },
    IncrBy { key: Bytes, delta: i64 },
    Expire { key: Bytes, ttl: Duration },
    Ttl { key: Bytes },
    PTtl { key: Bytes },
    Persist { key: Bytes },
    Type { key: Bytes },
    Keys { pattern: Bytes },

    // Hashes
    HSet { key: Bytes, pairs: Vec<(Bytes, Bytes)> },
    HGet { key: Bytes, field: Bytes },
    HDel { key: Bytes, fields: Vec<Bytes> },
    HKeys { key: Bytes },
    HVals { key: Bytes },
    HGetAll { key: Bytes },
    HLen { key: Bytes },
    HExists { key: Bytes, field: Bytes },

    // Server
    Ping { message: Option<Bytes> },
    Echo { message: Bytes },
    DbSize,
    FlushDb,
    Info,
}

impl Request {
    /// Validates `cmd` into a typed request.
    pub fn parse(cmd: &Command) -> Result<Self, CommandError> {
        let name = cmd.name();
        let mut args = Args::new(name, cmd.args());

        let request = match name {
            "SET" => return parse_set(cmd, args),
            "GET" => Request::Get { key: args.key()? },
            "DEL" => Request::Del { keys: args.keys()? },
            "EXISTS" => Request::Exists { keys: args.keys()? },
            "INCR" => Request::IncrBy {
                key: args.key()?,
                delta: 1,
            },
            "DECR" => Request::IncrBy {
                key: args.key()?,
                delta: -1,
            },
            "INCRBY" => Request::IncrBy {
                key: args.key()?,
                delta: args.integer()?,
            },
            "DECRBY" => {
                let key = args.key()?;
                let delta = args
                    .integer()?
                    .checked_neg()
                    .ok_or_else(CommandError::not_an_integer)?;
                Request::IncrBy { key, delta }
            }
            "EXPIRE" => Request::Expire {
                key: args.key()?,
                ttl: expire_ttl(args.integer()?, Duration::from_secs, name)?,
            },
            "PEXPIRE" => Request::Expire {
                key: args.key()?,
                ttl: expire_ttl(args.integer()?, Duration::from_millis, name)?,
            },
            "TTL" => Request::Ttl { key: args.key()? },
            "PTTL" => Request::PTtl { key: args.key()? },
            "PERSIST" => Request::Persist { key: args.key()? },
            "TYPE" => Request::Type { key: args.key()? },
            "KEYS" => Request::Keys {
                pattern: args.next()?,
            },

            "HSET" => {
                let key = args.key()?;
                let rest = args.rest();
                if rest.is_empty() || rest.len() % 2 != 0 {
                    return Err(CommandError::arity(name));
                }
                let pairs = rest
                    .chunks_exact(2)
                    .map(|pair| (pair[0].clone(), pair[1].clone()))
                    .collect();
                return Ok(Request::HSet { key, pairs });
            }
            "HGET" => Request::HGet {
                key: args.key()?,
                field: args.next()?,
            },
            "HDEL" => {
                let key = args.key()?;
                let fields = args.rest();
                if fields.is_empty() {
                    return Err(CommandError::arity(name));
                }
                return Ok(Request::HDel { key, fields });
            }
            "HKEYS" => Request::HKeys { key: args.key()? },
            "HVALS" => Request::HVals { key: args.key()? },
            "HGETALL" => Request::HGetAll { key: args.key()? },
            "HLEN" => Request::HLen { key: args.key()? },
            "HEXISTS" => Request::HExists {
                key: args.key()?,
                field: args.next()?,
            },

            "PING" => Request::Ping {
                message: args.optional(),
            },
            "ECHO" => Request::Echo {
                message: args.next()?,
            },
            "DBSIZE" => Request::DbSize,
            "FLUSHDB" | "FLUSHALL" => Request::FlushDb,
            "INFO" => {
                // Sections are accepted and ignored; INFO always reports everything.
                let _ = args.optional();
                Request::Info
            }

            _ => return Err(CommandError::unknown(name)),
        };

        // Named options only mean something to SET.
        if !cmd.options().is_empty() {
            return Err(CommandError::syntax());
        }
        args.finish()?;
        Ok(request)
    }

    /// Whether this request may modify the keyspace.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Request::Set { .. }
                | Request::Del { .. }
                | Request::IncrBy { .. }
                | Request::Expire { .. }
                | Request::Persist { .. }
                | Request::HSet { .. }
                | Request::HDel { .. }
                | Request::FlushDb
        )
    }
}

/// Cursor over positional arguments that reports arity errors for one verb.
struct Args<'a> {
    command: &'a str,
    items: std::slice::Iter<'a, Bytes>,
}

impl<'a> Args<'a> {
    fn new(command: &'a str, items: &'a [Bytes]) -> Self {
        Self {
            command,
            items: items.iter(),
        }
    }

    fn next(&mut self) -> Result<Bytes, CommandError> {
        self.items
            .next()
            .cloned()
            .ok_or_else(|| CommandError::arity(self.command))
    }

    fn optional(&mut self) -> Option<Bytes> {
        self.items.next().cloned()
    }

    /// The value following an inline option keyword.
    fn next_option(&mut self) -> Result<Bytes, CommandError> {
        self.optional().ok_or_else(CommandError::syntax)
    }

    fn key(&mut self) -> Result<Bytes, CommandError> {
        let key = self.next()?;
        if key.is_empty() {
            return Err(CommandError::invalid("empty key"));
        }
        Ok(key)
    }

    /// One or more keys, consuming every remaining argument.
    fn keys(&mut self) -> Result<Vec<Bytes>, CommandError> {
        let keys = self.rest();
        if keys.is_empty() {
            return Err(CommandError::arity(self.command));
        }
        if keys.iter().any(Bytes::is_empty) {
            return Err(CommandError::invalid("empty key"));
        }
        Ok(keys)
    }

    fn integer(&mut self) -> Result<i64, CommandError> {
        parse_integer(&self.next()?)
    }

    fn rest(&mut self) -> Vec<Bytes> {
        self.items.by_ref().cloned().collect()
    }

    fn finish(mut self) -> Result<(), CommandError> {
        match self.items.next() {
            Some(_) => Err(CommandError::arity(self.command)),
            None => Ok(()),
        }
    }
}

fn parse_integer(raw: &[u8]) -> Result<i64, CommandError> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(CommandError::not_an_integer)
}

fn invalid_expire(command: &str) -> CommandError {
    CommandError::invalid(format!(
        "invalid expire time in '{}' command",
        command.to_ascii_lowercase()
    ))
}

/// EXPIRE/PEXPIRE amount: a non-positive amount means "delete now".
fn expire_ttl(
    amount: i64,
    unit: fn(u64) -> Duration,
    command: &str,
) -> Result<Duration, CommandError> {
    if amount <= 0 {
        return Ok(Duration::ZERO);
    }
    let ttl = unit(amount as u64);
    if ttl > MAX_TTL {
        return Err(invalid_expire(command));
    }
    Ok(ttl)
}

/// SET TTL amount: must be strictly positive.
fn set_ttl(raw: &[u8], unit: fn(u64) -> Duration) -> Result<Duration, CommandError> {
    let amount = parse_integer(raw)?;
    if amount <= 0 {
        return Err(invalid_expire("SET"));
    }
    let ttl = unit(amount as u64);
    if ttl > MAX_TTL {
        return Err(invalid_expire("SET"));
    }
    Ok(ttl)
}

/// Whether a named flag option (`{"nx": true}`) is switched on.
fn flag_enabled(value: &[u8]) -> bool {
    !matches!(value, b"false" | b"0" | b"")
}

#[derive(Default)]
struct SetOptions {
    ttl: Option<Duration>,
    nx: bool,
    xx: bool,
}

impl SetOptions {
    fn set_ttl(&mut self, ttl: Duration) -> Result<(), CommandError> {
        if self.ttl.replace(ttl).is_some() {
            return Err(CommandError::syntax());
        }
        Ok(())
    }

    fn condition(&self) -> Result<SetCondition, CommandError> {
        match (self.nx, self.xx) {
            (true, true) => Err(CommandError::syntax()),
            (true, false) => Ok(SetCondition::IfAbsent),
            (false, true) => Ok(SetCondition::IfPresent),
            (false, false) => Ok(SetCondition::Always),
        }
    }
}

/// SET key value [EX seconds | PX milliseconds] [NX | XX]
///
/// Options may come inline or as named options; both are merged.
fn parse_set(cmd: &Command, mut args: Args<'_>) -> Result<Request, CommandError> {
    let key = args.key()?;
    let value = args.next()?;
    let mut opts = SetOptions::default();

    while let Some(token) = args.optional() {
        match token.to_ascii_uppercase().as_slice() {
            b"EX" => opts.set_ttl(set_ttl(&args.next_option()?, Duration::from_secs)?)?,
            b"PX" => opts.set_ttl(set_ttl(&args.next_option()?, Duration::from_millis)?)?,
            b"NX" => opts.nx = true,
            b"XX" => opts.xx = true,
            _ => return Err(CommandError::syntax()),
        }
    }

    for (name, raw) in cmd.options() {
        match name.as_str() {
            "ex" => opts.set_ttl(set_ttl(raw, Duration::from_secs)?)?,
            "px" => opts.set_ttl(set_ttl(raw, Duration::from_millis)?)?,
            "nx" => opts.nx |= flag_enabled(raw),
            "xx" => opts.xx |= flag_enabled(raw),
            _ => return Err(CommandError::syntax()),
        }
    }

    Ok(Request::Set {
        key,
        value,
        ttl: opts.ttl,
        condition: opts.condition()?,
    })
}
