use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;
use crate::store::ScoredSet;

/// Native body of a [`Script`], run by in-process stores while they hold
/// exclusive access to the script's keys.
pub type NativeBody = fn(set: &mut dyn ScoredSet, keys: &[String], args: &[String]) -> Result<i64, StoreError>;

/// A unit of work a [`crate::store::WindowStore`] runs atomically.
///
/// A script carries two renditions of the same program: a Lua body for
/// stores with server-side scripting (`KEYS` / `ARGV` bindings, integer
/// reply), and a native body for stores that serialize access in process.
/// Both must produce the same reply and side effects.
pub struct Script {
    name: &'static str,
    lua: &'static str,
    native: NativeBody,
}

impl Script {
    pub const fn new(name: &'static str, lua: &'static str, native: NativeBody) -> Self {
        Self { name, lua, native }
    }

    /// Stable identifier, used by stores to cache loaded scripts.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn lua(&self) -> &'static str {
        self.lua
    }

    /// Runs the native body. The caller must hold exclusive access to `keys`.
    pub fn run_native(
        &self,
        set: &mut dyn ScoredSet,
        keys: &[String],
        args: &[String],
    ) -> Result<i64, StoreError> {
        (self.native)(set, keys, args)
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Script").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Parses `ARGV[index]` (zero based) for a native body.
pub fn parse_arg<T: FromStr>(args: &[String], index: usize, name: &str) -> Result<T, StoreError> {
    let raw = args
        .get(index)
        .ok_or_else(|| StoreError::Script(format!("missing argument `{name}` at position {index}")))?;
    raw.parse()
        .map_err(|_| StoreError::Script(format!("argument `{name}` is not valid: {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_parse_arg() {
        let args = args(&["42", "abc"]);
        assert_eq!(parse_arg::<i64>(&args, 0, "now").unwrap(), 42);
        assert!(matches!(parse_arg::<i64>(&args, 1, "limit"), Err(StoreError::Script(_))));
        assert!(matches!(parse_arg::<i64>(&args, 2, "ttl"), Err(StoreError::Script(_))));
    }

    #[test]
    fn test_debug_shows_name() {
        let script = Script::new("noop", "return 0", |_, _, _| Ok(0));
        assert!(format!("{script:?}").contains("noop"));
    }
}
