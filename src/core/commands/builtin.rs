// src/core/commands/builtin.rs

//! Descriptors for the commands the dispatch core itself needs, plus a few
//! staples the typed facades share. Facade crates define their own specs for
//! everything else.

use super::{CommandSpec, decode_array, decode_bulk, decode_int, decode_ok, decode_value};
use crate::core::types::Value;
use bytes::Bytes;

pub const GET: CommandSpec<Option<Bytes>> = CommandSpec::new("GET", decode_bulk);
pub const SET: CommandSpec<()> = CommandSpec::new("SET", decode_ok);
pub const MGET: CommandSpec<Value> = CommandSpec::new("MGET", decode_value);
pub const MSET: CommandSpec<()> = CommandSpec::new("MSET", decode_ok);
pub const INCR: CommandSpec<i64> = CommandSpec::new("INCR", decode_int);
pub const DEL: CommandSpec<i64> = CommandSpec::new("DEL", decode_int);
pub const DBSIZE: CommandSpec<i64> = CommandSpec::new("DBSIZE", decode_int);
pub const FLUSHDB: CommandSpec<()> = CommandSpec::new("FLUSHDB", decode_ok);

// List pops. `LPOP key 1` yields a one-element array, which the blocking
// emulator unwraps itself.
pub const LPOP: CommandSpec<Value> = CommandSpec::new("LPOP", decode_value);
pub const RPOP: CommandSpec<Value> = CommandSpec::new("RPOP", decode_value);
pub const BLPOP: CommandSpec<Value> = CommandSpec::new("BLPOP", decode_value);
pub const BRPOP: CommandSpec<Value> = CommandSpec::new("BRPOP", decode_value);

// Server-side scripting.
pub const EVAL: CommandSpec<Value> = CommandSpec::new("EVAL", decode_value);
pub const EVALSHA: CommandSpec<Value> = CommandSpec::new("EVALSHA", decode_value);
pub const SCRIPT_LOAD: CommandSpec<Option<Bytes>> = CommandSpec::new("SCRIPT", decode_bulk);
pub const SCRIPT_EXISTS: CommandSpec<Vec<Value>> = CommandSpec::new("SCRIPT", decode_array);
pub const SCRIPT_FLUSH: CommandSpec<()> = CommandSpec::new("SCRIPT", decode_ok);

// Sent by the executor itself ahead of a command that follows an ASK
// redirect.
pub const ASKING: CommandSpec<()> = CommandSpec::new("ASKING", decode_ok);
