//! Textual command parsing and dispatch against a single Keyspace.
//!
//! One command line in, one RESP reply out — this is the layer both the
//! Storage Node's TCP listener and the Node Manager's HTTP `execute`
//! handler call into, so a command behaves identically whichever door it
//! came through.

use std::time::Duration;

use hkv_common::error::HkvError;
use hkv_common::resp;

use crate::keyspace::{parse_i64_strict, Keyspace, TtlStatus};

/// Parses and executes one command line, returning its RESP-encoded reply.
/// Never panics: any failure is represented as a RESP error reply.
pub fn execute_line(keyspace: &Keyspace, line: &str) -> Vec<u8> {
    let args = resp::split_command_line(line);
    execute_args(keyspace, &args)
}

pub fn execute_args(keyspace: &Keyspace, args: &[String]) -> Vec<u8> {
    let Some(cmd) = args.first() else {
        return resp::error("ERR invalid syntax");
    };

    let upper = cmd.to_ascii_uppercase();
    match upper.as_str() {
        "PING" => cmd_ping(args),
        "GET" => cmd_get(keyspace, args),
        "SET" => cmd_set(keyspace, args),
        "DEL" => cmd_del(keyspace, args),
        "EXISTS" => cmd_exists(keyspace, args),
        "INCR" => cmd_incr_decr(keyspace, args, 1, false),
        "DECR" => cmd_incr_decr(keyspace, args, 1, true),
        "INCRBY" => cmd_incr_decr_by(keyspace, args, false),
        "DECRBY" => cmd_incr_decr_by(keyspace, args, true),
        "KEYS" => cmd_keys(keyspace, args),
        "FLUSHALL" => cmd_flushall(keyspace, args),
        "INFO" => cmd_info(keyspace, args),
        "EXPIRE" => cmd_expire(keyspace, args),
        "TTL" => cmd_ttl(keyspace, args),
        _ => resp::error(&format!("ERR unknown command '{upper}'")),
    }
}

fn cmd_ping(args: &[String]) -> Vec<u8> {
    match args.len() {
        1 => resp::simple("PONG"),
        2 => resp::bulk(args[1].as_bytes()),
        _ => resp::error("ERR wrong number of arguments for 'ping' command"),
    }
}

fn cmd_get(keyspace: &Keyspace, args: &[String]) -> Vec<u8> {
    if args.len() != 2 {
        return resp::error("ERR wrong number of arguments for 'get' command");
    }
    match keyspace.get(args[1].as_bytes()) {
        Ok(Some(value)) => resp::bulk(&value),
        Ok(None) => resp::null_bulk(),
        Err(err) => resp::error_for(&err),
    }
}

fn cmd_set(keyspace: &Keyspace, args: &[String]) -> Vec<u8> {
    if args.len() < 3 {
        return resp::error("ERR wrong number of arguments for 'set' command");
    }

    let key = args[1].as_bytes();
    let value = args[2].as_bytes();

    let ttl = if args.len() == 3 {
        None
    } else if args.len() == 5 && args[3].eq_ignore_ascii_case("EX") {
        match parse_i64_strict(args[4].as_bytes()) {
            Some(seconds) if seconds > 0 => Some(Duration::from_secs(seconds as u64)),
            _ => return resp::error("ERR invalid EX value"),
        }
    } else {
        return resp::error("ERR invalid syntax");
    };

    match keyspace.set(key, value, ttl) {
        Ok(()) => resp::simple("OK"),
        Err(err) => resp::error_for(&err),
    }
}

fn cmd_del(keyspace: &Keyspace, args: &[String]) -> Vec<u8> {
    if args.len() < 2 {
        return resp::error("ERR wrong number of arguments for 'del' command");
    }
    let mut removed = 0i64;
    for key in &args[1..] {
        match keyspace.delete(key.as_bytes()) {
            Ok(true) => removed += 1,
            Ok(false) => {}
            Err(err) => return resp::error_for(&err),
        }
    }
    resp::integer(removed)
}

fn cmd_exists(keyspace: &Keyspace, args: &[String]) -> Vec<u8> {
    if args.len() != 2 {
        return resp::error("ERR wrong number of arguments for 'exists' command");
    }
    match keyspace.exists(args[1].as_bytes()) {
        Ok(true) => resp::integer(1),
        Ok(false) => resp::integer(0),
        Err(err) => resp::error_for(&err),
    }
}

fn cmd_incr_decr(keyspace: &Keyspace, args: &[String], amount: i64, negate: bool) -> Vec<u8> {
    if args.len() != 2 {
        return resp::error("ERR wrong number of arguments");
    }
    let delta = if negate { -amount } else { amount };
    match keyspace.incr_by(args[1].as_bytes(), delta) {
        Ok(value) => resp::integer(value),
        Err(err) => resp::error_for(&err),
    }
}

fn cmd_incr_decr_by(keyspace: &Keyspace, args: &[String], negate: bool) -> Vec<u8> {
    if args.len() != 3 {
        return resp::error("ERR wrong number of arguments");
    }
    let Some(amount) = parse_i64_strict(args[2].as_bytes()) else {
        return resp::error_for(&HkvError::TypeError);
    };
    let delta = if negate { -amount } else { amount };
    match keyspace.incr_by(args[1].as_bytes(), delta) {
        Ok(value) => resp::integer(value),
        Err(err) => resp::error_for(&err),
    }
}

fn cmd_keys(keyspace: &Keyspace, args: &[String]) -> Vec<u8> {
    if args.len() != 2 {
        return resp::error("ERR wrong number of arguments for 'keys' command");
    }
    if args[1] != "*" {
        return resp::error("ERR only '*' pattern is supported");
    }
    match keyspace.keys_matching_star() {
        Ok(keys) => resp::array(&keys.iter().map(|k| k.to_vec()).collect::<Vec<_>>()),
        Err(err) => resp::error_for(&err),
    }
}

fn cmd_flushall(keyspace: &Keyspace, args: &[String]) -> Vec<u8> {
    if args.len() != 1 {
        return resp::error("ERR wrong number of arguments for 'flushall' command");
    }
    match keyspace.flushall() {
        Ok(()) => resp::simple("OK"),
        Err(err) => resp::error_for(&err),
    }
}

fn cmd_info(keyspace: &Keyspace, args: &[String]) -> Vec<u8> {
    if args.len() != 1 {
        return resp::error("ERR wrong number of arguments for 'info' command");
    }
    let stats = keyspace.stats();
    let body = format!(
        "role:master\r\nused_memory:{}\r\nused_memory_human:{}K\r\ndb0:keys={}\r\n",
        stats.used_memory,
        stats.used_memory / 1024,
        stats.key_count
    );
    resp::bulk(body.as_bytes())
}

fn cmd_expire(keyspace: &Keyspace, args: &[String]) -> Vec<u8> {
    if args.len() != 3 {
        return resp::error("ERR wrong number of arguments for 'expire' command");
    }
    let Some(seconds) = parse_i64_strict(args[2].as_bytes()) else {
        return resp::error("ERR invalid EX value");
    };
    if seconds <= 0 {
        return resp::error("ERR invalid EX value");
    }
    match keyspace.expire(args[1].as_bytes(), Duration::from_secs(seconds as u64)) {
        Ok(()) => resp::integer(1),
        Err(HkvError::NotFound(_)) => resp::integer(0),
        Err(err) => resp::error_for(&err),
    }
}

fn cmd_ttl(keyspace: &Keyspace, args: &[String]) -> Vec<u8> {
    if args.len() != 2 {
        return resp::error("ERR wrong number of arguments for 'ttl' command");
    }
    match keyspace.ttl(args[1].as_bytes()) {
        Ok(TtlStatus::Missing) => resp::integer(-2),
        Ok(TtlStatus::NoExpiry) => resp::integer(-1),
        Ok(TtlStatus::ExpiresIn(remaining)) => resp::integer(remaining.as_secs() as i64),
        Err(err) => resp::error_for(&err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyspace::Keyspace;
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    fn running(port: u16) -> Arc<Keyspace> {
        let ks = Arc::new(Keyspace::new("t1", port, 1 << 20, 8));
        ks.start_with_interval(StdDuration::from_millis(50)).unwrap();
        ks
    }

    #[test]
    fn basic_set_get_del_scenario() {
        let ks = running(7400);
        assert_eq!(execute_line(&ks, "SET foo bar"), b"+OK\r\n");
        assert_eq!(execute_line(&ks, "GET foo"), b"$3\r\nbar\r\n");
        assert_eq!(execute_line(&ks, "DEL foo"), b":1\r\n");
        assert_eq!(execute_line(&ks, "GET foo"), b"$-1\r\n");
        ks.stop().unwrap();
    }

    #[test]
    fn incr_type_error_scenario() {
        let ks = running(7401);
        assert_eq!(execute_line(&ks, "SET n hello"), b"+OK\r\n");
        assert_eq!(
            execute_line(&ks, "INCR n"),
            b"-ERR value is not an integer or out of range\r\n"
        );
        assert_eq!(execute_line(&ks, "SET n 7"), b"+OK\r\n");
        assert_eq!(execute_line(&ks, "INCRBY n 5"), b":12\r\n");
        ks.stop().unwrap();
    }

    #[test]
    fn unknown_command_uppercases_name() {
        let ks = running(7402);
        assert_eq!(
            execute_line(&ks, "bogus arg"),
            b"-ERR unknown command 'BOGUS'\r\n"
        );
        ks.stop().unwrap();
    }

    #[test]
    fn stopped_tenant_reports_not_found() {
        let ks = running(7403);
        ks.stop().unwrap();
        assert_eq!(execute_line(&ks, "GET x"), b"-ERR tenant not found\r\n");
    }
}
