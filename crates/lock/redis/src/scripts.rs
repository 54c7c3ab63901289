//! Lua scripts executed atomically on the Redis server.

/// `KEYS[1]` lock key, `ARGV[1]` owner token, `ARGV[2]` TTL in milliseconds.
/// Returns 1 when the key was set, 0 when it already exists.
pub(crate) const LOCK_ACQUIRE: &str = r"
if redis.call('SET', KEYS[1], ARGV[1], 'NX', 'PX', ARGV[2]) then
    return 1
end
return 0
";

/// `KEYS[1]` lock key, `ARGV[1]` owner token.
/// Deletes the key only if it is still held by the owner; returns 1 on delete.
pub(crate) const LOCK_RELEASE: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
";

/// `KEYS[1]` lock key, `ARGV[1]` owner token, `ARGV[2]` TTL in milliseconds.
/// Resets the expiry only if the key is still held by the owner; returns 1 on
/// success.
pub(crate) const LOCK_EXTEND: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('PEXPIRE', KEYS[1], ARGV[2])
end
return 0
";
