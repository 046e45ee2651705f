//! Connection configuration and mutex handling shared by the `SQLite`
//! backend.

use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};

/// Acquires `mutex`, recovering from poison.
///
/// If a previous critical section panicked while holding the lock, the
/// mutex is poisoned; we recover the inner value rather than propagating
/// the panic, since the connection itself is still perfectly usable.
pub fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("sqlite connection mutex was poisoned, recovering");
            metrics::counter!("sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        }
    }
}

/// Configures `conn` for concurrent access: WAL journaling, `NORMAL`
/// synchronous durability, a 5-second busy timeout, and foreign-key
/// enforcement.
///
/// # Errors
///
/// Returns an error if any pragma fails to apply.
pub fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "busy_timeout", "5000")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}
