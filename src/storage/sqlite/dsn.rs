//! DSN construction helpers for the `SQLite` backend.

/// Returns a shared in-memory database URI.
///
/// Every connection opened against this URI within the same process sees
/// the same database, which is what lets [`super::SqliteBackend`] pool
/// connections behind a single `Mutex` while still behaving like a real
/// file-backed database for tests.
#[must_use]
pub fn in_memory() -> String {
    "file:memdb?mode=memory&cache=shared".to_string()
}

/// Returns a file-backed database URI at `path`, opened read-write-create
/// with WAL journaling and foreign-key enforcement applied by
/// [`super::connection::configure_connection`] once connected.
#[must_use]
pub fn file(path: &str) -> String {
    format!("file:{path}?mode=rwc")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_dsn_shape() {
        assert_eq!(in_memory(), "file:memdb?mode=memory&cache=shared");
    }

    #[test]
    fn test_file_dsn_shape() {
        assert_eq!(file("/tmp/x.db"), "file:/tmp/x.db?mode=rwc");
    }
}
