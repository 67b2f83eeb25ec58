use sqlx::SqliteConnection;

/// Image table access over a single connection, opened for one sync cycle.
pub struct SqlxImageRepo {
    pub conn: SqliteConnection,
}
