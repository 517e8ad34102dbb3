use anyhow::Result;
use rusqlite::Connection;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            display_name TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS profiles (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            display_name TEXT,
            credits_remaining INTEGER NOT NULL DEFAULT 100
                CHECK (credits_remaining >= 0),
            plan_type TEXT NOT NULL DEFAULT 'free',
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY (id) REFERENCES users(id)
        );

        CREATE TABLE IF NOT EXISTS humanized_texts (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            title TEXT,
            original_text TEXT NOT NULL,
            humanized_text TEXT NOT NULL,
            credits_used INTEGER NOT NULL,
            request_token TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES profiles(id)
        );

        CREATE TABLE IF NOT EXISTS credit_charges (
            request_token TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            amount INTEGER NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY (user_id) REFERENCES profiles(id)
        );

        CREATE TABLE IF NOT EXISTS auth_sessions (
            token TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY (user_id) REFERENCES users(id)
        );

        CREATE INDEX IF NOT EXISTS idx_texts_user_created
            ON humanized_texts (user_id, created_at DESC);

        CREATE INDEX IF NOT EXISTS idx_sessions_user
            ON auth_sessions (user_id);
        ",
    )?;
    Ok(())
}
