use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{HumanizedText, PlanType, Profile};

// --- Users (identity rows) ---

pub struct UserRow {
    pub id: String,
    pub password_hash: String,
}

pub fn insert_user(
    conn: &Connection,
    id: &str,
    email: &str,
    password_hash: &str,
    display_name: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO users (id, email, password_hash, display_name) VALUES (?1, ?2, ?3, ?4)",
        params![id, email, password_hash, display_name],
    )?;
    Ok(())
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    let row = conn
        .query_row(
            "SELECT id, password_hash FROM users WHERE email = ?1",
            params![email],
            |row| {
                Ok(UserRow {
                    id: row.get(0)?,
                    password_hash: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

pub fn email_taken(conn: &Connection, email: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE email = ?1",
        params![email],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Remove an identity that never got a profile (sign-up rollback).
pub fn delete_user(conn: &Connection, id: &str) -> Result<()> {
    conn.execute("DELETE FROM auth_sessions WHERE user_id = ?1", params![id])?;
    conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
    Ok(())
}

// --- Profiles ---

pub fn insert_profile(
    conn: &Connection,
    id: &str,
    email: &str,
    display_name: Option<&str>,
    credits: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO profiles (id, email, display_name, credits_remaining, plan_type) VALUES (?1, ?2, ?3, ?4, 'free')",
        params![id, email, display_name, credits],
    )?;
    Ok(())
}

pub fn get_profile(conn: &Connection, id: &str) -> Result<Option<Profile>> {
    let row = conn
        .query_row(
            "SELECT id, email, display_name, credits_remaining, plan_type FROM profiles WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )
        .optional()?;

    match row {
        None => Ok(None),
        Some((id, email, display_name, credits_remaining, plan)) => {
            let plan_type = PlanType::parse(&plan)
                .ok_or_else(|| anyhow!("unknown plan_type in profile row: {}", plan))?;
            Ok(Some(Profile {
                id,
                email,
                display_name,
                credits_remaining,
                plan_type,
            }))
        }
    }
}

/// Conditional decrement — the atomicity boundary for spends. Returns
/// false without touching the row when the balance is short.
pub fn debit_credits_if_sufficient(conn: &Connection, user_id: &str, amount: i64) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE profiles SET credits_remaining = credits_remaining - ?2
         WHERE id = ?1 AND credits_remaining >= ?2",
        params![user_id, amount],
    )?;
    Ok(changed == 1)
}

pub fn add_credits(conn: &Connection, user_id: &str, amount: i64) -> Result<()> {
    conn.execute(
        "UPDATE profiles SET credits_remaining = credits_remaining + ?2 WHERE id = ?1",
        params![user_id, amount],
    )?;
    Ok(())
}

pub fn get_credits(conn: &Connection, user_id: &str) -> Result<Option<i64>> {
    let credits = conn
        .query_row(
            "SELECT credits_remaining FROM profiles WHERE id = ?1",
            params![user_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(credits)
}

pub fn set_plan_type(conn: &Connection, user_id: &str, plan: PlanType) -> Result<()> {
    conn.execute(
        "UPDATE profiles SET plan_type = ?2 WHERE id = ?1",
        params![user_id, plan.as_str()],
    )?;
    Ok(())
}

// --- Humanized texts ---

fn text_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<HumanizedText> {
    Ok(HumanizedText {
        id: row.get(0)?,
        title: row.get(1)?,
        original_text: row.get(2)?,
        humanized_text: row.get(3)?,
        credits_used: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub fn insert_humanized_text(
    conn: &Connection,
    id: &str,
    user_id: &str,
    title: Option<&str>,
    original_text: &str,
    humanized_text: &str,
    credits_used: i64,
    request_token: &str,
    created_at: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO humanized_texts (id, user_id, title, original_text, humanized_text, credits_used, request_token, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![id, user_id, title, original_text, humanized_text, credits_used, request_token, created_at],
    )?;
    Ok(())
}

pub fn get_text_by_token(
    conn: &Connection,
    user_id: &str,
    request_token: &str,
) -> Result<Option<HumanizedText>> {
    let row = conn
        .query_row(
            "SELECT id, title, original_text, humanized_text, credits_used, created_at
             FROM humanized_texts WHERE user_id = ?1 AND request_token = ?2",
            params![user_id, request_token],
            text_from_row,
        )
        .optional()?;
    Ok(row)
}

/// Most recent first; equal timestamps fall back to insertion order, the
/// later insert winning.
pub fn list_texts(conn: &Connection, user_id: &str) -> Result<Vec<HumanizedText>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, original_text, humanized_text, credits_used, created_at
         FROM humanized_texts WHERE user_id = ?1
         ORDER BY created_at DESC, rowid DESC",
    )?;
    let rows = stmt.query_map(params![user_id], text_from_row)?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

pub fn list_recent_texts(conn: &Connection, user_id: &str, limit: i64) -> Result<Vec<HumanizedText>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, original_text, humanized_text, credits_used, created_at
         FROM humanized_texts WHERE user_id = ?1
         ORDER BY created_at DESC, rowid DESC LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![user_id, limit], text_from_row)?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

// --- Credit charges ---

pub struct ChargeRow {
    pub user_id: String,
    pub amount: i64,
}

pub fn insert_charge(conn: &Connection, request_token: &str, user_id: &str, amount: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO credit_charges (request_token, user_id, amount) VALUES (?1, ?2, ?3)",
        params![request_token, user_id, amount],
    )?;
    Ok(())
}

pub fn get_charge(conn: &Connection, request_token: &str) -> Result<Option<ChargeRow>> {
    let row = conn
        .query_row(
            "SELECT user_id, amount FROM credit_charges WHERE request_token = ?1",
            params![request_token],
            |row| {
                Ok(ChargeRow {
                    user_id: row.get(0)?,
                    amount: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

// --- Auth sessions ---

pub fn create_auth_session(conn: &Connection, token: &str, user_id: &str, expires_at: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO auth_sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
        params![token, user_id, expires_at],
    )?;
    Ok(())
}

pub fn get_auth_session(conn: &Connection, token: &str) -> Result<Option<String>> {
    let user_id = conn
        .query_row(
            "SELECT user_id FROM auth_sessions WHERE token = ?1 AND expires_at > ?2",
            params![token, chrono::Utc::now().to_rfc3339()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(user_id)
}

pub fn delete_auth_session(conn: &Connection, token: &str) -> Result<()> {
    conn.execute("DELETE FROM auth_sessions WHERE token = ?1", params![token])?;
    Ok(())
}

pub fn delete_sessions_for_user(conn: &Connection, user_id: &str) -> Result<()> {
    conn.execute("DELETE FROM auth_sessions WHERE user_id = ?1", params![user_id])?;
    Ok(())
}
