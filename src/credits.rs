//! Credit ledger. The only writers of `profiles.credits_remaining` live
//! here; everything goes through the conditional decrement so a balance
//! can never be driven below zero, no matter how requests interleave.

use rusqlite::Connection;

use crate::db::queries;
use crate::error::AppError;

/// Credits granted to every new account.
pub const SIGNUP_CREDITS: i64 = 100;

/// Debit `amount` credits from the user, recording the charge under
/// `request_token` in the same transaction. Rejected outright when the
/// balance is short; a rejected spend changes nothing. Returns the new
/// balance.
pub fn try_spend(
    conn: &mut Connection,
    user_id: &str,
    amount: i64,
    request_token: &str,
) -> Result<i64, AppError> {
    if amount < 1 {
        return Err(AppError::BadRequest("spend amount must be at least 1".into()));
    }

    let tx = conn.transaction()?;

    if !queries::debit_credits_if_sufficient(&tx, user_id, amount)? {
        let available = queries::get_credits(&tx, user_id)?
            .ok_or_else(|| AppError::NotFound(format!("no profile for user {}", user_id)))?;
        return Err(AppError::InsufficientCredits {
            required: amount,
            available,
        });
    }

    queries::insert_charge(&tx, request_token, user_id, amount)?;

    let new_balance = queries::get_credits(&tx, user_id)?
        .ok_or_else(|| AppError::Internal("profile row vanished mid-debit".into()))?;

    tx.commit()?;
    Ok(new_balance)
}

/// Top-up entry point. Always succeeds for a positive amount and an
/// existing profile. Returns the new balance.
pub fn credit(conn: &Connection, user_id: &str, amount: i64) -> Result<i64, AppError> {
    if amount < 1 {
        return Err(AppError::BadRequest("credit amount must be at least 1".into()));
    }

    if queries::get_credits(conn, user_id)?.is_none() {
        return Err(AppError::NotFound(format!("no profile for user {}", user_id)));
    }

    queries::add_credits(conn, user_id, amount)?;
    queries::get_credits(conn, user_id)?
        .ok_or_else(|| AppError::Internal("profile row vanished mid-credit".into()))
}
