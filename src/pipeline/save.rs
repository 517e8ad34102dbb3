use chrono::Utc;
use rusqlite::Connection;

use crate::credits;
use crate::db::queries;
use crate::error::AppError;
use crate::models::{HumanizedText, SaveTextRequest};
use crate::pipeline::cost;

pub const MAX_INPUT_CHARS: usize = 50_000;

/// Persist a humanized result against the user's credit balance.
///
/// Order is debit-then-append: the charge is committed (keyed by the
/// request token) before the result row is written. An append failure
/// after the charge landed surfaces as `Inconsistent`; retrying with the
/// same token finds the recorded charge, skips the debit and only
/// appends. Replaying an already-completed save returns the stored
/// record untouched.
pub fn save_humanized_text(
    conn: &mut Connection,
    user_id: &str,
    req: &SaveTextRequest,
) -> Result<HumanizedText, AppError> {
    if req.original_text.trim().is_empty() {
        return Err(AppError::BadRequest("nothing to save: original text is empty".into()));
    }
    if req.original_text.len() > MAX_INPUT_CHARS {
        return Err(AppError::BadRequest(format!(
            "text too long (max {} chars)",
            MAX_INPUT_CHARS
        )));
    }
    if req.request_token.trim().is_empty() {
        return Err(AppError::BadRequest("missing request token".into()));
    }

    // Completed save replayed: hand back the canonical record.
    if let Some(existing) = queries::get_text_by_token(conn, user_id, &req.request_token)? {
        return Ok(existing);
    }

    // Cost is always derived from the text being persisted, here and now.
    let amount = cost::credit_cost(req.original_text.len());

    match queries::get_charge(conn, &req.request_token)? {
        Some(charge) if charge.user_id != user_id => {
            return Err(AppError::BadRequest(
                "request token belongs to another account".into(),
            ));
        }
        // Charged on an earlier attempt that failed to persist: the debit
        // already happened, only the append remains.
        Some(_) => {}
        None => {
            credits::try_spend(conn, user_id, amount, &req.request_token)?;
        }
    }

    let id = uuid::Uuid::new_v4().to_string();
    let created_at = Utc::now().to_rfc3339();
    queries::insert_humanized_text(
        conn,
        &id,
        user_id,
        req.title.as_deref(),
        &req.original_text,
        &req.humanized_text,
        amount,
        &req.request_token,
        &created_at,
    )
    .map_err(|e| {
        AppError::Inconsistent(format!(
            "charged {} credits but storing the result failed; retry with the same request token ({})",
            amount, e
        ))
    })?;

    queries::get_text_by_token(conn, user_id, &req.request_token)?.ok_or_else(|| {
        AppError::Inconsistent(
            "charged but the stored result did not read back; retry with the same request token"
                .into(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_test_db;

    fn seed_user(conn: &Connection, id: &str, balance: i64) {
        queries::insert_user(conn, id, &format!("{id}@example.com"), "x", None).unwrap();
        queries::insert_profile(conn, id, &format!("{id}@example.com"), None, balance).unwrap();
    }

    fn request(original: String, token: &str) -> SaveTextRequest {
        SaveTextRequest {
            title: Some("draft".into()),
            original_text: original,
            humanized_text: "humanized output".into(),
            request_token: token.into(),
        }
    }

    #[test]
    fn save_debits_computed_cost_and_stores_the_record() {
        let mut conn = open_test_db();
        seed_user(&conn, "u1", 100);

        // 1200 chars => 3 credits.
        let req = request("x".repeat(1200), "tok-1");
        let stored = save_humanized_text(&mut conn, "u1", &req).unwrap();

        assert_eq!(stored.credits_used, 3);
        assert_eq!(stored.title.as_deref(), Some("draft"));
        assert_eq!(queries::get_credits(&conn, "u1").unwrap(), Some(97));

        let listed = queries::list_texts(&conn, "u1").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, stored.id);
    }

    #[test]
    fn short_balance_rejects_the_save_and_changes_nothing() {
        let mut conn = open_test_db();
        seed_user(&conn, "u1", 2);

        let req = request("x".repeat(1200), "tok-1");
        let err = save_humanized_text(&mut conn, "u1", &req).unwrap_err();
        assert!(matches!(
            err,
            AppError::InsufficientCredits { required: 3, available: 2 }
        ));

        assert_eq!(queries::get_credits(&conn, "u1").unwrap(), Some(2));
        assert!(queries::list_texts(&conn, "u1").unwrap().is_empty());
    }

    #[test]
    fn empty_input_is_rejected_before_any_side_effect() {
        let mut conn = open_test_db();
        seed_user(&conn, "u1", 100);

        let req = request("   ".into(), "tok-1");
        assert!(matches!(
            save_humanized_text(&mut conn, "u1", &req),
            Err(AppError::BadRequest(_))
        ));
        assert_eq!(queries::get_credits(&conn, "u1").unwrap(), Some(100));
    }

    #[test]
    fn replayed_save_returns_the_stored_record_without_a_second_debit() {
        let mut conn = open_test_db();
        seed_user(&conn, "u1", 100);

        let req = request("x".repeat(600), "tok-1");
        let first = save_humanized_text(&mut conn, "u1", &req).unwrap();
        let second = save_humanized_text(&mut conn, "u1", &req).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(queries::get_credits(&conn, "u1").unwrap(), Some(98));
        assert_eq!(queries::list_texts(&conn, "u1").unwrap().len(), 1);
    }

    #[test]
    fn retry_after_charged_but_unsaved_attempt_skips_the_debit() {
        let mut conn = open_test_db();
        seed_user(&conn, "u1", 100);

        // Simulate an attempt whose debit committed but whose append never
        // happened: the charge row exists, the text row does not.
        crate::credits::try_spend(&mut conn, "u1", 2, "tok-1").unwrap();
        assert_eq!(queries::get_credits(&conn, "u1").unwrap(), Some(98));

        let req = request("x".repeat(600), "tok-1");
        let stored = save_humanized_text(&mut conn, "u1", &req).unwrap();

        assert_eq!(stored.credits_used, 2);
        assert_eq!(queries::get_credits(&conn, "u1").unwrap(), Some(98));
    }

    #[test]
    fn token_charged_by_someone_else_is_rejected() {
        let mut conn = open_test_db();
        seed_user(&conn, "u1", 100);
        seed_user(&conn, "u2", 100);

        crate::credits::try_spend(&mut conn, "u2", 2, "tok-1").unwrap();

        let req = request("x".repeat(600), "tok-1");
        assert!(matches!(
            save_humanized_text(&mut conn, "u1", &req),
            Err(AppError::BadRequest(_))
        ));
        assert_eq!(queries::get_credits(&conn, "u1").unwrap(), Some(100));
    }

    #[test]
    fn oversized_input_is_rejected() {
        let mut conn = open_test_db();
        seed_user(&conn, "u1", 100);

        let req = request("x".repeat(MAX_INPUT_CHARS + 1), "tok-1");
        assert!(matches!(
            save_humanized_text(&mut conn, "u1", &req),
            Err(AppError::BadRequest(_))
        ));
    }
}
