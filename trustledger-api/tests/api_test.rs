/// Integration tests for the TrustLedger API
///
/// These drive the full router (session middleware, handlers, ledger and
/// in-memory store) through `tower::ServiceExt::oneshot`:
/// - Login, logout and password management
/// - Member code allocation
/// - Payment recording and balance reconciliation
/// - Role checks for members
/// - Statistics and bank accounts

mod common;

use axum::http::StatusCode;
use common::{id_of, member_body, TestContext, ADMIN_PASSWORD, ADMIN_USERNAME};
use serde_json::json;

#[tokio::test]
async fn test_health_is_public() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx.send("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], "memory");
}

#[tokio::test]
async fn test_admin_login_response() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx
        .send(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "phone": ADMIN_USERNAME, "password": ADMIN_PASSWORD })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_admin"], true);
    assert_eq!(body["name"], ADMIN_USERNAME);
    assert_eq!(body["password_reset_required"], false);
    assert!(body["token"].is_string());
    assert!(body.get("member_id").is_none());
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx
        .send(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "phone": ADMIN_USERNAME, "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = ctx
        .send(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "phone": "9999999999", "password": "whatever-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_routes_require_session() {
    let ctx = TestContext::new().await.unwrap();

    let (status, _) = ctx.send("GET", "/api/members", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = ctx.send("GET", "/api/members", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_member_codes_are_sequential() {
    let ctx = TestContext::new().await.unwrap();

    let first = ctx.create_member("Ravi Kumar", "9876543210").await;
    let second = ctx.create_member("Lakshmi Devi", "+91 98765 43211").await;

    assert_eq!(first["member_code"], "KT-0001");
    assert_eq!(second["member_code"], "KT-0002");
    assert_eq!(second["phone"], "9876543211");

    assert_eq!(first["annual_tax"], "20000.00");
    assert_eq!(first["amount_paid"], "0.00");
    assert_eq!(first["amount_due"], "20000.00");
    assert_eq!(first["payment_status"], "Pending");
    assert_eq!(first["children"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_duplicate_phone_conflicts() {
    let ctx = TestContext::new().await.unwrap();
    ctx.create_member("Ravi Kumar", "9876543210").await;

    let (status, body) = ctx
        .admin("POST", "/api/members", Some(member_body("Ravi K", "+919876543210")))
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn test_invalid_registration_is_unprocessable() {
    let ctx = TestContext::new().await.unwrap();

    let mut body = member_body("Ravi Kumar", "12345");
    body["password"] = json!("short");
    let (status, response) = ctx.admin("POST", "/api/members", Some(body)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response["error"], "validation_error");
    let fields: Vec<&str> = response["details"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|d| d["field"].as_str())
        .collect();
    assert!(fields.contains(&"phone"));
    assert!(fields.contains(&"password"));

    // Nothing was written
    let (_, members) = ctx.admin("GET", "/api/members", None).await;
    assert!(members.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_payment_scenario_reconciles_balance() {
    let ctx = TestContext::new().await.unwrap();
    let member = ctx.create_member("Ravi Kumar", "9876543210").await;
    let member_id = id_of(&member);

    let (status, body) = ctx.record_payment(member_id, "15000.00").await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert!(body["payment"]["reference_number"].as_str().unwrap().starts_with("TXN"));
    assert_eq!(body["payment"]["status"], "completed");
    assert_eq!(body["payment"]["member_name"], "Ravi Kumar");
    assert_eq!(body["member"]["amount_paid"], "15000.00");
    assert_eq!(body["member"]["amount_due"], "5000.00");
    assert_eq!(body["member"]["payment_status"], "Partial");

    let (status, body) = ctx.record_payment(member_id, "5000.00").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["member"]["amount_due"], "0.00");
    assert_eq!(body["member"]["payment_status"], "Paid");

    let (status, stats) = ctx.admin("GET", "/api/payments/statistics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_payments"], 2);
    assert_eq!(stats["total_amount_collected"], "20000.00");
    assert_eq!(stats["total_pending"], "0.00");
    assert_eq!(stats["payments_this_month"], 2);

    let (_, members) = ctx.admin("GET", "/api/members/statistics", None).await;
    assert_eq!(members["total_members"], 1);
    assert_eq!(members["members_paid"], 1);
    assert_eq!(members["members_pending"], 0);
}

#[tokio::test]
async fn test_duplicate_reference_is_rejected() {
    let ctx = TestContext::new().await.unwrap();
    let member_id = id_of(&ctx.create_member("Ravi Kumar", "9876543210").await);

    let payment = json!({
        "member_id": member_id,
        "amount": "1000.00",
        "payment_method": "Bank Transfer",
        "reference_number": "NEFT-0042",
    });

    let (status, _) = ctx.admin("POST", "/api/payments", Some(payment.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = ctx.admin("POST", "/api/payments", Some(payment)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    // Only the first payment was credited
    let (_, member) = ctx.admin("GET", &format!("/api/members/{}", member_id), None).await;
    assert_eq!(member["amount_paid"], "1000.00");
    assert_eq!(member["amount_due"], "19000.00");
}

#[tokio::test]
async fn test_payment_validation_and_unknown_member() {
    let ctx = TestContext::new().await.unwrap();
    let member_id = id_of(&ctx.create_member("Ravi Kumar", "9876543210").await);

    let (status, body) = ctx.record_payment(member_id, "0").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "amount");

    let (status, _) = ctx.record_payment(member_id + 100, "100.00").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_payment_edit_does_not_touch_balance() {
    let ctx = TestContext::new().await.unwrap();
    let member_id = id_of(&ctx.create_member("Ravi Kumar", "9876543210").await);

    let (_, recorded) = ctx.record_payment(member_id, "15000.00").await;
    let payment_id = id_of(&recorded["payment"]);

    let (status, payment) = ctx
        .admin(
            "PUT",
            &format!("/api/payments/{}", payment_id),
            Some(json!({ "amount": "10000.00", "notes": "corrected" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payment["amount"], "10000.00");
    assert_eq!(payment["notes"], "corrected");

    let (_, member) = ctx.admin("GET", &format!("/api/members/{}", member_id), None).await;
    assert_eq!(member["amount_due"], "5000.00");
}

#[tokio::test]
async fn test_member_sees_only_own_records() {
    let ctx = TestContext::new().await.unwrap();
    let ravi = ctx.create_member("Ravi Kumar", "9876543210").await;
    let lakshmi = ctx.create_member("Lakshmi Devi", "9876543211").await;
    ctx.record_payment(id_of(&ravi), "2000.00").await;
    ctx.record_payment(id_of(&lakshmi), "3000.00").await;

    let token = ctx.login("9876543210", "member-pass").await.unwrap();

    let (status, me) = ctx.send("GET", "/api/members/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["member_code"], "KT-0001");
    assert_eq!(me["children"][0]["name"], "Anitha");

    let (_, listed) = ctx.send("GET", "/api/members", Some(&token), None).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (_, payments) = ctx.send("GET", "/api/payments", Some(&token), None).await;
    assert_eq!(payments.as_array().unwrap().len(), 1);
    assert_eq!(payments[0]["amount"], "2000.00");

    let (status, mine) = ctx.send("GET", "/api/payments/mine", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().unwrap().len(), 1);

    let (status, _) = ctx
        .send("GET", &format!("/api/members/{}", id_of(&lakshmi)), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_member_cannot_reach_admin_endpoints() {
    let ctx = TestContext::new().await.unwrap();
    let member_id = id_of(&ctx.create_member("Ravi Kumar", "9876543210").await);
    let token = ctx.login("9876543210", "member-pass").await.unwrap();

    for (method, uri) in [
        ("GET", "/api/members/statistics"),
        ("GET", "/api/payments/statistics"),
        ("GET", "/api/payments/recent"),
        ("GET", "/api/bank-accounts"),
        ("GET", "/api/dashboard/stats"),
    ] {
        let (status, body) = ctx.send(method, uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{} {}", method, uri);
        assert_eq!(body["error"], "forbidden");
    }

    let (status, _) = ctx
        .send(
            "POST",
            "/api/payments",
            Some(&token),
            Some(json!({ "member_id": member_id, "amount": "20000.00", "payment_method": "Cash" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_logout_revokes_session() {
    let ctx = TestContext::new().await.unwrap();
    let token = ctx.login(ADMIN_USERNAME, ADMIN_PASSWORD).await.unwrap();

    let (status, _) = ctx.send("POST", "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = ctx.send("GET", "/api/members", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Other sessions are unaffected
    let (status, _) = ctx.admin("GET", "/api/members", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_change_password() {
    let ctx = TestContext::new().await.unwrap();
    ctx.create_member("Ravi Kumar", "9876543210").await;
    let other = ctx.login("9876543210", "member-pass").await.unwrap();
    let token = ctx.login("9876543210", "member-pass").await.unwrap();

    let (status, _) = ctx
        .send(
            "POST",
            "/api/auth/change-password",
            Some(&token),
            Some(json!({ "old_password": "not-my-password", "new_password": "new-member-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = ctx
        .send(
            "POST",
            "/api/auth/change-password",
            Some(&token),
            Some(json!({ "old_password": "member-pass", "new_password": "new-member-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // The current session survives, the other one does not
    let (status, _) = ctx.send("GET", "/api/members/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = ctx.send("GET", "/api/members/me", Some(&other), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert!(ctx.login("9876543210", "member-pass").await.is_err());
    assert!(ctx.login("9876543210", "new-member-pass").await.is_ok());
}

#[tokio::test]
async fn test_admin_password_reset() {
    let ctx = TestContext::new().await.unwrap();
    let member_id = id_of(&ctx.create_member("Ravi Kumar", "9876543210").await);
    let token = ctx.login("9876543210", "member-pass").await.unwrap();

    let (status, _) = ctx
        .send("POST", "/api/auth/reset-password", Some(&token), Some(json!({ "member_id": member_id })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = ctx
        .admin("POST", "/api/auth/reset-password", Some(json!({ "member_id": member_id })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["temporary_password"], "9876543210");

    // Existing sessions are revoked and the flag is raised on next login
    let (status, _) = ctx.send("GET", "/api/members/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, login) = ctx
        .send(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "phone": "9876543210", "password": "9876543210" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(login["password_reset_required"], true);
    assert_eq!(login["member_code"], "KT-0001");
}

#[tokio::test]
async fn test_deactivated_member_cannot_log_in() {
    let ctx = TestContext::new().await.unwrap();
    let member_id = id_of(&ctx.create_member("Ravi Kumar", "9876543210").await);

    let (status, _) = ctx.admin("DELETE", &format!("/api/members/{}", member_id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert!(ctx.login("9876543210", "member-pass").await.is_err());

    // Code stays with the record and the next member gets a new one
    let (_, member) = ctx.admin("GET", &format!("/api/members/{}", member_id), None).await;
    assert_eq!(member["is_active"], false);
    assert_eq!(member["member_code"], "KT-0001");
    let next = ctx.create_member("Lakshmi Devi", "9876543211").await;
    assert_eq!(next["member_code"], "KT-0002");

    let (_, active) = ctx.admin("GET", "/api/members?is_active=true", None).await;
    assert_eq!(active.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_deactivation_by_update_revokes_sessions() {
    let ctx = TestContext::new().await.unwrap();
    let member_id = id_of(&ctx.create_member("Ravi Kumar", "9876543210").await);
    let token = ctx.login("9876543210", "member-pass").await.unwrap();

    let (status, member) = ctx
        .admin(
            "PUT",
            &format!("/api/members/{}", member_id),
            Some(json!({ "is_active": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(member["is_active"], false);

    let (status, _) = ctx.send("GET", "/api/members/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(ctx.login("9876543210", "member-pass").await.is_err());
}

#[tokio::test]
async fn test_update_member_reconciles_balance() {
    let ctx = TestContext::new().await.unwrap();
    let member_id = id_of(&ctx.create_member("Ravi Kumar", "9876543210").await);
    ctx.record_payment(member_id, "15000.00").await;

    let (status, member) = ctx
        .admin(
            "PUT",
            &format!("/api/members/{}", member_id),
            Some(json!({ "annual_tax": "25000.00", "spouse_name": "Meena" })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(member["amount_due"], "10000.00");
    assert_eq!(member["spouse_name"], "Meena");
    assert_eq!(member["member_code"], "KT-0001");
}

#[tokio::test]
async fn test_children_endpoints() {
    let ctx = TestContext::new().await.unwrap();
    let member_id = id_of(&ctx.create_member("Ravi Kumar", "9876543210").await);
    let token = ctx.login("9876543210", "member-pass").await.unwrap();

    let (status, child) = ctx
        .send(
            "POST",
            &format!("/api/members/{}/children", member_id),
            Some(&token),
            Some(json!({ "name": "Karthik", "date_of_birth": "2009-02-14", "gender": "Male" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let child_id = id_of(&child);

    let (_, children) = ctx.send("GET", "/api/children", Some(&token), None).await;
    assert_eq!(children.as_array().unwrap().len(), 2);

    let (status, updated) = ctx
        .send(
            "PUT",
            &format!("/api/children/{}", child_id),
            Some(&token),
            Some(json!({ "name": "Karthik R" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Karthik R");

    let (status, _) = ctx.admin("DELETE", &format!("/api/children/{}", child_id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = ctx.send("GET", &format!("/api/children/{}", child_id), Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bank_accounts() {
    let ctx = TestContext::new().await.unwrap();

    let account = |account_no: &str, bank: &str| {
        json!({
            "account_no": account_no,
            "account_name": "Kalinga Trust",
            "ifsc_code": "sbin0001234",
            "bank_name": bank,
            "branch_name": "Main Branch",
            "branch_address": "1 Bank Road",
            "contact_no": "04522345678",
        })
    };

    let (status, created) = ctx
        .admin("POST", "/api/bank-accounts", Some(account("123456789012", "State Bank")))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    assert_eq!(created["ifsc_code"], "SBIN0001234");
    assert_eq!(created["status"], "Active");

    let (status, _) = ctx
        .admin("POST", "/api/bank-accounts", Some(account("123456789012", "State Bank")))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let mut invalid = account("12AB", "Canara Bank");
    invalid["ifsc_code"] = json!("BAD");
    let (status, body) = ctx.admin("POST", "/api/bank-accounts", Some(invalid)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"].as_array().unwrap().len(), 2);

    ctx.admin("POST", "/api/bank-accounts", Some(account("223456789012", "Canara Bank")))
        .await;
    ctx.admin("POST", "/api/bank-accounts", Some(account("323456789012", "Indian Bank")))
        .await;

    let (_, page) = ctx.admin("GET", "/api/bank-accounts?page=2&per_page=2", None).await;
    assert_eq!(page["total"], 3);
    assert_eq!(page["pages"], 2);
    assert_eq!(page["bank_accounts"].as_array().unwrap().len(), 1);

    let (status, _) = ctx
        .admin("GET", "/api/bank-accounts?per_page=9223372036854775807", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, all) = ctx.admin("GET", "/api/bank-accounts?per_page=-1&search=canara", None).await;
    assert_eq!(all["total"], 1);
    assert!(all.get("pages").is_none());

    let (status, _) = ctx
        .admin("DELETE", &format!("/api/bank-accounts/{}", id_of(&created)), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, dashboard) = ctx.admin("GET", "/api/dashboard/stats", None).await;
    assert_eq!(dashboard["total_bank_accounts"], 2);
    assert_eq!(dashboard["active_bank_accounts"], 2);
}

#[tokio::test]
async fn test_dashboard_and_recent() {
    let ctx = TestContext::new().await.unwrap();
    let ravi = id_of(&ctx.create_member("Ravi Kumar", "9876543210").await);
    ctx.create_member("Lakshmi Devi", "9876543211").await;
    ctx.record_payment(ravi, "20000.00").await;

    let (status, stats) = ctx.admin("GET", "/api/dashboard/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_members"], 2);
    assert_eq!(stats["members_paid"], 1);
    assert_eq!(stats["total_amount_collected"], "20000.00");

    let (_, recent_members) = ctx.admin("GET", "/api/dashboard/recent-members", None).await;
    assert_eq!(recent_members[0]["name"], "Lakshmi Devi");

    let (_, recent) = ctx.admin("GET", "/api/payments/recent?limit=1", None).await;
    assert_eq!(recent.as_array().unwrap().len(), 1);

    let (status, _) = ctx.admin("GET", "/api/payments/recent?limit=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
