mod common;

use std::str::FromStr;

use budget_planner::backend::{build_router, AppState};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use sqlx::{Pool, Sqlite};

use common::{create_user, group_id, migrated_pool, test_config};

struct TestApp {
    base: String,
    pool: Pool<Sqlite>,
    dir: tempfile::TempDir,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base, path)
    }

    /// A cookie-keeping client already logged in as `username`.
    async fn login(&self, username: &str, password: &str) -> Client {
        let client = Client::builder().cookie_store(true).build().unwrap();
        let resp = client
            .post(self.url("/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        client
    }
}

async fn spawn_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let pool = migrated_pool(&config).await;

    let app = build_router(AppState::new(pool.clone(), &config), config.max_upload_bytes);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        base: format!("http://{addr}"),
        pool,
        dir,
    }
}

fn dec(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).unwrap(),
        other => Decimal::from_str(&other.to_string()).unwrap(),
    }
}

async fn create_item(app: &TestApp, admin: &Client, name: &str) -> i64 {
    let group = group_id(&app.pool, "general").await;
    let resp = admin
        .post(app.url("/items"))
        .json(&json!({ "name": name, "group": group }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    resp.json::<Value>().await.unwrap()["id"].as_i64().unwrap()
}

#[tokio::test]
async fn login_sets_session_and_identifies_user() {
    let app = spawn_app().await;
    create_user(&app.pool, "petrova", "secret", true).await;

    let anonymous = Client::new();
    let resp = anonymous.get(app.url("/works")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key("x-request-id"));

    let resp = anonymous
        .post(app.url("/login"))
        .json(&json!({ "username": "petrova", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let client = app.login("petrova", "secret").await;
    let me: Value = client
        .get(app.url("/users/me"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["username"], "petrova");
    assert_eq!(me["is_admin"], true);

    let resp = client.post(app.url("/logout")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = client.get(app.url("/users/me")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn only_owner_or_privileged_user_may_edit_a_work() {
    let app = spawn_app().await;
    create_user(&app.pool, "admin", "pw", true).await;
    let alice_id = create_user(&app.pool, "alice", "pw", false).await;
    create_user(&app.pool, "bob", "pw", false).await;
    let admin = app.login("admin", "pw").await;
    let alice = app.login("alice", "pw").await;
    let bob = app.login("bob", "pw").await;
    let item = create_item(&app, &admin, "Certification").await;

    // responsible defaults to the creator
    let resp = alice
        .post(app.url("/works"))
        .json(&json!({ "item": item, "name": "Audit", "year": 2025 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let work: Value = resp.json().await.unwrap();
    assert_eq!(work["responsible"], alice_id);
    let work_id = work["id"].as_i64().unwrap();

    let resp = bob
        .patch(app.url(&format!("/works/{work_id}")))
        .json(&json!({ "name": "Hijacked" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let bob_sees: Vec<Value> = bob.get(app.url("/works")).send().await.unwrap().json().await.unwrap();
    assert!(bob_sees.is_empty());

    let resp = admin
        .patch(app.url(&format!("/works/{work_id}")))
        .json(&json!({ "name": "Audit 2025", "feasibility": "yellow" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Value = resp.json().await.unwrap();
    assert_eq!(updated["name"], "Audit 2025");
    assert_eq!(updated["feasibility"], "yellow");
    assert_eq!(updated["responsible"], alice_id);

    // reference data stays privileged
    let resp = alice
        .post(app.url("/items"))
        .json(&json!({ "name": "Rogue", "group": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn duplicate_detail_months_are_rejected_without_side_effects() {
    let app = spawn_app().await;
    create_user(&app.pool, "admin", "pw", true).await;
    let admin = app.login("admin", "pw").await;
    let item = create_item(&app, &admin, "General").await;

    let resp = admin
        .post(app.url("/works"))
        .json(&json!({
            "item": item,
            "name": "Calibration",
            "payment_details": [
                { "month": "Янв", "amount": "100" },
                { "month": "Янв", "amount": "5" }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["field"], "payment_details");

    let works: Vec<Value> = admin.get(app.url("/works")).send().await.unwrap().json().await.unwrap();
    assert!(works.is_empty());
}

#[tokio::test]
async fn legacy_actuals_become_detail_rows() {
    let app = spawn_app().await;
    create_user(&app.pool, "admin", "pw", true).await;
    let admin = app.login("admin", "pw").await;
    let item = create_item(&app, &admin, "General").await;

    let resp = admin
        .post(app.url("/works"))
        .json(&json!({
            "item": item,
            "name": "Patent fees",
            "actual_payments": {
                "Янв": 100,
                "Фев": { "amount": "50.25", "status": "paid" }
            }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let work: Value = resp.json().await.unwrap();

    let details = work["payment_details"].as_array().unwrap();
    assert_eq!(details.len(), 2);
    assert_eq!(details[0]["month"], "Янв");
    assert_eq!(dec(&details[1]["amount"]), Decimal::new(5025, 2));
    assert_eq!(work["actual_payments"]["Фев"]["status"], "paid");
    assert!(work["accrual_details"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn write_off_is_limited_by_the_reserve_balance() {
    let app = spawn_app().await;
    create_user(&app.pool, "admin", "pw", true).await;
    create_user(&app.pool, "clerk", "pw", false).await;
    let admin = app.login("admin", "pw").await;
    let clerk = app.login("clerk", "pw").await;
    let item = create_item(&app, &admin, "Investments").await;

    let reserve_body = json!({
        "item": item, "year": 2025, "quarter": 1,
        "accrual_sum": "1000", "payment_sum": "0"
    });
    let resp = clerk.post(app.url("/reserves")).json(&reserve_body).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = admin.post(app.url("/reserves")).json(&reserve_body).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let reserve_id = resp.json::<Value>().await.unwrap()["id"].as_i64().unwrap();
    let write_off = app.url(&format!("/reserves/{reserve_id}/write_off"));

    let resp = clerk.post(&write_off).json(&json!({ "acc": 600 })).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let view: Value = resp.json().await.unwrap();
    assert_eq!(dec(&view["balance_acc"]), Decimal::new(400, 0));

    let resp = clerk.post(&write_off).json(&json!({ "acc": 500 })).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "insufficient_reserve");

    let resp = clerk.post(&write_off).json(&json!({ "acc": -1 })).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = clerk.post(&write_off).json(&json!({ "acc": "400" })).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let view: Value = resp.json().await.unwrap();
    assert_eq!(dec(&view["balance_acc"]), Decimal::ZERO);
    assert_eq!(dec(&view["used_acc"]), Decimal::new(1000, 0));
}

#[tokio::test]
async fn material_needs_exactly_one_target() {
    let app = spawn_app().await;
    create_user(&app.pool, "admin", "pw", true).await;
    let admin = app.login("admin", "pw").await;
    let item = create_item(&app, &admin, "General").await;

    let file = || Part::bytes(b"scan".to_vec()).file_name("scan.pdf");

    let both = Form::new()
        .text("item", item.to_string())
        .text("work", "1")
        .part("file", file());
    let resp = admin.post(app.url("/materials")).multipart(both).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let neither = Form::new().part("file", file());
    let resp = admin.post(app.url("/materials")).multipart(neither).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let stored = app.dir.path().join("media").join("materials");
    let leftovers = std::fs::read_dir(&stored).map(|d| d.count()).unwrap_or(0);
    assert_eq!(leftovers, 0);

    let ok = Form::new().text("item", item.to_string()).part("file", file());
    let resp = admin.post(app.url("/materials")).multipart(ok).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let material: Value = resp.json().await.unwrap();
    assert_eq!(material["item"], item);
    assert_eq!(material["original_name"], "scan.pdf");
    let path = app.dir.path().join("media").join(material["file"].as_str().unwrap());
    assert_eq!(std::fs::read(&path).unwrap(), b"scan");

    let id = material["id"].as_i64().unwrap();
    let resp = admin.delete(app.url(&format!("/materials/{id}"))).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(!path.exists());
}

#[tokio::test]
async fn item_totals_roll_months_into_quarters() {
    let app = spawn_app().await;
    create_user(&app.pool, "admin", "pw", true).await;
    let admin = app.login("admin", "pw").await;
    let item = create_item(&app, &admin, "General").await;

    for (accruals, payments) in [
        (json!({ "Янв": 1200, "Мар": 800 }), json!({ "Апр": 500 })),
        (json!({ "Мар": "200" }), json!({})),
    ] {
        let resp = admin
            .post(app.url("/works"))
            .json(&json!({
                "item": item, "name": "Plan", "year": 2025,
                "accruals": accruals, "payments": payments
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let totals: Value = admin
        .get(app.url(&format!("/items/{item}/totals?year=2025")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(dec(&totals["quarters"][0]["acc"]), Decimal::new(2200, 0));
    assert_eq!(dec(&totals["quarters"][1]["pay"]), Decimal::new(500, 0));
    assert_eq!(totals["months"][2]["month"], "Мар");
    assert_eq!(dec(&totals["months"][2]["acc"]), Decimal::new(1000, 0));

    let listed: Vec<Value> = admin.get(app.url("/items")).send().await.unwrap().json().await.unwrap();
    assert_eq!(listed[0]["works"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn detail_attachment_upload_is_owner_only_and_path_safe() {
    let app = spawn_app().await;
    create_user(&app.pool, "admin", "pw", true).await;
    create_user(&app.pool, "alice", "pw", false).await;
    create_user(&app.pool, "bob", "pw", false).await;
    let admin = app.login("admin", "pw").await;
    let alice = app.login("alice", "pw").await;
    let bob = app.login("bob", "pw").await;
    let item = create_item(&app, &admin, "Certification").await;

    let resp = alice
        .post(app.url("/works"))
        .json(&json!({
            "item": item,
            "name": "Lab tests",
            "payment_details": [{ "month": "Янв", "amount": "300", "creditor": "Lab" }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let work_id = resp.json::<Value>().await.unwrap()["id"].as_i64().unwrap();

    let attachment = |kind: &str, month: &str| {
        app.url(&format!("/works/{work_id}/details/{kind}/{month}/attachment"))
    };
    let form = || Form::new().part("file", Part::bytes(b"act".to_vec()).file_name("act.pdf"));
    let stored_files = || {
        std::fs::read_dir(app.dir.path().join("media").join("details"))
            .map(|d| d.count())
            .unwrap_or(0)
    };

    let resp = bob.post(attachment("payment", "Янв")).multipart(form()).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = alice.post(attachment("payment", "Foo")).multipart(form()).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let resp = alice.post(attachment("bogus", "Янв")).multipart(form()).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = alice.post(attachment("payment", "Фев")).multipart(form()).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(stored_files(), 0);

    let resp = alice.post(attachment("payment", "Янв")).multipart(form()).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let detail: Value = resp.json().await.unwrap();
    let comment_file = detail["comment_file"].as_str().unwrap().to_string();
    assert!(comment_file.starts_with("details/"), "{comment_file}");
    assert_eq!(detail["creditor"], "Lab");
    let on_disk = app.dir.path().join("media").join(&comment_file);
    assert_eq!(std::fs::read(&on_disk).unwrap(), b"act");
    assert_eq!(stored_files(), 1);

    // a list write cannot point the row at an arbitrary path
    let resp = alice
        .patch(app.url(&format!("/works/{work_id}")))
        .json(&json!({
            "payment_details": [{ "month": "Янв", "amount": "300", "comment_file": "../../etc/passwd" }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // rewriting the list without comment_file keeps the uploaded attachment
    let resp = alice
        .patch(app.url(&format!("/works/{work_id}")))
        .json(&json!({ "payment_details": [{ "month": "Янв", "amount": "350" }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let work: Value = resp.json().await.unwrap();
    let row = &work["payment_details"][0];
    assert_eq!(dec(&row["amount"]), Decimal::new(350, 0));
    assert_eq!(row["comment_file"], comment_file.as_str());
}
