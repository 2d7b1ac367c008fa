use actix_web::cookie::Cookie;
use actix_web::test;
use boardfinder::auth::Role;
use boardfinder::config::AppConfig;
use boardfinder::repo::BoardingRepo;
use serde_json::{json, Value};

#[macro_use]
mod common;
use common::{bearer, body_json, boarding_json, ctx, ctx_with};

fn register_body(name: &str, email: &str, role: &str) -> Value {
    json!({"name": name, "email": email, "password": "secret123", "role": role, "phone": "0771234567"})
}

#[actix_web::test]
async fn register_login_me_logout_flow() {
    let ctx = ctx().await;
    let app = app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/v1/register")
        .set_json(register_body("Nimal", "  Nimal@Example.com ", "owner"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let v = body_json(resp).await;
    assert_eq!(v["success"], true);
    assert_eq!(v["message"], "User was created");
    assert_eq!(v["data"]["email"], "nimal@example.com");
    assert_eq!(v["data"]["role"], "owner");
    assert!(v["data"].get("password_hash").is_none());

    // same address, different case
    let req = test::TestRequest::post()
        .uri("/api/v1/register")
        .set_json(register_body("Other", "NIMAL@example.com", "student"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 409);
    assert_eq!(body_json(resp).await["message"], "Email already exists");

    for (email, password) in [("nimal@example.com", "wrong-pass"), ("nobody@example.com", "secret123")] {
        let req = test::TestRequest::post()
            .uri("/api/v1/login")
            .set_json(json!({"email": email, "password": password}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
        assert_eq!(body_json(resp).await["message"], "Invalid email or password");
    }

    let req = test::TestRequest::post()
        .uri("/api/v1/login")
        .set_json(json!({"email": "NIMAL@example.com", "password": "secret123"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let cookie = resp
        .response()
        .cookies()
        .find(|c| c.name() == "bf_session")
        .map(|c| c.value().to_string())
        .expect("session cookie");
    assert!(resp.response().cookies().any(|c| c.name() == "bf_session" && c.http_only() == Some(true)));
    let v = body_json(resp).await;
    let token = v["data"]["token"].as_str().unwrap().to_string();
    assert_eq!(token, cookie);
    assert_eq!(v["data"]["user"]["name"], "Nimal");

    let req = test::TestRequest::get().uri("/api/v1/me").insert_header(bearer(&token)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(body_json(resp).await["data"]["email"], "nimal@example.com");

    let req = test::TestRequest::get().uri("/api/v1/me").cookie(Cookie::new("bf_session", token.clone())).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    let req = test::TestRequest::post().uri("/api/v1/logout").insert_header(bearer(&token)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(body_json(resp).await["message"], "Logged out");

    let req = test::TestRequest::get().uri("/api/v1/me").insert_header(bearer(&token)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
    assert_eq!(body_json(resp).await["success"], false);
}

#[actix_web::test]
async fn register_rejects_bad_input_and_admin_self_signup() {
    let ctx = ctx().await;
    let app = app!(ctx);

    let cases = [
        (json!({"name": "A", "email": "a@example.com"}), 400),
        (register_body("A", "not-an-email", "student"), 400),
        (json!({"name": "A", "email": "a@example.com", "password": "123", "role": "student"}), 400),
        (register_body("A", "a@example.com", "landlord"), 400),
        (register_body("A", "a@example.com", "admin"), 403),
    ];
    for (body, status) in cases {
        let req = test::TestRequest::post().uri("/api/v1/register").set_json(&body).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), status, "body: {body}");
        assert_eq!(body_json(resp).await["success"], false);
    }
}

#[actix_web::test]
async fn bootstrap_email_may_register_as_admin() {
    let ctx = ctx_with(AppConfig {
        rate_limit_enabled: false,
        bootstrap_admin_emails: vec!["root@example.com".into()],
        ..AppConfig::default()
    })
    .await;
    let app = app!(ctx);
    let req = test::TestRequest::post()
        .uri("/api/v1/register")
        .set_json(register_body("Root", "Root@example.com", "admin"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    assert_eq!(body_json(resp).await["data"]["role"], "admin");
}

#[actix_web::test]
async fn boarding_crud_enforces_ownership() {
    let ctx = ctx().await;
    let app = app!(ctx);
    let (_, owner) = ctx.user("Owner", Role::Owner).await;
    let (_, rival) = ctx.user("Rival", Role::Owner).await;
    let (_, student) = ctx.user("Student", Role::Student).await;

    let req = test::TestRequest::post().uri("/api/v1/boardings").set_json(boarding_json()).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);

    let req = test::TestRequest::post()
        .uri("/api/v1/boardings")
        .insert_header(bearer(&student))
        .set_json(boarding_json())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    let req = test::TestRequest::post()
        .uri("/api/v1/boardings")
        .insert_header(bearer(&owner))
        .set_json(boarding_json())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let v = body_json(resp).await;
    assert_eq!(v["message"], "Boarding created successfully");
    let id = v["data"]["id"].as_i64().unwrap();

    let mut edit = boarding_json();
    edit["id"] = json!(id);
    edit["title"] = json!("Hijacked");
    let req = test::TestRequest::put()
        .uri("/api/v1/boardings")
        .insert_header(bearer(&rival))
        .set_json(&edit)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);
    assert_eq!(body_json(resp).await["message"], "Forbidden. You can only edit your own boardings");

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/boardings?id={id}"))
        .insert_header(bearer(&rival))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    let req = test::TestRequest::get().uri(&format!("/api/v1/boardings?id={id}")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let v = body_json(resp).await;
    assert_eq!(v["data"]["title"], "Annex for two");
    assert_eq!(v["data"]["type"], "shared");
    assert_eq!(v["data"]["facilities"], json!(["WiFi", "Parking"]));
    assert_eq!(v["data"]["images"], json!([]));

    // an edit as a string id is accepted too
    edit["id"] = json!(id.to_string());
    edit["title"] = json!("<b>Renovated</b> annex");
    let req = test::TestRequest::put()
        .uri("/api/v1/boardings")
        .insert_header(bearer(&owner))
        .set_json(&edit)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(body_json(resp).await["data"]["title"], "Renovated annex");

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/boardings?id={id}"))
        .insert_header(bearer(&owner))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    let req = test::TestRequest::get().uri(&format!("/api/v1/boardings?id={id}")).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
    assert_eq!(body_json(resp).await["message"], "Boarding not found");
}

#[actix_web::test]
async fn admin_may_edit_any_listing() {
    let ctx = ctx().await;
    let app = app!(ctx);
    let (owner_id, _) = ctx.user("Owner", Role::Owner).await;
    let (_, admin) = ctx.user("Admin", Role::Admin).await;
    let id = ctx.boarding(owner_id, 8000.0, &[]).await;

    let mut edit = boarding_json();
    edit["id"] = json!(id);
    let req = test::TestRequest::put()
        .uri("/api/v1/boardings")
        .insert_header(bearer(&admin))
        .set_json(&edit)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
    let stored = ctx.repo.get_boarding(id).await.unwrap();
    assert_eq!(stored.owner_id, owner_id);
    assert_eq!(stored.price, 15000.0);
}

#[actix_web::test]
async fn error_envelope_and_method_handling() {
    let ctx = ctx().await;
    let app = app!(ctx);
    let (_, owner) = ctx.user("Owner", Role::Owner).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/boardings")
        .insert_header(bearer(&owner))
        .set_json(json!({"title": "Only a title"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let v = body_json(resp).await;
    assert_eq!(v["success"], false);
    assert!(v["message"].as_str().unwrap().starts_with("Missing required fields"));
    assert!(v.get("data").is_none());

    let req = test::TestRequest::post()
        .uri("/api/v1/boardings")
        .insert_header(bearer(&owner))
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    assert!(body_json(resp).await["message"].as_str().unwrap().starts_with("Invalid JSON format"));

    let req = test::TestRequest::patch().uri("/api/v1/boardings").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 405);
    assert_eq!(body_json(resp).await["message"], "Method not allowed");

    let req = test::TestRequest::get().uri("/api/v1/login").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 405);

    let req = test::TestRequest::get().uri("/api/v1/nowhere").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
    assert_eq!(body_json(resp).await["success"], false);

    let req = test::TestRequest::get().uri("/api/v1/boardings?min_price=cheap").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    assert_eq!(body_json(resp).await["message"], "Invalid min_price value");

    let req = test::TestRequest::get().uri("/api/v1/boardings?id=abc").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);
}

#[actix_web::test]
async fn show_all_is_admin_only() {
    let ctx = ctx().await;
    let app = app!(ctx);
    let (owner_id, _) = ctx.user("Owner", Role::Owner).await;
    let (_, student) = ctx.user("Student", Role::Student).await;
    let (_, admin) = ctx.user("Admin", Role::Admin).await;
    ctx.repo.create_boarding(owner_id, common::input(), false).await.unwrap();
    ctx.boarding(owner_id, 2_000_000.0, &[]).await;

    let req = test::TestRequest::get().uri("/api/v1/boardings?all=true").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);

    let req = test::TestRequest::get().uri("/api/v1/boardings?all=true").insert_header(bearer(&student)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);
    assert_eq!(body_json(resp).await["message"], "Forbidden. Admins only");

    let req = test::TestRequest::get().uri("/api/v1/boardings?all=true").insert_header(bearer(&admin)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(body_json(resp).await["data"].as_array().unwrap().len(), 2);
}

#[actix_web::test]
async fn search_over_http_applies_filters() {
    let ctx = ctx().await;
    let app = app!(ctx);
    let (owner_id, _) = ctx.user("Owner", Role::Owner).await;
    ctx.boarding(owner_id, 8000.0, &["AC", "WiFi"]).await;
    ctx.boarding(owner_id, 12000.0, &["AC", "WiFi"]).await;
    ctx.boarding(owner_id, 9000.0, &["WiFi"]).await;

    let req = test::TestRequest::get()
        .uri("/api/v1/boardings?min_price=5000&max_price=10000&facilities=AC,WiFi&university=moratuwa")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let v = body_json(resp).await;
    let rows = v["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["price"].as_f64(), Some(8000.0));

    let req = test::TestRequest::get().uri("/api/v1/boardings?sort=price_high").to_request();
    let v = body_json(test::call_service(&app, req).await).await;
    let prices: Vec<f64> = v["data"].as_array().unwrap().iter().map(|r| r["price"].as_f64().unwrap()).collect();
    assert_eq!(prices, vec![12000.0, 9000.0, 8000.0]);
}

#[actix_web::test]
async fn search_finds_text_with_quotes_and_ampersands() {
    let ctx = ctx().await;
    let app = app!(ctx);
    let (_, owner) = ctx.user("Owner", Role::Owner).await;
    let mut body = boarding_json();
    body["university"] = json!("St. Mary's College");
    body["town"] = json!("Fort & Pettah");
    body["facilities"] = json!(["Hot & Cold Water", "WiFi"]);
    let req = test::TestRequest::post()
        .uri("/api/v1/boardings")
        .insert_header(bearer(&owner))
        .set_json(body)
        .to_request();
    let id = body_json(test::call_service(&app, req).await).await["data"]["id"].as_i64().unwrap();

    let req = test::TestRequest::get().uri(&format!("/api/v1/boardings?id={id}")).to_request();
    let v = body_json(test::call_service(&app, req).await).await;
    assert_eq!(v["data"]["facilities"], json!(["Hot & Cold Water", "WiFi"]));

    for query in [
        "university=Mary%27s",
        "town=Fort%20%26%20Pettah",
        "facilities=Hot%20%26%20Cold%20Water,wifi",
        "university=st.%20mary%27s&facilities=Hot%20%26%20Cold%20Water",
    ] {
        let req = test::TestRequest::get().uri(&format!("/api/v1/boardings?{query}")).to_request();
        let v = body_json(test::call_service(&app, req).await).await;
        let ids: Vec<i64> = v["data"].as_array().unwrap().iter().map(|r| r["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![id], "query {query}");
    }
}

#[actix_web::test]
async fn malformed_path_id_uses_error_envelope() {
    let ctx = ctx().await;
    let app = app!(ctx);
    let (_, admin) = ctx.user("Admin", Role::Admin).await;
    for target in ["boardings", "services"] {
        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/admin/{target}/abc/approval"))
            .insert_header(bearer(&admin))
            .set_json(json!({"approved": true}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let v = body_json(resp).await;
        assert_eq!(v["success"], false);
        assert!(v["message"].as_str().unwrap().starts_with("Invalid path parameter"));
    }
}

#[actix_web::test]
async fn owner_listings_and_stats() {
    let ctx = ctx().await;
    let app = app!(ctx);
    let (owner_id, _) = ctx.user("Owner", Role::Owner).await;
    let (other_id, _) = ctx.user("Other", Role::Owner).await;
    ctx.boarding(owner_id, 8000.0, &[]).await;
    ctx.boarding(owner_id, 7000.0, &[]).await;
    ctx.boarding(other_id, 5000.0, &[]).await;

    let req = test::TestRequest::get().uri(&format!("/api/v1/boardings?owner_id={owner_id}")).to_request();
    let v = body_json(test::call_service(&app, req).await).await;
    assert_eq!(v["data"].as_array().unwrap().len(), 2);

    let req = test::TestRequest::get().uri(&format!("/api/v1/boardings?owner_id={owner_id}&stats=true")).to_request();
    let v = body_json(test::call_service(&app, req).await).await;
    assert_eq!(v["data"]["total_boardings"], 2);
    assert_eq!(v["data"]["total_rooms"], 2);
    assert_eq!(v["data"]["total_bathrooms"], 2);
    assert_eq!(v["data"]["total_income"].as_f64(), Some(15000.0));

    let req = test::TestRequest::get().uri("/api/v1/boardings?owner_id=999&stats=true").to_request();
    let v = body_json(test::call_service(&app, req).await).await;
    assert_eq!(v["data"]["total_boardings"], 0);
    assert_eq!(v["data"]["total_income"].as_f64(), Some(0.0));
}

#[actix_web::test]
async fn approval_gate_hides_listings_until_approved() {
    let ctx = ctx_with(AppConfig { rate_limit_enabled: false, require_listing_approval: true, ..AppConfig::default() })
        .await;
    let app = app!(ctx);
    let (_, owner) = ctx.user("Owner", Role::Owner).await;
    let (_, admin) = ctx.user("Admin", Role::Admin).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/boardings")
        .insert_header(bearer(&owner))
        .set_json(boarding_json())
        .to_request();
    let id = body_json(test::call_service(&app, req).await).await["data"]["id"].as_i64().unwrap();

    let req = test::TestRequest::get().uri("/api/v1/boardings").to_request();
    let v = body_json(test::call_service(&app, req).await).await;
    assert_eq!(v["data"].as_array().unwrap().len(), 0);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/admin/boardings/{id}/approval"))
        .insert_header(bearer(&owner))
        .set_json(json!({"approved": true}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/admin/boardings/{id}/approval"))
        .insert_header(bearer(&admin))
        .set_json(json!({"approved": true}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(body_json(resp).await["data"]["is_approved"], true);

    let req = test::TestRequest::get().uri("/api/v1/boardings").to_request();
    let v = body_json(test::call_service(&app, req).await).await;
    assert_eq!(v["data"].as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn users_endpoint_is_admin_only_and_delete_cascades() {
    let ctx = ctx().await;
    let app = app!(ctx);
    let (owner_id, owner) = ctx.user("Owner", Role::Owner).await;
    let (_, student) = ctx.user("Student", Role::Student).await;
    let (_, admin) = ctx.user("Admin", Role::Admin).await;
    let boarding = ctx.boarding(owner_id, 8000.0, &[]).await;

    let req = test::TestRequest::get().uri("/api/v1/users").insert_header(bearer(&student)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);
    assert_eq!(body_json(resp).await["message"], "Forbidden. Admins only");

    let req = test::TestRequest::get().uri("/api/v1/users?role=owner").insert_header(bearer(&admin)).to_request();
    let v = body_json(test::call_service(&app, req).await).await;
    let users = v["data"].as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["email"], "owner@example.com");

    let req = test::TestRequest::get().uri("/api/v1/users?role=wizard").insert_header(bearer(&admin)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/users?id={owner_id}"))
        .insert_header(bearer(&student))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/users?id={owner_id}"))
        .insert_header(bearer(&admin))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(body_json(resp).await["message"], "User was deleted");

    assert!(ctx.repo.get_boarding(boarding).await.is_err());
    let req = test::TestRequest::get().uri("/api/v1/me").insert_header(bearer(&owner)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/users?id={owner_id}"))
        .insert_header(bearer(&admin))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_web::test]
async fn favorites_flow() {
    let ctx = ctx().await;
    let app = app!(ctx);
    let (owner_id, _) = ctx.user("Owner", Role::Owner).await;
    let (_, student) = ctx.user("Student", Role::Student).await;
    let id = ctx.boarding(owner_id, 8000.0, &[]).await;

    let req = test::TestRequest::get().uri("/api/v1/favorites").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);

    let add = || {
        test::TestRequest::post()
            .uri("/api/v1/favorites")
            .insert_header(bearer(&student))
            .set_json(json!({"boarding_id": id}))
            .to_request()
    };
    let resp = test::call_service(&app, add()).await;
    assert_eq!(resp.status(), 201);
    assert_eq!(body_json(resp).await["message"], "Added to favorites");
    let resp = test::call_service(&app, add()).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(body_json(resp).await["message"], "Already in favorites");

    let req = test::TestRequest::get().uri("/api/v1/favorites").insert_header(bearer(&student)).to_request();
    let v = body_json(test::call_service(&app, req).await).await;
    let rows = v["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"].as_i64(), Some(id));
    assert!(rows[0]["favorited_at"].is_string());

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/favorites?boarding_id={id}"))
        .insert_header(bearer(&student))
        .to_request();
    let v = body_json(test::call_service(&app, req).await).await;
    assert_eq!(v["data"]["is_favorite"], true);

    for _ in 0..2 {
        let req = test::TestRequest::delete()
            .uri(&format!("/api/v1/favorites?boarding_id={id}"))
            .insert_header(bearer(&student))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        assert_eq!(body_json(resp).await["data"]["is_favorite"], false);
    }

    let req = test::TestRequest::post()
        .uri("/api/v1/favorites")
        .insert_header(bearer(&student))
        .set_json(json!({"boarding_id": 4242}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);

    let req = test::TestRequest::post()
        .uri("/api/v1/favorites")
        .insert_header(bearer(&student))
        .set_json(json!({}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);
}

#[actix_web::test]
async fn services_are_created_by_providers_only() {
    let ctx = ctx().await;
    let app = app!(ctx);
    let (_, provider) = ctx.user("Laundry", Role::Service).await;
    let (_, rival) = ctx.user("Rival", Role::Service).await;
    let (_, student) = ctx.user("Student", Role::Student).await;
    let service = json!({
        "service_type": "laundry",
        "university": "University of Moratuwa",
        "town": "Katubedda",
        "name": "Quick Wash",
        "contact_number": "0771234567",
        "description": "Same day service"
    });

    let req = test::TestRequest::post()
        .uri("/api/v1/services")
        .insert_header(bearer(&student))
        .set_json(&service)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    let req = test::TestRequest::post()
        .uri("/api/v1/services")
        .insert_header(bearer(&provider))
        .set_json(&service)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let id = body_json(resp).await["data"]["id"].as_i64().unwrap();

    let req = test::TestRequest::get().uri("/api/v1/services").to_request();
    let v = body_json(test::call_service(&app, req).await).await;
    let rows = v["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["provider_name"], "Laundry");
    assert!(rows[0]["image"].is_null());

    let mut edit = service.clone();
    edit["id"] = json!(id);
    edit["name"] = json!("Stolen");
    let req = test::TestRequest::put()
        .uri("/api/v1/services")
        .insert_header(bearer(&rival))
        .set_json(&edit)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/services?id={id}"))
        .insert_header(bearer(&provider))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    let req = test::TestRequest::get().uri(&format!("/api/v1/services?id={id}")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}
