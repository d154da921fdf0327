mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{body_to_json, TestApp};
use serde_json::json;

#[tokio::test]
async fn create_then_lookup_by_id_and_cnpj() -> Result<()> {
    let app = TestApp::new()?;
    let token = app.login_token().await?;

    let response = app
        .post_json(
            "/api/companies",
            &json!({
                "identification": {
                    "legalName": "Acme Transportes Ltda",
                    "tradeName": "Acme",
                    "cnpj": "12345678000190"
                },
                "operations": {"hasFleet": true, "vehicleCount": 12},
                "compliance": {"lgpdConsent": {"accepted": true}},
                "profile": {"status": "prospect", "kycScore": 61, "completenessScore": 40}
            }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let created = body_to_json(response).await?;

    let id = created["id"].as_str().unwrap();
    assert!(!id.is_empty());
    assert!(created["createdAt"].is_string());
    assert!(created.get("updatedAt").is_none());
    assert_eq!(created["identification"]["legalName"], "Acme Transportes Ltda");
    assert_eq!(created["operations"]["vehicleCount"], 12);

    let response = app
        .get(&format!("/api/companies/{id}"), Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .get("/api/companies/cnpj/12345678000190", Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let by_cnpj = body_to_json(response).await?;
    assert_eq!(by_cnpj["id"], id);

    let response = app
        .get("/api/companies/cnpj/00000000000000", Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn update_requires_identification_and_sets_updated_at() -> Result<()> {
    let app = TestApp::new()?;
    let token = app.login_token().await?;

    let response = app
        .post_json(
            "/api/companies",
            &json!({"identification": {"legalName": "Beta SA", "cnpj": "99887766000155"}}),
            Some(&token),
        )
        .await?;
    let created = body_to_json(response).await?;
    let id = created["id"].as_str().unwrap().to_string();
    let created_at = created["createdAt"].as_str().unwrap().to_string();

    let response = app
        .put_json(
            &format!("/api/companies/{id}"),
            &json!({"financial": {"annualRevenue": 1000000.0}}),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_to_json(response).await?;
    assert!(body["details"]
        .as_array()
        .unwrap()
        .iter()
        .any(|d| d.as_str().unwrap().contains("identification")));

    let response = app
        .put_json(
            &format!("/api/companies/{id}"),
            &json!({
                "identification": {"legalName": "Beta S.A.", "cnpj": "99887766000155"},
                "financial": {"annualRevenue": 1000000.0}
            }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_to_json(response).await?;
    assert_eq!(updated["id"], id.as_str());
    assert_eq!(updated["createdAt"], created_at.as_str());
    assert!(updated["updatedAt"].is_string());
    assert_eq!(updated["identification"]["legalName"], "Beta S.A.");

    Ok(())
}

#[tokio::test]
async fn duplicate_cnpj_is_a_conflict() -> Result<()> {
    let app = TestApp::new()?;
    let token = app.login_token().await?;

    let payload = json!({"identification": {"legalName": "Gamma", "cnpj": "11222333000144"}});
    let response = app
        .post_json("/api/companies", &payload, Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .post_json("/api/companies", &payload, Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    Ok(())
}

#[tokio::test]
async fn listing_searches_legal_name_and_cnpj() -> Result<()> {
    let app = TestApp::new()?;
    let token = app.login_token().await?;

    for (name, cnpj, status) in [
        ("Acme Transportes Ltda", "12345678000190", "client"),
        ("Beta Logistica SA", "99887766000155", "prospect"),
        ("Gamma Cargas ME", "11222333000144", "prospect"),
    ] {
        let response = app
            .post_json(
                "/api/companies",
                &json!({
                    "identification": {"legalName": name, "cnpj": cnpj},
                    "profile": {"status": status}
                }),
                Some(&token),
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .get("/api/companies?search=acme", Some(&token))
        .await?;
    let body = body_to_json(response).await?;
    assert_eq!(body["total"], 1);
    assert_eq!(
        body["items"][0]["identification"]["legalName"],
        "Acme Transportes Ltda"
    );

    // CNPJ substrings hit through the same search box.
    let response = app
        .get("/api/companies?search=998877", Some(&token))
        .await?;
    let body = body_to_json(response).await?;
    assert_eq!(body["total"], 1);

    let response = app
        .get("/api/companies?status=prospect", Some(&token))
        .await?;
    let body = body_to_json(response).await?;
    assert_eq!(body["total"], 2);

    Ok(())
}

#[tokio::test]
async fn malformed_company_ids_are_not_found() -> Result<()> {
    let app = TestApp::new()?;
    let token = app.login_token().await?;

    let response = app.get("/api/companies/zz-not-an-id", Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .delete("/api/companies/662f9a7c8b3e4d5a6f7b8c9d", Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn stats_report_totals() -> Result<()> {
    let app = TestApp::new()?;
    let token = app.login_token().await?;

    for (i, status) in ["prospect", "client", "client"].iter().enumerate() {
        app.post_json(
            "/api/companies",
            &json!({
                "identification": {"legalName": format!("Empresa {i}"), "cnpj": format!("cnpj-{i}")},
                "profile": {"status": status}
            }),
            Some(&token),
        )
        .await?;
    }

    let response = app.get("/api/companies/stats", Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_json(response).await?;
    assert_eq!(body["total"], 3);
    assert_eq!(body["byStatus"]["prospect"], 1);
    assert_eq!(body["byStatus"]["client"], 2);

    Ok(())
}
