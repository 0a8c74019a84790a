mod common;

use anyhow::Result;
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::json;

use alumnihub_api::database::SurveyStore;

async fn seeded(app: &common::TestApp) -> Result<(i64, i64, i64)> {
    let (_, body) = app.post("/forms/create", &common::admin_token(), common::tracer_study()).await?;
    let form_id = body["data"]["id"].as_i64().unwrap();
    let questions = app.store.questions_by_form(form_id as i32).await?;
    Ok((form_id, questions[0].id as i64, questions[1].id as i64))
}

#[tokio::test]
async fn submission_is_attributed_to_token_user() -> Result<()> {
    let app = common::TestApp::new();
    let (form_id, employed, company) = seeded(&app).await?;
    let member = common::member_token(5);

    let (status, body) = app
        .post(
            &format!("/forms/{}/submit", form_id),
            &member,
            json!([
                { "question_id": employed, "answer_text": "yes" },
                { "question_id": company, "answer_text": "ACME" }
            ]),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["count"], 2);

    let (status, body) = app.get("/answers/me", &member).await?;
    assert_eq!(status, StatusCode::OK);
    let answers = body["data"].as_array().unwrap();
    assert_eq!(answers.len(), 2);
    assert!(answers.iter().all(|a| a["user_id"] == 5));
    Ok(())
}

#[tokio::test]
async fn foreign_question_rejects_batch() -> Result<()> {
    let app = common::TestApp::new();
    let (form_id, employed, _) = seeded(&app).await?;

    let (status, body) = app
        .post(
            &format!("/forms/{}/submit", form_id),
            &common::member_token(5),
            json!([
                { "question_id": employed, "answer_text": "yes" },
                { "question_id": 999, "answer_text": "??" }
            ]),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(app.store.answers_by_user(5).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn closed_form_refuses_answers() -> Result<()> {
    let app = common::TestApp::new();
    let admin = common::admin_token();
    let (form_id, employed, _) = seeded(&app).await?;

    let now = Utc::now();
    let (status, _) = app
        .patch(
            &format!("/forms/{}", form_id),
            &admin,
            json!({
                "title": "Tracer study",
                "has_time_limit": true,
                "start_date": now - Duration::days(10),
                "end_date": now - Duration::days(1)
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .post(
            &format!("/forms/{}/submit", form_id),
            &common::member_token(5),
            json!([{ "question_id": employed, "answer_text": "yes" }]),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn reports_group_answers() -> Result<()> {
    let app = common::TestApp::new();
    let admin = common::admin_token();
    let (form_id, employed, _) = seeded(&app).await?;

    for (user, text) in [(11, "yes"), (12, "no"), (13, "yes")] {
        let (status, _) = app
            .post(
                &format!("/forms/{}/submit", form_id),
                &common::member_token(user),
                json!([{ "question_id": employed, "answer_text": text }]),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = app
        .get(&format!("/forms/{}/questions/{}/answers", form_id, employed), &admin)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!([
            { "form_id": form_id, "question_id": employed, "answer_text": "yes", "count": 2 },
            { "form_id": form_id, "question_id": employed, "answer_text": "no", "count": 1 }
        ])
    );

    let (status, body) = app.get(&format!("/forms/{}/answers", form_id), &admin).await?;
    assert_eq!(status, StatusCode::OK);
    let questions = body["data"]["questions"].as_array().unwrap();
    assert_eq!(questions[0]["answers_group"].as_array().unwrap().len(), 2);
    assert_eq!(questions[1]["answers_group"], json!([]));

    let (status, _) = app
        .get(&format!("/forms/{}/answers", form_id), &common::member_token(11))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn other_users_answers_are_admin_only() -> Result<()> {
    let app = common::TestApp::new();
    let (form_id, employed, _) = seeded(&app).await?;
    app.post(
        &format!("/forms/{}/submit", form_id),
        &common::member_token(5),
        json!([{ "question_id": employed, "answer_text": "no" }]),
    )
    .await?;

    let (status, _) = app.get("/users/5/answers", &common::member_token(6)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.get("/users/5/answers", &common::admin_token()).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["answer_text"], "no");
    Ok(())
}
