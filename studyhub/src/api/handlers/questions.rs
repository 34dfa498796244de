use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::{
        questions::{
            AnswerCreate, AnswerResponse, ListQuestionsQuery, QuestionCreate, QuestionDetailResponse, QuestionResponse, VoteRequest,
            VoteResponse,
        },
        users::CurrentUser,
    },
    db::models::questions::{AnswerCreateDBRequest, QuestionCreateDBRequest, QuestionFilter},
    errors::{Error, Result},
    services::voting,
    store::Store,
    types::{AnswerId, QuestionId, UserId, VoteTarget, VoteValue, is_known_subject},
};

fn required(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::bad_request(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn parse_vote(request: &VoteRequest) -> Result<VoteValue> {
    request
        .vote_type
        .as_i64()
        .and_then(|value| i16::try_from(value).ok())
        .and_then(|value| VoteValue::try_from(value).ok())
        .ok_or_else(|| Error::bad_request(format!("vote_type must be 1 or -1, got {}", request.vote_type)))
}

/// Cast a vote and report the caller's resulting vote and the target's new total.
async fn vote_on(store: &dyn Store, user_id: UserId, target: VoteTarget, value: VoteValue) -> Result<VoteResponse> {
    let outcome = voting::cast_vote(store, user_id, target, value).await?;
    let my_vote = store.find_vote(target, user_id).await?.map(|v| v.value.as_i16());
    let votes = match target {
        VoteTarget::Question(id) => store.get_question(id).await?.map(|q| q.votes),
        VoteTarget::Answer(id) => store.get_answer(id).await?.map(|a| a.votes),
    }
    .ok_or_else(|| Error::not_found(target.kind(), target.id()))?;

    Ok(VoteResponse { outcome, my_vote, votes })
}

/// List questions
#[utoipa::path(
    get,
    path = "/questions",
    tag = "questions",
    summary = "List questions",
    description = "Newest first. `search` matches title, content and tags case-insensitively; `subject` is exact.",
    params(ListQuestionsQuery),
    responses(
        (status = 200, description = "Questions", body = [QuestionResponse]),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_questions(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<ListQuestionsQuery>,
) -> Result<Json<Vec<QuestionResponse>>> {
    let filter = QuestionFilter::new(query.search, query.subject);
    let questions = state.store.list_questions(&filter).await?;
    Ok(Json(questions.into_iter().map(QuestionResponse::from).collect()))
}

/// Ask a question
#[utoipa::path(
    post,
    path = "/questions",
    tag = "questions",
    summary = "Create question",
    request_body = QuestionCreate,
    responses(
        (status = 201, description = "Question created", body = QuestionResponse),
        (status = 400, description = "Missing field or unknown subject"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_question(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(create): Json<QuestionCreate>,
) -> Result<(StatusCode, Json<QuestionResponse>)> {
    let title = required(&create.title, "Title")?;
    let content = required(&create.content, "Content")?;
    let subject = required(&create.subject, "Subject")?;
    if !is_known_subject(&subject) {
        return Err(Error::bad_request(format!("Unknown subject: {subject}")));
    }
    let tags = create
        .tags
        .iter()
        .map(|tag| tag.trim())
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect();

    let question = state
        .store
        .create_question(&QuestionCreateDBRequest {
            user_id: current_user.id,
            title,
            content,
            subject,
            grade_level: create.grade_level,
            tags,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(question.into())))
}

/// Get a question with its answers
#[utoipa::path(
    get,
    path = "/questions/{id}",
    tag = "questions",
    summary = "Get question",
    description = "The question, its answers by votes, and the caller's own votes.",
    params(("id" = uuid::Uuid, Path, description = "Question ID")),
    responses(
        (status = 200, description = "Question detail", body = QuestionDetailResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Question not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_question(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<QuestionId>,
) -> Result<Json<QuestionDetailResponse>> {
    let question = state
        .store
        .get_question(id)
        .await?
        .ok_or_else(|| Error::not_found("Question", id))?;
    let answers = state.store.list_answers(id).await?;
    let my_vote = state
        .store
        .find_vote(VoteTarget::Question(id), current_user.id)
        .await?
        .map(|v| v.value.as_i16());
    let my_answer_votes: HashMap<AnswerId, i16> = state
        .store
        .list_answer_votes(id, current_user.id)
        .await?
        .into_iter()
        .map(|v| (v.target_id, v.value.as_i16()))
        .collect();

    Ok(Json(QuestionDetailResponse {
        question: question.into(),
        answers: answers.into_iter().map(AnswerResponse::from).collect(),
        my_vote,
        my_answer_votes,
    }))
}

/// Answer a question
#[utoipa::path(
    post,
    path = "/questions/{id}/answers",
    tag = "questions",
    summary = "Create answer",
    request_body = AnswerCreate,
    params(("id" = uuid::Uuid, Path, description = "Question ID")),
    responses(
        (status = 201, description = "Answer created", body = AnswerResponse),
        (status = 400, description = "Empty content"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Question not found"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_answer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<QuestionId>,
    Json(create): Json<AnswerCreate>,
) -> Result<(StatusCode, Json<AnswerResponse>)> {
    let content = required(&create.content, "Content")?;
    if state.store.get_question(id).await?.is_none() {
        return Err(Error::not_found("Question", id));
    }

    let answer = state
        .store
        .create_answer(&AnswerCreateDBRequest {
            question_id: id,
            user_id: current_user.id,
            content,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(answer.into())))
}

/// Vote on a question
#[utoipa::path(
    post,
    path = "/questions/{id}/votes",
    tag = "questions",
    summary = "Vote on question",
    description = "Casting the vote you already hold retracts it; casting the other value flips it.",
    request_body = VoteRequest,
    params(("id" = uuid::Uuid, Path, description = "Question ID")),
    responses(
        (status = 200, description = "Vote applied", body = VoteResponse),
        (status = 400, description = "vote_type is not 1 or -1"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Question not found"),
        (status = 409, description = "A concurrent vote was recorded first"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn vote_question(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<QuestionId>,
    Json(request): Json<VoteRequest>,
) -> Result<Json<VoteResponse>> {
    let value = parse_vote(&request)?;
    if state.store.get_question(id).await?.is_none() {
        return Err(Error::not_found("Question", id));
    }
    Ok(Json(vote_on(state.store.as_ref(), current_user.id, VoteTarget::Question(id), value).await?))
}

/// Vote on an answer
#[utoipa::path(
    post,
    path = "/answers/{id}/votes",
    tag = "questions",
    summary = "Vote on answer",
    request_body = VoteRequest,
    params(("id" = uuid::Uuid, Path, description = "Answer ID")),
    responses(
        (status = 200, description = "Vote applied", body = VoteResponse),
        (status = 400, description = "vote_type is not 1 or -1"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Answer not found"),
        (status = 409, description = "A concurrent vote was recorded first"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn vote_answer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<AnswerId>,
    Json(request): Json<VoteRequest>,
) -> Result<Json<VoteResponse>> {
    let value = parse_vote(&request)?;
    if state.store.get_answer(id).await?.is_none() {
        return Err(Error::not_found("Answer", id));
    }
    Ok(Json(vote_on(state.store.as_ref(), current_user.id, VoteTarget::Answer(id), value).await?))
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::questions::{AnswerResponse, QuestionDetailResponse, QuestionResponse},
        test_utils::{bearer, create_test_server, seed_user},
        types::AppRole,
    };
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    fn question_body(title: &str, subject: &str, tags: &[&str]) -> Value {
        json!({
            "title": title,
            "content": format!("Details about {title}"),
            "subject": subject,
            "grade_level": "high",
            "tags": tags,
        })
    }

    #[tokio::test]
    async fn test_create_and_filter_questions() {
        let (server, state) = create_test_server();
        let user = seed_user(&state, "asker@example.com", &[AppRole::User]).await;
        let auth = bearer(&state, &user);

        let response = server
            .post("/api/v1/questions")
            .add_header("authorization", auth.clone())
            .json(&question_body("  Quadratic formula ", "Math", &[" algebra ", "", "Roots"]))
            .await;
        response.assert_status(StatusCode::CREATED);
        let created: QuestionResponse = response.json();
        assert_eq!(created.title, "Quadratic formula");
        assert_eq!(created.tags, vec!["algebra", "Roots"]);
        assert_eq!(created.answer_count, 0);

        server
            .post("/api/v1/questions")
            .add_header("authorization", auth.clone())
            .json(&question_body("Photosynthesis", "Biology", &[]))
            .await
            .assert_status(StatusCode::CREATED);

        let by_tag: Vec<QuestionResponse> = server
            .get("/api/v1/questions?search=ROOTS")
            .add_header("authorization", auth.clone())
            .await
            .json();
        assert_eq!(by_tag.len(), 1);
        assert_eq!(by_tag[0].id, created.id);

        let by_subject: Vec<QuestionResponse> = server
            .get("/api/v1/questions?subject=Biology")
            .add_header("authorization", auth.clone())
            .await
            .json();
        assert_eq!(by_subject.len(), 1);
        assert_eq!(by_subject[0].title, "Photosynthesis");

        let everything: Vec<QuestionResponse> = server
            .get("/api/v1/questions?subject=all&search=%20")
            .add_header("authorization", auth)
            .await
            .json();
        assert_eq!(everything.len(), 2);
        assert_eq!(everything[0].title, "Photosynthesis");
    }

    #[tokio::test]
    async fn test_create_question_validation() {
        let (server, state) = create_test_server();
        let user = seed_user(&state, "asker@example.com", &[AppRole::User]).await;
        let auth = bearer(&state, &user);

        for body in [
            question_body("   ", "Math", &[]),
            question_body("Valid", "Astrology", &[]),
            question_body("Valid", "math", &[]),
        ] {
            server
                .post("/api/v1/questions")
                .add_header("authorization", auth.clone())
                .json(&body)
                .await
                .assert_status(StatusCode::BAD_REQUEST);
        }

        server
            .post("/api/v1/questions")
            .json(&question_body("Valid", "Math", &[]))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_answers_and_vote_toggling() {
        let (server, state) = create_test_server();
        let asker = seed_user(&state, "asker@example.com", &[AppRole::User]).await;
        let helper = seed_user(&state, "helper@example.com", &[AppRole::User]).await;
        let asker_auth = bearer(&state, &asker);
        let helper_auth = bearer(&state, &helper);

        let question: QuestionResponse = server
            .post("/api/v1/questions")
            .add_header("authorization", asker_auth.clone())
            .json(&question_body("Newton's laws", "Physics", &[]))
            .await
            .json();

        server
            .post(&format!("/api/v1/questions/{}/answers", question.id))
            .add_header("authorization", helper_auth.clone())
            .json(&json!({"content": "  "}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        server
            .post(&format!("/api/v1/questions/{}/answers", uuid::Uuid::new_v4()))
            .add_header("authorization", helper_auth.clone())
            .json(&json!({"content": "Orphan"}))
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let response = server
            .post(&format!("/api/v1/questions/{}/answers", question.id))
            .add_header("authorization", helper_auth.clone())
            .json(&json!({"content": "F = ma"}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let answer: AnswerResponse = response.json();

        // Up, then up again retracts, then down
        let vote_path = format!("/api/v1/questions/{}/votes", question.id);
        let up: Value = server
            .post(&vote_path)
            .add_header("authorization", helper_auth.clone())
            .json(&json!({"vote_type": 1}))
            .await
            .json();
        assert_eq!(up["outcome"], "inserted");
        assert_eq!(up["votes"], 1);
        assert_eq!(up["my_vote"], 1);

        let retracted: Value = server
            .post(&vote_path)
            .add_header("authorization", helper_auth.clone())
            .json(&json!({"vote_type": 1}))
            .await
            .json();
        assert_eq!(retracted["outcome"], "retracted");
        assert_eq!(retracted["votes"], 0);
        assert_eq!(retracted["my_vote"], Value::Null);

        for bad in [json!(2), json!(0), json!(70000), json!(1.5), json!("up"), Value::Null] {
            server
                .post(&vote_path)
                .add_header("authorization", helper_auth.clone())
                .json(&json!({"vote_type": bad}))
                .await
                .assert_status(StatusCode::BAD_REQUEST);
        }
        server
            .post(&vote_path)
            .add_header("authorization", helper_auth.clone())
            .json(&json!({}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let answer_vote: Value = server
            .post(&format!("/api/v1/answers/{}/votes", answer.id))
            .add_header("authorization", asker_auth.clone())
            .json(&json!({"vote_type": -1}))
            .await
            .json();
        assert_eq!(answer_vote["votes"], -1);

        server
            .post(&format!("/api/v1/answers/{}/votes", uuid::Uuid::new_v4()))
            .add_header("authorization", asker_auth.clone())
            .json(&json!({"vote_type": 1}))
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let detail: QuestionDetailResponse = server
            .get(&format!("/api/v1/questions/{}", question.id))
            .add_header("authorization", asker_auth)
            .await
            .json();
        assert_eq!(detail.question.answer_count, 1);
        assert_eq!(detail.answers.len(), 1);
        assert_eq!(detail.answers[0].votes, -1);
        assert_eq!(detail.my_vote, None);
        assert_eq!(detail.my_answer_votes.get(&answer.id), Some(&-1));
    }
}
