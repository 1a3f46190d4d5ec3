use crate::errors::AppError;
use crate::models::{ChangeRequest, ChangeResponse, DashboardView};
use crate::state::AppState;
use crate::stats::build_dashboard;
use crate::ui::render_index;
use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Html, Redirect,
    },
    Form, Json,
};
use futures_util::{stream, Stream};

pub async fn index(State(state): State<AppState>) -> Html<String> {
    let view = build_dashboard(&state.sync.records());
    Html(render_index(&state.title, &view))
}

pub async fn get_progress(State(state): State<AppState>) -> Json<DashboardView> {
    Json(build_dashboard(&state.sync.records()))
}

pub async fn change(
    State(state): State<AppState>,
    Json(payload): Json<ChangeRequest>,
) -> Result<(StatusCode, Json<ChangeResponse>), AppError> {
    let response = apply_change(&state, payload)?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}

pub async fn change_form(
    State(state): State<AppState>,
    Form(payload): Form<ChangeRequest>,
) -> Result<Redirect, AppError> {
    apply_change(&state, payload)?;
    Ok(Redirect::to("/"))
}

/// Streams the dashboard once on connect and again after every applied
/// update.
pub async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let mut records = state.sync.watch();
    records.mark_changed();

    let updates = stream::unfold(records, |mut records| async move {
        records.changed().await.ok()?;
        let view = build_dashboard(&records.borrow_and_update());
        Some((Event::default().event("progress").json_data(view), records))
    });

    Sse::new(updates).keep_alive(KeepAlive::default())
}

fn apply_change(state: &AppState, request: ChangeRequest) -> Result<ChangeResponse, AppError> {
    if request.delta != 1 && request.delta != -1 {
        return Err(AppError::bad_request("delta must be 1 or -1"));
    }

    let update = state.sync.change(&request.person, request.category, request.delta);

    Ok(ChangeResponse {
        person: request.person,
        category: request.category,
        value: update.as_ref().map(|update| update.value),
        queued: update.is_some(),
    })
}
