//! Team, role and membership API endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::{ApiJson, ApiResult, Created, EmptyResult};
use crate::errors::{AppError, FieldErrors};
use crate::models::{
    AddTeamMemberRequest, CreateRoleRequest, CreateTeamRequest, Role, Team, TeamMember,
    UpdateRoleRequest, UpdateTeamRequest,
};
use crate::AppState;

async fn load_team(state: &AppState, id: &str) -> Result<Team, AppError> {
    state
        .store
        .get_team(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Team {} not found", id)))
}

async fn ensure_leader_exists(state: &AppState, leader_id: Option<&str>) -> Result<(), AppError> {
    if let Some(leader_id) = leader_id {
        if state.store.get_volunteer(leader_id).await?.is_none() {
            let mut errors = FieldErrors::new();
            errors.push(
                "leaderId",
                format!("volunteer {} does not exist", leader_id),
            );
            errors.into_result()?;
        }
    }
    Ok(())
}

/// GET /api/teams - List all teams.
pub async fn list_teams(State(state): State<AppState>) -> ApiResult<Vec<Team>> {
    Ok(Json(state.store.list_teams().await?))
}

/// GET /api/teams/:id
pub async fn get_team(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Team> {
    Ok(Json(load_team(&state, &id).await?))
}

/// POST /api/teams - Create a team.
pub async fn create_team(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateTeamRequest>,
) -> Result<Created<Team>, AppError> {
    let team = request.into_team()?;
    ensure_leader_exists(&state, team.leader_id.as_deref()).await?;

    state.store.insert_team(&team).await?;
    tracing::info!(team_id = %team.id, name = %team.name, "Team created");
    Ok(Created(team))
}

/// PUT /api/teams/:id
pub async fn update_team(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<UpdateTeamRequest>,
) -> ApiResult<Team> {
    let mut team = load_team(&state, &id).await?;
    team.apply(request)?;
    ensure_leader_exists(&state, team.leader_id.as_deref()).await?;

    state.store.update_team(&team).await?;
    Ok(Json(team))
}

/// DELETE /api/teams/:id - Removes the team with its roles, members and schedules.
pub async fn delete_team(State(state): State<AppState>, Path(id): Path<String>) -> EmptyResult {
    state.store.delete_team(&id).await?;
    tracing::info!(team_id = %id, "Team deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/teams/:id/roles
pub async fn list_team_roles(
    State(state): State<AppState>,
    Path(team_id): Path<String>,
) -> ApiResult<Vec<Role>> {
    load_team(&state, &team_id).await?;
    Ok(Json(state.store.list_roles(&team_id).await?))
}

/// POST /api/teams/:id/roles
pub async fn create_team_role(
    State(state): State<AppState>,
    Path(team_id): Path<String>,
    ApiJson(request): ApiJson<CreateRoleRequest>,
) -> Result<Created<Role>, AppError> {
    load_team(&state, &team_id).await?;
    let role = request.into_role(&team_id)?;

    state.store.insert_role(&role).await?;
    Ok(Created(role))
}

/// PUT /api/roles/:id
pub async fn update_role(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<UpdateRoleRequest>,
) -> ApiResult<Role> {
    let mut role = state
        .store
        .get_role(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Role {} not found", id)))?;
    role.apply(request)?;

    state.store.update_role(&role).await?;
    Ok(Json(role))
}

/// DELETE /api/roles/:id - Also drops the slots opened for the role.
pub async fn delete_role(State(state): State<AppState>, Path(id): Path<String>) -> EmptyResult {
    state.store.delete_role(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/teams/:id/members
pub async fn list_team_members(
    State(state): State<AppState>,
    Path(team_id): Path<String>,
) -> ApiResult<Vec<TeamMember>> {
    load_team(&state, &team_id).await?;
    Ok(Json(state.store.list_team_members(&team_id).await?))
}

/// POST /api/team-members - Add a volunteer to a team, or update their roles there.
pub async fn add_team_member(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<AddTeamMemberRequest>,
) -> Result<Created<TeamMember>, AppError> {
    let team_id = request.team_id.trim().to_string();
    let volunteer_id = request.volunteer_id.trim().to_string();
    let mut errors = FieldErrors::new();
    errors.require("volunteerId", &volunteer_id);
    errors.require("teamId", &team_id);
    errors.into_result()?;

    load_team(&state, &team_id).await?;
    if state.store.get_volunteer(&volunteer_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Volunteer {} not found", volunteer_id)));
    }

    let roles = state.store.list_roles(&team_id).await?;
    let mut member = request.into_member(&roles)?;
    member.team_id = team_id;
    member.volunteer_id = volunteer_id;

    state.store.upsert_team_member(&member).await?;
    Ok(Created(member))
}

/// DELETE /api/team-members/:volunteer_id/:team_id
pub async fn remove_team_member(
    State(state): State<AppState>,
    Path((volunteer_id, team_id)): Path<(String, String)>,
) -> EmptyResult {
    state.store.remove_team_member(&volunteer_id, &team_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
