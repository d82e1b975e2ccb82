//! Employee management API.

use std::sync::Arc;

use axum::extract::Path;
use axum::{Extension, Json};
use sentinel_store::{
    create_employee, get_employee, list_employees, unix_now, update_employee,
    CreateEmployeeParams, Employee, UpdateEmployeeParams,
};
use serde::Deserialize;

use crate::error::{with_blocking_conn, ApiError};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateEmployeeRequest {
    #[serde(rename = "employeeId", alias = "employee_id")]
    pub employee_id: String,
    pub name: String,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateEmployeeRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(rename = "isActive", alias = "is_active", default)]
    pub is_active: Option<bool>,
}

/// `POST /api/employees`.
pub async fn create_employee_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<CreateEmployeeRequest>,
) -> Result<Json<Employee>, ApiError> {
    if request.employee_id.is_empty() || request.name.is_empty() {
        return Err(ApiError::Validation(
            "employee id and name must not be empty".to_string(),
        ));
    }

    let params = CreateEmployeeParams {
        employee_id: request.employee_id,
        name: request.name,
        department: request.department,
        email: request.email,
    };
    let now = unix_now();

    let employee = with_blocking_conn(state.pool.clone(), move |conn| {
        Ok(create_employee(conn, &params, now)?)
    })
    .await?;
    Ok(Json(employee))
}

/// `GET /api/employees`.
pub async fn list_employees_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<Employee>>, ApiError> {
    let employees =
        with_blocking_conn(state.pool.clone(), move |conn| Ok(list_employees(conn)?)).await?;
    Ok(Json(employees))
}

/// `GET /api/employees/{employeeId}`.
pub async fn get_employee_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(employee_id): Path<String>,
) -> Result<Json<Employee>, ApiError> {
    let employee = with_blocking_conn(state.pool.clone(), move |conn| {
        Ok(get_employee(conn, &employee_id)?)
    })
    .await?;
    Ok(Json(employee))
}

/// `PUT /api/employees/{employeeId}` — partial update.
pub async fn update_employee_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(employee_id): Path<String>,
    Json(request): Json<UpdateEmployeeRequest>,
) -> Result<Json<Employee>, ApiError> {
    let updates = UpdateEmployeeParams {
        name: request.name,
        department: request.department,
        email: request.email,
        is_active: request.is_active,
    };
    let now = unix_now();

    let employee = with_blocking_conn(state.pool.clone(), move |conn| {
        Ok(update_employee(conn, &employee_id, &updates, now)?)
    })
    .await?;
    Ok(Json(employee))
}
