//! Employee record management.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// An employee record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Employee {
    /// Internal database ID.
    pub id: i64,
    /// Unique public identifier.
    pub employee_id: String,
    /// Display name, joined into event views during fan-out.
    pub name: String,
    pub department: Option<String>,
    pub email: Option<String>,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Parameters for creating an employee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEmployeeParams {
    pub employee_id: String,
    pub name: String,
    pub department: Option<String>,
    pub email: Option<String>,
}

/// Parameters for a partial employee update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateEmployeeParams {
    pub name: Option<String>,
    pub department: Option<String>,
    pub email: Option<String>,
    pub is_active: Option<bool>,
}

/// Creates a new employee.
///
/// # Errors
///
/// Returns [`StoreError::EmployeeExists`] when the `employee_id` is taken.
pub fn create_employee(
    conn: &Connection,
    params: &CreateEmployeeParams,
    now: i64,
) -> Result<Employee, StoreError> {
    let taken: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM employees WHERE employee_id = ?1",
        [&params.employee_id],
        |row| row.get(0),
    )?;
    if taken {
        return Err(StoreError::EmployeeExists(params.employee_id.clone()));
    }

    let id: i64 = conn.query_row(
        "INSERT INTO employees (employee_id, name, department, email,
                                is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)
         RETURNING id",
        params![
            params.employee_id,
            params.name,
            params.department,
            params.email,
            now,
        ],
        |row| row.get(0),
    )?;

    Ok(Employee {
        id,
        employee_id: params.employee_id.clone(),
        name: params.name.clone(),
        department: params.department.clone(),
        email: params.email.clone(),
        is_active: true,
        created_at: now,
        updated_at: now,
    })
}

/// Updates an employee using a single atomic UPDATE statement.
///
/// Only fields that are `Some` in `updates` are modified; `None` fields
/// are left untouched.
pub fn update_employee(
    conn: &Connection,
    employee_id: &str,
    updates: &UpdateEmployeeParams,
    now: i64,
) -> Result<Employee, StoreError> {
    let mut set_parts: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
    let mut idx = 1usize;

    if let Some(name) = &updates.name {
        set_parts.push(format!("name = ?{}", idx));
        values.push(Box::new(name.clone()));
        idx += 1;
    }
    if let Some(department) = &updates.department {
        set_parts.push(format!("department = ?{}", idx));
        values.push(Box::new(department.clone()));
        idx += 1;
    }
    if let Some(email) = &updates.email {
        set_parts.push(format!("email = ?{}", idx));
        values.push(Box::new(email.clone()));
        idx += 1;
    }
    if let Some(active) = updates.is_active {
        set_parts.push(format!("is_active = ?{}", idx));
        values.push(Box::new(active));
        idx += 1;
    }

    if !set_parts.is_empty() {
        set_parts.push(format!("updated_at = ?{}", idx));
        values.push(Box::new(now));
        idx += 1;

        let sql = format!(
            "UPDATE employees SET {} WHERE employee_id = ?{}",
            set_parts.join(", "),
            idx
        );
        values.push(Box::new(employee_id.to_string()));

        let params: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|v| v.as_ref()).collect();
        let count = conn.execute(&sql, params.as_slice())?;
        if count == 0 {
            return Err(StoreError::EmployeeNotFound(employee_id.to_string()));
        }
    }

    get_employee(conn, employee_id)
}

/// Retrieves an employee by public ID.
pub fn get_employee(conn: &Connection, employee_id: &str) -> Result<Employee, StoreError> {
    conn.query_row(
        "SELECT id, employee_id, name, department, email, is_active,
                created_at, updated_at
         FROM employees WHERE employee_id = ?1",
        [employee_id],
        map_row_to_employee,
    )
    .optional()?
    .ok_or_else(|| StoreError::EmployeeNotFound(employee_id.to_string()))
}

/// Lists all employees, by name.
pub fn list_employees(conn: &Connection) -> Result<Vec<Employee>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, employee_id, name, department, email, is_active,
                created_at, updated_at
         FROM employees ORDER BY name ASC",
    )?;

    let rows = stmt.query_map([], map_row_to_employee)?;
    let mut employees = Vec::new();
    for row in rows {
        employees.push(row?);
    }
    Ok(employees)
}

/// Looks up an employee's display name, `None` when the id is unknown.
pub fn employee_name(conn: &Connection, employee_id: &str) -> Result<Option<String>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT name FROM employees WHERE employee_id = ?1",
            [employee_id],
            |row| row.get(0),
        )
        .optional()?)
}

fn map_row_to_employee(row: &Row) -> rusqlite::Result<Employee> {
    Ok(Employee {
        id: row.get(0)?,
        employee_id: row.get(1)?,
        name: row.get(2)?,
        department: row.get(3)?,
        email: row.get(4)?,
        is_active: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}
