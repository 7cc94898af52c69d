//! Expense create/edit form and delete confirmation
//!
//! Both stay open when the backend rejects the action, so the user can fix
//! the input or retry without retyping.

use crate::client::CollectionClient;
use crate::controller::CollectionController;
use crate::error::{CoreError, CoreResult};
use crate::models::{Expense, ExpenseRequest};
use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Date format of the form's date field
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Field names accepted by [`Editor::set_field`]
pub const FORM_FIELDS: [&str; 5] = ["title", "category", "amount", "date", "description"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorMode {
    Create,
    Edit { id: i64 },
}

/// Raw form input, exactly as typed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpenseForm {
    pub title: String,
    pub category: String,
    pub amount: String,
    pub date: String,
    pub description: String,
}

impl ExpenseForm {
    pub fn from_expense(expense: &Expense) -> Self {
        Self {
            title: expense.title.clone(),
            category: expense.category.clone(),
            amount: expense.amount.to_string(),
            date: expense.date.format(DATE_FORMAT).to_string(),
            description: expense.description.clone().unwrap_or_default(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "title" => Some(&self.title),
            "category" => Some(&self.category),
            "amount" => Some(&self.amount),
            "date" => Some(&self.date),
            "description" => Some(&self.description),
            _ => None,
        }
    }

    /// Build the request payload
    pub fn to_request(&self) -> CoreResult<ExpenseRequest> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(invalid("title", "must not be empty"));
        }

        let amount = Decimal::from_str(self.amount.trim())
            .map_err(|_| invalid("amount", &format!("'{}' is not a number", self.amount.trim())))?;

        let day = NaiveDate::parse_from_str(self.date.trim(), DATE_FORMAT)
            .map_err(|_| invalid("date", &format!("'{}' is not a YYYY-MM-DD date", self.date.trim())))?;
        let midnight = day
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| invalid("date", "has no midnight"))?;

        Ok(ExpenseRequest {
            title: title.to_string(),
            category: self.category.trim().to_string(),
            amount,
            date: Utc.from_utc_datetime(&midnight),
            description: self.description.trim().to_string(),
        })
    }
}

fn invalid(field: &str, message: &str) -> CoreError {
    CoreError::Validation {
        field: field.to_string(),
        message: message.to_string(),
    }
}

/// Create/edit dialog state
#[derive(Debug, Clone, Default)]
pub struct Editor {
    mode: Option<EditorMode>,
    form: ExpenseForm,
}

impl Editor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open with an empty form
    pub fn open_create(&mut self) {
        self.mode = Some(EditorMode::Create);
        self.form = ExpenseForm::default();
    }

    /// Open pre-filled from `expense`
    pub fn open_edit(&mut self, expense: &Expense) {
        self.mode = Some(EditorMode::Edit { id: expense.id });
        self.form = ExpenseForm::from_expense(expense);
    }

    pub fn is_open(&self) -> bool {
        self.mode.is_some()
    }

    pub fn mode(&self) -> Option<EditorMode> {
        self.mode
    }

    pub fn form(&self) -> &ExpenseForm {
        &self.form
    }

    pub fn set_field(&mut self, name: &str, value: &str) -> CoreResult<()> {
        let slot = match name {
            "title" => &mut self.form.title,
            "category" => &mut self.form.category,
            "amount" => &mut self.form.amount,
            "date" => &mut self.form.date,
            "description" => &mut self.form.description,
            other => {
                return Err(invalid(
                    other,
                    &format!("unknown field, expected one of {}", FORM_FIELDS.join(", ")),
                ))
            }
        };
        *slot = value.to_string();
        Ok(())
    }

    /// Payload of the open form
    pub fn payload(&self) -> CoreResult<ExpenseRequest> {
        self.form.to_request()
    }

    pub fn close(&mut self) {
        self.mode = None;
        self.form = ExpenseForm::default();
    }

    /// Create or update through `controller`; closes only on success
    pub async fn save<C>(&mut self, controller: &mut CollectionController<C>) -> CoreResult<Expense>
    where
        C: CollectionClient<Record = Expense, Draft = ExpenseRequest> + 'static,
    {
        let mode = self.mode.ok_or_else(|| invalid("editor", "is not open"))?;
        let payload = self.payload()?;
        let saved = match mode {
            EditorMode::Create => controller.create(&payload).await?,
            EditorMode::Edit { id } => controller.update(id, &payload).await?,
        };
        self.close();
        Ok(saved)
    }
}

/// Pending "are you sure" for a delete
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteConfirmation {
    pending: Option<i64>,
}

impl DeleteConfirmation {
    pub fn request(&mut self, id: i64) {
        self.pending = Some(id);
    }

    pub fn pending(&self) -> Option<i64> {
        self.pending
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Delete the pending record; the confirmation survives a failure
    pub async fn confirm<C>(&mut self, controller: &mut CollectionController<C>) -> CoreResult<i64>
    where
        C: CollectionClient + 'static,
    {
        let id = self
            .pending
            .ok_or_else(|| invalid("delete", "nothing is awaiting confirmation"))?;
        controller.delete(id).await?;
        self.pending = None;
        Ok(id)
    }
}
