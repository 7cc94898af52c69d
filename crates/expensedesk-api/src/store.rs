//! In-memory expense store

use crate::error::ApiError;
use crate::query::{compile_filter, sort_expenses};
use chrono::{TimeZone, Utc};
use expensedesk_core::{Expense, ExpenseRequest, PageQuery, PageResult};
use rust_decimal::Decimal;

#[derive(Debug)]
pub struct ExpenseStore {
    expenses: Vec<Expense>,
    next_id: i64,
}

impl Default for ExpenseStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpenseStore {
    pub fn new() -> Self {
        Self {
            expenses: Vec::new(),
            next_id: 1,
        }
    }

    /// A store holding a month of sample expenses
    pub fn with_demo_data() -> Self {
        let mut store = Self::new();
        let samples: [(&str, &str, i64, u32, u32); 14] = [
            ("Groceries", "Food", 2_340_00, 3, 2),
            ("Metro card", "Travel", 500_00, 3, 3),
            ("Rent", "Housing", 18_000_00, 3, 1),
            ("Electricity bill", "Utilities", 1_275_50, 3, 6),
            ("Pizza night", "Food", 849_00, 3, 8),
            ("Movie tickets", "Entertainment", 600_00, 3, 9),
            ("Internet", "Utilities", 999_00, 3, 10),
            ("Cab to airport", "Travel", 1_150_00, 3, 14),
            ("Coffee beans", "Food", 450_00, 3, 15),
            ("Concert", "Entertainment", 2_500_00, 3, 18),
            ("Pharmacy", "Health", 320_75, 3, 21),
            ("Vegetables", "Food", 280_00, 3, 24),
            ("Gym membership", "Health", 1_800_00, 3, 27),
            ("Train tickets", "Travel", 1_340_00, 3, 30),
        ];
        for (title, category, paise, month, day) in samples {
            let date = Utc
                .with_ymd_and_hms(2024, month, day, 0, 0, 0)
                .single()
                .unwrap_or_else(Utc::now);
            store.create(ExpenseRequest {
                title: title.to_string(),
                category: category.to_string(),
                amount: Decimal::new(paise, 2),
                date,
                description: String::new(),
            });
        }
        store
    }

    pub fn len(&self) -> usize {
        self.expenses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expenses.is_empty()
    }

    /// Filter, sort and slice into the requested page
    pub fn list(&self, query: &PageQuery) -> Result<PageResult<Expense>, ApiError> {
        let mut rows: Vec<Expense> = match &query.filter {
            Some(expression) if !expression.trim().is_empty() => {
                let predicates = compile_filter(expression)?;
                self.expenses
                    .iter()
                    .filter(|e| predicates.iter().all(|p| p.matches(e)))
                    .cloned()
                    .collect()
            }
            _ => self.expenses.clone(),
        };
        if let Some(sort) = &query.sort {
            sort_expenses(&mut rows, sort)?;
        }
        Ok(PageResult::from_slice(&rows, query.page, query.size))
    }

    pub fn get(&self, id: i64) -> Result<Expense, ApiError> {
        self.expenses
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    pub fn create(&mut self, request: ExpenseRequest) -> Expense {
        let expense = request.into_expense(self.next_id);
        self.next_id += 1;
        self.expenses.push(expense.clone());
        expense
    }

    pub fn update(&mut self, id: i64, request: ExpenseRequest) -> Result<Expense, ApiError> {
        let slot = self
            .expenses
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| not_found(id))?;
        *slot = request.into_expense(id);
        Ok(slot.clone())
    }

    pub fn delete(&mut self, id: i64) -> Result<(), ApiError> {
        let index = self
            .expenses
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| not_found(id))?;
        self.expenses.remove(index);
        Ok(())
    }
}

fn not_found(id: i64) -> ApiError {
    ApiError::NotFound {
        resource: format!("expense {}", id),
    }
}
